//! Provides struct for representing a linear constraint
use std::fmt::{Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::expression::Expression;
use crate::model::variable::VariableError;

/// The relation between the two sides of a constraint
#[derive(Debug, PartialEq, Eq, Clone, Copy, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ComparisonSense {
    /// Left hand side is less than or equal to the right hand side
    Leq,
    /// Both sides are equal
    Eq,
    /// Left hand side is greater than or equal to the right hand side
    Geq,
}

impl Display for ComparisonSense {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            ComparisonSense::Leq => write!(f, "<="),
            ComparisonSense::Eq => write!(f, "="),
            ComparisonSense::Geq => write!(f, ">="),
        }
    }
}

impl FromStr for ComparisonSense {
    type Err = ConstraintError;

    /// Parse a sense from its word form (`leq`, `eq`, `geq`, any case) or
    /// its symbol form (`<=`, `=<`, `<`, `=`, `>=`, `=>`, `>`)
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "leq" | "<=" | "=<" | "<" => Ok(ComparisonSense::Leq),
            "eq" | "=" => Ok(ComparisonSense::Eq),
            "geq" | ">=" | "=>" | ">" => Ok(ComparisonSense::Geq),
            _ => Err(ConstraintError::InvalidSense(s.to_string())),
        }
    }
}

/// A relational statement between two linear expressions
///
/// The canonical form is computed once at construction: all variable terms
/// are shifted to the left as `expression`, the constants to the right as
/// `bound`, so the constraint reads `expression (sense) bound`. The original
/// `lhs`/`rhs` expressions are kept for diagnostics and display.
#[derive(Debug, Clone)]
pub struct Constraint {
    /// Optional row name, used as the row label during serialization
    name: Option<String>,
    /// Left hand side as written by the caller
    lhs: Expression,
    /// Relation between the two sides
    sense: ComparisonSense,
    /// Right hand side as written by the caller
    rhs: Expression,
    /// Canonical variable terms of lhs minus rhs, with a zero constant
    expression: Expression,
    /// Canonical right hand side, rhs constant minus lhs constant
    bound: f64,
}

impl Constraint {
    /// Create a new constraint, canonicalizing eagerly
    ///
    /// # Examples
    /// ```rust
    /// use lpmod_core::model::constraint::{ComparisonSense, Constraint};
    /// use lpmod_core::model::expression::Expression;
    /// use lpmod_core::model::variable::{Variable, VariableKind};
    /// let x = Variable::new("x", VariableKind::Continuous, Some(0.0), None)
    ///     .unwrap()
    ///     .wrap();
    /// // 2.5*x <= 12
    /// let row = Constraint::new(
    ///     Expression::new(&[x], &[2.5], 0.0),
    ///     ComparisonSense::Leq,
    ///     Expression::from_constant(12.0),
    /// );
    /// assert_eq!(row.bound(), 12.0);
    /// ```
    pub fn new(lhs: Expression, sense: ComparisonSense, rhs: Expression) -> Self {
        let combined = lhs.subtract(&rhs);
        let bound = -combined.constant();
        let expression = combined.with_constant(0.0);
        Constraint {
            name: None,
            lhs,
            sense,
            rhs,
            expression,
            bound,
        }
    }

    /// Create a new named constraint
    pub fn with_name(name: &str, lhs: Expression, sense: ComparisonSense, rhs: Expression) -> Self {
        let mut constraint = Constraint::new(lhs, sense, rhs);
        constraint.name = Some(name.to_string());
        constraint
    }

    /// Row name, if one was given
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Left hand side as written by the caller
    pub fn lhs(&self) -> &Expression {
        &self.lhs
    }

    /// The sense of the constraint
    pub fn sense(&self) -> ComparisonSense {
        self.sense
    }

    /// Right hand side as written by the caller
    pub fn rhs(&self) -> &Expression {
        &self.rhs
    }

    /// Canonical variable terms, all shifted to the left hand side
    pub fn expression(&self) -> &Expression {
        &self.expression
    }

    /// Canonical numeric bound, all constants shifted to the right hand side
    pub fn bound(&self) -> f64 {
        self.bound
    }

    /// Difference between the two sides under the current variable values
    ///
    /// Used for feasibility diagnostics independent of any backend.
    pub fn slack(&self) -> Result<f64, VariableError> {
        Ok(self.lhs.evaluate()? - self.rhs.evaluate()?)
    }

    /// Whether the constraint holds under the current variable values,
    /// within `tolerance`
    pub fn is_satisfied(&self, tolerance: f64) -> Result<bool, VariableError> {
        let slack = self.slack()?;
        Ok(match self.sense {
            ComparisonSense::Leq => slack <= tolerance,
            ComparisonSense::Eq => slack.abs() <= tolerance,
            ComparisonSense::Geq => slack >= -tolerance,
        })
    }
}

impl Display for Constraint {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {} {}", self.expression, self.sense, self.bound)
    }
}

/// Errors associated with constructing a Constraint
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConstraintError {
    /// Error when parsing an unrecognized comparison sense
    #[error("invalid comparison sense `{0}`, expected one of leq, eq, geq")]
    InvalidSense(String),
}
