//! Provides struct for representing an optimization problem's objective
use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::expression::Expression;
use crate::model::variable::VariableError;

/// Represents the sense of the objective, whether it should be maximized
/// or minimized
#[derive(Debug, PartialEq, Eq, Clone, Copy, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ObjectiveSense {
    /// The objective should be minimized
    Minimize,
    /// The objective should be maximized
    Maximize,
}

impl Display for ObjectiveSense {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            ObjectiveSense::Minimize => write!(f, "Minimize"),
            ObjectiveSense::Maximize => write!(f, "Maximize"),
        }
    }
}

/// A linear expression tagged with an optimization sense
///
/// Adapters read `(sense, expression)` and map the sense onto the backend's
/// native direction in one place per adapter, so maximization is handled
/// uniformly across backends.
#[derive(Debug, Clone)]
pub struct Objective {
    /// Expression to optimize
    expression: Expression,
    /// Sense of the objective, Minimize unless Maximize is requested
    sense: ObjectiveSense,
}

impl Objective {
    /// Create a new objective with the given sense
    pub fn new(expression: Expression, sense: ObjectiveSense) -> Self {
        Objective { expression, sense }
    }

    /// Create a new minimization objective
    pub fn minimize(expression: Expression) -> Self {
        Objective::new(expression, ObjectiveSense::Minimize)
    }

    /// Create a new maximization objective
    pub fn maximize(expression: Expression) -> Self {
        Objective::new(expression, ObjectiveSense::Maximize)
    }

    /// The expression being optimized
    pub fn expression(&self) -> &Expression {
        &self.expression
    }

    /// The sense of the objective
    pub fn sense(&self) -> ObjectiveSense {
        self.sense
    }

    /// Evaluate the objective under the current variable values
    pub fn evaluate(&self) -> Result<f64, EvaluationError> {
        Ok(self.expression.evaluate()?)
    }
}

impl Default for Objective {
    /// An empty minimization objective
    fn default() -> Self {
        Objective::minimize(Expression::empty())
    }
}

impl Display for Objective {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.sense, self.expression)
    }
}

/// Error raised when an objective is read before a successful solve
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EvaluationError {
    /// A variable referenced by the objective has no assigned value
    #[error("could not evaluate objective: {0}")]
    UnsolvedVariable(#[from] VariableError),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::variable::VariableBuilder;

    #[test]
    fn default_sense_is_minimize() {
        let objective = Objective::default();
        assert_eq!(objective.sense(), ObjectiveSense::Minimize);
    }

    #[test]
    fn evaluate_before_solve() {
        let x = VariableBuilder::default().name("x").build().unwrap().wrap();
        let objective = Objective::maximize(Expression::new(&[x.clone()], &[3.0], 0.0));
        match objective.evaluate() {
            Err(EvaluationError::UnsolvedVariable(VariableError::Unsolved(name))) => {
                assert_eq!(name, "x")
            }
            _ => panic!("Unsolved objective read not caught"),
        }
    }

    #[test]
    fn evaluate_after_solve() {
        let x = VariableBuilder::default().name("x").build().unwrap().wrap();
        let y = VariableBuilder::default().name("y").build().unwrap().wrap();
        let objective =
            Objective::maximize(Expression::new(&[x.clone(), y.clone()], &[3.0, 2.0], 0.0));
        x.write().unwrap().set_value(3.2);
        y.write().unwrap().set_value(4.0);
        assert!((objective.evaluate().unwrap() - 17.6).abs() < 1e-9);
    }
}
