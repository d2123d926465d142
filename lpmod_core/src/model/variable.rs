//! Module providing representation of decision variables
use std::fmt::{Display, Formatter};
use std::sync::{Arc, RwLock};

use derive_builder::{Builder, UninitializedFieldError};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A decision variable in an optimization problem
///
/// Variables are shared between expressions, constraints and the problem as
/// `Arc<RwLock<Variable>>` (see [`Variable::wrap`]), and identity is by
/// reference (`Arc::ptr_eq`) rather than by name. Two distinct variables may
/// share a name, which [`crate::model::problem::Problem`] rejects during
/// validation when their attributes differ.
#[derive(Builder, Debug, Clone)]
#[builder(build_fn(validate = "Self::validate", error = "VariableError"))]
pub struct Variable {
    /// Name used to identify the variable, unique within a problem
    #[builder(setter(into))]
    name: String,
    /// Lower bound, None meaning unbounded below
    #[builder(default = "None")]
    low_bound: Option<f64>,
    /// Upper bound, None meaning unbounded above
    #[builder(default = "None")]
    up_bound: Option<f64>,
    /// Kind of variable (see [`VariableKind`])
    #[builder(default = "VariableKind::Continuous")]
    kind: VariableKind,
    /// Value assigned by a successful solve, None before any solve
    #[builder(setter(skip), default = "None")]
    value: Option<f64>,
}

impl Variable {
    /// Create a new variable, validating the bounds
    ///
    /// # Examples
    /// ```rust
    /// use lpmod_core::model::variable::{Variable, VariableKind};
    /// let x = Variable::new("x", VariableKind::Continuous, Some(1.0), Some(3.5)).unwrap();
    /// assert_eq!(x.low_bound(), Some(1.0));
    /// ```
    pub fn new(
        name: &str,
        kind: VariableKind,
        low_bound: Option<f64>,
        up_bound: Option<f64>,
    ) -> Result<Variable, VariableError> {
        VariableBuilder::default()
            .name(name)
            .kind(kind)
            .low_bound(low_bound)
            .up_bound(up_bound)
            .build()
    }

    /// Wrap the variable in an `Arc<RwLock<>>` for sharing across expressions
    pub fn wrap(self) -> Arc<RwLock<Self>> {
        Arc::new(RwLock::new(self))
    }

    /// Name of the variable
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Kind of the variable
    pub fn kind(&self) -> VariableKind {
        self.kind
    }

    /// Effective lower bound
    ///
    /// Binary variables report 0 regardless of any caller supplied bound.
    pub fn low_bound(&self) -> Option<f64> {
        match self.kind {
            VariableKind::Binary => Some(0.0),
            _ => self.low_bound,
        }
    }

    /// Effective upper bound
    ///
    /// Binary variables report 1 regardless of any caller supplied bound.
    pub fn up_bound(&self) -> Option<f64> {
        match self.kind {
            VariableKind::Binary => Some(1.0),
            _ => self.up_bound,
        }
    }

    /// Value assigned by the most recent successful solve, if any
    pub fn value(&self) -> Option<f64> {
        self.value
    }

    /// Return the solved value, or an error if the variable has not been solved
    pub fn evaluate(&self) -> Result<f64, VariableError> {
        self.value
            .ok_or_else(|| VariableError::Unsolved(self.name.clone()))
    }

    /// Record a solved value, only reachable from the solve path
    pub(crate) fn set_value(&mut self, value: f64) {
        self.value = Some(value);
    }

    /// Whether the variable is unbounded on both sides
    pub fn is_free(&self) -> bool {
        self.low_bound().is_none() && self.up_bound().is_none()
    }

    /// Whether the variable has the default bounds of zero to unbounded above
    pub fn is_positive_free(&self) -> bool {
        self.low_bound() == Some(0.0) && self.up_bound().is_none()
    }

    /// Whether the bounds restrict the variable to a single value
    pub fn is_fixed(&self) -> bool {
        match (self.low_bound(), self.up_bound()) {
            (Some(low), Some(up)) => low == up,
            _ => false,
        }
    }

    /// Whether two variables carry the same bounds and kind
    pub(crate) fn same_attributes(&self, other: &Variable) -> bool {
        self.kind == other.kind
            && self.low_bound() == other.low_bound()
            && self.up_bound() == other.up_bound()
    }

    /// Human readable description of the bounds and kind, used in errors
    pub(crate) fn attribute_summary(&self) -> String {
        let low = match self.low_bound() {
            Some(low) => low.to_string(),
            None => "-inf".to_string(),
        };
        let up = match self.up_bound() {
            Some(up) => up.to_string(),
            None => "inf".to_string(),
        };
        format!("{} in [{}, {}]", self.kind, low, up)
    }
}

impl Display for Variable {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.name, self.kind)
    }
}

impl VariableBuilder {
    fn validate(&self) -> Result<(), VariableError> {
        // Binary bounds are pinned to [0,1] by the accessors, whatever the
        // caller supplied
        if matches!(self.kind, Some(VariableKind::Binary)) {
            return Ok(());
        }
        if let (Some(Some(low)), Some(Some(up))) = (self.low_bound, self.up_bound) {
            if low > up {
                return Err(VariableError::InvalidBounds {
                    name: self.name.clone().unwrap_or_default(),
                    low,
                    up,
                });
            }
        }
        Ok(())
    }
}

/// Represents the kind of a decision variable
#[derive(Debug, PartialEq, Eq, Clone, Copy, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VariableKind {
    /// Continuous variable
    Continuous,
    /// Integer variable
    Integer,
    /// Binary variable, bounds fixed to [0,1]
    Binary,
}

impl Display for VariableKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            VariableKind::Continuous => write!(f, "CONTINUOUS"),
            VariableKind::Integer => write!(f, "INTEGER"),
            VariableKind::Binary => write!(f, "BINARY"),
        }
    }
}

/// Errors associated with constructing or reading a Variable
#[derive(Error, Debug, Clone, PartialEq)]
pub enum VariableError {
    /// Error when the lower bound is above the upper bound
    #[error("lower bound {low} of variable `{name}` is above its upper bound {up}")]
    InvalidBounds { name: String, low: f64, up: f64 },
    /// Error when reading the value of a variable before a successful solve
    #[error("variable `{0}` has no value, solve the problem first")]
    Unsolved(String),
    /// Error when a required builder field was never set
    #[error("missing field `{0}` while building a variable")]
    MissingField(&'static str),
}

impl From<UninitializedFieldError> for VariableError {
    fn from(err: UninitializedFieldError) -> Self {
        VariableError::MissingField(err.field_name())
    }
}
