//! Module for representing linear and mixed integer optimization models

pub mod constraint;
pub mod expression;
pub mod objective;
pub mod problem;
pub mod variable;

use std::fmt::{Display, Formatter};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Struct representing the outcome of a solve
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Solution {
    /// The unified status reported by the backend
    pub status: SolutionStatus,
    /// Optimized value of the objective
    ///
    /// Some(f64) if the problem was solved to optimality and carries an
    /// objective, None otherwise
    pub objective_value: Option<f64>,
    /// Values of the variables at the optimum
    ///
    /// Some(IndexMap), keyed by variable name, if the problem was solved to
    /// optimality, None otherwise
    pub variable_values: Option<IndexMap<String, f64>>,
    /// Cause attached when a backend invocation failure was folded into
    /// [`SolutionStatus::NotSolved`]
    pub diagnostic: Option<String>,
}

impl Solution {
    /// An optimal solution with the given objective value and variable values
    pub fn optimal(objective_value: Option<f64>, variable_values: IndexMap<String, f64>) -> Self {
        Solution {
            status: SolutionStatus::Optimal,
            objective_value,
            variable_values: Some(variable_values),
            diagnostic: None,
        }
    }

    /// An infeasible outcome
    pub fn infeasible() -> Self {
        Solution::status_only(SolutionStatus::Infeasible)
    }

    /// An unbounded outcome
    pub fn unbounded() -> Self {
        Solution::status_only(SolutionStatus::Unbounded)
    }

    /// A not-solved outcome carrying the cause of the backend failure
    pub fn not_solved(diagnostic: impl Into<String>) -> Self {
        Solution {
            diagnostic: Some(diagnostic.into()),
            ..Solution::status_only(SolutionStatus::NotSolved)
        }
    }

    fn status_only(status: SolutionStatus) -> Self {
        Solution {
            status,
            objective_value: None,
            variable_values: None,
            diagnostic: None,
        }
    }
}

/// Unified status of a solve across all backends
#[derive(Debug, PartialEq, Eq, Clone, Copy, Hash, Serialize, Deserialize)]
pub enum SolutionStatus {
    /// An optimal solution was found
    Optimal,
    /// The problem can't be solved because the constraints conflict
    Infeasible,
    /// The problem can't be solved because the objective value is not bounded
    Unbounded,
    /// The problem has not been solved, either because no solve was attempted
    /// yet or because the backend stopped without a usable answer
    NotSolved,
}

impl Display for SolutionStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            SolutionStatus::Optimal => write!(f, "Optimal"),
            SolutionStatus::Infeasible => write!(f, "Infeasible"),
            SolutionStatus::Unbounded => write!(f, "Unbounded"),
            SolutionStatus::NotSolved => write!(f, "NotSolved"),
        }
    }
}
