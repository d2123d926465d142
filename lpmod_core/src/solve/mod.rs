//! Module for solving problems through interchangeable backends
pub mod cbc;
pub mod microlp;

use indexmap::IndexMap;

use crate::configuration::CONFIGURATION;
use crate::model::constraint::{ComparisonSense, Constraint};
use crate::model::objective::Objective;
use crate::model::problem::{Problem, ProblemError};
use crate::model::Solution;

/// The capability interface every solver backend implements
///
/// An adapter validates the problem, translates it into the backend's
/// native input, invokes the backend, and parses the raw result into a
/// [`Solution`]. Modeling errors raised by validation propagate unchanged;
/// every backend outcome, including an invocation failure, comes back as a
/// `Solution` rather than an error.
pub trait Solver {
    fn solve(&self, problem: &Problem) -> Result<Solution, ProblemError>;
}

/// Decide a canonical row that has no variable columns
///
/// Neither backend accepts a row without columns, so such constraints are
/// decided at translation time: `Some(true)` meaning satisfied (the row is
/// dropped), `Some(false)` meaning violated (the problem is infeasible
/// regardless of the backend), `None` meaning the row has columns and is
/// passed through.
pub(crate) fn decide_constant_row(constraint: &Constraint) -> Option<bool> {
    if !constraint.expression().is_empty() {
        return None;
    }
    let tolerance = CONFIGURATION.read().unwrap().tolerance;
    let bound = constraint.bound();
    Some(match constraint.sense() {
        ComparisonSense::Leq => 0.0 <= bound + tolerance,
        ComparisonSense::Eq => bound.abs() <= tolerance,
        ComparisonSense::Geq => 0.0 >= bound - tolerance,
    })
}

/// Recompute the objective value from a name keyed value map
///
/// Backends report values per column; the objective value is rebuilt from
/// them so its sense and constant are always exact.
pub(crate) fn objective_value_from(objective: &Objective, values: &IndexMap<String, f64>) -> f64 {
    let expression = objective.expression();
    let total: f64 = expression
        .name_coefficients()
        .iter()
        .map(|(name, coefficient)| coefficient * values.get(name).copied().unwrap_or(0.0))
        .sum();
    total + expression.constant()
}
