//! Implements a solver interface for the microlp library
//!
//! microlp runs in-process, so the adapter builds the native problem
//! directly: no intermediate file, the library's status and solution arrays
//! are read after the call returns.
//!
//! This backend requires at least one decision variable, a model without any
//! fails validation with [`ProblemError::EmptyModel`].
use indexmap::IndexMap;
use microlp::{ComparisonOp, OptimizationDirection};

use crate::model::constraint::ComparisonSense;
use crate::model::objective::ObjectiveSense;
use crate::model::problem::{Problem, ProblemError};
use crate::model::variable::VariableKind;
use crate::model::Solution;
use crate::solve::{decide_constant_row, Solver};

/// A solver backend calling the microlp library in-process
pub struct MicrolpSolver;

impl MicrolpSolver {
    /// Create a new microlp solver
    pub fn new() -> Self {
        MicrolpSolver
    }
}

impl Default for MicrolpSolver {
    fn default() -> Self {
        MicrolpSolver::new()
    }
}

impl Solver for MicrolpSolver {
    fn solve(&self, problem: &Problem) -> Result<Solution, ProblemError> {
        let registry = problem.validate()?;
        if registry.is_empty() {
            return Err(ProblemError::EmptyModel { backend: "microlp" });
        }
        for constraint in problem.constraints() {
            if decide_constant_row(constraint) == Some(false) {
                return Ok(Solution::infeasible());
            }
        }

        let direction = match problem.objective().map(|objective| objective.sense()) {
            Some(ObjectiveSense::Maximize) => OptimizationDirection::Maximize,
            // A feasibility-only problem minimizes a zero objective
            _ => OptimizationDirection::Minimize,
        };
        let objective_coefficients: IndexMap<String, f64> = problem
            .objective()
            .map(|objective| objective.expression().name_coefficients())
            .unwrap_or_default();

        let mut native = microlp::Problem::new(direction);
        let mut columns: IndexMap<String, microlp::Variable> = IndexMap::new();
        for (name, variable) in &registry {
            let variable = variable.read().unwrap();
            let objective_coefficient = objective_coefficients.get(name).copied().unwrap_or(0.0);
            let column = match variable.kind() {
                VariableKind::Continuous => native.add_var(
                    objective_coefficient,
                    (
                        variable.low_bound().unwrap_or(f64::NEG_INFINITY),
                        variable.up_bound().unwrap_or(f64::INFINITY),
                    ),
                ),
                VariableKind::Integer => native.add_integer_var(
                    objective_coefficient,
                    (
                        integer_low_bound(variable.low_bound()),
                        integer_up_bound(variable.up_bound()),
                    ),
                ),
                VariableKind::Binary => native.add_binary_var(objective_coefficient),
            };
            columns.insert(name.clone(), column);
        }

        for constraint in problem.constraints() {
            if constraint.expression().is_empty() {
                continue;
            }
            let row: Vec<(microlp::Variable, f64)> = constraint
                .expression()
                .name_coefficients()
                .into_iter()
                .map(|(name, coefficient)| (columns[&name], coefficient))
                .collect();
            let op = match constraint.sense() {
                ComparisonSense::Leq => ComparisonOp::Le,
                ComparisonSense::Eq => ComparisonOp::Eq,
                ComparisonSense::Geq => ComparisonOp::Ge,
            };
            native.add_constraint(row, op, constraint.bound());
        }

        match native.solve() {
            Ok(native_solution) => {
                let mut values = IndexMap::new();
                for (name, column) in &columns {
                    values.insert(name.clone(), *native_solution.var_value(*column));
                }
                // microlp models carry no constant term, so it is re-added;
                // the library already reports the objective in the caller's
                // direction
                let objective_value = problem
                    .objective()
                    .map(|objective| native_solution.objective() + objective.expression().constant());
                Ok(Solution::optimal(objective_value, values))
            }
            Err(microlp::Error::Infeasible) => Ok(Solution::infeasible()),
            Err(microlp::Error::Unbounded) => Ok(Solution::unbounded()),
            Err(microlp::Error::InternalError(message)) => Ok(Solution::not_solved(message)),
        }
    }
}

/// Translate an optional lower bound into microlp's integer bound
fn integer_low_bound(bound: Option<f64>) -> i32 {
    bound
        .map(|value| value.max(i32::MIN as f64).ceil() as i32)
        .unwrap_or(i32::MIN)
}

/// Translate an optional upper bound into microlp's integer bound
fn integer_up_bound(bound: Option<f64>) -> i32 {
    bound
        .map(|value| value.min(i32::MAX as f64).floor() as i32)
        .unwrap_or(i32::MAX)
}
