//! Core rust implementation of lpmod, a crate for building linear and mixed
//! integer programs and solving them through interchangeable backends.
//!
//! A model is assembled from shared [`model::variable::Variable`]s combined
//! into [`model::expression::Expression`]s, related by
//! [`model::constraint::Constraint`]s, optimized by an
//! [`model::objective::Objective`], and aggregated in a
//! [`model::problem::Problem`]. Solving goes through the
//! [`solve::Solver`] trait, implemented by the in-process
//! [`solve::microlp::MicrolpSolver`] and the file-driven
//! [`solve::cbc::CbcSolver`]. Models can be serialized to LP format and
//! JSON through [`io`].

pub mod configuration;
pub mod io;
pub mod model;
pub mod solve;

pub use model::constraint::{ComparisonSense, Constraint, ConstraintError};
pub use model::expression::Expression;
pub use model::objective::{EvaluationError, Objective, ObjectiveSense};
pub use model::problem::{Problem, ProblemError};
pub use model::variable::{Variable, VariableBuilder, VariableError, VariableKind};
pub use model::{Solution, SolutionStatus};
pub use solve::cbc::CbcSolver;
pub use solve::microlp::MicrolpSolver;
pub use solve::Solver;
