//! Global configuration shared across the crate
use std::sync::{LazyLock, RwLock};

use crate::solve::cbc::CbcSolver;
use crate::solve::microlp::MicrolpSolver;
use crate::solve::Solver;

pub static CONFIGURATION: LazyLock<RwLock<Configuration>> =
    LazyLock::new(|| RwLock::new(Configuration::default()));

pub struct Configuration {
    /// Numeric tolerance used by feasibility diagnostics
    pub tolerance: f64,
    /// Backend used when a problem is solved without an explicit solver
    pub backend: Backend,
}

impl Default for Configuration {
    fn default() -> Self {
        Configuration {
            tolerance: 1e-07,
            backend: Backend::Microlp,
        }
    }
}

/// Enum used to specify which solver backend to use
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backend {
    /// Use the in-process microlp simplex and branch-and-bound library
    Microlp,
    /// Use an external CBC binary driven through LP files
    Cbc,
}

impl Backend {
    /// Construct the solver adapter for this backend
    pub fn create_solver(&self) -> Box<dyn Solver> {
        match self {
            Backend::Microlp => Box::new(MicrolpSolver::new()),
            Backend::Cbc => Box::new(CbcSolver::new()),
        }
    }
}
