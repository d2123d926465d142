//! Implements a solver interface for an external CBC binary
//!
//! The adapter serializes the model to an LP file in a scratch directory,
//! invokes the binary on it, and parses the solution file it writes back.
//! CBC is found on the PATH as `cbc` unless the `CBC_SOLVER_BIN` environment
//! variable points at an executable, or an explicit path is given with
//! [`CbcSolver::with_path`].
//!
//! This backend requires at least one decision variable, a model without any
//! fails validation with [`ProblemError::EmptyModel`].
use std::env;
use std::fs;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::sync::{Arc, RwLock};

use indexmap::IndexMap;

use crate::io::lp_write::{write_lp, LpWriteError};
use crate::model::problem::{Problem, ProblemError};
use crate::model::variable::Variable;
use crate::model::{Solution, SolutionStatus};
use crate::solve::{decide_constant_row, objective_value_from, Solver};

/// Environment variable overriding the CBC executable path
pub const CBC_BIN_ENV: &str = "CBC_SOLVER_BIN";

/// A solver backend driving an external CBC binary through LP files
pub struct CbcSolver {
    bin_path: PathBuf,
}

impl CbcSolver {
    /// Create a solver using the `CBC_SOLVER_BIN` override, or `cbc` on the
    /// PATH when the variable is unset
    pub fn new() -> Self {
        let bin_path = env::var_os(CBC_BIN_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("cbc"));
        CbcSolver { bin_path }
    }

    /// Create a solver using an explicit executable path
    pub fn with_path(bin_path: impl Into<PathBuf>) -> Self {
        CbcSolver {
            bin_path: bin_path.into(),
        }
    }

    /// The executable this solver will invoke
    pub fn bin_path(&self) -> &Path {
        &self.bin_path
    }

    /// Run the binary on an LP file, asking for a solution file
    fn invoke(&self, lp_path: &Path, solution_path: &Path) -> Result<(), String> {
        let status = Command::new(&self.bin_path)
            .arg(lp_path)
            .arg("branch")
            .arg("printingOptions")
            .arg("all")
            .arg("solution")
            .arg(solution_path)
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .map_err(|err| {
                format!("could not execute `{}`: {}", self.bin_path.display(), err)
            })?;
        if !status.success() {
            return Err(format!(
                "`{}` exited with {}",
                self.bin_path.display(),
                status
            ));
        }
        Ok(())
    }
}

impl Default for CbcSolver {
    fn default() -> Self {
        CbcSolver::new()
    }
}

impl Solver for CbcSolver {
    fn solve(&self, problem: &Problem) -> Result<Solution, ProblemError> {
        let registry = problem.validate()?;
        if registry.is_empty() {
            return Err(ProblemError::EmptyModel { backend: "cbc" });
        }
        for constraint in problem.constraints() {
            if decide_constant_row(constraint) == Some(false) {
                return Ok(Solution::infeasible());
            }
        }

        let scratch = match tempfile::tempdir() {
            Ok(scratch) => scratch,
            Err(err) => {
                return Ok(Solution::not_solved(format!(
                    "could not create scratch directory: {err}"
                )))
            }
        };
        let lp_path = scratch.path().join("problem.lp");
        let solution_path = scratch.path().join("solution.sol");

        let file = match fs::File::create(&lp_path) {
            Ok(file) => file,
            Err(err) => {
                return Ok(Solution::not_solved(format!(
                    "could not create LP file: {err}"
                )))
            }
        };
        let mut writer = BufWriter::new(file);
        match write_lp(problem, &mut writer) {
            Ok(()) => {}
            Err(LpWriteError::Model(err)) => return Err(err),
            Err(LpWriteError::Io(err)) => {
                return Ok(Solution::not_solved(format!(
                    "could not write LP file: {err}"
                )))
            }
        }
        if let Err(err) = writer.flush() {
            return Ok(Solution::not_solved(format!(
                "could not write LP file: {err}"
            )));
        }

        if let Err(diagnostic) = self.invoke(&lp_path, &solution_path) {
            return Ok(Solution::not_solved(diagnostic));
        }
        if !solution_path.exists() {
            return Ok(Solution::not_solved(
                "solver exited without writing a solution file",
            ));
        }

        let (status, token, values) = match read_solution(&solution_path, &registry) {
            Ok(parsed) => parsed,
            Err(diagnostic) => return Ok(Solution::not_solved(diagnostic)),
        };
        Ok(match status {
            SolutionStatus::Optimal => {
                let objective_value = problem
                    .objective()
                    .map(|objective| objective_value_from(objective, &values));
                Solution::optimal(objective_value, values)
            }
            SolutionStatus::Infeasible => Solution::infeasible(),
            SolutionStatus::Unbounded => Solution::unbounded(),
            SolutionStatus::NotSolved => {
                Solution::not_solved(format!("cbc reported status `{token}`"))
            }
        })
    }
}

/// Map the leading token of a CBC solution file onto the unified statuses
///
/// `Integer` marks an integer-infeasible model; anything unrecognized maps
/// to NotSolved.
fn map_status_token(token: &str) -> SolutionStatus {
    match token {
        "Optimal" => SolutionStatus::Optimal,
        "Infeasible" | "Integer" => SolutionStatus::Infeasible,
        "Unbounded" => SolutionStatus::Unbounded,
        _ => SolutionStatus::NotSolved,
    }
}

/// Parse a CBC solution file into a status and a name keyed value map
///
/// The first line starts with a status token; the remaining lines are
/// `index name value [reduced-cost]` records, with a leading `**` marker on
/// rows CBC flags as violated. Every model variable missing from the file
/// defaults to zero.
fn read_solution(
    path: &Path,
    registry: &IndexMap<String, Arc<RwLock<Variable>>>,
) -> Result<(SolutionStatus, String, IndexMap<String, f64>), String> {
    let content = fs::read_to_string(path)
        .map_err(|err| format!("could not read solution file: {err}"))?;
    let mut lines = content.lines();

    let status_line = lines.next().ok_or("solution file is empty")?;
    let token = status_line
        .split_whitespace()
        .next()
        .ok_or("solution file has a blank status line")?
        .to_string();
    let status = map_status_token(&token);

    let mut values: IndexMap<String, f64> = registry
        .keys()
        .map(|name| (name.clone(), 0.0))
        .collect();
    for line in lines {
        let mut tokens: Vec<&str> = line.split_whitespace().collect();
        if tokens.is_empty() {
            continue;
        }
        if tokens[0] == "**" {
            tokens.remove(0);
        }
        if tokens.len() < 3 {
            return Err(format!("malformed solution line `{line}`"));
        }
        let name = tokens[1];
        let value: f64 = tokens[2]
            .parse()
            .map_err(|_| format!("malformed value in solution line `{line}`"))?;
        if let Some(slot) = values.get_mut(name) {
            *slot = value;
        }
    }
    Ok((status, token, values))
}
