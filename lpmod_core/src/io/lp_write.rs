//! Serialize a problem into CPLEX LP format text
use std::io::Write;

use thiserror::Error;

use crate::model::expression::Expression;
use crate::model::objective::ObjectiveSense;
use crate::model::problem::{Problem, ProblemError};
use crate::model::variable::{Variable, VariableKind};

/// Maximum width of a line before terms wrap onto a continuation line
const MAX_LINE_LENGTH: usize = 80;

/// Write `problem` in LP format
///
/// Sections are emitted in fixed order: a header comment with the problem
/// name, the objective sense and row, `Subject To` with one row per
/// constraint in declaration order, `Bounds` for every variable that is not
/// the default zero-to-unbounded, `Generals` and `Binaries` kind
/// declarations, then `End`.
///
/// Rows use the canonical form, so all variable terms sit on the left of
/// the sense and a plain numeric bound on the right. A constraint whose
/// canonical form has no variable terms is skipped, the format cannot
/// express a row without columns; the solver adapters decide such rows
/// before invoking a backend.
///
/// # Examples
/// ```rust
/// use lpmod_core::io::lp_write::write_lp;
/// use lpmod_core::model::expression::Expression;
/// use lpmod_core::model::objective::Objective;
/// use lpmod_core::model::problem::Problem;
/// use lpmod_core::model::variable::{Variable, VariableKind};
/// let x = Variable::new("x", VariableKind::Continuous, Some(0.0), None)
///     .unwrap()
///     .wrap();
/// let mut problem = Problem::new("tiny");
/// problem.set_objective(Objective::minimize(Expression::from_variable(x)));
/// let mut buffer = Vec::new();
/// write_lp(&problem, &mut buffer).unwrap();
/// assert!(String::from_utf8(buffer).unwrap().contains("Minimize"));
/// ```
pub fn write_lp<W: Write>(problem: &Problem, buffer: &mut W) -> Result<(), LpWriteError> {
    let registry = problem.validate()?;

    writeln!(buffer, "\\* {} *\\", problem.name())?;

    let sense = problem
        .objective()
        .map(|objective| objective.sense())
        .unwrap_or(ObjectiveSense::Minimize);
    match sense {
        ObjectiveSense::Minimize => writeln!(buffer, "Minimize")?,
        ObjectiveSense::Maximize => writeln!(buffer, "Maximize")?,
    }

    let objective_terms = match problem.objective() {
        Some(objective) => expression_terms(objective.expression()),
        None => vec!["0".to_string()],
    };
    write_row(buffer, "OBJ", &objective_terms)?;

    writeln!(buffer, "Subject To")?;
    for (index, constraint) in problem.constraints().iter().enumerate() {
        if constraint.expression().is_empty() {
            continue;
        }
        let fallback = format!("c{}", index + 1);
        let label = constraint.name().unwrap_or(&fallback);
        let mut terms = expression_terms(constraint.expression());
        terms.push(constraint.sense().to_string());
        terms.push(format_number(constraint.bound()));
        write_row(buffer, label, &terms)?;
    }

    let mut variables: Vec<_> = registry.values().cloned().collect();
    variables.sort_by_key(|variable| variable.read().unwrap().name().to_string());

    let bounded: Vec<_> = variables
        .iter()
        .filter(|variable| !variable.read().unwrap().is_positive_free())
        .collect();
    if !bounded.is_empty() {
        writeln!(buffer, "Bounds")?;
        for variable in bounded {
            writeln!(buffer, "{}", bound_line(&variable.read().unwrap()))?;
        }
    }

    write_kind_section(buffer, "Generals", &variables, VariableKind::Integer)?;
    write_kind_section(buffer, "Binaries", &variables, VariableKind::Binary)?;

    writeln!(buffer, "End")?;
    Ok(())
}

/// Write a labelled row, wrapping terms over continuation lines
fn write_row<W: Write>(buffer: &mut W, label: &str, terms: &[String]) -> Result<(), LpWriteError> {
    let mut pieces = vec![format!("{}:", label)];
    pieces.extend(terms.iter().cloned());
    for line in group_terms(&pieces, MAX_LINE_LENGTH) {
        writeln!(buffer, "{}", line)?;
    }
    Ok(())
}

/// Group terms into lines, each no wider than `max_line_length`
fn group_terms(terms: &[String], max_line_length: usize) -> Vec<String> {
    let mut lines = Vec::new();
    let mut line: Vec<&str> = Vec::new();
    let mut line_length = 0;
    for term in terms {
        if !line.is_empty() && line_length + term.len() >= max_line_length {
            lines.push(line.join(" "));
            line = Vec::new();
            line_length = 0;
        }
        line_length += term.len() + 1;
        line.push(term.as_str());
    }
    if !line.is_empty() {
        lines.push(line.join(" "));
    }
    lines
}

/// Render an expression as LP terms, sorted by variable name
///
/// Distinct variable objects sharing a name are one backend column, so
/// their coefficients are summed before rendering.
fn expression_terms(expression: &Expression) -> Vec<String> {
    let mut coefficients: Vec<(String, f64)> = expression
        .name_coefficients()
        .into_iter()
        .filter(|(_, coefficient)| *coefficient != 0.0)
        .collect();
    coefficients.sort_by(|left, right| left.0.cmp(&right.0));

    let mut terms = Vec::new();
    for (index, (name, coefficient)) in coefficients.iter().enumerate() {
        terms.push(format_term(name, *coefficient, index == 0));
    }

    let constant = expression.constant();
    if constant < 0.0 {
        terms.push(format!("- {}", format_number(-constant)));
    } else if constant > 0.0 {
        terms.push(format!("+ {}", format_number(constant)));
    } else if terms.is_empty() {
        terms.push("0".to_string());
    }
    terms
}

/// Render a single `coefficient * name` term
fn format_term(name: &str, coefficient: f64, is_first: bool) -> String {
    let sign = if coefficient < 0.0 {
        "- "
    } else if is_first {
        ""
    } else {
        "+ "
    };
    let magnitude = coefficient.abs();
    if magnitude == 1.0 {
        format!("{}{}", sign, name)
    } else {
        format!("{}{} {}", sign, format_number(magnitude), name)
    }
}

/// Render the Bounds line for a variable
fn bound_line(variable: &Variable) -> String {
    if variable.is_free() {
        return format!("{} free", variable.name());
    }
    if variable.is_fixed() {
        return format!(
            "{} = {}",
            variable.name(),
            format_number(variable.low_bound().unwrap())
        );
    }

    let lhs = match variable.low_bound() {
        None => "-inf <= ".to_string(),
        Some(low) if low == 0.0 && variable.kind() == VariableKind::Continuous => String::new(),
        Some(low) => format!("{} <= ", format_number(low)),
    };
    let rhs = match variable.up_bound() {
        Some(up) => format!(" <= {}", format_number(up)),
        None => String::new(),
    };
    format!("{}{}{}", lhs, variable.name(), rhs)
}

/// Write a Generals or Binaries section listing variables of `kind`
fn write_kind_section<W: Write>(
    buffer: &mut W,
    header: &str,
    variables: &[std::sync::Arc<std::sync::RwLock<Variable>>],
    kind: VariableKind,
) -> Result<(), LpWriteError> {
    let names: Vec<String> = variables
        .iter()
        .filter(|variable| variable.read().unwrap().kind() == kind)
        .map(|variable| variable.read().unwrap().name().to_string())
        .collect();
    if names.is_empty() {
        return Ok(());
    }
    writeln!(buffer, "{}", header)?;
    for name in names {
        writeln!(buffer, "{}", name)?;
    }
    Ok(())
}

/// Render a number with Rust's shortest round-trip formatting
fn format_number(value: f64) -> String {
    value.to_string()
}

/// Errors raised while writing LP format
#[derive(Error, Debug)]
pub enum LpWriteError {
    /// The underlying writer failed
    #[error("could not write LP file: {0}")]
    Io(#[from] std::io::Error),
    /// The problem failed validation before serialization
    #[error(transparent)]
    Model(#[from] ProblemError),
}
