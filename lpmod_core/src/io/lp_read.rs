//! Parse CPLEX LP format text back into a problem
//!
//! The parser accepts the dialect [`crate::io::lp_write`] emits, tolerating
//! case differences, extra whitespace, wrapped rows and comment blocks. The
//! bound and kind sections are parsed before any expression, so every
//! variable is constructed exactly once with its final attributes.
use std::fs;
use std::io::Read;
use std::path::Path;
use std::str::FromStr;
use std::sync::{Arc, RwLock};

use indexmap::{IndexMap, IndexSet};
use thiserror::Error;

use crate::model::constraint::{ComparisonSense, Constraint, ConstraintError};
use crate::model::expression::Expression;
use crate::model::objective::{Objective, ObjectiveSense};
use crate::model::problem::Problem;
use crate::model::variable::{Variable, VariableError, VariableKind};

/// Parse a problem from LP format text
pub fn read_lp_str(source: &str) -> Result<Problem, LpParseError> {
    LpParser::new(source)?.into_problem()
}

/// Parse a problem from any reader producing LP format text
pub fn read_lp<R: Read>(mut reader: R) -> Result<Problem, LpParseError> {
    let mut source = String::new();
    reader.read_to_string(&mut source)?;
    read_lp_str(&source)
}

/// Parse a problem from an LP file on disk
pub fn read_lp_file<P: AsRef<Path>>(path: P) -> Result<Problem, LpParseError> {
    read_lp_str(&fs::read_to_string(path)?)
}

/// The sections of an LP document, gathered before any parsing
struct LpParser {
    name: String,
    sense: ObjectiveSense,
    objective_text: String,
    constraint_text: String,
    bound_lines: Vec<String>,
    general_names: IndexSet<String>,
    binary_names: IndexSet<String>,
    /// Variables constructed so far, keyed by name
    registry: IndexMap<String, Arc<RwLock<Variable>>>,
    /// Per-variable bounds gathered from the Bounds section
    bounds: IndexMap<String, (Option<f64>, Option<f64>)>,
}

/// The section of the document currently being gathered
#[derive(PartialEq)]
enum Section {
    Preamble,
    Objective,
    Constraints,
    Bounds,
    Generals,
    Binaries,
    Done,
}

impl LpParser {
    /// Split the source into sections, recording the problem name from the
    /// leading comment
    fn new(source: &str) -> Result<LpParser, LpParseError> {
        let name = first_comment(source).unwrap_or_else(|| "problem".to_string());
        let source = strip_comments(source);

        let mut sense = None;
        let mut section = Section::Preamble;
        let mut objective_lines: Vec<&str> = Vec::new();
        let mut constraint_lines: Vec<&str> = Vec::new();
        let mut bound_lines: Vec<String> = Vec::new();
        let mut general_names = IndexSet::new();
        let mut binary_names = IndexSet::new();

        for line in source.lines() {
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            match section_header(trimmed) {
                Some(Header::Objective(parsed_sense)) => {
                    sense = Some(parsed_sense);
                    section = Section::Objective;
                }
                Some(Header::Constraints) => section = Section::Constraints,
                Some(Header::Bounds) => section = Section::Bounds,
                Some(Header::Generals) => section = Section::Generals,
                Some(Header::Binaries) => section = Section::Binaries,
                Some(Header::End) => {
                    section = Section::Done;
                    break;
                }
                None => match section {
                    Section::Preamble => {
                        return Err(LpParseError::UnexpectedContent(trimmed.to_string()))
                    }
                    Section::Objective => objective_lines.push(trimmed),
                    Section::Constraints => constraint_lines.push(trimmed),
                    Section::Bounds => bound_lines.push(trimmed.to_string()),
                    Section::Generals => {
                        general_names.extend(trimmed.split_whitespace().map(str::to_string))
                    }
                    Section::Binaries => {
                        binary_names.extend(trimmed.split_whitespace().map(str::to_string))
                    }
                    Section::Done => {}
                },
            }
        }

        let sense = sense.ok_or(LpParseError::MissingObjective)?;
        Ok(LpParser {
            name,
            sense,
            objective_text: objective_lines.join(" "),
            constraint_text: constraint_lines.join(" "),
            bound_lines,
            general_names,
            binary_names,
            registry: IndexMap::new(),
            bounds: IndexMap::new(),
        })
    }

    /// Parse the gathered sections into a problem
    fn into_problem(mut self) -> Result<Problem, LpParseError> {
        for line in std::mem::take(&mut self.bound_lines) {
            let tokens: Vec<&str> = line.split_whitespace().collect();
            let (name, bounds) = parse_bound_line(&tokens)
                .ok_or_else(|| LpParseError::MalformedBound(line.clone()))?;
            self.bounds.insert(name, bounds);
        }

        let objective = self.parse_objective()?;
        let constraints = self.parse_constraints()?;
        Ok(Problem::with_parts(&self.name, Some(objective), constraints))
    }

    fn parse_objective(&mut self) -> Result<Objective, LpParseError> {
        let mut tokens: Vec<String> = self
            .objective_text
            .split_whitespace()
            .map(str::to_string)
            .collect();
        // The objective label is optional and not kept
        if tokens.first().map(|token| token.ends_with(':')) == Some(true) {
            tokens.remove(0);
        }
        let expression = self.parse_expression(&tokens)?;
        Ok(Objective::new(expression, self.sense))
    }

    fn parse_constraints(&mut self) -> Result<Vec<Constraint>, LpParseError> {
        let tokens: Vec<String> = self
            .constraint_text
            .split_whitespace()
            .map(str::to_string)
            .collect();

        // Rows are delimited by their `label:` tokens
        let mut rows: Vec<(String, Vec<String>)> = Vec::new();
        for token in tokens {
            if token.ends_with(':') && token.len() > 1 {
                let label = token.trim_end_matches(':').to_string();
                rows.push((label, Vec::new()));
            } else if let Some((_, row_tokens)) = rows.last_mut() {
                row_tokens.push(token);
            } else {
                return Err(LpParseError::MalformedRow(token));
            }
        }

        let mut constraints = Vec::new();
        for (label, row_tokens) in rows {
            constraints.push(self.parse_row(&label, &row_tokens)?);
        }
        Ok(constraints)
    }

    fn parse_row(&mut self, label: &str, tokens: &[String]) -> Result<Constraint, LpParseError> {
        let sense_position = tokens
            .iter()
            .position(|token| matches!(token.as_str(), "<=" | "=<" | "<" | ">=" | "=>" | ">" | "="))
            .ok_or_else(|| LpParseError::MalformedRow(tokens.join(" ")))?;
        let sense = ComparisonSense::from_str(&tokens[sense_position])?;
        let lhs = self.parse_expression(&tokens[..sense_position])?;
        let rhs = self.parse_expression(&tokens[sense_position + 1..])?;
        Ok(Constraint::with_name(label, lhs, sense, rhs))
    }

    /// Parse whitespace-separated expression tokens like `3 x + 2 y - 5`
    fn parse_expression<T: AsRef<str>>(
        &mut self,
        tokens: &[T],
    ) -> Result<Expression, LpParseError> {
        let mut coefficients: IndexMap<String, f64> = IndexMap::new();
        let mut constant = 0.0;
        let mut sign = 1.0;
        let mut group: Vec<&str> = Vec::new();

        let mut flush =
            |group: &mut Vec<&str>, sign: f64| -> Result<(), LpParseError> {
                match group.as_slice() {
                    [] => {}
                    [token] => match split_term(token)? {
                        (Some(number), None) => constant += sign * number,
                        (None, Some(name)) => {
                            *coefficients.entry(name).or_insert(0.0) += sign;
                        }
                        (Some(number), Some(name)) => {
                            *coefficients.entry(name).or_insert(0.0) += sign * number;
                        }
                        (None, None) => {
                            return Err(LpParseError::MalformedTerm(token.to_string()))
                        }
                    },
                    [number, name] => {
                        let number: f64 = number
                            .parse()
                            .map_err(|_| LpParseError::MalformedTerm(group.join(" ")))?;
                        let name = valid_name(name)
                            .ok_or_else(|| LpParseError::MalformedTerm(group.join(" ")))?;
                        *coefficients.entry(name).or_insert(0.0) += sign * number;
                    }
                    _ => return Err(LpParseError::MalformedTerm(group.join(" "))),
                }
                group.clear();
                Ok(())
            };

        for token in tokens {
            match token.as_ref() {
                "+" => {
                    flush(&mut group, sign)?;
                    sign = 1.0;
                }
                "-" => {
                    flush(&mut group, sign)?;
                    sign = -1.0;
                }
                other => group.push(other),
            }
        }
        flush(&mut group, sign)?;
        drop(flush);

        let mut terms = Vec::new();
        for (name, coefficient) in coefficients {
            terms.push((self.variable(&name)?, coefficient));
        }
        Ok(Expression::from_terms(terms, constant))
    }

    /// Fetch or create the variable for `name`, applying the bounds and kind
    /// sections gathered earlier
    fn variable(&mut self, name: &str) -> Result<Arc<RwLock<Variable>>, LpParseError> {
        if let Some(existing) = self.registry.get(name) {
            return Ok(existing.clone());
        }
        let kind = if self.binary_names.contains(name) {
            VariableKind::Binary
        } else if self.general_names.contains(name) {
            VariableKind::Integer
        } else {
            VariableKind::Continuous
        };
        // LP default bounds are zero to unbounded above
        let (low, up) = self
            .bounds
            .get(name)
            .copied()
            .unwrap_or((Some(0.0), None));
        let variable = Variable::new(name, kind, low, up)?.wrap();
        self.registry.insert(name.to_string(), variable.clone());
        Ok(variable)
    }
}

/// The recognized section headers
enum Header {
    Objective(ObjectiveSense),
    Constraints,
    Bounds,
    Generals,
    Binaries,
    End,
}

/// Classify a line as a section header, if it is one
fn section_header(line: &str) -> Option<Header> {
    match line.to_ascii_lowercase().as_str() {
        "maximize" | "maximise" | "max" => Some(Header::Objective(ObjectiveSense::Maximize)),
        "minimize" | "minimise" | "min" => Some(Header::Objective(ObjectiveSense::Minimize)),
        "subject to" | "such that" | "st" | "s.t." => Some(Header::Constraints),
        "bounds" | "bound" => Some(Header::Bounds),
        "generals" | "general" | "integers" | "integer" => Some(Header::Generals),
        "binaries" | "binary" | "bin" => Some(Header::Binaries),
        "end" => Some(Header::End),
        _ => None,
    }
}

/// Extract the text of the first `\* ... *\` comment
fn first_comment(source: &str) -> Option<String> {
    let start = source.find("\\*")?;
    let end = source[start + 2..].find("*\\")?;
    let comment = source[start + 2..start + 2 + end].trim();
    if comment.is_empty() {
        None
    } else {
        Some(comment.to_string())
    }
}

/// Remove every `\* ... *\` comment block
fn strip_comments(source: &str) -> String {
    let mut remaining = source;
    let mut stripped = String::with_capacity(source.len());
    while let Some(start) = remaining.find("\\*") {
        stripped.push_str(&remaining[..start]);
        match remaining[start + 2..].find("*\\") {
            Some(end) => remaining = &remaining[start + 2 + end + 2..],
            None => return stripped,
        }
    }
    stripped.push_str(remaining);
    stripped
}

/// Split a glued term like `3x` into its numeric prefix and variable name
///
/// Returns `(number, name)` where either side may be absent.
fn split_term(token: &str) -> Result<(Option<f64>, Option<String>), LpParseError> {
    if let Ok(number) = token.parse::<f64>() {
        return Ok((Some(number), None));
    }
    let split = token
        .char_indices()
        .find(|(_, c)| !c.is_ascii_digit() && *c != '.')
        .map(|(index, _)| index)
        .unwrap_or(token.len());
    let (prefix, rest) = token.split_at(split);
    let name =
        valid_name(rest).ok_or_else(|| LpParseError::MalformedTerm(token.to_string()))?;
    if prefix.is_empty() {
        Ok((None, Some(name)))
    } else {
        let number = prefix
            .parse::<f64>()
            .map_err(|_| LpParseError::MalformedTerm(token.to_string()))?;
        Ok((Some(number), Some(name)))
    }
}

/// Validate a variable name, which must not begin with a digit or period
fn valid_name(token: &str) -> Option<String> {
    let first = token.chars().next()?;
    if first.is_ascii_digit() || first == '.' {
        return None;
    }
    if token.contains(':') {
        return None;
    }
    Some(token.to_string())
}

/// Parse a single Bounds line into `(name, (low, up))`
fn parse_bound_line(tokens: &[&str]) -> Option<(String, (Option<f64>, Option<f64>))> {
    match tokens {
        [name, word] if word.eq_ignore_ascii_case("free") => {
            Some((valid_name(name)?, (None, None)))
        }
        [name, "=", value] => {
            let value = value.parse::<f64>().ok()?;
            Some((valid_name(name)?, (Some(value), Some(value))))
        }
        [low, first, name, second, up]
            if is_leq_symbol(first) && is_leq_symbol(second) =>
        {
            Some((
                valid_name(name)?,
                (parse_low_bound(low)?, parse_up_bound(up)?),
            ))
        }
        [left, symbol, right] if is_leq_symbol(symbol) => {
            if let Some(low) = parse_low_bound(left) {
                // `2 <= x`
                Some((valid_name(right)?, (low, None)))
            } else {
                // `x <= 10`, lower bound stays at the default zero
                Some((valid_name(left)?, (Some(0.0), parse_up_bound(right)?)))
            }
        }
        [left, symbol, right] if is_geq_symbol(symbol) => {
            if let Ok(low) = right.parse::<f64>() {
                // `x >= 2`
                Some((valid_name(left)?, (Some(low), None)))
            } else {
                // `10 >= x`
                Some((valid_name(right)?, (Some(0.0), Some(left.parse().ok()?))))
            }
        }
        _ => None,
    }
}

fn is_leq_symbol(token: &str) -> bool {
    matches!(token, "<=" | "=<" | "<")
}

fn is_geq_symbol(token: &str) -> bool {
    matches!(token, ">=" | "=>" | ">")
}

/// Parse the left side of a bounds line, `-inf` meaning unbounded below
///
/// Returns None when the token is not numeric at all.
fn parse_low_bound(token: &str) -> Option<Option<f64>> {
    match token.to_ascii_lowercase().as_str() {
        "-inf" | "-infinity" => Some(None),
        _ => token.parse::<f64>().ok().map(Some),
    }
}

/// Parse the right side of a bounds line, `inf` meaning unbounded above
fn parse_up_bound(token: &str) -> Option<Option<f64>> {
    match token.to_ascii_lowercase().as_str() {
        "inf" | "+inf" | "infinity" | "+infinity" => Some(None),
        _ => token.parse::<f64>().ok().map(Some),
    }
}

/// Errors raised while parsing LP format
#[derive(Error, Debug)]
pub enum LpParseError {
    /// The underlying reader failed
    #[error("could not read LP file: {0}")]
    Io(#[from] std::io::Error),
    /// No objective sense header was found
    #[error("no objective section found, expected a Maximize or Minimize header")]
    MissingObjective,
    /// Content appeared before the first section header
    #[error("unexpected content before the first section header: `{0}`")]
    UnexpectedContent(String),
    /// A term could not be parsed
    #[error("malformed term `{0}`")]
    MalformedTerm(String),
    /// A constraint row could not be parsed
    #[error("malformed constraint row `{0}`")]
    MalformedRow(String),
    /// A bounds line could not be parsed
    #[error("malformed bounds line `{0}`")]
    MalformedBound(String),
    /// A row used an unrecognized comparison sense
    #[error(transparent)]
    InvalidSense(#[from] ConstraintError),
    /// A variable declaration was inconsistent
    #[error(transparent)]
    InvalidVariable(#[from] VariableError),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::lp_write::write_lp;
    use crate::model::objective::ObjectiveSense;

    #[test]
    fn parse_small_document() {
        let text = "\\* diet *\\\n\
                    Maximize\n\
                    OBJ: 3 x + 2 y\n\
                    Subject To\n\
                    capacity: 2.5 x + y <= 12\n\
                    Bounds\n\
                    1 <= x <= 3.5\n\
                    2 <= y <= 4\n\
                    End\n";
        let problem = read_lp_str(text).unwrap();
        assert_eq!(problem.name(), "diet");

        let objective = problem.objective().unwrap();
        assert_eq!(objective.sense(), ObjectiveSense::Maximize);
        let coefficients = objective.expression().name_coefficients();
        assert!((coefficients["x"] - 3.0).abs() < 1e-12);
        assert!((coefficients["y"] - 2.0).abs() < 1e-12);

        assert_eq!(problem.constraints().len(), 1);
        let row = &problem.constraints()[0];
        assert_eq!(row.name(), Some("capacity"));
        assert_eq!(row.sense(), ComparisonSense::Leq);
        assert!((row.bound() - 12.0).abs() < 1e-12);

        let registry = problem.validate().unwrap();
        let x = registry.get("x").unwrap().read().unwrap().low_bound();
        assert_eq!(x, Some(1.0));
    }

    #[test]
    fn parse_wrapped_row() {
        let text = "Minimize\n\
                    OBJ: x\n\
                    Subject To\n\
                    wide: x + y\n\
                    + z <= 4\n\
                    End\n";
        let problem = read_lp_str(text).unwrap();
        let row = &problem.constraints()[0];
        assert_eq!(row.expression().terms().len(), 3);
    }

    #[test]
    fn parse_glued_coefficients() {
        let text = "Minimize\n\
                    OBJ: 3x + 4y - 5\n\
                    Subject To\n\
                    r1: 2x >= 1\n\
                    End\n";
        let problem = read_lp_str(text).unwrap();
        let coefficients = problem.objective().unwrap().expression().name_coefficients();
        assert!((coefficients["x"] - 3.0).abs() < 1e-12);
        assert!((coefficients["y"] - 4.0).abs() < 1e-12);
        assert!((problem.objective().unwrap().expression().constant() - (-5.0)).abs() < 1e-12);
    }

    #[test]
    fn parse_bound_forms() {
        let text = "Minimize\n\
                    OBJ: a + b + c + d + e\n\
                    Subject To\n\
                    r1: a + b + c + d + e >= 1\n\
                    Bounds\n\
                    a free\n\
                    b = 2.5\n\
                    -inf <= c <= 7\n\
                    3 <= d\n\
                    e <= 9\n\
                    End\n";
        let problem = read_lp_str(text).unwrap();
        let registry = problem.validate().unwrap();
        let bounds = |name: &str| {
            let var = registry.get(name).unwrap();
            let var = var.read().unwrap();
            (var.low_bound(), var.up_bound())
        };
        assert_eq!(bounds("a"), (None, None));
        assert_eq!(bounds("b"), (Some(2.5), Some(2.5)));
        assert_eq!(bounds("c"), (None, Some(7.0)));
        assert_eq!(bounds("d"), (Some(3.0), None));
        assert_eq!(bounds("e"), (Some(0.0), Some(9.0)));
    }

    #[test]
    fn parse_kind_sections() {
        let text = "Minimize\n\
                    OBJ: n + z + x\n\
                    Subject To\n\
                    r1: n + z + x >= 1\n\
                    Generals\n\
                    n\n\
                    Binaries\n\
                    z\n\
                    End\n";
        let problem = read_lp_str(text).unwrap();
        let registry = problem.validate().unwrap();
        let kind = |name: &str| registry.get(name).unwrap().read().unwrap().kind();
        assert_eq!(kind("n"), VariableKind::Integer);
        assert_eq!(kind("z"), VariableKind::Binary);
        assert_eq!(kind("x"), VariableKind::Continuous);
    }

    #[test]
    fn round_trip_bounds_and_kinds() {
        use crate::model::constraint::Constraint;
        use crate::model::objective::Objective;
        use crate::model::problem::Problem;

        let x = Variable::new("x", VariableKind::Continuous, Some(1.0), Some(3.5))
            .unwrap()
            .wrap();
        let free = Variable::new("w", VariableKind::Continuous, None, None)
            .unwrap()
            .wrap();
        let n = Variable::new("n", VariableKind::Integer, Some(-2.0), Some(9.0))
            .unwrap()
            .wrap();
        let z = Variable::new("z", VariableKind::Binary, None, None)
            .unwrap()
            .wrap();
        let mut problem = Problem::new("round_trip");
        problem.set_objective(Objective::maximize(Expression::new(
            &[x.clone(), free.clone(), n.clone(), z.clone()],
            &[3.0, 1.0, 2.0, 5.0],
            0.0,
        )));
        problem.add_constraint(Constraint::with_name(
            "cap",
            Expression::new(&[x.clone(), n.clone()], &[2.5, 1.0], 0.0),
            ComparisonSense::Leq,
            Expression::from_constant(12.0),
        ));

        let mut buffer = Vec::new();
        write_lp(&problem, &mut buffer).unwrap();
        let reread = read_lp_str(&String::from_utf8(buffer).unwrap()).unwrap();

        let original = problem.validate().unwrap();
        let parsed = reread.validate().unwrap();
        assert_eq!(original.len(), parsed.len());
        for (name, variable) in &original {
            let variable = variable.read().unwrap();
            let copy = parsed.get(name).unwrap();
            let copy = copy.read().unwrap();
            assert_eq!(variable.kind(), copy.kind(), "kind mismatch for {name}");
            assert_eq!(
                variable.low_bound(),
                copy.low_bound(),
                "low bound mismatch for {name}"
            );
            assert_eq!(
                variable.up_bound(),
                copy.up_bound(),
                "up bound mismatch for {name}"
            );
        }

        // The canonical row survives as well
        let row = &reread.constraints()[0];
        assert_eq!(row.sense(), ComparisonSense::Leq);
        assert!((row.bound() - 12.0).abs() < 1e-12);
        let coefficients = row.expression().name_coefficients();
        assert!((coefficients["x"] - 2.5).abs() < 1e-12);
        assert!((coefficients["n"] - 1.0).abs() < 1e-12);
    }

    #[test]
    fn missing_objective_rejected() {
        let text = "Subject To\nr1: x >= 1\nEnd\n";
        assert!(matches!(
            read_lp_str(text),
            Err(LpParseError::MissingObjective)
        ));
    }

    #[test]
    fn malformed_row_rejected() {
        let text = "Minimize\nOBJ: x\nSubject To\nr1: x 4\nEnd\n";
        assert!(matches!(
            read_lp_str(text),
            Err(LpParseError::MalformedRow(_))
        ));
    }

    #[test]
    fn malformed_bound_rejected() {
        let text = "Minimize\nOBJ: x\nSubject To\nr1: x >= 1\nBounds\nwhat even\nEnd\n";
        assert!(matches!(
            read_lp_str(text),
            Err(LpParseError::MalformedBound(_))
        ));
    }

    #[test]
    fn crossed_file_bounds_rejected() {
        let text = "Minimize\nOBJ: x\nSubject To\nr1: x >= 1\nBounds\n5 <= x <= 1\nEnd\n";
        assert!(matches!(
            read_lp_str(text),
            Err(LpParseError::InvalidVariable(
                VariableError::InvalidBounds { .. }
            ))
        ));
    }
}
