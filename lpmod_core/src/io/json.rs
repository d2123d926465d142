//! Module providing JSON IO for problems
use std::fs;
use std::path::Path;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::constraint::{ComparisonSense, Constraint};
use crate::model::expression::Expression;
use crate::model::objective::{Objective, ObjectiveSense};
use crate::model::problem::{Problem, ProblemError};
use crate::model::variable::{Variable, VariableError, VariableKind};

// region JSON document

/// A JSON serialized problem, used for reading and writing models in JSON
/// format
///
/// Constraints are stored in canonical form, variable terms against a plain
/// numeric bound, which re-canonicalizes to the same triple when read back.
#[derive(Serialize, Deserialize)]
struct JsonProblem {
    name: String,
    variables: Vec<JsonVariable>,
    constraints: Vec<JsonConstraint>,
    objective: Option<JsonObjective>,
}

#[derive(Serialize, Deserialize)]
struct JsonVariable {
    name: String,
    low_bound: Option<f64>,
    up_bound: Option<f64>,
    kind: VariableKind,
}

#[derive(Serialize, Deserialize)]
struct JsonTerm {
    variable: String,
    coefficient: f64,
}

#[derive(Serialize, Deserialize)]
struct JsonConstraint {
    name: Option<String>,
    terms: Vec<JsonTerm>,
    sense: ComparisonSense,
    bound: f64,
}

#[derive(Serialize, Deserialize)]
struct JsonObjective {
    sense: ObjectiveSense,
    terms: Vec<JsonTerm>,
    constant: f64,
}

// endregion JSON document

// region Writing

/// Serialize a problem to a JSON string
pub fn problem_to_json_string(problem: &Problem) -> Result<String, JsonIoError> {
    let document = to_document(problem)?;
    Ok(serde_json::to_string_pretty(&document)?)
}

/// Write a problem to a JSON file
pub fn write_json_file<P: AsRef<Path>>(problem: &Problem, path: P) -> Result<(), JsonIoError> {
    let text = problem_to_json_string(problem)?;
    fs::write(path, text)?;
    Ok(())
}

fn to_document(problem: &Problem) -> Result<JsonProblem, JsonIoError> {
    let registry = problem.validate()?;
    let variables = registry
        .values()
        .map(|variable| {
            let variable = variable.read().unwrap();
            JsonVariable {
                name: variable.name().to_string(),
                low_bound: variable.low_bound(),
                up_bound: variable.up_bound(),
                kind: variable.kind(),
            }
        })
        .collect();
    let constraints = problem
        .constraints()
        .iter()
        .map(|constraint| JsonConstraint {
            name: constraint.name().map(str::to_string),
            terms: to_terms(constraint.expression().name_coefficients()),
            sense: constraint.sense(),
            bound: constraint.bound(),
        })
        .collect();
    let objective = problem.objective().map(|objective| JsonObjective {
        sense: objective.sense(),
        terms: to_terms(objective.expression().name_coefficients()),
        constant: objective.expression().constant(),
    });
    Ok(JsonProblem {
        name: problem.name().to_string(),
        variables,
        constraints,
        objective,
    })
}

fn to_terms(coefficients: IndexMap<String, f64>) -> Vec<JsonTerm> {
    coefficients
        .into_iter()
        .map(|(variable, coefficient)| JsonTerm {
            variable,
            coefficient,
        })
        .collect()
}

// endregion Writing

// region Reading

/// Parse a problem from a JSON string
pub fn problem_from_json_str(source: &str) -> Result<Problem, JsonIoError> {
    from_document(serde_json::from_str(source)?)
}

/// Read a problem from a JSON file
pub fn read_json_file<P: AsRef<Path>>(path: P) -> Result<Problem, JsonIoError> {
    problem_from_json_str(&fs::read_to_string(path)?)
}

fn from_document(document: JsonProblem) -> Result<Problem, JsonIoError> {
    let mut registry = IndexMap::new();
    for variable in &document.variables {
        if registry.contains_key(&variable.name) {
            return Err(JsonIoError::DuplicateVariable(variable.name.clone()));
        }
        let built = Variable::new(
            &variable.name,
            variable.kind,
            variable.low_bound,
            variable.up_bound,
        )?
        .wrap();
        registry.insert(variable.name.clone(), built);
    }

    let expression = |terms: &[JsonTerm]| -> Result<Expression, JsonIoError> {
        let mut pairs = Vec::with_capacity(terms.len());
        for term in terms {
            let variable = registry
                .get(&term.variable)
                .ok_or_else(|| JsonIoError::UnknownVariable(term.variable.clone()))?;
            pairs.push((variable.clone(), term.coefficient));
        }
        Ok(Expression::from_terms(pairs, 0.0))
    };

    let mut constraints = Vec::with_capacity(document.constraints.len());
    for row in &document.constraints {
        let lhs = expression(&row.terms)?;
        let rhs = Expression::from_constant(row.bound);
        constraints.push(match &row.name {
            Some(name) => Constraint::with_name(name, lhs, row.sense, rhs),
            None => Constraint::new(lhs, row.sense, rhs),
        });
    }

    let objective = match &document.objective {
        Some(objective) => Some(Objective::new(
            expression(&objective.terms)?.add_constant(objective.constant),
            objective.sense,
        )),
        None => None,
    };

    Ok(Problem::with_parts(&document.name, objective, constraints))
}

// endregion Reading

/// Errors raised by JSON problem IO
#[derive(Error, Debug)]
pub enum JsonIoError {
    /// The file could not be read or written
    #[error("could not read or write JSON file: {0}")]
    Io(#[from] std::io::Error),
    /// The document was not valid JSON for a problem
    #[error("could not deserialize JSON problem: {0}")]
    Serde(#[from] serde_json::Error),
    /// The problem failed validation before serialization
    #[error(transparent)]
    Model(#[from] ProblemError),
    /// A variable declaration in the document was inconsistent
    #[error(transparent)]
    Variable(#[from] VariableError),
    /// A term referenced a variable missing from the declarations
    #[error("term references undeclared variable `{0}`")]
    UnknownVariable(String),
    /// Two variable declarations share a name
    #[error("variable `{0}` is declared twice")]
    DuplicateVariable(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_problem() -> Problem {
        let x = Variable::new("x", VariableKind::Continuous, Some(1.0), Some(3.5))
            .unwrap()
            .wrap();
        let n = Variable::new("n", VariableKind::Integer, Some(0.0), Some(9.0))
            .unwrap()
            .wrap();
        let mut problem = Problem::new("sample");
        problem.set_objective(Objective::maximize(Expression::new(
            &[x.clone(), n.clone()],
            &[3.0, 2.0],
            1.5,
        )));
        problem.add_constraint(Constraint::with_name(
            "cap",
            Expression::new(&[x.clone(), n.clone()], &[2.5, 1.0], 0.0),
            ComparisonSense::Leq,
            Expression::from_constant(12.0),
        ));
        problem
    }

    #[test]
    fn round_trip_through_string() {
        let problem = sample_problem();
        let text = problem_to_json_string(&problem).unwrap();
        let reread = problem_from_json_str(&text).unwrap();

        assert_eq!(reread.name(), "sample");
        let registry = reread.validate().unwrap();
        assert_eq!(registry.len(), 2);
        {
            let n = registry.get("n").unwrap();
            let n = n.read().unwrap();
            assert_eq!(n.kind(), VariableKind::Integer);
            assert_eq!(n.up_bound(), Some(9.0));
        }

        let row = &reread.constraints()[0];
        assert_eq!(row.name(), Some("cap"));
        assert_eq!(row.sense(), ComparisonSense::Leq);
        assert!((row.bound() - 12.0).abs() < 1e-12);

        let objective = reread.objective().unwrap();
        assert_eq!(objective.sense(), ObjectiveSense::Maximize);
        assert!((objective.expression().constant() - 1.5).abs() < 1e-12);
        let coefficients = objective.expression().name_coefficients();
        assert!((coefficients["x"] - 3.0).abs() < 1e-12);
    }

    #[test]
    fn round_trip_through_file() {
        let problem = sample_problem();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sample.json");
        write_json_file(&problem, &path).unwrap();
        let reread = read_json_file(&path).unwrap();
        assert_eq!(reread.constraints().len(), 1);
    }

    #[test]
    fn unknown_variable_rejected() {
        let text = r#"{
            "name": "broken",
            "variables": [],
            "constraints": [
                {"name": null, "terms": [{"variable": "x", "coefficient": 1.0}],
                 "sense": "leq", "bound": 4.0}
            ],
            "objective": null
        }"#;
        assert!(matches!(
            problem_from_json_str(text),
            Err(JsonIoError::UnknownVariable(name)) if name == "x"
        ));
    }

    #[test]
    fn duplicate_variable_rejected() {
        let text = r#"{
            "name": "broken",
            "variables": [
                {"name": "x", "low_bound": 0.0, "up_bound": null, "kind": "continuous"},
                {"name": "x", "low_bound": 0.0, "up_bound": null, "kind": "continuous"}
            ],
            "constraints": [],
            "objective": null
        }"#;
        assert!(matches!(
            problem_from_json_str(text),
            Err(JsonIoError::DuplicateVariable(name)) if name == "x"
        ));
    }
}
