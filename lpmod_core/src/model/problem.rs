//! Provides struct representing an optimization problem
use std::sync::{Arc, RwLock};

use indexmap::IndexMap;
use thiserror::Error;

use crate::configuration::CONFIGURATION;
use crate::model::constraint::Constraint;
use crate::model::objective::Objective;
use crate::model::variable::Variable;
use crate::model::{Solution, SolutionStatus};
use crate::solve::Solver;

/// An optimization problem
///
/// Aggregates an optional objective and an ordered sequence of constraints.
/// The variable registry is derived by walking every expression, so a
/// variable becomes part of the problem by being referenced, never by being
/// registered explicitly.
///
/// A single problem graph is a single-writer resource: two adapters must not
/// solve the same problem concurrently, since both would write the same
/// variable values.
#[derive(Debug, Clone, Default)]
pub struct Problem {
    /// Name of the problem, used as the header of serialized models
    name: String,
    /// Objective to optimize, None meaning a pure feasibility problem
    objective: Option<Objective>,
    /// Constraints in declaration order
    ///
    /// The order is preserved through backend serialization so row level
    /// diagnostics can be traced back; it has no effect on the solution.
    constraints: Vec<Constraint>,
    /// Status of the most recent solve
    status: Option<SolutionStatus>,
    /// Objective value recorded by the most recent successful solve
    objective_value: Option<f64>,
}

impl Problem {
    // region Creation Functions
    /// Create a new empty problem
    pub fn new(name: &str) -> Self {
        Problem {
            name: name.to_string(),
            ..Problem::default()
        }
    }

    /// Create a new problem with an objective and a set of constraints
    pub fn with_parts(name: &str, objective: Option<Objective>, constraints: Vec<Constraint>) -> Self {
        Problem {
            name: name.to_string(),
            objective,
            constraints,
            status: None,
            objective_value: None,
        }
    }
    // endregion Creation Functions

    // region Model Construction
    /// Append a constraint to the problem
    ///
    /// Constraints are never merged or deduplicated, each call adds a
    /// distinct row even when an identical one is already present.
    pub fn add_constraint(&mut self, constraint: Constraint) {
        self.constraints.push(constraint);
    }

    /// Set the objective of the problem, replacing any current objective
    pub fn set_objective(&mut self, objective: Objective) {
        self.objective = Some(objective);
    }
    // endregion Model Construction

    // region Accessors
    /// Name of the problem
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The objective, if one is set
    pub fn objective(&self) -> Option<&Objective> {
        self.objective.as_ref()
    }

    /// The constraints in declaration order
    pub fn constraints(&self) -> &[Constraint] {
        &self.constraints
    }

    /// Status of the most recent solve, if any
    pub fn status(&self) -> SolutionStatus {
        self.status.unwrap_or(SolutionStatus::NotSolved)
    }

    /// Objective value recorded by the most recent successful solve
    pub fn objective_value(&self) -> Option<f64> {
        self.objective_value
    }
    // endregion Accessors

    // region Validation Functions
    /// Build the name keyed variable registry, validating consistency
    ///
    /// Walks the objective and then every constraint in declaration order
    /// (within a constraint the left hand side before the right), collecting
    /// each variable in first-seen order. Two distinct variable objects
    /// sharing a name are a modeling error when their bounds or kind differ;
    /// when the attributes are identical the first-seen object keeps the
    /// registry slot and receives the solution values.
    pub fn validate(&self) -> Result<IndexMap<String, Arc<RwLock<Variable>>>, ProblemError> {
        let mut registry: IndexMap<String, Arc<RwLock<Variable>>> = IndexMap::new();

        let expressions = self
            .objective
            .iter()
            .map(|objective| objective.expression())
            .chain(
                self.constraints
                    .iter()
                    .flat_map(|constraint| [constraint.lhs(), constraint.rhs()]),
            );
        for expression in expressions {
            for term in expression.terms() {
                Problem::register(&mut registry, term.variable())?;
            }
        }
        Ok(registry)
    }

    /// Alias for [`Problem::validate`], reading as a query at call sites
    pub fn variables(&self) -> Result<IndexMap<String, Arc<RwLock<Variable>>>, ProblemError> {
        self.validate()
    }

    /// Insert a variable into the registry, checking name consistency
    fn register(
        registry: &mut IndexMap<String, Arc<RwLock<Variable>>>,
        variable: &Arc<RwLock<Variable>>,
    ) -> Result<(), ProblemError> {
        let name = variable.read().unwrap().name().to_string();
        match registry.get(&name) {
            None => {
                registry.insert(name, variable.clone());
            }
            Some(existing) if Arc::ptr_eq(existing, variable) => {}
            Some(existing) => {
                let first = existing.read().unwrap();
                let second = variable.read().unwrap();
                if !first.same_attributes(&second) {
                    return Err(ProblemError::DuplicateVariableName {
                        name,
                        first: first.attribute_summary(),
                        second: second.attribute_summary(),
                    });
                }
            }
        }
        Ok(())
    }
    // endregion Validation Functions

    // region Solving
    /// Solve the problem with the given solver and apply the result
    ///
    /// Runs the adapter, writes the solution values back onto the variable
    /// registry (by identity, through the name map), records the status and
    /// objective value, and returns the status. Modeling errors raised by
    /// validation propagate unchanged; backend failures come back as
    /// [`SolutionStatus::NotSolved`].
    pub fn optimize(&mut self, solver: &dyn Solver) -> Result<SolutionStatus, ProblemError> {
        let solution = solver.solve(self)?;
        self.apply_solution(&solution)?;
        Ok(solution.status)
    }

    /// Solve the problem with the backend selected by the global configuration
    pub fn optimize_with_default(&mut self) -> Result<SolutionStatus, ProblemError> {
        let solver = CONFIGURATION.read().unwrap().backend.create_solver();
        self.optimize(solver.as_ref())
    }

    /// Write a solution back onto the variable registry and bookkeeping
    fn apply_solution(&mut self, solution: &Solution) -> Result<(), ProblemError> {
        if let Some(values) = &solution.variable_values {
            let registry = self.validate()?;
            for (name, value) in values {
                if let Some(variable) = registry.get(name) {
                    variable.write().unwrap().set_value(*value);
                }
            }
        }
        self.status = Some(solution.status);
        self.objective_value = solution.objective_value;
        Ok(())
    }
    // endregion Solving
}

/// Errors associated with the Problem
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ProblemError {
    /// Error when two distinct variables share a name with differing attributes
    #[error(
        "two variables named `{name}` have conflicting definitions: {first} vs {second}"
    )]
    DuplicateVariableName {
        name: String,
        first: String,
        second: String,
    },
    /// Error when a backend that needs at least one decision variable is
    /// handed a problem without any
    #[error("model has no decision variables, the {backend} backend requires at least one")]
    EmptyModel { backend: &'static str },
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::constraint::ComparisonSense;
    use crate::model::expression::Expression;
    use crate::model::variable::{VariableBuilder, VariableKind};
    use indexmap::indexmap;

    fn bounded(name: &str, low: f64, up: f64) -> Arc<RwLock<Variable>> {
        Variable::new(name, VariableKind::Continuous, Some(low), Some(up))
            .unwrap()
            .wrap()
    }

    #[test]
    fn new_problem() {
        let problem = Problem::new("test_problem");
        assert_eq!(problem.name(), "test_problem");
        assert!(problem.objective().is_none());
        assert!(problem.constraints().is_empty());
        assert_eq!(problem.status(), SolutionStatus::NotSolved);
    }

    #[test]
    fn set_objective_replaces() {
        let x = bounded("x", 0.0, 10.0);
        let mut problem = Problem::new("test_problem");
        problem.set_objective(Objective::minimize(Expression::from_variable(x.clone())));
        problem.set_objective(Objective::maximize(Expression::from_variable(x.clone())));
        assert_eq!(
            problem.objective().unwrap().sense(),
            crate::model::objective::ObjectiveSense::Maximize
        );
    }

    #[test]
    fn identical_rows_both_kept() {
        let x = bounded("x", 0.0, 10.0);
        let mut problem = Problem::new("test_problem");
        let row = Constraint::new(
            Expression::from_variable(x.clone()),
            ComparisonSense::Leq,
            Expression::from_constant(4.0),
        );
        problem.add_constraint(row.clone());
        problem.add_constraint(row);
        assert_eq!(problem.constraints().len(), 2);
    }

    #[test]
    fn registry_walk_order() {
        let x = bounded("x", 0.0, 10.0);
        let y = bounded("y", 0.0, 10.0);
        let z = bounded("z", 0.0, 10.0);
        let mut problem = Problem::new("test_problem");
        problem.set_objective(Objective::minimize(Expression::from_variable(z.clone())));
        problem.add_constraint(Constraint::new(
            Expression::new(&[y.clone(), x.clone()], &[1.0, 1.0], 0.0),
            ComparisonSense::Leq,
            Expression::from_constant(4.0),
        ));
        let registry = problem.validate().unwrap();
        let names: Vec<&str> = registry.keys().map(|name| name.as_str()).collect();
        // Objective first, then constraints, in first-seen order
        assert_eq!(names, vec!["z", "y", "x"]);
    }

    #[test]
    fn duplicate_name_with_conflicting_attributes() {
        let x1 = bounded("x", 0.0, 10.0);
        let x2 = bounded("x", 0.0, 5.0);
        let mut problem = Problem::new("test_problem");
        problem.add_constraint(Constraint::new(
            Expression::from_variable(x1),
            ComparisonSense::Leq,
            Expression::from_constant(4.0),
        ));
        problem.add_constraint(Constraint::new(
            Expression::from_variable(x2),
            ComparisonSense::Leq,
            Expression::from_constant(3.0),
        ));
        match problem.validate() {
            Err(ProblemError::DuplicateVariableName { name, first, second }) => {
                assert_eq!(name, "x");
                assert!(first.contains("[0, 10]"), "got {first}");
                assert!(second.contains("[0, 5]"), "got {second}");
            }
            _ => panic!("Conflicting duplicate name not caught"),
        }
    }

    #[test]
    fn duplicate_name_with_conflicting_kind() {
        let x1 = bounded("x", 0.0, 10.0);
        let x2 = Variable::new("x", VariableKind::Integer, Some(0.0), Some(10.0))
            .unwrap()
            .wrap();
        let mut problem = Problem::new("test_problem");
        problem.add_constraint(Constraint::new(
            Expression::new(&[x1, x2], &[1.0, 1.0], 0.0),
            ComparisonSense::Leq,
            Expression::from_constant(4.0),
        ));
        assert!(matches!(
            problem.validate(),
            Err(ProblemError::DuplicateVariableName { .. })
        ));
    }

    #[test]
    fn duplicate_name_with_identical_attributes() {
        let x1 = bounded("x", 0.0, 10.0);
        let x2 = bounded("x", 0.0, 10.0);
        let mut problem = Problem::new("test_problem");
        problem.add_constraint(Constraint::new(
            Expression::from_variable(x1.clone()),
            ComparisonSense::Leq,
            Expression::from_constant(4.0),
        ));
        problem.add_constraint(Constraint::new(
            Expression::from_variable(x2),
            ComparisonSense::Geq,
            Expression::from_constant(1.0),
        ));
        let registry = problem.validate().unwrap();
        assert_eq!(registry.len(), 1);
        // The first-seen object keeps the slot
        assert!(Arc::ptr_eq(registry.get("x").unwrap(), &x1));
    }

    #[test]
    fn cancelled_variable_still_registered() {
        // x appears on both sides with equal coefficients, so the canonical
        // row has no x column, but the variable is still part of the model
        let x = bounded("x", 0.0, 10.0);
        let y = bounded("y", 0.0, 10.0);
        let mut problem = Problem::new("test_problem");
        problem.add_constraint(Constraint::new(
            Expression::new(&[x.clone(), y.clone()], &[1.0, 1.0], 0.0),
            ComparisonSense::Leq,
            Expression::new(&[x.clone()], &[1.0], 4.0),
        ));
        let registry = problem.validate().unwrap();
        assert_eq!(registry.len(), 2);
    }

    struct CannedSolver {
        solution: Solution,
    }

    impl Solver for CannedSolver {
        fn solve(&self, problem: &Problem) -> Result<Solution, ProblemError> {
            problem.validate()?;
            Ok(self.solution.clone())
        }
    }

    #[test]
    fn optimize_applies_solution() {
        let x = bounded("x", 0.0, 10.0);
        let mut problem = Problem::new("test_problem");
        problem.set_objective(Objective::maximize(Expression::from_variable(x.clone())));

        let solver = CannedSolver {
            solution: Solution::optimal(Some(10.0), indexmap! {"x".to_string() => 10.0}),
        };
        let status = problem.optimize(&solver).unwrap();
        assert_eq!(status, SolutionStatus::Optimal);
        assert_eq!(problem.status(), SolutionStatus::Optimal);
        assert!((problem.objective_value().unwrap() - 10.0).abs() < 1e-12);
        assert!((x.read().unwrap().evaluate().unwrap() - 10.0).abs() < 1e-12);
    }

    #[test]
    fn optimize_propagates_modeling_errors() {
        let x1 = bounded("x", 0.0, 10.0);
        let x2 = bounded("x", 0.0, 5.0);
        let mut problem = Problem::new("test_problem");
        problem.add_constraint(Constraint::new(
            Expression::new(&[x1, x2], &[1.0, 1.0], 0.0),
            ComparisonSense::Leq,
            Expression::from_constant(4.0),
        ));
        let solver = CannedSolver {
            solution: Solution::infeasible(),
        };
        assert!(matches!(
            problem.optimize(&solver),
            Err(ProblemError::DuplicateVariableName { .. })
        ));
    }

    #[test]
    fn not_solved_leaves_values_unset() {
        let x = bounded("x", 0.0, 10.0);
        let mut problem = Problem::new("test_problem");
        problem.set_objective(Objective::maximize(Expression::from_variable(x.clone())));
        let solver = CannedSolver {
            solution: Solution::not_solved("backend unavailable"),
        };
        let status = problem.optimize(&solver).unwrap();
        assert_eq!(status, SolutionStatus::NotSolved);
        assert!(x.read().unwrap().value().is_none());
        assert!(problem.objective_value().is_none());
    }

    #[test]
    fn with_parts_constructor() {
        let x = VariableBuilder::default()
            .name("x")
            .low_bound(Some(1.0))
            .up_bound(Some(3.5))
            .build()
            .unwrap()
            .wrap();
        let problem = Problem::with_parts(
            "test_problem",
            Some(Objective::maximize(Expression::from_variable(x))),
            Vec::new(),
        );
        assert_eq!(problem.validate().unwrap().len(), 1);
    }
}
