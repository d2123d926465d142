//! Provides struct for representing a linear combination of variables
use std::fmt::{Display, Formatter};
use std::sync::{Arc, RwLock};

use indexmap::IndexMap;

use crate::model::variable::{Variable, VariableError};

/// A single term in a linear expression, the multiplication of `variable`
/// by `coefficient`
#[derive(Debug, Clone)]
pub struct Term {
    /// A shared reference to a [`Variable`]
    variable: Arc<RwLock<Variable>>,
    /// The coefficient for the variable
    coefficient: f64,
}

impl Term {
    /// The variable of this term
    pub fn variable(&self) -> &Arc<RwLock<Variable>> {
        &self.variable
    }

    /// The coefficient of this term
    pub fn coefficient(&self) -> f64 {
        self.coefficient
    }

    /// Name of the underlying variable
    pub fn variable_name(&self) -> String {
        self.variable.read().unwrap().name().to_string()
    }
}

impl Display for Term {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}*{}", self.coefficient, self.variable.read().unwrap().name())
    }
}

/// An immutable linear combination of variables plus a constant
///
/// The term list is identity keyed: the same variable (by `Arc::ptr_eq`)
/// never appears twice, duplicates are merged at construction by summing
/// their coefficients, and terms whose merged coefficient is zero are
/// dropped. Combination operations never modify an existing expression,
/// they return a new one with the same normalization applied.
#[derive(Debug, Clone, Default)]
pub struct Expression {
    terms: Vec<Term>,
    constant: f64,
}

impl Expression {
    /// Create an expression with no terms and a zero constant
    pub fn empty() -> Self {
        Expression::default()
    }

    /// Create an expression from parallel slices of variables and coefficients
    ///
    /// # Examples
    /// ```rust
    /// use lpmod_core::model::expression::Expression;
    /// use lpmod_core::model::variable::{Variable, VariableKind};
    /// let x = Variable::new("x", VariableKind::Continuous, Some(0.0), None)
    ///     .unwrap()
    ///     .wrap();
    /// // 2.5*x + 7
    /// let expr = Expression::new(&[x], &[2.5], 7.0);
    /// assert_eq!(expr.constant(), 7.0);
    /// ```
    pub fn new(
        variables: &[Arc<RwLock<Variable>>],
        coefficients: &[f64],
        constant: f64,
    ) -> Self {
        Expression::merge(
            variables
                .iter()
                .zip(coefficients)
                .map(|(var, coef)| (var.clone(), *coef)),
            constant,
        )
    }

    /// Create an expression from variable/coefficient pairs
    pub fn from_terms(terms: Vec<(Arc<RwLock<Variable>>, f64)>, constant: f64) -> Self {
        Expression::merge(terms.into_iter(), constant)
    }

    /// Create an expression holding a single variable with coefficient one
    pub fn from_variable(variable: Arc<RwLock<Variable>>) -> Self {
        Expression::merge(std::iter::once((variable, 1.0)), 0.0)
    }

    /// Create an expression holding only a constant
    pub fn from_constant(constant: f64) -> Self {
        Expression {
            terms: Vec::new(),
            constant,
        }
    }

    /// Merge variable/coefficient pairs into a normalized term list
    ///
    /// Pairs referencing the same variable (by identity) collapse into a
    /// single term, and terms with a zero coefficient are dropped. The
    /// first-seen order of the surviving variables is preserved.
    fn merge(pairs: impl Iterator<Item = (Arc<RwLock<Variable>>, f64)>, constant: f64) -> Self {
        let mut merged: IndexMap<usize, Term> = IndexMap::new();
        for (variable, coefficient) in pairs {
            let key = Arc::as_ptr(&variable) as usize;
            merged
                .entry(key)
                .and_modify(|term| term.coefficient += coefficient)
                .or_insert(Term {
                    variable,
                    coefficient,
                });
        }
        let terms = merged
            .into_values()
            .filter(|term| term.coefficient != 0.0)
            .collect();
        Expression { terms, constant }
    }

    /// Return a new expression that is the sum of this expression and `other`
    pub fn add(&self, other: &Expression) -> Expression {
        let pairs = self
            .terms
            .iter()
            .chain(other.terms.iter())
            .map(|term| (term.variable.clone(), term.coefficient));
        Expression::merge(pairs, self.constant + other.constant)
    }

    /// Return a new expression with `constant` added to the constant term
    pub fn add_constant(&self, constant: f64) -> Expression {
        Expression {
            terms: self.terms.clone(),
            constant: self.constant + constant,
        }
    }

    /// Return a new expression with every coefficient and the constant
    /// multiplied by `scalar`
    pub fn scaled(&self, scalar: f64) -> Expression {
        let pairs = self
            .terms
            .iter()
            .map(|term| (term.variable.clone(), term.coefficient * scalar));
        Expression::merge(pairs, self.constant * scalar)
    }

    /// Return the negation of this expression
    pub fn negated(&self) -> Expression {
        self.scaled(-1.0)
    }

    /// Return a new expression that is this expression minus `other`
    pub fn subtract(&self, other: &Expression) -> Expression {
        self.add(&other.negated())
    }

    /// Return a copy of this expression with the constant replaced
    pub(crate) fn with_constant(&self, constant: f64) -> Expression {
        Expression {
            terms: self.terms.clone(),
            constant,
        }
    }

    /// Evaluate the expression under the current variable values
    ///
    /// Fails with [`VariableError::Unsolved`] if any referenced variable has
    /// no value assigned.
    pub fn evaluate(&self) -> Result<f64, VariableError> {
        let mut total = self.constant;
        for term in &self.terms {
            total += term.coefficient * term.variable.read().unwrap().evaluate()?;
        }
        Ok(total)
    }

    /// The coefficient of `variable` in this expression, by identity
    ///
    /// Returns zero when the variable does not appear.
    pub fn coefficient_of(&self, variable: &Arc<RwLock<Variable>>) -> f64 {
        self.terms
            .iter()
            .find(|term| Arc::ptr_eq(&term.variable, variable))
            .map(|term| term.coefficient)
            .unwrap_or(0.0)
    }

    /// The terms of this expression in first-seen order
    pub fn terms(&self) -> &[Term] {
        &self.terms
    }

    /// The constant of this expression
    pub fn constant(&self) -> f64 {
        self.constant
    }

    /// Whether the expression has no variable terms
    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    /// Coefficients keyed by variable name, summed when distinct variable
    /// objects share a name, preserving first-seen order
    ///
    /// Backends address columns by name, so this is the translation-facing
    /// view of the term list.
    pub fn name_coefficients(&self) -> IndexMap<String, f64> {
        let mut coefficients: IndexMap<String, f64> = IndexMap::new();
        for term in &self.terms {
            *coefficients.entry(term.variable_name()).or_insert(0.0) += term.coefficient;
        }
        coefficients
    }

    /// Create a string representation of the terms in the expression
    fn terms_to_string(&self) -> String {
        if self.terms.is_empty() {
            return self.constant.to_string();
        }
        let mut str_rep = self
            .terms
            .iter()
            .map(|term| format!("{}", term))
            .collect::<Vec<_>>()
            .join(" + ");
        if self.constant != 0.0 {
            str_rep.push_str(&format!(" + {}", self.constant));
        }
        str_rep
    }
}

impl Display for Expression {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.terms_to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::variable::{VariableBuilder, VariableKind};

    fn var(name: &str) -> Arc<RwLock<Variable>> {
        VariableBuilder::default().name(name).build().unwrap().wrap()
    }

    #[test]
    fn duplicate_variables_merge() {
        let x = var("x");
        // 2x + 3x collapses into a single 5x term
        let expr = Expression::new(&[x.clone(), x.clone()], &[2.0, 3.0], 0.0);
        assert_eq!(expr.terms().len(), 1);
        assert!((expr.coefficient_of(&x) - 5.0).abs() < 1e-12);
    }

    #[test]
    fn zero_coefficients_dropped() {
        let x = var("x");
        let y = var("y");
        let expr = Expression::new(&[x.clone(), y.clone(), x.clone()], &[2.0, 1.0, -2.0], 4.0);
        assert_eq!(expr.terms().len(), 1);
        assert_eq!(expr.coefficient_of(&x), 0.0);
        assert!((expr.coefficient_of(&y) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn addition_sums_coefficients() {
        let x = var("x");
        let y = var("y");
        let left = Expression::new(&[x.clone(), y.clone()], &[1.0, 2.0], 3.0);
        let right = Expression::new(&[x.clone()], &[4.0], -1.0);
        let sum = left.add(&right);
        assert!((sum.coefficient_of(&x) - 5.0).abs() < 1e-12);
        assert!((sum.coefficient_of(&y) - 2.0).abs() < 1e-12);
        assert!((sum.constant() - 2.0).abs() < 1e-12);
        // Operands are untouched
        assert!((left.coefficient_of(&x) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn addition_cancels_to_zero() {
        let x = var("x");
        let left = Expression::new(&[x.clone()], &[1.0], 0.0);
        let right = Expression::new(&[x.clone()], &[-1.0], 0.0);
        let sum = left.add(&right);
        assert!(sum.is_empty(), "cancelled term should be dropped");
    }

    #[test]
    fn scaling_applies_to_constant() {
        let x = var("x");
        let expr = Expression::new(&[x.clone()], &[2.0], 3.0);
        let scaled = expr.scaled(4.0);
        assert!((scaled.coefficient_of(&x) - 8.0).abs() < 1e-12);
        assert!((scaled.constant() - 12.0).abs() < 1e-12);
    }

    #[test]
    fn negation_round_trips() {
        let x = var("x");
        let expr = Expression::new(&[x.clone()], &[2.0], 3.0);
        let back = expr.negated().negated();
        assert!((back.coefficient_of(&x) - 2.0).abs() < 1e-12);
        assert!((back.constant() - 3.0).abs() < 1e-12);
    }

    #[test]
    fn evaluate_propagates_unsolved() {
        let x = var("x");
        let expr = Expression::new(&[x.clone()], &[2.0], 3.0);
        assert!(expr.evaluate().is_err());

        x.write().unwrap().set_value(2.0);
        assert!((expr.evaluate().unwrap() - 7.0).abs() < 1e-12);
    }

    #[test]
    fn name_coefficients_sum_shared_names() {
        // Two distinct objects with the same name are one backend column
        let x1 = Variable::new("x", VariableKind::Continuous, Some(0.0), None)
            .unwrap()
            .wrap();
        let x2 = Variable::new("x", VariableKind::Continuous, Some(0.0), None)
            .unwrap()
            .wrap();
        let expr = Expression::new(&[x1, x2], &[2.0, 3.0], 0.0);
        // Identity keyed, so both terms survive normalization
        assert_eq!(expr.terms().len(), 2);
        let by_name = expr.name_coefficients();
        assert!((by_name["x"] - 5.0).abs() < 1e-12);
    }
}
