//! Parameter-bearing potential expressions.

use super::expr::{CanonExpr, Expr, ExprError};
use super::forms::PotentialForm;
use crate::core::units::Quantity;
use std::collections::{BTreeMap, BTreeSet};

/// A functional form bound to unit-tagged parameter values.
///
/// The parameter map must contain exactly the free symbols of the
/// expression minus the independent variables; this is enforced at
/// construction so a `PotentialExpression` can never be inconsistent.
#[derive(Debug, Clone)]
pub struct PotentialExpression {
    src: String,
    expr: Expr,
    canon: CanonExpr,
    independent_vars: BTreeSet<String>,
    parameters: BTreeMap<String, Quantity>,
}

impl PotentialExpression {
    pub fn new(
        expression: &str,
        independent_vars: &[&str],
        parameters: BTreeMap<String, Quantity>,
    ) -> Result<Self, ExprError> {
        let expr = Expr::parse(expression)?;
        let independent_vars: BTreeSet<String> =
            independent_vars.iter().map(|s| s.to_string()).collect();

        let expected: BTreeSet<String> = expr
            .free_symbols()
            .into_iter()
            .filter(|s| !independent_vars.contains(s))
            .collect();
        let provided: BTreeSet<String> = parameters.keys().cloned().collect();
        if expected != provided {
            let missing: Vec<String> = expected.difference(&provided).cloned().collect();
            let extra: Vec<String> = provided.difference(&expected).cloned().collect();
            return Err(ExprError::ParameterMismatch { missing, extra });
        }

        let canon = expr.canonical();
        Ok(Self {
            src: expression.to_string(),
            expr,
            canon,
            independent_vars,
            parameters,
        })
    }

    /// Builds from a catalog form, inheriting its expression and
    /// independent variables.
    pub fn from_form(
        form: &PotentialForm,
        parameters: BTreeMap<String, Quantity>,
    ) -> Result<Self, ExprError> {
        let ivars: Vec<&str> = form.independent_vars().iter().map(|s| s.as_str()).collect();
        Self::new(form.expression_str(), &ivars, parameters)
    }

    pub fn expression_str(&self) -> &str {
        &self.src
    }

    pub fn expr(&self) -> &Expr {
        &self.expr
    }

    pub fn independent_vars(&self) -> &BTreeSet<String> {
        &self.independent_vars
    }

    pub fn parameters(&self) -> &BTreeMap<String, Quantity> {
        &self.parameters
    }

    pub fn parameter(&self, name: &str) -> Option<&Quantity> {
        self.parameters.get(name)
    }

    /// Whether this expression is algebraically identical to `form`.
    pub fn matches_form(&self, form: &PotentialForm) -> bool {
        self.canon.approx_eq(form.canonical())
    }

    /// Whether this expression is algebraically identical to `other`'s.
    pub fn matches(&self, other: &PotentialExpression) -> bool {
        self.canon.approx_eq(&other.canon)
    }
}
