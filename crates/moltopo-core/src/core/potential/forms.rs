//! The catalog of recognized potential functional forms.
//!
//! The catalog is a plain value handed to the converters (never ambient
//! global state). The built-in set is closed and small; a TOML file can
//! extend or override it for callers that carry custom templates.

use super::expr::{CanonExpr, Expr, ExprError};
use serde::Deserialize;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::Path;
use thiserror::Error;

pub const LENNARD_JONES: &str = "lennard-jones-12-6";
pub const HARMONIC_BOND: &str = "harmonic-bond";
pub const HARMONIC_ANGLE: &str = "harmonic-angle";
pub const PERIODIC_TORSION: &str = "periodic-torsion";
pub const RYCKAERT_BELLEMANS: &str = "ryckaert-bellemans";
pub const PERIODIC_IMPROPER: &str = "periodic-improper";
pub const HARMONIC_IMPROPER: &str = "harmonic-improper";

const BUILTIN_FORMS: [(&str, &str, &[&str]); 7] = [
    (
        LENNARD_JONES,
        "4*epsilon*((sigma/r)**12 - (sigma/r)**6)",
        &["r"],
    ),
    (HARMONIC_BOND, "0.5*k*(r - r_eq)**2", &["r"]),
    (HARMONIC_ANGLE, "0.5*k*(theta - theta_eq)**2", &["theta"]),
    (PERIODIC_TORSION, "k*(1 + cos(n*phi - phi_eq))", &["phi"]),
    (
        RYCKAERT_BELLEMANS,
        "c0*cos(phi)**0 + c1*cos(phi)**1 + c2*cos(phi)**2 + c3*cos(phi)**3 + c4*cos(phi)**4 + c5*cos(phi)**5",
        &["phi"],
    ),
    (PERIODIC_IMPROPER, "k*(1 + cos(n*phi - phi_eq))", &["phi"]),
    (HARMONIC_IMPROPER, "0.5*k*(phi - phi_eq)**2", &["phi"]),
];

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("File I/O error for '{path}': {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
    #[error("TOML parsing error for '{path}': {source}")]
    Toml {
        path: String,
        source: toml::de::Error,
    },
    #[error("Invalid expression for form '{name}': {source}")]
    Expr { name: String, source: ExprError },
}

/// A named functional form with its canonical representation.
#[derive(Debug, Clone)]
pub struct PotentialForm {
    name: String,
    src: String,
    expr: Expr,
    canon: CanonExpr,
    independent_vars: BTreeSet<String>,
}

impl PotentialForm {
    pub fn new(
        name: &str,
        expression: &str,
        independent_vars: &[&str],
    ) -> Result<Self, ExprError> {
        let expr = Expr::parse(expression)?;
        let canon = expr.canonical();
        Ok(Self {
            name: name.to_string(),
            src: expression.to_string(),
            expr,
            canon,
            independent_vars: independent_vars.iter().map(|s| s.to_string()).collect(),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn expression_str(&self) -> &str {
        &self.src
    }

    pub fn expr(&self) -> &Expr {
        &self.expr
    }

    pub fn canonical(&self) -> &CanonExpr {
        &self.canon
    }

    pub fn independent_vars(&self) -> &BTreeSet<String> {
        &self.independent_vars
    }

    /// Parameter names of the form: free symbols minus independent variables.
    pub fn parameter_names(&self) -> BTreeSet<String> {
        self.expr
            .free_symbols()
            .into_iter()
            .filter(|s| !self.independent_vars.contains(s))
            .collect()
    }
}

#[derive(Debug, Deserialize)]
struct FormDef {
    expression: String,
    independent_variables: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct CatalogFile {
    forms: HashMap<String, FormDef>,
}

/// The injected catalog value.
#[derive(Debug, Clone)]
pub struct FormCatalog {
    forms: BTreeMap<String, PotentialForm>,
}

impl Default for FormCatalog {
    fn default() -> Self {
        let mut forms = BTreeMap::new();
        for (name, expression, ivars) in BUILTIN_FORMS {
            // Built-in expressions are statically known to parse.
            let form = PotentialForm::new(name, expression, ivars)
                .unwrap_or_else(|_| unreachable!("builtin form '{name}' must parse"));
            forms.insert(name.to_string(), form);
        }
        Self { forms }
    }
}

impl FormCatalog {
    pub fn get(&self, name: &str) -> Option<&PotentialForm> {
        self.forms.get(name)
    }

    pub fn insert(&mut self, form: PotentialForm) {
        self.forms.insert(form.name().to_string(), form);
    }

    pub fn len(&self) -> usize {
        self.forms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.forms.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &PotentialForm> {
        self.forms.values()
    }

    /// First catalog form algebraically identical to `canon`, if any.
    pub fn match_form(&self, canon: &CanonExpr) -> Option<&PotentialForm> {
        self.forms.values().find(|f| f.canon.approx_eq(canon))
    }

    /// Loads the built-in catalog extended/overridden by a TOML file of the
    /// shape `[forms.<name>] expression = "...", independent_variables = [..]`.
    pub fn load_toml(path: &Path) -> Result<Self, CatalogError> {
        let content = std::fs::read_to_string(path).map_err(|e| CatalogError::Io {
            path: path.to_string_lossy().to_string(),
            source: e,
        })?;
        let file: CatalogFile = toml::from_str(&content).map_err(|e| CatalogError::Toml {
            path: path.to_string_lossy().to_string(),
            source: e,
        })?;

        let mut catalog = Self::default();
        for (name, def) in file.forms {
            let ivars: Vec<&str> = def.independent_variables.iter().map(|s| s.as_str()).collect();
            let form = PotentialForm::new(&name, &def.expression, &ivars)
                .map_err(|e| CatalogError::Expr { name: name.clone(), source: e })?;
            catalog.insert(form);
        }
        Ok(catalog)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn default_catalog_contains_all_builtin_forms() {
        let catalog = FormCatalog::default();
        assert_eq!(catalog.len(), 7);
        for name in [
            LENNARD_JONES,
            HARMONIC_BOND,
            HARMONIC_ANGLE,
            PERIODIC_TORSION,
            RYCKAERT_BELLEMANS,
            PERIODIC_IMPROPER,
            HARMONIC_IMPROPER,
        ] {
            assert!(catalog.get(name).is_some(), "missing form {name}");
        }
    }

    #[test]
    fn lennard_jones_parameter_names() {
        let catalog = FormCatalog::default();
        let lj = catalog.get(LENNARD_JONES).unwrap();
        let params: Vec<String> = lj.parameter_names().into_iter().collect();
        assert_eq!(params, vec!["epsilon".to_string(), "sigma".to_string()]);
    }

    #[test]
    fn match_form_finds_reordered_lennard_jones() {
        let catalog = FormCatalog::default();
        let expr = Expr::parse("4*epsilon*(-sigma**6/r**6 + sigma**12/r**12)").unwrap();
        let form = catalog.match_form(&expr.canonical()).unwrap();
        assert_eq!(form.name(), LENNARD_JONES);
    }

    #[test]
    fn match_form_rejects_unknown_expression() {
        let catalog = FormCatalog::default();
        let expr = Expr::parse("a*exp(-b*r)").unwrap();
        assert!(catalog.match_form(&expr.canonical()).is_none());
    }

    #[test]
    fn load_toml_overrides_builtin_form() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("forms.toml");
        fs::write(
            &path,
            r#"
            [forms.buckingham-exp-6]
            expression = "a*exp(-b*r) - c/r**6"
            independent_variables = ["r"]
            "#,
        )
        .unwrap();

        let catalog = FormCatalog::load_toml(&path).unwrap();
        assert_eq!(catalog.len(), 8);
        let buck = catalog.get("buckingham-exp-6").unwrap();
        let params: Vec<String> = buck.parameter_names().into_iter().collect();
        assert_eq!(
            params,
            vec!["a".to_string(), "b".to_string(), "c".to_string()]
        );
    }

    #[test]
    fn load_toml_fails_for_missing_file() {
        let dir = tempdir().unwrap();
        let result = FormCatalog::load_toml(&dir.path().join("none.toml"));
        assert!(matches!(result, Err(CatalogError::Io { .. })));
    }

    #[test]
    fn load_toml_fails_for_bad_expression() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("forms.toml");
        fs::write(
            &path,
            r#"
            [forms.broken]
            expression = "a*(b"
            independent_variables = ["b"]
            "#,
        )
        .unwrap();
        let result = FormCatalog::load_toml(&path);
        assert!(matches!(result, Err(CatalogError::Expr { .. })));
    }
}
