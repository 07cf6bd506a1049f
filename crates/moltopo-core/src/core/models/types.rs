//! Parametrized connection types.
//!
//! A type is a potential functional form bound to parameter values, shared
//! by every connection that references it. The optional `member_types`
//! tuple records the ordered atom-type labels the type was observed bound
//! to; it is used for deduplication and lookup only and is never enforced
//! as a constraint on the connections that reference the type.

use crate::core::potential::expression::PotentialExpression;
use crate::core::units::Quantity;

#[derive(Debug, Clone)]
pub struct AtomType {
    pub name: String,
    pub charge: Quantity,
    pub mass: Quantity,
    /// Element symbol tag, used by the reverse converter's element
    /// resolution before falling back to name and mass heuristics.
    pub element_tag: Option<String>,
    pub expression: PotentialExpression,
}

#[derive(Debug, Clone)]
pub struct BondType {
    pub name: String,
    pub expression: PotentialExpression,
    pub member_types: Option<[String; 2]>,
}

impl BondType {
    pub fn new(expression: PotentialExpression, member_types: Option<[String; 2]>) -> Self {
        Self {
            name: "BondType".to_string(),
            expression,
            member_types,
        }
    }
}

#[derive(Debug, Clone)]
pub struct AngleType {
    pub name: String,
    pub expression: PotentialExpression,
    pub member_types: Option<[String; 3]>,
}

impl AngleType {
    pub fn new(expression: PotentialExpression, member_types: Option<[String; 3]>) -> Self {
        Self {
            name: "AngleType".to_string(),
            expression,
            member_types,
        }
    }
}

#[derive(Debug, Clone)]
pub struct DihedralType {
    pub name: String,
    pub expression: PotentialExpression,
    pub member_types: Option<[String; 4]>,
}

impl DihedralType {
    pub fn new(expression: PotentialExpression, member_types: Option<[String; 4]>) -> Self {
        Self {
            name: "DihedralType".to_string(),
            expression,
            member_types,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ImproperType {
    pub name: String,
    pub expression: PotentialExpression,
    pub member_types: Option<[String; 4]>,
}

impl ImproperType {
    pub fn new(expression: PotentialExpression, member_types: Option<[String; 4]>) -> Self {
        Self {
            name: "ImproperType".to_string(),
            expression,
            member_types,
        }
    }
}
