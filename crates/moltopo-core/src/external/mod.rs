//! Conversion between the internal topology and an external, ParmEd-style
//! structure representation.
//!
//! The external model ([`structure`]) is arena-indexed: record indices are
//! the synthetic identities that the type-deduplication machinery
//! ([`dedup`]) keys on. [`from_structure`] and [`to_structure`] hold the
//! two conversion directions. Conversions are all-or-nothing: any error
//! aborts the call and no partial result is returned.

pub mod dedup;
pub mod from_structure;
pub mod structure;
pub mod to_structure;

pub use from_structure::from_structure;
pub use to_structure::to_structure;

use crate::core::models::topology::TopologyError;
use crate::core::potential::expr::ExprError;
use crate::core::units::IncompatibleUnitError;
use structure::StructureError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConvertError {
    /// The argument is not a consistent instance of the expected
    /// representation (dangling cross-references).
    #[error("Provided argument is not a consistent structure: {0}")]
    TypeMismatch(String),

    #[error(transparent)]
    Unit(#[from] IncompatibleUnitError),

    /// An internal type's expression does not match the single functional
    /// form the external format supports for that kind. Fatal for the
    /// whole conversion call.
    #[error("{kind} type '{type_name}' expression does not match the supported '{expected}' form")]
    FormatIncompatibility {
        kind: &'static str,
        type_name: String,
        expected: String,
    },

    /// A caller-supplied member-types map refers to records the structure
    /// does not contain.
    #[error("Invalid member-types map: {0}")]
    Configuration(String),

    #[error(transparent)]
    Expression(#[from] ExprError),

    #[error(transparent)]
    Topology(#[from] TopologyError),

    #[error(transparent)]
    Structure(#[from] StructureError),
}
