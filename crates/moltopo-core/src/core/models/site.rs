//! Point particles and their grouping labels.

use super::element::Element;
use super::ids::AtomTypeId;
use crate::core::units::{Quantity, Quantity3};

/// Grouping label: a name plus an integer index (residue number, molecule
/// number). Indices are zero-based.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct GroupLabel {
    pub name: String,
    pub number: isize,
}

impl GroupLabel {
    pub fn new(name: &str, number: isize) -> Self {
        Self {
            name: name.to_string(),
            number,
        }
    }
}

/// A point particle in the topology.
///
/// Sites are created once during conversion or file reading and are not
/// mutated afterwards, except for the one-shot `atom_type` backfill done by
/// the converters.
#[derive(Debug, Clone, PartialEq)]
pub struct Site {
    pub name: String,
    pub position: Quantity3,
    pub charge: Option<Quantity>,
    pub element: Option<&'static Element>,
    pub molecule: Option<GroupLabel>,
    pub residue: Option<GroupLabel>,
    pub atom_type: Option<AtomTypeId>,
}

impl Site {
    pub fn new(name: &str, position: Quantity3) -> Self {
        Self {
            name: name.to_string(),
            position,
            charge: None,
            element: None,
            molecule: None,
            residue: None,
            atom_type: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::units::ANGSTROM;

    #[test]
    fn new_site_has_no_labels_or_type() {
        let site = Site::new("CA", Quantity3::from_array([1.0, 2.0, 3.0], ANGSTROM));
        assert_eq!(site.name, "CA");
        assert!(site.charge.is_none());
        assert!(site.element.is_none());
        assert!(site.molecule.is_none());
        assert!(site.residue.is_none());
        assert!(site.atom_type.is_none());
    }

    #[test]
    fn group_labels_compare_by_name_and_number() {
        assert_eq!(GroupLabel::new("SOL", 0), GroupLabel::new("SOL", 0));
        assert_ne!(GroupLabel::new("SOL", 0), GroupLabel::new("SOL", 1));
    }
}
