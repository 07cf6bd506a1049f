//! The type-deduplication index.
//!
//! Every connection instance in the external structure carries a reference
//! to a raw type record; several instances commonly share one record. The
//! maps built here key on the record's synthetic identity — its (table,
//! index) pair — so the same record reached through different instances
//! deduplicates to a single canonical internal type.
//!
//! Member-type tuples are resolved per instance with a first-wins policy:
//! the first instance seen for a given identity fixes the tuple, and later
//! instances with a divergent tuple are ignored. An instance only records
//! a tuple when every member resolved to a non-empty type label; partially
//! resolved instances are dropped silently and the canonical type ends up
//! with no member types. Both policies are deliberate simplifications
//! inherited from the source format's semantics and are relied upon by
//! round-trip tests.

use super::ConvertError;
use super::structure::Structure;
use std::collections::HashMap;

/// Synthetic identity of a raw type record: which table it lives in plus
/// its arena index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TypeKey {
    Atom(usize),
    Bond(usize),
    Angle(usize),
    Dihedral(usize),
    RbTorsion(usize),
    Improper(usize),
}

/// Which instance collection of the structure to walk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StructCollection {
    Atoms,
    Bonds,
    Angles,
    Dihedrals,
    RbTorsions,
    Impropers,
}

/// Builds the member-types map for one instance collection.
///
/// For the four-member collections the `impropers` flag selects which
/// torsion instances participate: `false` keeps proper torsions only,
/// `true` keeps improper-flagged torsions (and the dedicated improper
/// instances, which are always improper).
pub fn member_types_map(
    structure: &Structure,
    collection: StructCollection,
    impropers: bool,
) -> HashMap<TypeKey, Vec<String>> {
    let mut map: HashMap<TypeKey, Vec<String>> = HashMap::new();
    let record = |key: Option<TypeKey>, members: Vec<String>, map: &mut HashMap<_, _>| {
        if let Some(key) = key {
            if !map.contains_key(&key) && members.iter().all(|m| !m.is_empty()) {
                map.insert(key, members);
            }
        }
    };

    let type_name = |idx: usize| structure.atoms[idx].type_name.clone();

    match collection {
        StructCollection::Atoms => {
            for atom in &structure.atoms {
                record(
                    atom.atom_type.map(TypeKey::Atom),
                    vec![atom.type_name.clone()],
                    &mut map,
                );
            }
        }
        StructCollection::Bonds => {
            for bond in &structure.bonds {
                record(
                    bond.bond_type.map(TypeKey::Bond),
                    vec![type_name(bond.atom1), type_name(bond.atom2)],
                    &mut map,
                );
            }
        }
        StructCollection::Angles => {
            for angle in &structure.angles {
                record(
                    angle.angle_type.map(TypeKey::Angle),
                    vec![
                        type_name(angle.atom1),
                        type_name(angle.atom2),
                        type_name(angle.atom3),
                    ],
                    &mut map,
                );
            }
        }
        StructCollection::Dihedrals => {
            for dihedral in &structure.dihedrals {
                if dihedral.improper != impropers {
                    continue;
                }
                record(
                    dihedral.dihedral_type.map(TypeKey::Dihedral),
                    vec![
                        type_name(dihedral.atom1),
                        type_name(dihedral.atom2),
                        type_name(dihedral.atom3),
                        type_name(dihedral.atom4),
                    ],
                    &mut map,
                );
            }
        }
        StructCollection::RbTorsions => {
            for torsion in &structure.rb_torsions {
                if torsion.improper != impropers {
                    continue;
                }
                record(
                    torsion.rb_type.map(TypeKey::RbTorsion),
                    vec![
                        type_name(torsion.atom1),
                        type_name(torsion.atom2),
                        type_name(torsion.atom3),
                        type_name(torsion.atom4),
                    ],
                    &mut map,
                );
            }
        }
        StructCollection::Impropers => {
            for improper in &structure.impropers {
                record(
                    improper.improper_type.map(TypeKey::Improper),
                    vec![
                        type_name(improper.atom1),
                        type_name(improper.atom2),
                        type_name(improper.atom3),
                        type_name(improper.atom4),
                    ],
                    &mut map,
                );
            }
        }
    }
    map
}

/// Validates a caller-supplied member-types map against the structure's
/// type tables, or computes the default map when none is given.
pub fn resolve_member_map(
    structure: &Structure,
    collection: StructCollection,
    impropers: bool,
    supplied: Option<&HashMap<TypeKey, Vec<String>>>,
) -> Result<HashMap<TypeKey, Vec<String>>, ConvertError> {
    let Some(supplied) = supplied else {
        return Ok(member_types_map(structure, collection, impropers));
    };
    for key in supplied.keys() {
        let (len, index, kind) = match key {
            TypeKey::Atom(i) => (structure.atom_types.len(), *i, "atom"),
            TypeKey::Bond(i) => (structure.bond_types.len(), *i, "bond"),
            TypeKey::Angle(i) => (structure.angle_types.len(), *i, "angle"),
            TypeKey::Dihedral(i) => (structure.dihedral_types.len(), *i, "dihedral"),
            TypeKey::RbTorsion(i) => (structure.rb_torsion_types.len(), *i, "rb_torsion"),
            TypeKey::Improper(i) => (structure.improper_types.len(), *i, "improper"),
        };
        if index >= len {
            return Err(ConvertError::Configuration(format!(
                "{kind} type index {index} does not exist in the structure"
            )));
        }
    }
    Ok(supplied.clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::external::structure::{StructAtom, StructBond, StructBondType, StructDihedral};

    fn typed_atom(name: &str, type_name: &str) -> StructAtom {
        StructAtom {
            name: name.to_string(),
            type_name: type_name.to_string(),
            ..StructAtom::default()
        }
    }

    fn two_bond_structure() -> Structure {
        let mut s = Structure::new("x");
        s.add_atom(typed_atom("C1", "CT"), "RES", 0);
        s.add_atom(typed_atom("H1", "HC"), "RES", 0);
        s.add_atom(typed_atom("H2", "HC"), "RES", 0);
        s.bond_types.push(StructBondType { idx: None, k: 340.0, req: 1.09 });
        s.add_bond(0, 1, Some(0)).unwrap();
        s.add_bond(0, 2, Some(0)).unwrap();
        s
    }

    #[test]
    fn shared_record_yields_one_entry() {
        let s = two_bond_structure();
        let map = member_types_map(&s, StructCollection::Bonds, false);
        assert_eq!(map.len(), 1);
        assert_eq!(
            map.get(&TypeKey::Bond(0)).unwrap(),
            &vec!["CT".to_string(), "HC".to_string()]
        );
    }

    #[test]
    fn first_occurrence_fixes_the_member_tuple() {
        let mut s = two_bond_structure();
        // A third bond with the same record but reversed member order must
        // not override the recorded tuple.
        s.add_bond(1, 0, Some(0)).unwrap();
        let map = member_types_map(&s, StructCollection::Bonds, false);
        assert_eq!(
            map.get(&TypeKey::Bond(0)).unwrap(),
            &vec!["CT".to_string(), "HC".to_string()]
        );
    }

    #[test]
    fn partially_typed_members_are_dropped() {
        let mut s = Structure::new("x");
        s.add_atom(typed_atom("C1", "CT"), "RES", 0);
        s.add_atom(typed_atom("H1", ""), "RES", 0);
        s.bond_types.push(StructBondType { idx: None, k: 340.0, req: 1.09 });
        s.add_bond(0, 1, Some(0)).unwrap();
        let map = member_types_map(&s, StructCollection::Bonds, false);
        assert!(map.is_empty());
    }

    #[test]
    fn untyped_instances_are_skipped() {
        let mut s = Structure::new("x");
        s.add_atom(typed_atom("C1", "CT"), "RES", 0);
        s.add_atom(typed_atom("C2", "CT"), "RES", 0);
        s.add_bond(0, 1, None).unwrap();
        let map = member_types_map(&s, StructCollection::Bonds, false);
        assert!(map.is_empty());
    }

    #[test]
    fn improper_flag_partitions_torsion_instances() {
        let mut s = Structure::new("x");
        for name in ["A", "B", "C", "D"] {
            s.add_atom(typed_atom(name, "CT"), "RES", 0);
        }
        s.dihedral_types.push(Default::default());
        s.dihedral_types.push(Default::default());
        s.dihedrals.push(StructDihedral {
            atom1: 0,
            atom2: 1,
            atom3: 2,
            atom4: 3,
            dihedral_type: Some(0),
            improper: false,
        });
        s.dihedrals.push(StructDihedral {
            atom1: 3,
            atom2: 2,
            atom3: 1,
            atom4: 0,
            dihedral_type: Some(1),
            improper: true,
        });

        let proper = member_types_map(&s, StructCollection::Dihedrals, false);
        assert_eq!(proper.len(), 1);
        assert!(proper.contains_key(&TypeKey::Dihedral(0)));

        let improper = member_types_map(&s, StructCollection::Dihedrals, true);
        assert_eq!(improper.len(), 1);
        assert!(improper.contains_key(&TypeKey::Dihedral(1)));
    }

    #[test]
    fn resolve_member_map_accepts_valid_override() {
        let s = two_bond_structure();
        let supplied = HashMap::from([(
            TypeKey::Bond(0),
            vec!["XX".to_string(), "YY".to_string()],
        )]);
        let map =
            resolve_member_map(&s, StructCollection::Bonds, false, Some(&supplied)).unwrap();
        assert_eq!(
            map.get(&TypeKey::Bond(0)).unwrap(),
            &vec!["XX".to_string(), "YY".to_string()]
        );
    }

    #[test]
    fn resolve_member_map_rejects_dangling_override() {
        let s = two_bond_structure();
        let supplied = HashMap::from([(
            TypeKey::Bond(7),
            vec!["XX".to_string(), "YY".to_string()],
        )]);
        let err =
            resolve_member_map(&s, StructCollection::Bonds, false, Some(&supplied)).unwrap_err();
        assert!(matches!(err, ConvertError::Configuration(_)));
    }

    #[test]
    fn atoms_collection_uses_type_name_as_single_member() {
        let mut s = Structure::new("x");
        let mut atom = typed_atom("C1", "CT");
        atom.atom_type = Some(0);
        s.add_atom(atom, "RES", 0);
        let map = member_types_map(&s, StructCollection::Atoms, false);
        assert_eq!(map.get(&TypeKey::Atom(0)).unwrap(), &vec!["CT".to_string()]);
    }
}
