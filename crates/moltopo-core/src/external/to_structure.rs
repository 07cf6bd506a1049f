//! Reverse conversion: internal topology to external structure.
//!
//! The walk order is fixed: sites become atoms grouped into residues
//! (claimed once all atoms are added so indices come out contiguous), then
//! bonds, angles, and dihedrals — the latter split between the periodic and
//! RB collections by expression match — and finally, when type transfer is
//! requested, one external type record per canonical internal type with a
//! back-assignment pass over the instances.
//!
//! Before any parameters are emitted for a type kind, every internal type
//! of that kind must match the single functional form the external format
//! supports; a mismatch is a fatal [`ConvertError::FormatIncompatibility`].
//! Internal impropers and improper types have no counterpart on this path
//! and are not emitted, mirroring the host object model's surface.

use super::ConvertError;
use super::structure::{
    StructAngle, StructAtom, StructAtomType, StructAngleType, StructBondType, StructDihedral,
    StructDihedralType, StructRbTorsion, StructRbTorsionType, Structure,
};
use crate::core::models::element;
use crate::core::models::ids::{AngleTypeId, AtomTypeId, BondTypeId, DihedralTypeId, SiteId};
use crate::core::models::topology::Topology;
use crate::core::models::types::AtomType;
use crate::core::potential::forms::{
    FormCatalog, HARMONIC_ANGLE, HARMONIC_BOND, LENNARD_JONES, PERIODIC_TORSION,
    RYCKAERT_BELLEMANS,
};
use crate::core::units::{
    AMU, ANGSTROM, DEGREE, DIMENSIONLESS, ELEMENTARY_CHARGE, KCAL_PER_MOL,
    KCAL_PER_MOL_ANGSTROM2, KCAL_PER_MOL_RAD2,
};
use std::collections::HashMap;

/// Where a dihedral instance (or its type) landed in the external
/// structure: the periodic collection or the RB collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TorsionSlot {
    Periodic(usize),
    Rb(usize),
}

/// Converts an internal topology into an external structure.
pub fn to_structure(
    top: &Topology,
    transfer_types: bool,
    catalog: &FormCatalog,
) -> Result<Structure, ConvertError> {
    let mut structure = Structure::new(top.name());

    if let Some(simbox) = top.simbox() {
        let lengths = simbox.lengths().to(ANGSTROM)?.values();
        let angles = simbox.angles();
        structure.box_dims = Some([
            lengths.x,
            lengths.y,
            lengths.z,
            angles[0].value_in(DEGREE)?,
            angles[1].value_in(DEGREE)?,
            angles[2].value_in(DEGREE)?,
        ]);
    }

    // Sites -> atoms/residues. Residue indices are claimed only after all
    // atoms are in, letting the host collection assign contiguous ranges.
    let mut atom_map: HashMap<SiteId, usize> = HashMap::new();
    for (site_id, site) in top.sites() {
        let mut atom = StructAtom::new(&site.name);
        if let Some(el) = site.element {
            atom.atomic_number = el.atomic_number;
            atom.mass = el.mass;
        }
        if let Some(charge) = site.charge {
            atom.charge = charge.value_in(ELEMENTARY_CHARGE)?;
        }
        let position = site.position.to(ANGSTROM)?.values();
        atom.xx = position.x;
        atom.xy = position.y;
        atom.xz = position.z;

        let atom_idx = match &site.residue {
            Some(residue) => structure.add_atom(atom, &residue.name, residue.number),
            None => structure.add_atom(atom, "RES", -1),
        };
        atom_map.insert(site_id, atom_idx);
    }
    structure.residues.claim();

    let mut bond_map: HashMap<usize, usize> = HashMap::new();
    for (internal_idx, bond) in top.bonds().iter().enumerate() {
        let [a, b] = bond.members;
        let external_idx = structure.add_bond(atom_map[&a], atom_map[&b], None)?;
        bond_map.insert(internal_idx, external_idx);
    }

    let mut angle_map: HashMap<usize, usize> = HashMap::new();
    for (internal_idx, angle) in top.angles().iter().enumerate() {
        let [a, b, c] = angle.members;
        structure.angles.push(StructAngle {
            atom1: atom_map[&a],
            atom2: atom_map[&b],
            atom3: atom_map[&c],
            angle_type: None,
        });
        angle_map.insert(internal_idx, structure.angles.len() - 1);
    }

    // Dihedrals split by expression: RB-form types go to the RB torsion
    // collection, everything else (periodic or untyped) to the dihedral
    // collection.
    let rb_form = catalog
        .get(RYCKAERT_BELLEMANS)
        .ok_or_else(|| missing_form(RYCKAERT_BELLEMANS))?;
    let mut dihedral_map: HashMap<usize, TorsionSlot> = HashMap::new();
    for (internal_idx, dihedral) in top.dihedrals().iter().enumerate() {
        let [a, b, c, d] = dihedral.members;
        let (atom1, atom2, atom3, atom4) =
            (atom_map[&a], atom_map[&b], atom_map[&c], atom_map[&d]);
        let is_rb = dihedral
            .dihedral_type
            .and_then(|id| top.dihedral_type(id))
            .map(|dt| dt.expression.matches_form(rb_form))
            .unwrap_or(false);
        if is_rb {
            structure.rb_torsions.push(StructRbTorsion {
                atom1,
                atom2,
                atom3,
                atom4,
                rb_type: None,
                improper: false,
            });
            dihedral_map.insert(internal_idx, TorsionSlot::Rb(structure.rb_torsions.len() - 1));
        } else {
            structure.dihedrals.push(StructDihedral {
                atom1,
                atom2,
                atom3,
                atom4,
                dihedral_type: None,
                improper: false,
            });
            dihedral_map.insert(
                internal_idx,
                TorsionSlot::Periodic(structure.dihedrals.len() - 1),
            );
        }
    }

    if transfer_types {
        if top.n_atom_types() > 0 {
            atom_types_to_structure(top, &mut structure, &atom_map, catalog)?;
        }
        if top.n_bond_types() > 0 {
            bond_types_to_structure(top, &mut structure, &bond_map, catalog)?;
        }
        if top.n_angle_types() > 0 {
            angle_types_to_structure(top, &mut structure, &angle_map, catalog)?;
        }
        if top.n_dihedral_types() > 0 {
            dihedral_types_to_structure(top, &mut structure, &dihedral_map, catalog)?;
        }
    }

    Ok(structure)
}

/// Element resolution for an atom type: the explicit element tag first,
/// then the type name, then the mass.
fn element_for_atom_type(atom_type: &AtomType) -> Option<&'static element::Element> {
    if let Some(tag) = &atom_type.element_tag {
        if let Some(el) = element::by_symbol(tag) {
            return Some(el);
        }
    }
    if let Some(el) = element::by_name_prefix(&atom_type.name) {
        return Some(el);
    }
    atom_type
        .mass
        .value_in(AMU)
        .ok()
        .and_then(element::by_mass)
}

fn atom_types_to_structure(
    top: &Topology,
    structure: &mut Structure,
    atom_map: &HashMap<SiteId, usize>,
    catalog: &FormCatalog,
) -> Result<(), ConvertError> {
    let lj = catalog
        .get(LENNARD_JONES)
        .ok_or_else(|| missing_form(LENNARD_JONES))?;

    let mut type_map: HashMap<AtomTypeId, usize> = HashMap::new();
    for (type_id, atom_type) in top.atom_types() {
        if !atom_type.expression.matches_form(lj) {
            return Err(incompatible("atom", &atom_type.name, LENNARD_JONES));
        }
        let sigma = param(atom_type, "sigma")?.value_in(ANGSTROM)?;
        let epsilon = param(atom_type, "epsilon")?.value_in(KCAL_PER_MOL)?;
        let (atomic_number, mass) = match element_for_atom_type(atom_type) {
            Some(el) => (el.atomic_number, el.mass),
            None => (0, atom_type.mass.value_in(AMU)?),
        };
        let mut record = StructAtomType {
            name: atom_type.name.clone(),
            idx: None,
            atomic_number,
            mass,
            charge: atom_type.charge.value_in(ELEMENTARY_CHARGE)?,
            ..StructAtomType::default()
        };
        record.set_lj_params(epsilon, sigma * 2.0_f64.powf(1.0 / 6.0) / 2.0);
        let external_idx = structure.atom_types.push(record);
        type_map.insert(type_id, external_idx);
    }

    for (site_id, site) in top.sites() {
        if let Some(type_id) = site.atom_type {
            let atom = &mut structure.atoms[atom_map[&site_id]];
            if let Some(atom_type) = top.atom_type(type_id) {
                atom.type_name = atom_type.name.clone();
            }
            atom.atom_type = Some(type_map[&type_id]);
        }
    }
    Ok(())
}

fn bond_types_to_structure(
    top: &Topology,
    structure: &mut Structure,
    bond_map: &HashMap<usize, usize>,
    catalog: &FormCatalog,
) -> Result<(), ConvertError> {
    let form = catalog
        .get(HARMONIC_BOND)
        .ok_or_else(|| missing_form(HARMONIC_BOND))?;

    let mut type_map: HashMap<BondTypeId, usize> = HashMap::new();
    for (type_id, bond_type) in top.bond_types() {
        if !bond_type.expression.matches_form(form) {
            return Err(incompatible("bond", &bond_type.name, HARMONIC_BOND));
        }
        let k = bond_type
            .expression
            .parameter("k")
            .ok_or_else(|| missing_parameter("bond", &bond_type.name, "k"))?
            .value_in(KCAL_PER_MOL_ANGSTROM2)?;
        let req = bond_type
            .expression
            .parameter("r_eq")
            .ok_or_else(|| missing_parameter("bond", &bond_type.name, "r_eq"))?
            .value_in(ANGSTROM)?;
        let external_idx = structure.bond_types.push(StructBondType {
            idx: None,
            // The external format's harmonic form carries the implicit 1/2.
            k: 0.5 * k,
            req,
        });
        type_map.insert(type_id, external_idx);
    }

    for (internal_idx, bond) in top.bonds().iter().enumerate() {
        if let Some(type_id) = bond.bond_type {
            structure.bonds[bond_map[&internal_idx]].bond_type = Some(type_map[&type_id]);
        }
    }
    structure.bond_types.claim();
    Ok(())
}

fn angle_types_to_structure(
    top: &Topology,
    structure: &mut Structure,
    angle_map: &HashMap<usize, usize>,
    catalog: &FormCatalog,
) -> Result<(), ConvertError> {
    let form = catalog
        .get(HARMONIC_ANGLE)
        .ok_or_else(|| missing_form(HARMONIC_ANGLE))?;

    let mut type_map: HashMap<AngleTypeId, usize> = HashMap::new();
    for (type_id, angle_type) in top.angle_types() {
        if !angle_type.expression.matches_form(form) {
            return Err(incompatible("angle", &angle_type.name, HARMONIC_ANGLE));
        }
        let k = angle_type
            .expression
            .parameter("k")
            .ok_or_else(|| missing_parameter("angle", &angle_type.name, "k"))?
            .value_in(KCAL_PER_MOL_RAD2)?;
        let theteq = angle_type
            .expression
            .parameter("theta_eq")
            .ok_or_else(|| missing_parameter("angle", &angle_type.name, "theta_eq"))?
            .value_in(DEGREE)?;
        let external_idx = structure.angle_types.push(StructAngleType {
            idx: None,
            k: 0.5 * k,
            theteq,
        });
        type_map.insert(type_id, external_idx);
    }

    for (internal_idx, angle) in top.angles().iter().enumerate() {
        if let Some(type_id) = angle.angle_type {
            structure.angles[angle_map[&internal_idx]].angle_type = Some(type_map[&type_id]);
        }
    }
    structure.angle_types.claim();
    Ok(())
}

fn dihedral_types_to_structure(
    top: &Topology,
    structure: &mut Structure,
    dihedral_map: &HashMap<usize, TorsionSlot>,
    catalog: &FormCatalog,
) -> Result<(), ConvertError> {
    let periodic = catalog
        .get(PERIODIC_TORSION)
        .ok_or_else(|| missing_form(PERIODIC_TORSION))?;
    let rb = catalog
        .get(RYCKAERT_BELLEMANS)
        .ok_or_else(|| missing_form(RYCKAERT_BELLEMANS))?;

    let mut type_map: HashMap<DihedralTypeId, TorsionSlot> = HashMap::new();
    for (type_id, dihedral_type) in top.dihedral_types() {
        if dihedral_type.expression.matches_form(periodic) {
            let phi_k = dihedral_type
                .expression
                .parameter("k")
                .ok_or_else(|| missing_parameter("dihedral", &dihedral_type.name, "k"))?
                .value_in(KCAL_PER_MOL)?;
            let phase = dihedral_type
                .expression
                .parameter("phi_eq")
                .ok_or_else(|| missing_parameter("dihedral", &dihedral_type.name, "phi_eq"))?
                .value_in(DEGREE)?;
            let per = dihedral_type
                .expression
                .parameter("n")
                .ok_or_else(|| missing_parameter("dihedral", &dihedral_type.name, "n"))?
                .value_in(DIMENSIONLESS)?;
            let idx = structure.dihedral_types.push(StructDihedralType {
                idx: None,
                phi_k,
                per,
                phase,
            });
            type_map.insert(type_id, TorsionSlot::Periodic(idx));
        } else if dihedral_type.expression.matches_form(rb) {
            let mut coefficients = [0.0f64; 6];
            for (i, slot) in coefficients.iter_mut().enumerate() {
                let name = format!("c{i}");
                *slot = dihedral_type
                    .expression
                    .parameter(&name)
                    .ok_or_else(|| missing_parameter("dihedral", &dihedral_type.name, &name))?
                    .value_in(KCAL_PER_MOL)?;
            }
            let idx = structure.rb_torsion_types.push(StructRbTorsionType {
                idx: None,
                c0: coefficients[0],
                c1: coefficients[1],
                c2: coefficients[2],
                c3: coefficients[3],
                c4: coefficients[4],
                c5: coefficients[5],
            });
            type_map.insert(type_id, TorsionSlot::Rb(idx));
        } else {
            return Err(ConvertError::FormatIncompatibility {
                kind: "dihedral",
                type_name: dihedral_type.name.clone(),
                expected: format!("{PERIODIC_TORSION}' or '{RYCKAERT_BELLEMANS}"),
            });
        }
    }

    for (internal_idx, dihedral) in top.dihedrals().iter().enumerate() {
        let Some(type_id) = dihedral.dihedral_type else {
            continue;
        };
        match (dihedral_map[&internal_idx], type_map[&type_id]) {
            (TorsionSlot::Periodic(instance), TorsionSlot::Periodic(type_idx)) => {
                structure.dihedrals[instance].dihedral_type = Some(type_idx);
            }
            (TorsionSlot::Rb(instance), TorsionSlot::Rb(type_idx)) => {
                structure.rb_torsions[instance].rb_type = Some(type_idx);
            }
            // The instance split used the same expression match, so mixed
            // slots cannot occur.
            _ => unreachable!("dihedral instance and type landed in different collections"),
        }
    }
    structure.dihedral_types.claim();
    structure.rb_torsion_types.claim();
    Ok(())
}

fn param<'a>(
    atom_type: &'a AtomType,
    name: &str,
) -> Result<&'a crate::core::units::Quantity, ConvertError> {
    atom_type
        .expression
        .parameter(name)
        .ok_or_else(|| missing_parameter("atom", &atom_type.name, name))
}

fn incompatible(kind: &'static str, type_name: &str, expected: &str) -> ConvertError {
    ConvertError::FormatIncompatibility {
        kind,
        type_name: type_name.to_string(),
        expected: expected.to_string(),
    }
}

fn missing_parameter(kind: &'static str, type_name: &str, parameter: &str) -> ConvertError {
    ConvertError::Configuration(format!(
        "{kind} type '{type_name}' is missing parameter '{parameter}'"
    ))
}

fn missing_form(name: &str) -> ConvertError {
    ConvertError::Configuration(format!("form catalog is missing '{name}'"))
}
