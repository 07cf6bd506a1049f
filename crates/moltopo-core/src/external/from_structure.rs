//! Forward conversion: external structure to internal topology.
//!
//! The walk order is fixed: box, type tables (when type transfer is
//! requested), residues/sites, bonds, angles, dihedrals, RB torsions,
//! impropers, then the topology-wide connectivity rebuild and the
//! combining-rule copy.
//!
//! Canonical internal types are materialized lazily: a raw record's
//! parameters are prepared up front, but the internal type object is
//! created on the first instance that references it and reused for every
//! later instance with the same identity key. Raw records no instance
//! references never enter the topology.

use super::ConvertError;
use super::dedup::{StructCollection, TypeKey, member_types_map};
use super::structure::Structure;
use crate::core::models::connection::{Angle, Bond, Dihedral, Improper};
use crate::core::models::element;
use crate::core::models::ids::{
    AngleTypeId, AtomTypeId, BondTypeId, DihedralTypeId, ImproperTypeId, SiteId,
};
use crate::core::models::simbox::SimBox;
use crate::core::models::site::{GroupLabel, Site};
use crate::core::models::topology::Topology;
use crate::core::models::types::{AngleType, AtomType, BondType, DihedralType, ImproperType};
use crate::core::potential::expression::PotentialExpression;
use crate::core::potential::forms::{
    FormCatalog, HARMONIC_ANGLE, HARMONIC_BOND, HARMONIC_IMPROPER, LENNARD_JONES,
    PERIODIC_IMPROPER, PERIODIC_TORSION, RYCKAERT_BELLEMANS,
};
use crate::core::units::{
    AMU, ANGSTROM, DEGREE, DIMENSIONLESS, ELEMENTARY_CHARGE, KCAL_PER_MOL,
    KCAL_PER_MOL_ANGSTROM2, KCAL_PER_MOL_RAD2, Quantity, Quantity3,
};
use std::collections::{BTreeMap, HashMap, HashSet};
use tracing::warn;

/// Converts an external structure into an internal topology.
///
/// With `transfer_types` set, raw atom/bond/angle/torsion/improper type
/// records are deduplicated into canonical internal types; otherwise the
/// produced sites and connections carry no types.
pub fn from_structure(
    structure: &Structure,
    transfer_types: bool,
    catalog: &FormCatalog,
) -> Result<Topology, ConvertError> {
    validate_structure(structure)?;

    let mut top = Topology::new(&structure.title);

    if let Some(dims) = structure.box_dims {
        if dims.iter().all(|v| *v != 0.0) {
            top.set_simbox(Some(SimBox::new(
                Quantity3::from_array([dims[0], dims[1], dims[2]], ANGSTROM),
                Some([
                    Quantity::new(dims[3], DEGREE),
                    Quantity::new(dims[4], DEGREE),
                    Quantity::new(dims[5], DEGREE),
                ]),
            )?));
        }
    }

    let mut resolver = if transfer_types {
        Some(TypeResolver::prepare(structure, catalog)?)
    } else {
        None
    };

    let independent_residues = check_independent_residues(structure);
    let mut site_map: HashMap<usize, SiteId> = HashMap::new();
    for (residue_idx, residue) in structure.residues.iter().enumerate() {
        for &atom_idx in &residue.atoms {
            let atom = &structure.atoms[atom_idx];
            let mut site = Site::new(
                &atom.name,
                Quantity3::from_array([atom.xx, atom.xy, atom.xz], ANGSTROM),
            );
            site.charge = Some(Quantity::new(atom.charge, ELEMENTARY_CHARGE));
            site.element = if atom.atomic_number > 0 {
                element::by_atomic_number(atom.atomic_number)
            } else {
                None
            };
            site.residue = Some(GroupLabel::new(&residue.name, residue_idx as isize));
            site.molecule = independent_residues
                .then(|| GroupLabel::new(&residue.name, residue_idx as isize));
            if let (Some(resolver), Some(type_idx)) = (resolver.as_mut(), atom.atom_type) {
                site.atom_type = resolver.resolve_atom(&mut top, type_idx);
            }
            site_map.insert(atom_idx, top.add_site(site));
        }
    }

    for bond in &structure.bonds {
        let mut connection = Bond::new([site_map[&bond.atom1], site_map[&bond.atom2]]);
        if let (Some(resolver), Some(type_idx)) = (resolver.as_mut(), bond.bond_type) {
            connection.bond_type = resolver.resolve_bond(&mut top, type_idx);
        }
        top.add_bond(connection)?;
    }

    for angle in &structure.angles {
        let mut connection = Angle::new([
            site_map[&angle.atom1],
            site_map[&angle.atom2],
            site_map[&angle.atom3],
        ]);
        if let (Some(resolver), Some(type_idx)) = (resolver.as_mut(), angle.angle_type) {
            connection.angle_type = resolver.resolve_angle(&mut top, type_idx);
        }
        top.add_angle(connection)?;
    }

    for dihedral in &structure.dihedrals {
        let members = [
            site_map[&dihedral.atom1],
            site_map[&dihedral.atom2],
            site_map[&dihedral.atom3],
            site_map[&dihedral.atom4],
        ];
        if dihedral.improper {
            // The external format's improper ordering convention lists the
            // central atom first, so the member order is preserved.
            warn!(
                "improper torsion over atoms {:?} follows the periodic expression; \
                 stored as an improper with a periodic improper type",
                (dihedral.atom1, dihedral.atom2, dihedral.atom3, dihedral.atom4)
            );
            let mut connection = Improper::new(members);
            if let (Some(resolver), Some(type_idx)) = (resolver.as_mut(), dihedral.dihedral_type)
            {
                connection.improper_type =
                    resolver.resolve_improper(&mut top, TypeKey::Dihedral(type_idx));
            }
            top.add_improper(connection)?;
        } else {
            let mut connection = Dihedral::new(members);
            if let (Some(resolver), Some(type_idx)) = (resolver.as_mut(), dihedral.dihedral_type)
            {
                connection.dihedral_type =
                    resolver.resolve_dihedral(&mut top, TypeKey::Dihedral(type_idx));
            }
            top.add_dihedral(connection)?;
        }
    }

    for torsion in &structure.rb_torsions {
        if torsion.improper {
            // Unlike the periodic case above, an improper-flagged RB
            // torsion stays a dihedral carrying the RB expression.
            warn!(
                "improper torsion over atoms {:?} follows the RB expression; \
                 stored as a dihedral with an RB torsion type",
                (torsion.atom1, torsion.atom2, torsion.atom3, torsion.atom4)
            );
        }
        let mut connection = Dihedral::new([
            site_map[&torsion.atom1],
            site_map[&torsion.atom2],
            site_map[&torsion.atom3],
            site_map[&torsion.atom4],
        ]);
        if let (Some(resolver), Some(type_idx)) = (resolver.as_mut(), torsion.rb_type) {
            connection.dihedral_type =
                resolver.resolve_dihedral(&mut top, TypeKey::RbTorsion(type_idx));
        }
        top.add_dihedral(connection)?;
    }

    for improper in &structure.impropers {
        // Central atom first, per the same ordering convention.
        let mut connection = Improper::new([
            site_map[&improper.atom1],
            site_map[&improper.atom2],
            site_map[&improper.atom3],
            site_map[&improper.atom4],
        ]);
        if let (Some(resolver), Some(type_idx)) = (resolver.as_mut(), improper.improper_type) {
            connection.improper_type =
                resolver.resolve_improper(&mut top, TypeKey::Improper(type_idx));
        }
        top.add_improper(connection)?;
    }

    top.update_topology();
    top.set_combining_rule(structure.combining_rule);
    Ok(top)
}

/// Entry validation: every cross-reference must resolve. A dangling index
/// means the argument is not a consistent structure.
fn validate_structure(structure: &Structure) -> Result<(), ConvertError> {
    let n_atoms = structure.atoms.len();
    let check_atom = |index: usize, what: &str| {
        if index >= n_atoms {
            Err(ConvertError::TypeMismatch(format!(
                "{what} references atom {index}, but the structure has {n_atoms} atoms"
            )))
        } else {
            Ok(())
        }
    };

    let mut covered: HashSet<usize> = HashSet::new();
    for residue in structure.residues.iter() {
        for &atom_idx in &residue.atoms {
            check_atom(atom_idx, "residue")?;
            if !covered.insert(atom_idx) {
                return Err(ConvertError::TypeMismatch(format!(
                    "atom {atom_idx} belongs to more than one residue"
                )));
            }
        }
    }
    if covered.len() != n_atoms {
        return Err(ConvertError::TypeMismatch(format!(
            "residues cover {} atoms, but the structure has {n_atoms}",
            covered.len()
        )));
    }

    for bond in &structure.bonds {
        check_atom(bond.atom1, "bond")?;
        check_atom(bond.atom2, "bond")?;
        check_type(bond.bond_type, structure.bond_types.len(), "bond")?;
    }
    for angle in &structure.angles {
        for index in [angle.atom1, angle.atom2, angle.atom3] {
            check_atom(index, "angle")?;
        }
        check_type(angle.angle_type, structure.angle_types.len(), "angle")?;
    }
    for dihedral in &structure.dihedrals {
        for index in [dihedral.atom1, dihedral.atom2, dihedral.atom3, dihedral.atom4] {
            check_atom(index, "dihedral")?;
        }
        check_type(
            dihedral.dihedral_type,
            structure.dihedral_types.len(),
            "dihedral",
        )?;
    }
    for torsion in &structure.rb_torsions {
        for index in [torsion.atom1, torsion.atom2, torsion.atom3, torsion.atom4] {
            check_atom(index, "rb_torsion")?;
        }
        check_type(torsion.rb_type, structure.rb_torsion_types.len(), "rb_torsion")?;
    }
    for improper in &structure.impropers {
        for index in [improper.atom1, improper.atom2, improper.atom3, improper.atom4] {
            check_atom(index, "improper")?;
        }
        check_type(
            improper.improper_type,
            structure.improper_types.len(),
            "improper",
        )?;
    }
    for atom in &structure.atoms {
        check_type(atom.atom_type, structure.atom_types.len(), "atom")?;
    }
    Ok(())
}

fn check_type(
    reference: Option<usize>,
    table_len: usize,
    kind: &str,
) -> Result<(), ConvertError> {
    match reference {
        Some(index) if index >= table_len => Err(ConvertError::TypeMismatch(format!(
            "{kind} references {kind} type {index}, but the table has {table_len} records"
        ))),
        _ => Ok(()),
    }
}

/// Residues count as independent molecules iff, for every residue with any
/// bonded atom, the union of its atoms' bond partners equals its own atom
/// set. One bond crossing any residue boundary disqualifies the whole
/// structure, so the check spans all residues in a single pass.
fn check_independent_residues(structure: &Structure) -> bool {
    for residue in structure.residues.iter() {
        let atoms: HashSet<usize> = residue.atoms.iter().copied().collect();
        let mut partners: HashSet<usize> = HashSet::new();
        for &atom_idx in &residue.atoms {
            partners.extend(structure.atoms[atom_idx].bond_partners.iter().copied());
        }
        if partners.is_empty() {
            continue;
        }
        if atoms != partners {
            return false;
        }
    }
    true
}

/// Prepared raw types plus lazily assigned internal ids, keyed by the raw
/// record's synthetic identity.
struct TypeResolver {
    atom_raw: HashMap<usize, AtomType>,
    atom_ids: HashMap<usize, AtomTypeId>,
    bond_raw: HashMap<usize, BondType>,
    bond_ids: HashMap<usize, BondTypeId>,
    angle_raw: HashMap<usize, AngleType>,
    angle_ids: HashMap<usize, AngleTypeId>,
    dihedral_raw: HashMap<TypeKey, DihedralType>,
    dihedral_ids: HashMap<TypeKey, DihedralTypeId>,
    improper_raw: HashMap<TypeKey, ImproperType>,
    improper_ids: HashMap<TypeKey, ImproperTypeId>,
}

impl TypeResolver {
    fn prepare(structure: &Structure, catalog: &FormCatalog) -> Result<Self, ConvertError> {
        Ok(Self {
            atom_raw: prepare_atom_types(structure, catalog)?,
            atom_ids: HashMap::new(),
            bond_raw: prepare_bond_types(structure, catalog)?,
            bond_ids: HashMap::new(),
            angle_raw: prepare_angle_types(structure, catalog)?,
            angle_ids: HashMap::new(),
            dihedral_raw: prepare_dihedral_types(structure, catalog)?,
            dihedral_ids: HashMap::new(),
            improper_raw: prepare_improper_types(structure, catalog)?,
            improper_ids: HashMap::new(),
        })
    }

    fn resolve_atom(&mut self, top: &mut Topology, idx: usize) -> Option<AtomTypeId> {
        if let Some(id) = self.atom_ids.get(&idx) {
            return Some(*id);
        }
        let raw = self.atom_raw.get(&idx)?;
        let id = top.add_atom_type(raw.clone());
        self.atom_ids.insert(idx, id);
        Some(id)
    }

    fn resolve_bond(&mut self, top: &mut Topology, idx: usize) -> Option<BondTypeId> {
        if let Some(id) = self.bond_ids.get(&idx) {
            return Some(*id);
        }
        let raw = self.bond_raw.get(&idx)?;
        let id = top.add_bond_type(raw.clone());
        self.bond_ids.insert(idx, id);
        Some(id)
    }

    fn resolve_angle(&mut self, top: &mut Topology, idx: usize) -> Option<AngleTypeId> {
        if let Some(id) = self.angle_ids.get(&idx) {
            return Some(*id);
        }
        let raw = self.angle_raw.get(&idx)?;
        let id = top.add_angle_type(raw.clone());
        self.angle_ids.insert(idx, id);
        Some(id)
    }

    fn resolve_dihedral(&mut self, top: &mut Topology, key: TypeKey) -> Option<DihedralTypeId> {
        if let Some(id) = self.dihedral_ids.get(&key) {
            return Some(*id);
        }
        let raw = self.dihedral_raw.get(&key)?;
        let id = top.add_dihedral_type(raw.clone());
        self.dihedral_ids.insert(key, id);
        Some(id)
    }

    fn resolve_improper(&mut self, top: &mut Topology, key: TypeKey) -> Option<ImproperTypeId> {
        if let Some(id) = self.improper_ids.get(&key) {
            return Some(*id);
        }
        let raw = self.improper_raw.get(&key)?;
        let id = top.add_improper_type(raw.clone());
        self.improper_ids.insert(key, id);
        Some(id)
    }
}

fn prepare_atom_types(
    structure: &Structure,
    catalog: &FormCatalog,
) -> Result<HashMap<usize, AtomType>, ConvertError> {
    let lj = catalog
        .get(LENNARD_JONES)
        .ok_or_else(|| missing_form(LENNARD_JONES))?;
    let mut raw = HashMap::new();
    for (idx, record) in structure.atom_types.iter().enumerate() {
        // Prefer the atomic number; fall back to treating the type name as
        // an element tag.
        let element_tag = if record.atomic_number > 0 {
            element::by_atomic_number(record.atomic_number).map(|e| e.symbol.to_string())
        } else {
            Some(record.name.clone())
        };
        let expression = PotentialExpression::from_form(
            lj,
            BTreeMap::from([
                ("sigma".to_string(), Quantity::new(record.sigma(), ANGSTROM)),
                (
                    "epsilon".to_string(),
                    Quantity::new(record.epsilon, KCAL_PER_MOL),
                ),
            ]),
        )?;
        raw.insert(
            idx,
            AtomType {
                name: record.name.clone(),
                charge: Quantity::new(record.charge, ELEMENTARY_CHARGE),
                mass: Quantity::new(record.mass, AMU),
                element_tag,
                expression,
            },
        );
    }
    Ok(raw)
}

fn prepare_bond_types(
    structure: &Structure,
    catalog: &FormCatalog,
) -> Result<HashMap<usize, BondType>, ConvertError> {
    let form = catalog
        .get(HARMONIC_BOND)
        .ok_or_else(|| missing_form(HARMONIC_BOND))?;
    let members = member_types_map(structure, StructCollection::Bonds, false);
    let mut raw = HashMap::new();
    for (idx, record) in structure.bond_types.iter().enumerate() {
        // The external k carries the implicit 1/2 prefactor; the internal
        // harmonic form is 0.5*k*(r - r_eq)**2, so k doubles.
        let expression = PotentialExpression::from_form(
            form,
            BTreeMap::from([
                (
                    "k".to_string(),
                    Quantity::new(2.0 * record.k, KCAL_PER_MOL_ANGSTROM2),
                ),
                ("r_eq".to_string(), Quantity::new(record.req, ANGSTROM)),
            ]),
        )?;
        let member_types = members
            .get(&TypeKey::Bond(idx))
            .and_then(|m| <[String; 2]>::try_from(m.clone()).ok());
        raw.insert(idx, BondType::new(expression, member_types));
    }
    Ok(raw)
}

fn prepare_angle_types(
    structure: &Structure,
    catalog: &FormCatalog,
) -> Result<HashMap<usize, AngleType>, ConvertError> {
    let form = catalog
        .get(HARMONIC_ANGLE)
        .ok_or_else(|| missing_form(HARMONIC_ANGLE))?;
    let members = member_types_map(structure, StructCollection::Angles, false);
    let mut raw = HashMap::new();
    for (idx, record) in structure.angle_types.iter().enumerate() {
        let expression = PotentialExpression::from_form(
            form,
            BTreeMap::from([
                (
                    "k".to_string(),
                    Quantity::new(2.0 * record.k, KCAL_PER_MOL_RAD2),
                ),
                (
                    "theta_eq".to_string(),
                    Quantity::new(record.theteq, DEGREE),
                ),
            ]),
        )?;
        let member_types = members
            .get(&TypeKey::Angle(idx))
            .and_then(|m| <[String; 3]>::try_from(m.clone()).ok());
        raw.insert(idx, AngleType::new(expression, member_types));
    }
    Ok(raw)
}

/// Dihedral raw types cover both torsion tables: periodic records under
/// `TypeKey::Dihedral`, RB records under `TypeKey::RbTorsion`.
fn prepare_dihedral_types(
    structure: &Structure,
    catalog: &FormCatalog,
) -> Result<HashMap<TypeKey, DihedralType>, ConvertError> {
    let periodic = catalog
        .get(PERIODIC_TORSION)
        .ok_or_else(|| missing_form(PERIODIC_TORSION))?;
    let rb = catalog
        .get(RYCKAERT_BELLEMANS)
        .ok_or_else(|| missing_form(RYCKAERT_BELLEMANS))?;

    let mut members = member_types_map(structure, StructCollection::Dihedrals, false);
    members.extend(member_types_map(structure, StructCollection::RbTorsions, false));

    let mut raw = HashMap::new();
    for (idx, record) in structure.dihedral_types.iter().enumerate() {
        let key = TypeKey::Dihedral(idx);
        let expression = PotentialExpression::from_form(
            periodic,
            BTreeMap::from([
                ("k".to_string(), Quantity::new(record.phi_k, KCAL_PER_MOL)),
                ("phi_eq".to_string(), Quantity::new(record.phase, DEGREE)),
                ("n".to_string(), Quantity::new(record.per, DIMENSIONLESS)),
            ]),
        )?;
        let member_types = members
            .get(&key)
            .and_then(|m| <[String; 4]>::try_from(m.clone()).ok());
        raw.insert(key, DihedralType::new(expression, member_types));
    }
    for (idx, record) in structure.rb_torsion_types.iter().enumerate() {
        let key = TypeKey::RbTorsion(idx);
        let expression = PotentialExpression::from_form(
            rb,
            BTreeMap::from([
                ("c0".to_string(), Quantity::new(record.c0, KCAL_PER_MOL)),
                ("c1".to_string(), Quantity::new(record.c1, KCAL_PER_MOL)),
                ("c2".to_string(), Quantity::new(record.c2, KCAL_PER_MOL)),
                ("c3".to_string(), Quantity::new(record.c3, KCAL_PER_MOL)),
                ("c4".to_string(), Quantity::new(record.c4, KCAL_PER_MOL)),
                ("c5".to_string(), Quantity::new(record.c5, KCAL_PER_MOL)),
            ]),
        )?;
        let member_types = members
            .get(&key)
            .and_then(|m| <[String; 4]>::try_from(m.clone()).ok());
        raw.insert(key, DihedralType::new(expression, member_types));
    }
    Ok(raw)
}

/// Improper raw types cover the dedicated improper table (harmonic form)
/// and, additionally, every periodic torsion record (periodic improper
/// form) so that improper-flagged torsion instances resolve to an improper
/// type sharing the underlying record's identity.
fn prepare_improper_types(
    structure: &Structure,
    catalog: &FormCatalog,
) -> Result<HashMap<TypeKey, ImproperType>, ConvertError> {
    let periodic = catalog
        .get(PERIODIC_IMPROPER)
        .ok_or_else(|| missing_form(PERIODIC_IMPROPER))?;
    let harmonic = catalog
        .get(HARMONIC_IMPROPER)
        .ok_or_else(|| missing_form(HARMONIC_IMPROPER))?;

    let mut members = member_types_map(structure, StructCollection::Impropers, true);
    members.extend(member_types_map(structure, StructCollection::Dihedrals, true));

    let mut raw = HashMap::new();
    for (idx, record) in structure.dihedral_types.iter().enumerate() {
        let key = TypeKey::Dihedral(idx);
        let expression = PotentialExpression::from_form(
            periodic,
            BTreeMap::from([
                ("k".to_string(), Quantity::new(record.phi_k, KCAL_PER_MOL)),
                ("phi_eq".to_string(), Quantity::new(record.phase, DEGREE)),
                ("n".to_string(), Quantity::new(record.per, DIMENSIONLESS)),
            ]),
        )?;
        let member_types = members
            .get(&key)
            .and_then(|m| <[String; 4]>::try_from(m.clone()).ok());
        raw.insert(key, ImproperType::new(expression, member_types));
    }
    for (idx, record) in structure.improper_types.iter().enumerate() {
        let key = TypeKey::Improper(idx);
        let expression = PotentialExpression::from_form(
            harmonic,
            BTreeMap::from([
                (
                    "k".to_string(),
                    Quantity::new(record.psi_k, KCAL_PER_MOL_RAD2),
                ),
                ("phi_eq".to_string(), Quantity::new(record.psi_eq, DEGREE)),
            ]),
        )?;
        let member_types = members
            .get(&key)
            .and_then(|m| <[String; 4]>::try_from(m.clone()).ok());
        raw.insert(key, ImproperType::new(expression, member_types));
    }
    Ok(raw)
}

fn missing_form(name: &str) -> ConvertError {
    ConvertError::Configuration(format!("form catalog is missing '{name}'"))
}
