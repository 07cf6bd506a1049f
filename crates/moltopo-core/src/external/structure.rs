//! The external, ParmEd-style structure representation.
//!
//! Records live in arenas and refer to each other by index; an index is
//! also the stable synthetic identity the deduplication machinery keys on.
//! Type tables support bulk append followed by a one-shot [`TypeTable::claim`]
//! that assigns contiguous indices, as the host object model does.
//!
//! Parameter value conventions follow the external format: lengths in
//! angstrom, angles and phases in degrees, energies in kcal/mol, charges in
//! elementary charge units, masses in amu. Harmonic bond and angle force
//! constants carry the implicit 1/2 prefactor of the external format
//! (`E = k*(r - r_eq)**2`), so they are half the internal `k`.

use crate::core::models::topology::CombiningRule;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum StructureError {
    #[error("{kind} index {index} is out of range")]
    InvalidIndex { kind: &'static str, index: usize },
}

/// An atom record. `xx/xy/xz` are angstrom coordinates.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StructAtom {
    pub name: String,
    /// Atom-type name string; empty when untyped.
    pub type_name: String,
    /// Index into [`Structure::atom_types`].
    pub atom_type: Option<usize>,
    pub atomic_number: u8,
    pub mass: f64,
    pub charge: f64,
    pub xx: f64,
    pub xy: f64,
    pub xz: f64,
    /// Index into [`Structure::residues`], set by [`Structure::add_atom`].
    pub residue: Option<usize>,
    /// Indices of bonded atoms, maintained by [`Structure::add_bond`].
    pub bond_partners: Vec<usize>,
}

impl StructAtom {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct StructResidue {
    pub name: String,
    pub number: isize,
    /// Contiguous index assigned by [`ResidueList::claim`].
    pub idx: Option<usize>,
    pub atoms: Vec<usize>,
}

/// Residue collection with the one-shot claim/finalize step.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResidueList {
    items: Vec<StructResidue>,
}

impl ResidueList {
    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&StructResidue> {
        self.items.get(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &StructResidue> {
        self.items.iter()
    }

    /// Assigns contiguous indices to all residues. Idempotent.
    pub fn claim(&mut self) {
        for (idx, residue) in self.items.iter_mut().enumerate() {
            residue.idx = Some(idx);
        }
    }

    fn push(&mut self, residue: StructResidue) -> usize {
        self.items.push(residue);
        self.items.len() - 1
    }

    fn last_mut(&mut self) -> Option<&mut StructResidue> {
        self.items.last_mut()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StructBond {
    pub atom1: usize,
    pub atom2: usize,
    /// Index into [`Structure::bond_types`].
    pub bond_type: Option<usize>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StructAngle {
    pub atom1: usize,
    pub atom2: usize,
    pub atom3: usize,
    /// Index into [`Structure::angle_types`].
    pub angle_type: Option<usize>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StructDihedral {
    pub atom1: usize,
    pub atom2: usize,
    pub atom3: usize,
    pub atom4: usize,
    /// Index into [`Structure::dihedral_types`].
    pub dihedral_type: Option<usize>,
    /// Whether the source marked this torsion as improper. The atom
    /// ordering convention for impropers puts the central atom first.
    pub improper: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StructRbTorsion {
    pub atom1: usize,
    pub atom2: usize,
    pub atom3: usize,
    pub atom4: usize,
    /// Index into [`Structure::rb_torsion_types`].
    pub rb_type: Option<usize>,
    pub improper: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StructImproper {
    pub atom1: usize,
    pub atom2: usize,
    pub atom3: usize,
    pub atom4: usize,
    /// Index into [`Structure::improper_types`].
    pub improper_type: Option<usize>,
}

/// Lennard-Jones atom type; `rmin_half` is half the minimum-energy
/// separation, the external format's native well-position parameter.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StructAtomType {
    pub name: String,
    pub idx: Option<usize>,
    pub atomic_number: u8,
    pub mass: f64,
    pub charge: f64,
    pub epsilon: f64,
    pub rmin_half: f64,
}

impl StructAtomType {
    /// The corresponding sigma in angstrom.
    pub fn sigma(&self) -> f64 {
        self.rmin_half * 2.0 / 2.0_f64.powf(1.0 / 6.0)
    }

    pub fn set_lj_params(&mut self, epsilon: f64, rmin_half: f64) {
        self.epsilon = epsilon;
        self.rmin_half = rmin_half;
    }
}

/// Harmonic bond type with the implicit 1/2: `E = k*(r - req)**2`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StructBondType {
    pub idx: Option<usize>,
    /// kcal/(mol*angstrom**2)
    pub k: f64,
    /// angstrom
    pub req: f64,
}

/// Harmonic angle type with the implicit 1/2: `E = k*(theta - theteq)**2`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StructAngleType {
    pub idx: Option<usize>,
    /// kcal/(mol*rad**2)
    pub k: f64,
    /// degrees
    pub theteq: f64,
}

/// Periodic torsion type: `E = phi_k*(1 + cos(per*phi - phase))`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StructDihedralType {
    pub idx: Option<usize>,
    /// kcal/mol
    pub phi_k: f64,
    /// periodicity
    pub per: f64,
    /// degrees
    pub phase: f64,
}

/// Ryckaert-Bellemans torsion type; coefficients in kcal/mol.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StructRbTorsionType {
    pub idx: Option<usize>,
    pub c0: f64,
    pub c1: f64,
    pub c2: f64,
    pub c3: f64,
    pub c4: f64,
    pub c5: f64,
}

/// Harmonic improper type: `E = psi_k*(psi - psi_eq)**2`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StructImproperType {
    pub idx: Option<usize>,
    /// kcal/(mol*rad**2)
    pub psi_k: f64,
    /// degrees
    pub psi_eq: f64,
}

pub trait Indexed {
    fn set_index(&mut self, idx: usize);
    fn index(&self) -> Option<usize>;
}

macro_rules! impl_indexed {
    ($($t:ty),* $(,)?) => {
        $(impl Indexed for $t {
            fn set_index(&mut self, idx: usize) {
                self.idx = Some(idx);
            }
            fn index(&self) -> Option<usize> {
                self.idx
            }
        })*
    };
}

impl_indexed!(
    StructAtomType,
    StructBondType,
    StructAngleType,
    StructDihedralType,
    StructRbTorsionType,
    StructImproperType,
);

/// A type arena with bulk append and a one-shot claim/finalize step.
#[derive(Debug, Clone, PartialEq)]
pub struct TypeTable<T> {
    items: Vec<T>,
}

impl<T> Default for TypeTable<T> {
    fn default() -> Self {
        Self { items: Vec::new() }
    }
}

impl<T: Indexed> TypeTable<T> {
    pub fn push(&mut self, item: T) -> usize {
        self.items.push(item);
        self.items.len() - 1
    }

    pub fn get(&self, index: usize) -> Option<&T> {
        self.items.get(index)
    }

    pub fn get_mut(&mut self, index: usize) -> Option<&mut T> {
        self.items.get_mut(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.items.iter()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Assigns contiguous indices to all records. Idempotent.
    pub fn claim(&mut self) {
        for (idx, item) in self.items.iter_mut().enumerate() {
            item.set_index(idx);
        }
    }
}

/// The external structure: ordered collections of atoms, residues,
/// connections, and per-kind type tables.
#[derive(Debug, Clone, Default)]
pub struct Structure {
    pub title: String,
    /// Box lengths (angstrom) followed by angles (degrees).
    pub box_dims: Option<[f64; 6]>,
    pub combining_rule: CombiningRule,

    pub atoms: Vec<StructAtom>,
    pub residues: ResidueList,

    pub bonds: Vec<StructBond>,
    pub angles: Vec<StructAngle>,
    pub dihedrals: Vec<StructDihedral>,
    pub rb_torsions: Vec<StructRbTorsion>,
    pub impropers: Vec<StructImproper>,

    pub atom_types: TypeTable<StructAtomType>,
    pub bond_types: TypeTable<StructBondType>,
    pub angle_types: TypeTable<StructAngleType>,
    pub dihedral_types: TypeTable<StructDihedralType>,
    pub rb_torsion_types: TypeTable<StructRbTorsionType>,
    pub improper_types: TypeTable<StructImproperType>,
}

impl Structure {
    pub fn new(title: &str) -> Self {
        Self {
            title: title.to_string(),
            ..Self::default()
        }
    }

    /// Appends an atom, attaching it to the trailing residue when the
    /// residue label matches, or opening a new residue otherwise.
    pub fn add_atom(&mut self, mut atom: StructAtom, resname: &str, resnum: isize) -> usize {
        let atom_idx = self.atoms.len();
        let matches_last = self
            .residues
            .last_mut()
            .map(|r| r.name == resname && r.number == resnum)
            .unwrap_or(false);
        let residue_idx = if matches_last {
            let idx = self.residues.len() - 1;
            if let Some(residue) = self.residues.last_mut() {
                residue.atoms.push(atom_idx);
            }
            idx
        } else {
            self.residues.push(StructResidue {
                name: resname.to_string(),
                number: resnum,
                idx: None,
                atoms: vec![atom_idx],
            })
        };
        atom.residue = Some(residue_idx);
        self.atoms.push(atom);
        atom_idx
    }

    /// Appends a bond and maintains both atoms' partner lists.
    pub fn add_bond(
        &mut self,
        atom1: usize,
        atom2: usize,
        bond_type: Option<usize>,
    ) -> Result<usize, StructureError> {
        for index in [atom1, atom2] {
            if index >= self.atoms.len() {
                return Err(StructureError::InvalidIndex { kind: "atom", index });
            }
        }
        self.atoms[atom1].bond_partners.push(atom2);
        self.atoms[atom2].bond_partners.push(atom1);
        self.bonds.push(StructBond {
            atom1,
            atom2,
            bond_type,
        });
        Ok(self.bonds.len() - 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_atom_groups_consecutive_same_residue() {
        let mut s = Structure::new("water");
        s.add_atom(StructAtom::new("OW"), "SOL", 0);
        s.add_atom(StructAtom::new("HW1"), "SOL", 0);
        s.add_atom(StructAtom::new("HW2"), "SOL", 0);
        s.add_atom(StructAtom::new("OW"), "SOL", 1);

        assert_eq!(s.residues.len(), 2);
        assert_eq!(s.residues.get(0).unwrap().atoms, vec![0, 1, 2]);
        assert_eq!(s.residues.get(1).unwrap().atoms, vec![3]);
        assert_eq!(s.atoms[2].residue, Some(0));
        assert_eq!(s.atoms[3].residue, Some(1));
    }

    #[test]
    fn residues_claim_assigns_contiguous_indices() {
        let mut s = Structure::new("x");
        s.add_atom(StructAtom::new("A"), "R1", 0);
        s.add_atom(StructAtom::new("B"), "R2", 1);
        assert!(s.residues.get(0).unwrap().idx.is_none());
        s.residues.claim();
        assert_eq!(s.residues.get(0).unwrap().idx, Some(0));
        assert_eq!(s.residues.get(1).unwrap().idx, Some(1));
    }

    #[test]
    fn add_bond_maintains_partner_lists() {
        let mut s = Structure::new("x");
        s.add_atom(StructAtom::new("A"), "R", 0);
        s.add_atom(StructAtom::new("B"), "R", 0);
        s.add_bond(0, 1, None).unwrap();
        assert_eq!(s.atoms[0].bond_partners, vec![1]);
        assert_eq!(s.atoms[1].bond_partners, vec![0]);
    }

    #[test]
    fn add_bond_rejects_dangling_index() {
        let mut s = Structure::new("x");
        s.add_atom(StructAtom::new("A"), "R", 0);
        assert_eq!(
            s.add_bond(0, 5, None).unwrap_err(),
            StructureError::InvalidIndex { kind: "atom", index: 5 }
        );
    }

    #[test]
    fn type_table_claim_is_idempotent() {
        let mut table: TypeTable<StructBondType> = TypeTable::default();
        table.push(StructBondType { idx: None, k: 340.0, req: 1.09 });
        table.push(StructBondType { idx: None, k: 310.0, req: 1.53 });
        table.claim();
        table.claim();
        assert_eq!(table.get(0).unwrap().idx, Some(0));
        assert_eq!(table.get(1).unwrap().idx, Some(1));
    }

    #[test]
    fn atom_type_sigma_matches_rmin_half() {
        let mut at = StructAtomType::default();
        at.set_lj_params(0.1094, 1.9080);
        // sigma = 2 * rmin_half / 2**(1/6)
        assert!((at.sigma() - 3.3997).abs() < 1e-3);
    }
}
