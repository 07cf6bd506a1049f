//! The owning topology container.
//!
//! Primary storage uses slot maps; explicit order vectors preserve
//! insertion order for iteration, which file writers and the converters
//! rely on. Connection members must already be present as sites before the
//! connection is added.

use super::connection::{Angle, Bond, Dihedral, Improper};
use super::ids::{AngleTypeId, AtomTypeId, BondTypeId, DihedralTypeId, ImproperTypeId, SiteId};
use super::simbox::SimBox;
use super::site::Site;
use super::types::{AngleType, AtomType, BondType, DihedralType, ImproperType};
use slotmap::{SecondaryMap, SlotMap};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CombiningRule {
    #[default]
    Lorentz,
    Geometric,
}

#[derive(Debug, Error)]
#[error("Invalid combining rule string")]
pub struct ParseCombiningRuleError;

impl FromStr for CombiningRule {
    type Err = ParseCombiningRuleError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "lorentz" => Ok(Self::Lorentz),
            "geometric" => Ok(Self::Geometric),
            _ => Err(ParseCombiningRuleError),
        }
    }
}

impl fmt::Display for CombiningRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}",
            match self {
                Self::Lorentz => "lorentz",
                Self::Geometric => "geometric",
            }
        )
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TopologyError {
    #[error("Connection member site is not part of this topology")]
    UnknownSite,
    #[error("Referenced {kind} type does not exist in this topology")]
    UnknownType { kind: &'static str },
    #[error("{kind} index {index} is out of range")]
    UnknownConnection { kind: &'static str, index: usize },
}

#[derive(Debug, Clone, Default)]
pub struct Topology {
    name: String,
    simbox: Option<SimBox>,
    combining_rule: CombiningRule,

    sites: SlotMap<SiteId, Site>,
    site_order: Vec<SiteId>,

    bonds: Vec<Bond>,
    angles: Vec<Angle>,
    dihedrals: Vec<Dihedral>,
    impropers: Vec<Improper>,

    atom_types: SlotMap<AtomTypeId, AtomType>,
    atom_type_order: Vec<AtomTypeId>,
    bond_types: SlotMap<BondTypeId, BondType>,
    bond_type_order: Vec<BondTypeId>,
    angle_types: SlotMap<AngleTypeId, AngleType>,
    angle_type_order: Vec<AngleTypeId>,
    dihedral_types: SlotMap<DihedralTypeId, DihedralType>,
    dihedral_type_order: Vec<DihedralTypeId>,
    improper_types: SlotMap<ImproperTypeId, ImproperType>,
    improper_type_order: Vec<ImproperTypeId>,

    bond_adjacency: SecondaryMap<SiteId, Vec<SiteId>>,
}

impl Topology {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Self::default()
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set_name(&mut self, name: &str) {
        self.name = name.to_string();
    }

    pub fn simbox(&self) -> Option<&SimBox> {
        self.simbox.as_ref()
    }

    pub fn set_simbox(&mut self, simbox: Option<SimBox>) {
        self.simbox = simbox;
    }

    pub fn combining_rule(&self) -> CombiningRule {
        self.combining_rule
    }

    pub fn set_combining_rule(&mut self, rule: CombiningRule) {
        self.combining_rule = rule;
    }

    // --- Sites ---

    pub fn add_site(&mut self, site: Site) -> SiteId {
        let id = self.sites.insert(site);
        self.site_order.push(id);
        id
    }

    pub fn site(&self, id: SiteId) -> Option<&Site> {
        self.sites.get(id)
    }

    pub fn site_mut(&mut self, id: SiteId) -> Option<&mut Site> {
        self.sites.get_mut(id)
    }

    /// Iterates sites in insertion order.
    pub fn sites(&self) -> impl Iterator<Item = (SiteId, &Site)> {
        self.site_order.iter().map(move |&id| (id, &self.sites[id]))
    }

    pub fn n_sites(&self) -> usize {
        self.site_order.len()
    }

    /// One-shot atom-type backfill for a site.
    pub fn set_site_atom_type(
        &mut self,
        site: SiteId,
        atom_type: AtomTypeId,
    ) -> Result<(), TopologyError> {
        if !self.atom_types.contains_key(atom_type) {
            return Err(TopologyError::UnknownType { kind: "atom" });
        }
        let site = self.sites.get_mut(site).ok_or(TopologyError::UnknownSite)?;
        site.atom_type = Some(atom_type);
        Ok(())
    }

    // --- Connections ---

    pub fn add_bond(&mut self, bond: Bond) -> Result<usize, TopologyError> {
        self.check_members(&bond.members)?;
        if let Some(id) = bond.bond_type {
            if !self.bond_types.contains_key(id) {
                return Err(TopologyError::UnknownType { kind: "bond" });
            }
        }
        self.bonds.push(bond);
        Ok(self.bonds.len() - 1)
    }

    pub fn add_angle(&mut self, angle: Angle) -> Result<usize, TopologyError> {
        self.check_members(&angle.members)?;
        if let Some(id) = angle.angle_type {
            if !self.angle_types.contains_key(id) {
                return Err(TopologyError::UnknownType { kind: "angle" });
            }
        }
        self.angles.push(angle);
        Ok(self.angles.len() - 1)
    }

    pub fn add_dihedral(&mut self, dihedral: Dihedral) -> Result<usize, TopologyError> {
        self.check_members(&dihedral.members)?;
        if let Some(id) = dihedral.dihedral_type {
            if !self.dihedral_types.contains_key(id) {
                return Err(TopologyError::UnknownType { kind: "dihedral" });
            }
        }
        self.dihedrals.push(dihedral);
        Ok(self.dihedrals.len() - 1)
    }

    pub fn add_improper(&mut self, improper: Improper) -> Result<usize, TopologyError> {
        self.check_members(&improper.members)?;
        if let Some(id) = improper.improper_type {
            if !self.improper_types.contains_key(id) {
                return Err(TopologyError::UnknownType { kind: "improper" });
            }
        }
        self.impropers.push(improper);
        Ok(self.impropers.len() - 1)
    }

    fn check_members(&self, members: &[SiteId]) -> Result<(), TopologyError> {
        if members.iter().all(|id| self.sites.contains_key(*id)) {
            Ok(())
        } else {
            Err(TopologyError::UnknownSite)
        }
    }

    pub fn bonds(&self) -> &[Bond] {
        &self.bonds
    }

    pub fn angles(&self) -> &[Angle] {
        &self.angles
    }

    pub fn dihedrals(&self) -> &[Dihedral] {
        &self.dihedrals
    }

    pub fn impropers(&self) -> &[Improper] {
        &self.impropers
    }

    /// One-shot type backfill for a bond by positional index.
    pub fn set_bond_type(&mut self, index: usize, id: BondTypeId) -> Result<(), TopologyError> {
        if !self.bond_types.contains_key(id) {
            return Err(TopologyError::UnknownType { kind: "bond" });
        }
        let bond = self
            .bonds
            .get_mut(index)
            .ok_or(TopologyError::UnknownConnection { kind: "bond", index })?;
        bond.bond_type = Some(id);
        Ok(())
    }

    pub fn set_angle_type(&mut self, index: usize, id: AngleTypeId) -> Result<(), TopologyError> {
        if !self.angle_types.contains_key(id) {
            return Err(TopologyError::UnknownType { kind: "angle" });
        }
        let angle = self
            .angles
            .get_mut(index)
            .ok_or(TopologyError::UnknownConnection { kind: "angle", index })?;
        angle.angle_type = Some(id);
        Ok(())
    }

    pub fn set_dihedral_type(
        &mut self,
        index: usize,
        id: DihedralTypeId,
    ) -> Result<(), TopologyError> {
        if !self.dihedral_types.contains_key(id) {
            return Err(TopologyError::UnknownType { kind: "dihedral" });
        }
        let dihedral = self.dihedrals.get_mut(index).ok_or(
            TopologyError::UnknownConnection { kind: "dihedral", index },
        )?;
        dihedral.dihedral_type = Some(id);
        Ok(())
    }

    pub fn set_improper_type(
        &mut self,
        index: usize,
        id: ImproperTypeId,
    ) -> Result<(), TopologyError> {
        if !self.improper_types.contains_key(id) {
            return Err(TopologyError::UnknownType { kind: "improper" });
        }
        let improper = self.impropers.get_mut(index).ok_or(
            TopologyError::UnknownConnection { kind: "improper", index },
        )?;
        improper.improper_type = Some(id);
        Ok(())
    }

    // --- Types ---

    pub fn add_atom_type(&mut self, t: AtomType) -> AtomTypeId {
        let id = self.atom_types.insert(t);
        self.atom_type_order.push(id);
        id
    }

    pub fn atom_type(&self, id: AtomTypeId) -> Option<&AtomType> {
        self.atom_types.get(id)
    }

    pub fn atom_types(&self) -> impl Iterator<Item = (AtomTypeId, &AtomType)> {
        self.atom_type_order
            .iter()
            .map(move |&id| (id, &self.atom_types[id]))
    }

    pub fn n_atom_types(&self) -> usize {
        self.atom_type_order.len()
    }

    pub fn add_bond_type(&mut self, t: BondType) -> BondTypeId {
        let id = self.bond_types.insert(t);
        self.bond_type_order.push(id);
        id
    }

    pub fn bond_type(&self, id: BondTypeId) -> Option<&BondType> {
        self.bond_types.get(id)
    }

    pub fn bond_types(&self) -> impl Iterator<Item = (BondTypeId, &BondType)> {
        self.bond_type_order
            .iter()
            .map(move |&id| (id, &self.bond_types[id]))
    }

    pub fn n_bond_types(&self) -> usize {
        self.bond_type_order.len()
    }

    pub fn add_angle_type(&mut self, t: AngleType) -> AngleTypeId {
        let id = self.angle_types.insert(t);
        self.angle_type_order.push(id);
        id
    }

    pub fn angle_type(&self, id: AngleTypeId) -> Option<&AngleType> {
        self.angle_types.get(id)
    }

    pub fn angle_types(&self) -> impl Iterator<Item = (AngleTypeId, &AngleType)> {
        self.angle_type_order
            .iter()
            .map(move |&id| (id, &self.angle_types[id]))
    }

    pub fn n_angle_types(&self) -> usize {
        self.angle_type_order.len()
    }

    pub fn add_dihedral_type(&mut self, t: DihedralType) -> DihedralTypeId {
        let id = self.dihedral_types.insert(t);
        self.dihedral_type_order.push(id);
        id
    }

    pub fn dihedral_type(&self, id: DihedralTypeId) -> Option<&DihedralType> {
        self.dihedral_types.get(id)
    }

    pub fn dihedral_types(&self) -> impl Iterator<Item = (DihedralTypeId, &DihedralType)> {
        self.dihedral_type_order
            .iter()
            .map(move |&id| (id, &self.dihedral_types[id]))
    }

    pub fn n_dihedral_types(&self) -> usize {
        self.dihedral_type_order.len()
    }

    pub fn add_improper_type(&mut self, t: ImproperType) -> ImproperTypeId {
        let id = self.improper_types.insert(t);
        self.improper_type_order.push(id);
        id
    }

    pub fn improper_type(&self, id: ImproperTypeId) -> Option<&ImproperType> {
        self.improper_types.get(id)
    }

    pub fn improper_types(&self) -> impl Iterator<Item = (ImproperTypeId, &ImproperType)> {
        self.improper_type_order
            .iter()
            .map(move |&id| (id, &self.improper_types[id]))
    }

    pub fn n_improper_types(&self) -> usize {
        self.improper_type_order.len()
    }

    // --- Connectivity ---

    /// Rebuilds the bond adjacency cache from the bond list. Call after
    /// bulk insertion; iteration-time queries use the cache.
    pub fn update_topology(&mut self) {
        self.bond_adjacency.clear();
        for id in &self.site_order {
            self.bond_adjacency.insert(*id, Vec::new());
        }
        for bond in &self.bonds {
            let [a, b] = bond.members;
            if let Some(list) = self.bond_adjacency.get_mut(a) {
                list.push(b);
            }
            if let Some(list) = self.bond_adjacency.get_mut(b) {
                list.push(a);
            }
        }
    }

    /// Bonded neighbors of a site, valid after [`Self::update_topology`].
    pub fn bond_partners(&self, site: SiteId) -> &[SiteId] {
        self.bond_adjacency.get(site).map(|v| v.as_slice()).unwrap_or(&[])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::units::{ANGSTROM, Quantity3};

    fn site(name: &str) -> Site {
        Site::new(name, Quantity3::from_array([0.0, 0.0, 0.0], ANGSTROM))
    }

    #[test]
    fn sites_iterate_in_insertion_order() {
        let mut top = Topology::new("test");
        for name in ["C1", "C2", "H1", "H2"] {
            top.add_site(site(name));
        }
        let names: Vec<&str> = top.sites().map(|(_, s)| s.name.as_str()).collect();
        assert_eq!(names, vec!["C1", "C2", "H1", "H2"]);
        assert_eq!(top.n_sites(), 4);
    }

    #[test]
    fn add_bond_rejects_foreign_site() {
        let mut top = Topology::new("test");
        let a = top.add_site(site("A"));
        let mut other = Topology::new("other");
        let foreign = other.add_site(site("B"));
        let err = top.add_bond(Bond::new([a, foreign])).unwrap_err();
        assert_eq!(err, TopologyError::UnknownSite);
        assert!(top.bonds().is_empty());
    }

    #[test]
    fn add_bond_rejects_unknown_type_id() {
        let mut top = Topology::new("test");
        let a = top.add_site(site("A"));
        let b = top.add_site(site("B"));
        let mut other = Topology::new("other");
        let foreign_type = other.add_bond_type(crate::core::models::types::BondType::new(
            test_helpers::harmonic_bond_expression(),
            None,
        ));
        let mut bond = Bond::new([a, b]);
        bond.bond_type = Some(foreign_type);
        assert_eq!(
            top.add_bond(bond).unwrap_err(),
            TopologyError::UnknownType { kind: "bond" }
        );
    }

    #[test]
    fn update_topology_builds_adjacency() {
        let mut top = Topology::new("test");
        let a = top.add_site(site("A"));
        let b = top.add_site(site("B"));
        let c = top.add_site(site("C"));
        top.add_bond(Bond::new([a, b])).unwrap();
        top.add_bond(Bond::new([b, c])).unwrap();
        top.update_topology();
        assert_eq!(top.bond_partners(a), &[b]);
        assert_eq!(top.bond_partners(b), &[a, c]);
        assert_eq!(top.bond_partners(c), &[b]);
    }

    #[test]
    fn set_site_atom_type_backfills() {
        let mut top = Topology::new("test");
        let a = top.add_site(site("A"));
        let at = top.add_atom_type(test_helpers::lj_atom_type("CT"));
        top.set_site_atom_type(a, at).unwrap();
        assert_eq!(top.site(a).unwrap().atom_type, Some(at));
    }

    #[test]
    fn set_bond_type_rejects_out_of_range_index() {
        let mut top = Topology::new("test");
        let bt = top.add_bond_type(crate::core::models::types::BondType::new(
            test_helpers::harmonic_bond_expression(),
            None,
        ));
        assert!(matches!(
            top.set_bond_type(0, bt),
            Err(TopologyError::UnknownConnection { kind: "bond", index: 0 })
        ));
    }

    #[test]
    fn combining_rule_parses_and_displays() {
        assert_eq!(
            "lorentz".parse::<CombiningRule>().unwrap(),
            CombiningRule::Lorentz
        );
        assert_eq!(
            "Geometric".parse::<CombiningRule>().unwrap(),
            CombiningRule::Geometric
        );
        assert!("arithmetic".parse::<CombiningRule>().is_err());
        assert_eq!(CombiningRule::Lorentz.to_string(), "lorentz");
        assert_eq!(CombiningRule::Geometric.to_string(), "geometric");
    }

    mod test_helpers {
        use crate::core::models::types::AtomType;
        use crate::core::potential::expression::PotentialExpression;
        use crate::core::potential::forms::{FormCatalog, HARMONIC_BOND, LENNARD_JONES};
        use crate::core::units::{
            AMU, ANGSTROM, ELEMENTARY_CHARGE, KCAL_PER_MOL, KCAL_PER_MOL_ANGSTROM2, Quantity,
        };
        use std::collections::BTreeMap;

        pub fn harmonic_bond_expression() -> PotentialExpression {
            let catalog = FormCatalog::default();
            PotentialExpression::from_form(
                catalog.get(HARMONIC_BOND).unwrap(),
                BTreeMap::from([
                    (
                        "k".to_string(),
                        Quantity::new(680.0, KCAL_PER_MOL_ANGSTROM2),
                    ),
                    ("r_eq".to_string(), Quantity::new(1.09, ANGSTROM)),
                ]),
            )
            .unwrap()
        }

        pub fn lj_atom_type(name: &str) -> AtomType {
            let catalog = FormCatalog::default();
            AtomType {
                name: name.to_string(),
                charge: Quantity::new(0.0, ELEMENTARY_CHARGE),
                mass: Quantity::new(12.011, AMU),
                element_tag: Some("C".to_string()),
                expression: PotentialExpression::from_form(
                    catalog.get(LENNARD_JONES).unwrap(),
                    BTreeMap::from([
                        ("sigma".to_string(), Quantity::new(3.5, ANGSTROM)),
                        ("epsilon".to_string(), Quantity::new(0.066, KCAL_PER_MOL)),
                    ]),
                )
                .unwrap(),
            }
        }
    }
}
