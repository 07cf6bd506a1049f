//! Periodic-table lookups.
//!
//! A static element table with lookups by symbol, atomic number, mass
//! proximity, and atom-type heuristics. Masses are standard atomic weights
//! in amu.

use phf::phf_map;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Element {
    pub symbol: &'static str,
    pub name: &'static str,
    pub atomic_number: u8,
    pub mass: f64,
}

macro_rules! elements {
    ($(($z:expr, $sym:literal, $name:literal, $mass:expr)),* $(,)?) => {
        pub static ELEMENTS: &[Element] = &[
            $(Element { symbol: $sym, name: $name, atomic_number: $z, mass: $mass }),*
        ];
    };
}

elements![
    (1, "H", "hydrogen", 1.008),
    (2, "He", "helium", 4.0026),
    (3, "Li", "lithium", 6.94),
    (4, "Be", "beryllium", 9.0122),
    (5, "B", "boron", 10.81),
    (6, "C", "carbon", 12.011),
    (7, "N", "nitrogen", 14.007),
    (8, "O", "oxygen", 15.999),
    (9, "F", "fluorine", 18.998),
    (10, "Ne", "neon", 20.180),
    (11, "Na", "sodium", 22.990),
    (12, "Mg", "magnesium", 24.305),
    (13, "Al", "aluminium", 26.982),
    (14, "Si", "silicon", 28.085),
    (15, "P", "phosphorus", 30.974),
    (16, "S", "sulfur", 32.06),
    (17, "Cl", "chlorine", 35.45),
    (18, "Ar", "argon", 39.948),
    (19, "K", "potassium", 39.098),
    (20, "Ca", "calcium", 40.078),
    (21, "Sc", "scandium", 44.956),
    (22, "Ti", "titanium", 47.867),
    (23, "V", "vanadium", 50.942),
    (24, "Cr", "chromium", 51.996),
    (25, "Mn", "manganese", 54.938),
    (26, "Fe", "iron", 55.845),
    (27, "Co", "cobalt", 58.933),
    (28, "Ni", "nickel", 58.693),
    (29, "Cu", "copper", 63.546),
    (30, "Zn", "zinc", 65.38),
    (31, "Ga", "gallium", 69.723),
    (32, "Ge", "germanium", 72.630),
    (33, "As", "arsenic", 74.922),
    (34, "Se", "selenium", 78.971),
    (35, "Br", "bromine", 79.904),
    (36, "Kr", "krypton", 83.798),
    (37, "Rb", "rubidium", 85.468),
    (38, "Sr", "strontium", 87.62),
    (39, "Y", "yttrium", 88.906),
    (40, "Zr", "zirconium", 91.224),
    (41, "Nb", "niobium", 92.906),
    (42, "Mo", "molybdenum", 95.95),
    (44, "Ru", "ruthenium", 101.07),
    (45, "Rh", "rhodium", 102.91),
    (46, "Pd", "palladium", 106.42),
    (47, "Ag", "silver", 107.87),
    (48, "Cd", "cadmium", 112.41),
    (49, "In", "indium", 114.82),
    (50, "Sn", "tin", 118.71),
    (51, "Sb", "antimony", 121.76),
    (52, "Te", "tellurium", 127.60),
    (53, "I", "iodine", 126.90),
    (54, "Xe", "xenon", 131.29),
    (55, "Cs", "caesium", 132.91),
    (56, "Ba", "barium", 137.33),
    (78, "Pt", "platinum", 195.08),
    (79, "Au", "gold", 196.97),
    (80, "Hg", "mercury", 200.59),
    (82, "Pb", "lead", 207.2),
];

static BY_SYMBOL: phf::Map<&'static str, usize> = phf_map! {
    "H" => 0, "He" => 1, "Li" => 2, "Be" => 3, "B" => 4, "C" => 5,
    "N" => 6, "O" => 7, "F" => 8, "Ne" => 9, "Na" => 10, "Mg" => 11,
    "Al" => 12, "Si" => 13, "P" => 14, "S" => 15, "Cl" => 16, "Ar" => 17,
    "K" => 18, "Ca" => 19, "Sc" => 20, "Ti" => 21, "V" => 22, "Cr" => 23,
    "Mn" => 24, "Fe" => 25, "Co" => 26, "Ni" => 27, "Cu" => 28, "Zn" => 29,
    "Ga" => 30, "Ge" => 31, "As" => 32, "Se" => 33, "Br" => 34, "Kr" => 35,
    "Rb" => 36, "Sr" => 37, "Y" => 38, "Zr" => 39, "Nb" => 40, "Mo" => 41,
    "Ru" => 42, "Rh" => 43, "Pd" => 44, "Ag" => 45, "Cd" => 46, "In" => 47,
    "Sn" => 48, "Sb" => 49, "Te" => 50, "I" => 51, "Xe" => 52, "Cs" => 53,
    "Ba" => 54, "Pt" => 55, "Au" => 56, "Hg" => 57, "Pb" => 58,
};

pub fn by_symbol(symbol: &str) -> Option<&'static Element> {
    BY_SYMBOL.get(symbol).map(|&i| &ELEMENTS[i])
}

pub fn by_atomic_number(z: u8) -> Option<&'static Element> {
    ELEMENTS.iter().find(|e| e.atomic_number == z)
}

/// Closest element by mass, within 0.5 amu.
pub fn by_mass(mass_amu: f64) -> Option<&'static Element> {
    ELEMENTS
        .iter()
        .map(|e| (e, (e.mass - mass_amu).abs()))
        .filter(|(_, delta)| *delta < 0.5)
        .min_by(|(_, a), (_, b)| a.total_cmp(b))
        .map(|(e, _)| e)
}

/// Resolves an element from an atom-type-like name. The leading alphabetic
/// prefix is tried as a two-letter symbol, then as a one-letter symbol;
/// prefixes longer than two characters (force-field naming schemes like
/// `opls_140`) never resolve here and are left to the mass fallback.
pub fn by_name_prefix(name: &str) -> Option<&'static Element> {
    let prefix: String = name.chars().take_while(|c| c.is_ascii_alphabetic()).collect();
    if prefix.is_empty() || prefix.len() > 2 {
        return None;
    }
    let mut chars = prefix.chars();
    let first = chars.next()?.to_ascii_uppercase();
    if let Some(second) = chars.next() {
        let two: String = [first, second.to_ascii_lowercase()].iter().collect();
        if let Some(e) = by_symbol(&two) {
            return Some(e);
        }
    }
    by_symbol(&first.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn by_symbol_finds_common_elements() {
        assert_eq!(by_symbol("C").unwrap().atomic_number, 6);
        assert_eq!(by_symbol("Cl").unwrap().atomic_number, 17);
        assert!(by_symbol("Xx").is_none());
    }

    #[test]
    fn by_atomic_number_matches_symbol_lookup() {
        assert_eq!(by_atomic_number(8).unwrap().symbol, "O");
        assert!(by_atomic_number(0).is_none());
        assert!(by_atomic_number(120).is_none());
    }

    #[test]
    fn by_mass_picks_closest_within_tolerance() {
        assert_eq!(by_mass(12.0).unwrap().symbol, "C");
        assert_eq!(by_mass(1.008).unwrap().symbol, "H");
        assert!(by_mass(12.7).is_none());
    }

    #[test]
    fn by_name_prefix_tries_two_letter_symbol_first() {
        assert_eq!(by_name_prefix("CA").unwrap().symbol, "Ca");
        assert_eq!(by_name_prefix("CT1").unwrap().symbol, "C");
        assert_eq!(by_name_prefix("Na+").unwrap().symbol, "Na");
    }

    #[test]
    fn by_name_prefix_ignores_force_field_naming_schemes() {
        assert!(by_name_prefix("opls_140").is_none());
        assert!(by_name_prefix("_140").is_none());
    }
}
