//! Unit-tagged scalar and vector quantities.
//!
//! Every numeric value that crosses a module boundary in this crate is a
//! `(value, unit)` pair. Conversion between units of the same dimension is
//! exact up to floating-point rounding; conversion across dimensions fails
//! with [`IncompatibleUnitError`]. There is no implicit default unit
//! anywhere: a bare `f64` never enters or leaves the data model.
//!
//! Units are described by an integer exponent vector over six base
//! dimensions (length, mass, time, charge, amount of substance, angle) and
//! a conversion factor to the coherent SI-based reference for that
//! dimension vector.

use nalgebra::Vector3;
use std::fmt;
use thiserror::Error;

/// Exponent vector over the base dimensions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Dim {
    pub length: i8,
    pub mass: i8,
    pub time: i8,
    pub charge: i8,
    pub amount: i8,
    pub angle: i8,
}

impl Dim {
    pub const NONE: Dim = Dim {
        length: 0,
        mass: 0,
        time: 0,
        charge: 0,
        amount: 0,
        angle: 0,
    };
    pub const LENGTH: Dim = Dim { length: 1, ..Dim::NONE };
    pub const MASS: Dim = Dim { mass: 1, ..Dim::NONE };
    pub const CHARGE: Dim = Dim { charge: 1, ..Dim::NONE };
    pub const ANGLE: Dim = Dim { angle: 1, ..Dim::NONE };
    /// Energy per amount of substance (molar energy).
    pub const MOLAR_ENERGY: Dim = Dim {
        length: 2,
        mass: 1,
        time: -2,
        amount: -1,
        ..Dim::NONE
    };
    /// Molar energy per squared length (harmonic stretch force constant).
    pub const MOLAR_ENERGY_PER_LENGTH2: Dim = Dim {
        mass: 1,
        time: -2,
        amount: -1,
        ..Dim::NONE
    };
    /// Molar energy per squared angle (harmonic bend force constant).
    pub const MOLAR_ENERGY_PER_ANGLE2: Dim = Dim {
        length: 2,
        mass: 1,
        time: -2,
        amount: -1,
        angle: -2,
        ..Dim::NONE
    };
}

/// A named unit: a dimension vector plus the factor to the coherent
/// reference unit of that dimension.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Unit {
    pub symbol: &'static str,
    pub dim: Dim,
    pub factor: f64,
}

pub const DIMENSIONLESS: Unit = Unit {
    symbol: "1",
    dim: Dim::NONE,
    factor: 1.0,
};
pub const ANGSTROM: Unit = Unit {
    symbol: "angstrom",
    dim: Dim::LENGTH,
    factor: 1.0e-10,
};
pub const NANOMETER: Unit = Unit {
    symbol: "nm",
    dim: Dim::LENGTH,
    factor: 1.0e-9,
};
pub const AMU: Unit = Unit {
    symbol: "amu",
    dim: Dim::MASS,
    factor: 1.660_539_066_60e-27,
};
pub const ELEMENTARY_CHARGE: Unit = Unit {
    symbol: "e",
    dim: Dim::CHARGE,
    factor: 1.602_176_634e-19,
};
pub const COULOMB: Unit = Unit {
    symbol: "C",
    dim: Dim::CHARGE,
    factor: 1.0,
};
pub const RADIAN: Unit = Unit {
    symbol: "rad",
    dim: Dim::ANGLE,
    factor: 1.0,
};
pub const DEGREE: Unit = Unit {
    symbol: "degree",
    dim: Dim::ANGLE,
    factor: std::f64::consts::PI / 180.0,
};
pub const KCAL_PER_MOL: Unit = Unit {
    symbol: "kcal/mol",
    dim: Dim::MOLAR_ENERGY,
    factor: 4184.0,
};
pub const KJ_PER_MOL: Unit = Unit {
    symbol: "kJ/mol",
    dim: Dim::MOLAR_ENERGY,
    factor: 1000.0,
};
pub const KCAL_PER_MOL_ANGSTROM2: Unit = Unit {
    symbol: "kcal/(mol*angstrom**2)",
    dim: Dim::MOLAR_ENERGY_PER_LENGTH2,
    factor: 4184.0 / 1.0e-20,
};
pub const KCAL_PER_MOL_RAD2: Unit = Unit {
    symbol: "kcal/(mol*rad**2)",
    dim: Dim::MOLAR_ENERGY_PER_ANGLE2,
    factor: 4184.0,
};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("cannot convert from '{from_unit}' to '{to_unit}': incompatible dimensions")]
pub struct IncompatibleUnitError {
    pub from_unit: String,
    pub to_unit: String,
}

/// A unit-tagged scalar.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Quantity {
    value: f64,
    unit: Unit,
}

impl Quantity {
    pub fn new(value: f64, unit: Unit) -> Self {
        Self { value, unit }
    }

    pub fn value(&self) -> f64 {
        self.value
    }

    pub fn unit(&self) -> Unit {
        self.unit
    }

    /// Converts to `target`, failing if the dimensions differ.
    pub fn to(&self, target: Unit) -> Result<Quantity, IncompatibleUnitError> {
        if self.unit.dim != target.dim {
            return Err(IncompatibleUnitError {
                from_unit: self.unit.symbol.to_string(),
                to_unit: target.symbol.to_string(),
            });
        }
        Ok(Quantity {
            value: self.value * (self.unit.factor / target.factor),
            unit: target,
        })
    }

    /// Convenience for `self.to(target)?.value()`.
    pub fn value_in(&self, target: Unit) -> Result<f64, IncompatibleUnitError> {
        Ok(self.to(target)?.value)
    }
}

impl fmt::Display for Quantity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.value, self.unit.symbol)
    }
}

/// A unit-tagged 3-vector (positions, box lengths).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Quantity3 {
    values: Vector3<f64>,
    unit: Unit,
}

impl Quantity3 {
    pub fn new(values: Vector3<f64>, unit: Unit) -> Self {
        Self { values, unit }
    }

    pub fn from_array(values: [f64; 3], unit: Unit) -> Self {
        Self {
            values: Vector3::new(values[0], values[1], values[2]),
            unit,
        }
    }

    pub fn values(&self) -> Vector3<f64> {
        self.values
    }

    pub fn unit(&self) -> Unit {
        self.unit
    }

    pub fn to(&self, target: Unit) -> Result<Quantity3, IncompatibleUnitError> {
        if self.unit.dim != target.dim {
            return Err(IncompatibleUnitError {
                from_unit: self.unit.symbol.to_string(),
                to_unit: target.symbol.to_string(),
            });
        }
        Ok(Quantity3 {
            values: self.values * (self.unit.factor / target.factor),
            unit: target,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn angstrom_to_nanometer_is_exact() {
        let q = Quantity::new(20.0, ANGSTROM);
        let nm = q.to(NANOMETER).unwrap();
        assert_eq!(nm.value(), 2.0);
        assert_eq!(nm.unit(), NANOMETER);
    }

    #[test]
    fn roundtrip_conversion_preserves_value() {
        let q = Quantity::new(1.234_567, NANOMETER);
        let back = q.to(ANGSTROM).unwrap().to(NANOMETER).unwrap();
        assert!((back.value() - 1.234_567).abs() < 1e-12);
    }

    #[test]
    fn kcal_to_kj_uses_thermochemical_calorie() {
        let q = Quantity::new(1.0, KCAL_PER_MOL);
        assert!((q.value_in(KJ_PER_MOL).unwrap() - 4.184).abs() < 1e-12);
    }

    #[test]
    fn degree_to_radian() {
        let q = Quantity::new(180.0, DEGREE);
        assert!((q.value_in(RADIAN).unwrap() - std::f64::consts::PI).abs() < 1e-12);
    }

    #[test]
    fn incompatible_dimensions_fail() {
        let q = Quantity::new(1.0, ANGSTROM);
        let err = q.to(KCAL_PER_MOL).unwrap_err();
        assert_eq!(err.from_unit, "angstrom");
        assert_eq!(err.to_unit, "kcal/mol");
    }

    #[test]
    fn charge_conversion_elementary_to_coulomb() {
        let q = Quantity::new(1.0, ELEMENTARY_CHARGE);
        assert!((q.value_in(COULOMB).unwrap() - 1.602_176_634e-19).abs() < 1e-28);
    }

    #[test]
    fn angle_squared_force_constant_is_not_length_squared() {
        let q = Quantity::new(1.0, KCAL_PER_MOL_RAD2);
        assert!(q.to(KCAL_PER_MOL_ANGSTROM2).is_err());
    }

    #[test]
    fn vector_conversion_scales_all_components() {
        let v = Quantity3::from_array([10.0, 20.0, 30.0], ANGSTROM);
        let nm = v.to(NANOMETER).unwrap();
        assert_eq!(nm.values(), Vector3::new(1.0, 2.0, 3.0));
    }

    #[test]
    fn vector_conversion_rejects_incompatible_target() {
        let v = Quantity3::from_array([1.0, 1.0, 1.0], ANGSTROM);
        assert!(v.to(DEGREE).is_err());
    }
}
