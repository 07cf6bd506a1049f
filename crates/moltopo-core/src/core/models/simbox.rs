//! The simulation box.
//!
//! Stored canonically as edge lengths (nm) plus angles (degrees); the
//! lattice-vector matrix is derived on demand for triclinic output formats,
//! never stored.

use crate::core::units::{DEGREE, IncompatibleUnitError, NANOMETER, Quantity, Quantity3, RADIAN};
use nalgebra::Matrix3;

/// Angle tolerance (degrees) below which a box counts as orthorhombic.
const ORTHO_ANGLE_TOLERANCE: f64 = 0.1;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SimBox {
    lengths: Quantity3,
    /// alpha (v2/v3), beta (v1/v3), gamma (v1/v2), in degrees.
    angles: [Quantity; 3],
}

impl SimBox {
    /// Builds a box from arbitrary length/angle units; values are stored in
    /// nm and degrees.
    pub fn new(
        lengths: Quantity3,
        angles: Option<[Quantity; 3]>,
    ) -> Result<Self, IncompatibleUnitError> {
        let lengths = lengths.to(NANOMETER)?;
        let angles = match angles {
            Some(angles) => [
                angles[0].to(DEGREE)?,
                angles[1].to(DEGREE)?,
                angles[2].to(DEGREE)?,
            ],
            None => [
                Quantity::new(90.0, DEGREE),
                Quantity::new(90.0, DEGREE),
                Quantity::new(90.0, DEGREE),
            ],
        };
        Ok(Self { lengths, angles })
    }

    /// Edge lengths in nm.
    pub fn lengths(&self) -> Quantity3 {
        self.lengths
    }

    /// Box angles in degrees.
    pub fn angles(&self) -> [Quantity; 3] {
        self.angles
    }

    pub fn is_orthorhombic(&self) -> bool {
        self.angles
            .iter()
            .all(|a| (a.value() - 90.0).abs() <= ORTHO_ANGLE_TOLERANCE)
    }

    /// Lattice vectors (rows, nm) derived from lengths and angles.
    pub fn vectors(&self) -> Matrix3<f64> {
        let l = self.lengths.values();
        // Angles are stored in degrees by construction.
        let alpha = self.angles[0].to(RADIAN).map(|q| q.value()).unwrap_or(0.0);
        let beta = self.angles[1].to(RADIAN).map(|q| q.value()).unwrap_or(0.0);
        let gamma = self.angles[2].to(RADIAN).map(|q| q.value()).unwrap_or(0.0);

        let v1 = [l[0], 0.0, 0.0];
        let v2 = [l[1] * gamma.cos(), l[1] * gamma.sin(), 0.0];
        let v3x = l[2] * beta.cos();
        let v3y = l[2] * (alpha.cos() - beta.cos() * gamma.cos()) / gamma.sin();
        let v3z = (l[2] * l[2] - v3x * v3x - v3y * v3y).max(0.0).sqrt();

        Matrix3::new(
            v1[0], v1[1], v1[2], //
            v2[0], v2[1], v2[2], //
            v3x, v3y, v3z,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::units::ANGSTROM;

    fn cubic_2nm() -> SimBox {
        SimBox::new(Quantity3::from_array([2.0, 2.0, 2.0], NANOMETER), None).unwrap()
    }

    #[test]
    fn new_converts_lengths_to_nm() {
        let b = SimBox::new(
            Quantity3::from_array([20.0, 20.0, 20.0], ANGSTROM),
            None,
        )
        .unwrap();
        assert_eq!(b.lengths().values().x, 2.0);
        assert_eq!(b.lengths().unit(), NANOMETER);
    }

    #[test]
    fn default_angles_are_ninety_degrees() {
        let b = cubic_2nm();
        for a in b.angles() {
            assert_eq!(a.value(), 90.0);
            assert_eq!(a.unit(), DEGREE);
        }
        assert!(b.is_orthorhombic());
    }

    #[test]
    fn rejects_angle_units_for_lengths() {
        assert!(SimBox::new(Quantity3::from_array([1.0, 1.0, 1.0], DEGREE), None).is_err());
    }

    #[test]
    fn orthorhombic_vectors_are_diagonal() {
        let v = cubic_2nm().vectors();
        assert!((v[(0, 0)] - 2.0).abs() < 1e-12);
        assert!((v[(1, 1)] - 2.0).abs() < 1e-9);
        assert!((v[(2, 2)] - 2.0).abs() < 1e-9);
        assert!(v[(0, 1)].abs() < 1e-12);
        assert!(v[(1, 0)].abs() < 1e-9);
        assert!(v[(2, 0)].abs() < 1e-9);
        assert!(v[(2, 1)].abs() < 1e-9);
    }

    #[test]
    fn triclinic_vectors_preserve_lengths() {
        let b = SimBox::new(
            Quantity3::from_array([3.0, 4.0, 5.0], NANOMETER),
            Some([
                Quantity::new(80.0, DEGREE),
                Quantity::new(95.0, DEGREE),
                Quantity::new(120.0, DEGREE),
            ]),
        )
        .unwrap();
        assert!(!b.is_orthorhombic());
        let v = b.vectors();
        for (i, expected) in [3.0, 4.0, 5.0].iter().enumerate() {
            let row = v.row(i);
            let norm = (row[0] * row[0] + row[1] * row[1] + row[2] * row[2]).sqrt();
            assert!((norm - expected).abs() < 1e-9, "row {i} norm {norm}");
        }
    }
}
