//! Effect direction vectors
//!
//! A direction is stored as Cartesian components over 1 to 3 axes and can be read or written in
//! Cartesian, polar (2 axes only) or spherical coordinates. Angles are in hundredths of a degree.
//! Polar angles run clockwise from north, spherical angles counter-clockwise from the first axis.

use super::{
    DirectionError, EffectValue, EFFECT_ANGLE_FULL_TURN, EFFECT_ANGLE_MAX, EFFECT_ANGLE_MIN,
    EFFECT_DIRECTION_AXES_MAX,
};

/// Coordinate system of a direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CoordinateSystem {
    Cartesian,
    Polar,
    Spherical,
}

impl std::fmt::Display for CoordinateSystem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CoordinateSystem::Cartesian => write!(f, "cartesian"),
            CoordinateSystem::Polar => write!(f, "polar"),
            CoordinateSystem::Spherical => write!(f, "spherical"),
        }
    }
}

/// Direction of a force, stored in Cartesian form
#[derive(Debug, Clone, PartialEq)]
pub struct DirectionVector {
    cartesian: Vec<EffectValue>,
    original_system: CoordinateSystem,
}

impl Default for DirectionVector {
    /// Single axis pointing in the positive direction.
    fn default() -> Self {
        Self {
            cartesian: vec![1.0],
            original_system: CoordinateSystem::Cartesian,
        }
    }
}

impl DirectionVector {
    pub fn num_axes(&self) -> usize {
        self.cartesian.len()
    }

    /// Coordinate system the direction was last set in.
    pub fn original_coordinate_system(&self) -> CoordinateSystem {
        self.original_system
    }

    pub fn cartesian(&self) -> &[EffectValue] {
        &self.cartesian
    }

    /// Set the direction from Cartesian components.
    ///
    /// Rejects an empty list, more than three components, and the zero vector. The stored state
    /// is untouched on failure.
    pub fn set_cartesian(&mut self, coordinates: &[EffectValue]) -> Result<(), DirectionError> {
        if coordinates.is_empty() || coordinates.len() > EFFECT_DIRECTION_AXES_MAX {
            return Err(DirectionError::ComponentCount(coordinates.len()));
        }
        if coordinates.iter().all(|c| *c == 0.0) {
            return Err(DirectionError::ZeroVector);
        }

        self.cartesian = coordinates.to_vec();
        self.original_system = CoordinateSystem::Cartesian;
        Ok(())
    }

    /// Set a two-axis direction from a polar angle.
    pub fn set_polar(&mut self, coordinates: &[EffectValue]) -> Result<(), DirectionError> {
        if coordinates.len() != 1 {
            return Err(DirectionError::AngleCount {
                system: CoordinateSystem::Polar,
                axes: 2,
                expected: 1,
                actual: coordinates.len(),
            });
        }
        validate_angle(coordinates[0])?;

        // Polar north is spherical 270 degrees
        let spherical = (coordinates[0] + 27000.0) % EFFECT_ANGLE_FULL_TURN;
        self.cartesian = spherical_to_cartesian(&[spherical]);
        self.original_system = CoordinateSystem::Polar;
        Ok(())
    }

    /// Set a direction over `angles + 1` axes from spherical angles.
    pub fn set_spherical(&mut self, coordinates: &[EffectValue]) -> Result<(), DirectionError> {
        if coordinates.is_empty() || coordinates.len() >= EFFECT_DIRECTION_AXES_MAX {
            // Report against the nearest supported axis count
            let axes = coordinates.len().clamp(2, EFFECT_DIRECTION_AXES_MAX);
            return Err(DirectionError::AngleCount {
                system: CoordinateSystem::Spherical,
                axes,
                expected: axes - 1,
                actual: coordinates.len(),
            });
        }
        for angle in coordinates {
            validate_angle(*angle)?;
        }

        self.cartesian = spherical_to_cartesian(coordinates);
        self.original_system = CoordinateSystem::Spherical;
        Ok(())
    }

    /// Polar angle of a two-axis direction.
    pub fn polar(&self) -> Result<EffectValue, DirectionError> {
        if self.num_axes() != 2 {
            return Err(if self.num_axes() == 1 {
                DirectionError::Unsupported(CoordinateSystem::Polar)
            } else {
                DirectionError::AngleCount {
                    system: CoordinateSystem::Polar,
                    axes: self.num_axes(),
                    expected: 1,
                    actual: self.num_axes() - 1,
                }
            });
        }

        let spherical = self.spherical()?;
        Ok((spherical[0] + 9000.0) % EFFECT_ANGLE_FULL_TURN)
    }

    /// Spherical angles, one fewer than the number of axes.
    pub fn spherical(&self) -> Result<Vec<EffectValue>, DirectionError> {
        if self.num_axes() < 2 {
            return Err(DirectionError::Unsupported(CoordinateSystem::Spherical));
        }

        let c: Vec<f64> = self.cartesian.iter().map(|v| *v as f64).collect();
        let mut angles = Vec::with_capacity(c.len() - 1);
        angles.push(c[1].atan2(c[0]));
        for i in 1..(c.len() - 1) {
            let planar = c[..=i].iter().map(|v| v * v).sum::<f64>().sqrt();
            angles.push(c[i + 1].atan2(planar));
        }

        Ok(angles.into_iter().map(radians_to_angle).collect())
    }

    /// Project a signed magnitude onto each axis along the stored direction.
    pub fn magnitude_components(&self, magnitude: EffectValue) -> Vec<EffectValue> {
        if self.num_axes() == 1 {
            return vec![magnitude * self.cartesian[0].signum()];
        }

        let norm = self
            .cartesian
            .iter()
            .map(|c| (*c as f64) * (*c as f64))
            .sum::<f64>()
            .sqrt();

        self.cartesian
            .iter()
            .map(|c| (magnitude as f64 * *c as f64 / norm) as EffectValue)
            .collect()
    }
}

fn validate_angle(angle: EffectValue) -> Result<(), DirectionError> {
    if !(EFFECT_ANGLE_MIN..=EFFECT_ANGLE_MAX).contains(&angle) {
        return Err(DirectionError::AngleRange(angle));
    }
    Ok(())
}

/// Radians to a whole angle in 0..36000 hundredths of a degree.
fn radians_to_angle(radians: f64) -> EffectValue {
    let angle = (radians.to_degrees() * 100.0).round();
    angle.rem_euclid(EFFECT_ANGLE_FULL_TURN as f64) as EffectValue
}

/// Unit Cartesian components from spherical angles, rounded to 1/10000.
fn spherical_to_cartesian(angles: &[EffectValue]) -> Vec<EffectValue> {
    let radians: Vec<f64> = angles
        .iter()
        .map(|a| (*a as f64 / 100.0).to_radians())
        .collect();

    let mut components = vec![0.0f64; radians.len() + 1];
    components[0] = radians[0].cos();
    components[1] = radians[0].sin();
    for (i, angle) in radians.iter().enumerate().skip(1) {
        for component in components.iter_mut().take(i + 1) {
            *component *= angle.cos();
        }
        components[i + 1] = angle.sin();
    }

    components
        .into_iter()
        .map(|c| ((c * 10000.0).round()) as EffectValue)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    /// Same direction within 3%, and zero components must stay exactly zero.
    fn assert_same_direction(expected: &[EffectValue], actual: &[EffectValue]) {
        assert_eq!(expected.len(), actual.len());
        let scale_index = expected
            .iter()
            .position(|c| *c != 0.0)
            .expect("expected a non-zero component");
        let ratio = actual[scale_index] / expected[scale_index];
        assert!(ratio > 0.0, "direction flipped: {:?} vs {:?}", expected, actual);

        for (e, a) in expected.iter().zip(actual) {
            if *e == 0.0 {
                assert_eq!(*a, 0.0, "{:?} vs {:?}", expected, actual);
            } else {
                let component_ratio = a / e;
                assert!(
                    (component_ratio / ratio - 1.0).abs() < 0.03,
                    "{:?} vs {:?}",
                    expected,
                    actual
                );
            }
        }
    }

    #[test]
    fn test_cartesian_validation() {
        let mut vector = DirectionVector::default();
        assert!(vector.set_cartesian(&[]).is_err());
        assert_eq!(vector.set_cartesian(&[0.0, 0.0]), Err(DirectionError::ZeroVector));
        assert!(vector.set_cartesian(&[1.0, 2.0, 3.0, 4.0]).is_err());
        assert_eq!(vector.cartesian(), &[1.0]);

        vector.set_cartesian(&[3.0, -4.0]).unwrap();
        assert_eq!(vector.num_axes(), 2);
        assert_eq!(vector.original_coordinate_system(), CoordinateSystem::Cartesian);
    }

    #[test]
    fn test_polar_from_cartesian() {
        let mut vector = DirectionVector::default();
        vector.set_cartesian(&[1.0, 0.0]).unwrap();
        assert_eq!(vector.polar().unwrap(), 9000.0);
        vector.set_cartesian(&[0.0, -1.0]).unwrap();
        assert_eq!(vector.polar().unwrap(), 0.0);
        vector.set_cartesian(&[0.0, 1.0]).unwrap();
        assert_eq!(vector.polar().unwrap(), 18000.0);
        vector.set_cartesian(&[-5.0, 0.0]).unwrap();
        assert_eq!(vector.polar().unwrap(), 27000.0);
    }

    #[test]
    fn test_spherical_from_cartesian() {
        let mut vector = DirectionVector::default();
        vector.set_cartesian(&[1.0, 1.0, 2.0f32.sqrt()]).unwrap();
        assert_eq!(vector.spherical().unwrap(), vec![4500.0, 4500.0]);

        vector.set_cartesian(&[0.0, 0.0, -30.0]).unwrap();
        assert_eq!(vector.spherical().unwrap(), vec![0.0, 27000.0]);
    }

    #[test]
    fn test_polar_round_trip() {
        let mut vector = DirectionVector::default();
        vector.set_polar(&[9000.0]).unwrap();
        assert_same_direction(&[1.0, 0.0], vector.cartesian());
        vector.set_polar(&[0.0]).unwrap();
        assert_same_direction(&[0.0, -1.0], vector.cartesian());
        assert_eq!(vector.original_coordinate_system(), CoordinateSystem::Polar);
    }

    #[test]
    fn test_single_axis_rejects_angles() {
        let mut vector = DirectionVector::default();
        vector.set_cartesian(&[-2.0]).unwrap();
        assert!(vector.polar().is_err());
        assert!(vector.spherical().is_err());
        assert_eq!(vector.magnitude_components(1000.0), vec![-1000.0]);
    }

    #[test]
    fn test_invalid_angles_leave_state() {
        let mut vector = DirectionVector::default();
        vector.set_cartesian(&[1.0, 2.0]).unwrap();

        assert!(vector.set_polar(&[36000.0]).is_err());
        assert!(vector.set_polar(&[100.0, 200.0]).is_err());
        assert_eq!(
            vector.set_spherical(&[1.0, 2.0, 3.0]),
            Err(DirectionError::AngleCount {
                system: CoordinateSystem::Spherical,
                axes: 3,
                expected: 2,
                actual: 3,
            })
        );
        assert_eq!(
            vector.set_spherical(&[]),
            Err(DirectionError::AngleCount {
                system: CoordinateSystem::Spherical,
                axes: 2,
                expected: 1,
                actual: 0,
            })
        );
        assert!(vector.set_spherical(&[-1.0]).is_err());
        assert_eq!(vector.cartesian(), &[1.0, 2.0]);
    }

    #[test]
    fn test_magnitude_components_45_degrees() {
        let mut vector = DirectionVector::default();
        vector.set_cartesian(&[1.0, 1.0]).unwrap();
        let components = vector.magnitude_components(1000.0);
        let expected = 1000.0 * std::f32::consts::FRAC_PI_4.cos();
        assert!((components[0] - expected).abs() < 0.01);
        assert!((components[1] - expected).abs() < 0.01);
    }

    fn nonzero_vector(len: usize) -> impl Strategy<Value = Vec<EffectValue>> {
        prop::collection::vec(-100i32..=100, len)
            .prop_filter("zero vector", |v| v.iter().any(|c| *c != 0))
            .prop_map(|v| v.into_iter().map(|c| c as EffectValue).collect())
    }

    proptest! {
        #[test]
        fn prop_spherical_round_trip(coordinates in nonzero_vector(3)) {
            let mut vector = DirectionVector::default();
            vector.set_cartesian(&coordinates).unwrap();
            let spherical = vector.spherical().unwrap();

            let mut recovered = DirectionVector::default();
            recovered.set_spherical(&spherical).unwrap();

            let original: Vec<f64> = coordinates.iter().map(|c| *c as f64).collect();
            let back: Vec<f64> = recovered.cartesian().iter().map(|c| *c as f64).collect();
            let norm = |v: &[f64]| v.iter().map(|c| c * c).sum::<f64>().sqrt();
            for (o, b) in original.iter().zip(&back) {
                prop_assert!((o / norm(&original) - b / norm(&back)).abs() < 0.03);
            }
        }

        #[test]
        fn prop_polar_round_trip(coordinates in nonzero_vector(2)) {
            let mut vector = DirectionVector::default();
            vector.set_cartesian(&coordinates).unwrap();
            let polar = vector.polar().unwrap();

            let mut recovered = DirectionVector::default();
            recovered.set_polar(&[polar]).unwrap();
            prop_assert!((recovered.polar().unwrap() - polar).abs() <= 1.0
                || (recovered.polar().unwrap() - polar).abs() >= 35999.0);
        }
    }
}
