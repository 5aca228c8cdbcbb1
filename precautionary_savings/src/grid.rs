use ndarray::Array1;

use crate::error::ConfigError;

/// Uniformly spaced asset grid on `[a_min, a_max]`
///
/// The first point is exactly `a_min`, the last exactly `a_max`, and the
/// points are strictly increasing.
#[derive(Debug, Clone, PartialEq)]
pub struct AssetGrid {
    values: Array1<f64>,
}

impl AssetGrid {
    /// Build a grid of `points` values spanning `[a_min, a_max]`
    pub fn uniform(a_min: f64, a_max: f64, points: usize) -> Result<Self, ConfigError> {
        if points < 2 {
            return Err(ConfigError::TooFewGridPoints(points));
        }
        if !a_min.is_finite() || !a_max.is_finite() {
            return Err(ConfigError::NonFiniteGridBound { a_min, a_max });
        }
        if a_max <= a_min {
            return Err(ConfigError::EmptyGridRange { a_min, a_max });
        }

        let span = a_max - a_min;
        let last = points - 1;
        let mut values =
            Array1::from_shape_fn(points, |i| a_min + span * (i as f64) / (last as f64));
        // Rounding in the affine map can leave the endpoint one ulp off
        values[last] = a_max;

        if (1..points).any(|i| values[i] <= values[i - 1]) {
            return Err(ConfigError::DegenerateGrid {
                a_min,
                a_max,
                points,
            });
        }

        Ok(AssetGrid { values })
    }

    /// Number of grid points (`Na`)
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Always false: a valid grid has at least two points
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn values(&self) -> &Array1<f64> {
        &self.values
    }

    /// Asset level at index `i`
    pub fn value(&self, i: usize) -> f64 {
        self.values[i]
    }

    pub fn min(&self) -> f64 {
        self.values[0]
    }

    pub fn max(&self) -> f64 {
        self.values[self.len() - 1]
    }

    /// Distance between neighbouring points
    pub fn step(&self) -> f64 {
        (self.max() - self.min()) / (self.len() - 1) as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoints_are_exact() {
        let grid = AssetGrid::uniform(0.0, 8.0, 301).unwrap();
        assert_eq!(grid.len(), 301);
        assert_eq!(grid.min(), 0.0);
        assert_eq!(grid.max(), 8.0);
        assert_eq!(grid.value(0), 0.0);
        assert_eq!(grid.value(300), 8.0);
    }

    #[test]
    fn strictly_increasing_and_uniform() {
        let grid = AssetGrid::uniform(-1.0, 1.0, 11).unwrap();
        for i in 1..grid.len() {
            assert!(grid.value(i) > grid.value(i - 1));
            assert!((grid.value(i) - grid.value(i - 1) - 0.2).abs() < 1e-12);
        }
        assert!((grid.step() - 0.2).abs() < 1e-15);
    }

    #[test]
    fn minimum_grid_has_two_points() {
        let grid = AssetGrid::uniform(0.0, 1.0, 2).unwrap();
        assert_eq!(grid.values().to_vec(), vec![0.0, 1.0]);
    }

    #[test]
    fn rejects_too_few_points() {
        assert_eq!(
            AssetGrid::uniform(0.0, 1.0, 1),
            Err(ConfigError::TooFewGridPoints(1))
        );
        assert_eq!(
            AssetGrid::uniform(0.0, 1.0, 0),
            Err(ConfigError::TooFewGridPoints(0))
        );
    }

    #[test]
    fn rejects_empty_range() {
        assert!(matches!(
            AssetGrid::uniform(1.0, 1.0, 5),
            Err(ConfigError::EmptyGridRange { .. })
        ));
        assert!(matches!(
            AssetGrid::uniform(2.0, 1.0, 5),
            Err(ConfigError::EmptyGridRange { .. })
        ));
    }

    #[test]
    fn rejects_non_finite_bounds() {
        assert!(matches!(
            AssetGrid::uniform(0.0, f64::INFINITY, 5),
            Err(ConfigError::NonFiniteGridBound { .. })
        ));
        assert!(matches!(
            AssetGrid::uniform(f64::NAN, 1.0, 5),
            Err(ConfigError::NonFiniteGridBound { .. })
        ));
    }

    #[test]
    fn rejects_range_too_narrow_for_points() {
        assert!(matches!(
            AssetGrid::uniform(1.0, 1.0 + f64::EPSILON, 10),
            Err(ConfigError::DegenerateGrid { .. })
        ));
    }
}
