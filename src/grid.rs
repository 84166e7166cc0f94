//! Mesh sampling and feature normalization.
//!
//! The mesh covers the beam's elevation centred on the origin. Points are
//! enumerated with `y` as the outer index and `x` as the inner index; this
//! ordering is the stress-field wire layout and must not change.

use std::sync::Arc;

use crate::config::{check_resolution, LoadScenario, TwinConfig};
use crate::error::ConfigurationError;
use crate::scaler::ScalerTable;

/// Number of surrogate input features.
pub const FEATURE_COUNT: usize = 6;

/// Surrogate input feature names, in column order.
pub const FEATURE_NAMES: [&str; FEATURE_COUNT] =
    ["x", "y", "load_mag", "global_deflection", "fc", "fy"];

/// One normalized surrogate input row.
pub type FeatureVector = [f64; FEATURE_COUNT];

/// A full tick's worth of normalized inputs in mesh order.
pub type FeatureBatch = Vec<FeatureVector>;

/// A mesh point with its indices and physical coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GridPoint {
    pub ix: usize,
    pub iy: usize,
    pub phys_x: f64,
    pub phys_y: f64,
}

/// Builds normalized feature batches over a fixed `(R+1) x (R+1)` mesh.
#[derive(Debug, Clone)]
pub struct GridSampler {
    resolution: usize,
    beam_length: f64,
    beam_height: f64,
    scaler: Arc<ScalerTable>,
}

impl GridSampler {
    /// Creates a sampler. Every feature in [`FEATURE_NAMES`] must have a scaler
    /// entry and the mesh must fit in one tick message.
    pub fn new(
        resolution: usize,
        beam_length: f64,
        beam_height: f64,
        scaler: Arc<ScalerTable>,
    ) -> Result<Self, ConfigurationError> {
        check_resolution(resolution)?;
        scaler.require(&FEATURE_NAMES)?;
        Ok(Self {
            resolution,
            beam_length,
            beam_height,
            scaler,
        })
    }

    /// Creates a sampler from the mesh section of a [`TwinConfig`].
    pub fn from_config(config: &TwinConfig, scaler: Arc<ScalerTable>) -> Result<Self, ConfigurationError> {
        Self::new(config.resolution, config.beam_length, config.beam_height, scaler)
    }

    /// `(R+1)^2`; bounded by construction.
    #[must_use]
    pub const fn point_count(&self) -> usize {
        (self.resolution + 1) * (self.resolution + 1)
    }

    /// Mesh points in wire order (y outer, x inner).
    pub fn points(&self) -> impl Iterator<Item = GridPoint> + '_ {
        let r = self.resolution;
        #[allow(clippy::cast_precision_loss)]
        let rf = r as f64;
        (0..=r).flat_map(move |iy| {
            (0..=r).map(move |ix| {
                #[allow(clippy::cast_precision_loss)]
                let (fx, fy) = (ix as f64, iy as f64);
                GridPoint {
                    ix,
                    iy,
                    phys_x: (fx / rf - 0.5) * self.beam_length,
                    phys_y: (fy / rf - 0.5) * self.beam_height,
                }
            })
        })
    }

    /// Produces the normalized feature batch for one tick.
    pub fn sample(&self, scenario: &LoadScenario) -> Result<FeatureBatch, ConfigurationError> {
        let x = self.scaler.entry(FEATURE_NAMES[0])?;
        let y = self.scaler.entry(FEATURE_NAMES[1])?;

        // Scenario columns are identical for every point.
        let load_mag = self.scaler.normalize(FEATURE_NAMES[2], scenario.load_mag)?;
        let deflection = self.scaler.normalize(FEATURE_NAMES[3], scenario.global_deflection)?;
        let fc = self.scaler.normalize(FEATURE_NAMES[4], scenario.fc)?;
        let fy = self.scaler.normalize(FEATURE_NAMES[5], scenario.fy)?;

        let mut batch = Vec::with_capacity(self.point_count());
        batch.extend(self.points().map(|p| {
            [
                x.normalize(p.phys_x),
                y.normalize(p.phys_y),
                load_mag,
                deflection,
                fc,
                fy,
            ]
        }));
        Ok(batch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::scaler::ScalerEntry;

    fn identity_scaler() -> Arc<ScalerTable> {
        Arc::new(
            ScalerTable::from_entries(
                FEATURE_NAMES.map(|name| (name, ScalerEntry::Standard { mean: 0.0, scale: 1.0 })),
            )
            .unwrap(),
        )
    }

    #[test]
    fn resolution_two_yields_nine_points_in_y_outer_order() {
        let sampler = GridSampler::new(2, 1050.0, 300.0, identity_scaler()).unwrap();
        let points: Vec<GridPoint> = sampler.points().collect();
        assert_eq!(points.len(), 9);
        assert_eq!(sampler.point_count(), 9);

        let indices: Vec<(usize, usize)> = points.iter().map(|p| (p.ix, p.iy)).collect();
        assert_eq!(
            indices,
            vec![(0, 0), (1, 0), (2, 0), (0, 1), (1, 1), (2, 1), (0, 2), (1, 2), (2, 2)]
        );
    }

    #[test]
    fn physical_coordinates_span_the_beam() {
        let sampler = GridSampler::new(2, 1050.0, 300.0, identity_scaler()).unwrap();
        let points: Vec<GridPoint> = sampler.points().collect();
        assert!((points[0].phys_x + 525.0).abs() < 1e-9);
        assert!((points[0].phys_y + 150.0).abs() < 1e-9);
        assert!(points[4].phys_x.abs() < 1e-9);
        assert!(points[4].phys_y.abs() < 1e-9);
        assert!((points[8].phys_x - 525.0).abs() < 1e-9);
        assert!((points[8].phys_y - 150.0).abs() < 1e-9);
    }

    #[test]
    fn sample_normalizes_every_column() {
        let scaler = Arc::new(
            ScalerTable::from_entries([
                ("x", ScalerEntry::Standard { mean: 0.0, scale: 525.0 }),
                ("y", ScalerEntry::Standard { mean: 0.0, scale: 150.0 }),
                ("load_mag", ScalerEntry::Standard { mean: 40_000.0, scale: 10_000.0 }),
                ("global_deflection", ScalerEntry::MinMax { min: 0.0, max: 11.0 }),
                ("fc", ScalerEntry::Standard { mean: 25.0, scale: 5.0 }),
                ("fy", ScalerEntry::Standard { mean: 300.0, scale: 14.0 }),
            ])
            .unwrap(),
        );
        let sampler = GridSampler::new(2, 1050.0, 300.0, scaler).unwrap();
        let batch = sampler.sample(&LoadScenario::default()).unwrap();

        assert_eq!(batch.len(), 9);
        assert!((batch[0][0] + 1.0).abs() < 1e-12);
        assert!((batch[0][1] + 1.0).abs() < 1e-12);
        assert!((batch[8][0] - 1.0).abs() < 1e-12);
        assert!((batch[8][1] - 1.0).abs() < 1e-12);
        for row in &batch {
            assert!((row[2] - 1.0).abs() < 1e-12);
            assert!((row[3] - 0.5).abs() < 1e-12);
            assert!(row[4].abs() < 1e-12);
            assert!((row[5] - 1.0).abs() < 1e-12);
        }
    }

    #[test]
    fn missing_scaler_entry_fails_construction() {
        let scaler = Arc::new(
            ScalerTable::from_entries([
                ("x", ScalerEntry::Standard { mean: 0.0, scale: 1.0 }),
                ("y", ScalerEntry::Standard { mean: 0.0, scale: 1.0 }),
            ])
            .unwrap(),
        );
        let err = GridSampler::new(2, 1050.0, 300.0, scaler).unwrap_err();
        assert!(matches!(err, ConfigurationError::MissingScalerEntry { ref feature } if feature == "load_mag"));
    }

    #[test]
    fn unstreamable_mesh_fails_construction() {
        assert!(GridSampler::new(0, 1050.0, 300.0, identity_scaler()).is_err());
        let err = GridSampler::new(usize::MAX, 1050.0, 300.0, identity_scaler()).unwrap_err();
        assert!(matches!(err, ConfigurationError::InvalidParameter { ref name, .. } if name == "resolution"));
    }

    #[test]
    fn default_resolution_yields_2601_points() {
        let sampler = GridSampler::from_config(&TwinConfig::default(), identity_scaler()).unwrap();
        assert_eq!(sampler.sample(&LoadScenario::default()).unwrap().len(), 2601);
    }
}
