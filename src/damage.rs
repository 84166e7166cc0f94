//! Damage evolution.
//!
//! A single continuous state advanced once per tick:
//! `damage' = min(1, damage + max(0, base + stress_coefficient * max_stress))`.

use serde::{Deserialize, Serialize};

use crate::config::GrowthConfig;
use crate::error::ConfigurationError;

/// Stress-driven growth law.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DamageLaw {
    base: f64,
    stress_coefficient: f64,
}

impl DamageLaw {
    #[must_use]
    pub const fn new(base: f64, stress_coefficient: f64) -> Self {
        Self {
            base,
            stress_coefficient,
        }
    }

    /// Per-tick growth, never negative.
    #[must_use]
    pub fn growth_rate(&self, max_stress: f64) -> f64 {
        (self.base + self.stress_coefficient * max_stress).max(0.0)
    }
}

impl Default for DamageLaw {
    fn default() -> Self {
        GrowthConfig::default().into()
    }
}

impl From<GrowthConfig> for DamageLaw {
    fn from(cfg: GrowthConfig) -> Self {
        Self::new(cfg.base, cfg.stress_coefficient)
    }
}

/// Scalar damage in `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DamageState(f64);

impl DamageState {
    pub fn new(value: f64) -> Result<Self, ConfigurationError> {
        if value.is_finite() && (0.0..=1.0).contains(&value) {
            Ok(Self(value))
        } else {
            Err(ConfigurationError::invalid("damage", format!("{value} is outside [0, 1]")))
        }
    }

    #[must_use]
    pub const fn value(self) -> f64 {
        self.0
    }

    /// Applies one tick of growth. A non-finite stress leaves the state unchanged.
    #[must_use]
    pub fn advance(self, max_stress: f64, law: &DamageLaw) -> Self {
        let growth = law.growth_rate(max_stress);
        if !growth.is_finite() {
            return self;
        }
        Self((self.0 + growth).min(1.0))
    }

    /// True once damage has saturated; further growth has no effect.
    #[must_use]
    pub fn is_failed(self) -> bool {
        self.0 >= 1.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn growth_law_matches_reference_values() {
        let law = DamageLaw::default();
        assert!((law.growth_rate(1000.0) - 0.00204).abs() < 1e-12);
        let next = DamageState::new(0.05).unwrap().advance(1000.0, &law);
        assert!((next.value() - 0.05204).abs() < 1e-12);
    }

    #[test]
    fn negative_stress_never_decreases_damage() {
        let law = DamageLaw::default();
        assert_eq!(law.growth_rate(-1e9), 0.0);
        let d = DamageState::new(0.3).unwrap();
        assert!(d.advance(-1e9, &law) >= d);
    }

    #[test]
    fn saturates_at_one() {
        let law = DamageLaw::default();
        let d = DamageState::new(0.999).unwrap().advance(1e6, &law);
        assert_eq!(d.value(), 1.0);
        assert!(d.is_failed());
        assert_eq!(d.advance(1e6, &law), d);
        assert!(!DamageState::new(0.999).unwrap().is_failed());
    }

    #[test]
    fn trajectory_is_non_decreasing() {
        let law = DamageLaw::default();
        let mut d = DamageState::new(0.0).unwrap();
        for stress in [500.0, -300.0, 0.0, 1e7, f64::NAN, 250.0, -1e12, 1e9] {
            let next = d.advance(stress, &law);
            assert!(next >= d, "{next:?} < {d:?} at stress {stress}");
            d = next;
        }
    }

    #[test]
    fn out_of_range_damage_is_rejected() {
        assert!(DamageState::new(-0.1).is_err());
        assert!(DamageState::new(1.1).is_err());
        assert!(DamageState::new(f64::NAN).is_err());
        assert!(DamageState::new(1.0).is_ok());
    }
}
