//! Runtime configuration for the twin.
//!
//! Every tunable constant of the simulation lives here. Defaults reproduce the
//! reference scenario: a 1050 x 300 beam under a 50 kN load, sampled on a
//! 51 x 51 mesh, ticking every 500 ms.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigurationError;
use crate::session::MAX_TICK_JSON_BYTES;

/// Longest JSON rendering of one stress value (`-2.2250738585072014e-308`)
/// plus its separator.
const MAX_STRESS_JSON_BYTES: usize = 25;

/// Room left in a tick message for `time`, `damage_prediction` and `rul`.
const TICK_ENVELOPE_BYTES: usize = 256;

/// Largest mesh whose tick message always fits in [`MAX_TICK_JSON_BYTES`].
/// Resolution 408 (167 281 points) is the largest accepted.
pub const MAX_POINT_COUNT: usize = (MAX_TICK_JSON_BYTES - TICK_ENVELOPE_BYTES) / MAX_STRESS_JSON_BYTES;

/// Rejects resolutions that are zero or whose `(R+1)^2` mesh exceeds
/// [`MAX_POINT_COUNT`].
pub fn check_resolution(resolution: usize) -> Result<(), ConfigurationError> {
    if resolution == 0 {
        return Err(ConfigurationError::invalid("resolution", "must be at least 1"));
    }
    let points = resolution.checked_add(1).and_then(|side| side.checked_mul(side));
    match points {
        Some(points) if points <= MAX_POINT_COUNT => Ok(()),
        _ => Err(ConfigurationError::invalid(
            "resolution",
            format!("mesh of ({resolution}+1)^2 points exceeds the limit of {MAX_POINT_COUNT}"),
        )),
    }
}

/// Fixed load and material constants fed to the surrogate for every mesh point.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoadScenario {
    /// Applied load magnitude.
    pub load_mag: f64,
    /// Global mid-span deflection.
    pub global_deflection: f64,
    /// Concrete compressive strength.
    pub fc: f64,
    /// Reinforcement yield strength.
    pub fy: f64,
}

impl Default for LoadScenario {
    fn default() -> Self {
        Self {
            load_mag: 50_000.0,
            global_deflection: 5.5,
            fc: 25.0,
            fy: 314.0,
        }
    }
}

/// Growth-law constants: `growth = base + stress_coefficient * max_stress`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GrowthConfig {
    pub base: f64,
    pub stress_coefficient: f64,
}

impl Default for GrowthConfig {
    fn default() -> Self {
        Self {
            base: 0.002,
            stress_coefficient: 4e-8,
        }
    }
}

/// How tick cadence is driven when sessions are attached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CadenceMode {
    /// A single scheduler ticks the authority and fans results out to sessions.
    #[default]
    Broadcast,
    /// Each session drives its own ticks through the serialized authority.
    PerSession,
}

/// Twin configuration.
#[allow(missing_docs)]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TwinConfig {
    /// Mesh resolution `R`; the mesh has `(R+1)^2` points.
    pub resolution: usize,
    pub beam_length: f64,
    pub beam_height: f64,
    pub scenario: LoadScenario,
    /// Damage at process start.
    pub initial_damage: f64,
    pub failure_threshold: f64,
    /// Simulated time advanced per tick.
    pub time_step: f64,
    pub growth: GrowthConfig,
    /// Damage amplification constant `k`.
    pub amplification: f64,
    pub history_capacity: usize,
    /// Real wait between ticks, in milliseconds.
    pub cadence_ms: u64,
    pub cadence_mode: CadenceMode,
    /// Per-subscriber buffer of the broadcast fan-out.
    pub broadcast_capacity: usize,
}

impl Default for TwinConfig {
    fn default() -> Self {
        Self {
            resolution: 50,
            beam_length: 1050.0,
            beam_height: 300.0,
            scenario: LoadScenario::default(),
            initial_damage: 0.05,
            failure_threshold: 0.9,
            time_step: 1.0,
            growth: GrowthConfig::default(),
            amplification: 2.5,
            history_capacity: 10,
            cadence_ms: 500,
            cadence_mode: CadenceMode::default(),
            broadcast_capacity: 16,
        }
    }
}

impl TwinConfig {
    /// Loads a configuration from a JSON file. Missing fields take defaults.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigurationError> {
        let path = path.as_ref();
        let bytes = std::fs::read(path).map_err(|e| ConfigurationError::Io {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        let config: Self = serde_json::from_slice(&bytes)
            .map_err(|e| ConfigurationError::invalid("config", format!("invalid JSON: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Checks that every constant is usable by the simulation.
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        check_resolution(self.resolution)?;
        positive_finite("beam_length", self.beam_length)?;
        positive_finite("beam_height", self.beam_height)?;
        positive_finite("time_step", self.time_step)?;
        if !(0.0..=1.0).contains(&self.initial_damage) {
            return Err(ConfigurationError::invalid("initial_damage", "must lie in [0, 1]"));
        }
        if !(self.failure_threshold > 0.0 && self.failure_threshold <= 1.0) {
            return Err(ConfigurationError::invalid("failure_threshold", "must lie in (0, 1]"));
        }
        for (name, value) in [
            ("scenario.load_mag", self.scenario.load_mag),
            ("scenario.global_deflection", self.scenario.global_deflection),
            ("scenario.fc", self.scenario.fc),
            ("scenario.fy", self.scenario.fy),
            ("growth.base", self.growth.base),
            ("growth.stress_coefficient", self.growth.stress_coefficient),
            ("amplification", self.amplification),
        ] {
            if !value.is_finite() {
                return Err(ConfigurationError::invalid(name, "must be finite"));
            }
        }
        if self.history_capacity == 0 {
            return Err(ConfigurationError::invalid("history_capacity", "must be at least 1"));
        }
        if self.cadence_ms == 0 {
            return Err(ConfigurationError::invalid("cadence_ms", "must be at least 1"));
        }
        if self.broadcast_capacity == 0 {
            return Err(ConfigurationError::invalid("broadcast_capacity", "must be at least 1"));
        }
        Ok(())
    }

    /// Tick cadence as a `Duration`.
    #[must_use]
    pub const fn cadence(&self) -> Duration {
        Duration::from_millis(self.cadence_ms)
    }

    /// Number of mesh points per tick. Saturates for resolutions that
    /// [`validate`](Self::validate) rejects.
    #[must_use]
    pub const fn point_count(&self) -> usize {
        let side = self.resolution.saturating_add(1);
        side.saturating_mul(side)
    }
}

fn positive_finite(name: &str, value: f64) -> Result<(), ConfigurationError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(ConfigurationError::invalid(name, "must be positive and finite"))
    }
}
