//! Feature normalization table.
//!
//! Loaded once at startup from a JSON object keyed by feature name and never
//! mutated afterwards. Two record shapes are accepted:
//!
//! ```json
//! { "x": { "mean": 0.0, "scale": 303.1 }, "fc": { "min": 20.0, "max": 40.0 } }
//! ```

use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ConfigurationError;

/// Normalization parameters for one feature.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ScalerEntry {
    /// `(value - mean) / scale`
    Standard { mean: f64, scale: f64 },
    /// `(value - min) / (max - min)`; a zero span divides by 1.
    MinMax { min: f64, max: f64 },
}

impl ScalerEntry {
    /// Normalizes a raw value.
    #[must_use]
    pub fn normalize(&self, value: f64) -> f64 {
        match *self {
            Self::Standard { mean, scale } => (value - mean) / scale,
            Self::MinMax { min, max } => {
                let span = max - min;
                let span = if span == 0.0 { 1.0 } else { span };
                (value - min) / span
            }
        }
    }

    fn validate(&self, feature: &str) -> Result<(), ConfigurationError> {
        let invalid = |reason: &str| ConfigurationError::InvalidScalerEntry {
            feature: feature.to_string(),
            reason: reason.to_string(),
        };
        match *self {
            Self::Standard { mean, scale } => {
                if !mean.is_finite() || !scale.is_finite() {
                    return Err(invalid("mean and scale must be finite"));
                }
                if scale == 0.0 {
                    return Err(invalid("scale must be non-zero"));
                }
            }
            Self::MinMax { min, max } => {
                if !min.is_finite() || !max.is_finite() {
                    return Err(invalid("min and max must be finite"));
                }
            }
        }
        Ok(())
    }
}

/// Read-only mapping from feature name to normalization parameters.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ScalerTable {
    entries: HashMap<String, ScalerEntry>,
}

impl ScalerTable {
    /// Builds a table from `(name, entry)` pairs.
    pub fn from_entries<I, K>(entries: I) -> Result<Self, ConfigurationError>
    where
        I: IntoIterator<Item = (K, ScalerEntry)>,
        K: Into<String>,
    {
        let entries: HashMap<String, ScalerEntry> =
            entries.into_iter().map(|(k, v)| (k.into(), v)).collect();
        for (name, entry) in &entries {
            entry.validate(name)?;
        }
        Ok(Self { entries })
    }

    /// Parses a table from JSON bytes.
    pub fn from_json_slice(bytes: &[u8]) -> Result<Self, ConfigurationError> {
        let table: Self = serde_json::from_slice(bytes).map_err(|e| {
            ConfigurationError::invalid("scaler", format!("invalid scaler JSON: {e}"))
        })?;
        for (name, entry) in &table.entries {
            entry.validate(name)?;
        }
        Ok(table)
    }

    /// Loads a table from a JSON file.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigurationError> {
        let path = path.as_ref();
        let bytes = std::fs::read(path).map_err(|e| ConfigurationError::Io {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        Self::from_json_slice(&bytes)
    }

    /// Looks up a feature's parameters.
    pub fn entry(&self, feature: &str) -> Result<&ScalerEntry, ConfigurationError> {
        self.entries
            .get(feature)
            .ok_or_else(|| ConfigurationError::MissingScalerEntry {
                feature: feature.to_string(),
            })
    }

    /// Fails on the first feature without an entry.
    pub fn require(&self, features: &[&str]) -> Result<(), ConfigurationError> {
        for feature in features {
            self.entry(feature)?;
        }
        Ok(())
    }

    /// Normalizes `value` under `feature`.
    pub fn normalize(&self, feature: &str, value: f64) -> Result<f64, ConfigurationError> {
        Ok(self.entry(feature)?.normalize(value))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
