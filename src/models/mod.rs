//! Inference adapters for trained collaborator models.
//!
//! Weights are exported from the training environment as JSON (Keras layout:
//! kernels are `[input][output]`). Shapes are validated at load time so a bad
//! export fails startup instead of the first tick.

use std::path::Path;

use serde::de::DeserializeOwned;

use crate::error::ConfigurationError;

/// Feed-forward network and the dense surrogate built on it.
pub mod dense;
/// Single-layer LSTM prognostics model.
pub mod lstm;

pub use dense::{Activation, DenseLayer, DenseNetwork, DenseSurrogate};
pub use lstm::{LstmLayer, LstmPrognostics};

pub(crate) fn read_model_file<T: DeserializeOwned>(path: &Path, model: &str) -> Result<T, ConfigurationError> {
    let bytes = std::fs::read(path).map_err(|e| ConfigurationError::Io {
        path: path.display().to_string(),
        message: e.to_string(),
    })?;
    serde_json::from_slice(&bytes).map_err(|e| ConfigurationError::ModelLoad {
        model: model.to_string(),
        message: format!("invalid weights JSON: {e}"),
    })
}

pub(crate) fn model_error(model: &str, message: impl Into<String>) -> ConfigurationError {
    ConfigurationError::ModelLoad {
        model: model.to_string(),
        message: message.into(),
    }
}
