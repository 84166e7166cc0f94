//! Error types for beamtwin.
//!
//! Errors are strongly typed using thiserror and split by how the service
//! reacts to them: configuration errors stop startup, collaborator errors
//! discard a single tick, transport errors end a single session.

use thiserror::Error;

/// Startup-time errors. The service refuses to start when one is raised.
#[derive(Debug, Error)]
pub enum ConfigurationError {
    #[error("Scaler table has no entry for required feature '{feature}'")]
    MissingScalerEntry {
        feature: String,
    },

    #[error("Scaler entry for '{feature}' is invalid: {reason}")]
    InvalidScalerEntry {
        feature: String,
        reason: String,
    },

    #[error("Failed to load {model} model: {message}")]
    ModelLoad {
        model: String,
        message: String,
    },

    #[error("Invalid parameter '{name}': {reason}")]
    InvalidParameter {
        name: String,
        reason: String,
    },

    #[error("Failed to read '{path}': {message}")]
    Io {
        path: String,
        message: String,
    },
}

impl ConfigurationError {
    pub(crate) fn invalid(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidParameter {
            name: name.into(),
            reason: reason.into(),
        }
    }
}

/// Per-tick failures of an external collaborator.
#[derive(Debug, Error)]
pub enum CollaboratorError {
    #[error("{collaborator} collaborator failed: {message}")]
    Failed {
        collaborator: &'static str,
        message: String,
    },

    #[error("{collaborator} collaborator returned a non-finite value at index {index}")]
    NonFinite {
        collaborator: &'static str,
        index: usize,
    },

    #[error("{collaborator} collaborator returned {actual} rows, expected {expected}")]
    ShapeMismatch {
        collaborator: &'static str,
        expected: usize,
        actual: usize,
    },
}

/// Per-session transport errors.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("Send failed: {message}")]
    SendFailed {
        message: String,
    },

    #[error("Failed to serialize tick message: {message}")]
    SerializationFailed {
        message: String,
    },

    #[error("Encoded payload of {size} bytes exceeds limit of {max} bytes")]
    PayloadTooLarge {
        size: usize,
        max: usize,
    },
}

/// Top-level error type for beamtwin.
#[derive(Debug, Error)]
pub enum TwinError {
    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigurationError),

    #[error("Collaborator error: {0}")]
    Collaborator(#[from] CollaboratorError),

    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("Internal error: {message}")]
    Internal {
        message: String,
    },
}

impl TwinError {
    /// Creates an internal error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Returns true if this is a configuration error.
    #[must_use]
    pub const fn is_configuration(&self) -> bool {
        matches!(self, Self::Configuration(_))
    }

    /// Returns true if this is a collaborator error.
    #[must_use]
    pub const fn is_collaborator(&self) -> bool {
        matches!(self, Self::Collaborator(_))
    }

    /// Returns true if this is a transport error.
    #[must_use]
    pub const fn is_transport(&self) -> bool {
        matches!(self, Self::Transport(_))
    }

    /// Returns true if this is an internal error.
    #[must_use]
    pub const fn is_internal(&self) -> bool {
        matches!(self, Self::Internal { .. })
    }

    /// Returns true if the simulation loop may continue with the next tick.
    #[must_use]
    pub const fn is_recoverable(&self) -> bool {
        matches!(self, Self::Collaborator(_))
    }
}

/// Result type alias for beamtwin operations.
pub type TwinResult<T> = Result<T, TwinError>;
