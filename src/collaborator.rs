//! External collaborator interfaces.
//!
//! The twin depends on three predictive models it does not train or own:
//! a surrogate regression model for the stress field, a sequence model for
//! damage prognostics, and a crack-severity estimator. Each is a trait so the
//! authority can be wired with JSON-weight adapters (see [`crate::models`]),
//! remote clients, or test doubles.

use crate::error::CollaboratorError;
use crate::grid::FeatureBatch;
use crate::history::StressSample;

/// Surrogate output row: `[strain, stress, damage]`.
pub type SurrogateOutput = [f64; 3];

/// Index of the stress component in a [`SurrogateOutput`].
pub const STRESS_COMPONENT: usize = 1;

/// Batched surrogate regression model.
pub trait SurrogateModel: Send + Sync {
    /// Evaluates every row of `batch` in a single call, preserving order.
    fn predict(&self, batch: &FeatureBatch) -> Result<Vec<SurrogateOutput>, CollaboratorError>;
}

/// Sequence model mapping a stress history to predicted damage.
pub trait PrognosticsModel: Send + Sync {
    /// `window` is ordered oldest to newest.
    fn predict(&self, window: &[StressSample]) -> Result<f64, CollaboratorError>;
}

/// A sensor or camera frame handed to a crack-severity estimator.
#[derive(Debug, Clone, Default)]
pub struct SensorFrame {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<u8>,
}

/// Estimates crack severity in `[0, 1]`.
pub trait CrackSeverityEstimator: Send + Sync {
    fn estimate(&self, frame: Option<&SensorFrame>, current_damage: f64) -> Result<f64, CollaboratorError>;
}

/// Stub estimator that reports the current damage state as the severity.
///
/// This couples amplification to the value being evolved; a vision-based
/// estimator replaces it with an independent measurement.
#[derive(Debug, Default, Clone, Copy)]
pub struct DamageEchoEstimator;

impl CrackSeverityEstimator for DamageEchoEstimator {
    fn estimate(&self, _frame: Option<&SensorFrame>, current_damage: f64) -> Result<f64, CollaboratorError> {
        Ok(current_damage)
    }
}
