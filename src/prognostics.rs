//! Damage forecasting and remaining useful life.
//!
//! RUL is a one-step linear extrapolation of the margin between the forecast
//! and the failure threshold, divided by the tick time step. It is not a
//! learned trajectory.
//!
//! The model's output is clamped to `[0, 1]` before it is reported or used
//! for RUL. A sequence model with a linear head can overshoot that range; a
//! non-finite output fails the tick instead.

use std::sync::Arc;

use serde::Serialize;

use crate::collaborator::PrognosticsModel;
use crate::error::CollaboratorError;
use crate::history::HistoryWindow;

/// Forecast for one tick. `rul` is `None` until the history window fills.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PrognosticsResult {
    pub predicted_damage: f64,
    pub rul: Option<f64>,
}

impl PrognosticsResult {
    /// Result used while the window is still filling.
    #[must_use]
    pub const fn unavailable(current_damage: f64) -> Self {
        Self {
            predicted_damage: current_damage,
            rul: None,
        }
    }
}

/// `(threshold - predicted) / time_step`, or zero at or past the threshold.
#[must_use]
pub fn remaining_useful_life(predicted_damage: f64, failure_threshold: f64, time_step: f64) -> f64 {
    if predicted_damage < failure_threshold {
        (failure_threshold - predicted_damage) / time_step
    } else {
        0.0
    }
}

/// Gates the sequence model on a full history window and derives RUL.
pub struct PrognosticsEstimator {
    model: Arc<dyn PrognosticsModel>,
    failure_threshold: f64,
    time_step: f64,
}

impl PrognosticsEstimator {
    #[must_use]
    pub fn new(model: Arc<dyn PrognosticsModel>, failure_threshold: f64, time_step: f64) -> Self {
        Self {
            model,
            failure_threshold,
            time_step,
        }
    }

    /// Forecasts from `window`, or reports `current_damage` with no RUL when
    /// the window is not yet full.
    pub fn estimate(&self, window: &HistoryWindow, current_damage: f64) -> Result<PrognosticsResult, CollaboratorError> {
        if !window.is_full() {
            return Ok(PrognosticsResult::unavailable(current_damage));
        }

        let predicted = self.model.predict(&window.snapshot())?;
        if !predicted.is_finite() {
            return Err(CollaboratorError::NonFinite {
                collaborator: "prognostics",
                index: 0,
            });
        }
        let predicted = predicted.clamp(0.0, 1.0);

        Ok(PrognosticsResult {
            predicted_damage: predicted,
            rul: Some(remaining_useful_life(predicted, self.failure_threshold, self.time_step)),
        })
    }
}

impl std::fmt::Debug for PrognosticsEstimator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PrognosticsEstimator")
            .field("failure_threshold", &self.failure_threshold)
            .field("time_step", &self.time_step)
            .finish_non_exhaustive()
    }
}
