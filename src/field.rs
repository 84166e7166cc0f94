//! Stress field evaluation.

use std::sync::Arc;

use serde::Serialize;

use crate::collaborator::{SurrogateModel, STRESS_COMPONENT};
use crate::error::CollaboratorError;
use crate::grid::FeatureBatch;

/// Damage-amplified stress: `base * (1 + k * severity)`.
#[must_use]
pub fn amplify(base_stress: f64, k: f64, crack_severity: f64) -> f64 {
    base_stress * (1.0 + k * crack_severity)
}

/// Stress values in mesh order plus their aggregates.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StressField {
    pub values: Vec<f64>,
    pub max_stress: f64,
    pub avg_stress: f64,
}

impl StressField {
    fn from_values(values: Vec<f64>) -> Self {
        let max_stress = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        #[allow(clippy::cast_precision_loss)]
        let avg_stress = values.iter().sum::<f64>() / values.len() as f64;
        Self {
            values,
            max_stress,
            avg_stress,
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Turns a normalized batch plus a damage snapshot into a [`StressField`].
pub struct StressFieldEvaluator {
    surrogate: Arc<dyn SurrogateModel>,
    amplification: f64,
}

impl StressFieldEvaluator {
    #[must_use]
    pub fn new(surrogate: Arc<dyn SurrogateModel>, amplification: f64) -> Self {
        Self {
            surrogate,
            amplification,
        }
    }

    /// Evaluates the whole mesh with one surrogate call.
    pub fn evaluate(&self, batch: &FeatureBatch, crack_severity: f64) -> Result<StressField, CollaboratorError> {
        if batch.is_empty() {
            return Err(CollaboratorError::ShapeMismatch {
                collaborator: "surrogate",
                expected: 1,
                actual: 0,
            });
        }

        let outputs = self.surrogate.predict(batch)?;
        if outputs.len() != batch.len() {
            return Err(CollaboratorError::ShapeMismatch {
                collaborator: "surrogate",
                expected: batch.len(),
                actual: outputs.len(),
            });
        }

        let mut values = Vec::with_capacity(outputs.len());
        for (index, row) in outputs.iter().enumerate() {
            let stress = amplify(row[STRESS_COMPONENT], self.amplification, crack_severity);
            if !stress.is_finite() || !row.iter().all(|v| v.is_finite()) {
                return Err(CollaboratorError::NonFinite {
                    collaborator: "surrogate",
                    index,
                });
            }
            values.push(stress);
        }

        Ok(StressField::from_values(values))
    }
}

impl std::fmt::Debug for StressFieldEvaluator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StressFieldEvaluator")
            .field("amplification", &self.amplification)
            .finish_non_exhaustive()
    }
}
