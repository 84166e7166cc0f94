use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::collaborator::PrognosticsModel;
use crate::error::{CollaboratorError, ConfigurationError};
use crate::history::StressSample;

use super::dense::{sigmoid, DenseNetwork};
use super::{model_error, read_model_file};

/// Features per time step: `(max_stress, avg_stress)`.
const SEQUENCE_FEATURES: usize = 2;

/// LSTM cell weights in Keras layout, gate order `i, f, c, o`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LstmLayer {
    /// `[input][4 * units]`
    pub kernel: Vec<Vec<f64>>,
    /// `[units][4 * units]`
    pub recurrent_kernel: Vec<Vec<f64>>,
    /// `[4 * units]`
    pub bias: Vec<f64>,
}

impl LstmLayer {
    #[must_use]
    pub fn units(&self) -> usize {
        self.recurrent_kernel.len()
    }

    fn validate(&self, model: &str) -> Result<(), ConfigurationError> {
        let units = self.units();
        if units == 0 {
            return Err(model_error(model, "lstm has no units"));
        }
        let gates = 4 * units;
        if self.kernel.len() != SEQUENCE_FEATURES {
            return Err(model_error(
                model,
                format!("lstm kernel has {} input rows, expected {SEQUENCE_FEATURES}", self.kernel.len()),
            ));
        }
        let rows_ok = self.kernel.iter().chain(&self.recurrent_kernel).all(|r| r.len() == gates);
        if !rows_ok || self.bias.len() != gates {
            return Err(model_error(model, format!("lstm gate width must be {gates} (4 x {units} units)")));
        }
        let finite = self
            .kernel
            .iter()
            .chain(&self.recurrent_kernel)
            .flatten()
            .chain(&self.bias)
            .all(|v| v.is_finite());
        if !finite {
            return Err(model_error(model, "lstm has non-finite parameters"));
        }
        Ok(())
    }

    /// Runs the sequence and returns the final hidden state.
    fn run(&self, sequence: &[StressSample]) -> Vec<f64> {
        let units = self.units();
        let mut h = vec![0.0; units];
        let mut c = vec![0.0; units];
        let mut z = vec![0.0; 4 * units];

        for sample in sequence {
            let x = [sample.max_stress, sample.avg_stress];
            z.copy_from_slice(&self.bias);
            for (xi, row) in x.iter().zip(&self.kernel) {
                for (acc, w) in z.iter_mut().zip(row) {
                    *acc += xi * w;
                }
            }
            for (hi, row) in h.iter().zip(&self.recurrent_kernel) {
                for (acc, w) in z.iter_mut().zip(row) {
                    *acc += hi * w;
                }
            }
            for u in 0..units {
                let i = sigmoid(z[u]);
                let f = sigmoid(z[units + u]);
                let g = z[2 * units + u].tanh();
                let o = sigmoid(z[3 * units + u]);
                c[u] = f * c[u] + i * g;
                h[u] = o * c[u].tanh();
            }
        }
        h
    }
}

#[derive(Deserialize)]
struct PrognosticsFile {
    lstm: LstmLayer,
    head: Vec<super::DenseLayer>,
}

/// Sequence prognostics model: LSTM over the stress window, dense head to one output.
#[derive(Debug, Clone)]
pub struct LstmPrognostics {
    lstm: LstmLayer,
    head: DenseNetwork,
}

impl LstmPrognostics {
    const MODEL: &'static str = "prognostics";

    pub fn new(lstm: LstmLayer, head: DenseNetwork) -> Result<Self, ConfigurationError> {
        lstm.validate(Self::MODEL)?;
        if head.input_dim() != lstm.units() {
            return Err(model_error(
                Self::MODEL,
                format!("head expects {} inputs, lstm has {} units", head.input_dim(), lstm.units()),
            ));
        }
        if head.output_dim() != 1 {
            return Err(model_error(
                Self::MODEL,
                format!("head must produce 1 output, produces {}", head.output_dim()),
            ));
        }
        Ok(Self { lstm, head })
    }

    /// Loads `{"lstm": {...}, "head": [...]}` from a JSON file.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigurationError> {
        let file: PrognosticsFile = read_model_file(path.as_ref(), Self::MODEL)?;
        Self::new(file.lstm, DenseNetwork::new(file.head, Self::MODEL)?)
    }
}

impl PrognosticsModel for LstmPrognostics {
    fn predict(&self, window: &[StressSample]) -> Result<f64, CollaboratorError> {
        if window.is_empty() {
            return Err(CollaboratorError::ShapeMismatch {
                collaborator: "prognostics",
                expected: 1,
                actual: 0,
            });
        }
        let hidden = self.lstm.run(window);
        Ok(self.head.forward(&hidden)[0])
    }
}
