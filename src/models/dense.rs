use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::collaborator::{SurrogateModel, SurrogateOutput};
use crate::error::{CollaboratorError, ConfigurationError};
use crate::grid::{FeatureBatch, FEATURE_COUNT};

use super::{model_error, read_model_file};

/// Element-wise layer activation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Activation {
    #[default]
    Linear,
    Tanh,
    Relu,
    Sigmoid,
}

impl Activation {
    #[must_use]
    pub fn apply(self, v: f64) -> f64 {
        match self {
            Self::Linear => v,
            Self::Tanh => v.tanh(),
            Self::Relu => v.max(0.0),
            Self::Sigmoid => sigmoid(v),
        }
    }
}

pub(crate) fn sigmoid(v: f64) -> f64 {
    1.0 / (1.0 + (-v).exp())
}

/// Fully connected layer. `weights` is `[input][output]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DenseLayer {
    pub weights: Vec<Vec<f64>>,
    pub bias: Vec<f64>,
    #[serde(default)]
    pub activation: Activation,
}

impl DenseLayer {
    #[must_use]
    pub fn input_dim(&self) -> usize {
        self.weights.len()
    }

    #[must_use]
    pub fn output_dim(&self) -> usize {
        self.bias.len()
    }

    fn validate(&self, model: &str, index: usize) -> Result<(), ConfigurationError> {
        if self.weights.is_empty() || self.bias.is_empty() {
            return Err(model_error(model, format!("layer {index} is empty")));
        }
        let out = self.output_dim();
        if let Some(row) = self.weights.iter().position(|r| r.len() != out) {
            return Err(model_error(
                model,
                format!("layer {index} weight row {row} has {} columns, bias has {out}", self.weights[row].len()),
            ));
        }
        let finite = self.weights.iter().flatten().chain(&self.bias).all(|v| v.is_finite());
        if !finite {
            return Err(model_error(model, format!("layer {index} has non-finite parameters")));
        }
        Ok(())
    }

    fn forward(&self, input: &[f64], output: &mut Vec<f64>) {
        output.clear();
        output.extend_from_slice(&self.bias);
        for (x, row) in input.iter().zip(&self.weights) {
            for (acc, w) in output.iter_mut().zip(row) {
                *acc += x * w;
            }
        }
        for v in output.iter_mut() {
            *v = self.activation.apply(*v);
        }
    }
}

/// Stack of dense layers with a validated shape chain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<DenseLayer>", into = "Vec<DenseLayer>")]
pub struct DenseNetwork {
    layers: Vec<DenseLayer>,
}

impl DenseNetwork {
    /// Validates that each layer's input matches the previous layer's output.
    pub fn new(layers: Vec<DenseLayer>, model: &str) -> Result<Self, ConfigurationError> {
        if layers.is_empty() {
            return Err(model_error(model, "network has no layers"));
        }
        for (index, layer) in layers.iter().enumerate() {
            layer.validate(model, index)?;
        }
        for (index, pair) in layers.windows(2).enumerate() {
            if pair[0].output_dim() != pair[1].input_dim() {
                return Err(model_error(
                    model,
                    format!(
                        "layer {} outputs {} values but layer {} expects {}",
                        index,
                        pair[0].output_dim(),
                        index + 1,
                        pair[1].input_dim()
                    ),
                ));
            }
        }
        Ok(Self { layers })
    }

    #[must_use]
    pub fn input_dim(&self) -> usize {
        self.layers[0].input_dim()
    }

    #[must_use]
    pub fn output_dim(&self) -> usize {
        self.layers[self.layers.len() - 1].output_dim()
    }

    /// Runs one input through every layer. `scratch` buffers are reused across rows.
    pub(crate) fn forward_into(&self, input: &[f64], a: &mut Vec<f64>, b: &mut Vec<f64>) {
        a.clear();
        a.extend_from_slice(input);
        for layer in &self.layers {
            layer.forward(a, b);
            std::mem::swap(a, b);
        }
    }

    /// Convenience single-row forward pass.
    #[must_use]
    pub fn forward(&self, input: &[f64]) -> Vec<f64> {
        let (mut a, mut b) = (Vec::new(), Vec::new());
        self.forward_into(input, &mut a, &mut b);
        a
    }
}

impl TryFrom<Vec<DenseLayer>> for DenseNetwork {
    type Error = ConfigurationError;

    fn try_from(layers: Vec<DenseLayer>) -> Result<Self, Self::Error> {
        Self::new(layers, "dense")
    }
}

impl From<DenseNetwork> for Vec<DenseLayer> {
    fn from(net: DenseNetwork) -> Self {
        net.layers
    }
}

#[derive(Deserialize)]
struct SurrogateFile {
    layers: Vec<DenseLayer>,
}

/// Surrogate regression model: 6 normalized features in, `[strain, stress, damage]` out.
#[derive(Debug, Clone)]
pub struct DenseSurrogate {
    network: DenseNetwork,
}

impl DenseSurrogate {
    const MODEL: &'static str = "surrogate";

    pub fn new(network: DenseNetwork) -> Result<Self, ConfigurationError> {
        if network.input_dim() != FEATURE_COUNT {
            return Err(model_error(
                Self::MODEL,
                format!("expects {} inputs, network takes {}", FEATURE_COUNT, network.input_dim()),
            ));
        }
        if network.output_dim() != 3 {
            return Err(model_error(
                Self::MODEL,
                format!("expects 3 outputs, network produces {}", network.output_dim()),
            ));
        }
        Ok(Self { network })
    }

    /// Loads `{"layers": [...]}` from a JSON file.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigurationError> {
        let file: SurrogateFile = read_model_file(path.as_ref(), Self::MODEL)?;
        Self::new(DenseNetwork::new(file.layers, Self::MODEL)?)
    }
}

impl SurrogateModel for DenseSurrogate {
    fn predict(&self, batch: &FeatureBatch) -> Result<Vec<SurrogateOutput>, CollaboratorError> {
        let (mut a, mut b) = (Vec::with_capacity(128), Vec::with_capacity(128));
        let mut out = Vec::with_capacity(batch.len());
        for row in batch {
            self.network.forward_into(row, &mut a, &mut b);
            out.push([a[0], a[1], a[2]]);
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn layer(weights: Vec<Vec<f64>>, bias: Vec<f64>, activation: Activation) -> DenseLayer {
        DenseLayer {
            weights,
            bias,
            activation,
        }
    }

    #[test]
    fn forward_applies_weights_bias_and_activation() {
        let net = DenseNetwork::new(
            vec![
                layer(vec![vec![1.0, -1.0], vec![2.0, 0.5]], vec![0.0, 1.0], Activation::Relu),
                layer(vec![vec![1.0], vec![1.0]], vec![0.5], Activation::Linear),
            ],
            "test",
        )
        .unwrap();
        // hidden = relu([1 + 4, -1 + 1 + 1]) = [5, 1]; out = 5 + 1 + 0.5
        let out = net.forward(&[1.0, 2.0]);
        assert_eq!(out.len(), 1);
        assert!((out[0] - 6.5).abs() < 1e-12);
    }

    #[test]
    fn mismatched_chain_is_rejected() {
        let err = DenseNetwork::new(
            vec![
                layer(vec![vec![1.0, 1.0]], vec![0.0, 0.0], Activation::Tanh),
                layer(vec![vec![1.0]; 3], vec![0.0], Activation::Linear),
            ],
            "test",
        )
        .unwrap_err();
        assert!(matches!(err, ConfigurationError::ModelLoad { .. }));
    }

    #[test]
    fn surrogate_requires_six_in_three_out() {
        let net = DenseNetwork::new(vec![layer(vec![vec![0.0; 3]; 5], vec![0.0; 3], Activation::Linear)], "test").unwrap();
        assert!(DenseSurrogate::new(net).is_err());

        let net = DenseNetwork::new(vec![layer(vec![vec![0.0; 2]; 6], vec![0.0; 2], Activation::Linear)], "test").unwrap();
        assert!(DenseSurrogate::new(net).is_err());
    }

    #[test]
    fn surrogate_predicts_every_row_in_order() {
        // stress column = sum of x and y features
        let mut weights = vec![vec![0.0; 3]; 6];
        weights[0][1] = 1.0;
        weights[1][1] = 1.0;
        let net = DenseNetwork::new(vec![layer(weights, vec![0.0, 10.0, 0.0], Activation::Linear)], "test").unwrap();
        let surrogate = DenseSurrogate::new(net).unwrap();

        let batch = vec![[1.0, 2.0, 0.0, 0.0, 0.0, 0.0], [-3.0, 0.5, 9.0, 9.0, 9.0, 9.0]];
        let out = surrogate.predict(&batch).unwrap();
        assert_eq!(out.len(), 2);
        assert!((out[0][1] - 13.0).abs() < 1e-12);
        assert!((out[1][1] - 7.5).abs() < 1e-12);
    }

    #[test]
    fn activations() {
        assert_eq!(Activation::Relu.apply(-2.0), 0.0);
        assert!((Activation::Sigmoid.apply(0.0) - 0.5).abs() < 1e-12);
        assert!((Activation::Tanh.apply(0.0)).abs() < 1e-12);
        assert_eq!(Activation::Linear.apply(-2.0), -2.0);
    }
}
