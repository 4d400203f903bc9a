use crate::util::OutDim;
use candle_core::Tensor;
use serde::{Deserialize, Serialize};

/// Activation function applied after each hidden layer.
#[derive(Debug, Deserialize, Serialize, PartialEq, Clone, Copy)]
pub enum Activation {
    /// Rectified linear unit.
    Relu,

    /// Hyperbolic tangent.
    Tanh,
}

impl Default for Activation {
    fn default() -> Self {
        Self::Relu
    }
}

impl Activation {
    pub(super) fn forward(&self, xs: &Tensor) -> candle_core::Result<Tensor> {
        match self {
            Self::Relu => xs.relu(),
            Self::Tanh => xs.tanh(),
        }
    }
}

#[derive(Debug, Deserialize, Serialize, PartialEq, Clone)]
/// Configuration of [`Mlp`](super::Mlp).
pub struct MlpConfig {
    pub(super) in_dim: usize,
    pub(super) units: Vec<usize>,
    pub(super) out_dim: usize,
    #[serde(default)]
    pub(super) activation: Activation,
    #[serde(default)]
    pub(super) out_init_std: Option<f64>,
}

impl MlpConfig {
    /// Creates configuration of MLP with ReLU hidden activations.
    ///
    /// `units` holds the sizes of the hidden layers and must not be empty.
    pub fn new(in_dim: usize, units: Vec<usize>, out_dim: usize) -> Self {
        Self {
            in_dim,
            units,
            out_dim,
            activation: Activation::Relu,
            out_init_std: None,
        }
    }

    /// Sets the activation function of hidden layers.
    pub fn activation(mut self, v: Activation) -> Self {
        self.activation = v;
        self
    }

    /// Draws the weights of the output layer from `N(0, v^2)` and sets its
    /// bias to zero.
    pub fn out_init_std(mut self, v: f64) -> Self {
        self.out_init_std = Some(v);
        self
    }
}

impl OutDim for MlpConfig {
    fn get_out_dim(&self) -> usize {
        self.out_dim
    }
}
