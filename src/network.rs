//! Multilayer perceptron used as the function-approximated action-value
//! estimator.
//!
//! The learning core treats this as an opaque parametrized function: it
//! only ever calls `predict`, `fit_batch`, `parameters` and
//! `set_parameters`. Swapping in a different approximator means keeping
//! that surface. The default topology mirrors the usual control-policy
//! setup: ReLU hidden layers and a linear output, one component per
//! discrete action.

use crate::error::{Result, TalosError};
use crate::optimizer::{Optimizer, OptimizerWrapper};
use ndarray::{Array1, Array2, ArrayView1, ArrayView2, Axis};
use ndarray_rand::rand_distr::Uniform;
use ndarray_rand::RandomExt;
use serde::{Deserialize, Serialize};

/// Activation applied by a [`Layer`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Activation {
    Relu,
    Linear,
}

impl Activation {
    fn apply(&self, pre: &Array2<f32>) -> Array2<f32> {
        match self {
            Activation::Relu => pre.mapv(|v| v.max(0.0)),
            Activation::Linear => pre.clone(),
        }
    }

    fn derivative(&self, pre: &Array2<f32>) -> Array2<f32> {
        match self {
            Activation::Relu => pre.mapv(|v| if v > 0.0 { 1.0 } else { 0.0 }),
            Activation::Linear => Array2::ones(pre.raw_dim()),
        }
    }
}

/// Fully connected layer. Weights start uniform in `[-0.1, 0.1]`, biases
/// at zero.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Layer {
    pub weights: Array2<f32>,
    pub biases: Array1<f32>,
    pub activation: Activation,
}

impl Layer {
    pub fn new(input_size: usize, output_size: usize, activation: Activation) -> Self {
        Layer {
            weights: Array2::random((input_size, output_size), Uniform::new(-0.1, 0.1)),
            biases: Array1::zeros(output_size),
            activation,
        }
    }

    fn affine(&self, inputs: &Array2<f32>) -> Array2<f32> {
        inputs.dot(&self.weights) + &self.biases.clone().insert_axis(Axis(0))
    }
}

/// Feed-forward action-value network.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct QNetwork {
    layers: Vec<Layer>,
    optimizer: OptimizerWrapper,
}

impl QNetwork {
    /// Build a network with ReLU hidden layers and a linear output of one
    /// value per action.
    pub fn new(
        input_size: usize,
        hidden_sizes: &[usize],
        output_size: usize,
        optimizer: OptimizerWrapper,
    ) -> Result<Self> {
        if input_size == 0 || output_size == 0 || hidden_sizes.iter().any(|&n| n == 0) {
            return Err(TalosError::invalid_parameter(
                "layer_sizes",
                "all layer sizes must be non-zero",
            ));
        }
        let mut sizes = Vec::with_capacity(hidden_sizes.len() + 2);
        sizes.push(input_size);
        sizes.extend_from_slice(hidden_sizes);
        sizes.push(output_size);

        let last = sizes.len() - 2;
        let layers = sizes
            .windows(2)
            .enumerate()
            .map(|(i, window)| {
                let activation = if i == last {
                    Activation::Linear
                } else {
                    Activation::Relu
                };
                Layer::new(window[0], window[1], activation)
            })
            .collect();
        Ok(QNetwork { layers, optimizer })
    }

    pub fn input_size(&self) -> usize {
        self.layers[0].weights.nrows()
    }

    pub fn output_size(&self) -> usize {
        self.layers[self.layers.len() - 1].weights.ncols()
    }

    pub fn layers(&self) -> &[Layer] {
        &self.layers
    }

    /// Forward evaluation for a single observation. Pure: no interior
    /// state is touched.
    pub fn predict(&self, input: ArrayView1<f32>) -> Array1<f32> {
        let output = self.predict_batch(input.insert_axis(Axis(0)));
        output.index_axis_move(Axis(0), 0)
    }

    /// Forward evaluation for a batch of observations, one per row.
    pub fn predict_batch(&self, inputs: ArrayView2<f32>) -> Array2<f32> {
        let mut current = inputs.to_owned();
        for layer in &self.layers {
            current = layer.activation.apply(&layer.affine(&current));
        }
        current
    }

    /// One gradient step moving the network outputs toward `targets`
    /// under a mean-squared-error loss.
    pub fn fit_batch(&mut self, inputs: ArrayView2<f32>, targets: ArrayView2<f32>, learning_rate: f32) {
        // Forward pass, keeping each layer's input and pre-activation for
        // backpropagation.
        let mut layer_inputs = Vec::with_capacity(self.layers.len());
        let mut pre_activations = Vec::with_capacity(self.layers.len());
        let mut current = inputs.to_owned();
        for layer in &self.layers {
            let pre = layer.affine(&current);
            layer_inputs.push(current);
            current = layer.activation.apply(&pre);
            pre_activations.push(pre);
        }

        // Backward pass, output layer first.
        let mut gradients: Vec<(Array2<f32>, Array1<f32>)> = Vec::with_capacity(self.layers.len());
        let mut error = &current - &targets;
        for i in (0..self.layers.len()).rev() {
            let layer = &self.layers[i];
            let adjusted = &error * &layer.activation.derivative(&pre_activations[i]);
            let weight_grads = layer_inputs[i].t().dot(&adjusted);
            let bias_grads = adjusted.sum_axis(Axis(0));
            if i > 0 {
                error = adjusted.dot(&layer.weights.t());
            }
            gradients.push((weight_grads, bias_grads));
        }
        gradients.reverse();

        for (i, (layer, (weight_grads, bias_grads))) in
            self.layers.iter_mut().zip(gradients.iter()).enumerate()
        {
            self.optimizer.step(
                i,
                &mut layer.weights,
                &mut layer.biases,
                weight_grads,
                bias_grads,
                learning_rate,
            );
        }
    }

    /// Full snapshot of all layer parameters, oldest layer first.
    pub fn parameters(&self) -> Vec<(Array2<f32>, Array1<f32>)> {
        self.layers
            .iter()
            .map(|layer| (layer.weights.clone(), layer.biases.clone()))
            .collect()
    }

    /// Overwrite all layer parameters from a snapshot. Every layer shape
    /// must match the receiving network.
    pub fn set_parameters(&mut self, parameters: &[(Array2<f32>, Array1<f32>)]) -> Result<()> {
        if parameters.len() != self.layers.len() {
            return Err(TalosError::shape_mismatch(
                format!("{} layers", self.layers.len()),
                format!("{} layers", parameters.len()),
            ));
        }
        for (layer, (weights, biases)) in self.layers.iter().zip(parameters.iter()) {
            if weights.dim() != layer.weights.dim() || biases.dim() != layer.biases.dim() {
                return Err(TalosError::shape_mismatch(
                    format!("{:?}/{:?}", layer.weights.dim(), layer.biases.dim()),
                    format!("{:?}/{:?}", weights.dim(), biases.dim()),
                ));
            }
        }
        for (layer, (weights, biases)) in self.layers.iter_mut().zip(parameters.iter()) {
            layer.weights = weights.clone();
            layer.biases = biases.clone();
        }
        Ok(())
    }
}
