use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};

/// Per-layer parameter update rule.
///
/// `layer_index` identifies the layer within the network so that stateful
/// optimizers can keep separate moment estimates per layer. Implementations
/// may assume layers are visited in order, starting at index 0, once per
/// training step.
pub trait Optimizer {
    fn step(
        &mut self,
        layer_index: usize,
        weights: &mut Array2<f32>,
        biases: &mut Array1<f32>,
        weight_grads: &Array2<f32>,
        bias_grads: &Array1<f32>,
        learning_rate: f32,
    );
}

/// Enum dispatch over the supported optimizers, so networks can be
/// serialized without trait objects.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub enum OptimizerWrapper {
    SGD(SGD),
    Adam(Adam),
}

impl Optimizer for OptimizerWrapper {
    fn step(
        &mut self,
        layer_index: usize,
        weights: &mut Array2<f32>,
        biases: &mut Array1<f32>,
        weight_grads: &Array2<f32>,
        bias_grads: &Array1<f32>,
        learning_rate: f32,
    ) {
        match self {
            OptimizerWrapper::SGD(optimizer) => optimizer.step(
                layer_index,
                weights,
                biases,
                weight_grads,
                bias_grads,
                learning_rate,
            ),
            OptimizerWrapper::Adam(optimizer) => optimizer.step(
                layer_index,
                weights,
                biases,
                weight_grads,
                bias_grads,
                learning_rate,
            ),
        }
    }
}

/// Plain stochastic gradient descent.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct SGD;

impl SGD {
    pub fn new() -> SGD {
        SGD
    }
}

impl Optimizer for SGD {
    fn step(
        &mut self,
        _layer_index: usize,
        weights: &mut Array2<f32>,
        biases: &mut Array1<f32>,
        weight_grads: &Array2<f32>,
        bias_grads: &Array1<f32>,
        learning_rate: f32,
    ) {
        weights.zip_mut_with(weight_grads, |w, &g| *w -= learning_rate * g);
        biases.zip_mut_with(bias_grads, |b, &g| *b -= learning_rate * g);
    }
}

/// Adam with bias-corrected first and second moments.
///
/// Moment buffers are allocated lazily per layer from the gradient shapes,
/// so the optimizer can be constructed before the network it will drive.
/// The shared timestep advances when layer 0 is visited.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Adam {
    pub beta1: f32,
    pub beta2: f32,
    pub epsilon: f32,
    t: i32,
    m_weights: Vec<Array2<f32>>,
    v_weights: Vec<Array2<f32>>,
    m_biases: Vec<Array1<f32>>,
    v_biases: Vec<Array1<f32>>,
}

impl Adam {
    pub fn new(beta1: f32, beta2: f32, epsilon: f32) -> Self {
        Adam {
            beta1,
            beta2,
            epsilon,
            t: 0,
            m_weights: Vec::new(),
            v_weights: Vec::new(),
            m_biases: Vec::new(),
            v_biases: Vec::new(),
        }
    }
}

impl Default for Adam {
    fn default() -> Self {
        Adam::new(0.9, 0.999, 1e-8)
    }
}

impl Optimizer for Adam {
    fn step(
        &mut self,
        layer_index: usize,
        weights: &mut Array2<f32>,
        biases: &mut Array1<f32>,
        weight_grads: &Array2<f32>,
        bias_grads: &Array1<f32>,
        learning_rate: f32,
    ) {
        while self.m_weights.len() <= layer_index {
            self.m_weights.push(Array2::zeros(weight_grads.raw_dim()));
            self.v_weights.push(Array2::zeros(weight_grads.raw_dim()));
            self.m_biases.push(Array1::zeros(bias_grads.raw_dim()));
            self.v_biases.push(Array1::zeros(bias_grads.raw_dim()));
        }
        if layer_index == 0 {
            self.t += 1;
        }
        let t = self.t.max(1);
        let beta1 = self.beta1;
        let beta2 = self.beta2;
        let epsilon = self.epsilon;
        let m_correction = 1.0 - beta1.powi(t);
        let v_correction = 1.0 - beta2.powi(t);

        let m = &mut self.m_weights[layer_index];
        let v = &mut self.v_weights[layer_index];
        m.zip_mut_with(weight_grads, |m, &g| *m = beta1 * *m + (1.0 - beta1) * g);
        v.zip_mut_with(weight_grads, |v, &g| *v = beta2 * *v + (1.0 - beta2) * g * g);
        let m_hat = m.mapv(|x| x / m_correction);
        let v_hat = v.mapv(|x| x / v_correction);
        *weights -= &(m_hat / (v_hat.mapv(f32::sqrt) + epsilon) * learning_rate);

        let m = &mut self.m_biases[layer_index];
        let v = &mut self.v_biases[layer_index];
        m.zip_mut_with(bias_grads, |m, &g| *m = beta1 * *m + (1.0 - beta1) * g);
        v.zip_mut_with(bias_grads, |v, &g| *v = beta2 * *v + (1.0 - beta2) * g * g);
        let m_hat = m.mapv(|x| x / m_correction);
        let v_hat = v.mapv(|x| x / v_correction);
        *biases -= &(m_hat / (v_hat.mapv(f32::sqrt) + epsilon) * learning_rate);
    }
}
