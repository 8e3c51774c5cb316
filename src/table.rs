//! Dense tabular action-value estimator for discretized observations.

use crate::error::{Result, TalosError};
use ndarray::Array2;
use serde::{Deserialize, Serialize};

/// Action-value table over `(state, action)` pairs.
///
/// States and actions are indices into a dense `(S, A)` array fixed at
/// construction from the environment's discrete cardinalities. All entries
/// start at zero; values are unbounded reals.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct QTable {
    values: Array2<f32>,
    alpha: f32,
    gamma: f32,
}

impl QTable {
    pub fn new(num_states: usize, num_actions: usize, alpha: f32, gamma: f32) -> Result<Self> {
        if num_states == 0 || num_actions == 0 {
            return Err(TalosError::invalid_parameter(
                "table",
                "state and action cardinalities must be non-zero",
            ));
        }
        if !(0.0..=1.0).contains(&alpha) || alpha == 0.0 {
            return Err(TalosError::invalid_parameter(
                "alpha",
                "learning rate must be in (0, 1]",
            ));
        }
        if !(0.0..=1.0).contains(&gamma) {
            return Err(TalosError::invalid_parameter(
                "gamma",
                "discount factor must be in [0, 1]",
            ));
        }
        Ok(QTable {
            values: Array2::zeros((num_states, num_actions)),
            alpha,
            gamma,
        })
    }

    pub fn num_states(&self) -> usize {
        self.values.nrows()
    }

    pub fn num_actions(&self) -> usize {
        self.values.ncols()
    }

    pub fn alpha(&self) -> f32 {
        self.alpha
    }

    pub fn gamma(&self) -> f32 {
        self.gamma
    }

    pub fn value(&self, state: usize, action: usize) -> f32 {
        self.values[[state, action]]
    }

    pub fn values(&self) -> &Array2<f32> {
        &self.values
    }

    /// Whether the table has never been written; used to refuse greedy
    /// evaluation of an agent that was never trained.
    pub fn is_untrained(&self) -> bool {
        self.values.iter().all(|v| *v == 0.0)
    }

    /// Greedy action for a state. Ties break toward the lowest action
    /// index, so repeated calls are deterministic.
    pub fn best_action(&self, state: usize) -> usize {
        let row = self.values.row(state);
        let mut best = 0;
        for (action, &value) in row.iter().enumerate() {
            if value > row[best] {
                best = action;
            }
        }
        best
    }

    /// One-step Q-learning update; writes exactly one cell and returns the
    /// new value.
    ///
    /// `q <- (1 - alpha) * q + alpha * (r + gamma * max_a Q[s', a])`, with
    /// the bootstrap term dropped entirely on terminal transitions.
    pub fn update(
        &mut self,
        state: usize,
        action: usize,
        reward: f32,
        next_state: usize,
        done: bool,
    ) -> f32 {
        let best_next = self
            .values
            .row(next_state)
            .iter()
            .fold(f32::NEG_INFINITY, |m, &v| m.max(v));
        let target = if done {
            reward
        } else {
            reward + self.gamma * best_next
        };
        let updated = (1.0 - self.alpha) * self.values[[state, action]] + self.alpha * target;
        self.values[[state, action]] = updated;
        updated
    }
}
