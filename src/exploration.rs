//! Exploration-rate scheduling for epsilon-greedy action selection.

use crate::error::{Result, TalosError};
use serde::{Deserialize, Serialize};

/// Decay mode of an [`EpsilonSchedule`].
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub enum Decay {
    /// Subtract a fixed amount once per environment step.
    Linear { step: f32 },
    /// Exponential approach toward the minimum, advanced once per episode.
    Exponential { rate: f32 },
}

/// Monotonically non-increasing exploration probability.
///
/// Epsilon starts at `epsilon_max`, is advanced either per step (linear
/// mode) or per episode (exponential mode), and is always clamped into
/// `[epsilon_min, epsilon_max]`. The schedule is serialized whole into
/// checkpoints and is never reset except by a checkpoint load.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EpsilonSchedule {
    epsilon: f32,
    epsilon_max: f32,
    epsilon_min: f32,
    decay: Decay,
}

impl EpsilonSchedule {
    /// Linear schedule: `epsilon -= step` on every environment step.
    pub fn linear(epsilon_max: f32, epsilon_min: f32, step: f32) -> Result<Self> {
        validate_bounds(epsilon_max, epsilon_min)?;
        if step < 0.0 {
            return Err(TalosError::invalid_parameter(
                "decay_step",
                "must be non-negative",
            ));
        }
        Ok(EpsilonSchedule {
            epsilon: epsilon_max,
            epsilon_max,
            epsilon_min,
            decay: Decay::Linear { step },
        })
    }

    /// Exponential schedule over a planned number of episodes.
    ///
    /// The rate is derived once as `-ln(epsilon_min) / episodes`, so epsilon
    /// approaches `epsilon_min` asymptotically by the last episode.
    pub fn exponential(epsilon_max: f32, epsilon_min: f32, episodes: usize) -> Result<Self> {
        validate_bounds(epsilon_max, epsilon_min)?;
        if epsilon_min <= 0.0 {
            return Err(TalosError::invalid_parameter(
                "epsilon_min",
                "must be positive for exponential decay",
            ));
        }
        if episodes == 0 {
            return Err(TalosError::invalid_parameter(
                "episodes",
                "must be at least 1",
            ));
        }
        let rate = -epsilon_min.ln() / episodes as f32;
        Ok(EpsilonSchedule {
            epsilon: epsilon_max,
            epsilon_max,
            epsilon_min,
            decay: Decay::Exponential { rate },
        })
    }

    /// Current exploration probability.
    pub fn probability(&self) -> f32 {
        self.epsilon
    }

    pub fn epsilon_min(&self) -> f32 {
        self.epsilon_min
    }

    pub fn epsilon_max(&self) -> f32 {
        self.epsilon_max
    }

    pub fn decay(&self) -> Decay {
        self.decay
    }

    /// Advance the schedule by one environment step. No-op in exponential
    /// mode, which decays per episode instead.
    pub fn advance_step(&mut self) {
        if let Decay::Linear { step } = self.decay {
            self.epsilon = self.clamp(self.epsilon - step);
        }
    }

    /// Advance the schedule at the end of the given episode (0-based).
    /// No-op in linear mode, which decays per step instead.
    pub fn advance_episode(&mut self, episode: usize) {
        if let Decay::Exponential { rate } = self.decay {
            let span = self.epsilon_max - self.epsilon_min;
            let next = self.epsilon_min + span * (-rate * episode as f32).exp();
            // Epsilon never rises, whatever episode index the caller passes.
            self.epsilon = self.clamp(next.min(self.epsilon));
        }
    }

    fn clamp(&self, value: f32) -> f32 {
        value.max(self.epsilon_min).min(self.epsilon_max)
    }
}

fn validate_bounds(epsilon_max: f32, epsilon_min: f32) -> Result<()> {
    if !(0.0..=1.0).contains(&epsilon_min)
        || !(0.0..=1.0).contains(&epsilon_max)
        || epsilon_min > epsilon_max
    {
        return Err(TalosError::invalid_parameter(
            "epsilon",
            "bounds must satisfy 0 <= epsilon_min <= epsilon_max <= 1",
        ));
    }
    Ok(())
}
