//! Episode reward bookkeeping for the training loops.

use crate::error::{Result, TalosError};

/// Rolling reward history with a moving average over a fixed window.
///
/// Until the window fills, the moving average falls back to the most
/// recent episode reward. The best moving average seen so far is tracked
/// to drive checkpoint-on-improvement.
#[derive(Clone, Debug)]
pub struct RewardTracker {
    window: usize,
    rewards: Vec<f32>,
    best: Option<f32>,
}

impl RewardTracker {
    pub fn new(window: usize) -> Result<Self> {
        if window == 0 {
            return Err(TalosError::invalid_parameter(
                "moving_avg_window",
                "must be at least 1",
            ));
        }
        Ok(RewardTracker {
            window,
            rewards: Vec::new(),
            best: None,
        })
    }

    pub fn push(&mut self, reward: f32) {
        self.rewards.push(reward);
    }

    pub fn len(&self) -> usize {
        self.rewards.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rewards.is_empty()
    }

    pub fn window_full(&self) -> bool {
        self.rewards.len() >= self.window
    }

    pub fn moving_average(&self) -> f32 {
        if self.window_full() {
            let tail = &self.rewards[self.rewards.len() - self.window..];
            tail.iter().sum::<f32>() / self.window as f32
        } else {
            self.rewards.last().copied().unwrap_or(0.0)
        }
    }

    /// After a push, record whether the windowed average improved on the
    /// best seen so far. Always false until the window has filled once.
    pub fn record_improvement(&mut self) -> bool {
        if !self.window_full() {
            return false;
        }
        let average = self.moving_average();
        match self.best {
            Some(best) if average <= best => false,
            _ => {
                self.best = Some(average);
                true
            }
        }
    }

    pub fn best(&self) -> Option<f32> {
        self.best
    }

    pub fn rewards(&self) -> &[f32] {
        &self.rewards
    }
}
