//! Experience replay: a bounded transition store plus the n-step staging
//! buffer that folds raw environment steps into stored entries.

use crate::error::{Result, TalosError};
use ndarray::Array1;
use rand::rngs::StdRng;
use rand::Rng;
use std::collections::VecDeque;

/// A stored transition, already folded over `k <= n` consecutive steps.
///
/// `ret` is the discounted reward sum over the folded steps and `discount`
/// is `gamma^k`, the factor to apply to the bootstrap term. With `n = 1`
/// this is exactly a single-step transition with `discount = gamma`.
/// Entries are immutable once stored.
#[derive(Clone, Debug, PartialEq)]
pub struct Transition {
    pub state: Array1<f32>,
    pub action: usize,
    pub ret: f32,
    pub next_state: Array1<f32>,
    pub done: bool,
    pub discount: f32,
}

/// Fixed-capacity ring of transitions with uniform sampling.
///
/// Insertion beyond capacity evicts the oldest entry. Sampling draws
/// indices independently and uniformly **with replacement**, so a batch
/// may contain duplicates; that is expected early in training when the
/// store holds fewer distinct entries than the batch size.
#[derive(Clone, Debug)]
pub struct ReplayBuffer {
    buffer: VecDeque<Transition>,
    capacity: usize,
    rng: StdRng,
}

impl ReplayBuffer {
    pub const DEFAULT_CAPACITY: usize = 100_000;

    pub fn new(capacity: usize, rng: StdRng) -> Result<Self> {
        if capacity == 0 {
            return Err(TalosError::invalid_parameter(
                "capacity",
                "replay capacity must be at least 1",
            ));
        }
        Ok(ReplayBuffer {
            buffer: VecDeque::with_capacity(capacity),
            capacity,
            rng,
        })
    }

    pub fn push(&mut self, transition: Transition) {
        if self.buffer.len() == self.capacity {
            self.buffer.pop_front();
        }
        self.buffer.push_back(transition);
    }

    /// Draw `batch_size` transitions uniformly with replacement. Fails only
    /// when the store is empty.
    pub fn sample(&mut self, batch_size: usize) -> Result<Vec<&Transition>> {
        if self.buffer.is_empty() {
            return Err(TalosError::EmptyBuffer(
                "cannot sample from an empty replay buffer".to_string(),
            ));
        }
        let len = self.buffer.len();
        let indices: Vec<usize> = (0..batch_size)
            .map(|_| self.rng.gen_range(0..len))
            .collect();
        Ok(indices.into_iter().map(|i| &self.buffer[i]).collect())
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

/// One raw environment step awaiting folding.
#[derive(Clone, Debug)]
struct StagedStep {
    state: Array1<f32>,
    action: usize,
    reward: f32,
    next_state: Array1<f32>,
    done: bool,
}

/// Staging buffer that folds the most recent unfolded steps into n-step
/// transitions.
///
/// A fold happens when the stage reaches length `n`, or on episode end
/// regardless of length. A terminal fold clears the stage entirely; a
/// full-window fold drops only the oldest step, so the stage slides one
/// step per emission afterwards.
#[derive(Clone, Debug)]
pub struct NStepAccumulator {
    staged: VecDeque<StagedStep>,
    n: usize,
    gamma: f32,
}

impl NStepAccumulator {
    pub fn new(n: usize, gamma: f32) -> Result<Self> {
        if n == 0 {
            return Err(TalosError::invalid_parameter(
                "n_step",
                "must be at least 1",
            ));
        }
        if !(0.0..=1.0).contains(&gamma) {
            return Err(TalosError::invalid_parameter(
                "gamma",
                "discount factor must be in [0, 1]",
            ));
        }
        Ok(NStepAccumulator {
            staged: VecDeque::with_capacity(n),
            n,
            gamma,
        })
    }

    pub fn n(&self) -> usize {
        self.n
    }

    pub fn staged_len(&self) -> usize {
        self.staged.len()
    }

    /// Stage one raw step, returning a folded transition when one is due.
    pub fn push(
        &mut self,
        state: Array1<f32>,
        action: usize,
        reward: f32,
        next_state: Array1<f32>,
        done: bool,
    ) -> Option<Transition> {
        self.staged.push_back(StagedStep {
            state,
            action,
            reward,
            next_state,
            done,
        });
        if done {
            let folded = self.fold();
            self.staged.clear();
            Some(folded)
        } else if self.staged.len() == self.n {
            let folded = self.fold();
            self.staged.pop_front();
            Some(folded)
        } else {
            None
        }
    }

    /// Drop all staged steps. Called at episode boundaries so a stale
    /// partial window never folds across episodes.
    pub fn reset(&mut self) {
        self.staged.clear();
    }

    fn fold(&self) -> Transition {
        let k = self.staged.len();
        let mut ret = 0.0;
        let mut weight = 1.0;
        for step in &self.staged {
            ret += weight * step.reward;
            weight *= self.gamma;
        }
        let first = self.staged.front().expect("fold on empty stage");
        let last = self.staged.back().expect("fold on empty stage");
        Transition {
            state: first.state.clone(),
            action: first.action,
            ret,
            next_state: last.next_state.clone(),
            done: last.done,
            discount: self.gamma.powi(k as i32),
        }
    }
}
