//! Contract with the external simulation service.
//!
//! The simulated world lives behind a remote procedure call channel and is
//! reached through a blocking client. The learning core never talks to the
//! wire directly; it sees one capability trait with `init`, `reset` and
//! `step`, all returning per-agent mappings. Any transport failure maps to
//! [`TalosError::Environment`](crate::error::TalosError) so the training
//! loop can distinguish it from configuration or training errors.

use crate::error::{Result, TalosError};
use ndarray::Array1;
use rand::rngs::StdRng;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Identifier keying the per-agent mappings exchanged with the simulation.
/// The simulation service assigns robot identifiers as opaque strings.
pub type AgentId = String;

/// Observation of a discretized environment (state index in `[0, S)`).
pub type DiscreteObs = usize;

/// Observation of a continuous environment (flat sensor vector).
pub type VectorObs = Array1<f32>;

/// Discrete action set of fixed cardinality, injected at startup together
/// with the decoder that turns indices into actuator commands.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionSpace {
    n: usize,
}

impl ActionSpace {
    pub fn new(n: usize) -> Result<Self> {
        if n == 0 {
            return Err(TalosError::invalid_parameter(
                "action_space",
                "must contain at least one action",
            ));
        }
        Ok(ActionSpace { n })
    }

    pub fn n(&self) -> usize {
        self.n
    }

    /// Draw a uniformly random action index.
    pub fn sample(&self, rng: &mut StdRng) -> usize {
        rng.gen_range(0..self.n)
    }

    pub fn contains(&self, action: usize) -> bool {
        action < self.n
    }
}

/// Joint result of a `reset` call.
#[derive(Clone, Debug)]
pub struct ResetOutcome<O> {
    pub observations: HashMap<AgentId, O>,
    pub infos: HashMap<AgentId, serde_json::Value>,
}

impl<O> Default for ResetOutcome<O> {
    fn default() -> Self {
        ResetOutcome {
            observations: HashMap::new(),
            infos: HashMap::new(),
        }
    }
}

/// Joint result of a `step` call, one entry per agent the simulation
/// reported on this tick.
#[derive(Clone, Debug)]
pub struct StepOutcome<O> {
    pub observations: HashMap<AgentId, O>,
    pub rewards: HashMap<AgentId, f32>,
    pub terminated: HashMap<AgentId, bool>,
    pub truncated: HashMap<AgentId, bool>,
    pub infos: HashMap<AgentId, serde_json::Value>,
}

impl<O> Default for StepOutcome<O> {
    fn default() -> Self {
        StepOutcome {
            observations: HashMap::new(),
            rewards: HashMap::new(),
            terminated: HashMap::new(),
            truncated: HashMap::new(),
            infos: HashMap::new(),
        }
    }
}

impl<O> StepOutcome<O> {
    /// Whether the simulation reported this agent's episode as over,
    /// either by termination or truncation.
    pub fn is_done(&self, id: &str) -> bool {
        self.terminated.get(id).copied().unwrap_or(false)
            || self.truncated.get(id).copied().unwrap_or(false)
    }
}

/// Capability interface of the simulation service.
///
/// All calls block until the service answers. `init` must be called once
/// with the world configuration before the first `reset` of a run; the
/// training loop takes care of that.
pub trait Environment {
    type Obs: Clone;

    /// (Re)configure the simulated world.
    fn init(&mut self, config: &str) -> Result<()>;

    /// Start a new episode. The seed is forwarded on the first reset of a
    /// run only, following the gymnasium convention.
    fn reset(&mut self, seed: Option<u64>) -> Result<ResetOutcome<Self::Obs>>;

    /// Advance the simulation by one tick with a joint action mapping.
    fn step(&mut self, actions: &HashMap<AgentId, usize>) -> Result<StepOutcome<Self::Obs>>;

    /// Cardinality of the discrete action set.
    fn action_space(&self) -> ActionSpace;
}
