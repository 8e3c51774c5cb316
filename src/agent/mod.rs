//! Learning agents.
//!
//! Two concrete agents share one decision/learning contract: the
//! [`TabularAgent`] keeps a dense action-value table and updates it on
//! every transition, while the [`DeepAgent`] pairs an online and a target
//! [`QNetwork`](crate::network::QNetwork) with an experience replay buffer
//! and learns from sampled minibatches on a fixed cadence.
//!
//! Both select actions epsilon-greedily against an injected
//! [`ActionSpace`](crate::env::ActionSpace) and carry a per-episode
//! terminated flag so a multi-agent training loop can freeze an agent
//! whose episode has ended while its peers continue.

use crate::env::AgentId;
use crate::error::Result;
use ndarray::ArrayView1;

mod deep;
mod tabular;

pub use deep::{DeepAgent, DeepAgentBuilder};
pub use tabular::TabularAgent;

/// Decision/learning contract shared by both agent forms.
pub trait Agent {
    type Obs: Clone;

    /// Key into the per-agent mappings exchanged with the environment.
    fn id(&self) -> &AgentId;

    /// Epsilon-greedy action selection. With `explore` false the choice is
    /// fully deterministic given fixed parameters, whatever epsilon is.
    fn choose_action(&mut self, obs: &Self::Obs, explore: bool) -> usize;

    /// Feed one transition to the agent. Tabular agents update their table
    /// immediately and retain nothing; deep agents stage it for replay and
    /// perform no immediate update.
    fn observe(
        &mut self,
        obs: &Self::Obs,
        action: usize,
        reward: f32,
        next_obs: &Self::Obs,
        done: bool,
    ) -> Result<()>;

    /// One learning step from accumulated experience. A no-op for tabular
    /// agents, and for deep agents until enough transitions are stored.
    fn learn(&mut self) -> Result<()>;

    /// Advance the exploration schedule by one environment step.
    fn decay_step(&mut self);

    /// Advance the exploration schedule at the end of an episode.
    fn decay_episode(&mut self, episode: usize);

    /// Current exploration probability.
    fn epsilon(&self) -> f32;

    /// Whether this agent's episode has ended while peers may continue.
    fn is_terminated(&self) -> bool;

    fn set_terminated(&mut self, terminated: bool);

    /// Reset per-episode state: the terminated flag and, for deep agents,
    /// the n-step staging buffer.
    fn begin_episode(&mut self);
}

/// Index of the highest value, ties broken toward the lowest index so
/// greedy choices are reproducible.
pub(crate) fn greedy_action(values: ArrayView1<f32>) -> usize {
    let mut best = 0;
    for (action, &value) in values.iter().enumerate() {
        if value > values[best] {
            best = action;
        }
    }
    best
}
