//! Training-loop orchestration.
//!
//! Two loops drive one or more agents against the environment
//! collaborator: [`QLearningLoop`] for tabular agents and
//! [`DeepQLearningLoop`] for deep agents. Both run strictly sequential
//! episode/step iterations, freeze agents whose episodes have ended while
//! peers continue, abandon episodes on environment failures, and
//! checkpoint on a fixed interval or on moving-average improvement.

use crate::agent::Agent;
use crate::env::{AgentId, Environment};
use crate::error::{Result, TalosError};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};

mod deep;
mod qlearning;

pub use deep::DeepQLearningLoop;
pub use qlearning::QLearningLoop;

/// Run-level configuration shared by both loops.
///
/// Learning cadences (update and target-sync intervals, batch size) are
/// agent state, not loop state; they travel with the agent's checkpoint.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainerConfig {
    /// Number of training episodes.
    pub episodes: usize,
    /// Step cap per episode.
    pub episode_max_steps: usize,
    /// Random-policy transitions to collect before deep training starts.
    /// Ignored by the tabular loop.
    pub replay_warmup: usize,
    /// Save checkpoints every this many episodes; 0 disables periodic
    /// checkpoints.
    pub checkpoint_interval: usize,
    /// Where checkpoints go. None disables checkpointing entirely.
    pub checkpoint_dir: Option<PathBuf>,
    /// Window for the moving-average reward.
    pub moving_avg_window: usize,
    /// Stop once every agent's windowed average reaches this value.
    pub moving_avg_stop_threshold: Option<f32>,
    /// Abort the run after this many consecutive abandoned episodes.
    pub max_consecutive_env_failures: usize,
    /// World configuration handed to `Environment::init` before the first
    /// reset.
    pub world_config: Option<String>,
    /// Seed forwarded to the first reset of the run.
    pub seed: Option<u64>,
}

impl Default for TrainerConfig {
    fn default() -> Self {
        TrainerConfig {
            episodes: 1000,
            episode_max_steps: 200,
            replay_warmup: 1000,
            checkpoint_interval: 0,
            checkpoint_dir: None,
            moving_avg_window: 20,
            moving_avg_stop_threshold: None,
            max_consecutive_env_failures: 3,
            world_config: None,
            seed: None,
        }
    }
}

impl TrainerConfig {
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        let config: TrainerConfig =
            serde_json::from_str(&text).map_err(|e| TalosError::Serialization(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.episodes == 0 {
            return Err(TalosError::invalid_parameter(
                "episodes",
                "must be at least 1",
            ));
        }
        if self.episode_max_steps == 0 {
            return Err(TalosError::invalid_parameter(
                "episode_max_steps",
                "must be at least 1",
            ));
        }
        if self.moving_avg_window == 0 {
            return Err(TalosError::invalid_parameter(
                "moving_avg_window",
                "must be at least 1",
            ));
        }
        if self.max_consecutive_env_failures == 0 {
            return Err(TalosError::invalid_parameter(
                "max_consecutive_env_failures",
                "must be at least 1",
            ));
        }
        Ok(())
    }
}

/// What a finished (or early-stopped) training run produced.
#[derive(Clone, Debug, Default)]
pub struct TrainingReport {
    pub rewards_per_agent: HashMap<AgentId, Vec<f32>>,
    pub episode_lengths: Vec<usize>,
    pub global_steps: u64,
    pub abandoned_episodes: usize,
    pub stopped_early: bool,
}

/// Averages over a greedy evaluation run.
#[derive(Clone, Debug)]
pub struct EvalReport {
    pub avg_rewards: HashMap<AgentId, f32>,
    pub avg_steps: f32,
    pub episodes: usize,
}

/// Outcome of a single training episode. A failure means the episode was
/// abandoned mid-flight by an environment error; the partial rewards and
/// step count are still reported for logging.
pub(crate) struct EpisodeStats {
    pub rewards: HashMap<AgentId, f32>,
    pub steps: usize,
    pub failure: Option<TalosError>,
}

impl EpisodeStats {
    pub(crate) fn new<A: Agent>(agents: &[A]) -> Self {
        // One independently allocated counter per agent.
        let rewards = agents.iter().map(|a| (a.id().clone(), 0.0)).collect();
        EpisodeStats {
            rewards,
            steps: 0,
            failure: None,
        }
    }
}

/// A run needs at least one agent, each with a distinct identifier; both
/// are checked before any environment interaction.
pub(crate) fn validate_agents<A: Agent>(agents: &[A]) -> Result<()> {
    if agents.is_empty() {
        return Err(TalosError::invalid_parameter(
            "agents",
            "training requires at least one agent",
        ));
    }
    let mut seen = HashSet::new();
    for agent in agents {
        if !seen.insert(agent.id().clone()) {
            return Err(TalosError::invalid_parameter(
                "agents",
                "agent identifiers must be distinct",
            ));
        }
    }
    Ok(())
}

pub(crate) fn agent_checkpoint_path(dir: &Path, id: &str) -> PathBuf {
    dir.join(format!("{}.agent", id))
}

/// Greedy rollout shared by both loops' `evaluate`: exploration off, no
/// learning, no schedule decay.
pub(crate) fn run_greedy_episodes<E, A>(
    env: &mut E,
    agents: &mut [A],
    episodes: usize,
    max_steps: usize,
) -> Result<EvalReport>
where
    E: Environment,
    A: Agent<Obs = E::Obs>,
{
    if episodes == 0 {
        return Err(TalosError::invalid_parameter(
            "episodes",
            "evaluation needs at least 1 episode",
        ));
    }
    let mut total_rewards: HashMap<AgentId, f32> =
        agents.iter().map(|a| (a.id().clone(), 0.0)).collect();
    let mut total_steps = 0usize;

    for _ in 0..episodes {
        let reset = env.reset(None)?;
        let mut obs = reset.observations;
        for agent in agents.iter_mut() {
            agent.begin_episode();
        }
        let mut steps = 0usize;
        while agents.iter().any(|a| !a.is_terminated()) && steps < max_steps {
            let mut actions = HashMap::new();
            for agent in agents.iter_mut() {
                if agent.is_terminated() {
                    continue;
                }
                if let Some(o) = obs.get(agent.id()) {
                    let action = agent.choose_action(o, false);
                    actions.insert(agent.id().clone(), action);
                }
            }
            if actions.is_empty() {
                break;
            }
            let outcome = env.step(&actions)?;
            steps += 1;
            for agent in agents.iter_mut() {
                let id = agent.id().clone();
                if !actions.contains_key(&id) {
                    continue;
                }
                if let Some(reward) = outcome.rewards.get(&id) {
                    if let Some(total) = total_rewards.get_mut(&id) {
                        *total += reward;
                    }
                }
                if outcome.is_done(&id) {
                    agent.set_terminated(true);
                }
            }
            obs = outcome.observations;
        }
        total_steps += steps;
    }

    Ok(EvalReport {
        avg_rewards: total_rewards
            .into_iter()
            .map(|(id, total)| (id, total / episodes as f32))
            .collect(),
        avg_steps: total_steps as f32 / episodes as f32,
        episodes,
    })
}
