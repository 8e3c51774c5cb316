use crate::agent::Agent;
use crate::env::{ActionSpace, AgentId};
use crate::error::{Result, TalosError};
use crate::exploration::EpsilonSchedule;
use crate::table::QTable;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Q-learning agent over discretized observations.
///
/// Each transition updates the table immediately; no history is kept.
pub struct TabularAgent {
    id: AgentId,
    table: QTable,
    schedule: EpsilonSchedule,
    action_space: ActionSpace,
    terminated: bool,
    rng: StdRng,
}

/// Everything needed to restore a tabular agent, saved as one atomic unit.
#[derive(Serialize, Deserialize)]
struct TabularCheckpoint {
    id: AgentId,
    table: QTable,
    schedule: EpsilonSchedule,
    action_space: ActionSpace,
}

impl TabularAgent {
    pub fn new(
        id: impl Into<AgentId>,
        num_states: usize,
        action_space: ActionSpace,
        alpha: f32,
        gamma: f32,
        schedule: EpsilonSchedule,
        seed: u64,
    ) -> Result<Self> {
        let table = QTable::new(num_states, action_space.n(), alpha, gamma)?;
        Ok(TabularAgent {
            id: id.into(),
            table,
            schedule,
            action_space,
            terminated: false,
            rng: StdRng::seed_from_u64(seed),
        })
    }

    pub fn table(&self) -> &QTable {
        &self.table
    }

    pub fn schedule(&self) -> &EpsilonSchedule {
        &self.schedule
    }

    pub fn action_space(&self) -> ActionSpace {
        self.action_space
    }

    /// Serialize the full table and every schedule constant to a file.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let checkpoint = TabularCheckpoint {
            id: self.id.clone(),
            table: self.table.clone(),
            schedule: self.schedule.clone(),
            action_space: self.action_space,
        };
        let bytes = bincode::serialize(&checkpoint)?;
        fs::write(path, bytes)?;
        Ok(())
    }

    /// Restore an agent from a checkpoint.
    ///
    /// The stored table shape must agree with the live environment's
    /// cardinalities; a disagreement is a fatal configuration error, never
    /// a silent truncation.
    pub fn load(
        path: impl AsRef<Path>,
        expected_states: usize,
        expected_actions: usize,
        seed: u64,
    ) -> Result<Self> {
        let bytes = fs::read(path)?;
        let checkpoint: TabularCheckpoint = bincode::deserialize(&bytes)?;
        let shape = (checkpoint.table.num_states(), checkpoint.table.num_actions());
        if shape != (expected_states, expected_actions)
            || checkpoint.action_space.n() != expected_actions
        {
            return Err(TalosError::shape_mismatch(
                format!("({}, {})", expected_states, expected_actions),
                format!("({}, {})", shape.0, shape.1),
            ));
        }
        Ok(TabularAgent {
            id: checkpoint.id,
            table: checkpoint.table,
            schedule: checkpoint.schedule,
            action_space: checkpoint.action_space,
            terminated: false,
            rng: StdRng::seed_from_u64(seed),
        })
    }
}

impl Agent for TabularAgent {
    type Obs = usize;

    fn id(&self) -> &AgentId {
        &self.id
    }

    fn choose_action(&mut self, obs: &usize, explore: bool) -> usize {
        if explore && self.rng.gen::<f32>() < self.schedule.probability() {
            return self.action_space.sample(&mut self.rng);
        }
        self.table.best_action(*obs)
    }

    fn observe(
        &mut self,
        obs: &usize,
        action: usize,
        reward: f32,
        next_obs: &usize,
        done: bool,
    ) -> Result<()> {
        self.table.update(*obs, action, reward, *next_obs, done);
        Ok(())
    }

    fn learn(&mut self) -> Result<()> {
        Ok(())
    }

    fn decay_step(&mut self) {
        self.schedule.advance_step();
    }

    fn decay_episode(&mut self, episode: usize) {
        self.schedule.advance_episode(episode);
    }

    fn epsilon(&self) -> f32 {
        self.schedule.probability()
    }

    fn is_terminated(&self) -> bool {
        self.terminated
    }

    fn set_terminated(&mut self, terminated: bool) {
        self.terminated = terminated;
    }

    fn begin_episode(&mut self) {
        self.terminated = false;
    }
}
