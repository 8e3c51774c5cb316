use crate::agent::{greedy_action, Agent};
use crate::env::{ActionSpace, AgentId, Environment};
use crate::error::{Result, TalosError};
use crate::exploration::EpsilonSchedule;
use crate::network::QNetwork;
use crate::optimizer::{Adam, OptimizerWrapper};
use crate::replay::{NStepAccumulator, ReplayBuffer};
use crate::sync::TargetSync;
use ndarray::{Array1, Array2};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::Path;

/// Deep Q-learning agent with experience replay, n-step returns and a
/// periodically synchronized target network.
///
/// The online network is the only one fitted; the target network changes
/// only when [`sync_target`](DeepAgent::sync_target) takes a full
/// parameter snapshot, so bootstrapped targets stay put between syncs.
pub struct DeepAgent {
    id: AgentId,
    online: QNetwork,
    target: QNetwork,
    replay: ReplayBuffer,
    accumulator: NStepAccumulator,
    schedule: EpsilonSchedule,
    action_space: ActionSpace,
    gamma: f32,
    batch_size: usize,
    learning_rate: f32,
    update_interval: usize,
    target_sync: TargetSync,
    terminated: bool,
    rng: StdRng,
}

/// Full agent state persisted as one atomic unit: both parameter sets and
/// every scalar hyperparameter. Runtime-only structures (replay contents,
/// staging buffer, rng) are rebuilt on load.
#[derive(Serialize, Deserialize)]
struct DeepCheckpoint {
    id: AgentId,
    online: QNetwork,
    target: QNetwork,
    schedule: EpsilonSchedule,
    action_space: ActionSpace,
    gamma: f32,
    batch_size: usize,
    learning_rate: f32,
    update_interval: usize,
    target_sync_interval: usize,
    n_step: usize,
    replay_capacity: usize,
}

impl DeepAgent {
    pub fn builder() -> DeepAgentBuilder {
        DeepAgentBuilder::new()
    }

    pub fn online(&self) -> &QNetwork {
        &self.online
    }

    pub fn target(&self) -> &QNetwork {
        &self.target
    }

    pub fn action_space(&self) -> ActionSpace {
        self.action_space
    }

    pub fn schedule(&self) -> &EpsilonSchedule {
        &self.schedule
    }

    pub fn gamma(&self) -> f32 {
        self.gamma
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    pub fn learning_rate(&self) -> f32 {
        self.learning_rate
    }

    /// Environment steps between learning updates.
    pub fn update_interval(&self) -> usize {
        self.update_interval
    }

    /// Environment steps between target synchronizations.
    pub fn target_sync_interval(&self) -> usize {
        self.target_sync.interval()
    }

    pub fn n_step(&self) -> usize {
        self.accumulator.n()
    }

    pub fn replay_len(&self) -> usize {
        self.replay.len()
    }

    /// Action values from the online network.
    pub fn q_values(&self, obs: &Array1<f32>) -> Array1<f32> {
        self.online.predict(obs.view())
    }

    /// Overwrite the target network with a snapshot of the online one.
    pub fn sync_target(&mut self) -> Result<()> {
        let sync = self.target_sync;
        sync.apply(&self.online, &mut self.target)
    }

    /// Synchronize if the copy policy says one is due at this global step.
    pub fn maybe_sync(&mut self, global_step: u64) -> Result<bool> {
        if !self.target_sync.due(global_step) {
            return Ok(false);
        }
        self.sync_target()?;
        Ok(true)
    }

    /// One learning step: sample a minibatch, build bootstrapped targets
    /// and fit the online network. Returns the minibatch loss, or `None`
    /// while the store holds fewer than `batch_size` transitions.
    pub fn train_step(&mut self) -> Result<Option<f32>> {
        let batch_size = self.batch_size;
        if self.replay.len() < batch_size {
            return Ok(None);
        }

        let state_dim = self.online.input_size();
        let mut states = Array2::zeros((batch_size, state_dim));
        let mut next_states = Array2::zeros((batch_size, state_dim));
        let mut actions = Vec::with_capacity(batch_size);
        let mut returns = Vec::with_capacity(batch_size);
        let mut dones = Vec::with_capacity(batch_size);
        let mut discounts = Vec::with_capacity(batch_size);
        {
            let batch = self.replay.sample(batch_size)?;
            for (i, transition) in batch.iter().enumerate() {
                states.row_mut(i).assign(&transition.state);
                next_states.row_mut(i).assign(&transition.next_state);
                actions.push(transition.action);
                returns.push(transition.ret);
                dones.push(transition.done);
                discounts.push(transition.discount);
            }
        }

        let next_q = self.target.predict_batch(next_states.view());
        // Start from the online predictions so every component other than
        // the taken action regresses onto itself and carries zero signal.
        let mut targets = self.online.predict_batch(states.view());
        for i in 0..batch_size {
            let max_next = next_q.row(i).iter().fold(f32::NEG_INFINITY, |m, &v| m.max(v));
            // The bootstrap term is always evaluated and gated by (1 - done),
            // so terminal transitions contribute exactly the folded return.
            let gate = if dones[i] { 0.0 } else { 1.0 };
            targets[[i, actions[i]]] = returns[i] + gate * discounts[i] * max_next;
        }

        self.online
            .fit_batch(states.view(), targets.view(), self.learning_rate);

        let predictions = self.online.predict_batch(states.view());
        let loss = (&predictions - &targets)
            .mapv(|x| x * x)
            .mean()
            .unwrap_or(f32::INFINITY);
        Ok(Some(loss))
    }

    /// Fill the replay buffer with random-policy transitions before
    /// training starts, episode by episode.
    pub fn warmup<E>(
        &mut self,
        env: &mut E,
        min_transitions: usize,
        episode_max_steps: usize,
    ) -> Result<()>
    where
        E: Environment<Obs = Array1<f32>>,
    {
        if min_transitions == 0 {
            return Ok(());
        }
        if min_transitions > self.replay.capacity() {
            return Err(TalosError::invalid_parameter(
                "replay_warmup",
                "cannot exceed the replay capacity",
            ));
        }
        while self.replay.len() < min_transitions {
            let reset = env.reset(None)?;
            let mut obs = reset
                .observations
                .get(&self.id)
                .cloned()
                .ok_or_else(|| {
                    TalosError::Environment(format!("reset returned no observation for {}", self.id))
                })?;
            self.accumulator.reset();
            let mut done = false;
            let mut steps = 0;
            while steps < episode_max_steps && !done && self.replay.len() < min_transitions {
                let action = self.action_space.sample(&mut self.rng);
                let mut actions = HashMap::new();
                actions.insert(self.id.clone(), action);
                let outcome = env.step(&actions)?;
                let next_obs = match outcome.observations.get(&self.id) {
                    Some(o) => o.clone(),
                    None => break,
                };
                let reward = outcome.rewards.get(&self.id).copied().unwrap_or(0.0);
                done = outcome.is_done(&self.id);
                if let Some(transition) =
                    self.accumulator
                        .push(obs, action, reward, next_obs.clone(), done)
                {
                    self.replay.push(transition);
                }
                obs = next_obs;
                steps += 1;
            }
            self.accumulator.reset();
        }
        Ok(())
    }

    /// Serialize both parameter sets and all hyperparameters to a file.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let checkpoint = DeepCheckpoint {
            id: self.id.clone(),
            online: self.online.clone(),
            target: self.target.clone(),
            schedule: self.schedule.clone(),
            action_space: self.action_space,
            gamma: self.gamma,
            batch_size: self.batch_size,
            learning_rate: self.learning_rate,
            update_interval: self.update_interval,
            target_sync_interval: self.target_sync.interval(),
            n_step: self.accumulator.n(),
            replay_capacity: self.replay.capacity(),
        };
        let bytes = bincode::serialize(&checkpoint)?;
        fs::write(path, bytes)?;
        Ok(())
    }

    /// Restore an agent from a checkpoint, rebuilding the replay buffer,
    /// staging buffer and rng from scratch.
    pub fn load(path: impl AsRef<Path>, seed: u64) -> Result<Self> {
        let bytes = fs::read(path)?;
        let checkpoint: DeepCheckpoint = bincode::deserialize(&bytes)?;
        Ok(DeepAgent {
            id: checkpoint.id,
            online: checkpoint.online,
            target: checkpoint.target,
            replay: ReplayBuffer::new(
                checkpoint.replay_capacity,
                StdRng::seed_from_u64(seed.wrapping_add(1)),
            )?,
            accumulator: NStepAccumulator::new(checkpoint.n_step, checkpoint.gamma)?,
            schedule: checkpoint.schedule,
            action_space: checkpoint.action_space,
            gamma: checkpoint.gamma,
            batch_size: checkpoint.batch_size,
            learning_rate: checkpoint.learning_rate,
            update_interval: checkpoint.update_interval,
            target_sync: TargetSync::new(checkpoint.target_sync_interval)?,
            terminated: false,
            rng: StdRng::seed_from_u64(seed),
        })
    }
}

impl Agent for DeepAgent {
    type Obs = Array1<f32>;

    fn id(&self) -> &AgentId {
        &self.id
    }

    fn choose_action(&mut self, obs: &Array1<f32>, explore: bool) -> usize {
        if explore && self.rng.gen::<f32>() < self.schedule.probability() {
            return self.action_space.sample(&mut self.rng);
        }
        let values = self.online.predict(obs.view());
        greedy_action(values.view())
    }

    fn observe(
        &mut self,
        obs: &Array1<f32>,
        action: usize,
        reward: f32,
        next_obs: &Array1<f32>,
        done: bool,
    ) -> Result<()> {
        if let Some(transition) =
            self.accumulator
                .push(obs.clone(), action, reward, next_obs.clone(), done)
        {
            self.replay.push(transition);
        }
        Ok(())
    }

    fn learn(&mut self) -> Result<()> {
        self.train_step().map(|_| ())
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
        self.accumulator.reset();
    }
}

/// Builder for [`DeepAgent`]; defaults follow the usual control-policy
/// hyperparameters (two ReLU hidden layers, Adam, single-step returns).
pub struct DeepAgentBuilder {
    id: Option<AgentId>,
    input_size: Option<usize>,
    hidden_sizes: Vec<usize>,
    action_space: Option<ActionSpace>,
    schedule: Option<EpsilonSchedule>,
    optimizer: Option<OptimizerWrapper>,
    gamma: f32,
    replay_capacity: usize,
    batch_size: usize,
    learning_rate: f32,
    update_interval: usize,
    target_sync_interval: usize,
    n_step: usize,
    seed: u64,
}

impl DeepAgentBuilder {
    pub fn new() -> Self {
        DeepAgentBuilder {
            id: None,
            input_size: None,
            hidden_sizes: vec![64, 32],
            action_space: None,
            schedule: None,
            optimizer: None,
            gamma: 0.99,
            replay_capacity: ReplayBuffer::DEFAULT_CAPACITY,
            batch_size: 64,
            learning_rate: 0.001,
            update_interval: 4,
            target_sync_interval: 8,
            n_step: 1,
            seed: 0,
        }
    }

    pub fn id(mut self, id: impl Into<AgentId>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn input_size(mut self, input_size: usize) -> Self {
        self.input_size = Some(input_size);
        self
    }

    pub fn hidden_sizes(mut self, sizes: &[usize]) -> Self {
        self.hidden_sizes = sizes.to_vec();
        self
    }

    pub fn action_space(mut self, action_space: ActionSpace) -> Self {
        self.action_space = Some(action_space);
        self
    }

    pub fn schedule(mut self, schedule: EpsilonSchedule) -> Self {
        self.schedule = Some(schedule);
        self
    }

    pub fn optimizer(mut self, optimizer: OptimizerWrapper) -> Self {
        self.optimizer = Some(optimizer);
        self
    }

    pub fn gamma(mut self, gamma: f32) -> Self {
        self.gamma = gamma;
        self
    }

    pub fn replay_capacity(mut self, capacity: usize) -> Self {
        self.replay_capacity = capacity;
        self
    }

    pub fn batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    pub fn learning_rate(mut self, learning_rate: f32) -> Self {
        self.learning_rate = learning_rate;
        self
    }

    pub fn update_interval(mut self, interval: usize) -> Self {
        self.update_interval = interval;
        self
    }

    pub fn target_sync_interval(mut self, interval: usize) -> Self {
        self.target_sync_interval = interval;
        self
    }

    pub fn n_step(mut self, n_step: usize) -> Self {
        self.n_step = n_step;
        self
    }

    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn build(self) -> Result<DeepAgent> {
        let id = self
            .id
            .ok_or_else(|| TalosError::invalid_parameter("id", "agent id must be set"))?;
        let input_size = self.input_size.ok_or_else(|| {
            TalosError::invalid_parameter("input_size", "observation size must be set")
        })?;
        let action_space = self.action_space.ok_or_else(|| {
            TalosError::invalid_parameter("action_space", "action space must be set")
        })?;
        if self.batch_size == 0 {
            return Err(TalosError::invalid_parameter(
                "batch_size",
                "must be at least 1",
            ));
        }
        if self.update_interval == 0 {
            return Err(TalosError::invalid_parameter(
                "update_interval",
                "must be at least 1",
            ));
        }
        if !(0.0..=1.0).contains(&self.gamma) {
            return Err(TalosError::invalid_parameter(
                "gamma",
                "discount factor must be in [0, 1]",
            ));
        }
        let schedule = match self.schedule {
            Some(schedule) => schedule,
            None => EpsilonSchedule::linear(1.0, 0.01, 0.0002)?,
        };
        let optimizer = self
            .optimizer
            .unwrap_or(OptimizerWrapper::Adam(Adam::default()));

        let online = QNetwork::new(input_size, &self.hidden_sizes, action_space.n(), optimizer)?;
        // The target starts as an exact copy, so the first bootstrapped
        // targets already come from a consistent snapshot.
        let target = online.clone();

        Ok(DeepAgent {
            id,
            online,
            target,
            replay: ReplayBuffer::new(
                self.replay_capacity,
                StdRng::seed_from_u64(self.seed.wrapping_add(1)),
            )?,
            accumulator: NStepAccumulator::new(self.n_step, self.gamma)?,
            schedule,
            action_space,
            gamma: self.gamma,
            batch_size: self.batch_size,
            learning_rate: self.learning_rate,
            update_interval: self.update_interval,
            target_sync: TargetSync::new(self.target_sync_interval)?,
            terminated: false,
            rng: StdRng::seed_from_u64(self.seed),
        })
    }
}

impl Default for DeepAgentBuilder {
    fn default() -> Self {
        Self::new()
    }
}
