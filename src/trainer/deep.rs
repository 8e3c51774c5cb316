use crate::agent::{Agent, DeepAgent};
use crate::env::Environment;
use crate::error::{Result, TalosError};
use crate::metrics::RewardTracker;
use crate::trainer::{
    agent_checkpoint_path, run_greedy_episodes, validate_agents, EpisodeStats, EvalReport,
    TrainerConfig, TrainingReport,
};
use ndarray::Array1;
use std::collections::HashMap;
use std::fs;

/// Multi-agent deep Q-learning loop over a vector-observation
/// environment.
///
/// The loop decouples data collection from learning: agents store a
/// transition on every step but only sample a minibatch every
/// `update_interval` global steps, and only refresh their target networks
/// every `target_sync_interval` global steps. Both cadences are agent
/// state.
pub struct DeepQLearningLoop<E> {
    env: E,
    agents: Vec<DeepAgent>,
    config: TrainerConfig,
}

impl<E: Environment<Obs = Array1<f32>>> DeepQLearningLoop<E> {
    pub fn new(env: E, agents: Vec<DeepAgent>, config: TrainerConfig) -> Result<Self> {
        config.validate()?;
        validate_agents(&agents)?;
        Ok(DeepQLearningLoop {
            env,
            agents,
            config,
        })
    }

    pub fn agents(&self) -> &[DeepAgent] {
        &self.agents
    }

    pub fn into_parts(self) -> (E, Vec<DeepAgent>) {
        (self.env, self.agents)
    }

    pub fn train(&mut self) -> Result<TrainingReport> {
        if let Some(world) = self.config.world_config.clone() {
            self.env.init(&world)?;
        }

        // Seed every replay buffer with random-policy experience before the
        // first gradient step.
        if self.config.replay_warmup > 0 {
            for agent in &mut self.agents {
                agent.warmup(
                    &mut self.env,
                    self.config.replay_warmup,
                    self.config.episode_max_steps,
                )?;
                log::info!(
                    "agent {} warmed up with {} transitions",
                    agent.id(),
                    agent.replay_len()
                );
            }
        }

        let mut report = TrainingReport::default();
        let mut trackers: HashMap<String, RewardTracker> = HashMap::new();
        for agent in &self.agents {
            trackers.insert(
                agent.id().clone(),
                RewardTracker::new(self.config.moving_avg_window)?,
            );
        }
        let mut consecutive_failures = 0usize;
        let mut global_step = 0u64;

        for episode in 0..self.config.episodes {
            let seed = if episode == 0 { self.config.seed } else { None };
            let stats = self.run_episode(seed, &mut global_step)?;

            if let Some(err) = stats.failure {
                consecutive_failures += 1;
                report.abandoned_episodes += 1;
                log::warn!(
                    "episode {} abandoned after {} steps ({}); partial rewards {:?}",
                    episode,
                    stats.steps,
                    err,
                    stats.rewards
                );
                if consecutive_failures >= self.config.max_consecutive_env_failures {
                    return Err(TalosError::Environment(format!(
                        "{} consecutive episode failures, aborting run: {}",
                        consecutive_failures, err
                    )));
                }
                continue;
            }
            consecutive_failures = 0;

            let mut improved = false;
            for agent in &mut self.agents {
                agent.decay_episode(episode);
                let reward = stats.rewards.get(agent.id()).copied().unwrap_or(0.0);
                if let Some(tracker) = trackers.get_mut(agent.id()) {
                    tracker.push(reward);
                    improved |= tracker.record_improvement();
                    log::info!(
                        "agent {} | episode {:>4} | steps {:>4} [{}] | epsilon {:.3} | reward {:.1} | moving avg {:.1}",
                        agent.id(),
                        episode,
                        stats.steps,
                        global_step,
                        agent.epsilon(),
                        reward,
                        tracker.moving_average()
                    );
                }
                report
                    .rewards_per_agent
                    .entry(agent.id().clone())
                    .or_default()
                    .push(reward);
            }
            report.episode_lengths.push(stats.steps);

            self.maybe_checkpoint(episode, improved)?;

            if let Some(threshold) = self.config.moving_avg_stop_threshold {
                let reached = trackers
                    .values()
                    .all(|t| t.window_full() && t.moving_average() >= threshold);
                if reached {
                    log::info!("moving average reached {} after episode {}", threshold, episode);
                    report.stopped_early = true;
                    break;
                }
            }
        }

        report.global_steps = global_step;
        Ok(report)
    }

    /// Greedy evaluation with learning and exploration off.
    pub fn evaluate(&mut self, episodes: usize) -> Result<EvalReport> {
        run_greedy_episodes(
            &mut self.env,
            &mut self.agents,
            episodes,
            self.config.episode_max_steps,
        )
    }

    fn run_episode(&mut self, seed: Option<u64>, global_step: &mut u64) -> Result<EpisodeStats> {
        let mut stats = EpisodeStats::new(&self.agents);
        let reset = match self.env.reset(seed) {
            Ok(reset) => reset,
            Err(err) => {
                stats.failure = Some(err);
                return Ok(stats);
            }
        };
        let mut obs = reset.observations;
        for agent in &mut self.agents {
            agent.begin_episode();
        }

        while self.agents.iter().any(|a| !a.is_terminated())
            && stats.steps < self.config.episode_max_steps
        {
            let mut actions = HashMap::new();
            for agent in &mut self.agents {
                if agent.is_terminated() {
                    continue;
                }
                if let Some(o) = obs.get(agent.id()) {
                    let action = agent.choose_action(o, true);
                    actions.insert(agent.id().clone(), action);
                }
            }
            if actions.is_empty() {
                break;
            }

            let outcome = match self.env.step(&actions) {
                Ok(outcome) => outcome,
                Err(err) => {
                    stats.failure = Some(err);
                    return Ok(stats);
                }
            };
            *global_step += 1;
            stats.steps += 1;

            // Only agents that were active at the start of this iteration
            // store transitions, learn, or accumulate reward.
            for agent in &mut self.agents {
                let id = agent.id().clone();
                let action = match actions.get(&id) {
                    Some(&action) => action,
                    None => continue,
                };
                let current = match obs.get(&id) {
                    Some(current) => current.clone(),
                    None => continue,
                };
                let next = match outcome.observations.get(&id) {
                    Some(next) => next.clone(),
                    None => continue,
                };
                let reward = match outcome.rewards.get(&id) {
                    Some(&reward) => reward,
                    None => continue,
                };
                let done = outcome.is_done(&id);
                agent.observe(&current, action, reward, &next, done)?;
                if let Some(total) = stats.rewards.get_mut(&id) {
                    *total += reward;
                }
                if done {
                    agent.set_terminated(true);
                }

                if *global_step % agent.update_interval() as u64 == 0 {
                    if let Some(loss) = agent.train_step()? {
                        log::debug!("agent {} | step {} | loss {:.5}", id, global_step, loss);
                    }
                }
                agent.maybe_sync(*global_step)?;
                agent.decay_step();
            }
            obs = outcome.observations;
        }
        Ok(stats)
    }

    fn maybe_checkpoint(&self, episode: usize, improved: bool) -> Result<()> {
        let dir = match &self.config.checkpoint_dir {
            Some(dir) => dir,
            None => return Ok(()),
        };
        let interval_due = self.config.checkpoint_interval > 0
            && (episode + 1) % self.config.checkpoint_interval == 0;
        if !interval_due && !improved {
            return Ok(());
        }
        fs::create_dir_all(dir)?;
        for agent in &self.agents {
            agent.save(agent_checkpoint_path(dir, agent.id()))?;
        }
        log::info!("checkpointed {} agent(s) after episode {}", self.agents.len(), episode);
        Ok(())
    }
}
