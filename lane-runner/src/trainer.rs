use anyhow::{ensure, Result};
use num_format::ToFormattedString;

use ql::learn::q_table_agent::{self, QTableAgent};
use ql::prelude::Environment;
use ql::util::format::number_format;

use crate::environment::{DiscreteState, LaneAction, LaneEnvironment, LaneParameter, Road, StepInfo};
use crate::stats::{Stats, DEFAULT_WINDOW};

/// Window of the distance moving average reported in progress logs
const LOG_AVG_WINDOW: usize = 20;

pub type LaneAgent = QTableAgent<DiscreteState, LaneAction>;

#[derive(Clone, Debug, PartialEq)]
pub struct TrainerParameter {
    pub environment: LaneParameter,
    pub agent: q_table_agent::Parameter,
    /// Number of recent episodes covered by the crash rate
    pub stats_window: usize,
}

impl Default for TrainerParameter {
    fn default() -> Self {
        Self {
            environment: LaneParameter::default(),
            agent: q_table_agent::Parameter::default(),
            stats_window: DEFAULT_WINDOW,
        }
    }
}

/// One step of a kept episode
#[derive(Clone, Debug, PartialEq)]
pub struct StepRecord {
    /// car lane and obstacles after the step
    pub road: Road,
    pub action: LaneAction,
    pub reward: f32,
    pub crashed: bool,
}

/// Complete trajectory of a kept training episode
#[derive(Clone, Debug, PartialEq)]
pub struct EpisodeRecord {
    /// index within the `train` call which produced it
    pub episode: usize,
    pub steps: Vec<StepRecord>,
    pub total_reward: f32,
    pub distance: usize,
}

/// Drives the environment with the agent's actions and lets the agent learn from every transition.
///
/// Besides the statistics of all episodes, the trajectories of a sample of episodes are kept
/// (see [Trainer::train]) together with the best one among them.
pub struct Trainer {
    pub env: LaneEnvironment,
    pub agent: LaneAgent,
    pub stats: Stats,
    episodes: Vec<EpisodeRecord>,
    best_idx: Option<usize>,
    playback_reward: f64,
}

impl Trainer {
    pub fn new(param: TrainerParameter) -> Result<Self> {
        Ok(Self {
            env: LaneEnvironment::new(param.environment)?,
            agent: QTableAgent::new(param.agent)?,
            stats: Stats::new(param.stats_window)?,
            episodes: vec![],
            best_idx: None,
            playback_reward: 0.0,
        })
    }

    /// Kept episodes, oldest first
    pub fn episodes(&self) -> &[EpisodeRecord] { &self.episodes }

    pub fn best_index(&self) -> Option<usize> { self.best_idx }

    pub fn best_episode(&self) -> Option<&EpisodeRecord> { self.best_idx.map(|i| &self.episodes[i]) }

    /// Runs `n_episodes` training episodes.
    ///
    /// The trajectory of episode `i` is kept if `i % keep_every == 0` or if it is the last one.
    pub fn train(
        &mut self,
        n_episodes: usize,
        keep_every: usize,
    ) -> Result<()> {
        ensure!(keep_every > 0, "keep_every must be positive");

        for episode in 0..n_episodes {
            let (steps, total_reward, info) = self.run_episode()?;
            self.agent.decay();
            self.stats.add_episode(info.distance, total_reward, info.crashed, self.agent.epsilon());
            log::debug!(
                "episode {}: distance {}, reward {:.1}, epsilon {:.3}",
                episode,
                info.distance,
                total_reward,
                self.agent.epsilon()
            );

            if episode % keep_every == 0 || episode == n_episodes - 1 {
                self.episodes.push(EpisodeRecord {
                    episode,
                    steps,
                    total_reward,
                    distance: info.distance,
                });
                self.update_best();
                log::info!(
                    "kept episode {} (distance {}) | {}, q-table states: {}",
                    episode.to_formatted_string(&number_format()),
                    info.distance.to_formatted_string(&number_format()),
                    self.stats.summary(LOG_AVG_WINDOW, self.agent.epsilon()),
                    self.agent.q_table().len().to_formatted_string(&number_format())
                );
            }
        }
        Ok(())
    }

    fn run_episode(&mut self) -> Result<(Vec<StepRecord>, f32, StepInfo)> {
        let mut state = self.env.reset();
        let mut total_reward = 0.0_f64;
        let mut steps = vec![];
        loop {
            let action = self.agent.act(state, true)?;
            let (state_next, reward, done, info) = self.env.step(action);
            self.agent.learn(state, action, reward, state_next, done);
            total_reward += reward as f64;
            steps.push(StepRecord {
                road: self.env.road().clone(),
                action,
                reward,
                crashed: info.crashed,
            });
            state = state_next;
            if done {
                return Ok((steps, total_reward as f32, info));
            }
        }
    }

    /// max distance; the earliest kept episode wins a tie
    fn update_best(&mut self) {
        let mut best: Option<(usize, usize)> = None;
        for (i, ep) in self.episodes.iter().enumerate() {
            if best.map_or(true, |(_, distance)| ep.distance > distance) {
                best = Some((i, ep.distance));
            }
        }
        self.best_idx = best.map(|(i, _)| i);
    }

    /// Advances greedy playback by one step.
    ///
    /// A finished episode is reset first. The agent acts without exploration and does not learn;
    /// the outcome of an episode ending in this step is added to the statistics.
    pub fn play_step(&mut self) -> Result<StepInfo> {
        if self.env.done() {
            self.reset_playback();
        }
        let state = self.env.state();
        let action = self.agent.act(state, false)?;
        let (_, reward, done, info) = self.env.step(action);
        self.playback_reward += reward as f64;
        if done {
            self.stats.add_episode(info.distance, self.playback_reward as f32, info.crashed, self.agent.epsilon());
        }
        Ok(info)
    }

    /// Restarts the environment for playback
    pub fn reset_playback(&mut self) {
        self.env.reset();
        self.playback_reward = 0.0;
    }
}
