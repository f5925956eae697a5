use std::hash::Hash;
use std::marker::PhantomData;

use anyhow::{ensure, Result};
use itertools::Itertools;
use rand::prelude::*;

use crate::learn::q_table::QTable;
use crate::prelude::{Action, ModelActionType, QlError};

#[derive(Clone, Debug, PartialEq)]
pub struct Parameter {
    /// Learning rate
    pub alpha: f32,
    /// Discount factor for future rewards
    pub gamma: f32,
    /// Initial epsilon greedy parameter
    pub epsilon_max: f32,
    /// Minimum epsilon greedy parameter
    pub epsilon_min: f32,
    /// Multiplicative epsilon decay, applied once per episode
    pub epsilon_decay: f32,
    /// Seed of the agent's own random generator (exploration and tie-breaking)
    pub seed: u64,
}

impl Parameter {
    fn validate(&self) -> Result<()> {
        ensure!(self.alpha > 0.0 && self.alpha <= 1.0, "alpha must be in (0, 1], got {}", self.alpha);
        ensure!((0.0..=1.0).contains(&self.gamma), "gamma must be in [0, 1], got {}", self.gamma);
        ensure!(
            self.epsilon_decay > 0.0 && self.epsilon_decay <= 1.0,
            "epsilon_decay must be in (0, 1], got {}",
            self.epsilon_decay
        );
        ensure!(
            0.0 <= self.epsilon_min && self.epsilon_min <= self.epsilon_max && self.epsilon_max <= 1.0,
            "expected 0 <= epsilon_min <= epsilon_max <= 1, got epsilon_min={}, epsilon_max={}",
            self.epsilon_min,
            self.epsilon_max
        );
        Ok(())
    }
}

impl Default for Parameter {
    fn default() -> Self {
        Self {
            alpha: 0.20,
            gamma: 0.95,
            epsilon_max: 1.0,
            epsilon_min: 0.01,
            epsilon_decay: 0.990,
            seed: 7,
        }
    }
}

/// Tabular Q-learning agent with an epsilon-greedy policy.
///
/// - `act` explores with probability epsilon (training only), otherwise picks the action with the highest value.
///   Equal highest values are broken by a uniform random choice among them.
/// - `learn` applies the one-step Bellman update `Q[s][a] += alpha * (target - Q[s][a])`
///   with `target = r` for terminal transitions and `r + gamma * max(Q[s2])` otherwise.
/// - `decay` shrinks epsilon once per finished episode, never below `epsilon_min`.
///
/// All randomness comes from the agent's own seeded generator, so a fixed seed reproduces the same decisions.
pub struct QTableAgent<S, A>
where
    S: Copy + Eq + Hash,
    A: Action,
{
    param: Parameter,
    epsilon: f32,
    q_table: QTable<S>,
    rng: StdRng,
    _action: PhantomData<A>,
}

impl<S, A> QTableAgent<S, A>
where
    S: Copy + Eq + Hash,
    A: Action,
{
    pub fn new(param: Parameter) -> Result<Self> {
        param.validate()?;
        Ok(Self {
            epsilon: param.epsilon_max,
            q_table: QTable::new(A::ACTION_SPACE as usize),
            rng: StdRng::seed_from_u64(param.seed),
            param,
            _action: PhantomData,
        })
    }

    pub fn param(&self) -> &Parameter { &self.param }

    pub fn epsilon(&self) -> f32 { self.epsilon }

    pub fn q_table(&self) -> &QTable<S> { &self.q_table }

    /// Chooses an action for `state`; explores only when `training` is set.
    pub fn act(
        &mut self,
        state: S,
        training: bool,
    ) -> Result<A> {
        if training && self.rng.gen::<f32>() < self.epsilon {
            let a = self.rng.gen_range(0..A::ACTION_SPACE);
            return A::try_from_numeric(a);
        }

        let q_values = self.q_table.get_or_insert(state);
        let max_value = q_values.iter().copied().fold(f32::NEG_INFINITY, f32::max);
        let candidates = q_values.iter()
            .positions(|&v| v == max_value)
            .collect::<Vec<_>>();
        let &best = candidates.choose(&mut self.rng)
            .ok_or_else(|| QlError::from("empty action-value row"))?;
        A::try_from_numeric(best as ModelActionType)
    }

    pub fn learn(
        &mut self,
        state: S,
        action: A,
        reward: f32,
        state_next: S,
        done: bool,
    ) {
        let a = action.numeric() as usize;
        let q_old = self.q_table.get_or_insert(state)[a];
        let target = if done {
            reward
        } else {
            reward + self.param.gamma * self.q_table.max_value(state_next)
        };
        self.q_table.get_or_insert(state)[a] = q_old + self.param.alpha * (target - q_old);
    }

    pub fn decay(&mut self) {
        self.epsilon = f32::max(self.param.epsilon_min, self.epsilon * self.param.epsilon_decay);
    }
}
