//! Tabular Q-values
//!
//! A fixed `STATE_COUNT x ACTION_COUNT` table. Rows start at zero and are
//! marked visited the first time any value in them is written.

use rand::Rng;
use serde::{Deserialize, Serialize};
use society_events::{ActionKind, ACTION_COUNT};

use super::state::STATE_COUNT;

pub type ActionValues = [f32; ACTION_COUNT];

/// Learning rate of the per-experience update
pub const IMMEDIATE_ALPHA: f32 = 0.1;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QTable {
    values: Vec<ActionValues>,
    visited: Vec<bool>,
}

impl Default for QTable {
    fn default() -> Self {
        Self {
            values: vec![[0.0; ACTION_COUNT]; STATE_COUNT],
            visited: vec![false; STATE_COUNT],
        }
    }
}

impl QTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// True when the table has the expected shape (used when loading).
    pub fn is_well_formed(&self) -> bool {
        self.values.len() == STATE_COUNT
            && self.visited.len() == STATE_COUNT
            && self.values.iter().flatten().all(|v| v.is_finite())
    }

    pub fn get(&self, state: usize, action: ActionKind) -> f32 {
        self.values
            .get(state)
            .map_or(0.0, |row| row[action.index()])
    }

    pub fn set(&mut self, state: usize, action: ActionKind, value: f32) {
        if let Some(row) = self.values.get_mut(state) {
            row[action.index()] = value;
            self.visited[state] = true;
        }
    }

    /// Copy of a row; unknown states read as zeros.
    pub fn row(&self, state: usize) -> ActionValues {
        self.values.get(state).copied().unwrap_or([0.0; ACTION_COUNT])
    }

    pub fn is_visited(&self, state: usize) -> bool {
        self.visited.get(state).copied().unwrap_or(false)
    }

    pub fn visited_count(&self) -> usize {
        self.visited.iter().filter(|v| **v).count()
    }

    pub fn best_action(&self, state: usize) -> ActionKind {
        argmax(&self.row(state))
    }

    pub fn max_value(&self, state: usize) -> f32 {
        self.row(state).iter().copied().fold(f32::NEG_INFINITY, f32::max)
    }

    /// Moves `Q[s][a]` a fraction `alpha` toward `target`.
    pub fn blend_toward(&mut self, state: usize, action: ActionKind, target: f32, alpha: f32) {
        let old = self.get(state, action);
        self.set(state, action, old + alpha * (target - old));
    }

    /// `Q[s][a] += 0.1 * (r - Q[s][a])`
    pub fn update_immediate(&mut self, state: usize, action: ActionKind, reward: f32) {
        self.blend_toward(state, action, reward, IMMEDIATE_ALPHA);
    }

    /// Standard one-step Q-learning update against this table's own
    /// next-state maximum.
    #[allow(clippy::too_many_arguments)]
    pub fn td_update(
        &mut self,
        state: usize,
        action: ActionKind,
        reward: f32,
        next_state: usize,
        done: bool,
        alpha: f32,
        gamma: f32,
    ) {
        let next_max = if done { 0.0 } else { self.max_value(next_state) };
        self.blend_toward(state, action, reward + gamma * next_max, alpha);
    }

    /// Child table: per state, each action value comes from a random parent
    /// when both visited it, otherwise from whichever parent did.
    pub fn crossover<R: Rng>(a: &QTable, b: &QTable, rng: &mut R) -> QTable {
        let mut child = QTable::new();
        for s in 0..STATE_COUNT {
            match (a.is_visited(s), b.is_visited(s)) {
                (true, true) => {
                    let (ra, rb) = (a.row(s), b.row(s));
                    for (i, slot) in child.values[s].iter_mut().enumerate() {
                        *slot = if rng.gen_bool(0.5) { ra[i] } else { rb[i] };
                    }
                    child.visited[s] = true;
                }
                (true, false) => {
                    child.values[s] = a.row(s);
                    child.visited[s] = true;
                }
                (false, true) => {
                    child.values[s] = b.row(s);
                    child.visited[s] = true;
                }
                (false, false) => {}
            }
        }
        child
    }

    /// Nudges one random value in a visited row by `U(-magnitude, magnitude)`.
    pub fn perturb_random<R: Rng>(&mut self, magnitude: f32, rng: &mut R) {
        let visited: Vec<usize> = (0..STATE_COUNT).filter(|s| self.visited[*s]).collect();
        if visited.is_empty() {
            return;
        }
        let s = visited[rng.gen_range(0..visited.len())];
        let a = rng.gen_range(0..ACTION_COUNT);
        self.values[s][a] += rng.gen_range(-magnitude..=magnitude);
    }
}

/// Index of the largest value; ties go to the lowest column.
pub fn argmax(values: &ActionValues) -> ActionKind {
    let mut best = 0;
    for (i, v) in values.iter().enumerate() {
        if *v > values[best] {
            best = i;
        }
    }
    ActionKind::from_index(best).unwrap_or(ActionKind::Rest)
}
