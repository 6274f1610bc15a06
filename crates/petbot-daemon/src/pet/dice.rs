use std::collections::VecDeque;

use rand::{Rng, SeedableRng, rngs::StdRng};

/// Source of the random draws behind countdowns and action selection.
pub trait Dice: Send {
    /// Uniform integer in `low..=high`.
    fn roll(&mut self, low: i64, high: i64) -> i64;

    /// Uniform index in `0..len`. `len` must be non-zero.
    fn pick(&mut self, len: usize) -> usize {
        self.roll(0, len as i64 - 1) as usize
    }
}

pub struct StdDice {
    rng: StdRng,
}

impl StdDice {
    pub fn from_entropy() -> Self {
        Self {
            rng: StdRng::from_entropy(),
        }
    }

    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }
}

impl Dice for StdDice {
    fn roll(&mut self, low: i64, high: i64) -> i64 {
        if high <= low {
            return low;
        }
        self.rng.gen_range(low..=high)
    }
}

/// Replays a fixed sequence of values, clamped into the requested range.
/// Once exhausted every roll returns `low`.
#[derive(Debug, Default, Clone)]
pub struct ScriptedDice {
    values: VecDeque<i64>,
}

impl ScriptedDice {
    pub fn new(values: impl IntoIterator<Item = i64>) -> Self {
        Self {
            values: values.into_iter().collect(),
        }
    }

    pub fn push(&mut self, value: i64) {
        self.values.push_back(value);
    }

    pub fn remaining(&self) -> usize {
        self.values.len()
    }
}

impl Dice for ScriptedDice {
    fn roll(&mut self, low: i64, high: i64) -> i64 {
        match self.values.pop_front() {
            Some(value) => value.clamp(low, high.max(low)),
            None => low,
        }
    }
}
