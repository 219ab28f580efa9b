//! Roll sources for combat and crafting randomness.
//!
//! All engine randomness flows through [`RollSource`], so a caller can pick
//! between a seeded generator (reproducible runs), an entropy-seeded one
//! (production), or a scripted sequence that forces specific outcomes.

use std::collections::VecDeque;

/// A source of uniform rolls in `[0, 1)`.
pub trait RollSource {
    /// Returns the next roll in `[0, 1)`.
    fn roll(&mut self) -> f64;

    /// Rolls against a probability. `chance <= 0` never succeeds, `chance >= 1` always does.
    fn chance(&mut self, chance: f64) -> bool {
        let roll = self.roll();
        roll < chance
    }

    /// Picks an index with probability proportional to its weight.
    ///
    /// Non-positive and non-finite weights are never picked. Returns `None`
    /// when no weight is positive.
    fn pick_weighted(&mut self, weights: &[f64]) -> Option<usize> {
        let usable = |w: f64| w.is_finite() && w > 0.0;
        let total: f64 = weights.iter().copied().filter(|w| usable(*w)).sum();
        if total <= 0.0 {
            return None;
        }

        let target = self.roll() * total;
        let mut cumulative = 0.0;
        let mut last = None;
        for (i, w) in weights.iter().copied().enumerate() {
            if !usable(w) {
                continue;
            }
            cumulative += w;
            last = Some(i);
            if target < cumulative {
                return Some(i);
            }
        }
        last
    }
}

impl<R: RollSource + ?Sized> RollSource for &mut R {
    fn roll(&mut self) -> f64 {
        (**self).roll()
    }
}

/// Rolls backed by a `fastrand` generator.
#[derive(Debug, Clone)]
pub struct SeededRolls {
    rng: fastrand::Rng,
}

impl SeededRolls {
    /// Creates a reproducible roll source.
    #[must_use]
    pub fn new(seed: u64) -> Self {
        Self {
            rng: fastrand::Rng::with_seed(seed),
        }
    }

    /// Creates a roll source seeded from system entropy.
    #[must_use]
    pub fn from_entropy() -> Self {
        Self {
            rng: fastrand::Rng::new(),
        }
    }

    /// Creates a seeded source when a seed is given, otherwise an entropy-seeded one.
    #[must_use]
    pub fn from_option(seed: Option<u64>) -> Self {
        seed.map_or_else(Self::from_entropy, Self::new)
    }
}

impl RollSource for SeededRolls {
    fn roll(&mut self) -> f64 {
        self.rng.f64()
    }
}

/// Replays a fixed sequence of rolls, then repeats a fallback value.
///
/// Used by harnesses to force hits, crits and craft outcomes.
#[derive(Debug, Clone)]
pub struct ScriptedRolls {
    queue: VecDeque<f64>,
    fallback: f64,
    consumed: usize,
}

impl ScriptedRolls {
    /// Creates a script that plays `values` then returns `0.0` forever.
    #[must_use]
    pub fn new(values: impl IntoIterator<Item = f64>) -> Self {
        Self {
            queue: values.into_iter().collect(),
            fallback: 0.0,
            consumed: 0,
        }
    }

    /// Creates a script that always returns `value`.
    #[must_use]
    pub fn always(value: f64) -> Self {
        Self::new([]).with_fallback(value)
    }

    /// Sets the value returned once the script runs out.
    #[must_use]
    pub fn with_fallback(mut self, value: f64) -> Self {
        self.fallback = value.clamp(0.0, 0.999_999);
        self
    }

    /// Number of rolls handed out so far.
    #[must_use]
    pub const fn consumed(&self) -> usize {
        self.consumed
    }

    /// Scripted rolls still queued.
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.queue.len()
    }
}

impl RollSource for ScriptedRolls {
    fn roll(&mut self) -> f64 {
        self.consumed += 1;
        self.queue.pop_front().unwrap_or(self.fallback)
    }
}
