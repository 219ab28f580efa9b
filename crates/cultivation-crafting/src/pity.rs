//! Pity counters for crafting.
//!
//! A pity counter grows on every executed craft that does not upgrade and
//! resets on an upgrade. Once it reaches the threshold the next roll is a
//! guaranteed upgrade, which bounds the worst case.

use cultivation_common::{ConfigurationError, UserId};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};

/// Outcome probabilities for one roll.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OutcomeOdds {
    /// Chance of a failed craft.
    pub failure: f64,
    /// Chance of an item at the rarity ceiling.
    pub normal: f64,
    /// Chance of an item one rarity above the ceiling.
    pub upgrade: f64,
}

/// Pity and base-odds settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PityConfig {
    /// Counter value at which an upgrade is guaranteed.
    pub threshold: u32,
    /// Failure chance before pity.
    pub base_failure: f64,
    /// Upgrade chance before pity.
    pub base_upgrade: f64,
    /// Upgrade chance added per pity point.
    pub upgrade_per_pity: f64,
}

impl Default for PityConfig {
    fn default() -> Self {
        Self {
            threshold: 10,
            base_failure: 0.10,
            base_upgrade: 0.05,
            upgrade_per_pity: 0.02,
        }
    }
}

impl PityConfig {
    /// Clamp settings to sensible ranges.
    pub fn validate(&mut self) -> Result<(), ConfigurationError> {
        for (name, value) in [
            ("base_failure", self.base_failure),
            ("base_upgrade", self.base_upgrade),
            ("upgrade_per_pity", self.upgrade_per_pity),
        ] {
            if !value.is_finite() {
                return Err(ConfigurationError::Invalid(format!("pity {name} is {value}")));
            }
        }
        self.threshold = self.threshold.max(1);
        self.base_failure = self.base_failure.clamp(0.0, 1.0);
        self.base_upgrade = self.base_upgrade.clamp(0.0, 1.0);
        self.upgrade_per_pity = self.upgrade_per_pity.clamp(0.0, 1.0);
        Ok(())
    }

    /// Odds at `pity` with an extra upgrade `bonus`.
    ///
    /// Applied in order: base table, pity bias, bonus modifiers.
    #[must_use]
    pub fn odds(&self, pity: u32, bonus: f64) -> OutcomeOdds {
        if pity >= self.threshold {
            return OutcomeOdds {
                failure: 0.0,
                normal: 0.0,
                upgrade: 1.0,
            };
        }
        let biased = self.base_upgrade + self.upgrade_per_pity * f64::from(pity);
        let upgrade = (biased + bonus.max(0.0)).clamp(0.0, 1.0);
        let failure = self.base_failure.min(1.0 - upgrade);
        OutcomeOdds {
            failure,
            normal: (1.0 - upgrade - failure).max(0.0),
            upgrade,
        }
    }
}

/// Per-(user, craft table) pity storage.
pub trait PityLedger: Send + Sync {
    /// Current counter.
    fn get(&self, user: UserId, table_key: &str) -> u32;

    /// Records an executed roll atomically and returns the new counter.
    fn record(&self, user: UserId, table_key: &str, upgraded: bool) -> u32;
}

/// In-process ledger backed by a `DashMap`.
///
/// Only correct for a single service instance.
#[derive(Debug, Default)]
pub struct InMemoryPityLedger {
    counters: DashMap<(UserId, String), u32>,
}

impl InMemoryPityLedger {
    /// Creates an empty ledger.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl PityLedger for InMemoryPityLedger {
    fn get(&self, user: UserId, table_key: &str) -> u32 {
        self.counters
            .get(&(user, table_key.to_string()))
            .map_or(0, |c| *c)
    }

    fn record(&self, user: UserId, table_key: &str, upgraded: bool) -> u32 {
        let mut entry = self.counters.entry((user, table_key.to_string())).or_insert(0);
        *entry = if upgraded { 0 } else { entry.saturating_add(1) };
        *entry
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::sync::Arc;

    #[test]
    fn test_base_odds() {
        let odds = PityConfig::default().odds(0, 0.0);
        assert!((odds.failure - 0.10).abs() < 1e-12);
        assert!((odds.upgrade - 0.05).abs() < 1e-12);
        assert!((odds.normal - 0.85).abs() < 1e-12);
    }

    #[test]
    fn test_pity_bias_then_guarantee() {
        let config = PityConfig::default();
        assert!((config.odds(5, 0.0).upgrade - 0.15).abs() < 1e-12);
        let guaranteed = config.odds(config.threshold, 0.0);
        assert_eq!(guaranteed.upgrade, 1.0);
        assert_eq!(guaranteed.failure, 0.0);
    }

    #[test]
    fn test_bonus_applies_after_pity() {
        let odds = PityConfig::default().odds(2, 0.5);
        assert!((odds.upgrade - 0.59).abs() < 1e-12);
    }

    #[test]
    fn test_ledger_increments_and_resets() {
        let ledger = InMemoryPityLedger::new();
        let user = UserId::new(7);
        assert_eq!(ledger.record(user, "weapon:rare", false), 1);
        assert_eq!(ledger.record(user, "weapon:rare", false), 2);
        assert_eq!(ledger.get(user, "armor:rare"), 0);
        assert_eq!(ledger.record(user, "weapon:rare", true), 0);
        assert_eq!(ledger.get(user, "weapon:rare"), 0);
    }

    #[test]
    fn test_ledger_concurrent_records() {
        let ledger = Arc::new(InMemoryPityLedger::new());
        let user = UserId::new(1);
        std::thread::scope(|s| {
            for _ in 0..8 {
                let ledger = Arc::clone(&ledger);
                s.spawn(move || {
                    for _ in 0..25 {
                        ledger.record(user, "ring:epic", false);
                    }
                });
            }
        });
        assert_eq!(ledger.get(user, "ring:epic"), 200);
    }

    proptest! {
        #[test]
        fn prop_odds_sum_to_one(pity in 0u32..20, bonus in 0.0f64..2.0) {
            let odds = PityConfig::default().odds(pity, bonus);
            prop_assert!((odds.failure + odds.normal + odds.upgrade - 1.0).abs() < 1e-9);
            prop_assert!(odds.failure >= 0.0 && odds.normal >= 0.0 && odds.upgrade >= 0.0);
        }
    }
}
