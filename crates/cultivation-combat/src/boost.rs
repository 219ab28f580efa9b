//! Timed percentage boosts (pills, formations, sect blessings).

use cultivation_common::StatKey;
use serde::{Deserialize, Serialize};

/// A timed multiplier on one stat.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActiveBoost {
    /// Stat being boosted.
    pub stat: StatKey,
    /// Percentage as a fraction (0.2 = +20%). Negative values are penalties.
    pub percent: f64,
    /// Unix millis when the boost ends (None = until removed).
    pub expires_at_ms: Option<i64>,
    /// Where the boost came from.
    pub source: String,
}

impl ActiveBoost {
    /// Creates a permanent boost.
    #[must_use]
    pub fn new(stat: StatKey, percent: f64, source: impl Into<String>) -> Self {
        Self {
            stat,
            percent,
            expires_at_ms: None,
            source: source.into(),
        }
    }

    /// Sets the expiry time.
    #[must_use]
    pub const fn expiring_at(mut self, expires_at_ms: i64) -> Self {
        self.expires_at_ms = Some(expires_at_ms);
        self
    }

    /// Check if the boost still applies at `now_ms`.
    #[must_use]
    pub fn is_active(&self, now_ms: i64) -> bool {
        self.expires_at_ms.map_or(true, |end| now_ms < end)
    }
}

/// Drops boosts that have ended.
pub fn prune_expired(boosts: &mut Vec<ActiveBoost>, now_ms: i64) {
    boosts.retain(|b| b.is_active(now_ms));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_boost_expiry() {
        let boost = ActiveBoost::new(StatKey::Attack, 0.2, "pill").expiring_at(1_000);
        assert!(boost.is_active(999));
        assert!(!boost.is_active(1_000));
        assert!(ActiveBoost::new(StatKey::Attack, 0.2, "sect").is_active(i64::MAX));
    }

    #[test]
    fn test_prune_expired() {
        let mut boosts = vec![
            ActiveBoost::new(StatKey::Attack, 0.2, "a").expiring_at(10),
            ActiveBoost::new(StatKey::Defense, 0.1, "b"),
        ];
        prune_expired(&mut boosts, 50);
        assert_eq!(boosts.len(), 1);
        assert_eq!(boosts[0].stat, StatKey::Defense);
    }
}
