//! Rolling-window experience caps.

use crate::counter_store::CounterStore;
use cultivation_common::{Clock, ConfigurationError, CultivationResult, RateLimitedError, UserId};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;

/// Experience cap settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExpCapConfig {
    /// Experience grantable per window.
    pub cap: u64,
    /// Window length in milliseconds.
    pub window_ms: i64,
}

impl Default for ExpCapConfig {
    fn default() -> Self {
        Self {
            cap: 50_000,
            window_ms: 3_600_000,
        }
    }
}

impl ExpCapConfig {
    /// Rejects a non-positive window.
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        check_window(self.window_ms)
    }
}

/// A window of zero or less would restart on every request.
fn check_window(window_ms: i64) -> Result<(), ConfigurationError> {
    if window_ms <= 0 {
        return Err(ConfigurationError::Invalid(format!(
            "exp cap window {window_ms}ms must be positive"
        )));
    }
    Ok(())
}

/// Answer to an exp cap request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GateResult {
    /// Whether the full amount was granted.
    pub accepted: bool,
    /// Experience still grantable in this window.
    pub remaining: u64,
    /// Unix millis when the window ends.
    pub window_ends_at_ms: i64,
}

impl GateResult {
    /// Converts a rejection into an error.
    pub fn into_result(self) -> Result<Self, RateLimitedError> {
        if self.accepted {
            Ok(self)
        } else {
            Err(RateLimitedError::ExpCapExceeded {
                remaining: self.remaining,
                resets_at_ms: self.window_ends_at_ms,
            })
        }
    }
}

/// Gate in front of experience grants.
pub struct ExpCapGate {
    config: ExpCapConfig,
    counters: Arc<dyn CounterStore>,
    clock: Arc<dyn Clock>,
}

impl std::fmt::Debug for ExpCapGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExpCapGate")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl ExpCapGate {
    /// Creates a gate.
    #[must_use]
    pub fn new(config: ExpCapConfig, counters: Arc<dyn CounterStore>, clock: Arc<dyn Clock>) -> Self {
        Self {
            config,
            counters,
            clock,
        }
    }

    /// Get the config.
    #[must_use]
    pub fn config(&self) -> &ExpCapConfig {
        &self.config
    }

    /// Atomically reserves `amount` against the user's cap over `window_ms`.
    ///
    /// Fails without touching the counter when `window_ms` is not positive.
    pub fn consume_exp_cap(
        &self,
        user: UserId,
        amount: u64,
        window_ms: i64,
    ) -> Result<GateResult, ConfigurationError> {
        check_window(window_ms)?;
        let now = self.clock.now_ms();
        let key = format!("exp_cap:{}", user.raw());
        let check = self
            .counters
            .incr_within_cap(&key, amount, self.config.cap, window_ms, now);
        let result = GateResult {
            accepted: check.accepted,
            remaining: self.config.cap.saturating_sub(check.value),
            window_ends_at_ms: check.window_start_ms.saturating_add(window_ms),
        };
        debug!("{} exp cap request {} -> {:?}", user, amount, result);
        Ok(result)
    }

    /// Like [`Self::consume_exp_cap`] with the configured window, failing on rejection.
    pub fn require_exp_cap(&self, user: UserId, amount: u64) -> CultivationResult<GateResult> {
        Ok(self.consume_exp_cap(user, amount, self.config.window_ms)?.into_result()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::counter_store::InMemoryCounterStore;
    use cultivation_common::{CultivationError, ManualClock};
    use std::sync::atomic::{AtomicU32, Ordering};

    fn gate(cap: u64) -> (ExpCapGate, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(10_000));
        let config = ExpCapConfig {
            cap,
            window_ms: 60_000,
        };
        let gate = ExpCapGate::new(config, Arc::new(InMemoryCounterStore::new()), clock.clone());
        (gate, clock)
    }

    #[test]
    fn test_remaining_and_reset_time() {
        let (gate, _) = gate(100);
        let result = gate.consume_exp_cap(UserId::new(1), 40, 60_000).expect("valid window");
        assert!(result.accepted);
        assert_eq!(result.remaining, 60);
        assert_eq!(result.window_ends_at_ms, 70_000);
    }

    #[test]
    fn test_require_maps_rejection() {
        let (gate, clock) = gate(100);
        gate.require_exp_cap(UserId::new(1), 90).expect("within cap");
        assert_eq!(
            gate.require_exp_cap(UserId::new(1), 20),
            Err(CultivationError::RateLimited(RateLimitedError::ExpCapExceeded {
                remaining: 10,
                resets_at_ms: 70_000
            }))
        );

        clock.advance(60_000);
        assert!(gate.require_exp_cap(UserId::new(1), 20).is_ok());
    }

    #[test]
    fn test_users_are_independent() {
        let (gate, _) = gate(10);
        assert!(gate.consume_exp_cap(UserId::new(1), 10, 60_000).expect("valid").accepted);
        assert!(gate.consume_exp_cap(UserId::new(2), 10, 60_000).expect("valid").accepted);
    }

    #[test]
    fn test_non_positive_window_is_rejected() {
        let (gate, _) = gate(100);
        for window_ms in [0, -1, i64::MIN] {
            for _ in 0..10 {
                assert!(matches!(
                    gate.consume_exp_cap(UserId::new(1), 100, window_ms),
                    Err(ConfigurationError::Invalid(_))
                ));
            }
        }
        // Nothing was reserved, so the whole cap is still available once
        assert!(gate.consume_exp_cap(UserId::new(1), 100, 60_000).expect("valid").accepted);
        assert!(!gate.consume_exp_cap(UserId::new(1), 1, 60_000).expect("valid").accepted);
    }

    #[test]
    fn test_concurrent_unit_requests_accept_exactly_cap() {
        let (gate, _) = gate(50);
        let accepted = AtomicU32::new(0);
        std::thread::scope(|s| {
            for _ in 0..100 {
                s.spawn(|| {
                    if gate.consume_exp_cap(UserId::new(9), 1, 60_000).is_ok_and(|r| r.accepted) {
                        accepted.fetch_add(1, Ordering::SeqCst);
                    }
                });
            }
        });
        assert_eq!(accepted.load(Ordering::SeqCst), 50);
    }
}
