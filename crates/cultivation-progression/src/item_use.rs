//! Per-(user, item) cooldown for consumable use.

use crate::counter_store::CounterStore;
use cultivation_common::{Clock, RateLimitedError, TemplateId, UserId};
use std::sync::Arc;
use tracing::debug;

/// Rejects repeat uses of the same item inside a cooldown window.
pub struct ItemUseGate {
    counters: Arc<dyn CounterStore>,
    clock: Arc<dyn Clock>,
    cooldown_ms: i64,
}

impl std::fmt::Debug for ItemUseGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ItemUseGate")
            .field("cooldown_ms", &self.cooldown_ms)
            .finish_non_exhaustive()
    }
}

impl ItemUseGate {
    /// Creates a gate.
    #[must_use]
    pub fn new(counters: Arc<dyn CounterStore>, clock: Arc<dyn Clock>, cooldown_ms: i64) -> Self {
        Self {
            counters,
            clock,
            cooldown_ms,
        }
    }

    /// Claims a use of `item`, failing while the previous use is cooling down.
    pub fn try_use(&self, user: UserId, item: TemplateId) -> Result<(), RateLimitedError> {
        let key = format!("item_use:{}:{}", user.raw(), item.raw());
        self.counters
            .try_acquire(&key, self.cooldown_ms, self.clock.now_ms())
            .map_err(|remaining_ms| {
                debug!("{} item {:?} on cooldown for {}ms", user, item, remaining_ms);
                RateLimitedError::OnCooldown { remaining_ms }
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::counter_store::InMemoryCounterStore;
    use cultivation_common::ManualClock;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn test_cooldown_window() {
        let clock = Arc::new(ManualClock::new(0));
        let gate = ItemUseGate::new(Arc::new(InMemoryCounterStore::new()), clock.clone(), 1_000);
        let (user, pill) = (UserId::new(1), TemplateId::new(3));

        assert!(gate.try_use(user, pill).is_ok());
        clock.advance(250);
        assert_eq!(
            gate.try_use(user, pill),
            Err(RateLimitedError::OnCooldown { remaining_ms: 750 })
        );
        assert!(gate.try_use(user, TemplateId::new(4)).is_ok());
        clock.advance(750);
        assert!(gate.try_use(user, pill).is_ok());
    }

    #[test]
    fn test_simultaneous_duplicates_rejected() {
        let gate = ItemUseGate::new(
            Arc::new(InMemoryCounterStore::new()),
            Arc::new(ManualClock::new(0)),
            500,
        );
        let accepted = AtomicU32::new(0);
        std::thread::scope(|s| {
            for _ in 0..20 {
                s.spawn(|| {
                    if gate.try_use(UserId::new(1), TemplateId::new(1)).is_ok() {
                        accepted.fetch_add(1, Ordering::SeqCst);
                    }
                });
            }
        });
        assert_eq!(accepted.load(Ordering::SeqCst), 1);
    }
}
