//! Progression service: gated experience, quests and persisted equipment.
//!
//! Every mutation goes through the [`ProgressionStore`], either as an
//! optimistic versioned save wrapped in [`retry_on_conflict`] or as a single
//! atomic conditional update. Nothing here holds user state between calls.

use crate::calendar::{CalendarConfig, CalendarKeys};
use crate::counter_store::{CounterStore, InMemoryCounterStore};
use crate::exp_cap::{ExpCapConfig, ExpCapGate, GateResult};
use crate::item_use::ItemUseGate;
use crate::quest::{QuestAction, QuestUpdate};
use crate::record::ProgressionRecord;
use crate::retry::{retry_on_conflict, RetryPolicy};
use crate::store::{InMemoryProgressionStore, ProgressionStore, Versioned};
use cultivation_combat::{exp_to_next, CombatStats, EquipSlot, ModifierAggregator, MAX_REALM, MAX_SUB_LEVEL};
use cultivation_common::{
    Clock, ConfigurationError, CultivationError, CultivationResult, EligibilityError, ItemId, RateLimitedError,
    RollSource, SystemClock, TemplateId, UserId,
};
use cultivation_crafting::{CraftRequest, CraftResult, CraftingEngine, Material};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info};

// ============================================================================
// Configuration
// ============================================================================

/// Progression settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProgressionConfig {
    /// Experience cap.
    pub exp_cap: ExpCapConfig,
    /// Calendar offset for resets.
    pub calendar: CalendarConfig,
    /// Optimistic write retries.
    pub retry: RetryPolicy,
    /// Cooldown between uses of the same item, in milliseconds.
    pub item_use_cooldown_ms: i64,
}

impl Default for ProgressionConfig {
    fn default() -> Self {
        Self {
            exp_cap: ExpCapConfig::default(),
            calendar: CalendarConfig::default(),
            retry: RetryPolicy::default(),
            item_use_cooldown_ms: 1_000,
        }
    }
}

impl ProgressionConfig {
    /// Rejects invalid windows and offsets; clamps the rest.
    pub fn validate(&mut self) -> Result<(), ConfigurationError> {
        self.exp_cap.validate()?;
        self.calendar.offset()?;
        self.retry.max_attempts = self.retry.max_attempts.max(1);
        self.item_use_cooldown_ms = self.item_use_cooldown_ms.max(0);
        Ok(())
    }
}

// ============================================================================
// Results
// ============================================================================

/// Which boards a calendar check reset.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResetOutcome {
    /// Daily board was reset.
    pub daily: bool,
    /// Weekly board was reset.
    pub weekly: bool,
}

/// Result of an experience grant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExperienceGrant {
    /// Cap state after the grant.
    pub gate: GateResult,
    /// Realm after the grant.
    pub realm: u32,
    /// Sub-level after the grant.
    pub sub_level: u32,
    /// Experience toward the next sub-level.
    pub experience: u64,
    /// Sub-levels gained.
    pub levels_gained: u32,
}

/// Result of a breakthrough.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Breakthrough {
    /// New realm.
    pub realm: u32,
    /// Experience left over.
    pub experience: u64,
}

// ============================================================================
// Service
// ============================================================================

/// Gate services over a progression store and a counter store.
pub struct ProgressionService {
    config: ProgressionConfig,
    store: Arc<dyn ProgressionStore>,
    clock: Arc<dyn Clock>,
    exp_gate: ExpCapGate,
    item_use: ItemUseGate,
}

impl std::fmt::Debug for ProgressionService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProgressionService")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl ProgressionService {
    /// Creates a service over shared stores.
    #[must_use]
    pub fn new(
        config: ProgressionConfig,
        store: Arc<dyn ProgressionStore>,
        counters: Arc<dyn CounterStore>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let exp_gate = ExpCapGate::new(config.exp_cap.clone(), Arc::clone(&counters), Arc::clone(&clock));
        let item_use = ItemUseGate::new(counters, Arc::clone(&clock), config.item_use_cooldown_ms);
        Self {
            config,
            store,
            clock,
            exp_gate,
            item_use,
        }
    }

    /// Creates a service with in-memory stores and the given clock.
    #[must_use]
    pub fn in_memory(config: ProgressionConfig, clock: Arc<dyn Clock>) -> Self {
        Self::new(
            config,
            Arc::new(InMemoryProgressionStore::new()),
            Arc::new(InMemoryCounterStore::new()),
            clock,
        )
    }

    /// Creates a service with in-memory stores and the system clock.
    #[must_use]
    pub fn in_memory_system(config: ProgressionConfig) -> Self {
        Self::in_memory(config, Arc::new(SystemClock))
    }

    /// Get the config.
    #[must_use]
    pub fn config(&self) -> &ProgressionConfig {
        &self.config
    }

    /// Stores a record unless the user already has one.
    pub fn register(&self, record: &ProgressionRecord) -> CultivationResult<Versioned<ProgressionRecord>> {
        self.store.insert_if_absent(record)
    }

    /// Loads a user's record.
    pub fn load(&self, user: UserId) -> CultivationResult<Versioned<ProgressionRecord>> {
        self.store
            .load(user)?
            .ok_or_else(|| EligibilityError::UnknownUser(user).into())
    }

    /// Resolved combat stats for a user's current loadout and boosts.
    pub fn combat_stats(&self, user: UserId, aggregator: &ModifierAggregator) -> CultivationResult<CombatStats> {
        let record = self.load(user)?.value;
        Ok(aggregator.resolve_profile(&record.to_profile(), self.clock.now_ms())?)
    }

    // ------------------------------------------------------------------------
    // Gates
    // ------------------------------------------------------------------------

    /// Atomically reserves experience against the user's rolling cap.
    pub fn consume_exp_cap(
        &self,
        user: UserId,
        amount: u64,
        window_ms: i64,
    ) -> Result<GateResult, ConfigurationError> {
        self.exp_gate.consume_exp_cap(user, amount, window_ms)
    }

    /// Claims a use of a consumable.
    pub fn try_use_item(&self, user: UserId, item: TemplateId) -> Result<(), RateLimitedError> {
        self.item_use.try_use(user, item)
    }

    /// Resets daily and weekly boards whose calendar key is stale.
    ///
    /// Runs as one conditional update, so concurrent callers reset at most once.
    pub fn ensure_calendar_reset(&self, user: UserId) -> CultivationResult<ResetOutcome> {
        let keys = self.config.calendar.keys_at(self.clock.now_ms())?;
        let mut outcome = ResetOutcome::default();
        self.store
            .update_atomic(user, &mut |record| {
                outcome = reset_stale_boards(record, &keys);
                outcome.daily || outcome.weekly
            })?
            .ok_or(EligibilityError::UnknownUser(user))?;
        if outcome.daily || outcome.weekly {
            debug!("{} calendar reset {:?} -> {}/{}", user, outcome, keys.day, keys.week);
        }
        Ok(outcome)
    }

    /// Advances every open quest matching `action`, then completes the ones
    /// that reached their target.
    pub fn apply_quest_progress(&self, user: UserId, action: QuestAction, count: u32) -> CultivationResult<QuestUpdate> {
        self.ensure_calendar_reset(user)?;

        let mut update = QuestUpdate::default();
        self.store
            .update_atomic(user, &mut |record| {
                update.updated = record.daily.increment(action, count);
                update.updated.extend(record.weekly.increment(action, count));
                !update.updated.is_empty()
            })?
            .ok_or(EligibilityError::UnknownUser(user))?;
        if update.updated.is_empty() {
            return Ok(update);
        }

        let now = self.clock.now_ms();
        self.store
            .update_atomic(user, &mut |record| {
                update.completed = record.daily.complete_ready(now);
                update.completed.extend(record.weekly.complete_ready(now));
                !update.completed.is_empty()
            })?
            .ok_or(EligibilityError::UnknownUser(user))?;

        if !update.completed.is_empty() {
            info!("{} completed quests {:?}", user, update.completed);
        }
        Ok(update)
    }

    // ------------------------------------------------------------------------
    // Experience & Realms
    // ------------------------------------------------------------------------

    /// Grants experience within the cap, advancing sub-levels up to the last one.
    pub fn grant_experience(&self, user: UserId, amount: u64) -> CultivationResult<ExperienceGrant> {
        let gate = self.exp_gate.require_exp_cap(user, amount)?;
        retry_on_conflict(self.config.retry, "grant_experience", |_| {
            let Versioned { version, value: mut record } = self.load(user)?;
            record.experience = record.experience.saturating_add(amount);

            let mut levels_gained = 0;
            while record.sub_level < MAX_SUB_LEVEL {
                let needed = exp_to_next(record.realm, record.sub_level);
                if record.experience < needed {
                    break;
                }
                record.experience -= needed;
                record.sub_level += 1;
                levels_gained += 1;
            }

            self.store.save(&record, version)?;
            if levels_gained > 0 {
                info!(
                    "{} advanced {} sub-level(s) to realm {} sub-level {}",
                    user, levels_gained, record.realm, record.sub_level
                );
            }
            Ok(ExperienceGrant {
                gate,
                realm: record.realm,
                sub_level: record.sub_level,
                experience: record.experience,
                levels_gained,
            })
        })
    }

    /// Advances to the next realm from the last sub-level.
    pub fn attempt_breakthrough(&self, user: UserId) -> CultivationResult<Breakthrough> {
        retry_on_conflict(self.config.retry, "attempt_breakthrough", |_| {
            let Versioned { version, value: mut record } = self.load(user)?;
            if record.realm >= MAX_REALM {
                return Err(EligibilityError::BreakthroughNotReady("already at the highest realm".to_string()).into());
            }
            if record.sub_level < MAX_SUB_LEVEL {
                return Err(EligibilityError::BreakthroughNotReady(format!(
                    "sub-level {} of {}",
                    record.sub_level, MAX_SUB_LEVEL
                ))
                .into());
            }
            let needed = exp_to_next(record.realm, record.sub_level);
            if record.experience < needed {
                return Err(EligibilityError::BreakthroughNotReady(format!(
                    "{} of {} experience",
                    record.experience, needed
                ))
                .into());
            }

            record.experience -= needed;
            record.realm += 1;
            record.sub_level = 1;
            self.store.save(&record, version)?;
            info!("{} broke through to realm {}", user, record.realm);
            Ok(Breakthrough {
                realm: record.realm,
                experience: record.experience,
            })
        })
    }

    // ------------------------------------------------------------------------
    // Equipment & Materials
    // ------------------------------------------------------------------------

    /// Equips an owned item; returns the item it replaced.
    pub fn equip_item(&self, user: UserId, item: ItemId) -> CultivationResult<Option<ItemId>> {
        self.with_record("equip_item", user, |record| {
            let realm = record.realm;
            Ok(record.equipment.equip(item, realm)?)
        })
    }

    /// Unequips a slot; returns the item that was there.
    pub fn unequip_slot(&self, user: UserId, slot: EquipSlot) -> CultivationResult<Option<ItemId>> {
        self.with_record("unequip_slot", user, |record| Ok(record.equipment.unequip(slot)))
    }

    /// Wears equipped items after a battle; returns the items now broken.
    pub fn apply_battle_wear(&self, user: UserId, defeated: bool) -> CultivationResult<Vec<ItemId>> {
        self.with_record("apply_battle_wear", user, |record| {
            Ok(record.equipment.apply_battle_wear(defeated))
        })
    }

    /// Adds dropped materials to the user's inventory.
    pub fn add_materials(&self, user: UserId, drops: &[Material]) -> CultivationResult<u64> {
        self.with_record("add_materials", user, |record| {
            for drop in drops {
                record.materials.add(drop.clone());
            }
            Ok(record.materials.total_quantity())
        })
    }

    /// Crafts from the user's stored materials as one atomic update.
    ///
    /// The roll happens once; a rejected craft writes nothing.
    pub fn craft<R: RollSource>(
        &self,
        user: UserId,
        engine: &CraftingEngine,
        request: &CraftRequest,
        rolls: &mut R,
    ) -> CultivationResult<CraftResult> {
        let mut outcome: Option<CultivationResult<CraftResult>> = None;
        self.store
            .update_atomic(user, &mut |record| {
                let result = engine.execute(request, &mut record.materials, rolls);
                let applied = match &result {
                    Ok(craft) => {
                        if let Some(item) = &craft.produced_item {
                            record.equipment.add(item.clone());
                        }
                        true
                    },
                    Err(_) => false,
                };
                outcome = Some(result.map_err(CultivationError::from));
                applied
            })?
            .ok_or(EligibilityError::UnknownUser(user))?;
        outcome.unwrap_or_else(|| Err(EligibilityError::UnknownUser(user).into()))
    }

    /// Load, mutate, save under optimistic retry.
    fn with_record<T>(
        &self,
        operation: &str,
        user: UserId,
        mut mutate: impl FnMut(&mut ProgressionRecord) -> CultivationResult<T>,
    ) -> CultivationResult<T> {
        retry_on_conflict(self.config.retry, operation, |_| {
            let Versioned { version, value: mut record } = self.load(user)?;
            let result = mutate(&mut record)?;
            self.store.save(&record, version)?;
            Ok(result)
        })
    }
}

/// Resets boards whose stored key differs from `keys`.
fn reset_stale_boards(record: &mut ProgressionRecord, keys: &CalendarKeys) -> ResetOutcome {
    let mut outcome = ResetOutcome::default();
    if record.day_key != keys.day {
        record.daily.reset();
        record.day_key.clone_from(&keys.day);
        outcome.daily = true;
    }
    if record.week_key != keys.week {
        record.weekly.reset();
        record.week_key.clone_from(&keys.week);
        outcome.weekly = true;
    }
    outcome
}
