//! Modifier and equipment aggregation.
//!
//! Merges realm base stats, equipped items (scaled by durability) and timed
//! boosts into one resolved [`CombatStats`] snapshot:
//!
//! ```text
//! final = (base + Σ item × clamp(durability, floor, 1)) × (1 + Σ boost%)
//! ```
//!
//! Rates are clamped to their caps afterwards; flat stats are floored.

use crate::boost::ActiveBoost;
use crate::equipment::{EquipmentInventory, EquipmentItem};
use crate::realm::base_stats;
use crate::stats::{CombatStats, StatCaps};
use ahash::AHashMap;
use cultivation_common::{ConfigurationError, StatKey};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Aggregation settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AggregatorConfig {
    /// Minimum effectiveness of a broken item.
    pub durability_floor: f64,
    /// Rate ceilings.
    pub caps: StatCaps,
}

impl Default for AggregatorConfig {
    fn default() -> Self {
        Self {
            durability_floor: 0.25,
            caps: StatCaps::default(),
        }
    }
}

impl AggregatorConfig {
    /// Clamp settings to sensible ranges.
    pub fn validate(&mut self) -> Result<(), ConfigurationError> {
        self.durability_floor = self.durability_floor.clamp(0.0, 1.0);
        self.caps.validate()
    }
}

/// The persisted slice of a cultivator needed to resolve combat stats.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CultivatorProfile {
    /// Realm level.
    pub realm: u32,
    /// Sub-level within the realm.
    pub sub_level: u32,
    /// Owned equipment; the equipped subset is the loadout.
    pub equipment: EquipmentInventory,
    /// Timed boosts.
    pub boosts: Vec<ActiveBoost>,
}

impl CultivatorProfile {
    /// Creates a profile with no equipment or boosts.
    #[must_use]
    pub fn new(realm: u32, sub_level: u32) -> Self {
        Self {
            realm,
            sub_level,
            equipment: EquipmentInventory::new(),
            boosts: Vec::new(),
        }
    }
}

/// Resolves stat snapshots from base stats, equipment and boosts.
#[derive(Debug, Clone, Default)]
pub struct ModifierAggregator {
    /// Configuration.
    pub config: AggregatorConfig,
}

impl ModifierAggregator {
    /// Create aggregator with default config.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create aggregator with config.
    #[must_use]
    pub fn with_config(config: AggregatorConfig) -> Self {
        Self { config }
    }

    /// Resolves one snapshot.
    ///
    /// Items with malformed stat blocks fail the whole resolution.
    pub fn resolve<'a>(
        &self,
        base: &CombatStats,
        equipped: impl IntoIterator<Item = &'a EquipmentItem>,
        boosts: &[ActiveBoost],
        now_ms: i64,
    ) -> Result<CombatStats, ConfigurationError> {
        let mut flat: AHashMap<StatKey, f64> =
            StatKey::ALL.iter().map(|&k| (k, base.get(k))).collect();

        let mut item_count = 0usize;
        for item in equipped {
            item.validate()?;
            for (key, value) in item.effective_stats(self.config.durability_floor).iter() {
                *flat.entry(key).or_insert(0.0) += value;
            }
            item_count += 1;
        }

        let mut percent: AHashMap<StatKey, f64> = AHashMap::new();
        for boost in boosts.iter().filter(|b| b.is_active(now_ms)) {
            if !boost.percent.is_finite() {
                return Err(ConfigurationError::InvalidStat {
                    stat: boost.stat.name(),
                    value: boost.percent,
                });
            }
            *percent.entry(boost.stat).or_insert(0.0) += boost.percent;
        }

        let mut resolved = base.clone();
        for key in StatKey::ALL {
            let sum = flat.get(&key).copied().unwrap_or(0.0);
            let multiplier = 1.0 + percent.get(&key).copied().unwrap_or(0.0);
            resolved.set(key, sum * multiplier);
        }
        resolved.normalize(&self.config.caps);

        debug!(
            "Resolved stats from {} item(s), {} boost stat(s): attack={} defense={} hp={}",
            item_count,
            percent.len(),
            resolved.attack,
            resolved.defense,
            resolved.max_health
        );
        Ok(resolved)
    }

    /// Resolves a cultivator's stats from realm, loadout and boosts.
    pub fn resolve_profile(
        &self,
        profile: &CultivatorProfile,
        now_ms: i64,
    ) -> Result<CombatStats, ConfigurationError> {
        let base = base_stats(profile.realm, profile.sub_level)?;
        self.resolve(&base, profile.equipment.equipped(), &profile.boosts, now_ms)
    }
}

/// Resolves a cultivator's stats with the default aggregation settings.
pub fn resolve_combat_stats(
    profile: &CultivatorProfile,
    now_ms: i64,
) -> Result<CombatStats, ConfigurationError> {
    ModifierAggregator::new().resolve_profile(profile, now_ms)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::equipment::{EquipSlot, EquipmentTemplate};
    use crate::stats::StatBlock;
    use cultivation_common::{Rarity, TemplateId};
    use proptest::prelude::*;

    fn item_with(stats: StatBlock, current: u32, max: u32) -> EquipmentItem {
        let mut item = EquipmentTemplate::new(TemplateId::new(9), EquipSlot::Ring, "ring")
            .generate(Rarity::Common, 1, None)
            .expect("valid template");
        item.stats = stats;
        item.durability = crate::equipment::Durability::with_current(max, current);
        item
    }

    #[test]
    fn test_flat_and_percent_composition() {
        let base = CombatStats::new().with_health(1000.0).with_attack(100.0);
        let sword = item_with(StatBlock::new().with(StatKey::Attack, 50.0), 100, 100);
        let boosts = vec![
            ActiveBoost::new(StatKey::Attack, 0.2, "pill"),
            ActiveBoost::new(StatKey::Attack, 0.1, "formation"),
            ActiveBoost::new(StatKey::Attack, 5.0, "expired").expiring_at(10),
        ];

        let stats = ModifierAggregator::new()
            .resolve(&base, [&sword], &boosts, 100)
            .expect("valid input");
        // (100 + 50) × 1.3 = 195
        assert_eq!(stats.attack, 195.0);
    }

    #[test]
    fn test_durability_penalty_and_floor() {
        let base = CombatStats::new().with_health(1000.0);
        let worn = item_with(StatBlock::new().with(StatKey::Defense, 100.0), 50, 100);
        let broken = item_with(StatBlock::new().with(StatKey::Defense, 100.0), 0, 100);
        let agg = ModifierAggregator::new();

        let stats = agg.resolve(&base, [&worn], &[], 0).expect("valid");
        assert_eq!(stats.defense, 50.0);
        let stats = agg.resolve(&base, [&broken], &[], 0).expect("valid");
        assert_eq!(stats.defense, 25.0);
    }

    #[test]
    fn test_rates_clamped() {
        let base = CombatStats::new().with_health(1000.0).with_crit(0.5, 2.0);
        let ring = item_with(
            StatBlock::new()
                .with(StatKey::CritRate, 0.8)
                .with(StatKey::Lifesteal, 2.0),
            100,
            100,
        );
        let stats = ModifierAggregator::new()
            .resolve(&base, [&ring], &[], 0)
            .expect("valid");
        assert_eq!(stats.crit_rate, 1.0);
        assert_eq!(stats.lifesteal, 1.0);
    }

    #[test]
    fn test_malformed_item_rejected() {
        let base = CombatStats::new().with_health(1000.0);
        let cursed = item_with(StatBlock::new().with(StatKey::Attack, -10.0), 100, 100);
        let result = ModifierAggregator::new().resolve(&base, [&cursed], &[], 0);
        assert!(matches!(result, Err(ConfigurationError::InvalidItem { .. })));
    }

    #[test]
    fn test_resolve_profile_uses_equipped_only() {
        let mut profile = CultivatorProfile::new(1, 1);
        let equipped = item_with(StatBlock::new().with(StatKey::Attack, 10.0), 100, 100);
        let spare = item_with(StatBlock::new().with(StatKey::Attack, 1000.0), 100, 100);
        let id = equipped.id;
        profile.equipment.add(equipped);
        profile.equipment.add(spare);
        profile.equipment.equip(id, 1).expect("equip");

        let stats = resolve_combat_stats(&profile, 0).expect("valid");
        assert_eq!(stats.attack, 110.0);
    }

    proptest! {
        #[test]
        fn prop_rates_always_within_unit_interval(
            crit in 0.0f64..5.0,
            evasion in 0.0f64..5.0,
            hit in 0.0f64..5.0,
            lifesteal in 0.0f64..5.0,
            boost in -0.9f64..5.0,
        ) {
            let base = CombatStats::new().with_health(100.0);
            let gear = item_with(
                StatBlock::new()
                    .with(StatKey::CritRate, crit)
                    .with(StatKey::Evasion, evasion)
                    .with(StatKey::HitRate, hit)
                    .with(StatKey::Lifesteal, lifesteal),
                100,
                100,
            );
            let boosts: Vec<ActiveBoost> = [StatKey::CritRate, StatKey::Evasion, StatKey::HitRate, StatKey::Lifesteal]
                .into_iter()
                .map(|k| ActiveBoost::new(k, boost, "test"))
                .collect();
            let stats = ModifierAggregator::new().resolve(&base, [&gear], &boosts, 0).expect("valid");
            for rate in [stats.crit_rate, stats.evasion, stats.hit_rate, stats.lifesteal] {
                prop_assert!((0.0..=1.0).contains(&rate));
            }
        }

        #[test]
        fn prop_durability_contribution_bounded(current in 0u32..=200, value in 1.0f64..10_000.0) {
            let base = CombatStats::new().with_health(100.0);
            let item = item_with(StatBlock::new().with(StatKey::Defense, value), current, 200);
            let stats = ModifierAggregator::new().resolve(&base, [&item], &[], 0).expect("valid");
            prop_assert!(stats.defense >= (0.25 * value).floor());
            prop_assert!(stats.defense <= value);
        }
    }
}
