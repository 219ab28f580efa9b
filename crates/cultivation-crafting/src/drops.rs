//! Loot tables that turn battle loot hooks into material stacks.

use crate::material::Material;
use cultivation_common::{ConfigurationError, Rarity, RollSource};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

/// One possible material drop.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DropEntry {
    /// Material dropped. Its rarity and quantity are rolled.
    pub material: Material,
    /// Drop chance in `[0, 1]`.
    pub chance: f64,
    /// Smallest stack dropped.
    pub min_quantity: u32,
    /// Largest stack dropped.
    pub max_quantity: u32,
}

impl DropEntry {
    /// Creates an entry dropping exactly one unit.
    #[must_use]
    pub fn new(material: Material, chance: f64) -> Self {
        Self {
            material,
            chance,
            min_quantity: 1,
            max_quantity: 1,
        }
    }

    /// Set the stack size range.
    #[must_use]
    pub fn with_quantity(mut self, min: u32, max: u32) -> Self {
        self.min_quantity = min;
        self.max_quantity = max;
        self
    }
}

/// Cumulative rarity thresholds: a roll below `threshold` yields `rarity`.
///
/// Rolls past the last threshold yield the last rarity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RarityDistribution {
    /// Ascending `(threshold, rarity)` pairs.
    pub thresholds: Vec<(f64, Rarity)>,
}

impl Default for RarityDistribution {
    fn default() -> Self {
        Self {
            thresholds: vec![
                (0.60, Rarity::Common),
                (0.85, Rarity::Uncommon),
                (0.95, Rarity::Rare),
                (0.99, Rarity::Epic),
                (0.999, Rarity::Legendary),
                (1.0, Rarity::Mythic),
            ],
        }
    }
}

impl RarityDistribution {
    /// Maps a roll in `[0, 1)` to a rarity.
    #[must_use]
    pub fn rarity_for(&self, roll: f64) -> Rarity {
        self.thresholds
            .iter()
            .find(|(threshold, _)| roll < *threshold)
            .or_else(|| self.thresholds.last())
            .map_or(Rarity::Common, |(_, rarity)| *rarity)
    }
}

/// Drop entries keyed by loot hook.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LootTable {
    /// Hook key to drop entries.
    pub hooks: BTreeMap<String, Vec<DropEntry>>,
    /// Rarity roll applied to every drop.
    pub rarity: RarityDistribution,
}

impl LootTable {
    /// Creates an empty table with the default rarity distribution.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an entry under a hook key.
    #[must_use]
    pub fn with_entry(mut self, key: impl Into<String>, entry: DropEntry) -> Self {
        self.hooks.entry(key.into()).or_default().push(entry);
        self
    }

    /// Replaces the rarity distribution.
    #[must_use]
    pub fn with_rarity(mut self, rarity: RarityDistribution) -> Self {
        self.rarity = rarity;
        self
    }

    /// Rejects malformed chances, ranges and thresholds.
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        for (key, entries) in &self.hooks {
            for entry in entries {
                if !(0.0..=1.0).contains(&entry.chance) {
                    return Err(ConfigurationError::Invalid(format!(
                        "loot hook `{key}`: chance {} outside [0, 1]",
                        entry.chance
                    )));
                }
                if entry.min_quantity > entry.max_quantity {
                    return Err(ConfigurationError::Invalid(format!(
                        "loot hook `{key}`: quantity range {}..={} is empty",
                        entry.min_quantity, entry.max_quantity
                    )));
                }
            }
        }
        let ascending = self
            .rarity
            .thresholds
            .windows(2)
            .all(|pair| pair[0].0 <= pair[1].0);
        if self.rarity.thresholds.is_empty() || !ascending {
            return Err(ConfigurationError::Invalid(
                "rarity thresholds must be non-empty and ascending".to_string(),
            ));
        }
        Ok(())
    }

    /// Rolls every entry under each hook key.
    ///
    /// Each entry rolls its chance, then its quantity, then its rarity.
    /// Unknown keys drop nothing.
    pub fn roll_drops<R: RollSource>(&self, keys: &[String], rolls: &mut R) -> Vec<Material> {
        let mut drops = Vec::new();
        for key in keys {
            let Some(entries) = self.hooks.get(key) else {
                debug!("No loot entries for hook `{}`", key);
                continue;
            };
            for entry in entries {
                if !rolls.chance(entry.chance) {
                    continue;
                }
                // u64 so the full u32 range still has a span
                let span = u64::from(entry.max_quantity.saturating_sub(entry.min_quantity)) + 1;
                let offset = ((rolls.roll() * span as f64) as u64).min(span - 1);
                let quantity = entry.min_quantity.saturating_add(offset as u32);
                let rarity = self.rarity.rarity_for(rolls.roll());
                if quantity == 0 {
                    continue;
                }

                let mut material = entry.material.clone();
                material.rarity = rarity;
                material.quantity = quantity;
                debug!("Hook `{}` dropped {} x{} ({:?})", key, material.name, quantity, rarity);
                drops.push(material);
            }
        }
        drops
    }
}
