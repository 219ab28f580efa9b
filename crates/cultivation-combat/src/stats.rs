//! Combat statistics.
//!
//! This module provides:
//! - The resolved [`CombatStats`] snapshot used for one encounter
//! - Stat blocks carried by equipment and templates
//! - Rate caps applied after aggregation

use cultivation_common::{ConfigurationError, Element, StatKey, StatKind};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// ============================================================================
// Stat Caps
// ============================================================================

/// Hard ceilings for rate-type stats.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StatCaps {
    /// Critical hit chance ceiling.
    pub crit_rate: f64,
    /// Critical damage multiplier ceiling.
    pub crit_damage: f64,
    /// Evasion ceiling.
    pub evasion: f64,
    /// Hit rate ceiling.
    pub hit_rate: f64,
    /// Lifesteal ceiling.
    pub lifesteal: f64,
    /// Penetration ceiling.
    pub penetration: f64,
    /// Damage reduction ceiling.
    pub damage_reduction: f64,
    /// Reflect ceiling.
    pub reflect_damage: f64,
    /// Skill bonus ceiling.
    pub skill_bonus: f64,
}

impl Default for StatCaps {
    fn default() -> Self {
        Self {
            crit_rate: 1.0,
            crit_damage: 5.0,
            evasion: 1.0,
            hit_rate: 1.0,
            lifesteal: 1.0,
            penetration: 1.0,
            damage_reduction: 0.75,
            reflect_damage: 1.0,
            skill_bonus: 10.0,
        }
    }
}

impl StatCaps {
    /// Ceiling for a rate stat, `None` for flat stats.
    #[must_use]
    pub fn cap_for(&self, key: StatKey) -> Option<f64> {
        match key {
            StatKey::CritRate => Some(self.crit_rate),
            StatKey::CritDamage => Some(self.crit_damage),
            StatKey::Evasion => Some(self.evasion),
            StatKey::HitRate => Some(self.hit_rate),
            StatKey::Lifesteal => Some(self.lifesteal),
            StatKey::Penetration => Some(self.penetration),
            StatKey::DamageReduction => Some(self.damage_reduction),
            StatKey::ReflectDamage => Some(self.reflect_damage),
            StatKey::SkillBonus => Some(self.skill_bonus),
            _ => None,
        }
    }

    /// Validates the caps themselves.
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        for key in StatKey::ALL {
            if let Some(cap) = self.cap_for(key) {
                if !cap.is_finite() || cap < 0.0 {
                    return Err(ConfigurationError::InvalidStat {
                        stat: key.name(),
                        value: cap,
                    });
                }
            }
        }
        if self.crit_damage < 1.0 {
            return Err(ConfigurationError::InvalidStat {
                stat: "crit_damage",
                value: self.crit_damage,
            });
        }
        Ok(())
    }
}

// ============================================================================
// Stat Blocks
// ============================================================================

/// A sparse set of stat contributions, as carried by items and templates.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StatBlock {
    values: BTreeMap<StatKey, f64>,
}

impl StatBlock {
    /// Creates an empty block.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a stat (builder pattern).
    #[must_use]
    pub fn with(mut self, key: StatKey, value: f64) -> Self {
        self.add(key, value);
        self
    }

    /// Adds to a stat.
    pub fn add(&mut self, key: StatKey, value: f64) {
        *self.values.entry(key).or_insert(0.0) += value;
    }

    /// Returns a stat, zero when absent.
    #[must_use]
    pub fn get(&self, key: StatKey) -> f64 {
        self.values.get(&key).copied().unwrap_or(0.0)
    }

    /// Iterates over present stats.
    pub fn iter(&self) -> impl Iterator<Item = (StatKey, f64)> + '_ {
        self.values.iter().map(|(&k, &v)| (k, v))
    }

    /// Number of stat lines.
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether the block has no stats.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Returns a copy with every value multiplied by `factor`.
    #[must_use]
    pub fn scaled(&self, factor: f64) -> Self {
        Self {
            values: self.values.iter().map(|(&k, &v)| (k, v * factor)).collect(),
        }
    }

    /// First stat that is negative or not finite.
    #[must_use]
    pub fn first_invalid(&self) -> Option<(StatKey, f64)> {
        self.iter().find(|(_, v)| !v.is_finite() || *v < 0.0)
    }
}

impl FromIterator<(StatKey, f64)> for StatBlock {
    fn from_iter<I: IntoIterator<Item = (StatKey, f64)>>(iter: I) -> Self {
        let mut block = Self::new();
        for (k, v) in iter {
            block.add(k, v);
        }
        block
    }
}

// ============================================================================
// Combat Stats
// ============================================================================

/// Resolved stats for one side of an encounter. Derived, never persisted.
///
/// Rate fields are fractions; flat fields are whole numbers once normalized.
/// Values are kept as `f64` so malformed upstream data stays visible to
/// [`CombatStats::validate`] instead of being clamped away.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CombatStats {
    /// Attack power.
    pub attack: f64,
    /// Defense value.
    pub defense: f64,
    /// Maximum qi/blood.
    pub max_health: f64,
    /// Maximum zhen-yuan.
    pub max_resource: f64,
    /// Turn-order speed.
    pub speed: f64,
    /// Critical hit chance.
    pub crit_rate: f64,
    /// Critical damage multiplier.
    pub crit_damage: f64,
    /// Chance to avoid a hit.
    pub evasion: f64,
    /// Chance to land a hit.
    pub hit_rate: f64,
    /// Fraction of damage dealt returned as health.
    pub lifesteal: f64,
    /// Fraction of target defense ignored.
    pub penetration: f64,
    /// Damage that bypasses defense and shields.
    pub true_damage: f64,
    /// Bonus multiplier on skill damage.
    pub skill_bonus: f64,
    /// Zhen-yuan regained per round.
    pub resource_regen: f64,
    /// Flat elemental damage by element.
    pub elemental: BTreeMap<Element, f64>,
    /// Fraction of incoming damage removed.
    pub damage_reduction: f64,
    /// Shield pool at encounter start.
    pub shield_value: f64,
    /// Fraction of reduced damage returned to the attacker.
    pub reflect_damage: f64,
}

impl Default for CombatStats {
    fn default() -> Self {
        Self {
            attack: 0.0,
            defense: 0.0,
            max_health: 1.0,
            max_resource: 0.0,
            speed: 0.0,
            crit_rate: 0.0,
            crit_damage: 1.5,
            evasion: 0.0,
            hit_rate: 1.0,
            lifesteal: 0.0,
            penetration: 0.0,
            true_damage: 0.0,
            skill_bonus: 0.0,
            resource_regen: 0.0,
            elemental: BTreeMap::new(),
            damage_reduction: 0.0,
            shield_value: 0.0,
            reflect_damage: 0.0,
        }
    }
}

impl CombatStats {
    /// Create stats with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set max health.
    #[must_use]
    pub fn with_health(mut self, max_health: f64) -> Self {
        self.max_health = max_health;
        self
    }

    /// Set attack power.
    #[must_use]
    pub fn with_attack(mut self, attack: f64) -> Self {
        self.attack = attack;
        self
    }

    /// Set defense value.
    #[must_use]
    pub fn with_defense(mut self, defense: f64) -> Self {
        self.defense = defense;
        self
    }

    /// Set speed.
    #[must_use]
    pub fn with_speed(mut self, speed: f64) -> Self {
        self.speed = speed;
        self
    }

    /// Set max resource.
    #[must_use]
    pub fn with_resource(mut self, max_resource: f64) -> Self {
        self.max_resource = max_resource;
        self
    }

    /// Set crit chance and multiplier.
    #[must_use]
    pub fn with_crit(mut self, rate: f64, damage: f64) -> Self {
        self.crit_rate = rate;
        self.crit_damage = damage;
        self
    }

    /// Set any stat by key (builder pattern).
    #[must_use]
    pub fn with_stat(mut self, key: StatKey, value: f64) -> Self {
        self.set(key, value);
        self
    }

    /// Returns a stat by key.
    #[must_use]
    pub fn get(&self, key: StatKey) -> f64 {
        match key {
            StatKey::Attack => self.attack,
            StatKey::Defense => self.defense,
            StatKey::MaxHealth => self.max_health,
            StatKey::MaxResource => self.max_resource,
            StatKey::Speed => self.speed,
            StatKey::CritRate => self.crit_rate,
            StatKey::CritDamage => self.crit_damage,
            StatKey::Evasion => self.evasion,
            StatKey::HitRate => self.hit_rate,
            StatKey::Lifesteal => self.lifesteal,
            StatKey::Penetration => self.penetration,
            StatKey::TrueDamage => self.true_damage,
            StatKey::SkillBonus => self.skill_bonus,
            StatKey::ResourceRegen => self.resource_regen,
            StatKey::DamageReduction => self.damage_reduction,
            StatKey::ShieldValue => self.shield_value,
            StatKey::ReflectDamage => self.reflect_damage,
            StatKey::ElementalMetal
            | StatKey::ElementalWood
            | StatKey::ElementalWater
            | StatKey::ElementalFire
            | StatKey::ElementalEarth => key
                .element()
                .and_then(|e| self.elemental.get(&e).copied())
                .unwrap_or(0.0),
        }
    }

    /// Sets a stat by key.
    pub fn set(&mut self, key: StatKey, value: f64) {
        let slot = match key {
            StatKey::Attack => &mut self.attack,
            StatKey::Defense => &mut self.defense,
            StatKey::MaxHealth => &mut self.max_health,
            StatKey::MaxResource => &mut self.max_resource,
            StatKey::Speed => &mut self.speed,
            StatKey::CritRate => &mut self.crit_rate,
            StatKey::CritDamage => &mut self.crit_damage,
            StatKey::Evasion => &mut self.evasion,
            StatKey::HitRate => &mut self.hit_rate,
            StatKey::Lifesteal => &mut self.lifesteal,
            StatKey::Penetration => &mut self.penetration,
            StatKey::TrueDamage => &mut self.true_damage,
            StatKey::SkillBonus => &mut self.skill_bonus,
            StatKey::ResourceRegen => &mut self.resource_regen,
            StatKey::DamageReduction => &mut self.damage_reduction,
            StatKey::ShieldValue => &mut self.shield_value,
            StatKey::ReflectDamage => &mut self.reflect_damage,
            StatKey::ElementalMetal
            | StatKey::ElementalWood
            | StatKey::ElementalWater
            | StatKey::ElementalFire
            | StatKey::ElementalEarth => {
                if let Some(element) = key.element() {
                    if value == 0.0 {
                        self.elemental.remove(&element);
                    } else {
                        self.elemental.insert(element, value);
                    }
                }
                return;
            },
        };
        *slot = value;
    }

    /// Total flat elemental damage across all elements.
    #[must_use]
    pub fn total_elemental(&self) -> f64 {
        self.elemental.values().sum()
    }

    /// Clamps rates to `caps` and floors flat stats to non-negative whole numbers.
    pub fn normalize(&mut self, caps: &StatCaps) {
        for key in StatKey::ALL {
            let value = self.get(key);
            let normalized = match key.kind() {
                StatKind::Flat => value.max(0.0).floor(),
                StatKind::Rate => {
                    let cap = caps.cap_for(key).unwrap_or(1.0);
                    if key == StatKey::CritDamage {
                        value.clamp(1.0, cap.max(1.0))
                    } else {
                        value.clamp(0.0, cap)
                    }
                },
            };
            self.set(key, normalized);
        }
    }

    /// Rejects malformed stat blocks.
    ///
    /// Negative or non-finite values and non-positive max health indicate an
    /// upstream data bug; they are reported, never clamped.
    pub fn validate(&self, name: &str) -> Result<(), ConfigurationError> {
        for key in StatKey::ALL {
            let value = self.get(key);
            if !value.is_finite() || value < 0.0 {
                return Err(ConfigurationError::InvalidStat {
                    stat: key.name(),
                    value,
                });
            }
        }
        if self.max_health <= 0.0 {
            return Err(ConfigurationError::NonPositiveHealth {
                name: name.to_string(),
                max_health: self.max_health,
            });
        }
        if self.crit_damage < 1.0 {
            return Err(ConfigurationError::InvalidStat {
                stat: "crit_damage",
                value: self.crit_damage,
            });
        }
        Ok(())
    }

    /// Componentwise `>=` over every stat.
    #[must_use]
    pub fn dominates(&self, other: &Self) -> bool {
        StatKey::ALL.iter().all(|&k| self.get(k) >= other.get(k))
    }
}
