//! Transient per-encounter combatants.

use crate::effects::{self, apply_status_effects, ActiveEffect, EffectKind};
use crate::skills::SkillDefinition;
use crate::stats::{CombatStats, StatCaps};
use ahash::AHashMap;
use cultivation_common::{CombatantId, ConfigurationError, Element, SkillId};

/// Survives one lethal hit at a fraction of max health.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FatalProtection {
    /// Health restored as a fraction of max health, in `(0, 1]`.
    pub revive_fraction: f64,
    /// Whether the protection has fired this encounter.
    pub consumed: bool,
}

/// One side of a simulated encounter. Built per encounter and discarded after.
#[derive(Debug, Clone)]
pub struct Combatant {
    /// Identity; lower IDs win speed ties.
    pub id: CombatantId,
    /// Display name.
    pub name: String,
    /// Elemental alignment.
    pub element: Option<Element>,
    /// Current qi/blood.
    pub health: f64,
    /// Current zhen-yuan.
    pub resource: f64,
    /// Resolved base stats; never mutated by effects.
    pub stats: CombatStats,
    /// Active status effects.
    pub effects: Vec<ActiveEffect>,
    /// Known skills, excluding the basic attack.
    pub skills: Vec<SkillDefinition>,
    /// Rounds until each skill is ready again.
    pub cooldowns: AHashMap<SkillId, u32>,
    /// Takes no damage.
    pub invulnerable: bool,
    /// Can only basic attack.
    pub silenced: bool,
    /// Base shield pool (from `shield_value`).
    pub shield: f64,
    /// Optional fatal protection passive.
    pub fatal_protection: Option<FatalProtection>,
    /// Loot hook keys reported when this combatant is defeated.
    pub loot_table: Vec<String>,
}

impl Combatant {
    /// Creates a combatant at full health and resource.
    #[must_use]
    pub fn new(id: CombatantId, name: impl Into<String>, stats: CombatStats) -> Self {
        Self {
            id,
            name: name.into(),
            element: None,
            health: stats.max_health,
            resource: stats.max_resource,
            shield: stats.shield_value,
            stats,
            effects: Vec::new(),
            skills: Vec::new(),
            cooldowns: AHashMap::new(),
            invulnerable: false,
            silenced: false,
            fatal_protection: None,
            loot_table: Vec::new(),
        }
    }

    /// Set element.
    #[must_use]
    pub fn with_element(mut self, element: Element) -> Self {
        self.element = Some(element);
        self
    }

    /// Add a skill.
    #[must_use]
    pub fn with_skill(mut self, skill: SkillDefinition) -> Self {
        self.skills.push(skill);
        self
    }

    /// Add several skills.
    #[must_use]
    pub fn with_skills(mut self, skills: impl IntoIterator<Item = SkillDefinition>) -> Self {
        self.skills.extend(skills);
        self
    }

    /// Grant fatal protection.
    #[must_use]
    pub fn with_fatal_protection(mut self, revive_fraction: f64) -> Self {
        self.fatal_protection = Some(FatalProtection {
            revive_fraction,
            consumed: false,
        });
        self
    }

    /// Add a loot hook key.
    #[must_use]
    pub fn with_loot(mut self, key: impl Into<String>) -> Self {
        self.loot_table.push(key.into());
        self
    }

    /// Rejects malformed stats, skills and passives.
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        self.stats.validate(&self.name)?;
        for skill in &self.skills {
            skill.validate()?;
        }
        if let Some(protection) = &self.fatal_protection {
            let f = protection.revive_fraction;
            if !f.is_finite() || f <= 0.0 || f > 1.0 {
                return Err(ConfigurationError::Invalid(format!(
                    "{}: revive fraction {f} outside (0, 1]",
                    self.name
                )));
            }
        }
        Ok(())
    }

    /// Check if still standing.
    #[must_use]
    pub fn is_alive(&self) -> bool {
        self.health > 0.0
    }

    /// Current health as a fraction of max.
    #[must_use]
    pub fn health_fraction(&self) -> f64 {
        if self.stats.max_health <= 0.0 {
            0.0
        } else {
            (self.health / self.stats.max_health).max(0.0)
        }
    }

    /// Stats with active effects applied. Base stats are untouched.
    #[must_use]
    pub fn working_stats(&self, caps: &StatCaps) -> CombatStats {
        apply_status_effects(&self.stats, &self.effects, caps)
    }

    /// Check if stunned.
    #[must_use]
    pub fn is_stunned(&self) -> bool {
        effects::has_effect(&self.effects, EffectKind::Stun)
    }

    /// Check if own attacks ignore defense.
    #[must_use]
    pub fn ignores_defense(&self) -> bool {
        effects::has_effect(&self.effects, EffectKind::IgnoreDefense)
    }

    /// Recomputes the invulnerable and silenced flags from effects.
    pub fn refresh_flags(&mut self) {
        self.invulnerable = effects::has_effect(&self.effects, EffectKind::Invulnerable);
        self.silenced = effects::has_effect(&self.effects, EffectKind::Silence);
    }

    /// Adds an effect and refreshes flags.
    pub fn add_effect(&mut self, effect: ActiveEffect) {
        effects::add_effect(&mut self.effects, effect);
        self.refresh_flags();
    }

    /// Total shield across the base pool and shield effects.
    #[must_use]
    pub fn shield_total(&self) -> f64 {
        self.shield
            + self
                .effects
                .iter()
                .filter(|e| e.kind == EffectKind::Shield)
                .map(|e| e.magnitude)
                .sum::<f64>()
    }

    /// Drains `amount` from shield effects first, then the base pool.
    pub fn absorb_shield(&mut self, mut amount: f64) {
        for effect in self.effects.iter_mut().filter(|e| e.kind == EffectKind::Shield) {
            let taken = amount.min(effect.magnitude);
            effect.magnitude -= taken;
            amount -= taken;
        }
        self.effects
            .retain(|e| !(e.kind == EffectKind::Shield && e.magnitude <= 0.0));
        self.shield = (self.shield - amount).max(0.0);
    }

    /// Applies health damage. Returns `true` if fatal protection fired.
    pub fn take_damage(&mut self, amount: f64) -> bool {
        if amount <= 0.0 {
            return false;
        }
        self.health -= amount;
        if self.health > 0.0 {
            return false;
        }
        match &mut self.fatal_protection {
            Some(protection) if !protection.consumed => {
                protection.consumed = true;
                self.health = (protection.revive_fraction * self.stats.max_health).max(1.0);
                true
            },
            _ => {
                self.health = 0.0;
                false
            },
        }
    }

    /// Heals up to max health. Returns the amount healed.
    pub fn heal(&mut self, amount: f64) -> f64 {
        let before = self.health;
        self.health = (self.health + amount.max(0.0)).min(self.stats.max_health);
        self.health - before
    }

    /// Restores resource up to max.
    pub fn restore_resource(&mut self, amount: f64) {
        self.resource = (self.resource + amount.max(0.0)).min(self.stats.max_resource);
    }

    /// Spends resource, never below zero.
    pub fn spend_resource(&mut self, amount: f64) {
        self.resource = (self.resource - amount.max(0.0)).max(0.0);
    }

    /// Rounds until `skill` is ready.
    #[must_use]
    pub fn cooldown(&self, skill: SkillId) -> u32 {
        self.cooldowns.get(&skill).copied().unwrap_or(0)
    }

    /// Starts a skill's cooldown.
    pub fn start_cooldown(&mut self, skill: &SkillDefinition) {
        if skill.cooldown > 0 {
            self.cooldowns.insert(skill.id, skill.cooldown);
        }
    }

    /// Decrements all cooldowns, floored at zero.
    pub fn tick_cooldowns(&mut self) {
        for remaining in self.cooldowns.values_mut() {
            *remaining = remaining.saturating_sub(1);
        }
        self.cooldowns.retain(|_, remaining| *remaining > 0);
    }

    /// Skills that can be cast right now.
    #[must_use]
    pub fn ready_skills(&self) -> Vec<&SkillDefinition> {
        if self.silenced {
            return Vec::new();
        }
        self.skills
            .iter()
            .filter(|s| {
                !s.is_basic()
                    && s.weight > 0.0
                    && self.cooldown(s.id) == 0
                    && self.resource >= s.resource_cost
            })
            .collect()
    }
}
