//! Skill definitions and the skill resolver.
//!
//! Skills are data: a closed set of [`SkillEffect`] variants plus numbers.
//! New skills are added by writing a definition against an existing variant,
//! never by adding a code path.

use crate::combatant::Combatant;
use crate::effects::{ActiveEffect, EffectKind, EffectSpec};
use crate::stats::StatCaps;
use cultivation_common::{ConfigurationError, RollSource, SkillId};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Per-level output bonus.
pub const SKILL_LEVEL_STEP: f64 = 0.1;

// ============================================================================
// Skill Effects
// ============================================================================

/// What a skill does beyond its baseline numbers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SkillEffect {
    /// Plain multiplier damage.
    FlatDamage,
    /// Damage that heals the caster by `fraction` of the damage dealt.
    LifestealDamage {
        /// Healing as a fraction of damage dealt.
        fraction: f64,
    },
    /// Spends a share of the caster's remaining zhen-yuan for extra damage.
    ResourceBurst {
        /// Share of remaining resource spent.
        self_cost_fraction: f64,
        /// Extra damage per resource point spent.
        damage_per_resource: f64,
    },
    /// Extra damage when the target is below a health fraction.
    ExecuteBonus {
        /// Health fraction below which the bonus applies, in `(0, 1]`.
        threshold: f64,
        /// Damage multiplier when the bonus applies.
        bonus_multiplier: f64,
    },
    /// Restores a fraction of max resource.
    ResourceRestore {
        /// Fraction of max resource.
        fraction: f64,
    },
    /// Heals a fraction of max health.
    Heal {
        /// Fraction of max health.
        fraction: f64,
    },
    /// Removes all debuffs from the caster, optionally granting a buff.
    CleanseBuff {
        /// Buff granted after cleansing.
        buff: Option<EffectSpec>,
    },
    /// Grants a shield worth a fraction of max health.
    ShieldGrant {
        /// Fraction of max health.
        fraction: f64,
        /// Turns the shield lasts.
        duration: u32,
    },
    /// Grants damage reflection.
    ReflectGrant {
        /// Fraction of reduced damage reflected.
        fraction: f64,
        /// Turns the reflection lasts.
        duration: u32,
    },
    /// Damage with a chance to inflict a control effect.
    ///
    /// The effect's duration counts rounds, not the target's turns.
    CrowdControl {
        /// Effect inflicted.
        effect: EffectSpec,
        /// Chance to inflict, in `[0, 1]`.
        chance: f64,
    },
    /// Grants a buff to the caster.
    SelfBuff {
        /// Buff granted.
        effect: EffectSpec,
    },
}

impl SkillEffect {
    /// Whether this variant deals damage (and therefore rolls to hit).
    #[must_use]
    pub fn is_damaging(&self) -> bool {
        match self {
            Self::FlatDamage
            | Self::LifestealDamage { .. }
            | Self::ResourceBurst { .. }
            | Self::ExecuteBonus { .. }
            | Self::CrowdControl { .. } => true,
            Self::ResourceRestore { .. }
            | Self::Heal { .. }
            | Self::CleanseBuff { .. }
            | Self::ShieldGrant { .. }
            | Self::ReflectGrant { .. }
            | Self::SelfBuff { .. } => false,
        }
    }
}

// ============================================================================
// Skill Definition
// ============================================================================

/// A skill as loaded from content data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkillDefinition {
    /// Skill identifier.
    pub id: SkillId,
    /// Display name.
    pub name: String,
    /// Behavior variant.
    pub effect: SkillEffect,
    /// Attack multiplier for damaging variants.
    #[serde(default = "default_multiplier")]
    pub multiplier: f64,
    /// Zhen-yuan cost.
    #[serde(default)]
    pub resource_cost: f64,
    /// Cooldown in rounds.
    #[serde(default)]
    pub cooldown: u32,
    /// Selection weight among ready skills.
    #[serde(default = "default_weight")]
    pub weight: f64,
    /// Owned skill level (starts at 1).
    #[serde(default = "default_level")]
    pub level: u32,
    /// Additional effects; buffs go to the caster, debuffs to the target.
    #[serde(default)]
    pub extra_effects: Vec<EffectSpec>,
}

fn default_multiplier() -> f64 {
    1.0
}

fn default_weight() -> f64 {
    1.0
}

fn default_level() -> u32 {
    1
}

impl SkillDefinition {
    /// Creates a level-1 skill with multiplier 1, no cost and no cooldown.
    #[must_use]
    pub fn new(id: SkillId, name: impl Into<String>, effect: SkillEffect) -> Self {
        Self {
            id,
            name: name.into(),
            effect,
            multiplier: 1.0,
            resource_cost: 0.0,
            cooldown: 0,
            weight: 1.0,
            level: 1,
            extra_effects: Vec::new(),
        }
    }

    /// The fallback action every combatant has.
    #[must_use]
    pub fn basic_attack() -> Self {
        Self::new(SkillId::BASIC_ATTACK, "Basic Attack", SkillEffect::FlatDamage)
    }

    /// Set damage multiplier.
    #[must_use]
    pub fn with_multiplier(mut self, multiplier: f64) -> Self {
        self.multiplier = multiplier;
        self
    }

    /// Set resource cost.
    #[must_use]
    pub fn with_cost(mut self, cost: f64) -> Self {
        self.resource_cost = cost;
        self
    }

    /// Set cooldown.
    #[must_use]
    pub fn with_cooldown(mut self, rounds: u32) -> Self {
        self.cooldown = rounds;
        self
    }

    /// Set selection weight.
    #[must_use]
    pub fn with_weight(mut self, weight: f64) -> Self {
        self.weight = weight;
        self
    }

    /// Set skill level.
    #[must_use]
    pub fn with_level(mut self, level: u32) -> Self {
        self.level = level;
        self
    }

    /// Add an extra effect.
    #[must_use]
    pub fn with_extra_effect(mut self, effect: EffectSpec) -> Self {
        self.extra_effects.push(effect);
        self
    }

    /// Check if this is the basic attack.
    #[must_use]
    pub fn is_basic(&self) -> bool {
        self.id == SkillId::BASIC_ATTACK
    }

    /// `1 + 0.1 × (level - 1)`.
    #[must_use]
    pub fn level_scale(&self) -> f64 {
        1.0 + SKILL_LEVEL_STEP * f64::from(self.level.saturating_sub(1))
    }

    /// Rejects malformed numbers.
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        let invalid = |reason: String| ConfigurationError::InvalidSkill {
            skill: self.id,
            reason,
        };
        let check_fraction = |name: &str, value: f64| {
            if value.is_finite() && (0.0..=1.0).contains(&value) {
                Ok(())
            } else {
                Err(invalid(format!("{name} {value} outside [0, 1]")))
            }
        };

        if !self.multiplier.is_finite() || self.multiplier < 0.0 {
            return Err(invalid(format!("multiplier {}", self.multiplier)));
        }
        if !self.resource_cost.is_finite() || self.resource_cost < 0.0 {
            return Err(invalid(format!("resource cost {}", self.resource_cost)));
        }
        if !self.weight.is_finite() || self.weight < 0.0 {
            return Err(invalid(format!("weight {}", self.weight)));
        }
        if self.level == 0 {
            return Err(invalid("level 0".to_string()));
        }

        match &self.effect {
            SkillEffect::FlatDamage => {},
            SkillEffect::LifestealDamage { fraction }
            | SkillEffect::ResourceRestore { fraction }
            | SkillEffect::Heal { fraction } => check_fraction("fraction", *fraction)?,
            SkillEffect::ResourceBurst {
                self_cost_fraction,
                damage_per_resource,
            } => {
                check_fraction("self cost fraction", *self_cost_fraction)?;
                if !damage_per_resource.is_finite() || *damage_per_resource < 0.0 {
                    return Err(invalid(format!("damage per resource {damage_per_resource}")));
                }
            },
            SkillEffect::ExecuteBonus {
                threshold,
                bonus_multiplier,
            } => {
                if !threshold.is_finite() || *threshold <= 0.0 || *threshold > 1.0 {
                    return Err(invalid(format!("execute threshold {threshold} outside (0, 1]")));
                }
                if !bonus_multiplier.is_finite() || *bonus_multiplier < 0.0 {
                    return Err(invalid(format!("bonus multiplier {bonus_multiplier}")));
                }
            },
            SkillEffect::CleanseBuff { buff } => {
                if let Some(spec) = buff {
                    spec.validate(self.id)?;
                }
            },
            SkillEffect::ShieldGrant { fraction: f, duration }
            | SkillEffect::ReflectGrant { fraction: f, duration } => {
                check_fraction("fraction", *f)?;
                if *duration == 0 {
                    return Err(invalid("zero duration".to_string()));
                }
            },
            SkillEffect::CrowdControl { effect, chance } => {
                check_fraction("chance", *chance)?;
                effect.validate(self.id)?;
            },
            SkillEffect::SelfBuff { effect } => effect.validate(self.id)?,
        }

        for spec in &self.extra_effects {
            spec.validate(self.id)?;
        }
        Ok(())
    }
}

// ============================================================================
// Skill Outcome
// ============================================================================

/// What a resolved skill does, before hit/crit and mitigation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SkillOutcome {
    /// Pre-mitigation damage.
    pub damage: f64,
    /// Healing to the caster.
    pub healing: f64,
    /// Resource restored to the caster.
    pub resource_restore: f64,
    /// Resource spent by the caster.
    pub resource_cost: f64,
    /// Extra lifesteal fraction granted by the skill.
    pub lifesteal: f64,
    /// Whether the caster's debuffs are removed.
    pub cleanse: bool,
    /// Effects applied to the caster.
    pub buffs: Vec<ActiveEffect>,
    /// Effects applied to the target.
    pub debuffs: Vec<ActiveEffect>,
}

impl SkillOutcome {
    /// Kinds of every effect produced, caster's first.
    #[must_use]
    pub fn effects(&self) -> Vec<EffectKind> {
        self.buffs
            .iter()
            .chain(self.debuffs.iter())
            .map(|e| e.kind)
            .collect()
    }
}

// ============================================================================
// Skill Resolver
// ============================================================================

/// Computes skill outcomes from a skill and a combatant pair.
#[derive(Debug, Clone, Default)]
pub struct SkillResolver {
    /// Caps used when deriving working stats.
    pub caps: StatCaps,
}

impl SkillResolver {
    /// Create resolver with default caps.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create resolver with caps.
    #[must_use]
    pub fn with_caps(caps: StatCaps) -> Self {
        Self { caps }
    }

    /// Resolves `skill` cast by `attacker` on `defender`.
    ///
    /// `rolls` is only consulted for control-effect chances.
    pub fn execute(
        &self,
        skill: &SkillDefinition,
        attacker: &Combatant,
        defender: &Combatant,
        rolls: &mut impl RollSource,
    ) -> Result<SkillOutcome, ConfigurationError> {
        skill.validate()?;

        let working = attacker.working_stats(&self.caps);
        let scale = skill.level_scale();
        let skill_bonus = if skill.is_basic() { 0.0 } else { working.skill_bonus };
        let baseline = working.attack * skill.multiplier * scale * (1.0 + skill_bonus);

        let mut outcome = SkillOutcome {
            resource_cost: skill.resource_cost.min(attacker.resource),
            ..SkillOutcome::default()
        };

        match &skill.effect {
            SkillEffect::FlatDamage => outcome.damage = baseline,
            SkillEffect::LifestealDamage { fraction } => {
                outcome.damage = baseline;
                outcome.lifesteal = *fraction;
            },
            SkillEffect::ResourceBurst {
                self_cost_fraction,
                damage_per_resource,
            } => {
                let spent = (attacker.resource - outcome.resource_cost).max(0.0) * self_cost_fraction;
                outcome.resource_cost += spent;
                outcome.damage = baseline + spent * damage_per_resource * scale;
            },
            SkillEffect::ExecuteBonus {
                threshold,
                bonus_multiplier,
            } => {
                outcome.damage = if defender.health_fraction() < *threshold {
                    baseline * bonus_multiplier
                } else {
                    baseline
                };
            },
            SkillEffect::ResourceRestore { fraction } => {
                outcome.resource_restore = working.max_resource * fraction;
            },
            SkillEffect::Heal { fraction } => {
                outcome.healing = working.max_health * fraction * scale;
            },
            SkillEffect::CleanseBuff { buff } => {
                outcome.cleanse = true;
                if let Some(spec) = buff {
                    outcome.buffs.push(spec.activate(spec.magnitude, skill.id));
                }
            },
            SkillEffect::ShieldGrant { fraction, duration } => {
                let amount = working.max_health * fraction * scale;
                outcome.buffs.push(
                    EffectSpec::new(EffectKind::Shield, amount, *duration).activate(amount, skill.id),
                );
            },
            SkillEffect::ReflectGrant { fraction, duration } => {
                outcome.buffs.push(
                    EffectSpec::new(EffectKind::ReflectDamage, *fraction, *duration)
                        .activate(*fraction, skill.id),
                );
            },
            SkillEffect::CrowdControl { effect, chance } => {
                outcome.damage = baseline;
                if rolls.chance(*chance) {
                    outcome.debuffs.push(effect.activate(effect.magnitude, skill.id));
                }
            },
            SkillEffect::SelfBuff { effect } => {
                outcome.buffs.push(effect.activate(effect.magnitude, skill.id));
            },
        }

        for spec in &skill.extra_effects {
            let effect = spec.activate(spec.magnitude, skill.id);
            if spec.kind.is_debuff() {
                outcome.debuffs.push(effect);
            } else {
                outcome.buffs.push(effect);
            }
        }

        debug!(
            "{} uses {} (lv {}): damage={:.1} healing={:.1} effects={:?}",
            attacker.name,
            skill.name,
            skill.level,
            outcome.damage,
            outcome.healing,
            outcome.effects()
        );
        Ok(outcome)
    }
}
