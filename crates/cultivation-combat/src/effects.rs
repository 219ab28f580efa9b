//! Status effects.
//!
//! Effects are resolved onto a working copy of a combatant's stats each time
//! that combatant acts or is acted upon; the resolved base stats are never
//! touched.

use crate::stats::{CombatStats, StatCaps};
use cultivation_common::{ConfigurationError, SkillId};
use serde::{Deserialize, Serialize};

/// Kind of a status effect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EffectKind {
    // Buffs
    /// Multiplies attack by `1 + magnitude`.
    AttackBonus,
    /// Multiplies defense by `1 + magnitude`.
    DefenseBonus,
    /// Multiplies speed by `1 + magnitude`.
    Speed,
    /// Adds `magnitude` to crit rate.
    CritRate,
    /// Adds `magnitude` to damage reduction.
    DamageReduction,
    /// Adds `magnitude` to reflect.
    ReflectDamage,
    /// Takes no damage.
    Invulnerable,
    /// Own attacks ignore target defense.
    IgnoreDefense,
    /// Absorbs `magnitude` damage before health.
    Shield,

    // Debuffs
    /// Multiplies defense by `1 - magnitude`.
    DefenseReduction,
    /// Loses `magnitude` health at round end.
    Poison,
    /// Skips turns.
    Stun,
    /// Can only basic attack.
    Silence,
    /// Multiplies speed by `1 - magnitude`.
    Slow,
}

impl EffectKind {
    /// Check if this is a debuff.
    #[must_use]
    pub fn is_debuff(&self) -> bool {
        matches!(
            self,
            Self::DefenseReduction | Self::Poison | Self::Stun | Self::Silence | Self::Slow
        )
    }

    /// Check if this is a buff.
    #[must_use]
    pub fn is_buff(&self) -> bool {
        !self.is_debuff()
    }

    /// Check if this is a crowd control effect.
    #[must_use]
    pub fn is_control(&self) -> bool {
        matches!(self, Self::Stun | Self::Silence | Self::Slow)
    }

    /// Whether a one-time instance is spent by its holder acting.
    ///
    /// The rest are spent by the holder being hit.
    #[must_use]
    pub fn spent_on_action(&self) -> bool {
        matches!(
            self,
            Self::AttackBonus
                | Self::Speed
                | Self::CritRate
                | Self::IgnoreDefense
                | Self::Stun
                | Self::Silence
                | Self::Slow
                | Self::Poison
        )
    }
}

/// Data describing an effect a skill can produce.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EffectSpec {
    /// Effect kind.
    pub kind: EffectKind,
    /// Strength; meaning depends on kind.
    pub magnitude: f64,
    /// Duration in rounds. Every effect ticks at round end, so a control
    /// effect landed after its target already acted needs 2 to cost a turn.
    pub duration: u32,
    /// Applies to exactly the next relevant action, then expires.
    #[serde(default)]
    pub one_time: bool,
}

impl EffectSpec {
    /// Creates an effect spec.
    #[must_use]
    pub const fn new(kind: EffectKind, magnitude: f64, duration: u32) -> Self {
        Self {
            kind,
            magnitude,
            duration,
            one_time: false,
        }
    }

    /// Marks the effect as one-time.
    #[must_use]
    pub const fn once(mut self) -> Self {
        self.one_time = true;
        self
    }

    /// Rejects non-finite or negative magnitudes and zero durations.
    pub fn validate(&self, skill: SkillId) -> Result<(), ConfigurationError> {
        if !self.magnitude.is_finite() || self.magnitude < 0.0 {
            return Err(ConfigurationError::InvalidSkill {
                skill,
                reason: format!("{:?} magnitude {}", self.kind, self.magnitude),
            });
        }
        if self.duration == 0 {
            return Err(ConfigurationError::InvalidSkill {
                skill,
                reason: format!("{:?} has zero duration", self.kind),
            });
        }
        Ok(())
    }

    /// Activates the spec with the given magnitude.
    #[must_use]
    pub fn activate(&self, magnitude: f64, source: SkillId) -> ActiveEffect {
        ActiveEffect {
            kind: self.kind,
            magnitude,
            remaining: self.duration,
            one_time: self.one_time,
            source_skill: Some(source),
        }
    }
}

/// An effect currently on a combatant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActiveEffect {
    /// Effect kind.
    pub kind: EffectKind,
    /// Strength.
    pub magnitude: f64,
    /// Rounds left.
    pub remaining: u32,
    /// Expires after the next relevant action.
    pub one_time: bool,
    /// Skill that produced the effect.
    pub source_skill: Option<SkillId>,
}

impl ActiveEffect {
    /// Creates an effect with no source skill.
    #[must_use]
    pub const fn new(kind: EffectKind, magnitude: f64, remaining: u32) -> Self {
        Self {
            kind,
            magnitude,
            remaining,
            one_time: false,
            source_skill: None,
        }
    }

    /// Check if expired.
    #[must_use]
    pub const fn is_expired(&self) -> bool {
        self.remaining == 0
    }
}

/// Adds an effect, refreshing an existing one of the same kind and source.
pub fn add_effect(effects: &mut Vec<ActiveEffect>, effect: ActiveEffect) {
    if let Some(existing) = effects
        .iter_mut()
        .find(|e| e.kind == effect.kind && e.source_skill == effect.source_skill)
    {
        existing.remaining = existing.remaining.max(effect.remaining);
        existing.magnitude = existing.magnitude.max(effect.magnitude);
        existing.one_time = existing.one_time && effect.one_time;
    } else {
        effects.push(effect);
    }
}

/// Removes every debuff, returning how many were removed.
pub fn cleanse(effects: &mut Vec<ActiveEffect>) -> usize {
    let before = effects.len();
    effects.retain(|e| !e.kind.is_debuff());
    before - effects.len()
}

/// Round-end tick: every duration drops by one and expired effects go,
/// regardless of which side acted first.
pub fn tick_durations(effects: &mut Vec<ActiveEffect>) {
    for effect in effects.iter_mut() {
        effect.remaining = effect.remaining.saturating_sub(1);
    }
    effects.retain(|e| !e.is_expired());
}

/// Drops one-time effects spent by acting (`acting = true`) or by being hit.
pub fn spend_one_time(effects: &mut Vec<ActiveEffect>, acting: bool) {
    effects.retain(|e| !(e.one_time && e.kind.spent_on_action() == acting));
}

/// Check if any effect of `kind` is present.
#[must_use]
pub fn has_effect(effects: &[ActiveEffect], kind: EffectKind) -> bool {
    effects.iter().any(|e| e.kind == kind)
}

/// Resolves effects onto a working copy of `base`.
///
/// Multiplicative kinds compose onto the current working value, additive
/// kinds sum into rates, and rates are re-clamped to `caps`.
#[must_use]
pub fn apply_status_effects(
    base: &CombatStats,
    effects: &[ActiveEffect],
    caps: &StatCaps,
) -> CombatStats {
    let mut working = base.clone();
    for effect in effects {
        let m = effect.magnitude;
        match effect.kind {
            EffectKind::AttackBonus => working.attack *= 1.0 + m,
            EffectKind::DefenseBonus => working.defense *= 1.0 + m,
            EffectKind::DefenseReduction => working.defense *= (1.0 - m).max(0.0),
            EffectKind::Speed => working.speed *= 1.0 + m,
            EffectKind::Slow => working.speed *= (1.0 - m).max(0.0),
            EffectKind::CritRate => working.crit_rate += m,
            EffectKind::DamageReduction => working.damage_reduction += m,
            EffectKind::ReflectDamage => working.reflect_damage += m,
            EffectKind::Invulnerable
            | EffectKind::IgnoreDefense
            | EffectKind::Shield
            | EffectKind::Poison
            | EffectKind::Stun
            | EffectKind::Silence => {},
        }
    }
    working.normalize(caps);
    working
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> CombatStats {
        CombatStats::new()
            .with_health(1000.0)
            .with_attack(100.0)
            .with_defense(200.0)
            .with_speed(50.0)
    }

    #[test]
    fn test_defense_bonus_multiplies_working_copy() {
        let stats = base();
        let effects = vec![ActiveEffect::new(EffectKind::DefenseBonus, 0.2, 3)];
        let working = apply_status_effects(&stats, &effects, &StatCaps::default());
        assert_eq!(working.defense, 240.0);
        assert_eq!(stats.defense, 200.0);
    }

    #[test]
    fn test_effects_compose() {
        let effects = vec![
            ActiveEffect::new(EffectKind::AttackBonus, 0.5, 2),
            ActiveEffect::new(EffectKind::DefenseReduction, 0.5, 2),
            ActiveEffect::new(EffectKind::Slow, 0.2, 2),
            ActiveEffect::new(EffectKind::CritRate, 2.0, 2),
        ];
        let working = apply_status_effects(&base(), &effects, &StatCaps::default());
        assert_eq!(working.attack, 150.0);
        assert_eq!(working.defense, 100.0);
        assert_eq!(working.speed, 40.0);
        assert_eq!(working.crit_rate, 1.0);
    }

    #[test]
    fn test_tick_expires() {
        let mut effects = vec![
            ActiveEffect::new(EffectKind::Stun, 0.0, 1),
            ActiveEffect::new(EffectKind::Shield, 50.0, 3),
        ];
        tick_durations(&mut effects);
        assert_eq!(effects.len(), 1);
        assert_eq!(effects[0].remaining, 2);
    }

    #[test]
    fn test_add_effect_refreshes_same_source() {
        let spec = EffectSpec::new(EffectKind::AttackBonus, 0.2, 3);
        let mut effects = Vec::new();
        add_effect(&mut effects, spec.activate(0.2, SkillId::new(1)));
        effects[0].remaining = 1;
        add_effect(&mut effects, spec.activate(0.2, SkillId::new(1)));
        add_effect(&mut effects, spec.activate(0.2, SkillId::new(2)));
        assert_eq!(effects.len(), 2);
        assert_eq!(effects[0].remaining, 3);
    }

    #[test]
    fn test_cleanse_and_one_time() {
        let mut effects = vec![
            ActiveEffect::new(EffectKind::Poison, 10.0, 3),
            ActiveEffect::new(EffectKind::Stun, 0.0, 1),
            ActiveEffect::new(EffectKind::AttackBonus, 0.2, 3),
        ];
        assert_eq!(cleanse(&mut effects), 2);
        assert_eq!(effects.len(), 1);

        let mut effects = vec![
            EffectSpec::new(EffectKind::IgnoreDefense, 1.0, 5)
                .once()
                .activate(1.0, SkillId::new(3)),
            EffectSpec::new(EffectKind::Invulnerable, 1.0, 5)
                .once()
                .activate(1.0, SkillId::new(3)),
        ];
        spend_one_time(&mut effects, true);
        assert!(!has_effect(&effects, EffectKind::IgnoreDefense));
        assert!(has_effect(&effects, EffectKind::Invulnerable));
        spend_one_time(&mut effects, false);
        assert!(effects.is_empty());
    }

    #[test]
    fn test_spec_validation() {
        let id = SkillId::new(4);
        assert!(EffectSpec::new(EffectKind::Stun, 0.0, 1).validate(id).is_ok());
        assert!(EffectSpec::new(EffectKind::Stun, 0.0, 0).validate(id).is_err());
        assert!(EffectSpec::new(EffectKind::Poison, -1.0, 2).validate(id).is_err());
        assert!(EffectSpec::new(EffectKind::Poison, f64::NAN, 2)
            .validate(id)
            .is_err());
    }
}
