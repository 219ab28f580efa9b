//! Damage mitigation pipeline.
//!
//! Mitigation runs in a fixed order:
//! 1. Defense: `def / (def + ARMOR_K)` after penetration (skipped by ignore-defense)
//! 2. Damage reduction
//! 3. Shield absorption
//! 4. Reflect (a fraction of the *reduced* damage returns to the attacker)
//! 5. True damage, which bypasses defense and shields
//!
//! Invulnerable targets take nothing.

use serde::{Deserialize, Serialize};

/// Armor constant for diminishing defense returns.
pub const ARMOR_K: f64 = 1000.0;

// ============================================================================
// Damage Instance
// ============================================================================

/// One outgoing hit, after hit/crit rolls and before mitigation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DamageInstance {
    /// Skill damage.
    pub base_damage: f64,
    /// Elemental damage, already scaled by matchup.
    pub elemental: f64,
    /// Damage bypassing defense and shields.
    pub true_damage: f64,
    /// Fraction of target defense ignored.
    pub penetration: f64,
    /// Ignore target defense entirely.
    pub ignore_defense: bool,
    /// Whether this is a crit.
    pub is_crit: bool,
    /// Crit multiplier.
    pub crit_multiplier: f64,
}

impl DamageInstance {
    /// Create a new damage instance.
    #[must_use]
    pub fn new(damage: f64) -> Self {
        Self {
            base_damage: damage,
            elemental: 0.0,
            true_damage: 0.0,
            penetration: 0.0,
            ignore_defense: false,
            is_crit: false,
            crit_multiplier: 1.5,
        }
    }

    /// Set as critical hit with the given multiplier.
    #[must_use]
    pub fn as_crit(mut self, multiplier: f64) -> Self {
        self.is_crit = true;
        self.crit_multiplier = multiplier.max(1.0);
        self
    }

    /// Add elemental damage.
    #[must_use]
    pub fn with_elemental(mut self, elemental: f64) -> Self {
        self.elemental += elemental;
        self
    }

    /// Add true damage.
    #[must_use]
    pub fn with_true_damage(mut self, true_damage: f64) -> Self {
        self.true_damage += true_damage;
        self
    }

    /// Set penetration.
    #[must_use]
    pub fn with_penetration(mut self, pen: f64) -> Self {
        self.penetration = pen.clamp(0.0, 1.0);
        self
    }

    /// Ignore target defense.
    #[must_use]
    pub fn ignoring_defense(mut self, ignore: bool) -> Self {
        self.ignore_defense = ignore;
        self
    }

    /// Damage before mitigation, excluding true damage.
    #[must_use]
    pub fn raw_damage(&self) -> f64 {
        let damage = self.base_damage + self.elemental;
        let damage = if self.is_crit {
            damage * self.crit_multiplier
        } else {
            damage
        };
        damage.max(0.0)
    }
}

// ============================================================================
// Target Defense
// ============================================================================

/// Defensive state of the target at the moment of the hit.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TargetDefense {
    /// Working defense.
    pub defense: f64,
    /// Working damage reduction.
    pub damage_reduction: f64,
    /// Available shield pool.
    pub shield: f64,
    /// Working reflect fraction.
    pub reflect: f64,
    /// Takes no damage.
    pub invulnerable: bool,
}

/// Fraction of damage removed by `defense` at armor constant `k`.
#[must_use]
pub fn armor_reduction(defense: f64, k: f64) -> f64 {
    let defense = defense.max(0.0);
    if defense + k <= 0.0 {
        0.0
    } else {
        defense / (defense + k)
    }
}

// ============================================================================
// Damage Result
// ============================================================================

/// Result of mitigating one hit.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DamageResult {
    /// Damage before mitigation (excluding true damage).
    pub raw_damage: f64,
    /// Blocked by defense.
    pub armor_blocked: f64,
    /// Blocked by damage reduction.
    pub reduction_blocked: f64,
    /// Absorbed by shields.
    pub shield_absorbed: f64,
    /// Returned to the attacker.
    pub reflected: f64,
    /// True damage applied.
    pub true_damage: f64,
    /// Damage to health.
    pub final_damage: f64,
    /// Whether this was a critical hit.
    pub was_crit: bool,
    /// Whether the target was invulnerable.
    pub was_immune: bool,
}

impl DamageResult {
    /// Get total damage mitigated.
    #[must_use]
    pub fn total_mitigated(&self) -> f64 {
        self.armor_blocked + self.reduction_blocked + self.shield_absorbed
    }
}

// ============================================================================
// Damage Calculator
// ============================================================================

/// Runs the mitigation pipeline.
#[derive(Debug, Clone)]
pub struct DamageCalculator {
    /// Armor constant.
    pub armor_k: f64,
}

impl Default for DamageCalculator {
    fn default() -> Self {
        Self { armor_k: ARMOR_K }
    }
}

impl DamageCalculator {
    /// Create new calculator with the default armor constant.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create calculator with a custom armor constant.
    #[must_use]
    pub fn with_armor_k(armor_k: f64) -> Self {
        Self { armor_k }
    }

    /// Mitigates `damage` against `target`.
    #[must_use]
    pub fn calculate(&self, damage: &DamageInstance, target: &TargetDefense) -> DamageResult {
        let raw = damage.raw_damage();

        if target.invulnerable {
            return DamageResult {
                raw_damage: raw,
                was_crit: damage.is_crit,
                was_immune: true,
                ..DamageResult::default()
            };
        }

        let effective_defense = if damage.ignore_defense {
            0.0
        } else {
            target.defense * (1.0 - damage.penetration)
        };
        let armor_blocked = raw * armor_reduction(effective_defense, self.armor_k);
        let after_armor = raw - armor_blocked;

        let reduction_blocked = after_armor * target.damage_reduction.clamp(0.0, 1.0);
        let reduced = after_armor - reduction_blocked;

        let shield_absorbed = reduced.min(target.shield.max(0.0));
        let after_shield = reduced - shield_absorbed;

        let reflected = reduced * target.reflect.clamp(0.0, 1.0);

        let true_damage = damage.true_damage.max(0.0);

        DamageResult {
            raw_damage: raw,
            armor_blocked,
            reduction_blocked,
            shield_absorbed,
            reflected: reflected.floor(),
            true_damage,
            final_damage: (after_shield + true_damage).floor(),
            was_crit: damage.is_crit,
            was_immune: false,
        }
    }
}
