//! Stat keys shared by equipment, crafting and combat.

use crate::element::Element;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// How a stat composes across sources.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StatKind {
    /// Whole-number value, summed without ceiling.
    Flat,
    /// Normalized fraction, summed then clamped.
    Rate,
}

/// Every stat the engine knows about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatKey {
    /// Attack power.
    Attack,
    /// Defense value.
    Defense,
    /// Maximum qi/blood.
    MaxHealth,
    /// Maximum zhen-yuan.
    MaxResource,
    /// Turn-order speed.
    Speed,
    /// Critical hit chance.
    CritRate,
    /// Critical damage multiplier.
    CritDamage,
    /// Chance to avoid a hit.
    Evasion,
    /// Chance to land a hit.
    HitRate,
    /// Fraction of damage dealt returned as health.
    Lifesteal,
    /// Fraction of target defense ignored.
    Penetration,
    /// Damage that bypasses defense and shields.
    TrueDamage,
    /// Bonus multiplier on skill damage.
    SkillBonus,
    /// Zhen-yuan regained per round.
    ResourceRegen,
    /// Fraction of incoming damage removed.
    DamageReduction,
    /// Shield pool at encounter start.
    ShieldValue,
    /// Fraction of reduced damage returned to the attacker.
    ReflectDamage,
    /// Flat metal damage.
    ElementalMetal,
    /// Flat wood damage.
    ElementalWood,
    /// Flat water damage.
    ElementalWater,
    /// Flat fire damage.
    ElementalFire,
    /// Flat earth damage.
    ElementalEarth,
}

impl StatKey {
    /// All known keys.
    pub const ALL: [Self; 22] = [
        Self::Attack,
        Self::Defense,
        Self::MaxHealth,
        Self::MaxResource,
        Self::Speed,
        Self::CritRate,
        Self::CritDamage,
        Self::Evasion,
        Self::HitRate,
        Self::Lifesteal,
        Self::Penetration,
        Self::TrueDamage,
        Self::SkillBonus,
        Self::ResourceRegen,
        Self::DamageReduction,
        Self::ShieldValue,
        Self::ReflectDamage,
        Self::ElementalMetal,
        Self::ElementalWood,
        Self::ElementalWater,
        Self::ElementalFire,
        Self::ElementalEarth,
    ];

    /// Returns the snake_case name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Attack => "attack",
            Self::Defense => "defense",
            Self::MaxHealth => "max_health",
            Self::MaxResource => "max_resource",
            Self::Speed => "speed",
            Self::CritRate => "crit_rate",
            Self::CritDamage => "crit_damage",
            Self::Evasion => "evasion",
            Self::HitRate => "hit_rate",
            Self::Lifesteal => "lifesteal",
            Self::Penetration => "penetration",
            Self::TrueDamage => "true_damage",
            Self::SkillBonus => "skill_bonus",
            Self::ResourceRegen => "resource_regen",
            Self::DamageReduction => "damage_reduction",
            Self::ShieldValue => "shield_value",
            Self::ReflectDamage => "reflect_damage",
            Self::ElementalMetal => "elemental_metal",
            Self::ElementalWood => "elemental_wood",
            Self::ElementalWater => "elemental_water",
            Self::ElementalFire => "elemental_fire",
            Self::ElementalEarth => "elemental_earth",
        }
    }

    /// Returns how this stat composes.
    #[must_use]
    pub const fn kind(self) -> StatKind {
        match self {
            Self::CritRate
            | Self::CritDamage
            | Self::Evasion
            | Self::HitRate
            | Self::Lifesteal
            | Self::Penetration
            | Self::SkillBonus
            | Self::DamageReduction
            | Self::ReflectDamage => StatKind::Rate,
            _ => StatKind::Flat,
        }
    }

    /// Returns the element for elemental damage keys.
    #[must_use]
    pub const fn element(self) -> Option<Element> {
        match self {
            Self::ElementalMetal => Some(Element::Metal),
            Self::ElementalWood => Some(Element::Wood),
            Self::ElementalWater => Some(Element::Water),
            Self::ElementalFire => Some(Element::Fire),
            Self::ElementalEarth => Some(Element::Earth),
            _ => None,
        }
    }

    /// Returns the elemental damage key for an element.
    #[must_use]
    pub const fn for_element(element: Element) -> Self {
        match element {
            Element::Metal => Self::ElementalMetal,
            Element::Wood => Self::ElementalWood,
            Element::Water => Self::ElementalWater,
            Element::Fire => Self::ElementalFire,
            Element::Earth => Self::ElementalEarth,
        }
    }

    /// Base value of one stat line on a tier 1 common item.
    #[must_use]
    pub const fn base_line_value(self) -> f64 {
        match self {
            Self::Attack => 20.0,
            Self::Defense => 12.0,
            Self::MaxHealth => 150.0,
            Self::MaxResource => 60.0,
            Self::Speed => 5.0,
            Self::CritRate | Self::Evasion | Self::HitRate => 0.02,
            Self::CritDamage => 0.1,
            Self::Lifesteal | Self::Penetration | Self::ReflectDamage => 0.02,
            Self::SkillBonus | Self::DamageReduction => 0.03,
            Self::TrueDamage => 8.0,
            Self::ResourceRegen => 4.0,
            Self::ShieldValue => 60.0,
            Self::ElementalMetal
            | Self::ElementalWood
            | Self::ElementalWater
            | Self::ElementalFire
            | Self::ElementalEarth => 10.0,
        }
    }
}

impl fmt::Display for StatKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Error returned when parsing an unknown stat name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownStatKey(pub String);

impl fmt::Display for UnknownStatKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown stat key `{}`", self.0)
    }
}

impl std::error::Error for UnknownStatKey {}

impl FromStr for StatKey {
    type Err = UnknownStatKey;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|key| key.name() == s)
            .ok_or_else(|| UnknownStatKey(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_round_trip_names() {
        for key in StatKey::ALL {
            assert_eq!(key.name().parse::<StatKey>(), Ok(key));
        }
    }

    #[test]
    fn test_unknown_key_rejected() {
        assert!("dragon_aura".parse::<StatKey>().is_err());
    }

    #[test]
    fn test_stat_kinds() {
        assert_eq!(StatKey::Attack.kind(), StatKind::Flat);
        assert_eq!(StatKey::CritRate.kind(), StatKind::Rate);
        assert_eq!(StatKey::ElementalFire.kind(), StatKind::Flat);
        assert_eq!(StatKey::ElementalFire.element(), Some(Element::Fire));
        assert_eq!(StatKey::for_element(Element::Wood), StatKey::ElementalWood);
    }
}
