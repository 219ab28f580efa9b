//! Realm-based base stats.
//!
//! Stats grow exponentially per realm and linearly per sub-level: realm
//! breakthroughs are rare and decisive, sub-level grinding is frequent and
//! incremental.

use crate::stats::CombatStats;
use cultivation_common::ConfigurationError;

/// Highest realm.
pub const MAX_REALM: u32 = 9;

/// Highest sub-level within a realm.
pub const MAX_SUB_LEVEL: u32 = 9;

/// Per-realm growth for attack, defense, health, resource and regen.
pub const REALM_GROWTH: f64 = 1.5;

/// Per-realm growth for speed.
pub const SPEED_GROWTH: f64 = 1.1;

/// Linear bonus per sub-level.
pub const SUB_LEVEL_STEP: f64 = 0.05;

const REALM_NAMES: [&str; MAX_REALM as usize] = [
    "Qi Refining",
    "Foundation Establishment",
    "Core Formation",
    "Nascent Soul",
    "Spirit Severing",
    "Void Refining",
    "Body Integration",
    "Mahayana",
    "Tribulation Transcendence",
];

/// Display name of a realm.
#[must_use]
pub fn realm_name(realm: u32) -> Option<&'static str> {
    realm
        .checked_sub(1)
        .and_then(|i| REALM_NAMES.get(i as usize))
        .copied()
}

/// Checks that a realm / sub-level pair is in range.
pub fn check_realm(realm: u32, sub_level: u32) -> Result<(), ConfigurationError> {
    if (1..=MAX_REALM).contains(&realm) && (1..=MAX_SUB_LEVEL).contains(&sub_level) {
        Ok(())
    } else {
        Err(ConfigurationError::InvalidRealm { realm, sub_level })
    }
}

/// `1 + 0.05 × (sub_level - 1)`.
#[must_use]
pub fn sub_level_bonus(sub_level: u32) -> f64 {
    1.0 + SUB_LEVEL_STEP * f64::from(sub_level.saturating_sub(1))
}

fn scaled(base: f64, growth: f64, realm: u32, sub_level: u32) -> f64 {
    (base * growth.powi(realm as i32 - 1) * sub_level_bonus(sub_level)).floor()
}

/// Base stats for a cultivator at `realm` / `sub_level`, before equipment.
pub fn base_stats(realm: u32, sub_level: u32) -> Result<CombatStats, ConfigurationError> {
    check_realm(realm, sub_level)?;

    Ok(CombatStats {
        attack: scaled(100.0, REALM_GROWTH, realm, sub_level),
        defense: scaled(50.0, REALM_GROWTH, realm, sub_level),
        max_health: scaled(1000.0, REALM_GROWTH, realm, sub_level),
        max_resource: scaled(500.0, REALM_GROWTH, realm, sub_level),
        speed: scaled(100.0, SPEED_GROWTH, realm, sub_level),
        resource_regen: scaled(10.0, REALM_GROWTH, realm, sub_level),
        crit_rate: 0.05,
        crit_damage: 1.5,
        evasion: 0.05,
        hit_rate: 0.95,
        ..CombatStats::default()
    })
}

/// Experience needed to advance from `sub_level` to the next.
#[must_use]
pub fn exp_to_next(realm: u32, sub_level: u32) -> u64 {
    let realm = realm.clamp(1, MAX_REALM);
    (1000.0 * 1.8_f64.powi(realm as i32 - 1) * (1.0 + 0.1 * f64::from(sub_level.saturating_sub(1))))
        .floor() as u64
}
