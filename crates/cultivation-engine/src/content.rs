//! Skill, monster and loot content.
//!
//! This module provides:
//! - RON content files (`skills.ron`, `monsters.ron`, `loot.ron`)
//! - Embedded defaults for any file a content directory does not provide
//! - Validation on load, including cross references from monsters to skills
//! - A shared store that can be reloaded without disturbing readers

use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use cultivation_combat::{base_stats, check_realm, CombatStats, Combatant, SkillDefinition};
use cultivation_common::{CombatantId, ConfigurationError, Element, SkillId, StatKey};
use cultivation_crafting::LootTable;
use parking_lot::{RwLock, RwLockReadGuard};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

/// Skill content file name.
pub const SKILLS_FILE: &str = "skills.ron";
/// Monster content file name.
pub const MONSTERS_FILE: &str = "monsters.ron";
/// Loot content file name.
pub const LOOT_FILE: &str = "loot.ron";

const EMBEDDED_SKILLS: &str = include_str!("../content/skills.ron");
const EMBEDDED_MONSTERS: &str = include_str!("../content/monsters.ron");
const EMBEDDED_LOOT: &str = include_str!("../content/loot.ron");

/// Errors that can occur while loading content.
#[derive(Debug, Error)]
pub enum ContentError {
    /// IO error reading a file
    #[error("Failed to read content file: {0}")]
    ReadError(#[from] std::io::Error),

    /// RON parse error
    #[error("Failed to parse content RON: {0}")]
    ParseError(#[from] ron::error::SpannedError),

    /// Definition failed validation
    #[error("Content validation error: {0}")]
    ValidationError(#[from] ConfigurationError),

    /// Skill ID registered twice
    #[error("Duplicate skill ID: {0:?}")]
    DuplicateSkill(SkillId),

    /// Monster ID registered twice
    #[error("Duplicate monster ID: {0}")]
    DuplicateMonster(u32),

    /// Reference to a skill that is not registered
    #[error("{owner} references unknown skill {skill:?}")]
    UnknownSkill {
        /// Who holds the reference
        owner: String,
        /// Missing skill
        skill: SkillId,
    },

    /// Lookup of a monster that is not registered
    #[error("Unknown monster ID: {0}")]
    UnknownMonster(u32),

    /// Override names a stat that does not exist
    #[error("Monster {monster} overrides unknown stat `{stat}`")]
    UnknownStat {
        /// Monster ID
        monster: u32,
        /// Unrecognized stat name
        stat: String,
    },
}

/// Result type for content operations.
pub type ContentResult<T> = Result<T, ContentError>;

// ============================================================================
// Files
// ============================================================================

/// Contents of `skills.ron`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SkillFile {
    /// Skill definitions.
    pub skills: Vec<SkillDefinition>,
}

/// Contents of `monsters.ron`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MonsterFile {
    /// Monster definitions.
    pub monsters: Vec<MonsterDefinition>,
}

/// A monster as loaded from content data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonsterDefinition {
    /// Monster ID
    pub id: u32,
    /// Display name
    pub name: String,
    /// Elemental affinity
    #[serde(default)]
    pub element: Option<Element>,
    /// Realm the base stats are taken from
    pub realm: u32,
    /// Sub-level the base stats are taken from
    #[serde(default = "default_sub_level")]
    pub sub_level: u32,
    /// Multiplier on attack, defense and max health
    #[serde(default = "default_stat_scale")]
    pub stat_scale: f64,
    /// Stats set outright after scaling, keyed by stat name
    #[serde(default)]
    pub overrides: BTreeMap<String, f64>,
    /// Skills the monster can use
    #[serde(default)]
    pub skills: Vec<SkillId>,
    /// Loot hooks rolled on defeat
    #[serde(default)]
    pub loot: Vec<String>,
    /// Revive fraction for a one-time fatal protection
    #[serde(default)]
    pub fatal_protection: Option<f64>,
    /// Experience granted on defeat
    #[serde(default)]
    pub exp_reward: u64,
}

const fn default_sub_level() -> u32 {
    1
}

const fn default_stat_scale() -> f64 {
    1.0
}

impl MonsterDefinition {
    /// Validates realm, scale and overrides.
    pub fn validate(&self) -> ContentResult<()> {
        check_realm(self.realm, self.sub_level)?;
        if !self.stat_scale.is_finite() || self.stat_scale <= 0.0 {
            return Err(ConfigurationError::Invalid(format!(
                "monster {}: stat scale {}",
                self.id, self.stat_scale
            ))
            .into());
        }
        self.parsed_overrides().map(|_| ())
    }

    fn parsed_overrides(&self) -> ContentResult<Vec<(StatKey, f64)>> {
        self.overrides
            .iter()
            .map(|(name, value)| {
                let key = name.parse::<StatKey>().map_err(|_| ContentError::UnknownStat {
                    monster: self.id,
                    stat: name.clone(),
                })?;
                Ok((key, *value))
            })
            .collect()
    }

    /// Resolved combat stats.
    pub fn stats(&self) -> ContentResult<CombatStats> {
        let mut stats = base_stats(self.realm, self.sub_level)?;
        stats.attack = (stats.attack * self.stat_scale).floor();
        stats.defense = (stats.defense * self.stat_scale).floor();
        stats.max_health = (stats.max_health * self.stat_scale).floor();
        for (key, value) in self.parsed_overrides()? {
            stats.set(key, value);
        }
        Ok(stats)
    }
}

// ============================================================================
// Registry
// ============================================================================

/// Registry of loaded content with lookup by ID.
#[derive(Debug, Clone, Default)]
pub struct ContentRegistry {
    skills: HashMap<SkillId, SkillDefinition>,
    monsters: HashMap<u32, MonsterDefinition>,
    loot: LootTable,
}

impl ContentRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads the content bundled with the binary.
    pub fn embedded() -> ContentResult<Self> {
        Self::from_sources(EMBEDDED_SKILLS, EMBEDDED_MONSTERS, EMBEDDED_LOOT)
    }

    /// Loads content from a directory; files it lacks come from the
    /// embedded defaults.
    pub fn from_dir(dir: &Path) -> ContentResult<Self> {
        let skills = read_or_embedded(dir, SKILLS_FILE, EMBEDDED_SKILLS)?;
        let monsters = read_or_embedded(dir, MONSTERS_FILE, EMBEDDED_MONSTERS)?;
        let loot = read_or_embedded(dir, LOOT_FILE, EMBEDDED_LOOT)?;
        Self::from_sources(&skills, &monsters, &loot)
    }

    /// Parses and validates content from RON text.
    pub fn from_sources(skills: &str, monsters: &str, loot: &str) -> ContentResult<Self> {
        let skill_file: SkillFile = ron::from_str(skills)?;
        let monster_file: MonsterFile = ron::from_str(monsters)?;
        let loot: LootTable = ron::from_str(loot)?;

        let mut registry = Self::new();
        for skill in skill_file.skills {
            registry.register_skill(skill)?;
        }
        for monster in monster_file.monsters {
            registry.register_monster(monster)?;
        }
        registry.set_loot(loot)?;
        registry.validate()?;

        info!(
            "Loaded {} skills, {} monsters",
            registry.skills.len(),
            registry.monsters.len()
        );
        Ok(registry)
    }

    /// Registers a skill.
    pub fn register_skill(&mut self, skill: SkillDefinition) -> ContentResult<()> {
        skill.validate()?;
        if self.skills.contains_key(&skill.id) {
            return Err(ContentError::DuplicateSkill(skill.id));
        }
        debug!("Registered skill {:?} ({})", skill.id, skill.name);
        self.skills.insert(skill.id, skill);
        Ok(())
    }

    /// Registers a monster.
    pub fn register_monster(&mut self, monster: MonsterDefinition) -> ContentResult<()> {
        monster.validate()?;
        if self.monsters.contains_key(&monster.id) {
            return Err(ContentError::DuplicateMonster(monster.id));
        }
        debug!("Registered monster {} ({})", monster.id, monster.name);
        self.monsters.insert(monster.id, monster);
        Ok(())
    }

    /// Replaces the loot table.
    pub fn set_loot(&mut self, loot: LootTable) -> ContentResult<()> {
        loot.validate()?;
        self.loot = loot;
        Ok(())
    }

    /// Checks cross references between monsters, skills and loot.
    pub fn validate(&self) -> ContentResult<()> {
        for monster in self.monsters.values() {
            for skill in &monster.skills {
                if !self.skills.contains_key(skill) {
                    return Err(ContentError::UnknownSkill {
                        owner: format!("monster {}", monster.id),
                        skill: *skill,
                    });
                }
            }
            for hook in &monster.loot {
                if !self.loot.hooks.contains_key(hook) {
                    warn!("Monster {} drops from empty loot hook `{}`", monster.id, hook);
                }
            }
        }
        Ok(())
    }

    /// Gets a skill by ID.
    #[must_use]
    pub fn skill(&self, id: SkillId) -> Option<&SkillDefinition> {
        self.skills.get(&id)
    }

    /// Gets a monster by ID.
    #[must_use]
    pub fn monster(&self, id: u32) -> Option<&MonsterDefinition> {
        self.monsters.get(&id)
    }

    /// The loot table.
    #[must_use]
    pub fn loot(&self) -> &LootTable {
        &self.loot
    }

    /// Number of skills.
    #[must_use]
    pub fn skill_count(&self) -> usize {
        self.skills.len()
    }

    /// Number of monsters.
    #[must_use]
    pub fn monster_count(&self) -> usize {
        self.monsters.len()
    }

    /// Looks up skills for `owner`, failing on the first unknown ID.
    pub fn skills_for(&self, owner: &str, ids: &[SkillId]) -> ContentResult<Vec<SkillDefinition>> {
        ids.iter()
            .map(|id| {
                self.skills.get(id).cloned().ok_or_else(|| ContentError::UnknownSkill {
                    owner: owner.to_string(),
                    skill: *id,
                })
            })
            .collect()
    }

    /// Builds a fresh combatant for a monster.
    pub fn build_monster(&self, id: u32, combatant: CombatantId) -> ContentResult<Combatant> {
        let monster = self.monster(id).ok_or(ContentError::UnknownMonster(id))?;
        let skills = self.skills_for(&monster.name, &monster.skills)?;

        let mut enemy = Combatant::new(combatant, monster.name.clone(), monster.stats()?).with_skills(skills);
        if let Some(element) = monster.element {
            enemy = enemy.with_element(element);
        }
        if let Some(fraction) = monster.fatal_protection {
            enemy = enemy.with_fatal_protection(fraction);
        }
        for hook in &monster.loot {
            enemy = enemy.with_loot(hook.clone());
        }
        Ok(enemy)
    }
}

fn read_or_embedded(dir: &Path, file: &str, embedded: &str) -> ContentResult<String> {
    let path = dir.join(file);
    if path.exists() {
        debug!("Reading {}", path.display());
        Ok(fs::read_to_string(path)?)
    } else {
        debug!("{} not found, using embedded {}", path.display(), file);
        Ok(embedded.to_string())
    }
}

// ============================================================================
// Store
// ============================================================================

/// Shared content that readers hold briefly and the loader swaps wholesale.
#[derive(Debug, Clone)]
pub struct ContentStore {
    registry: Arc<RwLock<ContentRegistry>>,
    dir: Option<PathBuf>,
}

impl ContentStore {
    /// Loads content from `dir`, or the embedded defaults when `None`.
    pub fn open(dir: Option<PathBuf>) -> ContentResult<Self> {
        let registry = Self::load(dir.as_deref())?;
        Ok(Self {
            registry: Arc::new(RwLock::new(registry)),
            dir,
        })
    }

    fn load(dir: Option<&Path>) -> ContentResult<ContentRegistry> {
        match dir {
            Some(dir) => ContentRegistry::from_dir(dir),
            None => ContentRegistry::embedded(),
        }
    }

    /// Read access to the current registry.
    pub fn read(&self) -> RwLockReadGuard<'_, ContentRegistry> {
        self.registry.read()
    }

    /// Reloads from the source directory. On failure the current content
    /// stays in place.
    pub fn reload(&self) -> ContentResult<()> {
        match Self::load(self.dir.as_deref()) {
            Ok(registry) => {
                *self.registry.write() = registry;
                info!("Content reloaded");
                Ok(())
            },
            Err(e) => {
                warn!("Content reload failed, keeping previous content: {}", e);
                Err(e)
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_embedded_content_loads() {
        let registry = ContentRegistry::embedded().expect("embedded content is valid");
        assert_eq!(registry.skill_count(), 8);
        assert_eq!(registry.monster_count(), 3);
        assert!(registry.loot().hooks.contains_key("ash_wolf"));
        assert_eq!(
            registry.skill(SkillId::new(2)).map(|s| s.name.as_str()),
            Some("Blood Drinking Palm")
        );
    }

    #[test]
    fn test_build_monster_applies_scale_and_overrides() {
        let registry = ContentRegistry::embedded().expect("valid");

        let wolf = registry.build_monster(1, CombatantId::new(2)).expect("wolf");
        // Realm 1 sub-level 3: attack 110, health 1100, scaled by 0.8
        assert!((wolf.stats.attack - 88.0).abs() < f64::EPSILON);
        assert!((wolf.stats.max_health - 880.0).abs() < f64::EPSILON);
        assert!((wolf.health - 880.0).abs() < f64::EPSILON);
        assert_eq!(wolf.element, Some(Element::Wood));
        assert_eq!(wolf.loot_table, vec!["ash_wolf".to_string()]);

        let boar = registry.build_monster(2, CombatantId::new(2)).expect("boar");
        assert!((boar.stats.defense - 120.0).abs() < f64::EPSILON);

        let python = registry.build_monster(3, CombatantId::new(2)).expect("python");
        assert!(python.fatal_protection.is_some());
        assert_eq!(python.skills.len(), 2);

        assert!(matches!(
            registry.build_monster(99, CombatantId::new(2)),
            Err(ContentError::UnknownMonster(99))
        ));
    }

    #[test]
    fn test_unknown_skill_reference_rejected() {
        let monsters = r#"(monsters: [(id: 1, name: "Ghost", realm: 1, skills: [SkillId(42)])])"#;
        let result = ContentRegistry::from_sources(EMBEDDED_SKILLS, monsters, "(hooks: {})");
        assert!(matches!(
            result,
            Err(ContentError::UnknownSkill { skill, .. }) if skill == SkillId::new(42)
        ));
    }

    #[test]
    fn test_duplicate_and_invalid_definitions() {
        let skills = r#"(skills: [
            (id: SkillId(1), name: "A", effect: FlatDamage),
            (id: SkillId(1), name: "B", effect: FlatDamage),
        ])"#;
        assert!(matches!(
            ContentRegistry::from_sources(skills, "(monsters: [])", "(hooks: {})"),
            Err(ContentError::DuplicateSkill(_))
        ));

        let bad_heal = r#"(skills: [(id: SkillId(1), name: "A", effect: Heal(fraction: 1.5))])"#;
        assert!(matches!(
            ContentRegistry::from_sources(bad_heal, "(monsters: [])", "(hooks: {})"),
            Err(ContentError::ValidationError(_))
        ));

        let bad_stat = r#"(monsters: [(id: 1, name: "X", realm: 1, overrides: { "luck": 9.0 })])"#;
        assert!(matches!(
            ContentRegistry::from_sources("(skills: [])", bad_stat, "(hooks: {})"),
            Err(ContentError::UnknownStat { monster: 1, .. })
        ));

        let bad_realm = r#"(monsters: [(id: 1, name: "X", realm: 12)])"#;
        assert!(matches!(
            ContentRegistry::from_sources("(skills: [])", bad_realm, "(hooks: {})"),
            Err(ContentError::ValidationError(_))
        ));

        assert!(matches!(
            ContentRegistry::from_sources("(skills: [", "(monsters: [])", "(hooks: {})"),
            Err(ContentError::ParseError(_))
        ));
    }

    #[test]
    fn test_directory_overrides_embedded_files() {
        let dir = TempDir::new().expect("temp dir");
        fs::write(
            dir.path().join(MONSTERS_FILE),
            r#"(monsters: [(id: 7, name: "Training Dummy", realm: 1, skills: [SkillId(1)], exp_reward: 5)])"#,
        )
        .expect("write");

        let registry = ContentRegistry::from_dir(dir.path()).expect("valid");
        assert_eq!(registry.monster_count(), 1);
        assert_eq!(registry.monster(7).map(|m| m.exp_reward), Some(5));
        // Skills fall back to the embedded file
        assert_eq!(registry.skill_count(), 8);
    }

    #[test]
    fn test_reload_keeps_content_on_failure() {
        let dir = TempDir::new().expect("temp dir");
        let store = ContentStore::open(Some(dir.path().to_path_buf())).expect("embedded fallback");
        assert_eq!(store.read().monster_count(), 3);

        fs::write(
            dir.path().join(MONSTERS_FILE),
            r#"(monsters: [(id: 7, name: "Training Dummy", realm: 1)])"#,
        )
        .expect("write");
        store.reload().expect("reload");
        assert_eq!(store.read().monster_count(), 1);

        fs::write(dir.path().join(MONSTERS_FILE), "(monsters: [(id: 7").expect("write");
        assert!(store.reload().is_err());
        assert!(store.read().monster(7).is_some());
    }
}
