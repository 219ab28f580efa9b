//! Engine configuration.
//!
//! Groups the battle, aggregation, crafting and progression settings with the
//! demo run parameters. Configuration is loaded from and saved to a TOML file;
//! a missing or unreadable file falls back to defaults.

use cultivation_combat::{AggregatorConfig, BattleConfig};
use cultivation_crafting::CraftingConfig;
use cultivation_progression::ProgressionConfig;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{info, warn};

/// Configuration file name.
const CONFIG_FILE: &str = "cultivation.toml";

/// Environment variable that overrides the config path.
const CONFIG_ENV: &str = "CULTIVATION_CONFIG";

/// Why a config file could not be read or written.
#[derive(Debug, Error)]
pub enum ConfigFileError {
    /// Filesystem failure
    #[error("{path}: {source}")]
    Io {
        /// File involved
        path: PathBuf,
        /// Underlying error
        source: io::Error,
    },
    /// File is not valid engine TOML
    #[error("{path}: {source}")]
    Parse {
        /// File involved
        path: PathBuf,
        /// Underlying error
        source: toml::de::Error,
    },
    /// Config could not be rendered as TOML
    #[error("rendering config: {0}")]
    Render(#[from] toml::ser::Error),
}

/// Parameters for the demo encounter run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DemoConfig {
    /// User id of the demo cultivator
    pub user: u64,
    /// Monster to fight
    pub monster: u32,
    /// Skill ids the cultivator brings
    pub skills: Vec<u32>,
    /// Number of encounters to run
    pub encounters: u32,
}

impl Default for DemoConfig {
    fn default() -> Self {
        Self {
            user: 1,
            monster: 1,
            skills: vec![1, 2, 3],
            encounters: 3,
        }
    }
}

/// Engine configuration parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    // === Simulation ===
    /// Stat aggregation
    pub aggregator: AggregatorConfig,
    /// Battle engine
    pub battle: BattleConfig,
    /// Crafting odds and pity
    pub crafting: CraftingConfig,
    /// Exp cap, calendar and retries
    pub progression: ProgressionConfig,

    // === Content ===
    /// Directory with `skills.ron`, `monsters.ron` and `loot.ron`
    /// (None = embedded content)
    pub content_dir: Option<PathBuf>,

    // === Run ===
    /// Seed for encounters and drops (None = random)
    pub seed: Option<u64>,
    /// Pretty-print JSON reports
    pub pretty_json: bool,
    /// Demo run
    pub demo: DemoConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            aggregator: AggregatorConfig::default(),
            battle: BattleConfig::default(),
            crafting: CraftingConfig::default(),
            progression: ProgressionConfig::default(),
            content_dir: None,
            seed: None,
            pretty_json: true,
            demo: DemoConfig::default(),
        }
    }
}

impl EngineConfig {
    /// Loads configuration from `CULTIVATION_CONFIG` or `cultivation.toml`.
    pub fn load() -> Self {
        Self::load_from(Self::config_path())
    }

    /// Loads configuration from a file, falling back to defaults.
    ///
    /// A missing file is normal on first run; any other failure is logged
    /// and the whole config falls back, so a half-read file never mixes
    /// with defaults.
    pub fn load_from<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref();
        match Self::read(path) {
            Ok(Some(config)) => {
                info!(
                    "Loaded config from {} (content: {})",
                    path.display(),
                    config.content_source()
                );
                config
            },
            Ok(None) => {
                info!("No config at {}, using defaults with embedded content", path.display());
                Self::default()
            },
            Err(e) => {
                warn!("Ignoring config, using defaults with embedded content: {e}");
                Self::default()
            },
        }
    }

    /// Reads and parses `path`; `Ok(None)` when it does not exist.
    pub fn read(path: &Path) -> Result<Option<Self>, ConfigFileError> {
        let contents = match fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(source) => {
                return Err(ConfigFileError::Io {
                    path: path.to_path_buf(),
                    source,
                })
            },
        };
        toml::from_str(&contents)
            .map(Some)
            .map_err(|source| ConfigFileError::Parse {
                path: path.to_path_buf(),
                source,
            })
    }

    /// Writes the config as TOML, creating parent directories.
    pub fn save_to<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigFileError> {
        let path = path.as_ref();
        let io_error = |source| ConfigFileError::Io {
            path: path.to_path_buf(),
            source,
        };
        let rendered = toml::to_string_pretty(self)?;
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(io_error)?;
        }
        fs::write(path, rendered).map_err(io_error)?;
        info!("Saved config to {} (content: {})", path.display(), self.content_source());
        Ok(())
    }

    /// Where content comes from, for log lines.
    fn content_source(&self) -> String {
        self.content_dir
            .as_ref()
            .map_or_else(|| "embedded".to_string(), |dir| dir.display().to_string())
    }

    fn config_path() -> PathBuf {
        std::env::var(CONFIG_ENV).map_or_else(|_| PathBuf::from(CONFIG_FILE), PathBuf::from)
    }

    /// Clamps every section; a section that cannot be repaired is reset to
    /// its defaults.
    pub fn validate(&mut self) {
        if let Err(e) = self.aggregator.validate() {
            warn!("Invalid aggregator config ({e}), using defaults");
            self.aggregator = AggregatorConfig::default();
        }
        if let Err(e) = self.battle.validate() {
            warn!("Invalid battle config ({e}), using defaults");
            self.battle = BattleConfig::default();
        }
        if let Err(e) = self.crafting.validate() {
            warn!("Invalid crafting config ({e}), using defaults");
            self.crafting = CraftingConfig::default();
        }
        if let Err(e) = self.progression.validate() {
            warn!("Invalid progression config ({e}), using defaults");
            self.progression = ProgressionConfig::default();
        }

        self.demo.encounters = self.demo.encounters.clamp(1, 1000);
    }
}
