//! Cultivation Engine - configuration, content and encounter orchestration.
//!
//! This crate provides what the `cultivation` binary runs on: the TOML engine
//! configuration, RON skill/monster/loot catalogs, and the encounter runner
//! that feeds battle results back into progression.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(clippy::unwrap_used)]

pub mod config;
pub mod content;
pub mod encounter;

pub use config::{ConfigFileError, DemoConfig, EngineConfig};
pub use content::{ContentError, ContentRegistry, ContentResult, ContentStore, MonsterDefinition};
pub use encounter::{craft_from_inventory, EncounterPlan, EncounterReport, EncounterRunner};
