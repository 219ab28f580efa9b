//! # Cultivation Combat
//!
//! Combat systems for the cultivation engine.
//!
//! This crate provides everything between a persisted cultivator and a
//! finished encounter:
//! - Realm-based base stats and the resolved [`CombatStats`] snapshot
//! - Equipment items, durability and the equipped loadout
//! - Timed boosts and the modifier aggregator
//! - Status effects resolved onto working stats
//! - Skill definitions and the skill resolver
//! - The damage mitigation pipeline
//! - The round-based battle engine

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(clippy::unwrap_used)]

pub mod aggregator;
pub mod battle;
pub mod boost;
pub mod combatant;
pub mod damage;
pub mod effects;
pub mod equipment;
pub mod realm;
pub mod skills;
pub mod stats;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::aggregator::*;
    pub use crate::battle::*;
    pub use crate::boost::*;
    pub use crate::combatant::*;
    pub use crate::damage::*;
    pub use crate::effects::{
        apply_status_effects, ActiveEffect, EffectKind, EffectSpec,
    };
    pub use crate::equipment::*;
    pub use crate::realm::*;
    pub use crate::skills::*;
    pub use crate::stats::*;
}

pub use prelude::*;
