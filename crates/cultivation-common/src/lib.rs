//! # Cultivation Common
//!
//! Common types, utilities, and shared abstractions for the cultivation engine.
//!
//! This crate provides foundational types used across all engine subsystems:
//! - ID types (UserId, CombatantId, ItemId, etc.)
//! - Stat keys, elements and rarity tiers
//! - Roll sources for seeded and scripted randomness
//! - Clocks for time-windowed gates
//! - The shared error taxonomy
//! - Prelude for convenient imports

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(clippy::unwrap_used)]

pub mod clock;
pub mod element;
pub mod error;
pub mod ids;
pub mod rarity;
pub mod rng;
pub mod stat;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::clock::*;
    pub use crate::element::*;
    pub use crate::error::*;
    pub use crate::ids::*;
    pub use crate::rarity::*;
    pub use crate::rng::*;
    pub use crate::stat::*;
}

pub use prelude::*;
