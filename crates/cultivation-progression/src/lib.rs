//! # Cultivation Progression
//!
//! Concurrency-safe progression gates for the cultivation engine.
//!
//! This crate provides:
//! - Atomic counter primitives behind the [`CounterStore`] trait
//! - Rolling-window experience caps
//! - Calendar keys and lazy daily/weekly resets
//! - Quest boards with two-phase progress and completion
//! - The persisted progression record and its versioned store
//! - Optimistic retry and the progression service

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(clippy::unwrap_used)]

pub mod calendar;
pub mod counter_store;
pub mod exp_cap;
pub mod item_use;
pub mod quest;
pub mod record;
pub mod retry;
pub mod service;
pub mod store;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::calendar::*;
    pub use crate::counter_store::*;
    pub use crate::exp_cap::*;
    pub use crate::item_use::*;
    pub use crate::quest::*;
    pub use crate::record::*;
    pub use crate::retry::*;
    pub use crate::service::*;
    pub use crate::store::*;
}

pub use prelude::*;
