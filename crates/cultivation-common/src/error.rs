//! Error types for the cultivation engine.

use crate::ids::{ItemId, SkillId, TemplateId, UserId};
use thiserror::Error;

/// Top-level error type for engine operations.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CultivationError {
    /// Malformed stat, skill, item or config data
    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigurationError),

    /// Action rejected for the caller
    #[error("Not eligible: {0}")]
    Eligibility(#[from] EligibilityError),

    /// Crafting table failed validation
    #[error("Invalid recipe: {0}")]
    InvalidRecipe(#[from] InvalidRecipeError),

    /// Exp cap exceeded or action on cooldown
    #[error("Rate limited: {0}")]
    RateLimited(#[from] RateLimitedError),

    /// Optimistic version mismatch on a persisted record
    #[error("Concurrency conflict: {0}")]
    Conflict(#[from] ConcurrencyConflict),

    /// Persisted document could not be encoded or decoded
    #[error("Storage error: {0}")]
    Storage(String),
}

/// Stable machine-readable error kinds, for rendering user-facing messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// See [`ConfigurationError`].
    Configuration,
    /// See [`EligibilityError`].
    Eligibility,
    /// See [`InvalidRecipeError`].
    InvalidRecipe,
    /// See [`RateLimitedError`].
    RateLimited,
    /// See [`ConcurrencyConflict`].
    Conflict,
    /// Storage encode/decode failure.
    Storage,
}

impl CultivationError {
    /// Returns the error kind.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::Configuration(_) => ErrorKind::Configuration,
            Self::Eligibility(_) => ErrorKind::Eligibility,
            Self::InvalidRecipe(_) => ErrorKind::InvalidRecipe,
            Self::RateLimited(_) => ErrorKind::RateLimited,
            Self::Conflict(_) => ErrorKind::Conflict,
            Self::Storage(_) => ErrorKind::Storage,
        }
    }

    /// Whether the error is a transient conflict worth retrying.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Conflict(_))
    }
}

/// Malformed input data. Indicates an upstream data bug and is never recovered.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigurationError {
    /// A stat is negative or not a finite number
    #[error("stat `{stat}` has invalid value {value}")]
    InvalidStat {
        /// Stat name
        stat: &'static str,
        /// Offending value
        value: f64,
    },

    /// A combatant has no health pool
    #[error("combatant `{name}` has non-positive max health {max_health}")]
    NonPositiveHealth {
        /// Combatant name
        name: String,
        /// Offending value
        max_health: f64,
    },

    /// Skill definition is malformed
    #[error("skill {skill:?} is malformed: {reason}")]
    InvalidSkill {
        /// Skill identifier
        skill: SkillId,
        /// What is wrong
        reason: String,
    },

    /// Equipment item or template is malformed
    #[error("item template {template:?} is malformed: {reason}")]
    InvalidItem {
        /// Template identifier
        template: TemplateId,
        /// What is wrong
        reason: String,
    },

    /// Realm or sub-level outside the supported range
    #[error("realm {realm} sub-level {sub_level} is out of range")]
    InvalidRealm {
        /// Realm level
        realm: u32,
        /// Sub-level
        sub_level: u32,
    },

    /// Any other invalid setting
    #[error("{0}")]
    Invalid(String),
}

/// The caller is not allowed to perform the action. Surfaced, never retried.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EligibilityError {
    /// Item requires a higher realm
    #[error("item requires realm {required}, current realm is {current}")]
    RealmLocked {
        /// Required realm level
        required: u32,
        /// Caller's realm level
        current: u32,
    },

    /// Not enough zhen-yuan for a skill
    #[error("insufficient resource: need {needed}, have {have}")]
    InsufficientResource {
        /// Amount needed
        needed: u64,
        /// Amount available
        have: u64,
    },

    /// Not enough of a material
    #[error("insufficient material {template:?}: need {needed}, have {have}")]
    InsufficientMaterial {
        /// Material template
        template: TemplateId,
        /// Amount needed
        needed: u32,
        /// Amount available
        have: u32,
    },

    /// Item is not in the caller's inventory
    #[error("item {0:?} is not owned")]
    ItemNotOwned(ItemId),

    /// Equipped items cannot be sold
    #[error("item {0:?} is equipped")]
    ItemEquipped(ItemId),

    /// Item cannot be enhanced any further
    #[error("item {0:?} is already at max enhancement")]
    MaxEnhancement(ItemId),

    /// No progression record exists for the user
    #[error("no progression record for {0}")]
    UnknownUser(UserId),

    /// Breakthrough preconditions not met
    #[error("breakthrough not ready: {0}")]
    BreakthroughNotReady(String),
}

/// A crafting table failed validation. No materials are consumed.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum InvalidRecipeError {
    /// No materials were selected
    #[error("no materials selected")]
    NoMaterials,

    /// Total table weight is zero
    #[error("base-points table has zero total weight")]
    ZeroWeight,

    /// A material references a stat that does not exist
    #[error("unknown stat key `{0}`")]
    UnknownStat(String),
}

/// A gated action was refused. Carries enough data to inform the user.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RateLimitedError {
    /// Experience cap for the current window is exhausted
    #[error("exp cap exceeded: {remaining} remaining, window resets at {resets_at_ms}")]
    ExpCapExceeded {
        /// Experience still grantable in this window
        remaining: u64,
        /// Unix millis when the window rolls over
        resets_at_ms: i64,
    },

    /// Action is still cooling down
    #[error("action on cooldown for {remaining_ms}ms")]
    OnCooldown {
        /// Milliseconds until the action is available
        remaining_ms: i64,
    },
}

/// Version mismatch on an optimistic write.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("expected version {expected}, found {actual} after {attempts} attempt(s)")]
pub struct ConcurrencyConflict {
    /// Version the writer read
    pub expected: u64,
    /// Version currently stored
    pub actual: u64,
    /// Attempts made so far
    pub attempts: u32,
}

/// Result type alias for engine operations.
pub type CultivationResult<T> = Result<T, CultivationError>;
