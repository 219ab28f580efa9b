//! Crafting error types.

use cultivation_common::{ConfigurationError, CultivationError, EligibilityError, InvalidRecipeError};
use thiserror::Error;

/// Crafting error types.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CraftingError {
    /// Selections do not form a valid recipe
    #[error("Invalid recipe: {0}")]
    Recipe(#[from] InvalidRecipeError),
    /// Selections are not owned
    #[error("Not eligible: {0}")]
    Eligibility(#[from] EligibilityError),
    /// Produced item could not be generated
    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigurationError),
}

/// Result type for crafting operations.
pub type CraftingResult<T> = Result<T, CraftingError>;

impl From<CraftingError> for CultivationError {
    fn from(err: CraftingError) -> Self {
        match err {
            CraftingError::Recipe(e) => Self::InvalidRecipe(e),
            CraftingError::Eligibility(e) => Self::Eligibility(e),
            CraftingError::Configuration(e) => Self::Configuration(e),
        }
    }
}
