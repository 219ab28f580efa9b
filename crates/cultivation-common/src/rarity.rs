//! Item and material rarity tiers.

use serde::{Deserialize, Serialize};

/// Rarity tiers, ordered from lowest to highest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Rarity {
    /// Common.
    Common = 0,
    /// Uncommon.
    Uncommon = 1,
    /// Rare.
    Rare = 2,
    /// Epic.
    Epic = 3,
    /// Legendary.
    Legendary = 4,
    /// Mythic.
    Mythic = 5,
}

impl Rarity {
    /// All tiers in ascending order.
    pub const ALL: [Self; 6] = [
        Self::Common,
        Self::Uncommon,
        Self::Rare,
        Self::Epic,
        Self::Legendary,
        Self::Mythic,
    ];

    /// Returns the display name for this rarity tier.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Common => "Common",
            Self::Uncommon => "Uncommon",
            Self::Rare => "Rare",
            Self::Epic => "Epic",
            Self::Legendary => "Legendary",
            Self::Mythic => "Mythic",
        }
    }

    /// The next tier up, or `None` at the top.
    #[must_use]
    pub const fn next(self) -> Option<Self> {
        match self {
            Self::Common => Some(Self::Uncommon),
            Self::Uncommon => Some(Self::Rare),
            Self::Rare => Some(Self::Epic),
            Self::Epic => Some(Self::Legendary),
            Self::Legendary => Some(Self::Mythic),
            Self::Mythic => None,
        }
    }

    /// Weight of a material of this rarity in a base-points table.
    #[must_use]
    pub const fn craft_weight(self) -> u32 {
        match self {
            Self::Common => 1,
            Self::Uncommon => 2,
            Self::Rare => 3,
            Self::Epic => 5,
            Self::Legendary => 8,
            Self::Mythic => 13,
        }
    }

    /// Stat multiplier for generated items.
    #[must_use]
    pub const fn stat_multiplier(self) -> f64 {
        match self {
            Self::Common => 1.0,
            Self::Uncommon => 1.2,
            Self::Rare => 1.5,
            Self::Epic => 2.0,
            Self::Legendary => 2.8,
            Self::Mythic => 4.0,
        }
    }

    /// Number of stat lines a crafted item of this rarity carries.
    #[must_use]
    pub const fn stat_lines(self) -> usize {
        match self {
            Self::Common | Self::Uncommon => 1,
            Self::Rare => 2,
            Self::Epic => 3,
            Self::Legendary => 4,
            Self::Mythic => 5,
        }
    }
}
