//! The persisted per-user progression record and its binary encoding.

use crate::quest::{QuestBoard, QuestPeriod};
use cultivation_combat::{ActiveBoost, CultivatorProfile, EquipmentInventory};
use cultivation_common::{CultivationError, CultivationResult, UserId};
use cultivation_crafting::MaterialInventory;
use serde::{Deserialize, Serialize};

/// Current record format version.
pub const RECORD_FORMAT: u32 = 1;

/// Magic bytes at the start of every encoded record.
const RECORD_MAGIC: [u8; 4] = *b"CVPR";

/// Everything the engine persists for one user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressionRecord {
    /// Format version.
    pub format: u32,
    /// Owner.
    pub user: UserId,
    /// Realm level.
    pub realm: u32,
    /// Sub-level within the realm.
    pub sub_level: u32,
    /// Experience toward the next sub-level.
    pub experience: u64,
    /// Owned equipment; equipped items form the loadout.
    pub equipment: EquipmentInventory,
    /// Owned materials.
    pub materials: MaterialInventory,
    /// Timed boosts.
    pub boosts: Vec<ActiveBoost>,
    /// Daily quests.
    pub daily: QuestBoard,
    /// Weekly quests.
    pub weekly: QuestBoard,
    /// Day key the daily board belongs to.
    pub day_key: String,
    /// Week key the weekly board belongs to.
    pub week_key: String,
}

impl ProgressionRecord {
    /// Creates a fresh record at realm 1, sub-level 1.
    #[must_use]
    pub fn new(user: UserId) -> Self {
        Self {
            format: RECORD_FORMAT,
            user,
            realm: 1,
            sub_level: 1,
            experience: 0,
            equipment: EquipmentInventory::new(),
            materials: MaterialInventory::new(),
            boosts: Vec::new(),
            daily: QuestBoard::new(),
            weekly: QuestBoard::new(),
            day_key: String::new(),
            week_key: String::new(),
        }
    }

    /// Set the daily board.
    #[must_use]
    pub fn with_daily(mut self, board: QuestBoard) -> Self {
        self.daily = board;
        self
    }

    /// Set the weekly board.
    #[must_use]
    pub fn with_weekly(mut self, board: QuestBoard) -> Self {
        self.weekly = board;
        self
    }

    /// The board for a period.
    pub fn board_mut(&mut self, period: QuestPeriod) -> &mut QuestBoard {
        match period {
            QuestPeriod::Daily => &mut self.daily,
            QuestPeriod::Weekly => &mut self.weekly,
        }
    }

    /// Snapshot for stat resolution.
    #[must_use]
    pub fn to_profile(&self) -> CultivatorProfile {
        let mut profile = CultivatorProfile::new(self.realm, self.sub_level);
        profile.equipment = self.equipment.clone();
        profile.boosts = self.boosts.clone();
        profile
    }

    /// Encodes to bytes.
    pub fn to_bytes(&self) -> CultivationResult<Vec<u8>> {
        let mut buffer = Vec::from(RECORD_MAGIC);
        let data = bincode::serialize(self).map_err(|e| CultivationError::Storage(e.to_string()))?;
        buffer.extend(data);
        Ok(buffer)
    }

    /// Decodes from bytes, rejecting unknown magic and newer formats.
    pub fn from_bytes(bytes: &[u8]) -> CultivationResult<Self> {
        if bytes.len() < RECORD_MAGIC.len() || bytes[..RECORD_MAGIC.len()] != RECORD_MAGIC {
            return Err(CultivationError::Storage("invalid record header".to_string()));
        }
        let record: Self = bincode::deserialize(&bytes[RECORD_MAGIC.len()..])
            .map_err(|e| CultivationError::Storage(format!("corrupted record: {e}")))?;
        if record.format > RECORD_FORMAT {
            return Err(CultivationError::Storage(format!(
                "record format {} is newer than {}",
                record.format, RECORD_FORMAT
            )));
        }
        Ok(record)
    }
}
