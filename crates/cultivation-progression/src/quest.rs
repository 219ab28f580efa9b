//! Daily and weekly quest boards.
//!
//! Progress is applied in two passes: [`QuestBoard::increment`] bumps every
//! open quest matching an action, then [`QuestBoard::complete_ready`] marks
//! the ones that reached their target. A quest is completed at most once.

use cultivation_common::QuestId;
use serde::{Deserialize, Serialize};

/// Actions that advance quests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum QuestAction {
    /// Win a battle against a monster.
    DefeatMonster,
    /// Clear a dungeon run.
    ClearDungeon,
    /// Climb a tower floor.
    ClimbTower,
    /// Win a PK duel.
    WinDuel,
    /// Join a sect raid.
    SectRaid,
    /// Execute a craft.
    Craft,
    /// Gain experience through cultivation.
    Cultivate,
    /// Break through a realm.
    Breakthrough,
}

/// Which board a quest sits on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum QuestPeriod {
    /// Resets when the day key changes.
    Daily,
    /// Resets when the week key changes.
    Weekly,
}

/// One quest's progress.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestProgress {
    /// Quest identifier.
    pub quest: QuestId,
    /// Action that advances it.
    pub action: QuestAction,
    /// Progress so far; clamped to `required` on completion.
    pub progress: u32,
    /// Target count.
    pub required: u32,
    /// Whether the quest is done.
    pub completed: bool,
    /// Unix millis of completion.
    pub completed_at_ms: Option<i64>,
}

impl QuestProgress {
    /// Creates an open quest.
    #[must_use]
    pub fn new(quest: QuestId, action: QuestAction, required: u32) -> Self {
        Self {
            quest,
            action,
            progress: 0,
            required: required.max(1),
            completed: false,
            completed_at_ms: None,
        }
    }
}

/// Result of a progress update.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestUpdate {
    /// Quests whose progress changed.
    pub updated: Vec<QuestId>,
    /// Quests completed by this update.
    pub completed: Vec<QuestId>,
}

impl QuestUpdate {
    /// Check if nothing changed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.updated.is_empty() && self.completed.is_empty()
    }
}

/// A list of quests sharing a reset period.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestBoard {
    /// Quests on the board.
    pub quests: Vec<QuestProgress>,
}

impl QuestBoard {
    /// Creates an empty board.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a quest.
    #[must_use]
    pub fn with_quest(mut self, quest: QuestProgress) -> Self {
        self.quests.push(quest);
        self
    }

    /// Looks up a quest.
    #[must_use]
    pub fn get(&self, quest: QuestId) -> Option<&QuestProgress> {
        self.quests.iter().find(|q| q.quest == quest)
    }

    /// Adds `count` to every open quest matching `action`.
    pub fn increment(&mut self, action: QuestAction, count: u32) -> Vec<QuestId> {
        if count == 0 {
            return Vec::new();
        }
        self.quests
            .iter_mut()
            .filter(|q| q.action == action && !q.completed)
            .map(|q| {
                q.progress = q.progress.saturating_add(count);
                q.quest
            })
            .collect()
    }

    /// Completes every open quest that reached its target.
    pub fn complete_ready(&mut self, now_ms: i64) -> Vec<QuestId> {
        self.quests
            .iter_mut()
            .filter(|q| !q.completed && q.progress >= q.required)
            .map(|q| {
                q.completed = true;
                q.completed_at_ms = Some(now_ms);
                q.progress = q.required;
                q.quest
            })
            .collect()
    }

    /// Clears all progress for a new period.
    pub fn reset(&mut self) {
        for quest in &mut self.quests {
            quest.progress = 0;
            quest.completed = false;
            quest.completed_at_ms = None;
        }
    }
}
