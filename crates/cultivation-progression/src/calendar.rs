//! Calendar keys for daily and weekly resets.
//!
//! Keys are computed in a fixed UTC offset so every server agrees on when a
//! day or week starts.

use chrono::{DateTime, Datelike, FixedOffset, Utc};
use cultivation_common::ConfigurationError;
use serde::{Deserialize, Serialize};

/// Calendar settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CalendarConfig {
    /// Offset from UTC in minutes (default +08:00).
    pub utc_offset_minutes: i32,
}

impl Default for CalendarConfig {
    fn default() -> Self {
        Self {
            utc_offset_minutes: 8 * 60,
        }
    }
}

impl CalendarConfig {
    /// The configured offset.
    pub fn offset(&self) -> Result<FixedOffset, ConfigurationError> {
        FixedOffset::east_opt(self.utc_offset_minutes * 60).ok_or_else(|| {
            ConfigurationError::Invalid(format!(
                "utc offset {} minutes is out of range",
                self.utc_offset_minutes
            ))
        })
    }

    /// Keys for the instant `now_ms`.
    pub fn keys_at(&self, now_ms: i64) -> Result<CalendarKeys, ConfigurationError> {
        let utc = DateTime::<Utc>::from_timestamp_millis(now_ms)
            .ok_or_else(|| ConfigurationError::Invalid(format!("timestamp {now_ms} is out of range")))?;
        let local = utc.with_timezone(&self.offset()?);
        let week = local.iso_week();
        Ok(CalendarKeys {
            day: local.format("%Y-%m-%d").to_string(),
            week: format!("{}-W{:02}", week.year(), week.week()),
        })
    }
}

/// Day and week keys.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CalendarKeys {
    /// `YYYY-MM-DD`.
    pub day: String,
    /// ISO week, `YYYY-Www`.
    pub week: String,
}
