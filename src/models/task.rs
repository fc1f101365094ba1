use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::reading::TimerReading;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum TaskStatus {
    Active,
    Paused,
}

/// The single task under observation in this engine instance. At most one
/// exists at a time; it is the only holder of pending, uncommitted seconds.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActiveTask {
    pub id: String,
    pub current_seconds: u64,
    pub limit_seconds: u64,
    pub last_observed_seconds: u64,
    pub status: TaskStatus,
    pub created_at: DateTime<Utc>,
}

impl ActiveTask {
    pub fn seed(id: String, reading: &TimerReading, now: DateTime<Utc>) -> Self {
        Self {
            id,
            current_seconds: reading.current_seconds,
            limit_seconds: reading.limit_seconds,
            last_observed_seconds: reading.current_seconds,
            status: TaskStatus::Active,
            created_at: now,
        }
    }

    pub fn remaining_seconds(&self) -> i64 {
        self.limit_seconds as i64 - self.current_seconds as i64
    }

    pub fn is_over_limit(&self) -> bool {
        self.limit_seconds > 0 && self.current_seconds >= self.limit_seconds
    }
}
