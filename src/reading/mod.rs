mod parser;

pub use parser::{page_indicates_expired, parse_timer_text, DEFAULT_LIMIT_SECONDS};

use serde::{Deserialize, Serialize};

/// One parsed sample of the page's displayed elapsed/limit time. Created
/// fresh on every sampling tick, never persisted.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TimerReading {
    pub current_seconds: u64,
    pub limit_seconds: u64,
}

impl TimerReading {
    pub fn new(current_seconds: u64, limit_seconds: u64) -> Self {
        Self {
            current_seconds,
            limit_seconds,
        }
    }

    /// Negative once the task has overrun its limit.
    pub fn remaining_seconds(&self) -> i64 {
        self.limit_seconds as i64 - self.current_seconds as i64
    }
}
