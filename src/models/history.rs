use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Snapshot of one day's committed work, keyed by local calendar date.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntry {
    pub date: NaiveDate,
    pub total_seconds: u64,
    /// Seconds committed per local hour (0-23). Hours with nothing
    /// committed are absent.
    #[serde(default)]
    pub hourly: BTreeMap<u32, u64>,
}

impl HistoryEntry {
    pub fn new(date: NaiveDate, total_seconds: u64) -> Self {
        Self {
            date,
            total_seconds,
            hourly: BTreeMap::new(),
        }
    }
}
