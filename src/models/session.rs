use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ResetScope;

/// How a tracked task ended. Stored as a string in the session log, so the
/// variants round-trip through `as_str`/`from_str`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum EndAction {
    Submitted,
    Skipped,
    Released,
    Expired,
    Discarded,
    ManualReset(ResetScope),
    MidnightReset,
}

impl EndAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            EndAction::Submitted => "submitted",
            EndAction::Skipped => "skipped",
            EndAction::Released => "released",
            EndAction::Expired => "expired",
            EndAction::Discarded => "discarded",
            EndAction::ManualReset(ResetScope::Timer) => "manual_reset_timer",
            EndAction::ManualReset(ResetScope::Counter) => "manual_reset_counter",
            EndAction::ManualReset(ResetScope::Both) => "manual_reset_both",
            EndAction::MidnightReset => "midnight_reset",
        }
    }

    pub fn from_str(value: &str) -> Option<Self> {
        match value {
            "submitted" => Some(EndAction::Submitted),
            "skipped" => Some(EndAction::Skipped),
            "released" => Some(EndAction::Released),
            "expired" => Some(EndAction::Expired),
            "discarded" => Some(EndAction::Discarded),
            "manual_reset_timer" => Some(EndAction::ManualReset(ResetScope::Timer)),
            "manual_reset_counter" => Some(EndAction::ManualReset(ResetScope::Counter)),
            "manual_reset_both" => Some(EndAction::ManualReset(ResetScope::Both)),
            "midnight_reset" => Some(EndAction::MidnightReset),
            _ => None,
        }
    }
}

/// One entry in the append-only session log, written whenever a task ends
/// by any means.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionRecord {
    pub id: String,
    pub task_id: String,
    pub ended_at: DateTime<Utc>,
    pub duration_seconds: u64,
    pub action: EndAction,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn end_action_round_trips_through_strings() {
        let actions = [
            EndAction::Submitted,
            EndAction::Skipped,
            EndAction::Released,
            EndAction::Expired,
            EndAction::Discarded,
            EndAction::ManualReset(ResetScope::Timer),
            EndAction::ManualReset(ResetScope::Counter),
            EndAction::ManualReset(ResetScope::Both),
            EndAction::MidnightReset,
        ];
        for action in actions {
            assert_eq!(EndAction::from_str(action.as_str()), Some(action));
        }
        assert_eq!(EndAction::from_str("vanished"), None);
    }
}
