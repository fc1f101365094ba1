use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum ResetScope {
    Timer,
    Counter,
    Both,
}

impl ResetScope {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResetScope::Timer => "timer",
            ResetScope::Counter => "counter",
            ResetScope::Both => "both",
        }
    }

    pub fn includes_timer(&self) -> bool {
        matches!(self, ResetScope::Timer | ResetScope::Both)
    }

    pub fn includes_counter(&self) -> bool {
        matches!(self, ResetScope::Counter | ResetScope::Both)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum ResetSource {
    Manual,
    Auto,
    Midnight,
}

impl ResetSource {
    /// Auto and midnight resets are day boundaries: they snapshot the prior
    /// day into history and clear the ignore marker.
    pub fn is_rollover(&self) -> bool {
        matches!(self, ResetSource::Auto | ResetSource::Midnight)
    }
}
