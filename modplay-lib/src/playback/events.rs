//! Lifecycle events delivered to subscribers.

use serde::Serialize;

/// Why a session stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EndReason {
    /// The last track finished and the list does not loop.
    QueueExhausted,
    /// A stop command (API or transport key).
    Stopped,
    /// The decode loop stopped refreshing the watchdog.
    Watchdog,
    /// No audio output could be opened.
    OutputUnavailable,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum PlayerEvent {
    TrackStarted {
        name: String,
        instruments: Vec<String>,
    },
    TrackEnded {
        name: String,
    },
    SessionEnded {
        reason: EndReason,
    },
}

impl PlayerEvent {
    /// JSON form used by line-oriented consumers.
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }
}
