//! Error types shared across the playback service.
//!
//! None of these escape the [`crate::playback::player::ModPlayer`] control
//! surface; they exist so collaborators (engines, sinks, subscribers) can
//! report failures that the session then absorbs and logs.

use thiserror::Error;

/// Failure reported by a [`crate::engine::DecodeEngine`].
#[derive(Debug, Error)]
pub enum EngineError {
    /// The module ended normally; the frame loop treats this as end of track.
    #[error("end of module")]
    EndOfModule,
    #[error("no module loaded")]
    NotLoaded,
    #[error("unrecognized format: {0}")]
    UnrecognizedFormat(String),
    #[error("failed to load {path}: {reason}")]
    Load { path: String, reason: String },
    #[error("decode error: {0}")]
    Decode(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Failure reported by a [`crate::audio::sink::AudioSink`].
#[derive(Debug, Error)]
pub enum SinkError {
    #[error("no audio output device: {0}")]
    Unavailable(String),
    #[error("audio write failed: {0}")]
    Write(String),
}

/// Failure loading or saving [`crate::settings::PlayerSettings`].
#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid settings: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Failure constructing a [`crate::playback::queue::QueueManager`].
#[derive(Debug, Error, PartialEq, Eq)]
pub enum QueueError {
    #[error("a play queue needs at least one track")]
    Empty,
}

/// Failure delivering an event to one subscriber.
#[derive(Debug, Error)]
pub enum DeliveryError {
    /// The subscriber is gone and should be dropped from the registry.
    #[error("subscriber disconnected")]
    Disconnected,
    #[error("subscriber rejected event: {0}")]
    Rejected(String),
}
