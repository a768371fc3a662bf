//! # modplay
//!
//! Background playback orchestration for tracker module players. The
//! library owns the playback lifecycle: a single session thread drives a
//! frame-oriented [`engine::DecodeEngine`] into an [`audio::sink::AudioSink`],
//! walks a play queue, survives telephony and media-key interruptions, and
//! recovers from a hung engine through a watchdog. Observers subscribe to
//! lifecycle events through [`playback::broadcast`].
//!
//! ```no_run
//! use modplay_lib::engine::SampledEngine;
//! use modplay_lib::playback::player::ModPlayer;
//! use modplay_lib::settings::PlayerSettings;
//!
//! let player = ModPlayer::new(Box::new(SampledEngine::new()), PlayerSettings::default());
//! player.play(vec!["intro.flac".to_string()], 0, false, false);
//! player.wait_until_finished(std::time::Duration::from_secs(600));
//! ```

pub mod audio;
pub mod diagnostics;
pub mod engine;
pub mod error;
pub mod playback;
pub mod settings;

pub use error::{DeliveryError, EngineError, QueueError, SettingsError, SinkError};
pub use playback::events::{EndReason, PlayerEvent};
pub use playback::player::{ModPlayer, SessionState};
