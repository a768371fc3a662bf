//! Playback configuration resolved once per session.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::engine::{DspFlags, Interpolation, MixerParameter};
use crate::error::SettingsError;

const BYTES_PER_SAMPLE: usize = 2;

/// User-facing playback settings.
///
/// Missing fields fall back to [`PlayerSettings::default`] when deserialized,
/// so partial JSON files are accepted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlayerSettings {
    /// Output sample rate in Hz.
    pub sample_rate: u32,
    /// Duration of one frame batch in milliseconds.
    pub buffer_ms: u32,
    pub stereo: bool,
    /// Engine amplification factor.
    pub amplification: u8,
    /// Stereo separation, 0 (mono) to 100 (full).
    pub pan_separation: u8,
    pub interpolation: Interpolation,
    /// When false, nearest-neighbour interpolation is forced.
    pub interpolate: bool,
    pub lowpass_filter: bool,
    pub watchdog_timeout_ms: u64,
    /// Wake interval of the paused loop for housekeeping.
    pub pause_poll_ms: u64,
}

impl Default for PlayerSettings {
    fn default() -> Self {
        Self {
            sample_rate: 44_100,
            buffer_ms: 500,
            stereo: true,
            amplification: 1,
            pan_separation: 70,
            interpolation: Interpolation::Linear,
            interpolate: true,
            lowpass_filter: true,
            watchdog_timeout_ms: 10_000,
            pause_poll_ms: 500,
        }
    }
}

impl PlayerSettings {
    /// Load settings from a JSON file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, SettingsError> {
        let text = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&text)?)
    }

    /// Write settings to a JSON file.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), SettingsError> {
        let text = serde_json::to_string_pretty(self)?;
        std::fs::write(path, text)?;
        Ok(())
    }

    pub fn channels(&self) -> u16 {
        if self.stereo {
            2
        } else {
            1
        }
    }

    /// Interpolation actually handed to the engine.
    pub fn effective_interpolation(&self) -> Interpolation {
        if self.interpolate {
            self.interpolation
        } else {
            Interpolation::Nearest
        }
    }

    pub fn dsp_flags(&self) -> DspFlags {
        DspFlags {
            lowpass: self.lowpass_filter,
        }
    }

    /// Mixer parameters applied after every successful load, in order.
    pub fn mixer_parameters(&self) -> [MixerParameter; 4] {
        [
            MixerParameter::Amplification(self.amplification),
            MixerParameter::StereoSeparation(self.pan_separation.min(100)),
            MixerParameter::Interpolation(self.effective_interpolation()),
            MixerParameter::Dsp(self.dsp_flags()),
        ]
    }

    /// Size in bytes of one frame batch.
    ///
    /// Derived from the buffer duration, aligned down to 4 bytes, and never
    /// smaller than the output device minimum.
    pub fn buffer_bytes(&self, device_min_bytes: usize) -> usize {
        let bytes = self.sample_rate as usize
            * self.channels() as usize
            * BYTES_PER_SAMPLE
            * self.buffer_ms as usize
            / 1000;
        (bytes & !0x3).max(device_min_bytes)
    }

    /// Number of i16 samples held by one frame batch.
    pub fn batch_samples(&self, device_min_bytes: usize) -> usize {
        self.buffer_bytes(device_min_bytes) / BYTES_PER_SAMPLE
    }

    pub fn watchdog_timeout(&self) -> Duration {
        Duration::from_millis(self.watchdog_timeout_ms)
    }

    pub fn pause_poll(&self) -> Duration {
        Duration::from_millis(self.pause_poll_ms.max(1))
    }
}
