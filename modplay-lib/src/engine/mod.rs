//! Decode-engine contract consumed by the playback session.
//!
//! The session never decodes anything itself; it drives an engine one frame
//! at a time and forwards the rendered batches to the sink. Telemetry
//! accessors have empty defaults so engines without tracker data (sampled
//! audio, test doubles) only implement the transport calls.

mod sampled;

use serde::{Deserialize, Serialize};

use crate::audio::buffer::FrameBatch;
use crate::error::EngineError;

pub use sampled::SampledEngine;

/// Number of mixer channels unmuted when a module starts.
pub const MAX_CHANNELS: usize = 64;

/// Resampling interpolation used by the mixer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Interpolation {
    Nearest,
    #[default]
    Linear,
    Spline,
}

/// DSP effects applied after mixing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DspFlags {
    pub lowpass: bool,
}

/// One mixer setting pushed to the engine after a module loads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MixerParameter {
    Amplification(u8),
    /// Percentage of stereo separation, 0..=100.
    StereoSeparation(u8),
    Interpolation(Interpolation),
    Dsp(DspFlags),
}

/// Position snapshot: order, pattern, row, rows in pattern, frame, speed, bpm.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct FrameInfo {
    pub order: u32,
    pub pattern: u32,
    pub row: u32,
    pub num_rows: u32,
    pub frame: u32,
    pub speed: u32,
    pub bpm: u32,
}

/// Static properties of the loaded module.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct ModuleVars {
    pub duration_ms: u32,
    pub length: u32,
    pub patterns: u32,
    pub channels: u32,
    pub instruments: u32,
    pub samples: u32,
}

/// Per-channel mixer state for visualizers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct ChannelSnapshot {
    pub volume: u32,
    pub final_volume: u32,
    pub pan: i32,
    pub instrument: i32,
    pub key: i32,
    pub period: u32,
}

/// Notes and instruments of one pattern row, one byte per channel.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PatternRow {
    pub notes: Vec<u8>,
    pub instruments: Vec<u8>,
}

/// Parameters for a waveform excerpt of a playing sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SampleRequest {
    pub trigger: bool,
    pub instrument: i32,
    pub key: i32,
    pub period: u32,
    pub channel: usize,
    pub width: usize,
}

/// Frame-oriented decoder driven by the session thread.
///
/// Calls arrive under the session's engine lock, so implementations see a
/// single caller at a time.
pub trait DecodeEngine: Send {
    /// Cheap format check run before `load`.
    fn accepts(&self, path: &str) -> bool;
    fn load(&mut self, path: &str) -> Result<(), EngineError>;
    /// Free everything held for the loaded module.
    fn release(&mut self);
    /// Prepare rendering at the given output format.
    fn start(&mut self, sample_rate: u32, channels: u16) -> Result<(), EngineError>;
    fn end(&mut self);
    /// Advance one frame. Any error ends the current track.
    fn decode_frame(&mut self) -> Result<(), EngineError>;
    /// Render the last decoded frame into `batch`; returns bytes written.
    fn fill_buffer(&mut self, batch: &mut FrameBatch) -> usize;
    /// How many times playback has wrapped to the module's restart point.
    fn loop_count(&self) -> u32;
    fn seek(&mut self, ms: u32);
    fn elapsed_ms(&self) -> u32;
    fn set_mixer(&mut self, parameter: MixerParameter);
    /// Set a channel's mute state; returns the previous state.
    fn mute(&mut self, channel: usize, muted: bool) -> bool;

    fn module_name(&self) -> String;

    fn module_type(&self) -> String {
        String::new()
    }

    fn instruments(&self) -> Vec<String> {
        Vec::new()
    }

    fn frame_info(&self) -> FrameInfo {
        FrameInfo::default()
    }

    fn module_vars(&self) -> ModuleVars {
        ModuleVars::default()
    }

    fn channel_data(&self) -> Vec<ChannelSnapshot> {
        Vec::new()
    }

    /// Write a waveform excerpt into `out`; leaves it untouched by default.
    fn sample_data(&self, _request: &SampleRequest, _out: &mut [u8]) {}

    fn pattern_row(&self, _pattern: usize, _row: usize) -> Option<PatternRow> {
        None
    }
}
