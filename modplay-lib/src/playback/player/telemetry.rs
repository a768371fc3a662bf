//! Read-only engine telemetry for visualizers.
//!
//! Every accessor goes through the engine slot's `live` flag: between
//! tracks, after a session ends, or after a watchdog stop the result is an
//! empty default instead of a read of released engine state.

use crate::engine::{ChannelSnapshot, FrameInfo, ModuleVars, PatternRow, SampleRequest};

use super::ModPlayer;

impl ModPlayer {
    /// Position snapshot of the playing module.
    pub fn info(&self) -> FrameInfo {
        self.engine
            .with_live(|engine| engine.frame_info())
            .unwrap_or_default()
    }

    pub fn module_vars(&self) -> ModuleVars {
        self.engine
            .with_live(|engine| engine.module_vars())
            .unwrap_or_default()
    }

    pub fn module_name(&self) -> String {
        self.engine
            .with_live(|engine| engine.module_name())
            .unwrap_or_default()
    }

    pub fn module_type(&self) -> String {
        self.engine
            .with_live(|engine| engine.module_type())
            .unwrap_or_default()
    }

    pub fn instruments(&self) -> Vec<String> {
        self.engine
            .with_live(|engine| engine.instruments())
            .unwrap_or_default()
    }

    pub fn channel_data(&self) -> Vec<ChannelSnapshot> {
        self.engine
            .with_live(|engine| engine.channel_data())
            .unwrap_or_default()
    }

    /// Copy a waveform excerpt into `out`; returns `false` when not playing.
    pub fn sample_data(&self, request: &SampleRequest, out: &mut [u8]) -> bool {
        self.engine
            .with_live(|engine| engine.sample_data(request, out))
            .is_some()
    }

    pub fn pattern_row(&self, pattern: usize, row: usize) -> Option<PatternRow> {
        self.engine
            .with_live(|engine| engine.pattern_row(pattern, row))
            .flatten()
    }
}
