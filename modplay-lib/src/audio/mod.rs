//! PCM batches and audio output.

pub mod buffer;
pub mod samples;
pub mod sink;
