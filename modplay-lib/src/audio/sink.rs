//! Audio output abstraction used by the session loop.
//!
//! A sink is created on the session thread through a [`SinkFactory`] and
//! never leaves it, so implementations do not need to be `Send`.

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use log::{error, warn};
use rodio::{OutputStream, OutputStreamBuilder, Sink};

use crate::error::SinkError;

use super::buffer::FrameBatch;
use super::samples::to_samples_buffer;

const OUTPUT_STREAM_OPEN_RETRIES: usize = 20;
const OUTPUT_STREAM_OPEN_RETRY_MS: u64 = 100;
const MAX_QUEUED_BATCHES: usize = 2;
const BACKPRESSURE_POLL_MS: u64 = 5;
/// Smallest batch the device is fed, in milliseconds of audio.
const DEVICE_MIN_BUFFER_MS: usize = 50;

/// Output format requested when a sink is opened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SinkSpec {
    pub sample_rate: u32,
    pub channels: u16,
}

/// Destination for decoded frame batches.
pub trait AudioSink {
    fn play(&mut self);
    fn pause(&mut self);
    /// Drop anything still queued and halt output.
    fn stop(&mut self);
    /// Queue one batch, blocking while the device buffer is full.
    ///
    /// Returns the number of bytes accepted.
    fn write(&mut self, batch: &FrameBatch) -> Result<usize, SinkError>;
    /// Smallest batch size in bytes the device can be fed without underruns.
    fn min_buffer_bytes(&self) -> usize {
        0
    }
}

/// Creates a sink on the session thread at session start.
pub type SinkFactory =
    Arc<dyn Fn(&SinkSpec) -> Result<Box<dyn AudioSink>, SinkError> + Send + Sync>;

/// Factory for the default output device.
pub fn default_sink_factory() -> SinkFactory {
    Arc::new(|spec: &SinkSpec| {
        RodioSink::open(*spec).map(|sink| Box::new(sink) as Box<dyn AudioSink>)
    })
}

/// Factory for a [`NullSink`], optionally paced in real time.
pub fn null_sink_factory(realtime: bool) -> SinkFactory {
    Arc::new(move |_spec: &SinkSpec| Ok(Box::new(NullSink::new(realtime)) as Box<dyn AudioSink>))
}

/// Sink backed by the default `rodio` output stream.
pub struct RodioSink {
    stream: OutputStream,
    sink: Sink,
    spec: SinkSpec,
}

impl RodioSink {
    /// Open the default device, retrying while it is busy.
    pub fn open(spec: SinkSpec) -> Result<Self, SinkError> {
        let mut stream = open_output_stream_with_retry()?;
        stream.log_on_drop(false);
        let sink = Sink::connect_new(stream.mixer());
        sink.pause();
        Ok(Self { stream, sink, spec })
    }

    /// Replace the sink so a stopped device accepts new batches.
    fn reconnect(&mut self) {
        self.sink = Sink::connect_new(self.stream.mixer());
        self.sink.pause();
    }
}

impl AudioSink for RodioSink {
    fn play(&mut self) {
        self.sink.play();
    }

    fn pause(&mut self) {
        self.sink.pause();
    }

    fn stop(&mut self) {
        self.sink.stop();
        self.reconnect();
    }

    fn write(&mut self, batch: &FrameBatch) -> Result<usize, SinkError> {
        if batch.is_empty() {
            return Ok(0);
        }
        while self.sink.len() >= MAX_QUEUED_BATCHES && !self.sink.is_paused() {
            thread::sleep(Duration::from_millis(BACKPRESSURE_POLL_MS));
        }
        self.sink.append(to_samples_buffer(batch));
        Ok(batch.byte_len())
    }

    fn min_buffer_bytes(&self) -> usize {
        self.spec.sample_rate as usize * self.spec.channels as usize * 2 * DEVICE_MIN_BUFFER_MS
            / 1000
    }
}

/// Open the default output stream with bounded retry behavior.
fn open_output_stream_with_retry() -> Result<OutputStream, SinkError> {
    let mut last_error = String::new();
    for attempt in 1..=OUTPUT_STREAM_OPEN_RETRIES {
        match OutputStreamBuilder::open_default_stream() {
            Ok(stream) => return Ok(stream),
            Err(err) => {
                last_error = err.to_string();
                if attempt == OUTPUT_STREAM_OPEN_RETRIES {
                    error!(
                        "failed to open default output stream after {} attempts: {}",
                        OUTPUT_STREAM_OPEN_RETRIES, err
                    );
                    break;
                }
                warn!(
                    "open_default_stream attempt {}/{} failed: {}",
                    attempt, OUTPUT_STREAM_OPEN_RETRIES, err
                );
                thread::sleep(Duration::from_millis(OUTPUT_STREAM_OPEN_RETRY_MS));
            }
        }
    }
    Err(SinkError::Unavailable(last_error))
}

/// Sink that discards audio. Used headless and in tests.
#[derive(Debug, Default)]
pub struct NullSink {
    realtime: bool,
    playing: bool,
    written_bytes: usize,
}

impl NullSink {
    /// With `realtime`, each write sleeps for the batch duration.
    pub fn new(realtime: bool) -> Self {
        Self {
            realtime,
            playing: false,
            written_bytes: 0,
        }
    }

    pub fn is_playing(&self) -> bool {
        self.playing
    }

    pub fn written_bytes(&self) -> usize {
        self.written_bytes
    }
}

impl AudioSink for NullSink {
    fn play(&mut self) {
        self.playing = true;
    }

    fn pause(&mut self) {
        self.playing = false;
    }

    fn stop(&mut self) {
        self.playing = false;
    }

    fn write(&mut self, batch: &FrameBatch) -> Result<usize, SinkError> {
        if self.realtime {
            thread::sleep(batch.duration());
        }
        self.written_bytes += batch.byte_len();
        Ok(batch.byte_len())
    }
}
