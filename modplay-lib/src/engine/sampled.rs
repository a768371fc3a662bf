//! [`DecodeEngine`] over sampled audio files, backed by Symphonia.
//!
//! Sampled files carry no patterns or instruments, so only the transport
//! side of the contract is meaningful. Reaching the end of the stream
//! rewinds and bumps the loop count, which lets the session's loop flag
//! decide whether the file repeats.

use std::collections::VecDeque;
use std::fs::File;
use std::path::Path;

use log::{debug, warn};
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{Decoder, DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error;
use symphonia::core::formats::{FormatOptions, FormatReader, SeekMode, SeekTo};
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use symphonia::core::units::{Time, TimeBase};

use crate::audio::buffer::FrameBatch;
use crate::error::EngineError;

use super::{DecodeEngine, MixerParameter, ModuleVars};

/// Extensions handled by Symphonia's default feature set.
const SUPPORTED_EXTENSIONS: [&str; 7] = ["wav", "flac", "ogg", "oga", "mka", "mkv", "webm"];

/// State for one opened file.
struct Loaded {
    name: String,
    extension: String,
    format: Box<dyn FormatReader>,
    decoder: Box<dyn Decoder>,
    track_id: u32,
    time_base: Option<TimeBase>,
    duration_ms: u32,
    sample_rate: u32,
    channels: u16,
}

/// Engine for plain audio files.
#[derive(Default)]
pub struct SampledEngine {
    loaded: Option<Loaded>,
    pending: VecDeque<i16>,
    mono: bool,
    separation: u8,
    muted: [bool; 2],
    loops: u32,
    elapsed_ms: u32,
}

impl SampledEngine {
    pub fn new() -> Self {
        Self {
            separation: 100,
            ..Self::default()
        }
    }
}

fn extension_of(path: &str) -> Option<String> {
    Path::new(path)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_lowercase())
}

fn time_to_ms(time: Time) -> u32 {
    (time.seconds * 1000 + (time.frac * 1000.0) as u64) as u32
}

fn open(path: &str) -> Result<Loaded, EngineError> {
    let load_err = |reason: String| EngineError::Load {
        path: path.to_string(),
        reason,
    };

    let src = File::open(path)?;
    let mss = MediaSourceStream::new(Box::new(src), Default::default());

    let mut hint = Hint::new();
    let extension = extension_of(path).unwrap_or_default();
    hint.with_extension(&extension);

    let opened = symphonia::default::get_probe()
        .format(
            &hint,
            mss,
            &FormatOptions::default(),
            &MetadataOptions::default(),
        )
        .map_err(|err| load_err(err.to_string()))?;
    let mut format = opened.format;

    let track = format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        .ok_or_else(|| load_err("no supported audio tracks".to_string()))?;
    let params = track.codec_params.clone();
    let track_id = track.id;

    let decoder = symphonia::default::get_codecs()
        .make(&params, &DecoderOptions::default())
        .map_err(|err| load_err(err.to_string()))?;

    let duration_ms = match (params.time_base, params.n_frames) {
        (Some(tb), Some(frames)) => time_to_ms(tb.calc_time(params.start_ts + frames)),
        _ => 0,
    };

    let title = format.metadata().current().and_then(|rev| {
        rev.tags()
            .iter()
            .find(|tag| tag.key.eq_ignore_ascii_case("title"))
            .map(|tag| tag.value.to_string())
    });
    let name = title.unwrap_or_else(|| {
        Path::new(path)
            .file_stem()
            .and_then(|stem| stem.to_str())
            .unwrap_or(path)
            .to_string()
    });

    Ok(Loaded {
        name,
        extension,
        format,
        decoder,
        track_id,
        time_base: params.time_base,
        duration_ms,
        sample_rate: params.sample_rate.unwrap_or(44_100),
        channels: params.channels.map(|c| c.count() as u16).unwrap_or(2),
    })
}

impl SampledEngine {
    fn rewind(&mut self) -> Result<(), EngineError> {
        let loaded = self.loaded.as_mut().ok_or(EngineError::NotLoaded)?;
        loaded
            .format
            .seek(
                SeekMode::Coarse,
                SeekTo::Time {
                    time: Time::new(0, 0.0),
                    track_id: Some(loaded.track_id),
                },
            )
            .map_err(|err| EngineError::Decode(err.to_string()))?;
        loaded.decoder.reset();
        self.elapsed_ms = 0;
        Ok(())
    }

    /// Apply separation and mutes, then queue interleaved output samples.
    fn push_samples(&mut self, interleaved: &[i16], channels: usize) {
        let separation = self.separation.min(100) as i32;
        for frame in interleaved.chunks(channels.max(1)) {
            let left = frame[0] as i32;
            let right = if frame.len() > 1 { frame[1] as i32 } else { left };
            // Blend towards mono as separation drops.
            let mix_l = (left * (100 + separation) + right * (100 - separation)) / 200;
            let mix_r = (right * (100 + separation) + left * (100 - separation)) / 200;
            let mix_l = if self.muted[0] { 0 } else { mix_l };
            let mix_r = if self.muted[1] { 0 } else { mix_r };
            if self.mono {
                self.pending.push_back(((mix_l + mix_r) / 2) as i16);
            } else {
                self.pending.push_back(mix_l as i16);
                self.pending.push_back(mix_r as i16);
            }
        }
    }
}

impl DecodeEngine for SampledEngine {
    fn accepts(&self, path: &str) -> bool {
        let known = extension_of(path)
            .map(|ext| SUPPORTED_EXTENSIONS.contains(&ext.as_str()))
            .unwrap_or(false);
        known && Path::new(path).is_file()
    }

    fn load(&mut self, path: &str) -> Result<(), EngineError> {
        if !self.accepts(path) {
            return Err(EngineError::UnrecognizedFormat(path.to_string()));
        }
        self.loaded = Some(open(path)?);
        self.pending.clear();
        self.loops = 0;
        self.elapsed_ms = 0;
        Ok(())
    }

    fn release(&mut self) {
        self.loaded = None;
        self.pending.clear();
    }

    fn start(&mut self, _sample_rate: u32, channels: u16) -> Result<(), EngineError> {
        if self.loaded.is_none() {
            return Err(EngineError::NotLoaded);
        }
        // Output stays at the file's native rate; the sink resamples.
        self.mono = channels == 1;
        self.loops = 0;
        Ok(())
    }

    fn end(&mut self) {
        self.pending.clear();
    }

    fn decode_frame(&mut self) -> Result<(), EngineError> {
        loop {
            let loaded = self.loaded.as_mut().ok_or(EngineError::NotLoaded)?;
            let packet = match loaded.format.next_packet() {
                Ok(packet) => packet,
                Err(Error::IoError(err)) if err.kind() == std::io::ErrorKind::UnexpectedEof => {
                    self.loops += 1;
                    debug!("{}: end of stream, loop {}", loaded.name, self.loops);
                    self.rewind()?;
                    return Ok(());
                }
                Err(err) => return Err(EngineError::Decode(err.to_string())),
            };
            if packet.track_id() != loaded.track_id {
                continue;
            }
            if let Some(tb) = loaded.time_base {
                self.elapsed_ms = time_to_ms(tb.calc_time(packet.ts()));
            }

            match loaded.decoder.decode(&packet) {
                Ok(decoded) => {
                    let spec = *decoded.spec();
                    let mut buffer = SampleBuffer::<i16>::new(decoded.capacity() as u64, spec);
                    buffer.copy_interleaved_ref(decoded);
                    let channels = spec.channels.count();
                    self.push_samples(buffer.samples(), channels);
                    return Ok(());
                }
                Err(Error::DecodeError(err)) => {
                    warn!("decode error: {}", err);
                }
                Err(err) => return Err(EngineError::Decode(err.to_string())),
            }
        }
    }

    fn fill_buffer(&mut self, batch: &mut FrameBatch) -> usize {
        let (rate, channels) = match self.loaded.as_ref() {
            Some(loaded) => (loaded.sample_rate, if self.mono { 1 } else { 2 }),
            None => return 0,
        };
        batch.set_format(channels, rate);
        let out = batch.buffer_mut();
        let count = out.len().min(self.pending.len());
        for (slot, sample) in out.iter_mut().zip(self.pending.drain(..count)) {
            *slot = sample;
        }
        batch.set_filled_bytes(count * 2);
        count * 2
    }

    fn loop_count(&self) -> u32 {
        self.loops
    }

    fn seek(&mut self, ms: u32) {
        let Some(loaded) = self.loaded.as_mut() else {
            return;
        };
        let time = Time::new((ms / 1000) as u64, (ms % 1000) as f64 / 1000.0);
        let result = loaded.format.seek(
            SeekMode::Coarse,
            SeekTo::Time {
                time,
                track_id: Some(loaded.track_id),
            },
        );
        match result {
            Ok(_) => {
                loaded.decoder.reset();
                self.pending.clear();
                self.elapsed_ms = ms;
            }
            Err(err) => warn!("seek to {}ms failed: {}", ms, err),
        }
    }

    fn elapsed_ms(&self) -> u32 {
        self.elapsed_ms
    }

    fn set_mixer(&mut self, parameter: MixerParameter) {
        match parameter {
            MixerParameter::StereoSeparation(percent) => self.separation = percent.min(100),
            other => debug!("sampled engine ignores {:?}", other),
        }
    }

    fn mute(&mut self, channel: usize, muted: bool) -> bool {
        match self.muted.get_mut(channel) {
            Some(slot) => std::mem::replace(slot, muted),
            None => false,
        }
    }

    fn module_name(&self) -> String {
        self.loaded
            .as_ref()
            .map(|loaded| loaded.name.clone())
            .unwrap_or_default()
    }

    fn module_type(&self) -> String {
        self.loaded
            .as_ref()
            .map(|loaded| format!("sampled audio ({})", loaded.extension))
            .unwrap_or_default()
    }

    fn module_vars(&self) -> ModuleVars {
        match self.loaded.as_ref() {
            Some(loaded) => ModuleVars {
                duration_ms: loaded.duration_ms,
                channels: loaded.channels as u32,
                ..ModuleVars::default()
            },
            None => ModuleVars::default(),
        }
    }
}
