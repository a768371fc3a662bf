//! Fixed-capacity sample batch exchanged between engine and sink.

/// One frame's worth of interleaved 16-bit PCM.
///
/// The backing storage is allocated once per session and reused for every
/// frame; only `len` changes between fills.
#[derive(Debug, Clone)]
pub struct FrameBatch {
    samples: Vec<i16>,
    len: usize,
    channels: u16,
    sample_rate: u32,
}

impl FrameBatch {
    /// Allocate a batch holding up to `capacity` samples.
    pub fn new(capacity: usize, channels: u16, sample_rate: u32) -> Self {
        Self {
            samples: vec![0; capacity],
            len: 0,
            channels: channels.max(1),
            sample_rate,
        }
    }

    pub fn capacity(&self) -> usize {
        self.samples.len()
    }

    pub fn channels(&self) -> u16 {
        self.channels
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Override the format of the data about to be written.
    ///
    /// Engines that cannot render at the requested rate report their native
    /// format here; the sink resamples.
    pub fn set_format(&mut self, channels: u16, sample_rate: u32) {
        self.channels = channels.max(1);
        self.sample_rate = sample_rate;
    }

    /// Whole backing buffer, for the engine to render into.
    pub fn buffer_mut(&mut self) -> &mut [i16] {
        &mut self.samples
    }

    /// Mark the first `bytes` bytes as valid. Clamped to capacity.
    pub fn set_filled_bytes(&mut self, bytes: usize) {
        self.len = (bytes / 2).min(self.samples.len());
    }

    pub fn clear(&mut self) {
        self.len = 0;
    }

    /// Valid samples from the last fill.
    pub fn samples(&self) -> &[i16] {
        &self.samples[..self.len]
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn byte_len(&self) -> usize {
        self.len * 2
    }

    /// Playback duration of the valid samples.
    pub fn duration(&self) -> std::time::Duration {
        if self.sample_rate == 0 {
            return std::time::Duration::ZERO;
        }
        let frames = self.len as u64 / self.channels as u64;
        std::time::Duration::from_micros(frames * 1_000_000 / self.sample_rate as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::FrameBatch;
    use std::time::Duration;

    #[test]
    fn filled_bytes_are_clamped_to_capacity() {
        let mut batch = FrameBatch::new(8, 2, 44_100);
        batch.set_filled_bytes(6);
        assert_eq!(batch.len(), 3);
        batch.set_filled_bytes(1_000);
        assert_eq!(batch.len(), 8);
        assert_eq!(batch.byte_len(), 16);
    }

    #[test]
    fn duration_counts_frames_not_samples() {
        let mut batch = FrameBatch::new(2_000, 2, 1_000);
        batch.set_filled_bytes(2_000 * 2);
        assert_eq!(batch.duration(), Duration::from_secs(1));
    }
}
