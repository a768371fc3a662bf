//! Helpers for handing PCM batches to `rodio`.

use rodio::buffer::SamplesBuffer;

use super::buffer::FrameBatch;

/// Convert one signed 16-bit sample to rodio's `f32` range.
pub fn i16_to_f32(sample: i16) -> f32 {
    sample as f32 / 32_768.0
}

/// Copy the valid part of a [`FrameBatch`] into an owned [`SamplesBuffer`].
///
/// # Example
/// ```rust
/// use modplay_lib::audio::buffer::FrameBatch;
/// use modplay_lib::audio::samples::to_samples_buffer;
/// use rodio::Source;
///
/// let mut batch = FrameBatch::new(4, 2, 48_000);
/// batch.buffer_mut().copy_from_slice(&[0, 16_384, -16_384, 0]);
/// batch.set_filled_bytes(8);
/// let buffer = to_samples_buffer(&batch);
/// assert_eq!(buffer.channels(), 2);
/// assert_eq!(buffer.count(), 4);
/// ```
pub fn to_samples_buffer(batch: &FrameBatch) -> SamplesBuffer {
    let samples: Vec<f32> = batch.samples().iter().copied().map(i16_to_f32).collect();
    SamplesBuffer::new(batch.channels(), batch.sample_rate(), samples)
}
