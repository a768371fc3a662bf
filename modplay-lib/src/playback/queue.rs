//! Navigable play queue backing a session.

use rand::seq::SliceRandom;
use rand::thread_rng;

use crate::error::QueueError;

/// Ordered track list with a cursor.
///
/// The cursor is always a valid index: construction rejects empty lists and
/// every navigation call clamps or wraps.
#[derive(Debug, Clone)]
pub struct QueueManager {
    tracks: Vec<String>,
    index: usize,
    start_index: usize,
    shuffle: bool,
    loop_list: bool,
}

impl QueueManager {
    /// Build a queue positioned at `start_index`.
    ///
    /// With `shuffle`, the requested start track is moved to the front and
    /// the rest of the list is shuffled once.
    pub fn new(
        tracks: Vec<String>,
        start_index: usize,
        shuffle: bool,
        loop_list: bool,
    ) -> Result<Self, QueueError> {
        if tracks.is_empty() {
            return Err(QueueError::Empty);
        }
        let mut tracks = tracks;
        let mut start_index = start_index.min(tracks.len() - 1);

        if shuffle {
            let first = tracks.remove(start_index);
            tracks.shuffle(&mut thread_rng());
            tracks.insert(0, first);
            start_index = 0;
        }

        Ok(Self {
            tracks,
            index: start_index,
            start_index,
            shuffle,
            loop_list,
        })
    }

    /// Move to the next track, wrapping only when looping the list.
    ///
    /// Returns `false` when the end was reached without wrapping.
    pub fn next(&mut self) -> bool {
        if self.index + 1 < self.tracks.len() {
            self.index += 1;
            true
        } else if self.loop_list {
            self.index = 0;
            true
        } else {
            false
        }
    }

    /// Move back one track; stays on the first track.
    pub fn previous(&mut self) -> bool {
        if self.index > 0 {
            self.index -= 1;
            true
        } else {
            false
        }
    }

    pub fn add(&mut self, tracks: impl IntoIterator<Item = String>) {
        self.tracks.extend(tracks);
    }

    /// Jump to `index`, clamped to the last track.
    pub fn set_index(&mut self, index: usize) {
        self.index = index.min(self.tracks.len() - 1);
    }

    /// Return to the position the queue was created at.
    pub fn restart(&mut self) {
        self.index = self.start_index;
    }

    pub fn filename(&self) -> &str {
        &self.tracks[self.index]
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn size(&self) -> usize {
        self.tracks.len()
    }

    pub fn tracks(&self) -> &[String] {
        &self.tracks
    }

    pub fn loop_list(&self) -> bool {
        self.loop_list
    }

    pub fn is_shuffled(&self) -> bool {
        self.shuffle
    }
}
