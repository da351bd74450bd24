//! Retained segment window

use std::collections::VecDeque;
use std::path::PathBuf;

/// A completed segment
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SegmentRecord {
    /// Sequence number, starting at 1
    pub sequence: u64,
    /// Duration in whole seconds
    pub duration_secs: u32,
    /// Playlist entry (file name relative to the playlist)
    pub file_name: String,
    /// Location on storage
    pub path: PathBuf,
}

/// Ordered window of the segments currently referenced by the playlist.
///
/// Bounded by `max_len` (0 = unbounded). Appending past the bound evicts the
/// oldest record.
#[derive(Debug, Clone)]
pub struct SegmentWindow {
    segments: VecDeque<SegmentRecord>,
    max_len: usize,
    media_sequence: u64,
}

impl SegmentWindow {
    pub fn new(max_len: usize) -> Self {
        Self {
            segments: VecDeque::new(),
            max_len,
            media_sequence: 1,
        }
    }

    /// Append a record, returning the evicted oldest record if the window
    /// grew past its bound.
    pub fn push(&mut self, record: SegmentRecord) -> Option<SegmentRecord> {
        if self.segments.is_empty() {
            self.media_sequence = record.sequence;
        }
        self.segments.push_back(record);

        if self.max_len > 0 && self.segments.len() > self.max_len {
            let evicted = self.segments.pop_front();
            self.media_sequence += 1;
            return evicted;
        }
        None
    }

    /// Sequence number of the oldest retained segment
    pub fn media_sequence(&self) -> u64 {
        self.media_sequence
    }

    /// Longest segment duration in the window
    pub fn max_duration_secs(&self) -> u32 {
        self.segments
            .iter()
            .map(|s| s.duration_secs)
            .max()
            .unwrap_or(0)
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &SegmentRecord> {
        self.segments.iter()
    }
}
