//! Media playlist writer

use std::fmt::Write as _;
use std::fs::File;
use std::io::Write as _;
use std::path::PathBuf;

use crate::error::{Result, SegmenterError};
use crate::segment::window::SegmentWindow;

/// HLS protocol version declared in the playlist
pub const PLAYLIST_VERSION: u32 = 3;

/// Render the playlist for the current window.
///
/// Output depends only on the window and `is_last`.
pub fn render_playlist(window: &SegmentWindow, is_last: bool) -> String {
    let mut output = String::new();

    // Header. Target duration tracks the longest segment still listed.
    output.push_str("#EXTM3U\n");
    let _ = writeln!(output, "#EXT-X-VERSION:{}", PLAYLIST_VERSION);
    let _ = writeln!(output, "#EXT-X-MEDIA-SEQUENCE:{}", window.media_sequence());
    let _ = writeln!(output, "#EXT-X-TARGETDURATION:{}", window.max_duration_secs());

    for segment in window.iter() {
        let _ = writeln!(output, "#EXTINF:{},", segment.duration_secs);
        let _ = writeln!(output, "{}", segment.file_name);
    }

    if is_last {
        output.push_str("#EXT-X-ENDLIST\n");
    }

    output
}

/// Publishes the playlist at a fixed path
#[derive(Debug, Clone)]
pub struct PlaylistWriter {
    path: PathBuf,
    tmp_path: PathBuf,
}

impl PlaylistWriter {
    pub fn new(path: PathBuf, tmp_path: PathBuf) -> Self {
        Self { path, tmp_path }
    }

    /// Render and publish the window. Returns `Ok(false)` without touching
    /// storage when the window is empty.
    pub fn publish(&self, window: &SegmentWindow, is_last: bool) -> Result<bool> {
        if window.is_empty() {
            return Ok(false);
        }
        let text = render_playlist(window, is_last);
        self.publish_text(&text)?;
        tracing::debug!(
            "Published playlist {:?}: sequence={}, segments={}, last={}",
            self.path,
            window.media_sequence(),
            window.len(),
            is_last
        );
        Ok(true)
    }

    /// Atomically replace the published playlist with `text`.
    ///
    /// On failure the previously published playlist is left as it was.
    pub fn publish_text(&self, text: &str) -> Result<()> {
        if let Err(e) = self.write_tmp(text) {
            self.discard_tmp();
            return Err(SegmenterError::Playlist(format!(
                "failed to write {:?}: {}",
                self.tmp_path, e
            )));
        }

        if let Err(e) = std::fs::rename(&self.tmp_path, &self.path) {
            self.discard_tmp();
            return Err(SegmenterError::Playlist(format!(
                "failed to rename {:?} to {:?}: {}",
                self.tmp_path, self.path, e
            )));
        }
        Ok(())
    }

    fn discard_tmp(&self) {
        if let Err(e) = std::fs::remove_file(&self.tmp_path) {
            tracing::debug!("Could not remove {:?}: {}", self.tmp_path, e);
        }
    }

    fn write_tmp(&self, text: &str) -> std::io::Result<()> {
        let mut file = File::create(&self.tmp_path)?;
        file.write_all(text.as_bytes())?;
        file.sync_all()
    }
}
