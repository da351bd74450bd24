//! Track role classification

use ffmpeg_next as ffmpeg;

use crate::error::{Result, SegmenterError};
use crate::probe::TrackInfo;

/// What the segmenter does with packets of a source track
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackRole {
    /// Drives segmentation and is copied to the output
    Video,
    /// Copied to the output
    Audio,
    /// Dropped
    Ignored,
}

/// Immutable mapping from source track index to role.
///
/// The first video track and the first audio track are retained, every
/// other track is ignored.
#[derive(Debug, Clone)]
pub struct TrackSelection {
    roles: Vec<TrackRole>,
    video: usize,
    audio: Option<usize>,
}

impl TrackSelection {
    /// Classify the tracks reported by the source
    pub fn from_tracks(tracks: &[TrackInfo]) -> Result<Self> {
        let len = tracks.iter().map(|t| t.index + 1).max().unwrap_or(0);
        let mut roles = vec![TrackRole::Ignored; len];
        let mut video = None;
        let mut audio = None;

        for track in tracks {
            match track.medium {
                ffmpeg::media::Type::Video if video.is_none() => {
                    roles[track.index] = TrackRole::Video;
                    video = Some(track.index);
                }
                ffmpeg::media::Type::Audio if audio.is_none() => {
                    roles[track.index] = TrackRole::Audio;
                    audio = Some(track.index);
                }
                medium => {
                    tracing::debug!("Ignoring stream {} (type={:?})", track.index, medium);
                }
            }
        }

        let video = video.ok_or(SegmenterError::NoVideoStream)?;
        tracing::info!("Video stream: index {}", video);
        if let Some(audio) = audio {
            tracing::info!("Audio stream: index {}", audio);
        }

        Ok(Self {
            roles,
            video,
            audio,
        })
    }

    /// Role of a source track; unknown indices are ignored
    #[inline]
    pub fn role(&self, index: usize) -> TrackRole {
        self.roles.get(index).copied().unwrap_or(TrackRole::Ignored)
    }

    pub fn video(&self) -> usize {
        self.video
    }

    pub fn audio(&self) -> Option<usize> {
        self.audio
    }

    /// Retained tracks in output order: video first, then audio
    pub fn retained(&self) -> impl Iterator<Item = (usize, TrackRole)> + '_ {
        std::iter::once((self.video, TrackRole::Video))
            .chain(self.audio.map(|a| (a, TrackRole::Audio)))
    }
}
