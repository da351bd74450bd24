//! Media source reader

use std::fmt;
use std::path::Path;

use ffmpeg_next as ffmpeg;

use crate::error::{FfmpegError, Result};

/// Metadata of one source track, as reported by the demuxer
#[derive(Clone)]
pub struct TrackInfo {
    /// Index of the track in the source
    pub index: usize,
    /// Media type of the track
    pub medium: ffmpeg::media::Type,
    /// Timebase of the track's timestamps
    pub time_base: ffmpeg::Rational,
    /// Codec parameters, copied into the output stream
    pub parameters: ffmpeg::codec::Parameters,
}

impl fmt::Debug for TrackInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TrackInfo")
            .field("index", &self.index)
            .field("medium", &self.medium)
            .field("time_base", &self.time_base)
            .field("codec", &self.parameters.id())
            .finish()
    }
}

/// A demuxed packet stream
pub trait MediaSource {
    /// All tracks of the source, indexed by track index
    fn tracks(&self) -> &[TrackInfo];

    /// Pull the next packet in demuxer order. `Ok(None)` marks end of stream.
    fn read_packet(&mut self) -> Result<Option<ffmpeg::Packet>>;
}

/// FFmpeg-backed source reading from a file or URL
pub struct FfmpegSource {
    input: ffmpeg::format::context::Input,
    tracks: Vec<TrackInfo>,
}

impl FfmpegSource {
    /// Open and probe a source
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(FfmpegError::OpenInput(format!("{:?}: no such file", path)).into());
        }

        // `format::input` also runs avformat_find_stream_info
        let input = ffmpeg::format::input(&path).map_err(|e| match e {
            ffmpeg::Error::StreamNotFound => {
                FfmpegError::FindStreamInfo(format!("{:?}: {}", path, e))
            }
            _ => FfmpegError::OpenInput(format!("Failed to open {:?}: {}", path, e)),
        })?;

        let tracks = input
            .streams()
            .map(|stream| {
                let parameters = stream.parameters();
                TrackInfo {
                    index: stream.index(),
                    medium: parameters.medium(),
                    time_base: stream.time_base(),
                    parameters,
                }
            })
            .collect::<Vec<_>>();

        for track in &tracks {
            tracing::debug!(
                "Stream {}: type={:?}, codec={:?}, time_base={}",
                track.index,
                track.medium,
                track.parameters.id(),
                track.time_base
            );
        }

        Ok(Self { input, tracks })
    }
}

impl MediaSource for FfmpegSource {
    fn tracks(&self) -> &[TrackInfo] {
        &self.tracks
    }

    fn read_packet(&mut self) -> Result<Option<ffmpeg::Packet>> {
        let mut packet = ffmpeg::Packet::empty();
        match packet.read(&mut self.input) {
            Ok(()) => Ok(Some(packet)),
            Err(ffmpeg::Error::Eof) => Ok(None),
            Err(e) => Err(FfmpegError::ReadFrame(e.to_string()).into()),
        }
    }
}
