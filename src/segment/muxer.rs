//! MPEG-TS muxing sink

use std::path::Path;

use ffmpeg_next as ffmpeg;

use crate::error::{FfmpegError, Result};
use crate::ffmpeg::helpers;

/// Container format used for segments. MPEG-TS needs no global index, so a
/// file can be cut at any keyframe and still play on its own.
pub const SEGMENT_FORMAT: &str = "mpegts";

/// Output side of the segmenter: a muxer whose target file can be swapped
/// between segments.
pub trait MuxSink {
    /// Add an output stream copying `parameters`; returns its output index
    fn add_track(
        &mut self,
        parameters: &ffmpeg::codec::Parameters,
        time_base: ffmpeg::Rational,
    ) -> Result<usize>;

    /// Open `path` as the current output file
    fn open(&mut self, path: &Path) -> Result<()>;

    /// Write the container header into the current output file
    fn write_header(&mut self) -> Result<()>;

    /// Write a packet whose stream index and timestamps are already in
    /// output terms
    fn write_packet(&mut self, packet: &mut ffmpeg::Packet) -> Result<()>;

    fn write_trailer(&mut self) -> Result<()>;

    /// Push everything buffered so far into the current output file
    fn flush(&mut self) -> Result<()>;

    /// Close the current output file
    fn close(&mut self) -> Result<()>;

    /// Timebase the muxer expects for an output stream
    fn time_base(&self, output_index: usize) -> Option<ffmpeg::Rational>;
}

/// FFmpeg MPEG-TS muxer writing one file per segment.
///
/// One output context lives for the whole run so continuity counters and
/// timestamps carry across segments; only its `pb` is reopened. The header
/// is written once, later segments request a PAT/PMT re-emit so each file
/// starts with its own stream tables.
pub struct TsMuxer {
    output: ffmpeg::format::context::Output,
    header_written: bool,
}

impl TsMuxer {
    pub fn new() -> Result<Self> {
        let output = helpers::alloc_output_context(SEGMENT_FORMAT)?;
        Ok(Self {
            output,
            header_written: false,
        })
    }
}

impl MuxSink for TsMuxer {
    fn add_track(
        &mut self,
        parameters: &ffmpeg::codec::Parameters,
        time_base: ffmpeg::Rational,
    ) -> Result<usize> {
        let mut out_stream = self
            .output
            .add_stream(ffmpeg::encoder::find(ffmpeg::codec::Id::None))
            .map_err(|e| FfmpegError::StreamConfig(format!("Failed to add stream: {}", e)))?;

        out_stream.set_parameters(parameters.clone());
        // Reset codec_tag so the TS muxer picks its own; tags from MP4/MKV
        // sources are not valid here.
        helpers::stream_reset_codec_tag(&mut out_stream);
        out_stream.set_time_base(time_base);

        let index = out_stream.index();
        tracing::debug!(
            "Added output stream {}: codec={:?}, time_base={}",
            index,
            parameters.id(),
            time_base
        );
        Ok(index)
    }

    fn open(&mut self, path: &Path) -> Result<()> {
        if helpers::avio_is_open(&mut self.output) {
            helpers::avio_close(&mut self.output)?;
        }
        helpers::avio_open(&mut self.output, path)?;
        Ok(())
    }

    fn write_header(&mut self) -> Result<()> {
        if self.header_written {
            helpers::set_muxer_option(&mut self.output, "mpegts_flags", "+resend_headers")?;
            return Ok(());
        }
        self.output
            .write_header()
            .map_err(|e| FfmpegError::WriteHeader(e.to_string()))?;
        self.header_written = true;
        Ok(())
    }

    fn write_packet(&mut self, packet: &mut ffmpeg::Packet) -> Result<()> {
        packet
            .write_interleaved(&mut self.output)
            .map_err(|e| FfmpegError::WritePacket(e.to_string()))?;
        Ok(())
    }

    fn write_trailer(&mut self) -> Result<()> {
        self.output
            .write_trailer()
            .map_err(|e| FfmpegError::WriteTrailer(e.to_string()))?;
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        helpers::flush_muxer(&mut self.output)?;
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        helpers::avio_close(&mut self.output)?;
        Ok(())
    }

    fn time_base(&self, output_index: usize) -> Option<ffmpeg::Rational> {
        self.output.stream(output_index).map(|s| s.time_base())
    }
}

impl Drop for TsMuxer {
    fn drop(&mut self) {
        if let Err(e) = helpers::avio_close(&mut self.output) {
            tracing::debug!("Closing segment file on drop failed: {}", e);
        }
    }
}
