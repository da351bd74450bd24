//! Segmentation engine
//!
//! Pulls packets from a [`MediaSource`], cuts the stream into keyframe-aligned
//! segments of roughly the target duration, and keeps the playlist in step
//! with the retained window.
//!
//! A new segment starts on a video keyframe once the current segment has run
//! for at least `target - tolerance` seconds. Nothing is written before the
//! first video keyframe, so every segment is independently decodable.

use std::path::Path;

use ffmpeg_next as ffmpeg;

use crate::config::{OutputConfig, SegmentConfig};
use crate::error::{Result, SegmenterError};
use crate::ffmpeg::helpers::ts_to_seconds;
use crate::playlist::PlaylistWriter;
use crate::probe::{MediaSource, TrackInfo, TrackRole, TrackSelection};
use crate::segment::muxer::MuxSink;
use crate::segment::window::{SegmentRecord, SegmentWindow};

/// Why ingestion ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndReason {
    /// The source ran out of packets
    SourceExhausted,
    /// The configured segment limit was reached
    SegmentLimit,
    /// The next segment file could not be opened
    OutputUnavailable,
}

/// Outcome of a segmentation run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SegmentationSummary {
    /// Segments produced over the whole run, including evicted ones
    pub segments_produced: u64,
    /// Segments listed in the final playlist
    pub segments_retained: usize,
    /// Sequence number of the first listed segment
    pub media_sequence: u64,
    /// Packets the muxer refused
    pub dropped_packets: u64,
    pub end_reason: EndReason,
}

/// Result of feeding one packet
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Stop(EndReason),
}

/// Mapping of one retained source track onto the muxer
#[derive(Debug, Clone, Copy)]
pub struct OutputStream {
    pub source_index: usize,
    pub output_index: usize,
    pub source_time_base: ffmpeg::Rational,
    pub time_base: ffmpeg::Rational,
}

#[derive(Debug, Default)]
struct Cursor {
    segment_start: f64,
    last_video_time: f64,
    seen_keyframe: bool,
    sequence: u64,
    open: bool,
}

/// Segmentation engine driving a [`MuxSink`]
pub struct Segmenter<M: MuxSink> {
    muxer: M,
    selection: TrackSelection,
    streams: Vec<Option<OutputStream>>,
    output: OutputConfig,
    config: SegmentConfig,
    window: SegmentWindow,
    playlist: PlaylistWriter,
    cursor: Cursor,
    /// Evicted segments whose files wait for a successful playlist publish
    stale: Vec<SegmentRecord>,
    produced: u64,
    dropped_packets: u64,
    stopped: Option<EndReason>,
}

impl<M: MuxSink> Segmenter<M> {
    /// Set up output streams for the selected tracks, open the first segment
    /// file and write its header.
    pub fn new(
        tracks: &[TrackInfo],
        selection: TrackSelection,
        mut muxer: M,
        output: OutputConfig,
        config: SegmentConfig,
    ) -> Result<Self> {
        config.validate()?;

        let mut added = Vec::new();
        for (source_index, role) in selection.retained() {
            let track = tracks
                .iter()
                .find(|t| t.index == source_index)
                .ok_or_else(|| {
                    SegmenterError::Muxing(format!("source stream {} not found", source_index))
                })?;
            let output_index = muxer.add_track(&track.parameters, track.time_base)?;
            added.push((track.index, role, track.time_base, output_index));
        }

        let path = output.segment_path(1);
        muxer.open(&path)?;
        if let Err(e) = muxer.write_header() {
            if let Err(close) = muxer.close() {
                tracing::debug!("Closing {:?} failed: {}", path, close);
            }
            remove_file(&path);
            return Err(e);
        }
        tracing::info!("Starting segment: {:?}", path);

        // The muxer may normalise timebases while writing the header
        let len = added.iter().map(|a| a.0 + 1).max().unwrap_or(0);
        let mut streams = vec![None; len];
        for (source_index, role, source_time_base, output_index) in added {
            let time_base = muxer.time_base(output_index).unwrap_or(source_time_base);
            tracing::debug!(
                "Stream mapping: {} -> {} ({:?}, {} -> {})",
                source_index,
                output_index,
                role,
                source_time_base,
                time_base
            );
            streams[source_index] = Some(OutputStream {
                source_index,
                output_index,
                source_time_base,
                time_base,
            });
        }

        let playlist =
            PlaylistWriter::new(output.playlist_path.clone(), output.playlist_tmp_path());

        Ok(Self {
            muxer,
            selection,
            streams,
            window: SegmentWindow::new(config.max_window_segments),
            output,
            config,
            playlist,
            cursor: Cursor {
                sequence: 1,
                open: true,
                ..Default::default()
            },
            stale: Vec::new(),
            produced: 0,
            dropped_packets: 0,
            stopped: None,
        })
    }

    /// Consume the source until it is exhausted or ingestion stops, then
    /// finalize.
    pub fn run<S: MediaSource>(mut self, source: &mut S) -> Result<SegmentationSummary> {
        loop {
            let packet = match source.read_packet() {
                Ok(Some(packet)) => packet,
                Ok(None) => break,
                Err(e) => {
                    tracing::warn!("Read error, treating as end of stream: {}", e);
                    break;
                }
            };
            if let Flow::Stop(_) = self.push_packet(packet) {
                break;
            }
        }
        self.finish()
    }

    /// Process one source packet
    pub fn push_packet(&mut self, mut packet: ffmpeg::Packet) -> Flow {
        if let Some(reason) = self.stopped {
            return Flow::Stop(reason);
        }

        let source_index = packet.stream();
        let role = self.selection.role(source_index);
        let stream = match self.streams.get(source_index).copied().flatten() {
            Some(stream) if role != TrackRole::Ignored => stream,
            _ => return Flow::Continue,
        };

        let mut is_keyframe = false;
        let mut time = self.cursor.last_video_time;
        if role == TrackRole::Video {
            if let Some(ts) = packet.pts().or(packet.dts()) {
                time = ts_to_seconds(ts, stream.source_time_base);
            }
            is_keyframe = packet.is_key();
            if is_keyframe && !self.cursor.seen_keyframe {
                self.cursor.seen_keyframe = true;
                self.cursor.segment_start = time;
                self.cursor.last_video_time = time;
                tracing::debug!("First keyframe at {:.3}s", time);
            }
        }

        if !self.cursor.seen_keyframe {
            return Flow::Continue;
        }

        if is_keyframe && time - self.cursor.segment_start >= self.config.boundary_threshold_secs()
        {
            if let Flow::Stop(reason) = self.rotate(time) {
                return Flow::Stop(reason);
            }
        }

        if role == TrackRole::Video {
            self.cursor.last_video_time = time;
        }

        self.write_packet(&mut packet, &stream);
        Flow::Continue
    }

    /// Close the open segment and publish the final playlist
    pub fn finish(mut self) -> Result<SegmentationSummary> {
        let end_reason = self.stopped.unwrap_or(EndReason::SourceExhausted);

        if self.cursor.open {
            if let Err(e) = self.muxer.write_trailer() {
                tracing::warn!("Failed to write trailer: {}", e);
            }
            if let Err(e) = self.muxer.close() {
                tracing::warn!("Failed to close segment file: {}", e);
            }
            self.cursor.open = false;

            if self.cursor.seen_keyframe {
                let elapsed = self.cursor.last_video_time - self.cursor.segment_start;
                // zero-length entries are invalid in a playlist
                let duration = round_duration(elapsed).max(1);
                self.append_segment(duration, true)?;
            } else {
                let path = self.output.segment_path(self.cursor.sequence);
                tracing::warn!("No video keyframe found, no segments produced");
                remove_file(&path);
            }
        } else if !self.window.is_empty() {
            self.playlist.publish(&self.window, true)?;
            self.remove_stale();
        }

        let summary = SegmentationSummary {
            segments_produced: self.produced,
            segments_retained: self.window.len(),
            media_sequence: self.window.media_sequence(),
            dropped_packets: self.dropped_packets,
            end_reason,
        };
        tracing::info!(
            "Segmentation finished: {} segments created, {} in playlist ({:?})",
            summary.segments_produced,
            summary.segments_retained,
            summary.end_reason
        );
        Ok(summary)
    }

    pub fn segments_produced(&self) -> u64 {
        self.produced
    }

    fn rotate(&mut self, time: f64) -> Flow {
        self.close_segment();

        let elapsed = self.cursor.last_video_time - self.cursor.segment_start;
        if let Err(e) = self.append_segment(round_duration(elapsed), false) {
            tracing::error!("{}", e);
        }

        if self.produced >= self.config.segment_limit {
            tracing::warn!("Segment limit reached ({})", self.config.segment_limit);
            return self.stop(EndReason::SegmentLimit);
        }

        self.cursor.sequence += 1;
        let path = self.output.segment_path(self.cursor.sequence);
        if let Err(e) = self.muxer.open(&path) {
            tracing::error!("Cannot open {:?}: {}", path, e);
            return self.stop(EndReason::OutputUnavailable);
        }
        if let Err(e) = self.muxer.write_header() {
            tracing::error!("Cannot write header to {:?}: {}", path, e);
            if let Err(e) = self.muxer.close() {
                tracing::debug!("Closing {:?} failed: {}", path, e);
            }
            remove_file(&path);
            return self.stop(EndReason::OutputUnavailable);
        }
        self.cursor.open = true;
        self.cursor.segment_start = time;
        tracing::info!("Segment: {:?}", path);
        Flow::Continue
    }

    fn stop(&mut self, reason: EndReason) -> Flow {
        self.stopped = Some(reason);
        Flow::Stop(reason)
    }

    fn close_segment(&mut self) {
        if let Err(e) = self.muxer.flush() {
            tracing::warn!("Failed to flush segment {}: {}", self.cursor.sequence, e);
        }
        if let Err(e) = self.muxer.close() {
            tracing::warn!("Failed to close segment {}: {}", self.cursor.sequence, e);
        }
        self.cursor.open = false;
    }

    /// Record the just-closed segment, evict if needed and publish.
    fn append_segment(&mut self, duration_secs: u32, is_last: bool) -> Result<()> {
        let sequence = self.cursor.sequence;
        let record = SegmentRecord {
            sequence,
            duration_secs,
            file_name: self.output.file_name(sequence),
            path: self.output.segment_path(sequence),
        };
        tracing::debug!("Segment {} closed: {}s", sequence, duration_secs);
        self.produced += 1;

        if let Some(evicted) = self.window.push(record) {
            tracing::debug!("Evicting segment {}", evicted.sequence);
            self.stale.push(evicted);
        }

        // The playlist must stop referencing evicted files before they go
        self.playlist.publish(&self.window, is_last)?;
        self.remove_stale();
        Ok(())
    }

    fn remove_stale(&mut self) {
        for record in self.stale.drain(..) {
            remove_file(&record.path);
        }
    }

    fn write_packet(&mut self, packet: &mut ffmpeg::Packet, stream: &OutputStream) {
        packet.set_stream(stream.output_index);
        packet.rescale_ts(stream.source_time_base, stream.time_base);
        packet.set_position(-1);

        if let Err(e) = self.muxer.write_packet(packet) {
            self.dropped_packets += 1;
            tracing::warn!(
                "Failed to write packet (stream {}): {}",
                stream.source_index,
                e
            );
        }
    }
}

fn round_duration(secs: f64) -> u32 {
    secs.max(0.0).round() as u32
}

fn remove_file(path: &Path) {
    match std::fs::remove_file(path) {
        Ok(()) => tracing::debug!("Removed {:?}", path),
        Err(e) => tracing::warn!("Failed to remove {:?}: {}", path, e),
    }
}
