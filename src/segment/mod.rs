//! Segment generation module
//!
//! This module handles cutting the source into MPEG-TS segments:
//! - `muxer`: the output sink and its FFmpeg implementation
//! - `window`: the rolling set of segments listed in the playlist
//! - `segmenter`: the engine deciding where segments start and end

pub mod muxer;
pub mod segmenter;
pub mod window;

pub use muxer::{MuxSink, TsMuxer};
pub use segmenter::{EndReason, Flow, SegmentationSummary, Segmenter};
pub use window::{SegmentRecord, SegmentWindow};
