//! Live HLS segmenter
//!
//! Remuxes a media source (one video track, optionally one audio track) into
//! keyframe-aligned MPEG-TS segments and maintains an HLS media playlist that
//! is always safe to read while it is being rewritten.

pub mod api;
pub mod config;
pub mod config_file;
pub mod error;
pub mod ffmpeg;
pub mod playlist;
pub mod probe;
pub mod segment;

#[cfg(test)]
pub(crate) mod tests;

pub use api::*;
pub use error::{FfmpegError, Result, SegmenterError};
