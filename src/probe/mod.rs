//! Source probing
//!
//! This module handles everything on the input side:
//! - Opening the source and enumerating its tracks
//! - Pulling packets in demuxer order
//! - Classifying tracks into video/audio/ignored roles

pub mod source;
pub mod tracks;

pub use source::{FfmpegSource, MediaSource, TrackInfo};
pub use tracks::{TrackRole, TrackSelection};
