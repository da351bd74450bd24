//! Playlist generation module
//!
//! Renders the retained segment window as an HLS media playlist and publishes
//! it with a write-temp-then-rename so readers never see a partial file.

pub mod writer;

pub use writer::{render_playlist, PlaylistWriter};
