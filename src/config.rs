//! Segmenter configuration

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{Result, SegmenterError};

/// Slack allowed when deciding whether a keyframe is late enough to start a
/// new segment. A keyframe arriving up to this many seconds before the target
/// still closes the segment.
pub const DEFAULT_KEYFRAME_TOLERANCE_SECS: f64 = 0.25;

/// Safety cap on the number of segments produced in a single run.
pub const DEFAULT_SEGMENT_LIMIT: u64 = 4096;

/// Segmentation configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SegmentConfig {
    /// Target segment duration in whole seconds
    pub target_duration_secs: u32,

    /// Number of segments kept in the playlist (0 = unlimited)
    pub max_window_segments: usize,

    /// Keyframe tolerance for the boundary decision
    pub keyframe_tolerance_secs: f64,

    /// Maximum number of segments produced before ingestion stops
    pub segment_limit: u64,
}

impl Default for SegmentConfig {
    fn default() -> Self {
        Self {
            target_duration_secs: 10,
            max_window_segments: 0,
            keyframe_tolerance_secs: DEFAULT_KEYFRAME_TOLERANCE_SECS,
            segment_limit: DEFAULT_SEGMENT_LIMIT,
        }
    }
}

impl SegmentConfig {
    /// Elapsed time after which a keyframe starts a new segment
    pub fn boundary_threshold_secs(&self) -> f64 {
        self.target_duration_secs as f64 - self.keyframe_tolerance_secs
    }

    pub fn validate(&self) -> Result<()> {
        if self.target_duration_secs == 0 {
            return Err(SegmenterError::Config(
                "segment duration must be positive".to_string(),
            ));
        }
        if !self.keyframe_tolerance_secs.is_finite() || self.keyframe_tolerance_secs < 0.0 {
            return Err(SegmenterError::Config(format!(
                "invalid keyframe tolerance {}",
                self.keyframe_tolerance_secs
            )));
        }
        if self.keyframe_tolerance_secs >= self.target_duration_secs as f64 {
            return Err(SegmenterError::Config(format!(
                "keyframe tolerance {}s must be below the segment duration {}s",
                self.keyframe_tolerance_secs, self.target_duration_secs
            )));
        }
        if self.segment_limit == 0 {
            return Err(SegmenterError::Config(
                "segment limit must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Where and how segments and the playlist are written
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Directory receiving the segment files
    pub output_dir: PathBuf,

    /// Path of the published playlist
    pub playlist_path: PathBuf,

    /// Segment file name prefix
    pub base_name: String,

    /// Segment file extension, including the leading dot
    pub extension: String,
}

impl OutputConfig {
    /// Segment file name as referenced from the playlist
    pub fn file_name(&self, sequence: u64) -> String {
        format!("{}-{}{}", self.base_name, sequence, self.extension)
    }

    /// Location of a segment file on storage
    pub fn segment_path(&self, sequence: u64) -> PathBuf {
        self.output_dir.join(self.file_name(sequence))
    }

    /// Temporary file the playlist is staged in before the rename
    pub fn playlist_tmp_path(&self) -> PathBuf {
        let mut tmp = self.playlist_path.clone().into_os_string();
        tmp.push(".tmp");
        PathBuf::from(tmp)
    }
}

/// Log output format
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,

    /// Output format
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Pretty,
        }
    }
}

/// Complete configuration for one segmentation run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SegmenterConfig {
    /// Source media file
    pub input: PathBuf,

    /// Output layout
    pub output: OutputConfig,

    /// Segmentation settings
    pub segment: SegmentConfig,

    /// Logging settings
    pub logging: LoggingConfig,
}

impl SegmenterConfig {
    /// Build a configuration with default segment and logging settings
    pub fn new<P: AsRef<Path>>(input: P, output: OutputConfig) -> Self {
        Self {
            input: input.as_ref().to_path_buf(),
            output,
            segment: SegmentConfig::default(),
            logging: LoggingConfig::default(),
        }
    }

    pub fn validate(&self) -> Result<()> {
        self.segment.validate()?;
        if self.output.base_name.is_empty() {
            return Err(SegmenterError::Config(
                "segment base name must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}
