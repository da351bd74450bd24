//! Configuration file support
//!
//! Loads segmenter tuning from TOML files. Every section and key is optional;
//! values given on the command line take precedence over the file.

use serde::Deserialize;
use std::path::Path;

use crate::config::{LogFormat, SegmenterConfig};
use crate::error::{Result, SegmenterError};

/// Configuration file format
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConfigFile {
    /// Segment settings
    pub segment: Option<SegmentSettings>,
    /// Logging settings
    pub logging: Option<LoggingSettings>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SegmentSettings {
    /// Keyframe tolerance in seconds
    pub keyframe_tolerance_secs: Option<f64>,
    /// Maximum number of segments produced in one run
    pub segment_limit: Option<u64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LoggingSettings {
    /// Log level (trace, debug, info, warn, error)
    pub level: Option<String>,
    /// Output format (json, pretty)
    pub format: Option<LogFormat>,
}

impl ConfigFile {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|e| {
            SegmenterError::Config(format!("invalid config file {:?}: {}", path, e))
        })
    }

    /// Overlay the values present in this file onto `config`
    pub fn apply_to(&self, config: &mut SegmenterConfig) {
        if let Some(segment) = &self.segment {
            if let Some(tolerance) = segment.keyframe_tolerance_secs {
                config.segment.keyframe_tolerance_secs = tolerance;
            }
            if let Some(limit) = segment.segment_limit {
                config.segment.segment_limit = limit;
            }
        }
        if let Some(logging) = &self.logging {
            if let Some(level) = &logging.level {
                config.logging.level = level.clone();
            }
            if let Some(format) = logging.format {
                config.logging.format = format;
            }
        }
    }
}
