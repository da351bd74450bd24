//! Command line interface

use std::path::PathBuf;

use clap::Parser;

use hls_segmenter::config::{LogFormat, OutputConfig, SegmenterConfig};
use hls_segmenter::config_file::ConfigFile;
use hls_segmenter::{Result, SegmenterError};

/// Split a media file into HLS MPEG-TS segments and a rolling playlist
#[derive(Debug, Parser)]
#[command(name = "hls-segmenter", version, about)]
pub struct Cli {
    /// Source media file
    pub input: PathBuf,

    /// Directory receiving the segment files (created if missing)
    pub output_dir: PathBuf,

    /// Path of the playlist to publish
    pub playlist: PathBuf,

    /// Segment file name prefix
    pub base_name: String,

    /// Segment file extension, e.g. ".ts"
    pub extension: String,

    /// Target segment duration in whole seconds
    #[arg(allow_negative_numbers = true)]
    pub duration: i64,

    /// Number of segments kept in the playlist (0 = unlimited)
    #[arg(default_value_t = 0)]
    pub max_segments: usize,

    /// TOML file with segmenter and logging settings
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Log output format
    #[arg(long, value_parser = parse_log_format)]
    pub log_format: Option<LogFormat>,
}

impl Cli {
    /// Build the run configuration: defaults, then the config file, then the
    /// command line.
    pub fn into_config(self) -> Result<SegmenterConfig> {
        let target_duration_secs = u32::try_from(self.duration)
            .ok()
            .filter(|d| *d > 0)
            .ok_or_else(|| {
                SegmenterError::Config(format!(
                    "segment duration must be a positive number of seconds, got {}",
                    self.duration
                ))
            })?;

        let mut config = SegmenterConfig::new(
            &self.input,
            OutputConfig {
                output_dir: self.output_dir,
                playlist_path: self.playlist,
                base_name: self.base_name,
                extension: self.extension,
            },
        );

        if let Some(path) = &self.config {
            ConfigFile::from_file(path)?.apply_to(&mut config);
        }

        config.segment.target_duration_secs = target_duration_secs;
        config.segment.max_window_segments = self.max_segments;
        if let Some(format) = self.log_format {
            config.logging.format = format;
        }

        config.validate()?;
        Ok(config)
    }
}

fn parse_log_format(value: &str) -> std::result::Result<LogFormat, String> {
    match value.to_ascii_lowercase().as_str() {
        "pretty" => Ok(LogFormat::Pretty),
        "json" => Ok(LogFormat::Json),
        other => Err(format!("unknown log format '{other}', expected pretty or json")),
    }
}
