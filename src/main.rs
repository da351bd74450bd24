//! HLS Segmenter
//!
//! Command line front end: parses arguments, sets up logging and FFmpeg, and
//! runs one segmentation pass over the input.

mod cli;

use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use hls_segmenter::config::{LogFormat, LoggingConfig};
use hls_segmenter::{ffmpeg, segment_file};

use crate::cli::Cli;

/// Application version
const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application name
const APP_NAME: &str = "hls-segmenter";

fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let _ = e.print();
            // --help and --version are not failures
            return if e.use_stderr() {
                ExitCode::FAILURE
            } else {
                ExitCode::SUCCESS
            };
        }
    };

    let config = match cli.into_config() {
        Ok(config) => config,
        Err(e) => {
            init_logging(&LoggingConfig::default());
            tracing::error!("{}", e);
            return ExitCode::FAILURE;
        }
    };

    init_logging(&config.logging);
    tracing::info!("{} v{} starting", APP_NAME, VERSION);

    if let Err(e) = ffmpeg::init() {
        tracing::error!("{}", e);
        return ExitCode::FAILURE;
    }
    ffmpeg::install_log_filter();
    tracing::debug!("FFmpeg version: {}", ffmpeg::version_info());

    tracing::info!("Input: {:?}", config.input);
    tracing::info!(
        "Output: {:?}",
        config
            .output
            .output_dir
            .join(format!("{}-*{}", config.output.base_name, config.output.extension))
    );
    tracing::info!("Playlist: {:?}", config.output.playlist_path);
    tracing::info!(
        "Duration: {}s | Max segments: {}",
        config.segment.target_duration_secs,
        config.segment.max_window_segments
    );

    match segment_file(&config) {
        Ok(summary) => {
            tracing::info!(
                "Done: {} segments created, {} dropped packets",
                summary.segments_produced,
                summary.dropped_packets
            );
            ExitCode::SUCCESS
        }
        Err(e) => {
            tracing::error!("Segmentation failed: {}", e);
            ExitCode::FAILURE
        }
    }
}

/// Initialize logging with tracing
fn init_logging(config: &LoggingConfig) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        format!("hls_segmenter={level},ffmpeg={level}", level = config.level).into()
    });

    let registry = tracing_subscriber::registry().with(filter);
    match config.format {
        LogFormat::Pretty => registry.with(tracing_subscriber::fmt::layer()).init(),
        LogFormat::Json => registry
            .with(tracing_subscriber::fmt::layer().json())
            .init(),
    }
}
