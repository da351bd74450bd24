use crate::config::SegmenterConfig;
use crate::error::Result;
use crate::probe::{FfmpegSource, MediaSource, TrackSelection};
use crate::segment::{Segmenter, TsMuxer};

pub use crate::segment::{EndReason, SegmentationSummary};

/// Segment `config.input` into the configured output directory.
///
/// The source is probed before anything is written, so a missing video track
/// fails without touching the output directory. FFmpeg must have been
/// initialized with [`crate::ffmpeg::init`].
pub fn segment_file(config: &SegmenterConfig) -> Result<SegmentationSummary> {
    config.validate()?;

    let mut source = FfmpegSource::open(&config.input)?;
    let selection = TrackSelection::from_tracks(source.tracks())?;

    std::fs::create_dir_all(&config.output.output_dir)?;

    let segmenter = Segmenter::new(
        source.tracks(),
        selection,
        TsMuxer::new()?,
        config.output.clone(),
        config.segment.clone(),
    )?;
    segmenter.run(&mut source)
}
