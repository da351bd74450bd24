use thiserror::Error;

/// Main error type for the segmenter
#[derive(Error, Debug)]
pub enum SegmenterError {
    /// An error originating from the underlying FFmpeg library
    #[error("FFmpeg error: {0}")]
    Ffmpeg(#[from] FfmpegError),

    /// A standard I/O error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The source does not contain a video stream
    #[error("No video stream found in source file")]
    NoVideoStream,

    /// Invalid command line or configuration file values
    #[error("Configuration error: {0}")]
    Config(String),

    /// The playlist could not be published
    #[error("Playlist publish error: {0}")]
    Playlist(String),

    /// An error occurred while setting up or driving the muxer
    #[error("Muxing error: {0}")]
    Muxing(String),
}

/// FFmpeg-specific errors
#[derive(Error, Debug)]
pub enum FfmpegError {
    #[error("FFmpeg initialization failed: {0}")]
    InitFailed(String),

    #[error("Failed to open input file: {0}")]
    OpenInput(String),

    #[error("Failed to find stream info: {0}")]
    FindStreamInfo(String),

    #[error("Failed to read frame: {0}")]
    ReadFrame(String),

    #[error("Failed to create muxer: {0}")]
    MuxerCreate(String),

    #[error("Stream configuration failed: {0}")]
    StreamConfig(String),

    #[error("Failed to open output file: {0}")]
    OpenOutput(String),

    #[error("Failed to write header: {0}")]
    WriteHeader(String),

    #[error("Failed to write packet: {0}")]
    WritePacket(String),

    #[error("Failed to write trailer: {0}")]
    WriteTrailer(String),

    #[error("Write error: {0}")]
    WriteError(String),
}

/// Result type alias for convenience
pub type Result<T> = std::result::Result<T, SegmenterError>;
