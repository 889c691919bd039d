use std::path::PathBuf;

/// All errors that can occur in tubescribe.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("invalid video reference: {0}")]
    InvalidReference(String),

    #[error("yt-dlp not found — install with: pip install yt-dlp")]
    YtDlpNotFound,

    #[error("ffmpeg not found — install with: apt install ffmpeg")]
    FfmpegNotFound,

    #[error("download failed: {0}")]
    Download(String),

    #[error("all range download strategies failed: {}", .attempts.join("; "))]
    SegmentDownload { attempts: Vec<String> },

    #[error("transcode failed: {0}")]
    Transcode(String),

    #[error("chunking failed: {0}")]
    Chunking(String),

    #[error("audio file missing or empty: {}", .path.display())]
    EmptyAudio { path: PathBuf },

    #[error("transcription service error: {0}")]
    Transcription(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
