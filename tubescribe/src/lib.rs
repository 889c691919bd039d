//! YouTube transcription pipeline — video reference in, timestamped
//! subtitles out.
//!
//! **tubescribe** orchestrates three external capabilities: audio download
//! (via yt-dlp), transcoding (via ffmpeg), and speech-to-text (a remote
//! Whisper-compatible API). The library's own work is the sequencing around
//! them: resolving video references, chunking audio that exceeds the
//! service's upload limit, and stitching per-chunk results back onto the
//! video's timeline.
//!
//! # Quick start
//!
//! ```rust,no_run
//! # #[tokio::main]
//! # async fn main() -> tubescribe::Result<()> {
//! let config = tubescribe::Config::from_env();
//! let engine = tubescribe::WhisperApiClient::new(&config);
//!
//! let transcript = tubescribe::transcribe_video(
//!     &engine,
//!     &config,
//!     "https://www.youtube.com/watch?v=dQw4w9WgXcQ",
//!     std::path::Path::new("/tmp/work"),
//! )
//! .await?;
//! println!("{}", transcript.to_srt());
//! # Ok(())
//! # }
//! ```

pub mod asset;
pub mod chunk;
pub mod config;
pub mod error;
pub mod fetch;
pub mod scratch;
pub mod stitch;
pub(crate) mod tool;
pub mod transcode;
pub mod types;
pub mod video_id;
pub mod whisper;

pub use asset::AudioAsset;
pub use config::Config;
pub use error::{Error, Result};
pub use scratch::Scratch;
pub use types::{Subtitle, Transcript};
pub use video_id::VideoId;
pub use whisper::{SpeechToText, WhisperApiClient};

use std::path::Path;

use transcode::TranscodeOptions;

/// Transcribe a whole video.
///
/// Resolves the reference, downloads the full audio track, normalizes it to
/// the compressed upload format, splits it when it exceeds the service's
/// size limit, transcribes each piece in order, and stitches the results
/// onto the video timeline. All intermediate files land under `work_dir`;
/// the caller owns that directory's lifecycle.
pub async fn transcribe_video<S: SpeechToText>(
    engine: &S,
    config: &Config,
    reference: &str,
    work_dir: &Path,
) -> Result<Transcript> {
    let id = video_id::resolve(reference)?;

    let raw = fetch::fetch_full(&id, work_dir, config.tool_timeout).await?;

    let normalized = transcode::normalize(
        &raw,
        work_dir,
        &TranscodeOptions::compressed(config),
        config,
    )
    .await?;
    raw.discard();

    let (chunks, chunk_secs) = chunk::split_if_oversized(
        normalized,
        work_dir,
        config.max_upload_bytes,
        config.chunk_duration_secs,
        config.tool_timeout,
    )
    .await?;

    let subtitles = transcribe_chunks(engine, &chunks, chunk_secs).await?;

    Ok(Transcript {
        video_id: id,
        subtitles,
    })
}

/// Transcribe only `[start, start + duration)` seconds of a video.
///
/// Uses the multi-strategy range fetch, normalizes losslessly (ranges are
/// short; fidelity over size), transcribes in one call, and shifts every
/// segment by `start_secs` onto the video timeline.
pub async fn transcribe_video_range<S: SpeechToText>(
    engine: &S,
    config: &Config,
    reference: &str,
    work_dir: &Path,
    start_secs: f64,
    duration_secs: f64,
) -> Result<Transcript> {
    let id = video_id::resolve(reference)?;

    let raw = fetch::fetch_range(&id, work_dir, start_secs, duration_secs, config.tool_timeout)
        .await?;

    let normalized =
        transcode::normalize(&raw, work_dir, &TranscodeOptions::lossless(config), config).await?;
    raw.discard();

    let segments = engine.transcribe(&normalized).await?;

    Ok(Transcript {
        video_id: id,
        subtitles: stitch::offset_subtitles(segments, start_secs),
    })
}

/// Transcribe chunks one at a time, in chronological order, then stitch.
///
/// Sequential on purpose: offset bookkeeping stays trivial and the remote
/// service sees one in-flight request per job. Offsets depend only on chunk
/// index, so a bounded-concurrency variant would collect by index before
/// stitching.
async fn transcribe_chunks<S: SpeechToText>(
    engine: &S,
    chunks: &[AudioAsset],
    chunk_secs: f64,
) -> Result<Vec<Subtitle>> {
    let mut per_chunk = Vec::with_capacity(chunks.len());

    for asset in chunks {
        per_chunk.push(engine.transcribe(asset).await?);
    }

    Ok(stitch::stitch_chunks(per_chunk, chunk_secs))
}
