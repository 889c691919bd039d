//! Media fetching via yt-dlp: whole-video audio downloads and bounded
//! time-range fetches with a multi-strategy fallback chain.

use std::path::{Path, PathBuf};
use std::time::Duration;

use tokio::process::Command;
use tracing::{debug, info, warn};

use crate::asset::AudioAsset;
use crate::error::{Error, Result};
use crate::tool::{self, ToolFailure};
use crate::video_id::VideoId;

/// Download the full audio track of a video, decoded to WAV.
///
/// # Security
/// - Arguments are passed to yt-dlp via `.arg()` (no shell expansion)
/// - `--no-exec` prevents yt-dlp from running post-processing commands
/// - The reported output path is validated to be inside `dest_dir`
pub async fn fetch_full(id: &VideoId, dest_dir: &Path, timeout: Duration) -> Result<AudioAsset> {
    std::fs::create_dir_all(dest_dir)?;

    info!(video_id = %id, "downloading audio");

    let output_template = output_template(dest_dir, &format!("full-{id}"))?;

    let mut cmd = Command::new("yt-dlp");
    cmd.args([
        "--extract-audio",
        "--audio-format",
        "wav",
        "--audio-quality",
        "0",
        "--no-playlist",
        "--no-exec",
        "--output",
        &output_template,
        "--print",
        "after_move:filepath",
    ])
    .arg(id.watch_url());

    let output = tool::run("yt-dlp", &mut cmd, timeout)
        .await
        .map_err(ytdlp_failure)?;

    if !output.status.success() {
        return Err(Error::Download(format!(
            "yt-dlp failed: {}",
            tool::stderr_snippet(&output)
        )));
    }

    let audio_path = reported_or_scanned_path(&output.stdout, dest_dir)?;

    if !audio_path.exists() {
        return Err(Error::Download(format!(
            "downloaded file not found at {}",
            audio_path.display()
        )));
    }

    debug!(path = %audio_path.display(), "audio downloaded");

    AudioAsset::probe(audio_path)
}

/// Strategies for fetching a bounded time range, tried in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RangeStrategy {
    /// Resolve a direct stream URL, let ffmpeg read only the window from it.
    StreamCut,
    /// yt-dlp's native `--download-sections` range download.
    NativeSections,
    /// Download the whole track, cut the window locally, drop the rest.
    FullThenTrim,
}

impl RangeStrategy {
    const ALL: [RangeStrategy; 3] = [
        RangeStrategy::StreamCut,
        RangeStrategy::NativeSections,
        RangeStrategy::FullThenTrim,
    ];

    fn label(self) -> &'static str {
        match self {
            RangeStrategy::StreamCut => "stream-cut",
            RangeStrategy::NativeSections => "native-sections",
            RangeStrategy::FullThenTrim => "full-then-trim",
        }
    }
}

/// Fetch only `[start, start + duration)` of a video's audio.
///
/// Tries each strategy in order and stops at the first success. Every
/// strategy works inside its own attempt directory, which is removed
/// wholesale on failure so no partial output survives into the next attempt.
/// When every strategy fails, the error carries one diagnostic line per
/// attempt.
pub async fn fetch_range(
    id: &VideoId,
    dest_dir: &Path,
    start_secs: f64,
    duration_secs: f64,
    timeout: Duration,
) -> Result<AudioAsset> {
    std::fs::create_dir_all(dest_dir)?;

    let mut attempts = Vec::new();

    for strategy in RangeStrategy::ALL {
        info!(
            video_id = %id,
            strategy = strategy.label(),
            start_secs,
            duration_secs,
            "fetching range"
        );

        let attempt_dir = dest_dir.join(format!("attempt-{}", strategy.label()));
        std::fs::create_dir_all(&attempt_dir)?;

        let attempt = match strategy {
            RangeStrategy::StreamCut => {
                stream_cut(id, &attempt_dir, start_secs, duration_secs, timeout).await
            }
            RangeStrategy::NativeSections => {
                native_sections(id, &attempt_dir, start_secs, duration_secs, timeout).await
            }
            RangeStrategy::FullThenTrim => {
                full_then_trim(id, &attempt_dir, start_secs, duration_secs, timeout).await
            }
        };

        match attempt {
            Ok(asset) => return Ok(asset),
            Err(e) => {
                warn!(strategy = strategy.label(), error = %e, "range fetch strategy failed");
                attempts.push(format!("{}: {e}", strategy.label()));
                if let Err(rm) = std::fs::remove_dir_all(&attempt_dir) {
                    warn!(path = %attempt_dir.display(), error = %rm, "failed to remove attempt directory");
                }
            }
        }
    }

    Err(Error::SegmentDownload { attempts })
}

/// Strategy 1: resolve a direct media URL, then have ffmpeg decode only the
/// requested window from the stream.
async fn stream_cut(
    id: &VideoId,
    attempt_dir: &Path,
    start_secs: f64,
    duration_secs: f64,
    timeout: Duration,
) -> Result<AudioAsset> {
    let mut resolve = Command::new("yt-dlp");
    resolve
        .args(["-g", "-f", "bestaudio", "--no-playlist", "--no-exec"])
        .arg(id.watch_url());

    let output = tool::run("yt-dlp", &mut resolve, timeout)
        .await
        .map_err(ytdlp_failure)?;

    if !output.status.success() {
        return Err(Error::Download(format!(
            "stream URL resolution failed: {}",
            tool::stderr_snippet(&output)
        )));
    }

    let stream_url = String::from_utf8_lossy(&output.stdout)
        .lines()
        .next()
        .unwrap_or("")
        .trim()
        .to_string();

    if stream_url.is_empty() {
        return Err(Error::Download("yt-dlp returned no stream URL".into()));
    }

    let out_path = attempt_dir.join("range.wav");

    let mut cut = Command::new("ffmpeg");
    cut.args(["-nostdin", "-loglevel", "error", "-y"])
        .args(["-ss", &format_secs(start_secs)])
        .args(["-t", &format_secs(duration_secs)])
        .arg("-i")
        .arg(&stream_url)
        .args(["-vn", "-acodec", "pcm_s16le"])
        .arg(&out_path);

    run_ffmpeg_to_file(cut, &out_path, timeout).await
}

/// Strategy 2: yt-dlp's own range download.
async fn native_sections(
    id: &VideoId,
    attempt_dir: &Path,
    start_secs: f64,
    duration_secs: f64,
    timeout: Duration,
) -> Result<AudioAsset> {
    let output_template = output_template(attempt_dir, &format!("section-{id}"))?;

    let mut cmd = Command::new("yt-dlp");
    cmd.args([
        "--download-sections",
        &section_spec(start_secs, duration_secs),
        "--extract-audio",
        "--audio-format",
        "wav",
        "--audio-quality",
        "0",
        "--no-playlist",
        "--no-exec",
        "--output",
        &output_template,
        "--print",
        "after_move:filepath",
    ])
    .arg(id.watch_url());

    let output = tool::run("yt-dlp", &mut cmd, timeout)
        .await
        .map_err(ytdlp_failure)?;

    if !output.status.success() {
        return Err(Error::Download(format!(
            "yt-dlp section download failed: {}",
            tool::stderr_snippet(&output)
        )));
    }

    let audio_path = reported_or_scanned_path(&output.stdout, attempt_dir)?;

    if !audio_path.exists() {
        return Err(Error::Download(format!(
            "section download produced no file at {}",
            audio_path.display()
        )));
    }

    AudioAsset::probe(audio_path)
}

/// Strategy 3: whole-track download, local cut, full file discarded.
async fn full_then_trim(
    id: &VideoId,
    attempt_dir: &Path,
    start_secs: f64,
    duration_secs: f64,
    timeout: Duration,
) -> Result<AudioAsset> {
    let full = fetch_full(id, attempt_dir, timeout).await?;

    let out_path = attempt_dir.join("range.wav");

    let mut cut = Command::new("ffmpeg");
    cut.args(["-nostdin", "-loglevel", "error", "-y"])
        .args(["-ss", &format_secs(start_secs)])
        .args(["-t", &format_secs(duration_secs)])
        .arg("-i")
        .arg(full.path())
        .args(["-acodec", "copy"])
        .arg(&out_path);

    let result = run_ffmpeg_to_file(cut, &out_path, timeout).await;

    full.discard();

    result
}

async fn run_ffmpeg_to_file(
    mut cmd: Command,
    out_path: &Path,
    timeout: Duration,
) -> Result<AudioAsset> {
    let output = match tool::run("ffmpeg", &mut cmd, timeout).await {
        Ok(output) => output,
        Err(ToolFailure::NotFound) => return Err(Error::FfmpegNotFound),
        Err(e) => return Err(Error::Download(e.to_string())),
    };

    if !output.status.success() {
        return Err(Error::Download(format!(
            "ffmpeg failed: {}",
            tool::stderr_snippet(&output)
        )));
    }

    if !out_path.exists() {
        return Err(Error::Download("ffmpeg produced no output file".into()));
    }

    AudioAsset::probe(out_path)
}

fn ytdlp_failure(e: ToolFailure) -> Error {
    match e {
        ToolFailure::NotFound => Error::YtDlpNotFound,
        ToolFailure::Other(detail) => Error::Download(detail),
    }
}

/// Resolve the downloaded file: trust `--print after_move:filepath` when
/// present (validated to sit inside `dest_dir`), otherwise fall back to a
/// directory scan.
fn reported_or_scanned_path(stdout: &[u8], dest_dir: &Path) -> Result<PathBuf> {
    let reported = String::from_utf8_lossy(stdout).trim().to_string();
    if reported.is_empty() {
        find_audio_file(dest_dir)
    } else {
        let candidate = PathBuf::from(&reported);
        validate_path_in_dir(&candidate, dest_dir)?;
        Ok(candidate)
    }
}

/// yt-dlp `--download-sections` window: `*START-END` in seconds.
fn section_spec(start_secs: f64, duration_secs: f64) -> String {
    format!(
        "*{}-{}",
        format_secs(start_secs),
        format_secs(start_secs + duration_secs)
    )
}

/// Seconds formatted the way both tools accept: plain decimal, no trailing
/// noise for whole values.
fn format_secs(secs: f64) -> String {
    if secs.fract() == 0.0 {
        format!("{}", secs as u64)
    } else {
        format!("{secs:.3}")
    }
}

fn output_template(dest_dir: &Path, stem: &str) -> Result<String> {
    Ok(dest_dir
        .join(format!("{stem}.%(ext)s"))
        .to_str()
        .ok_or_else(|| Error::Download("destination path contains invalid UTF-8".into()))?
        .to_string())
}

/// Normalize a path by resolving `.` and `..` components without touching
/// the filesystem.
fn normalize_path(path: &Path) -> PathBuf {
    use std::path::Component;
    let mut parts = Vec::new();
    for component in path.components() {
        match component {
            Component::ParentDir => {
                parts.pop();
            }
            Component::CurDir => {}
            other => parts.push(other),
        }
    }
    parts.iter().collect()
}

/// Validate that a tool-reported path is inside the expected directory
/// (prevents path traversal).
fn validate_path_in_dir(path: &Path, expected_dir: &Path) -> Result<()> {
    let canonical_dir = expected_dir
        .canonicalize()
        .unwrap_or_else(|_| normalize_path(expected_dir));
    let canonical_path = path
        .canonicalize()
        .unwrap_or_else(|_| normalize_path(path));

    if canonical_path.starts_with(&canonical_dir) {
        Ok(())
    } else {
        warn!(
            path = %path.display(),
            expected_dir = %expected_dir.display(),
            "downloaded file path outside expected directory"
        );
        Err(Error::Download(
            "downloaded file path is outside the expected output directory".into(),
        ))
    }
}

/// Find the most recently modified audio file in a directory.
fn find_audio_file(dir: &Path) -> Result<PathBuf> {
    let mut best: Option<(PathBuf, std::time::SystemTime)> = None;

    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
            if matches!(ext, "wav" | "mp3" | "ogg" | "m4a" | "opus" | "flac") {
                if let Ok(meta) = entry.metadata() {
                    if let Ok(modified) = meta.modified() {
                        if best.as_ref().is_none_or(|(_, t)| modified > *t) {
                            best = Some((path, modified));
                        }
                    }
                }
            }
        }
    }

    best.map(|(p, _)| p)
        .ok_or_else(|| Error::Download("no audio file found after download".into()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::video_id::resolve;

    #[test]
    fn test_watch_url_shape() {
        let id = resolve("dQw4w9WgXcQ").unwrap();
        assert_eq!(
            id.watch_url(),
            "https://www.youtube.com/watch?v=dQw4w9WgXcQ"
        );
    }

    #[test]
    fn test_section_spec_whole_seconds() {
        assert_eq!(section_spec(30.0, 15.0), "*30-45");
    }

    #[test]
    fn test_section_spec_fractional() {
        assert_eq!(section_spec(1.5, 2.0), "*1.500-3.500");
    }

    #[test]
    fn test_strategy_order() {
        assert_eq!(
            RangeStrategy::ALL,
            [
                RangeStrategy::StreamCut,
                RangeStrategy::NativeSections,
                RangeStrategy::FullThenTrim,
            ]
        );
    }

    #[test]
    fn test_validate_path_in_dir_valid() {
        let dir = std::env::temp_dir();
        let path = dir.join("test_file.wav");
        assert!(validate_path_in_dir(&path, &dir).is_ok());
    }

    #[test]
    fn test_validate_path_in_dir_traversal() {
        let dir = std::env::temp_dir().join("tubescribe_test");
        let path = PathBuf::from("/etc/passwd");
        assert!(validate_path_in_dir(&path, &dir).is_err());
    }

    #[test]
    fn test_validate_path_in_dir_parent_traversal() {
        let dir = std::env::temp_dir().join("tubescribe_test");
        let path = dir.join("..").join("..").join("etc").join("passwd");
        assert!(validate_path_in_dir(&path, &dir).is_err());
    }

    #[test]
    fn test_reported_path_outside_dir_rejected() {
        let dir = tempfile::tempdir().unwrap();
        assert!(reported_or_scanned_path(b"/etc/passwd\n", dir.path()).is_err());
    }

    #[test]
    fn test_find_audio_file_picks_newest() {
        let dir = tempfile::tempdir().unwrap();
        let old = dir.path().join("old.wav");
        std::fs::write(&old, b"a").unwrap();
        std::fs::File::options()
            .write(true)
            .open(&old)
            .unwrap()
            .set_modified(std::time::SystemTime::UNIX_EPOCH)
            .unwrap();
        let new = dir.path().join("new.mp3");
        std::fs::write(&new, b"b").unwrap();

        assert_eq!(find_audio_file(dir.path()).unwrap(), new);
    }

    #[test]
    fn test_find_audio_file_empty_dir_fails() {
        let dir = tempfile::tempdir().unwrap();
        assert!(find_audio_file(dir.path()).is_err());
    }

    #[test]
    fn test_find_audio_file_ignores_non_audio() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("notes.txt"), b"x").unwrap();
        assert!(find_audio_file(dir.path()).is_err());
    }
}
