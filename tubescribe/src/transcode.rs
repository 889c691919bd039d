//! Audio normalization via ffmpeg: fixed sample rate and channel count,
//! lossless WAV or compressed MP3 output.

use std::path::Path;

use tokio::process::Command;
use tracing::{debug, info};

use crate::asset::AudioAsset;
use crate::config::Config;
use crate::error::{Error, Result};
use crate::tool::{self, ToolFailure};

/// Target encoding for [`normalize`].
#[derive(Debug, Clone, Copy)]
pub struct TranscodeOptions {
    pub sample_rate: u32,
    pub channels: u32,
    /// Lossy MP3 at the configured bitrate instead of lossless WAV. Keeps
    /// long inputs small enough to stay under the upload threshold.
    pub compressed: bool,
}

impl TranscodeOptions {
    pub fn lossless(config: &Config) -> Self {
        Self {
            sample_rate: config.sample_rate,
            channels: config.channels,
            compressed: false,
        }
    }

    pub fn compressed(config: &Config) -> Self {
        Self {
            sample_rate: config.sample_rate,
            channels: config.channels,
            compressed: true,
        }
    }
}

/// Re-encode `asset` into the format the transcription service expects.
///
/// Produces a new file next to the input; the input is never mutated and
/// disposal of both stays with the caller.
pub async fn normalize(
    asset: &AudioAsset,
    dest_dir: &Path,
    opts: &TranscodeOptions,
    config: &Config,
) -> Result<AudioAsset> {
    std::fs::create_dir_all(dest_dir)?;

    let stem = asset
        .path()
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("audio");
    let ext = if opts.compressed { "mp3" } else { "wav" };
    let out_path = dest_dir.join(format!("norm-{stem}.{ext}"));

    info!(
        input = %asset.path().display(),
        sample_rate = opts.sample_rate,
        channels = opts.channels,
        compressed = opts.compressed,
        "normalizing audio"
    );

    let mut cmd = Command::new("ffmpeg");
    cmd.args(["-nostdin", "-loglevel", "error", "-y"])
        .arg("-i")
        .arg(asset.path())
        .args(["-ar", &opts.sample_rate.to_string()])
        .args(["-ac", &opts.channels.to_string()]);

    if opts.compressed {
        cmd.args(["-codec:a", "libmp3lame", "-b:a", &config.compressed_bitrate]);
    } else {
        cmd.args(["-acodec", "pcm_s16le"]);
    }

    cmd.arg(&out_path);

    let output = match tool::run("ffmpeg", &mut cmd, config.tool_timeout).await {
        Ok(output) => output,
        Err(ToolFailure::NotFound) => return Err(Error::FfmpegNotFound),
        Err(e) => return Err(Error::Transcode(e.to_string())),
    };

    if !output.status.success() {
        return Err(Error::Transcode(format!(
            "ffmpeg failed: {}",
            tool::stderr_snippet(&output)
        )));
    }

    let normalized = AudioAsset::probe(out_path)?;

    debug!(
        path = %normalized.path().display(),
        size = normalized.size(),
        "audio normalized"
    );

    Ok(normalized)
}
