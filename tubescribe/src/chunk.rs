//! Size-threshold chunking: split an asset that exceeds the transcription
//! service's upload limit into fixed-duration pieces.

use std::path::Path;
use std::time::Duration;

use tokio::process::Command;
use tracing::{debug, info};

use crate::asset::AudioAsset;
use crate::error::{Error, Result};
use crate::tool::{self, ToolFailure};

/// Split `asset` into `chunk_secs`-long pieces when it exceeds `max_bytes`.
///
/// At or under the threshold this is a no-op fast path returning the asset
/// unchanged. Otherwise the asset is segmented with lossless stream copy,
/// the consumed source file is discarded, and the pieces are returned in
/// chronological order — downstream offset arithmetic depends on index order
/// matching time order. Returns the pieces and the chunk duration used.
pub async fn split_if_oversized(
    asset: AudioAsset,
    dest_dir: &Path,
    max_bytes: u64,
    chunk_secs: f64,
    timeout: Duration,
) -> Result<(Vec<AudioAsset>, f64)> {
    if asset.size() <= max_bytes {
        debug!(size = asset.size(), max_bytes, "asset under threshold, no chunking");
        return Ok((vec![asset], chunk_secs));
    }

    info!(
        size = asset.size(),
        max_bytes,
        chunk_secs,
        "asset over threshold, splitting"
    );

    std::fs::create_dir_all(dest_dir)?;

    let ext = asset.extension().unwrap_or_else(|| "mp3".to_string());
    let pattern = dest_dir.join(format!("chunk-%03d.{ext}"));
    let pattern = pattern
        .to_str()
        .ok_or_else(|| Error::Chunking("destination path contains invalid UTF-8".into()))?
        .to_string();

    let mut cmd = Command::new("ffmpeg");
    cmd.args(["-nostdin", "-loglevel", "error", "-y"])
        .arg("-i")
        .arg(asset.path())
        .args(["-f", "segment"])
        .args(["-segment_time", &chunk_secs.to_string()])
        .args(["-c", "copy"])
        .arg(&pattern);

    let output = match tool::run("ffmpeg", &mut cmd, timeout).await {
        Ok(output) => output,
        Err(ToolFailure::NotFound) => return Err(Error::FfmpegNotFound),
        Err(e) => return Err(Error::Chunking(e.to_string())),
    };

    if !output.status.success() {
        return Err(Error::Chunking(format!(
            "ffmpeg segmenting failed: {}",
            tool::stderr_snippet(&output)
        )));
    }

    let chunks = collect_chunks(dest_dir, &ext)?;
    if chunks.is_empty() {
        return Err(Error::Chunking("splitting produced zero pieces".into()));
    }

    asset.discard();

    debug!(pieces = chunks.len(), "asset split");

    Ok((chunks, chunk_secs))
}

/// Gather `chunk-NNN.<ext>` files in filename order. The zero-padded index
/// makes lexicographic order equal chronological order.
fn collect_chunks(dir: &Path, ext: &str) -> Result<Vec<AudioAsset>> {
    let mut paths = Vec::new();

    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        let name = match path.file_name().and_then(|n| n.to_str()) {
            Some(name) => name,
            None => continue,
        };
        if name.starts_with("chunk-") && name.ends_with(&format!(".{ext}")) {
            paths.push(path);
        }
    }

    paths.sort();

    paths.into_iter().map(AudioAsset::probe).collect()
}
