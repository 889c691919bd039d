use std::path::PathBuf;
use std::time::Duration;

use tracing::warn;

/// Default transcription service endpoint.
const DEFAULT_API_BASE: &str = "https://api.openai.com/v1";

/// The service rejects uploads beyond this size; fixed constant, not probed.
const DEFAULT_MAX_UPLOAD_BYTES: u64 = 26 * 1024 * 1024;

/// Chunk length for oversized assets. At the compressed bitrate this keeps
/// every piece far under the upload threshold.
const DEFAULT_CHUNK_SECS: f64 = 600.0;

/// Process-wide configuration, read once at startup and immutable after.
#[derive(Debug, Clone)]
pub struct Config {
    /// Transcription service credential. Absence does not prevent startup;
    /// requests that need it fail at call time.
    pub api_key: Option<String>,
    pub api_base_url: String,
    pub model: String,
    pub max_upload_bytes: u64,
    pub chunk_duration_secs: f64,
    pub sample_rate: u32,
    pub channels: u32,
    pub compressed_bitrate: String,
    /// Bound on every external-tool invocation.
    pub tool_timeout: Duration,
    /// Bound on each remote transcription call.
    pub request_timeout: Duration,
    pub scratch_root: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_key: None,
            api_base_url: DEFAULT_API_BASE.to_string(),
            model: "whisper-1".to_string(),
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            chunk_duration_secs: DEFAULT_CHUNK_SECS,
            sample_rate: 16_000,
            channels: 1,
            compressed_bitrate: "32k".to_string(),
            tool_timeout: Duration::from_secs(300),
            request_timeout: Duration::from_secs(120),
            scratch_root: std::env::temp_dir().join("tubescribe"),
        }
    }
}

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from the process environment. Missing credential logs a warning
    /// but does not fail — affected requests error at call time instead.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        match std::env::var("OPENAI_API_KEY") {
            Ok(key) if !key.trim().is_empty() => config.api_key = Some(key),
            _ => warn!("OPENAI_API_KEY is not set; transcription requests will fail"),
        }

        if let Ok(base) = std::env::var("TUBESCRIBE_API_BASE") {
            if !base.trim().is_empty() {
                config.api_base_url = base.trim_end_matches('/').to_string();
            }
        }

        if let Some(bytes) = env_parse::<u64>("TUBESCRIBE_MAX_UPLOAD_BYTES") {
            config.max_upload_bytes = bytes;
        }

        if let Some(secs) = env_parse::<f64>("TUBESCRIBE_CHUNK_SECS") {
            config.chunk_duration_secs = secs;
        }

        config
    }

    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    pub fn api_base_url(mut self, url: impl Into<String>) -> Self {
        self.api_base_url = url.into();
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn max_upload_bytes(mut self, bytes: u64) -> Self {
        self.max_upload_bytes = bytes;
        self
    }

    pub fn chunk_duration_secs(mut self, secs: f64) -> Self {
        self.chunk_duration_secs = secs;
        self
    }

    pub fn tool_timeout(mut self, timeout: Duration) -> Self {
        self.tool_timeout = timeout;
        self
    }

    pub fn scratch_root(mut self, root: PathBuf) -> Self {
        self.scratch_root = root;
        self
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.trim().parse().ok())
}
