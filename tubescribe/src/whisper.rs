//! Remote speech-to-text client: one multipart call per audio asset against
//! a Whisper-compatible transcription endpoint.

use async_trait::async_trait;
use reqwest::multipart;
use serde::Deserialize;
use tracing::{debug, info};

use crate::asset::AudioAsset;
use crate::config::Config;
use crate::error::{Error, Result};
use crate::types::Subtitle;

/// The seam between the pipeline and the transcription service.
///
/// One outbound call per invocation, no internal retry — retry policy, if
/// any, belongs to the caller.
#[async_trait]
pub trait SpeechToText: Send + Sync {
    async fn transcribe(&self, asset: &AudioAsset) -> Result<Vec<Subtitle>>;
}

/// Production client for the OpenAI-style `/audio/transcriptions` endpoint.
pub struct WhisperApiClient {
    client: reqwest::Client,
    api_key: Option<String>,
    base_url: String,
    model: String,
    request_timeout: std::time::Duration,
}

impl WhisperApiClient {
    pub fn new(config: &Config) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key: config.api_key.clone(),
            base_url: config.api_base_url.clone(),
            model: config.model.clone(),
            request_timeout: config.request_timeout,
        }
    }
}

#[async_trait]
impl SpeechToText for WhisperApiClient {
    async fn transcribe(&self, asset: &AudioAsset) -> Result<Vec<Subtitle>> {
        // Local preflight, so a bad asset never costs a network round trip.
        let size = match tokio::fs::metadata(asset.path()).await {
            Ok(meta) => meta.len(),
            Err(_) => 0,
        };
        if size == 0 {
            return Err(Error::EmptyAudio {
                path: asset.path().to_path_buf(),
            });
        }

        let api_key = self.api_key.as_deref().ok_or_else(|| {
            Error::Transcription("no API key configured (set OPENAI_API_KEY)".into())
        })?;

        let file_name = asset
            .path()
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "audio".to_string());
        let mime = match asset.extension().as_deref() {
            Some("mp3") => "audio/mpeg",
            Some("wav") => "audio/wav",
            _ => "application/octet-stream",
        };

        let bytes = tokio::fs::read(asset.path()).await?;

        debug!(
            path = %asset.path().display(),
            size,
            model = %self.model,
            "sending audio to transcription service"
        );

        let file_part = multipart::Part::bytes(bytes)
            .file_name(file_name)
            .mime_str(mime)
            .map_err(|e| Error::Transcription(format!("mime: {e}")))?;

        let form = multipart::Form::new()
            .text("model", self.model.clone())
            .text("response_format", "verbose_json")
            .part("file", file_part);

        let response = self
            .client
            .post(format!("{}/audio/transcriptions", self.base_url))
            .bearer_auth(api_key)
            .multipart(form)
            .timeout(self.request_timeout)
            .send()
            .await
            .map_err(|e| Error::Transcription(format!("request: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "unknown error".to_string());
            return Err(Error::Transcription(format!("status {status}: {body}")));
        }

        let body = response
            .text()
            .await
            .map_err(|e| Error::Transcription(format!("body: {e}")))?;

        let subtitles = parse_verbose_json(&body)?;

        info!(segments = subtitles.len(), "transcription completed");

        Ok(subtitles)
    }
}

#[derive(Deserialize)]
struct VerboseTranscription {
    segments: Option<Vec<ApiSegment>>,
}

#[derive(Deserialize)]
struct ApiSegment {
    start: f64,
    end: f64,
    text: String,
}

/// Extract timestamped segments from a `verbose_json` response body, in the
/// order the service emitted them.
fn parse_verbose_json(body: &str) -> Result<Vec<Subtitle>> {
    let payload: VerboseTranscription = serde_json::from_str(body)
        .map_err(|e| Error::Transcription(format!("malformed response: {e}")))?;

    let segments = payload
        .segments
        .ok_or_else(|| Error::Transcription("response missing segments".into()))?;

    Ok(segments
        .into_iter()
        .map(|s| Subtitle {
            start: s.start,
            end: s.end,
            text: s.text.trim().to_string(),
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_segments_in_service_order() {
        let body = r#"{
            "text": "hello world",
            "language": "en",
            "segments": [
                {"id": 0, "start": 0.0, "end": 2.4, "text": " hello "},
                {"id": 1, "start": 2.4, "end": 4.0, "text": " world"}
            ]
        }"#;

        let subs = parse_verbose_json(body).unwrap();
        assert_eq!(subs.len(), 2);
        assert_eq!(subs[0].text, "hello");
        assert_eq!(subs[0].start, 0.0);
        assert_eq!(subs[1].end, 4.0);
    }

    #[test]
    fn test_parse_missing_segments_rejected() {
        let err = parse_verbose_json(r#"{"text": "hello"}"#).unwrap_err();
        assert!(matches!(err, Error::Transcription(_)));
    }

    #[test]
    fn test_parse_malformed_body_rejected() {
        assert!(parse_verbose_json("not json").is_err());
    }

    #[tokio::test]
    async fn test_missing_asset_fails_before_any_network_call() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gone.wav");
        std::fs::write(&path, b"x").unwrap();
        let asset = AudioAsset::probe(&path).unwrap();
        std::fs::remove_file(&path).unwrap();

        // Preflight must fail first; a network attempt would error differently.
        let config = Config::default().api_key("test-key");
        let client = WhisperApiClient::new(&config);

        let err = client.transcribe(&asset).await.unwrap_err();
        assert!(matches!(err, Error::EmptyAudio { .. }));
    }

    #[tokio::test]
    async fn test_empty_asset_fails_before_any_network_call() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.wav");
        std::fs::write(&path, b"").unwrap();
        let asset = AudioAsset::probe(&path).unwrap();

        let config = Config::default().api_key("test-key");
        let client = WhisperApiClient::new(&config);

        let err = client.transcribe(&asset).await.unwrap_err();
        assert!(matches!(err, Error::EmptyAudio { .. }));
    }
}
