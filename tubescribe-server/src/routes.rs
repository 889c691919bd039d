use std::sync::Arc;

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::{error, Level};

use tubescribe::{Config, Scratch, Subtitle, VideoId, WhisperApiClient};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub engine: Arc<WhisperApiClient>,
}

impl AppState {
    pub fn new(config: Config) -> Self {
        let engine = Arc::new(WhisperApiClient::new(&config));
        Self {
            config: Arc::new(config),
            engine,
        }
    }
}

pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let trace_layer = TraceLayer::new_for_http()
        .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
        .on_response(DefaultOnResponse::new().level(Level::INFO));

    Router::new()
        .route("/transcribe", get(transcribe_handler))
        .route("/transcribe-segment", get(transcribe_segment_handler))
        .route("/health", get(health_handler))
        .layer(CatchPanicLayer::new())
        .layer(trace_layer)
        .layer(cors)
        .with_state(state)
}

#[derive(Deserialize)]
struct TranscribeParams {
    video_url: String,
}

#[derive(Deserialize)]
struct SegmentParams {
    video_url: String,
    start_seconds: f64,
    duration_seconds: f64,
}

#[derive(Serialize)]
struct TranscribeResponse {
    subtitles: Vec<Subtitle>,
    video_id: VideoId,
    status: String,
    message: String,
}

#[derive(Serialize)]
struct SegmentResponse {
    subtitles: Vec<Subtitle>,
    video_id: VideoId,
    segment_start: f64,
    segment_duration: f64,
    status: String,
    message: String,
}

#[derive(Serialize)]
struct HealthResponse {
    status: String,
}

async fn health_handler() -> impl IntoResponse {
    Json(HealthResponse {
        status: "healthy".to_string(),
    })
}

/// Whole-video path: fetch → transcode (compressed) → chunk if oversized →
/// transcribe → stitch.
async fn transcribe_handler(
    State(state): State<AppState>,
    Query(params): Query<TranscribeParams>,
) -> Result<Json<TranscribeResponse>, ApiError> {
    let scratch = Scratch::create(&state.config.scratch_root)
        .map_err(|e| ApiError::internal(format!("failed to create scratch directory: {e}")))?;

    let result = tubescribe::transcribe_video(
        state.engine.as_ref(),
        &state.config,
        &params.video_url,
        scratch.path(),
    )
    .await;

    // Deferred removal: the response does not wait on filesystem cleanup.
    scratch.dispose();

    let transcript = result?;

    Ok(Json(TranscribeResponse {
        message: format!(
            "Transcription complete. {} subtitle segments generated.",
            transcript.subtitles.len()
        ),
        status: "success".to_string(),
        video_id: transcript.video_id,
        subtitles: transcript.subtitles,
    }))
}

/// Bounded-range path: range fetch → transcode (lossless) → transcribe →
/// offset-adjust.
async fn transcribe_segment_handler(
    State(state): State<AppState>,
    Query(params): Query<SegmentParams>,
) -> Result<Json<SegmentResponse>, ApiError> {
    if params.start_seconds < 0.0 {
        return Err(ApiError::bad_request("start_seconds must be non-negative"));
    }
    if params.duration_seconds <= 0.0 {
        return Err(ApiError::bad_request("duration_seconds must be positive"));
    }

    let scratch = Scratch::create(&state.config.scratch_root)
        .map_err(|e| ApiError::internal(format!("failed to create scratch directory: {e}")))?;

    let result = tubescribe::transcribe_video_range(
        state.engine.as_ref(),
        &state.config,
        &params.video_url,
        scratch.path(),
        params.start_seconds,
        params.duration_seconds,
    )
    .await;

    scratch.dispose();

    let transcript = result?;

    Ok(Json(SegmentResponse {
        message: format!(
            "Transcription complete. {} subtitle segments generated.",
            transcript.subtitles.len()
        ),
        status: "success".to_string(),
        video_id: transcript.video_id,
        segment_start: params.start_seconds,
        segment_duration: params.duration_seconds,
        subtitles: transcript.subtitles,
    }))
}

/// Error response: HTTP error status plus a textual detail message.
pub struct ApiError {
    status: StatusCode,
    detail: String,
}

impl ApiError {
    fn bad_request(detail: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            detail: detail.into(),
        }
    }

    fn internal(detail: impl Into<String>) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            detail: detail.into(),
        }
    }

    #[cfg(test)]
    pub fn status(&self) -> StatusCode {
        self.status
    }
}

impl From<tubescribe::Error> for ApiError {
    fn from(err: tubescribe::Error) -> Self {
        let status = match &err {
            tubescribe::Error::InvalidReference(_) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Self {
            status,
            detail: err.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        error!(status = %self.status, detail = %self.detail, "request failed");
        (
            self.status,
            Json(serde_json::json!({ "detail": self.detail })),
        )
            .into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    fn test_router() -> Router {
        create_router(AppState::new(Config::default()))
    }

    #[tokio::test]
    async fn test_health_is_ok() {
        let response = test_router()
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = response.into_body().collect().await.unwrap().to_bytes();
        let parsed: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(parsed["status"], "healthy");
    }

    #[tokio::test]
    async fn test_transcribe_missing_params_is_client_error() {
        let response = test_router()
            .oneshot(Request::get("/transcribe").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert!(response.status().is_client_error());
    }

    #[tokio::test]
    async fn test_transcribe_invalid_reference_is_400_with_detail() {
        let response = test_router()
            .oneshot(
                Request::get("/transcribe?video_url=not%20a%20video")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = response.into_body().collect().await.unwrap().to_bytes();
        let parsed: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert!(
            parsed["detail"]
                .as_str()
                .unwrap()
                .contains("invalid video reference")
        );
    }

    #[tokio::test]
    async fn test_segment_negative_start_is_400() {
        let response = test_router()
            .oneshot(
                Request::get(
                    "/transcribe-segment?video_url=dQw4w9WgXcQ&start_seconds=-1&duration_seconds=10",
                )
                .body(Body::empty())
                .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_segment_zero_duration_is_400() {
        let response = test_router()
            .oneshot(
                Request::get(
                    "/transcribe-segment?video_url=dQw4w9WgXcQ&start_seconds=0&duration_seconds=0",
                )
                .body(Body::empty())
                .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_error_mapping_invalid_reference_is_400() {
        let api: ApiError = tubescribe::Error::InvalidReference("x".into()).into();
        assert_eq!(api.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_error_mapping_pipeline_failures_are_500() {
        for err in [
            tubescribe::Error::Download("x".into()),
            tubescribe::Error::SegmentDownload {
                attempts: vec!["stream-cut: x".into()],
            },
            tubescribe::Error::Transcode("x".into()),
            tubescribe::Error::Chunking("x".into()),
            tubescribe::Error::Transcription("x".into()),
        ] {
            let api: ApiError = err.into();
            assert_eq!(api.status(), StatusCode::INTERNAL_SERVER_ERROR);
        }
    }
}
