//! REST API endpoints.
//!
//! Handlers only read shared state through [`QueryApi`]; none of them wait on
//! the sampler or touch the sensors. Data endpoints never fail: an empty
//! history is reported in the body, not as an error status.
//!
//! # Example
//!
//! ```ignore
//! let app = api::router().with_state(state);
//! ```

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::get,
};
use serde::Serialize;
use time::OffsetDateTime;
use tracing::error;

use crate::query::{HistoryPayload, LatestPayload, QueryApi};
use crate::shutdown::ShutdownError;
use crate::state::AppState;
use crate::status::SystemStatus;

/// Body returned when a shutdown request is accepted.
pub const SHUTDOWN_ACCEPTED: &str = "Shutting down...";

/// Create the API router.
pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/health", get(health))
        .route("/api/status", get(get_status))
        .route("/api/data", get(get_data))
        .route("/api/history", get(get_history))
        .route("/shutdown", get(shutdown).post(shutdown))
}

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        timestamp: OffsetDateTime::now_utc(),
    })
}

async fn get_status(State(state): State<Arc<AppState>>) -> Json<SystemStatus> {
    Json(QueryApi::new(state).system_status().await)
}

/// Latest reading plus system status.
async fn get_data(State(state): State<Arc<AppState>>) -> Json<LatestPayload> {
    Json(QueryApi::new(state).latest_payload().await)
}

/// Retained window, oldest first.
async fn get_history(State(state): State<Arc<AppState>>) -> Json<HistoryPayload> {
    Json(QueryApi::new(state).history_payload())
}

async fn shutdown(State(state): State<Arc<AppState>>) -> Result<&'static str, AppError> {
    state.shutdown.request_shutdown().await?;
    Ok(SHUTDOWN_ACCEPTED)
}

/// API error type.
#[derive(Debug)]
pub enum AppError {
    Shutdown(ShutdownError),
}

impl From<ShutdownError> for AppError {
    fn from(e: ShutdownError) -> Self {
        AppError::Shutdown(e)
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let (status, message) = match self {
            AppError::Shutdown(e) => {
                error!("Shutdown request failed: {}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
            }
        };

        let body = serde_json::json!({
            "error": message,
        });

        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        body::Body,
        http::{Method, Request, StatusCode},
    };
    use http_body_util::BodyExt;
    use std::time::Duration;
    use tokio_util::sync::CancellationToken;
    use tower::ServiceExt;

    use airmon_types::{ClimateSample, ParticulateSample, Reading, Timestamp};

    use crate::config::Config;
    use crate::shutdown::{CommandShutdown, ProcessShutdown};

    fn create_test_state() -> Arc<AppState> {
        let shutdown = Arc::new(ProcessShutdown::new(CancellationToken::new()));
        AppState::new(Config::default(), shutdown)
    }

    async fn response_body(response: axum::response::Response) -> String {
        let body = response.into_body();
        let bytes = body.collect().await.unwrap().to_bytes();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    async fn get_json(state: Arc<AppState>, uri: &str) -> (StatusCode, serde_json::Value) {
        let response = router()
            .with_state(state)
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let body = response_body(response).await;
        (status, serde_json::from_str(&body).unwrap())
    }

    fn reading(secs: u64) -> Reading {
        Reading::new(
            Timestamp::new(
                OffsetDateTime::now_utc() + Duration::from_secs(secs),
                Duration::from_secs(secs),
            ),
            ClimateSample::new(22.5, 41.0),
            ParticulateSample::new(2.0, 10.0, 20.0),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_health_endpoint() {
        let (status, json) = get_json(create_test_state(), "/api/health").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["status"], "ok");
        assert!(json["version"].is_string());
        assert!(json["timestamp"].is_string());
    }

    #[tokio::test]
    async fn test_data_before_first_sample() {
        let (status, json) = get_json(create_test_state(), "/api/data").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["ok"], false);
        assert_eq!(json["error"], "No data yet");
        assert!(json.get("data").is_none());
        assert!(json["system"]["sampler"].is_object());
    }

    #[tokio::test]
    async fn test_data_with_reading() {
        let state = create_test_state();
        state.history.append(reading(0)).unwrap();

        let (status, json) = get_json(state, "/api/data").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["ok"], true);
        assert_eq!(json["data"]["temp_c"], 22.5);
        assert_eq!(json["data"]["temp_f"], 72.5);
        assert_eq!(json["data"]["pm25"], 10.0);
        assert_eq!(json["data"]["aqi_category"], "Good");
        assert_eq!(json["data"]["aqi_level"], "good");
        assert!(json["system"]["uptime"].is_string());
    }

    #[tokio::test]
    async fn test_history_empty() {
        let (status, json) = get_json(create_test_state(), "/api/history").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["ok"], true);
        assert_eq!(json["window_secs"], 900);
        assert!(json["points"].as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_history_ascending() {
        let state = create_test_state();
        for i in 0..4 {
            state.history.append(reading(i * 5)).unwrap();
        }

        let (_, json) = get_json(state, "/api/history").await;
        let points = json["points"].as_array().unwrap();
        assert_eq!(points.len(), 4);
        let ts: Vec<f64> = points.iter().map(|p| p["ts"].as_f64().unwrap()).collect();
        assert!(ts.windows(2).all(|w| w[0] < w[1]));
    }

    #[tokio::test]
    async fn test_status_endpoint() {
        let state = create_test_state();
        state.sampler.record_failure("climate sensor read failed").await;

        let (status, json) = get_json(state, "/api/status").await;

        assert_eq!(status, StatusCode::OK);
        assert!(json["uptime"].is_string());
        assert!(json["ip"].is_string());
        assert_eq!(json["sampler"]["state"], "idle");
        assert_eq!(json["sampler"]["consecutive_failures"], 1);
        assert_eq!(json["sampler"]["last_error"], "climate sensor read failed");
    }

    #[tokio::test]
    async fn test_shutdown_cancels_token() {
        let token = CancellationToken::new();
        let state = AppState::new(
            Config::default(),
            Arc::new(ProcessShutdown::new(token.clone())),
        );

        let response = router()
            .with_state(state)
            .oneshot(
                Request::builder()
                    .method(Method::POST)
                    .uri("/shutdown")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response_body(response).await, SHUTDOWN_ACCEPTED);
        assert!(token.is_cancelled());
    }

    #[tokio::test]
    async fn test_failed_shutdown_returns_500() {
        let token = CancellationToken::new();
        let command = ["sh", "-c", "echo permission denied >&2; exit 1"].map(String::from);
        let shutdown = CommandShutdown::new(&command, token.clone()).unwrap();
        let state = AppState::new(Config::default(), Arc::new(shutdown));

        let (status, json) = get_json(state, "/shutdown").await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(
            json["error"]
                .as_str()
                .unwrap()
                .contains("permission denied")
        );
        assert!(!token.is_cancelled());
    }

    #[tokio::test]
    async fn test_unknown_route() {
        let response = router()
            .with_state(create_test_state())
            .oneshot(
                Request::builder()
                    .uri("/api/unknown")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
