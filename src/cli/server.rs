//! HTTP server mode for scheduler-driven invocations

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::cli::runner::{parse_event_time, schema_json};
use crate::config::PipelineConfig;
use crate::error::{Error, Result};
use crate::flatten::Flattener;
use crate::ingest::{IngestOutcome, Ingestor};

/// App state shared across handlers
#[derive(Clone)]
struct AppState {
    config: PipelineConfig,
}

/// Request body for the ingest endpoint
#[derive(Debug, Default, Deserialize)]
struct IngestRequest {
    /// Event time (RFC 3339); defaults to now
    #[serde(default)]
    time: Option<String>,
}

/// Request body for the flatten endpoint
#[derive(Debug, Default, Deserialize)]
struct FlattenRequest {
    /// Raw document location (overrides config)
    #[serde(default)]
    source: Option<String>,
    /// Curated dataset location (overrides config)
    #[serde(default)]
    output: Option<String>,
}

/// Response wrapper
#[derive(Debug, Serialize)]
struct ApiResponse<T> {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl<T: Serialize> ApiResponse<T> {
    fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    fn error(msg: impl Into<String>) -> ApiResponse<()> {
        ApiResponse {
            success: false,
            data: None,
            error: Some(msg.into()),
        }
    }
}

fn error_response(status: StatusCode, error: &Error) -> Response {
    (status, Json(ApiResponse::<()>::error(error.to_string()))).into_response()
}

/// Build the router serving `config`
pub fn router(config: PipelineConfig) -> Router {
    let state = AppState { config };

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health))
        .route("/schema", get(schema))
        .route("/ingest", post(ingest))
        .route("/flatten", post(flatten))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(Arc::new(state))
}

/// Start the HTTP server
pub async fn serve(config: PipelineConfig, port: u16) -> Result<()> {
    let app = router(config);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    tracing::info!("Starting HTTP server on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| Error::config(format!("Failed to bind to port {port}: {e}")))?;

    axum::serve(listener, app)
        .await
        .map_err(|e| Error::config(format!("Server error: {e}")))?;

    Ok(())
}

/// Health check endpoint
async fn health() -> impl IntoResponse {
    Json(json!({ "status": "ok" }))
}

/// Curated dataset schema
async fn schema() -> impl IntoResponse {
    Json(ApiResponse::success(schema_json()))
}

/// HTTP status for an ingest outcome
///
/// Mirrors the upstream status. A transport failure, or a 200 whose body
/// never arrived, is reported as 502.
fn outcome_status(outcome: &IngestOutcome) -> StatusCode {
    outcome
        .status_code
        .filter(|&code| code != 200 || outcome.is_uploaded())
        .and_then(|code| StatusCode::from_u16(code).ok())
        .unwrap_or(StatusCode::BAD_GATEWAY)
}

/// Run one ingest invocation
async fn ingest(
    State(state): State<Arc<AppState>>,
    body: Option<Json<IngestRequest>>,
) -> Response {
    let req = body.map(|Json(req)| req).unwrap_or_default();

    let event_time = match req.time.as_deref().map(parse_event_time).transpose() {
        Ok(time) => time.unwrap_or_else(chrono::Utc::now),
        Err(e) => return error_response(StatusCode::BAD_REQUEST, &e),
    };

    let ingestor = match Ingestor::from_config(&state.config.ingest) {
        Ok(ingestor) => ingestor,
        Err(e) => return error_response(StatusCode::INTERNAL_SERVER_ERROR, &e),
    };

    match ingestor.run(event_time).await {
        Ok(outcome) => (outcome_status(&outcome), Json(outcome.to_response())).into_response(),
        Err(e) => error_response(StatusCode::INTERNAL_SERVER_ERROR, &e),
    }
}

/// Run one flattening job
async fn flatten(
    State(state): State<Arc<AppState>>,
    body: Option<Json<FlattenRequest>>,
) -> Response {
    let req = body.map(|Json(req)| req).unwrap_or_default();

    let mut config = state.config.clone();
    if let Some(source) = req.source {
        config.flatten.source = source;
    }
    if let Some(output) = req.output {
        config.flatten.output = output;
    }

    let flattener = match Flattener::new(&config) {
        Ok(flattener) => flattener,
        Err(e) => return error_response(StatusCode::BAD_REQUEST, &e),
    };

    match flattener.run().await {
        Ok(report) => Json(ApiResponse::success(report)).into_response(),
        Err(e) => error_response(StatusCode::INTERNAL_SERVER_ERROR, &e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::IngestBody;
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use serde_json::Value;
    use tempfile::tempdir;
    use tower::ServiceExt;
    use wiremock::matchers::method;
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn send(app: Router, method: &str, uri: &str, body: Value) -> (StatusCode, Value) {
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();

        let response = app.oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    fn local_config(endpoint: &str, raw: &std::path::Path) -> PipelineConfig {
        let mut config = PipelineConfig::default();
        config.ingest.endpoint = endpoint.to_string();
        config.ingest.raw_bucket = raw.to_string_lossy().into_owned();
        config
    }

    #[tokio::test]
    async fn test_health() {
        let request = Request::builder()
            .uri("/health")
            .body(Body::empty())
            .unwrap();
        let response = router(PipelineConfig::default()).oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_ingest_mirrors_upstream_status() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503).set_body_string("down"))
            .mount(&server)
            .await;

        let raw = tempdir().unwrap();
        let app = router(local_config(&server.uri(), raw.path()));
        let (status, body) = send(app, "POST", "/ingest", json!({})).await;

        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body["statusCode"], 503);
    }

    #[test]
    fn test_outcome_status() {
        let failed = |status_code| IngestOutcome {
            status_code,
            body: IngestBody::Failed {
                error: "connection reset".to_string(),
            },
        };
        assert_eq!(outcome_status(&failed(None)), StatusCode::BAD_GATEWAY);
        assert_eq!(outcome_status(&failed(Some(200))), StatusCode::BAD_GATEWAY);
        assert_eq!(outcome_status(&failed(Some(404))), StatusCode::NOT_FOUND);

        let uploaded = IngestOutcome {
            status_code: Some(200),
            body: IngestBody::Uploaded {
                bucket: "raw".to_string(),
                path: "a.json".to_string(),
            },
        };
        assert_eq!(outcome_status(&uploaded), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_ingest_lands_payload() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("{}"))
            .mount(&server)
            .await;

        let raw = tempdir().unwrap();
        let app = router(local_config(&server.uri(), raw.path()));
        let (status, body) = send(
            app,
            "POST",
            "/ingest",
            json!({ "time": "2024-01-01T10:00:00Z" }),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        let inner: Value = serde_json::from_str(body["body"].as_str().unwrap()).unwrap();
        assert_eq!(inner["uploaded"], "true");
        assert!(raw
            .path()
            .join("weather-data/Melbourne/2024-01-01T10:00:00Z.json")
            .exists());
    }

    #[tokio::test]
    async fn test_ingest_rejects_bad_time() {
        let raw = tempdir().unwrap();
        let app = router(local_config("http://127.0.0.1:1", raw.path()));
        let (status, body) = send(app, "POST", "/ingest", json!({ "time": "soon" })).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["success"], false);
    }

    #[tokio::test]
    async fn test_flatten_empty_source() {
        let raw = tempdir().unwrap();
        let curated = tempdir().unwrap();
        let scratch = tempdir().unwrap();

        let mut config = PipelineConfig::default();
        config.flatten.temp_dir = scratch.path().to_path_buf();
        let app = router(config);

        let (status, body) = send(
            app,
            "POST",
            "/flatten",
            json!({
                "source": raw.path().to_string_lossy(),
                "output": curated.path().to_string_lossy(),
            }),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["documents"], 0);
        assert_eq!(body["data"]["records"], 0);
    }
}
