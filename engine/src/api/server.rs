//! HTTP server for the jobclean API.
//!
//! # API Endpoints
//!
//! | Method | Path              | Description                          |
//! |--------|-------------------|--------------------------------------|
//! | GET    | `/health`         | Health check                         |
//! | POST   | `/api/clean`      | Upload a CSV export and clean it     |
//! | GET    | `/api/logs`       | SSE stream for real-time logs        |

use axum::{
    extract::{DefaultBodyLimit, Multipart, State},
    http::{header, Method, StatusCode},
    response::{sse::Event, Json, Sse},
    routing::{get, post},
    Router,
};
use futures::stream::Stream;
use serde_json::{json, Value};
use std::{convert::Infallible, net::SocketAddr, sync::Arc, time::Duration};
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::StreamExt as _;
use tower_http::cors::CorsLayer;

use super::logs::{log_error, log_info, LOG_BROADCASTER};
use super::types::{error_response, CleanResponse};
use crate::error::{PipelineError, ServerError, ServerResult};
use crate::transform::pipeline::{clean_bytes, Pipeline};
use crate::transform::profile::{CleaningProfile, PolicyMode};

/// Uploads above this size are rejected.
const MAX_UPLOAD_BYTES: usize = 64 * 1024 * 1024;

#[derive(Clone)]
struct AppState {
    profile: Arc<CleaningProfile>,
}

/// Build the API router around a cleaning profile.
pub fn router(profile: CleaningProfile) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(tower_http::cors::Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::ACCEPT])
        .expose_headers([header::CONTENT_TYPE]);

    let state = AppState {
        profile: Arc::new(profile),
    };

    Router::new()
        .route("/", get(health))
        .route("/health", get(health))
        .route("/api/clean", post(clean_upload))
        .route("/api/logs", get(sse_logs))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .layer(cors)
        .with_state(state)
}

/// Start the HTTP server
pub async fn start_server(port: u16, profile: CleaningProfile) -> Result<(), Box<dyn std::error::Error>> {
    let app = router(profile);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    println!("🚀 Jobclean server running on http://localhost:{}", port);
    println!("   POST /api/clean  - Upload CSV export");
    println!("   GET  /api/logs   - SSE log stream");
    println!("   GET  /health     - Health check");
    println!();

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Health check endpoint
async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "service": "jobclean",
        "version": env!("CARGO_PKG_VERSION"),
        "endpoints": {
            "clean": "POST /api/clean",
            "logs": "GET /api/logs (SSE)"
        }
    }))
}

/// SSE endpoint for real-time log streaming
async fn sse_logs() -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let rx = LOG_BROADCASTER.subscribe();

    // Lagged receivers skip the dropped entries
    let stream = BroadcastStream::new(rx).filter_map(|result| match result {
        Ok(entry) => {
            let json = serde_json::to_string(&entry).ok()?;
            Some(Ok(Event::default().data(json)))
        }
        Err(_) => None,
    });

    Sse::new(stream).keep_alive(
        axum::response::sse::KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("keep-alive"),
    )
}

/// HTTP status for a failed request.
fn status_for(err: &ServerError) -> StatusCode {
    match err {
        ServerError::BadRequest(_) => StatusCode::BAD_REQUEST,
        ServerError::Pipeline(PipelineError::EmptyInput)
        | ServerError::Pipeline(PipelineError::Config(_))
        | ServerError::Pipeline(PipelineError::Csv(_)) => StatusCode::UNPROCESSABLE_ENTITY,
        ServerError::Pipeline(_) | ServerError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn reject(err: ServerError) -> (StatusCode, Json<Value>) {
    log_error(err.to_string());
    (status_for(&err), Json(error_response(&err.to_string())))
}

/// Run the pipeline over uploaded bytes with an optional policy override.
pub fn clean_upload_bytes(bytes: &[u8], policy: Option<&str>, profile: &CleaningProfile) -> ServerResult<CleanResponse> {
    let mode = match policy {
        Some(p) if !p.trim().is_empty() => p.parse::<PolicyMode>().map_err(ServerError::BadRequest)?,
        _ => profile.imputation.mode,
    };

    let pipeline = Pipeline::new(profile.clone())
        .map_err(ServerError::Pipeline)?
        .with_policy(profile.imputation.policy_for(mode));

    let output = clean_bytes(bytes, &pipeline)?;
    Ok(CleanResponse::from(output))
}

/// Upload and clean endpoint
async fn clean_upload(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<CleanResponse>, (StatusCode, Json<Value>)> {
    let mut file_data: Option<Vec<u8>> = None;
    let mut file_name: Option<String> = None;
    let mut policy: Option<String> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| reject(ServerError::BadRequest(format!("Multipart error: {}", e))))?
    {
        let name = field.name().unwrap_or("").to_string();

        match name.as_str() {
            "file" => {
                file_name = field.file_name().map(|s| s.to_string());
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| reject(ServerError::BadRequest(format!("Read error: {}", e))))?;
                file_data = Some(bytes.to_vec());
            }
            "policy" => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| reject(ServerError::BadRequest(format!("Read error: {}", e))))?;
                policy = Some(text);
            }
            _ => {}
        }
    }

    let bytes = file_data.ok_or_else(|| reject(ServerError::BadRequest("No file provided".to_string())))?;

    log_info(format!(
        "📄 New upload: {} ({} bytes)",
        file_name.as_deref().unwrap_or("unknown"),
        bytes.len()
    ));

    let profile = Arc::clone(&state.profile);
    let response = tokio::task::spawn_blocking(move || clean_upload_bytes(&bytes, policy.as_deref(), &profile))
        .await
        .map_err(|e| reject(ServerError::Internal(e.to_string())))?
        .map_err(reject)?;

    Ok(Json(response))
}
