use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;

use anyhow::Result;
use axum::{
    body::Bytes,
    extract::State,
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;
use tower::ServiceBuilder;
use tower_http::services::{ServeDir, ServeFile};
use tower_http::set_header::SetResponseHeaderLayer;
use tower_http::trace::TraceLayer;

use crate::{
    config::AppConfig,
    error::ScanError,
    export,
    orchestrator::Orchestrator,
    ports::PortSpec,
    types::parse_subnets,
};

/// Reported by the ingress liveness probe.
pub const SERVICE_NAME: &str = "network_scanner";

#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Arc<Orchestrator>,
    pub config: Arc<AppConfig>,
}

/// Body of `POST /api/scan`. Every field is optional; an empty body or `null` means defaults.
#[derive(Debug, Default, Deserialize)]
pub struct ScanBody {
    #[serde(default)]
    pub subnets: Option<OneOrMany>,
    #[serde(default)]
    pub ports: Option<String>,
}

/// `"10.0.0.0/24"` or `["auto", "10.0.0.0/24"]`.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum OneOrMany {
    One(String),
    Many(Vec<String>),
}

impl OneOrMany {
    fn into_vec(self) -> Vec<String> {
        match self {
            Self::One(s) => vec![s],
            Self::Many(v) => v,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Scan already in progress")]
    ScanInProgress,
    #[error("{0}")]
    BadRequest(String),
    #[error("Not found")]
    NotFound,
}

impl From<ScanError> for ApiError {
    fn from(e: ScanError) -> Self {
        match e {
            ScanError::AlreadyRunning => Self::ScanInProgress,
            other => Self::BadRequest(other.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match self {
            Self::ScanInProgress | Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::NotFound => StatusCode::NOT_FOUND,
        };
        let body = json!({ "status": "error", "message": self.to_string() });
        (status, Json(body)).into_response()
    }
}

/// Build the full application: JSON API under `/api`, the ingress probe, and
/// static UI files from `web_root` for every other path.
pub fn router(state: AppState, web_root: &Path) -> Router {
    let api = Router::new()
        .route("/scan", post(post_scan))
        .route("/results", get(get_results))
        .route("/status", get(get_status))
        .route("/export/json", get(get_results))
        .route("/export/csv", get(export_csv))
        .route("/ingress_check", get(ingress_check))
        .fallback(api_not_found);

    let static_files = ServiceBuilder::new()
        .layer(SetResponseHeaderLayer::overriding(
            header::CACHE_CONTROL,
            HeaderValue::from_static("no-cache"),
        ))
        .service(
            ServeDir::new(web_root)
                .append_index_html_on_directories(true)
                .fallback(ServeFile::new(web_root.join("index.html"))),
        );

    Router::new()
        .route("/ingress_check", get(ingress_check))
        .nest("/api", api)
        .fallback_service(static_files)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Serve `app` on `addr` until `shutdown` resolves.
pub async fn serve(
    addr: SocketAddr,
    app: Router,
    shutdown: impl std::future::Future<Output = ()> + Send + 'static,
) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(addr = %listener.local_addr()?, "HTTP API listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await?;
    Ok(())
}

async fn post_scan(State(app): State<AppState>, body: Bytes) -> Result<impl IntoResponse, ApiError> {
    if app.orchestrator.is_scan_running() {
        return Err(ApiError::ScanInProgress);
    }

    let body: ScanBody = if body.iter().all(u8::is_ascii_whitespace) {
        ScanBody::default()
    } else {
        serde_json::from_slice::<Option<ScanBody>>(&body)
            .map_err(|e| ApiError::BadRequest(format!("invalid JSON body: {e}")))?
            .unwrap_or_default()
    };

    let subnets = body
        .subnets
        .map(|s| parse_subnets(&s.into_vec()))
        .transpose()?;
    let ports = body.ports.as_deref().map(PortSpec::parse).transpose()?;
    let request = app.config.scan_request(subnets, ports);

    // Fire and forget; the handle only matters to callers that want to wait.
    let _handle = app.orchestrator.start_scan(request)?;

    Ok(Json(json!({ "status": "success", "message": "Scan started" })))
}

async fn get_results(State(app): State<AppState>) -> impl IntoResponse {
    Json(app.orchestrator.snapshot())
}

async fn get_status(State(app): State<AppState>) -> impl IntoResponse {
    Json(json!({
        "is_scanning": app.orchestrator.is_scan_running(),
        "config": app.config.status_view(),
    }))
}

async fn export_csv(State(app): State<AppState>) -> impl IntoResponse {
    let snapshot = app.orchestrator.snapshot();
    Json(json!({ "csv": export::devices_to_csv(&snapshot.devices) }))
}

async fn ingress_check() -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "service": SERVICE_NAME,
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

async fn api_not_found() -> ApiError {
    ApiError::NotFound
}
