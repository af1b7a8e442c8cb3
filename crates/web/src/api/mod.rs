pub mod chart;
pub mod control;
pub mod live;
pub mod stream;

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use common::config::Config;
use common::types::UnknownWindow;
use metrics_exporter_prometheus::PrometheusHandle;
use serde::Serialize;
use simulation::{
    EventStreamPublisher, SharedState, SimulationParams, SimulationState, TickScheduler,
};
use std::sync::Arc;
use tokio::sync::RwLock;
use tower_http::trace::TraceLayer;

/// Shared application state available to all handlers.
pub struct AppState {
    pub simulation: SharedState,
    pub scheduler: TickScheduler,
    pub publisher: EventStreamPublisher,
    pub started_at: chrono::DateTime<chrono::Utc>,
    pub metrics: Option<PrometheusHandle>,
}

impl AppState {
    /// Wire state, scheduler and publisher from config. The scheduler is
    /// not started here.
    pub fn new(config: &Config, metrics: Option<PrometheusHandle>) -> Self {
        let now = chrono::Utc::now();
        let simulation: SharedState = Arc::new(RwLock::new(SimulationState::new(
            config.chains.clone(),
            SimulationParams::from(&config.simulation),
            now,
        )));

        let scheduler = TickScheduler::new(
            Arc::clone(&simulation),
            config.simulation.tick_interval(),
        )
        .with_stop_timeout(config.simulation.stop_timeout())
        .with_seed(config.simulation.seed);

        let publisher = EventStreamPublisher::new(
            Arc::clone(&simulation),
            config.stream.window,
            config.stream.interval(),
        );

        Self {
            simulation,
            scheduler,
            publisher,
            started_at: now,
            metrics,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error(transparent)]
    UnknownWindow(#[from] UnknownWindow),
    #[error("failed to render page: {0}")]
    Render(#[from] askama::Error),
}

#[derive(Serialize)]
struct ErrorBody {
    success: bool,
    error: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            Self::UnknownWindow(_) => StatusCode::BAD_REQUEST,
            Self::Render(e) => {
                tracing::error!(error = %e, "template render failed");
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        let body = ErrorBody {
            success: false,
            error: self.to_string(),
        };
        (status, Json(body)).into_response()
    }
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/health", get(health))
        .route(
            "/api/cases/{case_id}/chart/{timeframe}",
            get(chart::chart_data),
        )
        .route("/api/cases/{case_id}/stream", get(stream::snapshot_stream))
        .route("/api/simulation", get(control::status))
        .route("/api/simulation/start", post(control::start))
        .route("/api/simulation/stop", post(control::stop))
        .route("/cases/{case_id}/live", get(live::live_page))
        .route("/metrics", get(crate::metrics::render))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
    uptime_secs: i64,
}

async fn health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let uptime = chrono::Utc::now()
        .signed_duration_since(state.started_at)
        .num_seconds();

    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        uptime_secs: uptime,
    })
}
