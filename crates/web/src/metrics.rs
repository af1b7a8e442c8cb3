use std::sync::{Arc, OnceLock};

use anyhow::Result;
use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use metrics::describe_gauge;
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

use crate::api::AppState;

static PROM_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

pub fn describe() {
    describe_gauge!(
        "chainwatch_web_build_info",
        "Build info for the chainwatch web service (value is always 1)."
    );
    simulation::metrics::describe();
}

/// Install the global Prometheus recorder once and return a handle for `/metrics`.
///
/// Upkeep runs on each `/metrics` request.
pub fn init_global() -> Result<PrometheusHandle> {
    if let Some(handle) = PROM_HANDLE.get() {
        return Ok(handle.clone());
    }

    let handle = PrometheusBuilder::new().install_recorder()?;
    let handle = PROM_HANDLE.get_or_init(|| handle).clone();
    describe();

    let git_sha = std::env::var("GIT_SHA").unwrap_or_else(|_| "unknown".to_string());
    metrics::gauge!(
        "chainwatch_web_build_info",
        "version" => env!("CARGO_PKG_VERSION"),
        "git_sha" => git_sha,
    )
    .set(1.0);

    Ok(handle)
}

pub async fn render(State(app): State<Arc<AppState>>) -> Response {
    let Some(handle) = &app.metrics else {
        return StatusCode::NOT_FOUND.into_response();
    };
    handle.run_upkeep();
    (
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        handle.render(),
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_describe_registers_simulation_metrics() {
        let recorder = PrometheusBuilder::new().build_recorder();
        let handle = recorder.handle();

        metrics::with_local_recorder(&recorder, || {
            describe();
            metrics::counter!("chainwatch_ticks_total").increment(2);
            metrics::gauge!("chainwatch_stream_viewers").set(1.0);
        });

        let rendered = handle.render();
        assert!(rendered.contains("chainwatch_ticks_total 2"));
        assert!(rendered.contains("# HELP chainwatch_stream_viewers"));
    }
}
