use axum::{
    extract::{Path, State},
    Json,
};
use common::types::Window;
use simulation::Snapshot;
use std::sync::Arc;

use crate::api::{ApiError, AppState};

/// One-shot chart data for a case and timeframe (`1M`, `5M`, `30M`).
pub async fn chart_data(
    State(state): State<Arc<AppState>>,
    Path((case_id, timeframe)): Path<(u64, String)>,
) -> Result<Json<Snapshot>, ApiError> {
    let window: Window = timeframe.parse()?;
    let snapshot = state.simulation.read().await.snapshot(window);
    metrics::counter!("chainwatch_snapshots_served_total", "transport" => "poll").increment(1);
    tracing::debug!(case_id, timeframe = %window, "chart snapshot served");
    Ok(Json(snapshot))
}

#[cfg(test)]
mod tests {
    use crate::api::tests::{get_json, test_app};
    use axum::http::StatusCode;
    use std::time::Duration;

    #[tokio::test]
    async fn test_chart_one_minute_shape() {
        let (app, _state) = test_app();
        let (status, json) = get_json(app, "/api/cases/1/chart/1M").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["success"], true);
        assert_eq!(json["timeframe"], "1M");
        assert_eq!(json["labels"].as_array().unwrap().len(), 30);
        let chains = json["multi_chain_data"].as_object().unwrap();
        assert_eq!(chains.len(), 4);
        for (_, series) in chains {
            assert_eq!(series["balances"].as_array().unwrap().len(), 30);
            assert_eq!(series["volume"].as_array().unwrap().len(), 30);
        }
        assert_eq!(json["summary"]["chains_tracked"], 4);
        assert_eq!(json["summary"]["change_percent"], "+0.00");
        assert!(json["simulation_time"].is_string());
    }

    #[tokio::test]
    async fn test_chart_point_counts_per_window() {
        for (token, points) in [("1M", 30), ("5M", 60), ("30M", 90), ("30m", 90)] {
            let (app, _state) = test_app();
            let (status, json) = get_json(app, &format!("/api/cases/7/chart/{token}")).await;
            assert_eq!(status, StatusCode::OK, "timeframe {token}");
            assert_eq!(json["labels"].as_array().unwrap().len(), points);
            assert_eq!(
                json["multi_chain_data"]["polygon"]["balances"]
                    .as_array()
                    .unwrap()
                    .len(),
                points
            );
        }
    }

    #[tokio::test]
    async fn test_chart_unknown_timeframe_is_400() {
        let (app, _state) = test_app();
        let (status, json) = get_json(app, "/api/cases/1/chart/7D").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["success"], false);
        assert!(json["error"].as_str().unwrap().contains("7D"));
    }

    #[tokio::test]
    async fn test_chart_non_numeric_case_is_400() {
        use axum::body::Body;
        use axum::http::Request;
        use tower::ServiceExt;

        let (app, _state) = test_app();
        let response = app
            .oneshot(
                Request::builder()
                    .uri("/api/cases/abc/chart/1M")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test(start_paused = true)]
    async fn test_chart_reflects_running_simulation() {
        let (app, state) = test_app();
        state.scheduler.start();
        tokio::time::sleep(Duration::from_millis(2500)).await;
        state.scheduler.stop().await;

        let (_, json) = get_json(app, "/api/cases/1/chart/1M").await;
        let eth = json["multi_chain_data"]["ethereum"]["volume"]
            .as_array()
            .unwrap();
        assert!(eth[..27].iter().all(|v| v.as_f64() == Some(0.0)));
        assert!(eth[27..].iter().all(|v| v.as_f64().unwrap() > 0.0));
    }
}
