use axum::{extract::State, Json};
use serde::Serialize;
use std::sync::Arc;
use tracing::info;

use crate::api::AppState;

#[derive(Serialize)]
pub struct ControlResponse {
    pub message: String,
    pub running: bool,
}

#[derive(Serialize)]
pub struct SimulationStatus {
    pub running: bool,
    pub tick_count: u64,
    pub simulation_time: chrono::DateTime<chrono::Utc>,
    pub chains_tracked: usize,
    pub fraud_events: usize,
    pub viewers: usize,
}

pub async fn status(State(state): State<Arc<AppState>>) -> Json<SimulationStatus> {
    let sim = state.simulation.read().await;
    let (tick_count, simulation_time, chains_tracked, fraud_events) = (
        sim.tick_count(),
        sim.current_time(),
        sim.chain_count(),
        sim.fraud_events().len(),
    );
    drop(sim);

    Json(SimulationStatus {
        running: state.scheduler.is_running(),
        tick_count,
        simulation_time,
        chains_tracked,
        fraud_events,
        viewers: state.publisher.viewer_count(),
    })
}

pub async fn start(State(state): State<Arc<AppState>>) -> Json<ControlResponse> {
    let message = if state.scheduler.start() {
        info!("simulation started via API");
        "simulation started"
    } else {
        "simulation already running"
    };
    Json(ControlResponse {
        message: message.to_string(),
        running: true,
    })
}

pub async fn stop(State(state): State<Arc<AppState>>) -> Json<ControlResponse> {
    let message = if state.scheduler.stop().await {
        info!("simulation stopped via API");
        "simulation stopped"
    } else {
        "simulation not running"
    };
    Json(ControlResponse {
        message: message.to_string(),
        running: false,
    })
}
