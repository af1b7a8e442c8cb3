use axum::{
    extract::{Path, State},
    response::{
        sse::{Event, Sse},
        IntoResponse,
    },
};
use futures_util::StreamExt;
use std::sync::Arc;

use crate::api::AppState;

/// Server-sent snapshot stream. `Sse` already sets `Cache-Control: no-cache`;
/// `X-Accel-Buffering: no` keeps reverse proxies from holding frames back.
pub async fn snapshot_stream(
    State(state): State<Arc<AppState>>,
    Path(case_id): Path<u64>,
) -> impl IntoResponse {
    let events = state
        .publisher
        .subscribe(case_id)
        .map(|snapshot| Event::default().json_data(&snapshot));

    ([("x-accel-buffering", "no")], Sse::new(events))
}
