use askama::Template;
use axum::{
    extract::{Path, State},
    response::Html,
};
use std::sync::Arc;

use crate::api::{ApiError, AppState};

#[derive(Template)]
#[template(path = "live.html")]
struct LiveTemplate {
    case_id: u64,
    stream_url: String,
    window: String,
    interval_secs: u64,
}

/// Minimal page that follows the snapshot stream for one case.
pub async fn live_page(
    State(state): State<Arc<AppState>>,
    Path(case_id): Path<u64>,
) -> Result<Html<String>, ApiError> {
    let page = LiveTemplate {
        case_id,
        stream_url: format!("/api/cases/{case_id}/stream"),
        window: state.publisher.window().to_string(),
        interval_secs: state.publisher.interval().as_secs(),
    };
    Ok(Html(page.render()?))
}
