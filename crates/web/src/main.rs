mod api;
mod metrics;

use anyhow::Result;
use common::config::{Config, DEFAULT_CONFIG_PATH};
use std::net::SocketAddr;
use std::sync::Arc;

#[tokio::main]
async fn main() -> Result<()> {
    let config_path = std::env::args().nth(1);
    let config = match &config_path {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };

    let (dispatch, _otel_guard) =
        common::observability::build_dispatch("chainwatch-web", &config.general.log_level);
    tracing::dispatcher::set_global_default(dispatch).map_err(anyhow::Error::msg)?;

    tracing::info!(
        config = config_path.as_deref().unwrap_or(DEFAULT_CONFIG_PATH),
        chains = config.chains.len(),
        "chainwatch starting"
    );

    let prometheus = metrics::init_global()?;
    let state = Arc::new(api::AppState::new(&config, Some(prometheus)));

    if config.simulation.autostart {
        state.scheduler.start();
    }

    let web_port = config.web.as_ref().map_or(8080, |w| w.port);
    let web_host = config
        .web
        .as_ref()
        .map_or("0.0.0.0".to_string(), |w| w.host.clone());
    let addr: SocketAddr = format!("{web_host}:{web_port}").parse()?;

    let app = api::router(Arc::clone(&state));
    tracing::info!("dashboard listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;

    let shutdown_state = Arc::clone(&state);
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "failed to listen for ctrl-c");
                std::future::pending::<()>().await;
            }
            tracing::info!("shutting down");
            // Open SSE streams never end on their own.
            shutdown_state.publisher.close();
        })
        .await?;

    if state.scheduler.stop().await {
        tracing::info!("simulation stopped");
    }
    Ok(())
}
