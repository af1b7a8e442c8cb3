use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use rand::rngs::StdRng;
use rand::SeedableRng;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::state::SimulationState;

/// Process-wide simulation state: one writer (the scheduler), many readers.
pub type SharedState = Arc<RwLock<SimulationState>>;

struct Running {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

/// Drives `advance_tick` on a fixed cadence from a background task.
pub struct TickScheduler {
    state: SharedState,
    interval: Duration,
    stop_timeout: Duration,
    seed: Option<u64>,
    running: Mutex<Option<Running>>,
}

impl TickScheduler {
    pub fn new(state: SharedState, interval: Duration) -> Self {
        Self {
            state,
            interval,
            stop_timeout: Duration::from_secs(5),
            seed: None,
            running: Mutex::new(None),
        }
    }

    #[must_use]
    pub fn with_stop_timeout(mut self, timeout: Duration) -> Self {
        self.stop_timeout = timeout;
        self
    }

    /// Fixed RNG seed for reproducible runs.
    #[must_use]
    pub fn with_seed(mut self, seed: Option<u64>) -> Self {
        self.seed = seed;
        self
    }

    pub fn is_running(&self) -> bool {
        self.running
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .is_some_and(|r| !r.handle.is_finished())
    }

    /// Spawn the tick loop. Returns `false` if it was already running.
    pub fn start(&self) -> bool {
        let mut running = self.running.lock().unwrap_or_else(PoisonError::into_inner);
        if running.as_ref().is_some_and(|r| !r.handle.is_finished()) {
            debug!("tick scheduler already running");
            return false;
        }

        let rng = match self.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let cancel = CancellationToken::new();
        let handle = tokio::spawn(run(
            Arc::clone(&self.state),
            self.interval,
            rng,
            cancel.clone(),
        ));
        *running = Some(Running { cancel, handle });
        true
    }

    /// Stop the tick loop and wait for it to exit. No tick is applied after
    /// this returns. Returns `false` if it was not running.
    pub async fn stop(&self) -> bool {
        let running = self
            .running
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        let Some(Running { cancel, mut handle }) = running else {
            return false;
        };

        cancel.cancel();
        if tokio::time::timeout(self.stop_timeout, &mut handle)
            .await
            .is_err()
        {
            warn!(
                timeout_ms = self.stop_timeout.as_millis() as u64,
                "tick scheduler did not stop in time, aborting"
            );
            handle.abort();
            let _ = handle.await;
        }
        true
    }
}

async fn run(
    state: SharedState,
    period: Duration,
    mut rng: StdRng,
    cancel: CancellationToken,
) {
    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
    info!(interval_ms = period.as_millis() as u64, "tick scheduler started");

    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            _ = interval.tick() => {
                let outcome = state.write().await.advance_tick(&mut rng);
                match outcome {
                    Ok(outcome) => {
                        metrics::counter!("chainwatch_ticks_total").increment(1);
                        if let Some(kind) = outcome.fraud_event {
                            metrics::counter!(
                                "chainwatch_fraud_events_total",
                                "type" => kind.as_str()
                            )
                            .increment(1);
                            debug!(tick = outcome.tick, event = %kind, "fraud event synthesized");
                        }
                    }
                    Err(e) => {
                        metrics::counter!("chainwatch_tick_failures_total").increment(1);
                        error!(error = %e, "simulation tick failed");
                    }
                }
            }
        }
    }

    info!("tick scheduler stopped");
}
