use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use common::types::Window;
use futures_util::stream::{self, Stream, StreamExt};
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::scheduler::SharedState;
use crate::snapshot::Snapshot;

fn publish_viewers(n: usize) {
    metrics::gauge!("chainwatch_stream_viewers").set(n as f64);
}

/// Held by each viewer's stream; dropping the stream (client gone)
/// releases the slot.
struct ViewerGuard {
    active: Arc<AtomicUsize>,
    case_id: u64,
}

impl ViewerGuard {
    fn connect(active: &Arc<AtomicUsize>, case_id: u64) -> Self {
        let n = active.fetch_add(1, Ordering::SeqCst) + 1;
        publish_viewers(n);
        info!(case_id, viewers = n, "stream viewer connected");
        Self {
            active: Arc::clone(active),
            case_id,
        }
    }
}

impl Drop for ViewerGuard {
    fn drop(&mut self) {
        let n = self.active.fetch_sub(1, Ordering::SeqCst) - 1;
        publish_viewers(n);
        info!(case_id = self.case_id, viewers = n, "stream viewer disconnected");
    }
}

/// Periodic snapshot push for any number of viewers.
///
/// Each subscription is an independent timer-driven stream over the shared
/// state; it holds the read lock only while building a snapshot.
pub struct EventStreamPublisher {
    state: SharedState,
    window: Window,
    interval: Duration,
    viewers: Arc<AtomicUsize>,
    shutdown: CancellationToken,
}

impl EventStreamPublisher {
    pub fn new(state: SharedState, window: Window, interval: Duration) -> Self {
        Self {
            state,
            window,
            interval,
            viewers: Arc::new(AtomicUsize::new(0)),
            shutdown: CancellationToken::new(),
        }
    }

    pub fn window(&self) -> Window {
        self.window
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn viewer_count(&self) -> usize {
        self.viewers.load(Ordering::SeqCst)
    }

    /// End every open stream, current and future. Lets graceful shutdown
    /// drain connections that would otherwise never finish.
    pub fn close(&self) {
        self.shutdown.cancel();
    }

    /// Snapshot stream for one viewer. The first item is produced
    /// immediately, then one per interval until the stream is dropped or
    /// the publisher is closed. Must be called from within a Tokio runtime.
    pub fn subscribe(&self, case_id: u64) -> impl Stream<Item = Snapshot> + Send + 'static {
        let guard = ViewerGuard::connect(&self.viewers, case_id);
        let mut interval = tokio::time::interval(self.interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let window = self.window;

        stream::unfold(
            (Arc::clone(&self.state), interval, guard),
            move |(state, mut interval, guard)| async move {
                interval.tick().await;
                let snapshot = state.read().await.snapshot(window);
                metrics::counter!("chainwatch_snapshots_served_total", "transport" => "sse")
                    .increment(1);
                Some((snapshot, (state, interval, guard)))
            },
        )
        .take_until(self.shutdown.clone().cancelled_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scheduler::TickScheduler;
    use crate::state::tests::default_state;
    use tokio::sync::RwLock;

    fn publisher(interval: Duration) -> (SharedState, EventStreamPublisher) {
        let state: SharedState = Arc::new(RwLock::new(default_state()));
        let publisher = EventStreamPublisher::new(Arc::clone(&state), Window::OneMinute, interval);
        (state, publisher)
    }

    #[tokio::test(start_paused = true)]
    async fn test_first_snapshot_is_immediate() {
        let (_state, publisher) = publisher(Duration::from_secs(2));
        let mut stream = Box::pin(publisher.subscribe(1));
        let start = tokio::time::Instant::now();
        let snap = stream.next().await.unwrap();
        assert!(start.elapsed() < Duration::from_millis(10));
        assert_eq!(snap.timeframe, Window::OneMinute);
        assert_eq!(snap.labels.len(), 30);
    }

    #[tokio::test(start_paused = true)]
    async fn test_snapshots_every_interval_reflect_ticks() {
        let (state, publisher) = publisher(Duration::from_secs(2));
        let scheduler = TickScheduler::new(Arc::clone(&state), Duration::from_secs(1));
        let mut stream = Box::pin(publisher.subscribe(1));
        let start = tokio::time::Instant::now();

        let first = stream.next().await.unwrap();
        scheduler.start();
        let second = stream.next().await.unwrap();
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_secs(2) && elapsed < Duration::from_secs(3));
        let third = stream.next().await.unwrap();
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_secs(4) && elapsed < Duration::from_secs(5));
        scheduler.stop().await;

        assert_eq!(first.simulation_time, "12:00:00");
        assert_ne!(first, second);
        assert_ne!(second, third);
    }

    #[tokio::test(start_paused = true)]
    async fn test_viewer_count_tracks_subscriptions() {
        let (_state, publisher) = publisher(Duration::from_secs(2));
        assert_eq!(publisher.viewer_count(), 0);

        let a = publisher.subscribe(1);
        let b = publisher.subscribe(2);
        assert_eq!(publisher.viewer_count(), 2);

        drop(a);
        assert_eq!(publisher.viewer_count(), 1);
        drop(b);
        assert_eq!(publisher.viewer_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_disconnect_leaves_state_untouched() {
        let (state, publisher) = publisher(Duration::from_secs(2));
        let mut stream = Box::pin(publisher.subscribe(9));
        stream.next().await.unwrap();
        drop(stream);
        assert_eq!(publisher.viewer_count(), 0);
        assert_eq!(state.read().await.tick_count(), 0);

        // A new viewer still gets snapshots.
        let mut again = Box::pin(publisher.subscribe(9));
        assert!(again.next().await.unwrap().success);
    }

    #[tokio::test(start_paused = true)]
    async fn test_close_ends_open_streams() {
        let (_state, publisher) = publisher(Duration::from_secs(2));
        let mut stream = Box::pin(publisher.subscribe(3));
        assert!(stream.next().await.is_some());

        publisher.close();
        assert!(stream.next().await.is_none());
        drop(stream);
        assert_eq!(publisher.viewer_count(), 0);

        let mut late = Box::pin(publisher.subscribe(4));
        assert!(late.next().await.is_none());
    }
}
