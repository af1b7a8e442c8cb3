//! Simulated multi-chain balances, volumes and suspicious-activity events,
//! advanced on a fixed cadence and read back as display-ready snapshots.

pub mod metrics;
pub mod scheduler;
pub mod snapshot;
pub mod state;
pub mod stream;

pub use scheduler::{SharedState, TickScheduler};
pub use snapshot::Snapshot;
pub use state::{FraudEvent, Sample, SimulationError, SimulationParams, SimulationState};
pub use stream::EventStreamPublisher;
