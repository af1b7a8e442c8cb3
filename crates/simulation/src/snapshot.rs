use std::collections::{BTreeMap, VecDeque};

use chrono::Duration;
use common::types::Window;
use serde::Serialize;

use crate::state::{FraudEvent, Sample, SimulationState};

const RECENT_EVENTS: usize = 5;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChainSeriesView {
    pub balances: Vec<f64>,
    pub volume: Vec<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Summary {
    pub total_balance: f64,
    /// Signed, two decimals: `"+1.25"`, `"-0.40"`, `"+0.00"`.
    pub change_percent: String,
    pub chains_tracked: usize,
    /// Fraud events in the trailing 24 simulated hours.
    pub fraud_events: usize,
}

/// Display-ready view of recent history, shared by the polling and
/// streaming endpoints.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Snapshot {
    pub success: bool,
    pub timeframe: Window,
    pub labels: Vec<String>,
    pub multi_chain_data: BTreeMap<String, ChainSeriesView>,
    pub summary: Summary,
    pub recent_events: Vec<FraudEvent>,
    pub simulation_time: String,
}

/// Last `n` values of `history`, left-padded with `pad` up to exactly `n`.
fn tail_padded(
    history: &VecDeque<Sample>,
    n: usize,
    pad: f64,
    pick: fn(&Sample) -> f64,
) -> Vec<f64> {
    let skip = history.len().saturating_sub(n);
    let missing = n - (history.len() - skip);
    std::iter::repeat(pad)
        .take(missing)
        .chain(history.iter().skip(skip).map(pick))
        .collect()
}

pub(crate) fn change_percent(current: f64, previous: f64) -> f64 {
    if previous > 0.0 {
        (current - previous) / previous * 100.0
    } else {
        0.0
    }
}

impl SimulationState {
    /// Aggregate the most recent `window.points()` samples of every chain.
    pub fn snapshot(&self, window: Window) -> Snapshot {
        let n = window.points();

        let multi_chain_data: BTreeMap<String, ChainSeriesView> = self
            .histories()
            .map(|(profile, balances, volumes)| {
                let view = ChainSeriesView {
                    balances: tail_padded(balances, n, profile.base_balance, |s| s.balance),
                    volume: tail_padded(volumes, n, 0.0, |s| s.volume),
                };
                (profile.id.clone(), view)
            })
            .collect();

        let total_at = |back: usize| -> f64 {
            multi_chain_data
                .values()
                .map(|v| {
                    let len = v.balances.len();
                    v.balances.get(len.saturating_sub(1 + back)).copied().unwrap_or(0.0)
                })
                .sum()
        };
        let total_balance = total_at(0);
        let previous_total = total_at(1);

        let cutoff = self.current_time().checked_sub_signed(Duration::hours(24));
        let fraud_events = self
            .fraud_events()
            .iter()
            .filter(|e| !cutoff.is_some_and(|c| e.timestamp <= c))
            .count();

        let events = self.fraud_events();
        let recent_events = events
            .iter()
            .skip(events.len().saturating_sub(RECENT_EVENTS))
            .cloned()
            .collect();

        Snapshot {
            success: true,
            timeframe: window,
            labels: window.labels(),
            summary: Summary {
                total_balance,
                change_percent: format!("{:+.2}", change_percent(total_balance, previous_total)),
                chains_tracked: self.chain_count(),
                fraud_events,
            },
            multi_chain_data,
            recent_events,
            simulation_time: self.current_time().format("%H:%M:%S").to_string(),
        }
    }
}
