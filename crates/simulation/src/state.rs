use std::collections::VecDeque;
use std::ops::Range;

use chrono::{DateTime, Duration, Timelike, Utc};
use common::types::{ChainProfile, FlowRole, FraudEventKind};
use rand::Rng;
use rand_distr::{Distribution, Normal};
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SimulationError {
    #[error("invalid noise distribution for chain {chain}: {reason}")]
    InvalidDistribution { chain: String, reason: String },
    #[error("non-finite {field} computed for chain {chain}")]
    NonFinite { chain: String, field: &'static str },
    #[error("simulated clock overflow advancing {from} by {step}")]
    ClockOverflow { from: DateTime<Utc>, step: Duration },
}

/// Tunables for the tick update. Defaults reproduce the demo dashboard.
#[derive(Debug, Clone, PartialEq)]
pub struct SimulationParams {
    /// Simulated time added per tick.
    pub step: Duration,
    pub history_capacity: usize,
    pub fraud_event_capacity: usize,
    pub fraud_event_probability: f64,
    pub mixing_probability: f64,
    pub bridge_probability: f64,
    pub fraud_activity_probability: f64,
}

impl Default for SimulationParams {
    fn default() -> Self {
        Self {
            step: Duration::seconds(1),
            history_capacity: 200,
            fraud_event_capacity: 50,
            fraud_event_probability: 0.10,
            mixing_probability: 0.08,
            bridge_probability: 0.12,
            fraud_activity_probability: 0.15,
        }
    }
}

impl From<&common::config::Simulation> for SimulationParams {
    fn from(cfg: &common::config::Simulation) -> Self {
        Self {
            step: Duration::milliseconds((cfg.step_secs * 1000.0).round() as i64),
            history_capacity: cfg.history_capacity,
            fraud_event_capacity: cfg.fraud_event_capacity,
            fraud_event_probability: cfg.fraud_event_probability,
            mixing_probability: cfg.mixing_probability,
            bridge_probability: cfg.bridge_probability,
            fraud_activity_probability: cfg.fraud_activity_probability,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Sample {
    pub timestamp: DateTime<Utc>,
    pub balance: f64,
    pub volume: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FraudEvent {
    pub timestamp: DateTime<Utc>,
    #[serde(rename = "type")]
    pub kind: FraudEventKind,
    pub chain: String,
    pub amount: f64,
    pub severity: f64,
    pub description: String,
}

#[derive(Debug)]
struct ChainSeries {
    profile: ChainProfile,
    balances: VecDeque<Sample>,
    volumes: VecDeque<Sample>,
}

/// Result of one applied tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TickOutcome {
    pub tick: u64,
    pub fraud_event: Option<FraudEventKind>,
}

/// In-memory simulated chain activity. Single writer (the tick loop),
/// any number of snapshot readers.
#[derive(Debug)]
pub struct SimulationState {
    params: SimulationParams,
    current_time: DateTime<Utc>,
    series: Vec<ChainSeries>,
    fraud_events: VecDeque<FraudEvent>,
    tick_count: u64,
}

fn push_bounded<T>(buf: &mut VecDeque<T>, item: T, capacity: usize) {
    buf.push_back(item);
    while buf.len() > capacity {
        buf.pop_front();
    }
}

fn roll<R: Rng + ?Sized>(rng: &mut R, probability: f64) -> bool {
    rng.gen::<f64>() < probability
}

impl SimulationState {
    pub fn new(chains: Vec<ChainProfile>, params: SimulationParams, start: DateTime<Utc>) -> Self {
        let series = chains
            .into_iter()
            .map(|profile| ChainSeries {
                profile,
                balances: VecDeque::with_capacity(params.history_capacity),
                volumes: VecDeque::with_capacity(params.history_capacity),
            })
            .collect();
        Self {
            fraud_events: VecDeque::with_capacity(params.fraud_event_capacity),
            params,
            current_time: start,
            series,
            tick_count: 0,
        }
    }

    pub fn current_time(&self) -> DateTime<Utc> {
        self.current_time
    }

    pub fn tick_count(&self) -> u64 {
        self.tick_count
    }

    pub fn chains(&self) -> impl Iterator<Item = &ChainProfile> {
        self.series.iter().map(|s| &s.profile)
    }

    pub fn chain_count(&self) -> usize {
        self.series.len()
    }

    pub fn balance_history(&self, chain_id: &str) -> Option<&VecDeque<Sample>> {
        self.find(chain_id).map(|s| &s.balances)
    }

    pub fn volume_history(&self, chain_id: &str) -> Option<&VecDeque<Sample>> {
        self.find(chain_id).map(|s| &s.volumes)
    }

    pub fn fraud_events(&self) -> &VecDeque<FraudEvent> {
        &self.fraud_events
    }

    fn find(&self, chain_id: &str) -> Option<&ChainSeries> {
        self.series.iter().find(|s| s.profile.id == chain_id)
    }

    pub(crate) fn histories(
        &self,
    ) -> impl Iterator<Item = (&ChainProfile, &VecDeque<Sample>, &VecDeque<Sample>)> {
        self.series
            .iter()
            .map(|s| (&s.profile, &s.balances, &s.volumes))
    }

    /// Apply one evolution step.
    ///
    /// Every sample is computed before anything is committed, so an error
    /// leaves the state exactly as it was.
    pub fn advance_tick<R: Rng + ?Sized>(
        &mut self,
        rng: &mut R,
    ) -> Result<TickOutcome, SimulationError> {
        let now = self
            .current_time
            .checked_add_signed(self.params.step)
            .ok_or(SimulationError::ClockOverflow {
                from: self.current_time,
                step: self.params.step,
            })?;
        let secs_into_minute =
            f64::from(now.second()) + f64::from(now.nanosecond() % 1_000_000_000) / 1e9;

        let mut samples = Vec::with_capacity(self.series.len());
        for series in &self.series {
            let balance = self.chain_balance(&series.profile, secs_into_minute, rng)?;
            let volume = self.chain_volume(&series.profile, rng);
            if !volume.is_finite() {
                return Err(SimulationError::NonFinite {
                    chain: series.profile.id.clone(),
                    field: "volume",
                });
            }
            samples.push(Sample {
                timestamp: now,
                balance,
                volume,
            });
        }

        let event = if roll(rng, self.params.fraud_event_probability) {
            self.synthesize_event(now, rng)
        } else {
            None
        };

        self.current_time = now;
        let capacity = self.params.history_capacity;
        for (series, sample) in self.series.iter_mut().zip(samples) {
            push_bounded(&mut series.volumes, sample.clone(), capacity);
            push_bounded(&mut series.balances, sample, capacity);
        }
        let fraud_event = event.map(|e| {
            let kind = e.kind;
            push_bounded(&mut self.fraud_events, e, self.params.fraud_event_capacity);
            kind
        });
        self.tick_count += 1;

        Ok(TickOutcome {
            tick: self.tick_count,
            fraud_event,
        })
    }

    fn chain_balance<R: Rng + ?Sized>(
        &self,
        profile: &ChainProfile,
        secs_into_minute: f64,
        rng: &mut R,
    ) -> Result<f64, SimulationError> {
        let noise = Normal::new(0.0, profile.volatility * 0.02).map_err(|e| {
            SimulationError::InvalidDistribution {
                chain: profile.id.clone(),
                reason: e.to_string(),
            }
        })?;

        let wave = (secs_into_minute * 0.1).sin() * 0.05;
        let trend_factor = 1.0 + profile.trend * secs_into_minute / 3600.0;
        let random_factor = 1.0 + noise.sample(rng);
        let fraud_factor = self.fraud_factor(profile.role, rng);

        let balance =
            profile.base_balance * trend_factor * random_factor * fraud_factor * (1.0 + wave);
        if !balance.is_finite() {
            return Err(SimulationError::NonFinite {
                chain: profile.id.clone(),
                field: "balance",
            });
        }
        Ok(balance.max(0.0))
    }

    /// Balance multiplier while a mixing or bridging condition is rolled
    /// active for this tick. Conditions do not persist between ticks.
    fn fraud_factor<R: Rng + ?Sized>(&self, role: FlowRole, rng: &mut R) -> f64 {
        let (probability, range): (f64, Range<f64>) = match role {
            FlowRole::MixingSink => (self.params.mixing_probability, 1.1..1.3),
            FlowRole::BridgeSource => (self.params.bridge_probability, 0.8..0.95),
            FlowRole::BridgeSink => (self.params.bridge_probability, 1.05..1.2),
            FlowRole::Neutral => return 1.0,
        };
        if roll(rng, probability) {
            rng.gen_range(range)
        } else {
            1.0
        }
    }

    fn chain_volume<R: Rng + ?Sized>(&self, profile: &ChainProfile, rng: &mut R) -> f64 {
        let fraud_multiplier = if roll(rng, self.params.fraud_activity_probability) {
            rng.gen_range(2.0..5.0)
        } else {
            1.0
        };
        profile.base_volume() * fraud_multiplier * rng.gen_range(0.5..2.0) / 24.0
    }

    fn synthesize_event<R: Rng + ?Sized>(
        &self,
        at: DateTime<Utc>,
        rng: &mut R,
    ) -> Option<FraudEvent> {
        if self.series.is_empty() {
            return None;
        }
        let kind = FraudEventKind::ALL[rng.gen_range(0..FraudEventKind::ALL.len())];
        let chain = &self.series[rng.gen_range(0..self.series.len())].profile;
        Some(FraudEvent {
            timestamp: at,
            kind,
            chain: chain.id.clone(),
            amount: rng.gen_range(10_000.0..500_000.0),
            severity: rng.gen_range(0.7..1.0),
            description: kind.description().to_string(),
        })
    }
}
