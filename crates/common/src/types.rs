use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// How simulated mixing/bridging conditions move a chain's balance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlowRole {
    /// Receives mixed funds: balance rises while mixing is active.
    MixingSink,
    /// Loses funds to bridges: balance drops while bridging is active.
    BridgeSource,
    /// Receives bridged funds: balance rises while bridging is active.
    BridgeSink,
    #[default]
    Neutral,
}

/// Static profile of one tracked chain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChainProfile {
    pub id: String,
    pub name: String,
    pub color: String,
    pub base_balance: f64,
    pub volatility: f64,
    /// Linear drift, applied as an hourly rate.
    pub trend: f64,
    #[serde(default)]
    pub role: FlowRole,
}

impl ChainProfile {
    pub fn new(
        id: &str,
        name: &str,
        color: &str,
        base_balance: f64,
        volatility: f64,
        trend: f64,
        role: FlowRole,
    ) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            color: color.to_string(),
            base_balance,
            volatility,
            trend,
            role,
        }
    }

    /// Daily volume baseline: 10% of the balance baseline.
    pub fn base_volume(&self) -> f64 {
        self.base_balance * 0.1
    }
}

/// The four chains tracked when the config does not list its own.
pub fn default_chains() -> Vec<ChainProfile> {
    vec![
        ChainProfile::new(
            "ethereum",
            "Ethereum",
            "#627EEA",
            2_500_000.0,
            0.15,
            0.02,
            FlowRole::MixingSink,
        ),
        ChainProfile::new(
            "arbitrum",
            "Arbitrum",
            "#28A0F0",
            850_000.0,
            0.20,
            -0.01,
            FlowRole::BridgeSource,
        ),
        ChainProfile::new(
            "optimism",
            "Optimism",
            "#FF0420",
            450_000.0,
            0.25,
            0.05,
            FlowRole::BridgeSink,
        ),
        ChainProfile::new(
            "polygon",
            "Polygon",
            "#8247E5",
            1_200_000.0,
            0.18,
            -0.03,
            FlowRole::BridgeSource,
        ),
    ]
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown timeframe {0:?} (expected one of 1M, 5M, 30M)")]
pub struct UnknownWindow(pub String);

/// Chart window requested by a viewer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Window {
    #[serde(rename = "1M")]
    OneMinute,
    #[serde(rename = "5M")]
    FiveMinutes,
    #[serde(rename = "30M")]
    ThirtyMinutes,
}

impl Window {
    pub const ALL: [Self; 3] = [Self::OneMinute, Self::FiveMinutes, Self::ThirtyMinutes];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::OneMinute => "1M",
            Self::FiveMinutes => "5M",
            Self::ThirtyMinutes => "30M",
        }
    }

    /// Number of chart points returned for this window.
    pub fn points(&self) -> usize {
        match self {
            Self::OneMinute => 30,
            Self::FiveMinutes => 60,
            Self::ThirtyMinutes => 90,
        }
    }

    /// Seconds represented by one chart point, used only for labels.
    fn label_step_secs(&self) -> u64 {
        match self {
            Self::OneMinute => 1,
            Self::FiveMinutes => 5,
            Self::ThirtyMinutes => 20,
        }
    }

    /// Oldest-first "time ago" labels, one per point.
    ///
    /// Short windows use second granularity (`"30s"`); the 30 minute window
    /// uses minutes with a seconds remainder when not on a whole minute
    /// (`"30m"`, `"29m40s"`).
    pub fn labels(&self) -> Vec<String> {
        let step = self.label_step_secs();
        (1..=self.points() as u64)
            .rev()
            .map(|i| {
                let secs = i * step;
                match self {
                    Self::OneMinute | Self::FiveMinutes => format!("{secs}s"),
                    Self::ThirtyMinutes if secs % 60 == 0 => format!("{}m", secs / 60),
                    Self::ThirtyMinutes => format!("{}m{:02}s", secs / 60, secs % 60),
                }
            })
            .collect()
    }
}

impl fmt::Display for Window {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Window {
    type Err = UnknownWindow;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "1M" => Ok(Self::OneMinute),
            "5M" => Ok(Self::FiveMinutes),
            "30M" => Ok(Self::ThirtyMinutes),
            _ => Err(UnknownWindow(s.to_string())),
        }
    }
}

/// Catalogue of synthetic suspicious-activity events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FraudEventKind {
    LargeTransfer,
    MixingService,
    BridgeTransaction,
    TumblerActivity,
    Structuring,
}

impl FraudEventKind {
    pub const ALL: [Self; 5] = [
        Self::LargeTransfer,
        Self::MixingService,
        Self::BridgeTransaction,
        Self::TumblerActivity,
        Self::Structuring,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::LargeTransfer => "large_transfer",
            Self::MixingService => "mixing_service",
            Self::BridgeTransaction => "bridge_transaction",
            Self::TumblerActivity => "tumbler_activity",
            Self::Structuring => "structuring",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Self::LargeTransfer => "Large transfer detected between flagged addresses",
            Self::MixingService => "Interaction with known mixing service",
            Self::BridgeTransaction => "Cross-chain bridge transaction",
            Self::TumblerActivity => "Possible tumbler/privacy coin interaction",
            Self::Structuring => "Multiple small transfers (possible structuring)",
        }
    }
}

impl fmt::Display for FraudEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
