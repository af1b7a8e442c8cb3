use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use crate::types::{default_chains, ChainProfile, Window};

pub const DEFAULT_CONFIG_PATH: &str = "config/default.toml";

/// Largest simulated step per tick: one day.
pub const MAX_STEP_SECS: f64 = 86_400.0;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub general: General,
    pub simulation: Simulation,
    pub stream: Stream,
    pub web: Option<Web>,
    #[serde(default = "default_chains")]
    pub chains: Vec<ChainProfile>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct General {
    pub log_level: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Simulation {
    pub tick_interval_ms: u64,
    /// Simulated seconds added per tick.
    pub step_secs: f64,
    pub history_capacity: usize,
    pub fraud_event_capacity: usize,
    pub fraud_event_probability: f64,
    pub mixing_probability: f64,
    pub bridge_probability: f64,
    pub fraud_activity_probability: f64,
    #[serde(default = "default_true")]
    pub autostart: bool,
    #[serde(default = "default_stop_timeout_ms")]
    pub stop_timeout_ms: u64,
    pub seed: Option<u64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Stream {
    pub interval_ms: u64,
    pub window: Window,
}

#[derive(Debug, Deserialize, Clone)]
pub struct Web {
    pub port: u16,
    pub host: String,
}

fn default_true() -> bool {
    true
}

fn default_stop_timeout_ms() -> u64 {
    5000
}

impl Simulation {
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    pub fn stop_timeout(&self) -> Duration {
        Duration::from_millis(self.stop_timeout_ms)
    }
}

impl Stream {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        Self::load_from(DEFAULT_CONFIG_PATH)
    }

    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file: {}", path.display()))?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(s: &str) -> Result<Self> {
        let config: Self = toml::from_str(s).context("failed to parse config")?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        let sim = &self.simulation;
        anyhow::ensure!(
            sim.tick_interval_ms > 0,
            "simulation.tick_interval_ms must be > 0"
        );
        anyhow::ensure!(
            (0.0..=MAX_STEP_SECS).contains(&sim.step_secs),
            "simulation.step_secs must be in [0, {MAX_STEP_SECS}]"
        );
        anyhow::ensure!(
            sim.history_capacity > 0,
            "simulation.history_capacity must be > 0"
        );
        anyhow::ensure!(
            sim.fraud_event_capacity > 0,
            "simulation.fraud_event_capacity must be > 0"
        );
        for (name, p) in [
            ("fraud_event_probability", sim.fraud_event_probability),
            ("mixing_probability", sim.mixing_probability),
            ("bridge_probability", sim.bridge_probability),
            ("fraud_activity_probability", sim.fraud_activity_probability),
        ] {
            anyhow::ensure!(
                (0.0..=1.0).contains(&p),
                "simulation.{name} must be in [0, 1]"
            );
        }
        anyhow::ensure!(self.stream.interval_ms > 0, "stream.interval_ms must be > 0");
        anyhow::ensure!(!self.chains.is_empty(), "at least one chain is required");
        for chain in &self.chains {
            anyhow::ensure!(
                chain.base_balance >= 0.0,
                "chain {} base_balance must be >= 0",
                chain.id
            );
            anyhow::ensure!(
                chain.volatility >= 0.0,
                "chain {} volatility must be >= 0",
                chain.id
            );
        }
        let mut ids: Vec<&str> = self.chains.iter().map(|c| c.id.as_str()).collect();
        ids.sort_unstable();
        ids.dedup();
        anyhow::ensure!(ids.len() == self.chains.len(), "chain ids must be unique");
        Ok(())
    }
}

impl FromStr for Config {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Self::from_toml_str(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::FlowRole;

    fn minimal() -> &'static str {
        r#"
[general]
log_level = "info"

[simulation]
tick_interval_ms = 1000
step_secs = 1.0
history_capacity = 200
fraud_event_capacity = 50
fraud_event_probability = 0.10
mixing_probability = 0.08
bridge_probability = 0.12
fraud_activity_probability = 0.15

[stream]
interval_ms = 2000
window = "1M"
"#
    }

    #[test]
    fn test_load_default_config() {
        let config = Config::from_toml_str(include_str!("../../../config/default.toml")).unwrap();
        assert_eq!(config.general.log_level, "info");
        assert_eq!(config.simulation.history_capacity, 200);
        assert_eq!(config.simulation.fraud_event_capacity, 50);
        assert_eq!(config.stream.window, Window::OneMinute);
        assert_eq!(config.stream.interval(), Duration::from_secs(2));
        assert_eq!(config.simulation.tick_interval(), Duration::from_secs(1));
    }

    #[test]
    fn test_web_config_section() {
        let config = Config::from_toml_str(include_str!("../../../config/default.toml")).unwrap();
        let web = config.web.expect("web section should be present");
        assert_eq!(web.port, 8080);
        assert_eq!(web.host, "0.0.0.0");
    }

    #[test]
    fn test_web_config_optional() {
        let config = Config::from_toml_str(minimal()).unwrap();
        assert!(config.web.is_none());
        assert!(config.simulation.autostart);
        assert_eq!(config.simulation.stop_timeout_ms, 5000);
        assert!(config.simulation.seed.is_none());
    }

    #[test]
    fn test_chains_default_when_absent() {
        let config = Config::from_toml_str(minimal()).unwrap();
        assert_eq!(config.chains, default_chains());
    }

    #[test]
    fn test_chains_override() {
        let toml = format!(
            "{}\n{}",
            minimal(),
            r##"
[[chains]]
id = "solana"
name = "Solana"
color = "#14F195"
base_balance = 300000.0
volatility = 0.3
trend = 0.0
"##
        );
        let config = Config::from_toml_str(&toml).unwrap();
        assert_eq!(config.chains.len(), 1);
        assert_eq!(config.chains[0].id, "solana");
        assert_eq!(config.chains[0].role, FlowRole::Neutral);
    }

    #[test]
    fn test_validate_probability_out_of_range() {
        let content = minimal().replace("mixing_probability = 0.08", "mixing_probability = 1.5");
        let err = Config::from_toml_str(&content).unwrap_err();
        assert!(err
            .to_string()
            .contains("simulation.mixing_probability must be in [0, 1]"));
    }

    #[test]
    fn test_validate_negative_step() {
        let content = minimal().replace("step_secs = 1.0", "step_secs = -1.0");
        assert!(Config::from_toml_str(&content).is_err());
    }

    #[test]
    fn test_validate_step_upper_bound() {
        let content = minimal().replace("step_secs = 1.0", "step_secs = 1e11");
        let err = Config::from_toml_str(&content).unwrap_err();
        assert!(err.to_string().contains("simulation.step_secs must be in [0, 86400]"));

        let content = minimal().replace("step_secs = 1.0", "step_secs = 86400.0");
        assert!(Config::from_toml_str(&content).is_ok());

        let content = minimal().replace("step_secs = 1.0", "step_secs = nan");
        assert!(Config::from_toml_str(&content).is_err());
    }

    #[test]
    fn test_unknown_stream_window_rejected() {
        let content = minimal().replace("window = \"1M\"", "window = \"7D\"");
        assert!(Config::from_toml_str(&content).is_err());
    }

    #[test]
    fn test_load_from_file() {
        let mut tmp = tempfile::NamedTempFile::new().unwrap();
        std::io::Write::write_all(&mut tmp, minimal().as_bytes()).unwrap();
        let config = Config::load_from(tmp.path()).unwrap();
        assert_eq!(config.stream.interval_ms, 2000);
    }

    #[test]
    fn test_load_reads_default_path() {
        // Tests run from the crate directory, which has no config/ of its own.
        let err = Config::load().unwrap_err();
        assert!(err.to_string().contains(DEFAULT_CONFIG_PATH));
    }

    #[test]
    fn test_load_missing_file_has_context() {
        let err = Config::load_from("does/not/exist.toml").unwrap_err();
        assert!(err.to_string().contains("failed to read config file"));
    }
}
