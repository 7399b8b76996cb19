use std::{fmt::Display, io, path::Path};

use eth_bsw::{EthIfConfig, EthTSynConfig};
use serde::Deserialize;

use crate::logging::LogLevel;

#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct SimConfig {
    #[serde(default)]
    pub log_level: LogLevel,
    /// Number of main function periods to simulate.
    #[serde(default = "default_ticks")]
    pub ticks: u64,
    /// How much faster than real time the main functions are scheduled.
    #[serde(default = "default_speedup")]
    pub speedup: u32,
    /// Seed of the wire jitter.
    #[serde(default)]
    pub seed: u64,
    #[serde(default)]
    pub wire: WireConfig,
    #[serde(rename = "node")]
    pub nodes: Vec<NodeConfig>,
}

/// The cable between the two nodes.
#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct WireConfig {
    #[serde(default = "default_delay_ns")]
    pub delay_ns: u64,
    /// Upper bound of the uniformly distributed extra delay per frame.
    #[serde(default)]
    pub jitter_ns: u64,
    #[serde(default, rename = "cable-pull")]
    pub cable_pulls: Vec<CablePull>,
}

impl Default for WireConfig {
    fn default() -> Self {
        Self {
            delay_ns: default_delay_ns(),
            jitter_ns: 0,
            cable_pulls: vec![],
        }
    }
}

/// The cable is unplugged for `duration_ticks` starting at `at_tick`.
#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct CablePull {
    pub at_tick: u64,
    pub duration_ticks: u64,
}

impl CablePull {
    pub fn covers(&self, tick: u64) -> bool {
        tick >= self.at_tick && tick - self.at_tick < self.duration_ticks
    }
}

#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct NodeConfig {
    pub name: String,
    pub mac: [u8; 6],
    /// Offset of the local clock against simulation time.
    #[serde(default)]
    pub clock_offset_ns: i64,
    /// Frequency error of the local clock in parts per billion.
    #[serde(default)]
    pub clock_drift_ppb: i64,
    pub ethif: EthIfConfig,
    pub ethtsyn: EthTSynConfig,
}

fn default_ticks() -> u64 {
    1000
}

fn default_speedup() -> u32 {
    10
}

fn default_delay_ns() -> u64 {
    500
}

impl SimConfig {
    pub fn from_file(file: impl AsRef<Path>) -> Result<SimConfig, ConfigError> {
        let contents = std::fs::read_to_string(file)?;
        let config: SimConfig = toml::de::from_str(&contents)?;
        config.check()?;
        Ok(config)
    }

    /// Checks the parts the node modules do not validate themselves.
    pub fn check(&self) -> Result<(), ConfigError> {
        if self.nodes.len() != 2 {
            return Err(ConfigError::NodeCount(self.nodes.len()));
        }
        if self.speedup == 0 {
            return Err(ConfigError::Invalid("speedup must be at least one"));
        }
        let periods = self
            .nodes
            .iter()
            .map(|node| node.ethtsyn.main_function_period_ms);
        if periods.clone().any(|period| period == 0) {
            return Err(ConfigError::Invalid("main function period must be non-zero"));
        }
        if periods.clone().min() != periods.max() {
            return Err(ConfigError::Invalid(
                "nodes must share one main function period",
            ));
        }
        if self.nodes[0].mac == self.nodes[1].mac {
            return Err(ConfigError::Invalid("nodes must have distinct MAC addresses"));
        }
        Ok(())
    }

    pub fn period_ms(&self) -> u32 {
        self.nodes
            .first()
            .map(|node| node.ethtsyn.main_function_period_ms)
            .unwrap_or(1)
    }
}

#[derive(Debug)]
pub enum ConfigError {
    Io(io::Error),
    Toml(toml::de::Error),
    NodeCount(usize),
    Invalid(&'static str),
}

impl std::error::Error for ConfigError {}

impl Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io(e) => write!(f, "io error while reading config: {e}"),
            Self::Toml(e) => write!(f, "config toml parsing error: {e}"),
            Self::NodeCount(n) => write!(f, "exactly two nodes are simulated, {n} configured"),
            Self::Invalid(e) => write!(f, "invalid config: {e}"),
        }
    }
}

impl From<io::Error> for ConfigError {
    fn from(value: io::Error) -> Self {
        Self::Io(value)
    }
}

impl From<toml::de::Error> for ConfigError {
    fn from(value: toml::de::Error) -> Self {
        Self::Toml(value)
    }
}
