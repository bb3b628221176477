//! Crate-wide configuration, deserialized from TOML.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

fn default_true() -> bool {
    true
}

/// Top-level configuration for a running node.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub chain: ChainConfig,
    #[serde(default)]
    pub peering: PeeringConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Root directory for content-addressed storage and unpacked bundles.
    pub root: PathBuf,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self { root: PathBuf::from("./data") }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChainConfig {
    pub contract_address: String,
    #[serde(default = "default_start_size")]
    pub start_size: u64,
    #[serde(default = "default_min_size")]
    pub min_size: u64,
    #[serde(default = "default_max_size")]
    pub max_size: u64,
    #[serde(default = "default_target_time")]
    pub target_time_secs: f64,
    #[serde(default = "default_block_sleep")]
    pub block_sleep_interval_secs: u64,
}

fn default_start_size() -> u64 {
    100
}
fn default_min_size() -> u64 {
    1
}
fn default_max_size() -> u64 {
    1000
}
fn default_target_time() -> f64 {
    10.0
}
fn default_block_sleep() -> u64 {
    15
}

impl Default for ChainConfig {
    fn default() -> Self {
        Self {
            contract_address: String::new(),
            start_size: default_start_size(),
            min_size: default_min_size(),
            max_size: default_max_size(),
            target_time_secs: default_target_time(),
            block_sleep_interval_secs: default_block_sleep(),
        }
    }
}

impl ChainConfig {
    pub fn block_sleep_interval(&self) -> Duration {
        Duration::from_secs(self.block_sleep_interval_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PeeringConfig {
    #[serde(default = "default_max_peer_count")]
    pub max_peer_count: usize,
    #[serde(default = "default_max_depth")]
    pub max_discovery_depth: usize,
    #[serde(default = "default_success_threshold")]
    pub distribution_success_threshold: usize,
    /// SOCKS5 proxy URL used for every outbound peer call.
    #[serde(default = "default_proxy_url")]
    pub proxy_url: String,
    #[serde(default = "default_true")]
    pub verify_peer_responses: bool,
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,
    #[serde(default = "default_read_timeout")]
    pub read_timeout_secs: u64,
    #[serde(default = "default_total_timeout")]
    pub total_timeout_secs: u64,
}

fn default_max_peer_count() -> usize {
    1000
}
fn default_max_depth() -> usize {
    25
}
fn default_success_threshold() -> usize {
    10
}
fn default_proxy_url() -> String {
    "socks5h://127.0.0.1:9050".to_string()
}
fn default_connect_timeout() -> u64 {
    30
}
fn default_read_timeout() -> u64 {
    10
}
fn default_total_timeout() -> u64 {
    60
}

impl Default for PeeringConfig {
    fn default() -> Self {
        Self {
            max_peer_count: default_max_peer_count(),
            max_discovery_depth: default_max_depth(),
            distribution_success_threshold: default_success_threshold(),
            proxy_url: default_proxy_url(),
            verify_peer_responses: true,
            connect_timeout_secs: default_connect_timeout(),
            read_timeout_secs: default_read_timeout(),
            total_timeout_secs: default_total_timeout(),
        }
    }
}

impl PeeringConfig {
    pub fn timeouts(&self) -> crate::peer::Timeouts {
        crate::peer::Timeouts {
            total: Duration::from_secs(self.total_timeout_secs),
            connect: Duration::from_secs(self.connect_timeout_secs),
            read_idle: Duration::from_secs(self.read_timeout_secs),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            store: StoreConfig::default(),
            chain: ChainConfig::default(),
            peering: PeeringConfig::default(),
        }
    }
}

impl Config {
    /// Parse a `Config` from TOML source.
    pub fn from_toml(raw: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minimal_toml_fills_defaults() {
        let config = Config::from_toml(
            r#"
            [chain]
            contract_address = "0xabc"
            "#,
        )
        .unwrap();
        assert_eq!(config.chain.contract_address, "0xabc");
        assert_eq!(config.chain.start_size, 100);
        assert_eq!(config.peering.max_peer_count, 1000);
    }
}
