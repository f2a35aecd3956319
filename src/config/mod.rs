//! Configuration management for the relayer
//!
//! Loads from YAML/TOML files + environment variables via .env

use anyhow::{bail, Context, Result};
use config::{Config, Environment, File};
use serde::Deserialize;

/// Main application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub ethereum: EthereumConfig,
    pub relayer: RelayerConfig,
    #[serde(default)]
    pub pairs: Vec<PairEntry>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EthereumConfig {
    /// JSON-RPC endpoint of the chain the oracles live on
    pub rpc_url: String,
    /// Chain id used for transaction signing
    pub chain_id: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RelayerConfig {
    /// Relay tick interval in seconds
    pub interval_secs: u64,
    /// Feeder addresses whose signed prices are accepted
    pub feeds: Vec<String>,
}

/// One configured asset pair and its oracle contract
#[derive(Debug, Clone, Deserialize)]
pub struct PairEntry {
    /// Asset pair name, e.g. ETHUSD
    pub name: String,
    /// Median oracle contract address
    pub oracle: String,
    /// Minimum spread (percent) required to send an update
    pub oracle_spread: f64,
    /// Maximum age of the oracle price in seconds before an update is forced
    pub oracle_expiration_secs: u64,
    /// Maximum TTL of feeder prices in seconds
    pub price_expiration_secs: u64,
}

impl AppConfig {
    /// Load configuration from file and environment
    pub fn load() -> Result<Self> {
        // Load .env file first
        dotenvy::dotenv().ok();

        let config = Config::builder()
            .set_default("ethereum.rpc_url", "http://127.0.0.1:8545")?
            .set_default("ethereum.chain_id", 1)?
            .set_default("relayer.interval_secs", 60)?
            .set_default("relayer.feeds", Vec::<String>::new())?
            // Load config file if exists
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name("config/local").required(false))
            // Override with environment variables (SPIRE_*)
            .add_source(Environment::with_prefix("SPIRE").separator("__"))
            .build()
            .context("Failed to build configuration")?;

        config
            .try_deserialize()
            .context("Failed to deserialize configuration")
    }

    /// Generate a digest of the config (without secrets) for logging
    pub fn digest(&self) -> String {
        format!(
            "rpc={} chain_id={} interval={}s feeds={} pairs={:?}",
            self.ethereum.rpc_url,
            self.ethereum.chain_id,
            self.relayer.interval_secs,
            self.relayer.feeds.len(),
            self.pairs.iter().map(|p| p.name.as_str()).collect::<Vec<_>>(),
        )
    }

    /// Validate required environment variables
    pub fn validate_env(&self) -> Result<()> {
        let pk = std::env::var("SPIRE_PRIVATE_KEY")
            .context("Required environment variable SPIRE_PRIVATE_KEY is not set")?;
        if !pk.starts_with("0x") || pk.len() != 66 {
            bail!("SPIRE_PRIVATE_KEY must be a hex string with 0x prefix (66 chars total)");
        }
        Ok(())
    }
}

impl std::fmt::Display for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.digest())
    }
}
