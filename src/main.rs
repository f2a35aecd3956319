//! Relayer daemon entry point
//!
//! Wires configuration, the RPC client, the transport and the relayer, then
//! runs until interrupted.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tracing::info;
use tracing_subscriber::EnvFilter;

use spire_relay::config::AppConfig;
use spire_relay::oracle::{MedianClient, RpcClient};
use spire_relay::relayer::{Pair, Relayer};
use spire_relay::transport::LocalTransport;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cfg = AppConfig::load()?;
    cfg.validate_env()?;
    info!(config = %cfg.digest(), "starting relayer");

    let private_key =
        std::env::var("SPIRE_PRIVATE_KEY").context("SPIRE_PRIVATE_KEY is not set")?;
    let client = Arc::new(RpcClient::new(
        &cfg.ethereum.rpc_url,
        &private_key,
        cfg.ethereum.chain_id,
    )?);
    info!(address = ?client.address(), "relayer wallet ready");

    let feeds = cfg
        .relayer
        .feeds
        .iter()
        .map(|f| {
            f.parse()
                .with_context(|| format!("invalid feed address {f}"))
        })
        .collect::<Result<Vec<_>>>()?;

    let transport = Arc::new(LocalTransport::new());
    let mut relayer = Relayer::new(
        feeds,
        transport,
        Duration::from_secs(cfg.relayer.interval_secs),
    );

    for entry in &cfg.pairs {
        let address = entry
            .oracle
            .parse()
            .with_context(|| format!("invalid oracle address for pair {}", entry.name))?;
        let median = Arc::new(MedianClient::new(Arc::clone(&client), address));
        relayer
            .add_pair(Pair::new(
                entry.name.as_str(),
                entry.oracle_spread,
                Duration::from_secs(entry.oracle_expiration_secs),
                Duration::from_secs(entry.price_expiration_secs),
                median,
            ))
            .await;
    }

    relayer.start().await?;
    info!("relayer started; press ctrl-c to stop");

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for shutdown signal")?;
    info!("shutting down");
    relayer.stop().await?;

    Ok(())
}
