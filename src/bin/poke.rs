//! Directly invokes the aggregate poker contract's poke method
//!
//! Usage: cargo run --bin poke -- <poker_address>
//!
//! Simulates the call first and only submits when the dry run succeeds;
//! prints the transaction hash on success.

use std::sync::Arc;

use anyhow::{bail, Context, Result};
use tracing_subscriber::EnvFilter;

use spire_relay::config::AppConfig;
use spire_relay::oracle::{PokerClient, RpcClient};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let mut args = std::env::args().skip(1);
    let address = match args.next() {
        Some(arg) => arg
            .parse()
            .context("invalid poker contract address")?,
        None => bail!("usage: poke <poker_address>"),
    };

    let cfg = AppConfig::load()?;
    cfg.validate_env()?;
    let private_key =
        std::env::var("SPIRE_PRIVATE_KEY").context("SPIRE_PRIVATE_KEY is not set")?;
    let client = Arc::new(RpcClient::new(
        &cfg.ethereum.rpc_url,
        &private_key,
        cfg.ethereum.chain_id,
    )?);

    let poker = PokerClient::new(client, address);
    let tx = poker.poke(true).await?;
    println!("Transaction: {tx:?}");

    Ok(())
}
