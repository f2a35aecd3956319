//! Relayer orchestration
//!
//! Collects signed feeder prices from the transport and periodically decides,
//! per pair, whether the on-chain oracle needs an update.
//!
//! Two tasks share one lock: the collector validates and stores inbound
//! observations, the ticker reads oracle state and relays when the recorded
//! price is expired or has drifted past the pair's spread threshold. The lock
//! spans the whole of `collect` and `relay` including the oracle RPC round
//! trips, so a slow relay holds off collection for every pair until it
//! finishes.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use ethers::types::{Address, H256};
use thiserror::Error;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::oracle::{MedianOracle, OracleError};
use crate::price::PriceStore;
use crate::transport::{PriceMessage, Transport, TransportError, PRICE_TOPIC};
use crate::types::{calc_spread, PriceObservation};

#[derive(Debug, Error)]
pub enum RelayerError {
    #[error("received price has an invalid signature (pair: {pair})")]
    InvalidSignature { pair: String },
    #[error("feeder {from} is not on the allow-list (pair: {pair})")]
    UnauthorizedFeeder { pair: String, from: Address },
    #[error("received price is not positive (pair: {pair}, from: {from})")]
    InvalidPrice { pair: String, from: Address },
    #[error("received pair is not configured (pair: {pair})")]
    UnknownPair { pair: String },
    #[error("not enough prices to achieve a quorum for {pair} ({have}/{want})")]
    QuorumNotReached {
        pair: String,
        have: usize,
        want: usize,
    },
    #[error(transparent)]
    Oracle(#[from] OracleError),
    #[error("transport subscribe failed: {0}")]
    Subscribe(#[source] TransportError),
    #[error("transport unsubscribe failed: {0}")]
    Unsubscribe(#[source] TransportError),
}

/// Per-pair relay configuration plus the pair's owned price store.
pub struct Pair {
    /// Asset pair name, e.g. ETHUSD.
    pub asset_pair: String,
    /// Minimum spread (percent) between the oracle price and the fresh
    /// median required to send an update.
    pub oracle_spread: f64,
    /// Maximum age of the oracle's recorded price before an update is forced.
    pub oracle_expiration: Duration,
    /// Maximum TTL of a feeder price.
    pub price_expiration: Duration,
    /// Client for this pair's median oracle contract.
    pub median: Arc<dyn MedianOracle>,
    prices: PriceStore,
}

impl Pair {
    pub fn new(
        asset_pair: impl Into<String>,
        oracle_spread: f64,
        oracle_expiration: Duration,
        price_expiration: Duration,
        median: Arc<dyn MedianOracle>,
    ) -> Self {
        Self {
            asset_pair: asset_pair.into(),
            oracle_spread,
            oracle_expiration,
            price_expiration,
            median,
            prices: PriceStore::new(),
        }
    }
}

struct State {
    feeds: Vec<Address>,
    pairs: HashMap<String, Pair>,
}

impl State {
    /// Validate an inbound price message and append it to its pair's store.
    fn collect(&mut self, message: &PriceMessage) -> Result<PriceObservation, RelayerError> {
        let pair = message.asset_pair.clone();

        let age = match DateTime::<Utc>::from_timestamp(message.age, 0) {
            Some(age) => age,
            None => return Err(RelayerError::InvalidSignature { pair }),
        };
        let from = match PriceObservation::recover(&pair, message.val, age, message.sig) {
            Ok(from) if from != Address::zero() => from,
            _ => return Err(RelayerError::InvalidSignature { pair }),
        };
        if !self.feeds.contains(&from) {
            return Err(RelayerError::UnauthorizedFeeder { pair, from });
        }
        if message.val.is_zero() {
            return Err(RelayerError::InvalidPrice { pair, from });
        }

        let observation = PriceObservation {
            asset_pair: pair.clone(),
            val: message.val,
            age,
            from,
            sig: message.sig,
        };
        match self.pairs.get_mut(&pair) {
            Some(entry) => {
                entry
                    .prices
                    .add(observation.clone())
                    .map_err(|_| RelayerError::InvalidSignature { pair })?;
                Ok(observation)
            }
            None => Err(RelayerError::UnknownPair { pair }),
        }
    }

    /// Run one relay decision for a pair: read fresh oracle state, prune and
    /// truncate the store, check quorum, and poke when the recorded price is
    /// expired or stale. Returns the transaction hash when an update was sent.
    async fn relay(&mut self, asset_pair: &str) -> Result<Option<H256>, RelayerError> {
        let pair = match self.pairs.get_mut(asset_pair) {
            Some(pair) => pair,
            None => {
                return Err(RelayerError::UnknownPair {
                    pair: asset_pair.to_string(),
                })
            }
        };

        let oracle_quorum = pair.median.bar().await?;
        let oracle_time = pair.median.age().await?;
        let oracle_price = pair.median.price().await?;

        let now = Utc::now();

        // Clear expired prices: anything past the feeder TTL, and anything
        // at or before the oracle's own record.
        let cutoff = now
            .checked_sub_signed(chrono_duration(pair.price_expiration))
            .unwrap_or(DateTime::<Utc>::MIN_UTC);
        pair.prices.clear_older_than(cutoff);
        pair.prices.clear_older_than(oracle_time);

        // Use only the minimum prices required to achieve a quorum.
        pair.prices.truncate(oracle_quorum);

        if pair.prices.len() != oracle_quorum {
            return Err(RelayerError::QuorumNotReached {
                pair: asset_pair.to_string(),
                have: pair.prices.len(),
                want: oracle_quorum,
            });
        }

        let median = pair.prices.median().unwrap_or_default();
        let spread = calc_spread(oracle_price, median);

        let is_expired =
            now.signed_duration_since(oracle_time) >= chrono_duration(pair.oracle_expiration);
        let is_stale = spread.abs() >= pair.oracle_spread;

        debug!(
            pair = asset_pair,
            quorum = oracle_quorum,
            %median,
            spread,
            is_expired,
            is_stale,
            "relay decision"
        );

        if is_expired || is_stale {
            let observations = pair.prices.get();
            let result = pair.median.poke(&observations, false).await;
            // Consumed prices are dropped whether or not the submission went
            // through; the next round starts from fresh feeds.
            pair.prices.clear();
            return result.map(Some).map_err(RelayerError::from);
        }

        Ok(None)
    }
}

/// Relays feeder prices to oracle contracts once quorum and staleness checks
/// pass.
pub struct Relayer {
    transport: Arc<dyn Transport>,
    interval: Duration,
    state: Arc<Mutex<State>>,
    shutdown: watch::Sender<bool>,
    collector: Option<JoinHandle<()>>,
    ticker: Option<JoinHandle<()>>,
}

impl Relayer {
    pub fn new(feeds: Vec<Address>, transport: Arc<dyn Transport>, interval: Duration) -> Self {
        let (shutdown, _) = watch::channel(false);
        Self {
            transport,
            interval,
            state: Arc::new(Mutex::new(State {
                feeds,
                pairs: HashMap::new(),
            })),
            shutdown,
            collector: None,
            ticker: None,
        }
    }

    /// Register an asset pair. Must happen before `start` delivers ticks for
    /// it.
    pub async fn add_pair(&self, pair: Pair) {
        let mut state = self.state.lock().await;
        state.pairs.insert(pair.asset_pair.clone(), pair);
    }

    /// Subscribe to the price topic and spawn the collector and ticker tasks.
    /// Returns once both are scheduled.
    pub async fn start(&mut self) -> Result<(), RelayerError> {
        self.transport
            .subscribe(PRICE_TOPIC)
            .await
            .map_err(RelayerError::Subscribe)?;
        let mut deliveries = self
            .transport
            .wait_for(PRICE_TOPIC)
            .await
            .map_err(RelayerError::Subscribe)?;

        let collector_state = Arc::clone(&self.state);
        let mut shutdown_rx = self.shutdown.subscribe();
        self.collector = Some(tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = shutdown_rx.changed() => break,
                    delivery = deliveries.recv() => match delivery {
                        None => break,
                        Some(Err(err)) => {
                            warn!(error = %err, "unable to read prices from the network");
                        }
                        Some(Ok(message)) => {
                            let mut state = collector_state.lock().await;
                            match state.collect(&message) {
                                Ok(obs) => info!(
                                    pair = %obs.asset_pair,
                                    from = %obs.from,
                                    val = %obs.val,
                                    age = %obs.age,
                                    "received price"
                                ),
                                Err(err) => warn!(error = %err, "received invalid price"),
                            }
                        }
                    }
                }
            }
        }));

        let ticker_state = Arc::clone(&self.state);
        let interval = self.interval;
        let mut shutdown_rx = self.shutdown.subscribe();
        self.ticker = Some(tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + interval, interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                tokio::select! {
                    _ = shutdown_rx.changed() => break,
                    _ = ticker.tick() => {
                        let asset_pairs: Vec<String> = {
                            ticker_state.lock().await.pairs.keys().cloned().collect()
                        };
                        for asset_pair in asset_pairs {
                            let mut state = ticker_state.lock().await;
                            match state.relay(&asset_pair).await {
                                Ok(Some(tx)) => {
                                    info!(pair = %asset_pair, tx = ?tx, "prices relayed")
                                }
                                Ok(None) => debug!(pair = %asset_pair, "oracle is up to date"),
                                Err(err) => {
                                    warn!(pair = %asset_pair, error = %err, "unable to relay prices")
                                }
                            }
                        }
                    }
                }
            }
        }));

        Ok(())
    }

    /// Unsubscribe from the transport, signal both tasks, and wait for them
    /// to exit. The termination signal goes out even when the unsubscribe
    /// failed.
    pub async fn stop(&mut self) -> Result<(), RelayerError> {
        let unsubscribed = self.transport.unsubscribe(PRICE_TOPIC).await;
        let _ = self.shutdown.send(true);
        if let Some(handle) = self.collector.take() {
            let _ = handle.await;
        }
        if let Some(handle) = self.ticker.take() {
            let _ = handle.await;
        }
        unsubscribed.map_err(RelayerError::Unsubscribe)
    }
}

fn chrono_duration(duration: Duration) -> chrono::Duration {
    chrono::Duration::from_std(duration).unwrap_or_else(|_| chrono::Duration::max_value())
}
