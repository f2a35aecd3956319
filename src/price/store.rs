//! Per-pair store of signed feeder observations.
//!
//! Keeps at most one observation per feeder (the most recent wins) and
//! supports the pruning, truncation and median queries the relay decision
//! needs. Input validation happens in the relayer; the store only enforces
//! its own key invariant.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use ethers::types::{Address, U256};
use thiserror::Error;

use crate::types::PriceObservation;

#[derive(Debug, Error)]
pub enum StoreError {
    /// The observation carries no usable signer identity.
    #[error("invalid observation: missing signer address")]
    InvalidObservation,
}

/// Collection of feeder observations for one asset pair, keyed by signer.
#[derive(Debug, Default)]
pub struct PriceStore {
    prices: HashMap<Address, PriceObservation>,
}

impl PriceStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert an observation. An existing entry from the same feeder is
    /// replaced only when the incoming observation is at least as recent.
    pub fn add(&mut self, observation: PriceObservation) -> Result<(), StoreError> {
        if observation.from == Address::zero() {
            return Err(StoreError::InvalidObservation);
        }
        match self.prices.get(&observation.from) {
            Some(existing) if existing.age > observation.age => {}
            _ => {
                self.prices.insert(observation.from, observation);
            }
        }
        Ok(())
    }

    /// Drop observations with a timestamp strictly earlier than `cutoff`.
    pub fn clear_older_than(&mut self, cutoff: DateTime<Utc>) {
        self.prices.retain(|_, obs| obs.age >= cutoff);
    }

    /// Keep only the `n` newest observations; ties broken by feeder address.
    pub fn truncate(&mut self, n: usize) {
        if self.prices.len() <= n {
            return;
        }
        let mut newest: Vec<(DateTime<Utc>, Address)> = self
            .prices
            .values()
            .map(|obs| (obs.age, obs.from))
            .collect();
        newest.sort_by(|a, b| b.0.cmp(&a.0).then_with(|| a.1.cmp(&b.1)));
        let keep: Vec<Address> = newest.into_iter().take(n).map(|(_, from)| from).collect();
        self.prices.retain(|from, _| keep.contains(from));
    }

    pub fn len(&self) -> usize {
        self.prices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.prices.is_empty()
    }

    /// Median of the stored values; an even count takes the floor average of
    /// the two middle values.
    pub fn median(&self) -> Option<U256> {
        if self.prices.is_empty() {
            return None;
        }
        let mut vals: Vec<U256> = self.prices.values().map(|obs| obs.val).collect();
        vals.sort();
        let mid = vals.len() / 2;
        if vals.len() % 2 == 1 {
            Some(vals[mid])
        } else {
            Some(avg(vals[mid - 1], vals[mid]))
        }
    }

    /// All observations ordered ascending by value (ties by feeder address),
    /// the order the median contract expects in `poke`.
    pub fn get(&self) -> Vec<PriceObservation> {
        let mut all: Vec<PriceObservation> = self.prices.values().cloned().collect();
        all.sort_by(|a, b| a.val.cmp(&b.val).then_with(|| a.from.cmp(&b.from)));
        all
    }

    pub fn clear(&mut self) {
        self.prices.clear();
    }
}

/// Overflow-safe floor average.
fn avg(a: U256, b: U256) -> U256 {
    (a >> 1) + (b >> 1) + (a & b & U256::one())
}
