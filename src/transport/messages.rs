//! Wire format for signed price events.

use ethers::types::{Signature, U256};
use serde::{Deserialize, Serialize};

use crate::types::PriceObservation;

/// Topic signed price events are gossiped on.
pub const PRICE_TOPIC: &str = "price";

/// Signed price event as it travels over the transport. The feeder address
/// is recovered from the signature, never trusted from the wire.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriceMessage {
    /// Asset pair name, e.g. ETHUSD.
    pub asset_pair: String,
    /// Price in oracle base units.
    pub val: U256,
    /// Observation time, unix seconds.
    pub age: i64,
    /// Signature over the observation digest.
    pub sig: Signature,
}

impl PriceMessage {
    pub fn from_observation(obs: &PriceObservation) -> Self {
        Self {
            asset_pair: obs.asset_pair.clone(),
            val: obs.val,
            age: obs.age.timestamp(),
            sig: obs.sig,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Utc};
    use ethers::signers::LocalWallet;

    #[test]
    fn json_round_trip() {
        let wallet = LocalWallet::new(&mut rand::thread_rng());
        let age = DateTime::<Utc>::from_timestamp(1_700_000_000, 0).unwrap();
        let obs = PriceObservation::sign(&wallet, "ETHUSD", U256::from(1850), age).unwrap();

        let msg = PriceMessage::from_observation(&obs);
        let raw = serde_json::to_vec(&msg).unwrap();
        let back: PriceMessage = serde_json::from_slice(&raw).unwrap();

        assert_eq!(back.asset_pair, "ETHUSD");
        assert_eq!(back.val, U256::from(1850));
        assert_eq!(back.age, 1_700_000_000);
        assert_eq!(back.sig, obs.sig);
    }
}
