//! Core types shared across the relayer
//!
//! Defines the signed price observation, the digest feeders sign it over,
//! and the spread math used by the relay decision.

use chrono::{DateTime, Utc};
use ethers::signers::{LocalWallet, Signer, WalletError};
use ethers::types::{Address, RecoveryMessage, Signature, SignatureError, H256, U256};
use ethers::utils::{hash_message, keccak256};
use serde::{Deserialize, Serialize};

/// One signed feeder price report for a single asset pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceObservation {
    /// Asset pair name, e.g. ETHUSD.
    pub asset_pair: String,
    /// Price in oracle base units.
    pub val: U256,
    /// Time of the observation.
    pub age: DateTime<Utc>,
    /// Feeder address recovered from the signature.
    pub from: Address,
    /// Signature over the observation digest.
    pub sig: Signature,
}

impl PriceObservation {
    /// Recover the signer of a raw signed report.
    pub fn recover(
        asset_pair: &str,
        val: U256,
        age: DateTime<Utc>,
        sig: Signature,
    ) -> Result<Address, SignatureError> {
        let digest = observation_digest(asset_pair, val, age);
        sig.recover(RecoveryMessage::Hash(digest))
    }

    /// Sign a fresh observation with a feeder wallet.
    pub fn sign(
        wallet: &LocalWallet,
        asset_pair: impl Into<String>,
        val: U256,
        age: DateTime<Utc>,
    ) -> Result<Self, WalletError> {
        let asset_pair = asset_pair.into();
        let digest = observation_digest(&asset_pair, val, age);
        let sig = wallet.sign_hash(digest)?;
        Ok(Self {
            from: wallet.address(),
            asset_pair,
            val,
            age,
            sig,
        })
    }
}

/// Digest a feeder signs: `keccak256(val || age || pair)` wrapped in the
/// standard Ethereum signed-message prefix. `val` and `age` are 32-byte
/// big-endian words, the pair name is raw UTF-8.
pub fn observation_digest(asset_pair: &str, val: U256, age: DateTime<Utc>) -> H256 {
    let mut word = [0u8; 32];
    let mut data = Vec::with_capacity(64 + asset_pair.len());
    val.to_big_endian(&mut word);
    data.extend_from_slice(&word);
    U256::from(age.timestamp().max(0) as u64).to_big_endian(&mut word);
    data.extend_from_slice(&word);
    data.extend_from_slice(asset_pair.as_bytes());
    hash_message(keccak256(&data))
}

/// Signed percentage spread between the oracle price and a new price.
pub fn calc_spread(old_price: U256, new_price: U256) -> f64 {
    let old = u256_to_f64(old_price);
    let new = u256_to_f64(new_price);
    (new - old) / old * 100.0
}

/// Lossy conversion for spread math; oracle prices fit the f64 range.
pub fn u256_to_f64(val: U256) -> f64 {
    val.to_string().parse().unwrap_or(f64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spread_is_signed_percentage() {
        assert_eq!(calc_spread(U256::from(100), U256::from(110)), 10.0);
        assert_eq!(calc_spread(U256::from(100), U256::from(90)), -10.0);
    }

    #[test]
    fn spread_from_zero_price_is_infinite() {
        assert!(calc_spread(U256::zero(), U256::from(100)).is_infinite());
    }

    #[test]
    fn sign_then_recover_round_trip() {
        let wallet = LocalWallet::new(&mut rand::thread_rng());
        let age = Utc::now();
        let obs = PriceObservation::sign(&wallet, "ETHUSD", U256::from(1850), age).unwrap();

        let recovered =
            PriceObservation::recover(&obs.asset_pair, obs.val, obs.age, obs.sig).unwrap();
        assert_eq!(recovered, wallet.address());
        assert_eq!(obs.from, wallet.address());
    }

    #[test]
    fn recover_rejects_tampered_value() {
        let wallet = LocalWallet::new(&mut rand::thread_rng());
        let age = Utc::now();
        let obs = PriceObservation::sign(&wallet, "ETHUSD", U256::from(1850), age).unwrap();

        let recovered =
            PriceObservation::recover(&obs.asset_pair, U256::from(9999), obs.age, obs.sig);
        // Either recovery fails outright or it yields a different address.
        assert_ne!(recovered.ok(), Some(wallet.address()));
    }

    #[test]
    fn digest_depends_on_every_field() {
        let age = Utc::now();
        let base = observation_digest("ETHUSD", U256::from(100), age);
        assert_ne!(base, observation_digest("BTCUSD", U256::from(100), age));
        assert_ne!(base, observation_digest("ETHUSD", U256::from(101), age));
        assert_ne!(
            base,
            observation_digest("ETHUSD", U256::from(100), age + chrono::Duration::seconds(1))
        );
    }
}
