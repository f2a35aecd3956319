//! Client for the full median oracle contract.
//!
//! The contract aggregates feeder prices on-chain: `bar` is the quorum it
//! enforces, `age`/`peek` expose the last accepted update, and `poke` takes
//! the fresh value/timestamp/signature columns to aggregate.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use ethers::abi::parse_abi;
use ethers::contract::BaseContract;
use ethers::types::{Address, H256, U256};

use super::contract::BoundContract;
use super::{EthClient, OracleError};
use crate::types::PriceObservation;

/// Read/write surface of one median oracle instance as the relayer sees it.
#[async_trait]
pub trait MedianOracle: Send + Sync {
    /// Minimum number of distinct feeder prices the contract accepts.
    async fn bar(&self) -> Result<usize, OracleError>;

    /// Time of the last accepted update.
    async fn age(&self) -> Result<DateTime<Utc>, OracleError>;

    /// Currently recorded price; zero when the contract holds no valid value.
    async fn price(&self) -> Result<U256, OracleError>;

    /// Submit fresh observations, optionally simulating the call first.
    async fn poke(
        &self,
        observations: &[PriceObservation],
        simulate_first: bool,
    ) -> Result<H256, OracleError>;
}

pub struct MedianClient<C> {
    contract: BoundContract<C>,
}

impl<C: EthClient> MedianClient<C> {
    pub fn new(client: Arc<C>, address: Address) -> Self {
        let abi = BaseContract::from(
            parse_abi(&[
                "function bar() external view returns (uint256)",
                "function age() external view returns (uint32)",
                "function peek() external view returns (uint256, bool)",
                "function poke(uint256[] val, uint256[] age, uint8[] v, bytes32[] r, bytes32[] s) external",
            ])
            .expect("static median abi"),
        );
        Self {
            contract: BoundContract::new(client, address, abi),
        }
    }
}

#[async_trait]
impl<C: EthClient> MedianOracle for MedianClient<C> {
    async fn bar(&self) -> Result<usize, OracleError> {
        let bar: U256 = self.contract.read("bar", ()).await?;
        if bar > U256::from(u32::MAX) {
            return Err(OracleError::Decode(format!("quorum size out of range: {bar}")));
        }
        Ok(bar.as_u32() as usize)
    }

    async fn age(&self) -> Result<DateTime<Utc>, OracleError> {
        let age: u32 = self.contract.read("age", ()).await?;
        DateTime::<Utc>::from_timestamp(i64::from(age), 0)
            .ok_or_else(|| OracleError::Decode(format!("oracle age out of range: {age}")))
    }

    async fn price(&self) -> Result<U256, OracleError> {
        let (price, valid): (U256, bool) = self.contract.read("peek", ()).await?;
        Ok(if valid { price } else { U256::zero() })
    }

    async fn poke(
        &self,
        observations: &[PriceObservation],
        simulate_first: bool,
    ) -> Result<H256, OracleError> {
        let mut vals = Vec::with_capacity(observations.len());
        let mut ages = Vec::with_capacity(observations.len());
        let mut vs = Vec::with_capacity(observations.len());
        let mut rs = Vec::with_capacity(observations.len());
        let mut ss = Vec::with_capacity(observations.len());
        for obs in observations {
            vals.push(obs.val);
            ages.push(U256::from(obs.age.timestamp().max(0) as u64));
            vs.push(U256::from(obs.sig.v));
            rs.push(u256_to_h256(obs.sig.r));
            ss.push(u256_to_h256(obs.sig.s));
        }
        self.contract
            .submit("poke", (vals, ages, vs, rs, ss), simulate_first)
            .await
    }
}

fn u256_to_h256(value: U256) -> H256 {
    let mut out = [0u8; 32];
    value.to_big_endian(&mut out);
    H256::from(out)
}
