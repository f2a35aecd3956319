//! Client for the minimal aggregate poker contract.
//!
//! The contract exposes a single zero-argument `poke` that refreshes every
//! oracle it knows about in one transaction.

use std::sync::Arc;

use ethers::abi::parse_abi;
use ethers::contract::BaseContract;
use ethers::types::{Address, H256};

use super::contract::BoundContract;
use super::{EthClient, OracleError};

pub struct PokerClient<C> {
    contract: BoundContract<C>,
}

impl<C: EthClient> PokerClient<C> {
    pub fn new(client: Arc<C>, address: Address) -> Self {
        let abi =
            BaseContract::from(parse_abi(&["function poke() external"]).expect("static poker abi"));
        Self {
            contract: BoundContract::new(client, address, abi),
        }
    }

    /// Invoke the contract's poke, optionally simulating the call first.
    pub async fn poke(&self, simulate_first: bool) -> Result<H256, OracleError> {
        self.contract.submit("poke", (), simulate_first).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oracle::{ClientError, MockEthClient, GAS_LIMIT};
    use ethers::types::U256;

    #[tokio::test]
    async fn poke_encodes_expected_calldata() {
        let mut client = MockEthClient::new();
        client
            .expect_send_transaction()
            .withf(|to, data, gas| {
                *to == Address::repeat_byte(0xAA)
                    && hex::encode(data) == "18178358"
                    && *gas == U256::from(GAS_LIMIT)
            })
            .times(1)
            .returning(|_, _, _| Ok(H256::repeat_byte(0x33)));

        let poker = PokerClient::new(Arc::new(client), Address::repeat_byte(0xAA));
        let tx = poker.poke(false).await.unwrap();
        assert_eq!(tx, H256::repeat_byte(0x33));
    }

    #[tokio::test]
    async fn simulated_poke_reads_before_writing() {
        let mut client = MockEthClient::new();
        client
            .expect_call()
            .times(1)
            .returning(|_, _| Ok(ethers::types::Bytes::new()));
        client
            .expect_send_transaction()
            .times(1)
            .returning(|_, _, _| Ok(H256::repeat_byte(0x44)));

        let poker = PokerClient::new(Arc::new(client), Address::repeat_byte(0xAA));
        let tx = poker.poke(true).await.unwrap();
        assert_eq!(tx, H256::repeat_byte(0x44));
    }

    #[tokio::test(start_paused = true)]
    async fn failed_simulation_returns_read_error() {
        let mut client = MockEthClient::new();
        client
            .expect_call()
            .returning(|_, _| Err(ClientError::Rpc("execution reverted".to_string())));

        let poker = PokerClient::new(Arc::new(client), Address::repeat_byte(0xAA));
        let err = poker.poke(true).await.unwrap_err();
        assert!(matches!(err, OracleError::ReadFailed { .. }));
    }
}
