//! Shared plumbing for bound oracle contracts: retried reads, fixed-gas
//! writes and the simulate-then-commit submission path.

use std::sync::Arc;

use ethers::abi::{Detokenize, Tokenize};
use ethers::contract::BaseContract;
use ethers::types::{Address, Bytes, H256};
use tokio::time::sleep;

use super::{
    ClientError, EthClient, OracleError, GAS_LIMIT, MAX_READ_ATTEMPTS, READ_RETRY_DELAY,
};

/// One oracle contract instance bound to an RPC client and its parsed ABI.
pub(crate) struct BoundContract<C> {
    client: Arc<C>,
    address: Address,
    abi: BaseContract,
}

impl<C: EthClient> BoundContract<C> {
    pub(crate) fn new(client: Arc<C>, address: Address, abi: BaseContract) -> Self {
        Self {
            client,
            address,
            abi,
        }
    }

    /// Read call with the client's bounded retry budget; surfaces the last
    /// underlying error once the budget is exhausted.
    pub(crate) async fn read<T: Tokenize, D: Detokenize>(
        &self,
        method: &str,
        args: T,
    ) -> Result<D, OracleError> {
        let data = self.abi.encode(method, args)?;
        let raw = self.call_with_retry(method, data).await?;
        self.abi.decode_output(method, raw).map_err(OracleError::from)
    }

    /// Optionally dry-run the call as a retried read, then submit it as a
    /// transaction. A failed simulation means the write is never attempted.
    pub(crate) async fn submit<T: Tokenize>(
        &self,
        method: &str,
        args: T,
        simulate_first: bool,
    ) -> Result<H256, OracleError> {
        let data = self.abi.encode(method, args)?;
        if simulate_first {
            self.call_with_retry(method, data.clone()).await?;
        }
        self.write(data).await
    }

    async fn call_with_retry(&self, method: &str, data: Bytes) -> Result<Bytes, OracleError> {
        let mut last_err = ClientError::Rpc("no call attempted".to_string());
        for attempt in 1..=MAX_READ_ATTEMPTS {
            match self.client.call(self.address, data.clone()).await {
                Ok(raw) => return Ok(raw),
                Err(err) => {
                    tracing::warn!(method, attempt, error = %err, "oracle read attempt failed");
                    last_err = err;
                }
            }
            if attempt < MAX_READ_ATTEMPTS {
                sleep(READ_RETRY_DELAY).await;
            }
        }
        Err(OracleError::ReadFailed {
            attempts: MAX_READ_ATTEMPTS,
            source: last_err,
        })
    }

    /// Encode-free transaction submission at the fixed gas ceiling. Never
    /// retried.
    async fn write(&self, data: Bytes) -> Result<H256, OracleError> {
        self.client
            .send_transaction(self.address, data, GAS_LIMIT.into())
            .await
            .map_err(|source| OracleError::WriteFailed { source })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oracle::MockEthClient;
    use ethers::abi::parse_abi;
    use ethers::types::U256;

    fn poker_contract(client: MockEthClient) -> BoundContract<MockEthClient> {
        let abi = BaseContract::from(parse_abi(&["function poke() external"]).unwrap());
        BoundContract::new(Arc::new(client), Address::repeat_byte(0xAA), abi)
    }

    #[tokio::test(start_paused = true)]
    async fn read_retries_then_surfaces_last_error() {
        let mut client = MockEthClient::new();
        client
            .expect_call()
            .times(MAX_READ_ATTEMPTS)
            .returning(|_, _| Err(ClientError::Rpc("connection refused".to_string())));

        let contract = poker_contract(client);
        let err = contract
            .call_with_retry("poke", Bytes::from(vec![0x18, 0x17, 0x83, 0x58]))
            .await
            .unwrap_err();

        match err {
            OracleError::ReadFailed { attempts, source } => {
                assert_eq!(attempts, MAX_READ_ATTEMPTS);
                assert!(source.to_string().contains("connection refused"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn read_recovers_within_budget() {
        let mut client = MockEthClient::new();
        let mut calls = 0;
        client.expect_call().times(2).returning(move |_, _| {
            calls += 1;
            if calls == 1 {
                Err(ClientError::Rpc("flaky".to_string()))
            } else {
                Ok(Bytes::new())
            }
        });

        let contract = poker_contract(client);
        let raw = contract
            .call_with_retry("poke", Bytes::new())
            .await
            .unwrap();
        assert!(raw.is_empty());
    }

    #[tokio::test]
    async fn write_is_never_retried() {
        let mut client = MockEthClient::new();
        client
            .expect_send_transaction()
            .times(1)
            .returning(|_, _, _| Err(ClientError::Rpc("underpriced".to_string())));

        let contract = poker_contract(client);
        let err = contract
            .submit("poke", (), false)
            .await
            .unwrap_err();
        assert!(matches!(err, OracleError::WriteFailed { .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn failed_simulation_blocks_write() {
        let mut client = MockEthClient::new();
        client
            .expect_call()
            .times(MAX_READ_ATTEMPTS)
            .returning(|_, _| Err(ClientError::Rpc("execution reverted".to_string())));
        // No send_transaction expectation: a submission would panic the mock.

        let contract = poker_contract(client);
        let err = contract.submit("poke", (), true).await.unwrap_err();
        assert!(matches!(err, OracleError::ReadFailed { .. }));
    }

    #[tokio::test]
    async fn submit_uses_fixed_gas_limit() {
        let mut client = MockEthClient::new();
        client
            .expect_send_transaction()
            .withf(|_, _, gas| *gas == U256::from(GAS_LIMIT))
            .times(1)
            .returning(|_, _, _| Ok(H256::repeat_byte(0x11)));

        let contract = poker_contract(client);
        let tx = contract.submit("poke", (), false).await.unwrap();
        assert_eq!(tx, H256::repeat_byte(0x11));
    }
}
