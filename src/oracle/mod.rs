//! Oracle contract clients
//!
//! Read and write access to the on-chain price oracles behind a mockable RPC
//! seam, with bounded read retries and a shared simulate-then-commit write
//! path.

mod contract;
pub mod median;
pub mod poker;
pub mod rpc;

pub use median::{MedianClient, MedianOracle};
pub use poker::PokerClient;
pub use rpc::RpcClient;

use std::time::Duration;

use async_trait::async_trait;
use ethers::contract::AbiError;
use ethers::types::{Address, Bytes, H256, U256};
use thiserror::Error;

#[cfg(test)]
use mockall::automock;

/// Gas-limit ceiling for oracle update transactions; no dynamic estimation.
pub const GAS_LIMIT: u64 = 200_000;

/// Read calls are attempted at most this many times...
pub const MAX_READ_ATTEMPTS: usize = 3;

/// ...with this fixed delay between attempts.
pub const READ_RETRY_DELAY: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Error)]
pub enum ClientError {
    #[error("rpc error: {0}")]
    Rpc(String),
}

#[derive(Debug, Error)]
pub enum OracleError {
    /// A read call failed after exhausting the retry budget.
    #[error("oracle read failed after {attempts} attempts: {source}")]
    ReadFailed {
        attempts: usize,
        #[source]
        source: ClientError,
    },
    /// A state-changing call failed; never retried, a duplicate submission
    /// must not reach the chain.
    #[error("oracle write failed: {source}")]
    WriteFailed {
        #[source]
        source: ClientError,
    },
    #[error("abi error: {0}")]
    Abi(#[from] AbiError),
    #[error("unexpected oracle response: {0}")]
    Decode(String),
}

/// Minimal JSON-RPC surface the oracle clients need.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait EthClient: Send + Sync {
    /// Execute a read-only call and return the raw output.
    async fn call(&self, to: Address, data: Bytes) -> Result<Bytes, ClientError>;

    /// Sign and submit a state-changing transaction, returning its hash.
    async fn send_transaction(
        &self,
        to: Address,
        data: Bytes,
        gas_limit: U256,
    ) -> Result<H256, ClientError>;
}
