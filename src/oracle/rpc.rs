//! JSON-RPC backed `EthClient` over the ethers provider stack.

use anyhow::{Context, Result};
use async_trait::async_trait;
use ethers::middleware::SignerMiddleware;
use ethers::providers::{Http, Middleware, Provider};
use ethers::signers::{LocalWallet, Signer};
use ethers::types::transaction::eip2718::TypedTransaction;
use ethers::types::{Address, Bytes, TransactionRequest, H256, U256};

use super::{ClientError, EthClient};

/// Signing JSON-RPC client used by the daemon and the poke tool.
pub struct RpcClient {
    inner: SignerMiddleware<Provider<Http>, LocalWallet>,
}

impl RpcClient {
    pub fn new(rpc_url: &str, private_key: &str, chain_id: u64) -> Result<Self> {
        let provider = Provider::<Http>::try_from(rpc_url)
            .with_context(|| format!("invalid RPC url {rpc_url}"))?;
        let wallet: LocalWallet = private_key
            .parse()
            .context("invalid relayer private key")?;
        let wallet = wallet.with_chain_id(chain_id);
        Ok(Self {
            inner: SignerMiddleware::new(provider, wallet),
        })
    }

    /// Address transactions are signed with.
    pub fn address(&self) -> Address {
        self.inner.signer().address()
    }
}

#[async_trait]
impl EthClient for RpcClient {
    async fn call(&self, to: Address, data: Bytes) -> Result<Bytes, ClientError> {
        let tx: TypedTransaction = TransactionRequest::new().to(to).data(data).into();
        self.inner
            .call(&tx, None)
            .await
            .map_err(|e| ClientError::Rpc(e.to_string()))
    }

    async fn send_transaction(
        &self,
        to: Address,
        data: Bytes,
        gas_limit: U256,
    ) -> Result<H256, ClientError> {
        let tx = TransactionRequest::new().to(to).data(data).gas(gas_limit);
        let pending = self
            .inner
            .send_transaction(tx, None)
            .await
            .map_err(|e| ClientError::Rpc(e.to_string()))?;
        Ok(pending.tx_hash())
    }
}
