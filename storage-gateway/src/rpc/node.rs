use std::time::Duration;

use alloy::eips::BlockNumberOrTag;
use alloy::primitives::Address;
use alloy::primitives::Bytes;
use alloy::primitives::U256;
use alloy::primitives::U64;
use alloy::rpc::client::RpcClient;
use alloy::rpc::types::Filter;
use alloy::rpc::types::Log;
use alloy::rpc::types::TransactionRequest;
use alloy::transports::http::reqwest;
use alloy::transports::http::Http;
use anyhow::Context;
use async_trait::async_trait;
use storage_messages::ChainId;

/// The remote node, as seen by the adapter.
#[async_trait]
pub trait NodeClient: Send + Sync {
    /// Stateless call against the latest block.
    async fn call(
        &self,
        request: TransactionRequest,
    ) -> anyhow::Result<Bytes>;

    async fn logs(
        &self,
        filter: Filter,
    ) -> anyhow::Result<Vec<Log>>;

    async fn chain_id(&self) -> anyhow::Result<ChainId>;

    async fn balance(
        &self,
        account: Address,
    ) -> anyhow::Result<U256>;
}

/// Talks JSON-RPC over HTTP.
#[derive(Clone, Debug)]
pub struct JsonRpcNode {
    client: RpcClient,
}

impl JsonRpcNode {
    /// Every round trip is bounded by `timeout`, a silent node surfaces as an error.
    pub fn connect(
        url: reqwest::Url,
        timeout: Duration,
    ) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("building HTTP client")?;
        let client = RpcClient::new(Http::with_client(http, url), false);

        Ok(Self { client })
    }
}

#[async_trait]
impl NodeClient for JsonRpcNode {
    async fn call(
        &self,
        request: TransactionRequest,
    ) -> anyhow::Result<Bytes> {
        let output: Bytes = self
            .client
            .request("eth_call", (request, BlockNumberOrTag::Latest))
            .await
            .context("eth_call")?;
        Ok(output)
    }

    async fn logs(
        &self,
        filter: Filter,
    ) -> anyhow::Result<Vec<Log>> {
        let logs: Vec<Log> = self
            .client
            .request("eth_getLogs", (filter,))
            .await
            .context("eth_getLogs")?;
        Ok(logs)
    }

    async fn chain_id(&self) -> anyhow::Result<ChainId> {
        let chain_id: U64 = self
            .client
            .request_noparams("eth_chainId")
            .await
            .context("eth_chainId")?;
        Ok(chain_id.to::<u64>())
    }

    async fn balance(
        &self,
        account: Address,
    ) -> anyhow::Result<U256> {
        let balance: U256 = self
            .client
            .request("eth_getBalance", (account, BlockNumberOrTag::Latest))
            .await
            .context("eth_getBalance")?;
        Ok(balance)
    }
}
