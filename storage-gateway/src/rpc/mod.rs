//! Client side of the node: encodes the two contract queries and decodes what comes back.

use alloy::primitives::Address;
use alloy::primitives::TxKind;
use alloy::primitives::U256;
use alloy::rpc::types::Filter;
use alloy::rpc::types::Log;
use alloy::rpc::types::TransactionInput;
use alloy::rpc::types::TransactionRequest;
use alloy::sol_types::SolCall;
use alloy::sol_types::SolEvent;
use alloy::transports::http::reqwest::Url;
use anyhow::ensure;
use anyhow::Context;
use storage_messages::BlockRange;
use storage_messages::ChainId;
use storage_messages::StoredValue;
use storage_messages::UpdateEvent;
use tracing::debug;

use crate::abi::ContractAbi;
use crate::abi::SimpleStorage;
use crate::config::Config;
use crate::error::NodeQueryFailed;

#[cfg(test)]
pub(crate) mod dummy_node;
mod node;

pub use node::JsonRpcNode;
pub use node::NodeClient;

/// Where the contract lives. Built once at startup and never mutated.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ContractEndpoint {
    pub rpc_url: Url,
    pub chain_id: ChainId,
    pub contract_address: Address,
    pub abi: ContractAbi,
}

impl ContractEndpoint {
    pub fn new(
        rpc_url: Url,
        chain_id: ChainId,
        contract_address: Address,
        abi: ContractAbi,
    ) -> Self {
        Self {
            rpc_url,
            chain_id,
            contract_address,
            abi,
        }
    }

    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        let rpc_url = config
            .rpc
            .url
            .parse()
            .with_context(|| format!("invalid RPC URL `{}`", config.rpc.url))?;
        let contract_address = config.contract.address()?;
        let abi = ContractAbi::load(config.contract.abi_path.as_deref())?;

        Ok(Self::new(rpc_url, config.rpc.chain_id, contract_address, abi))
    }
}

pub struct RpcAdapter<N> {
    endpoint: ContractEndpoint,
    node: N,
}

impl<N: NodeClient> RpcAdapter<N> {
    pub fn new(
        endpoint: ContractEndpoint,
        node: N,
    ) -> Self {
        Self { endpoint, node }
    }

    pub fn endpoint(&self) -> &ContractEndpoint {
        &self.endpoint
    }

    #[cfg(test)]
    pub(crate) fn node(&self) -> &N {
        &self.node
    }

    /// Calls `getValue()` and decodes the returned `uint256`.
    ///
    /// No retry: a failed round trip is reported as is.
    pub async fn read_state(&self) -> Result<StoredValue, NodeQueryFailed> {
        let request = TransactionRequest {
            to: Some(TxKind::Call(self.endpoint.contract_address)),
            input: TransactionInput::new(SimpleStorage::getValueCall {}.abi_encode().into()),
            ..Default::default()
        };

        let output = self
            .node
            .call(request)
            .await
            .map_err(|err| NodeQueryFailed::from_error(&err))?;

        let decoded = SimpleStorage::getValueCall::abi_decode_returns(&output, true)
            .map_err(|err| {
                NodeQueryFailed(format!("malformed getValue result `{output}`: {err}"))
            })?;

        Ok(StoredValue(decoded._0))
    }

    /// Fetches and decodes every `ValueUpdated` log emitted by the contract within `range`,
    /// both ends included.
    ///
    /// The node's order (block, then log index) is kept. A single undecodable log fails the
    /// whole scan.
    pub async fn scan_events(
        &self,
        range: BlockRange,
    ) -> Result<Vec<UpdateEvent>, NodeQueryFailed> {
        let filter = Filter::new()
            .address(self.endpoint.contract_address)
            .event_signature(SimpleStorage::ValueUpdated::SIGNATURE_HASH)
            .from_block(range.from_block)
            .to_block(range.to_block);

        let logs = self
            .node
            .logs(filter)
            .await
            .map_err(|err| NodeQueryFailed::from_error(&err))?;
        debug!("Fetched {} logs in {}", logs.len(), range);

        logs.iter().map(decode_value_updated).collect()
    }

    /// Native balance of `account`, in wei.
    pub async fn account_balance(
        &self,
        account: Address,
    ) -> Result<U256, NodeQueryFailed> {
        self.node
            .balance(account)
            .await
            .map_err(|err| NodeQueryFailed::from_error(&err))
    }

    pub async fn node_chain_id(&self) -> Result<ChainId, NodeQueryFailed> {
        self.node
            .chain_id()
            .await
            .map_err(|err| NodeQueryFailed::from_error(&err))
    }

    /// Fails if the node serves another chain than the configured one.
    pub async fn verify_chain(&self) -> anyhow::Result<()> {
        let chain_id = self
            .node_chain_id()
            .await
            .context("querying the node chain id")?;
        self.check_chain_id(chain_id)
    }

    pub fn check_chain_id(
        &self,
        chain_id: ChainId,
    ) -> anyhow::Result<()> {
        ensure!(
            chain_id == self.endpoint.chain_id,
            "node at {} serves chain {} but {} is configured",
            self.endpoint.rpc_url,
            chain_id,
            self.endpoint.chain_id,
        );
        Ok(())
    }
}

fn decode_value_updated(log: &Log) -> Result<UpdateEvent, NodeQueryFailed> {
    let block_number = log
        .block_number
        .ok_or_else(|| NodeQueryFailed::new("log without block number"))?;
    let tx_hash = log.transaction_hash.ok_or_else(|| {
        NodeQueryFailed(format!("log in block {block_number} without transaction hash"))
    })?;

    let decoded = log
        .log_decode::<SimpleStorage::ValueUpdated>()
        .map_err(|err| {
            NodeQueryFailed(format!(
                "malformed ValueUpdated log in transaction {tx_hash}: {err}"
            ))
        })?;

    Ok(UpdateEvent::new(
        block_number,
        StoredValue(decoded.inner.data.newValue),
        tx_hash,
    ))
}
