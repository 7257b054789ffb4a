//! In-memory node used by the tests.

use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;
use std::sync::Mutex;

use alloy::primitives::Address;
use alloy::primitives::Bytes;
use alloy::primitives::LogData;
use alloy::primitives::B256;
use alloy::primitives::U256;
use alloy::rpc::types::Filter;
use alloy::rpc::types::Log;
use alloy::rpc::types::TransactionRequest;
use alloy::sol_types::SolEvent;
use anyhow::anyhow;
use async_trait::async_trait;
use storage_messages::ChainId;

use super::ContractEndpoint;
use super::NodeClient;
use crate::abi::ContractAbi;
use crate::abi::SimpleStorage;

pub(crate) const CONTRACT: &str = "0x3fa731B5499253942737c2AD452Edc08bfa1c35f";
pub(crate) const FUJI: ChainId = 43113;

pub(crate) fn dummy_endpoint() -> ContractEndpoint {
    ContractEndpoint::new(
        "http://localhost:8545".parse().unwrap(),
        FUJI,
        CONTRACT.parse().unwrap(),
        ContractAbi::embedded().unwrap(),
    )
}

/// A `ValueUpdated(value)` log as the node returns it.
pub(crate) fn value_updated_log(
    block_number: u64,
    log_index: u64,
    value: U256,
    tx_hash: B256,
) -> Log {
    Log {
        inner: alloy::primitives::Log {
            address: CONTRACT.parse().unwrap(),
            data: LogData::new_unchecked(
                vec![SimpleStorage::ValueUpdated::SIGNATURE_HASH],
                Bytes::from(value.to_be_bytes::<32>().to_vec()),
            ),
        },
        block_number: Some(block_number),
        transaction_hash: Some(tx_hash),
        log_index: Some(log_index),
        ..Default::default()
    }
}

pub(crate) struct DummyNode {
    call: Result<Bytes, String>,
    logs: Result<Vec<Log>, String>,
    chain_id: ChainId,
    balance: U256,
    round_trips: AtomicUsize,
    pub(crate) requests: Mutex<Vec<TransactionRequest>>,
    pub(crate) filters: Mutex<Vec<Filter>>,
}

impl DummyNode {
    /// A healthy node whose contract holds `value`.
    pub(crate) fn storing(value: U256) -> Self {
        Self {
            call: Ok(Bytes::from(value.to_be_bytes::<32>().to_vec())),
            logs: Ok(vec![]),
            chain_id: FUJI,
            balance: U256::ZERO,
            round_trips: AtomicUsize::new(0),
            requests: Mutex::new(vec![]),
            filters: Mutex::new(vec![]),
        }
    }

    /// A node whose contract queries all fail with `message`.
    pub(crate) fn failing(message: &str) -> Self {
        Self {
            call: Err(message.to_string()),
            logs: Err(message.to_string()),
            ..Self::storing(U256::ZERO)
        }
    }

    pub(crate) fn with_call_output(
        mut self,
        output: Bytes,
    ) -> Self {
        self.call = Ok(output);
        self
    }

    pub(crate) fn with_logs(
        mut self,
        logs: Vec<Log>,
    ) -> Self {
        self.logs = Ok(logs);
        self
    }

    pub(crate) fn with_logs_error(
        mut self,
        message: &str,
    ) -> Self {
        self.logs = Err(message.to_string());
        self
    }

    pub(crate) fn with_chain_id(
        mut self,
        chain_id: ChainId,
    ) -> Self {
        self.chain_id = chain_id;
        self
    }

    pub(crate) fn with_balance(
        mut self,
        balance: U256,
    ) -> Self {
        self.balance = balance;
        self
    }

    pub(crate) fn round_trips(&self) -> usize {
        self.round_trips.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl NodeClient for DummyNode {
    async fn call(
        &self,
        request: TransactionRequest,
    ) -> anyhow::Result<Bytes> {
        self.round_trips.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().unwrap().push(request);
        self.call.clone().map_err(|msg| anyhow!(msg))
    }

    async fn logs(
        &self,
        filter: Filter,
    ) -> anyhow::Result<Vec<Log>> {
        self.round_trips.fetch_add(1, Ordering::SeqCst);
        self.filters.lock().unwrap().push(filter);
        self.logs.clone().map_err(|msg| anyhow!(msg))
    }

    async fn chain_id(&self) -> anyhow::Result<ChainId> {
        self.round_trips.fetch_add(1, Ordering::SeqCst);
        Ok(self.chain_id)
    }

    async fn balance(
        &self,
        _account: Address,
    ) -> anyhow::Result<U256> {
        self.round_trips.fetch_add(1, Ordering::SeqCst);
        Ok(self.balance)
    }
}
