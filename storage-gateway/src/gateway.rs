//! The two read operations served to the transport layer, plus the write hand-off.
//!
//! Holds no mutable state: every call is an independent round trip through the adapter, so
//! the gateway can be shared behind an `Arc` by any number of concurrent requests.

use alloy::primitives::U256;
use alloy::sol_types::SolCall;
use serde_json::Value;
use storage_messages::BlockNr;
use storage_messages::BlockRange;
use storage_messages::StoredValue;
use storage_messages::UpdateEvent;
use storage_messages::ValueReply;
use storage_messages::WriteRequest;
use tracing::debug;

use crate::abi::SimpleStorage;
use crate::error::GatewayError;
use crate::rpc::ContractEndpoint;
use crate::rpc::NodeClient;
use crate::rpc::RpcAdapter;

/// Largest integer a double represents exactly.
const MAX_EXACT_FLOAT_INTEGER: f64 = 9_007_199_254_740_991.0;

pub struct StateGateway<N> {
    adapter: RpcAdapter<N>,
}

impl<N: NodeClient> StateGateway<N> {
    pub fn new(adapter: RpcAdapter<N>) -> Self {
        Self { adapter }
    }

    pub fn adapter(&self) -> &RpcAdapter<N> {
        &self.adapter
    }

    pub fn endpoint(&self) -> &ContractEndpoint {
        self.adapter.endpoint()
    }

    /// Current value held by the contract, always fetched from the node.
    pub async fn get_latest_value(&self) -> Result<ValueReply, GatewayError> {
        let value = self.adapter.read_state().await?;
        Ok(ValueReply::new(value))
    }

    /// `ValueUpdated` events within `[from_block, to_block]`, in block order.
    ///
    /// An absent bound is taken from `default_window`; choosing that window is up to the caller.
    pub async fn get_update_events(
        &self,
        from_block: Option<&Value>,
        to_block: Option<&Value>,
        default_window: BlockRange,
    ) -> Result<Vec<UpdateEvent>, GatewayError> {
        let range = resolve_range(from_block, to_block, default_window)?;
        debug!("Scanning update events in {}", range);

        Ok(self.adapter.scan_events(range).await?)
    }

    /// Validates the value to store and builds the unsigned `setValue` transaction the wallet
    /// signs and submits.
    pub fn prepare_write(
        &self,
        raw: &str,
    ) -> Result<WriteRequest, GatewayError> {
        let value = parse_write_value(raw)?;
        let endpoint = self.endpoint();
        let data = SimpleStorage::setValueCall { _value: value.0 }.abi_encode();

        Ok(WriteRequest {
            to: endpoint.contract_address,
            chain_id: endpoint.chain_id,
            value,
            data: data.into(),
        })
    }
}

/// Builds the range to scan out of two loosely typed bounds.
///
/// A range whose start lies after its end is refused rather than forwarded to the node.
pub fn resolve_range(
    from_block: Option<&Value>,
    to_block: Option<&Value>,
    default_window: BlockRange,
) -> Result<BlockRange, GatewayError> {
    let from_block = match from_block {
        Some(raw) if !raw.is_null() => coerce_block_bound("fromBlock", raw)?,
        _ => default_window.from_block,
    };
    let to_block = match to_block {
        Some(raw) if !raw.is_null() => coerce_block_bound("toBlock", raw)?,
        _ => default_window.to_block,
    };

    let range = BlockRange::new(from_block, to_block);
    if !range.is_ordered() {
        return Err(GatewayError::InvalidRange(format!(
            "fromBlock {from_block} is after toBlock {to_block}"
        )));
    }

    Ok(range)
}

/// Coerces one bound into a block number.
///
/// Accepts unsigned JSON integers, integral floats up to 2^53 - 1, decimal strings and
/// `0x`-prefixed hex strings. Anything else is an [`GatewayError::InvalidRange`].
pub fn coerce_block_bound(
    name: &str,
    raw: &Value,
) -> Result<BlockNr, GatewayError> {
    let invalid =
        || GatewayError::InvalidRange(format!("{name} must be a non-negative integer, got {raw}"));

    match raw {
        Value::Number(n) => {
            if let Some(block) = n.as_u64() {
                return Ok(block);
            }
            match n.as_f64() {
                Some(f) if f >= 0.0 && f.fract() == 0.0 && f <= MAX_EXACT_FLOAT_INTEGER => {
                    Ok(f as u64)
                },
                _ => Err(invalid()),
            }
        },
        Value::String(s) => parse_block_str(s.trim()).ok_or_else(invalid),
        _ => Err(invalid()),
    }
}

fn parse_block_str(s: &str) -> Option<BlockNr> {
    if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        if hex.is_empty() || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
            return None;
        }
        return u64::from_str_radix(hex, 16).ok();
    }
    if s.is_empty() || !s.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    s.parse().ok()
}

/// Parses the decimal value a user wants to store.
pub fn parse_write_value(raw: &str) -> Result<StoredValue, GatewayError> {
    let s = raw.trim();
    if s.is_empty() {
        return Err(GatewayError::InvalidValue("value is empty".to_string()));
    }
    if !s.chars().all(|c| c.is_ascii_digit()) {
        return Err(GatewayError::InvalidValue(format!(
            "`{s}` is not an unsigned decimal integer"
        )));
    }

    U256::from_str_radix(s, 10)
        .map(StoredValue)
        .map_err(|_| GatewayError::InvalidValue(format!("`{s}` does not fit in uint256")))
}
