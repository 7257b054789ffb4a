use std::fmt::Display;
use std::fmt::Formatter;
use std::str::FromStr;

use alloy_primitives::Address;
use alloy_primitives::Bytes;
use alloy_primitives::B256;
use alloy_primitives::U256;
use serde_derive::Deserialize;
use serde_derive::Serialize;
use serde_with::serde_as;
use serde_with::DisplayFromStr;

use crate::BlockNr;
use crate::ChainId;

/// The unsigned integer held by the contract.
///
/// Only ever lives for the duration of one request, the node is the source of truth.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StoredValue(pub U256);

impl From<U256> for StoredValue {
    fn from(value: U256) -> Self {
        Self(value)
    }
}

impl Display for StoredValue {
    fn fmt(
        &self,
        f: &mut Formatter<'_>,
    ) -> std::fmt::Result {
        // U256 renders in base 10, no precision is lost.
        write!(f, "{}", self.0)
    }
}

impl FromStr for StoredValue {
    type Err = alloy_primitives::ruint::ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        U256::from_str_radix(s, 10).map(Self)
    }
}

/// A decoded `ValueUpdated` log.
#[serde_as]
#[derive(Clone, Debug, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateEvent {
    #[serde_as(as = "DisplayFromStr")]
    pub block_number: BlockNr,

    /// The `newValue` field of the event.
    #[serde_as(as = "DisplayFromStr")]
    pub value: StoredValue,

    pub tx_hash: B256,
}

impl UpdateEvent {
    #[must_use]
    pub fn new(
        block_number: BlockNr,
        value: StoredValue,
        tx_hash: B256,
    ) -> Self {
        Self {
            block_number,
            value,
            tx_hash,
        }
    }
}

/// Inclusive span of blocks to scan.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockRange {
    pub from_block: BlockNr,
    pub to_block: BlockNr,
}

impl BlockRange {
    #[must_use]
    pub fn new(
        from_block: BlockNr,
        to_block: BlockNr,
    ) -> Self {
        Self {
            from_block,
            to_block,
        }
    }

    pub fn is_ordered(&self) -> bool {
        self.from_block <= self.to_block
    }
}

impl Display for BlockRange {
    fn fmt(
        &self,
        f: &mut Formatter<'_>,
    ) -> std::fmt::Result {
        write!(f, "[{}, {}]", self.from_block, self.to_block)
    }
}

#[serde_as]
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub struct ValueReply {
    pub success: bool,
    #[serde_as(as = "DisplayFromStr")]
    pub value: StoredValue,
}

impl ValueReply {
    #[must_use]
    pub fn new(value: StoredValue) -> Self {
        Self {
            success: true,
            value,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub struct ErrorReply {
    pub success: bool,
    pub message: String,
}

impl ErrorReply {
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
        }
    }
}

/// An unsigned `setValue` transaction, handed to the wallet for signing and submission.
#[serde_as]
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WriteRequest {
    pub to: Address,
    pub chain_id: ChainId,
    #[serde_as(as = "DisplayFromStr")]
    pub value: StoredValue,
    pub data: Bytes,
}
