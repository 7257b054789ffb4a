//! SimpleStorage bindings and the ABI descriptor the gateway is configured with.

use std::path::Path;

use alloy::json_abi::JsonAbi;
use alloy::sol;
use alloy::sol_types::SolCall;
use alloy::sol_types::SolEvent;
use anyhow::Context;
use lazy_static_include::*;
use thiserror::Error;
use tracing::debug;

lazy_static_include_str! {
    SIMPLE_STORAGE_ABI => "src/abi/SimpleStorage.json",
}

sol! {
    /// The deployed storage contract.
    interface SimpleStorage {
        function getValue() external view returns (uint256);

        function setValue(uint256 _value) external;

        event ValueUpdated(uint256 newValue);
    }
}

#[derive(Error, Debug)]
pub enum AbiError {
    #[error("malformed ABI descriptor: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("ABI descriptor does not declare `{0}`")]
    Missing(&'static str),

    #[error("ABI descriptor declares `{0}` with an unexpected signature")]
    Mismatch(&'static str),
}

/// ABI descriptor of the contract, checked against the compiled bindings.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ContractAbi {
    abi: JsonAbi,
}

impl ContractAbi {
    /// The descriptor shipped with the gateway.
    pub fn embedded() -> Result<Self, AbiError> {
        Self::from_artifact(&SIMPLE_STORAGE_ABI)
    }

    /// Parses either a bare ABI array or a build artifact carrying an `abi` key.
    pub fn from_artifact(json: &str) -> Result<Self, AbiError> {
        let value = match serde_json::from_str::<serde_json::Value>(json)? {
            serde_json::Value::Object(mut artifact) if artifact.contains_key("abi") => {
                artifact.remove("abi").unwrap_or_default()
            },
            value => value,
        };
        let abi: JsonAbi = serde_json::from_value(value)?;

        Ok(Self { abi })
    }

    /// Loads the descriptor at `path`, falling back to the embedded one, and verifies it.
    pub fn load(path: Option<&str>) -> anyhow::Result<Self> {
        let abi = match path {
            Some(path) => {
                debug!("Loading contract ABI from {}", path);
                let content = std::fs::read_to_string(Path::new(path))
                    .with_context(|| format!("failed to open `{path}`"))?;
                Self::from_artifact(&content)
                    .with_context(|| format!("failed to parse ABI at `{path}`"))?
            },
            None => Self::embedded().context("parsing embedded ABI")?,
        };
        abi.verify()?;

        Ok(abi)
    }

    /// Ensures the descriptor agrees with the read function and the update event the gateway
    /// encodes and decodes.
    pub fn verify(&self) -> Result<(), AbiError> {
        let functions = self
            .abi
            .function("getValue")
            .ok_or(AbiError::Missing("getValue"))?;
        if !functions
            .iter()
            .any(|f| f.selector().0 == SimpleStorage::getValueCall::SELECTOR)
        {
            return Err(AbiError::Mismatch("getValue"));
        }

        let events = self
            .abi
            .event("ValueUpdated")
            .ok_or(AbiError::Missing("ValueUpdated"))?;
        if !events
            .iter()
            .any(|e| e.selector() == SimpleStorage::ValueUpdated::SIGNATURE_HASH)
        {
            return Err(AbiError::Mismatch("ValueUpdated"));
        }

        Ok(())
    }
}
