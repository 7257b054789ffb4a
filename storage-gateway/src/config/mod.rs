use std::time::Duration;

use alloy::primitives::Address;
use anyhow::ensure;
use anyhow::Context;
use config::FileFormat;
use lazy_static_include::*;
use serde_derive::Deserialize;
use storage_messages::BlockNr;
use storage_messages::BlockRange;
use storage_messages::ChainId;
use tracing::debug;

lazy_static_include_str! {
    DEFAULT_CONFIG => "src/config/default.toml",
}

#[derive(Deserialize, Debug, Clone, PartialEq)]
pub struct Config {
    pub rpc: RpcConfig,
    pub contract: ContractConfig,
    pub server: ServerConfig,
    pub events: EventsConfig,
    #[serde(default)]
    pub prometheus: PrometheusConfig,
}

#[derive(Deserialize, Debug, Clone, PartialEq)]
pub struct RpcConfig {
    /// JSON-RPC endpoint of the node.
    pub url: String,
    /// Chain the contract is deployed on, checked against the node at startup.
    pub chain_id: ChainId,
    /// Upper bound for a single round trip to the node.
    pub request_timeout_secs: u64,
}

impl RpcConfig {
    pub fn validate(&self) -> anyhow::Result<()> {
        ensure!(!self.url.is_empty(), "RPC URL is required");
        ensure!(
            self.request_timeout_secs > 0,
            "RPC request timeout must be positive"
        );
        Ok(())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

#[derive(Deserialize, Debug, Clone, PartialEq)]
pub struct ContractConfig {
    pub address: String,
    /// ABI artifact to check the bindings against, the embedded descriptor is used when unset.
    pub abi_path: Option<String>,
}

impl ContractConfig {
    pub fn validate(&self) -> anyhow::Result<()> {
        self.address()?;
        if let Some(path) = &self.abi_path {
            ensure!(!path.is_empty(), "ABI path is empty");
        }
        Ok(())
    }

    pub fn address(&self) -> anyhow::Result<Address> {
        self.address
            .parse()
            .with_context(|| format!("invalid contract address `{}`", self.address))
    }
}

#[derive(Deserialize, Debug, Clone, PartialEq)]
pub struct ServerConfig {
    pub port: u16,
}

/// The window served when an events query leaves a bound out.
#[derive(Deserialize, Debug, Clone, PartialEq)]
pub struct EventsConfig {
    pub default_from_block: BlockNr,
    pub default_to_block: BlockNr,
}

impl EventsConfig {
    pub fn validate(&self) -> anyhow::Result<()> {
        ensure!(
            self.default_range().is_ordered(),
            "Default event window {} is inverted",
            self.default_range()
        );
        Ok(())
    }

    pub fn default_range(&self) -> BlockRange {
        BlockRange::new(self.default_from_block, self.default_to_block)
    }
}

#[derive(Deserialize, Debug, Clone, Default, PartialEq)]
pub struct PrometheusConfig {
    pub port: Option<u16>,
}

impl Config {
    pub fn load(local_file: Option<String>) -> anyhow::Result<Config> {
        let mut config_builder = config::Config::builder();
        config_builder =
            config_builder.add_source(config::File::from_str(&DEFAULT_CONFIG, FileFormat::Toml));

        if let Some(local_file) = local_file {
            debug!("Loading local configuration from {}", local_file);
            config_builder = config_builder.add_source(config::File::with_name(&local_file));
        }

        config_builder
            .add_source(
                config::Environment::default()
                    .separator("__")
                    .ignore_empty(true),
            )
            .build()
            .context("Could not load configuration")?
            .try_deserialize()
            .context("Could not deserialize configuration")
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        self.rpc.validate()?;
        self.contract.validate()?;
        self.events.validate()?;
        Ok(())
    }
}
