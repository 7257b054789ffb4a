use std::io::IsTerminal;

use alloy::primitives::Address;
use anyhow::Context;
use anyhow::Result;
use clap::Args;
use clap::Parser;
use serde_json::Value;
use storage_gateway::config::Config;
use storage_gateway::gateway::StateGateway;
use storage_gateway::rpc::ContractEndpoint;
use storage_gateway::rpc::JsonRpcNode;
use storage_gateway::rpc::RpcAdapter;
use storage_gateway::wallet::format_balance;
use storage_gateway::wallet::shorten_address;
use storage_gateway::wallet::ConnectionStatus;
use storage_gateway::wallet::WalletEvent;
use storage_gateway::wallet::WalletSession;
use tracing::debug;
use tracing::info;
use tracing_subscriber::EnvFilter;

const CONFIG_ENV_VAR: &str = "STORAGE_GATEWAY_CONFIG";

#[derive(Parser, Debug)]
enum Cli {
    /// Read the value currently stored in the contract
    Value(ReadValue),
    /// List the ValueUpdated events emitted in a block range
    Events(Events),
    /// Build the unsigned setValue transaction for a wallet to sign
    PrepareWrite(PrepareWrite),
    /// Show the connection status and balance of an account
    Status(Status),
}

#[derive(Args, Debug)]
struct Common {
    /// Path to the configuration file.
    #[clap(short, long, env = CONFIG_ENV_VAR)]
    config: Option<String>,
}

impl Common {
    fn load(&self) -> Result<Config> {
        let config = Config::load(self.config.clone()).context("loading configuration")?;
        config.validate().context("validating configuration")?;
        debug!("Loaded configuration: {:?}", config);
        Ok(config)
    }
}

fn connect(config: &Config) -> Result<StateGateway<JsonRpcNode>> {
    let endpoint = ContractEndpoint::from_config(config)?;
    let node = JsonRpcNode::connect(endpoint.rpc_url.clone(), config.rpc.request_timeout())
        .context("creating the RPC client")?;
    Ok(StateGateway::new(RpcAdapter::new(endpoint, node)))
}

#[derive(Args, Debug)]
struct ReadValue {
    #[clap(flatten)]
    common: Common,
}

impl ReadValue {
    async fn run(&self) -> Result<()> {
        let config = self.common.load()?;
        let gateway = connect(&config)?;
        gateway.adapter().verify_chain().await?;

        let reply = gateway.get_latest_value().await?;
        println!("{}", serde_json::to_string_pretty(&reply)?);
        Ok(())
    }
}

#[derive(Args, Debug)]
struct Events {
    #[clap(flatten)]
    common: Common,
    /// First block to scan, decimal or 0x-prefixed. Defaults to the configured window.
    #[clap(short, long)]
    from_block: Option<String>,
    /// Last block to scan, included. Defaults to the configured window.
    #[clap(short, long)]
    to_block: Option<String>,
}

impl Events {
    async fn run(&self) -> Result<()> {
        let config = self.common.load()?;
        let gateway = connect(&config)?;
        gateway.adapter().verify_chain().await?;

        let from_block = self.from_block.clone().map(Value::String);
        let to_block = self.to_block.clone().map(Value::String);
        let events = gateway
            .get_update_events(
                from_block.as_ref(),
                to_block.as_ref(),
                config.events.default_range(),
            )
            .await?;

        info!("Found {} update events", events.len());
        println!("{}", serde_json::to_string_pretty(&events)?);
        Ok(())
    }
}

#[derive(Args, Debug)]
struct PrepareWrite {
    #[clap(flatten)]
    common: Common,
    /// Value to store, as an unsigned decimal integer.
    value: String,
}

impl PrepareWrite {
    fn run(&self) -> Result<()> {
        let config = self.common.load()?;
        let gateway = connect(&config)?;

        let request = gateway.prepare_write(&self.value)?;
        println!("{}", serde_json::to_string_pretty(&request)?);
        Ok(())
    }
}

#[derive(Args, Debug)]
struct Status {
    #[clap(flatten)]
    common: Common,
    /// Account to report on.
    #[clap(short, long)]
    account: Address,
}

impl Status {
    async fn run(&self) -> Result<()> {
        let config = self.common.load()?;
        let gateway = connect(&config)?;
        let adapter = gateway.adapter();

        let mut session = WalletSession::new(gateway.endpoint().chain_id);
        session.apply(WalletEvent::AccountsChanged(vec![self.account]));
        session.apply(WalletEvent::ChainChanged(adapter.node_chain_id().await?));
        if session.needs_balance() {
            let balance = adapter.account_balance(self.account).await?;
            session.apply(WalletEvent::BalanceFetched(balance));
        }

        match session.status() {
            ConnectionStatus::Connected { account, balance } => {
                let balance = balance.map_or_else(|| "-".to_string(), format_balance);
                println!("connected: {} balance: {}", shorten_address(&account), balance);
            },
            ConnectionStatus::WrongNetwork { account, chain_id } => {
                println!(
                    "wrong network: {} is on chain {}, expected {}",
                    shorten_address(&account),
                    chain_id,
                    gateway.endpoint().chain_id
                );
            },
            ConnectionStatus::Connecting { account } => {
                println!("connecting: {}", shorten_address(&account));
            },
            ConnectionStatus::Disconnected => println!("disconnected"),
        }
        Ok(())
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    if std::io::stdout().is_terminal() {
        tracing_subscriber::fmt()
            .with_env_filter(EnvFilter::from_default_env())
            .init();
    } else {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(EnvFilter::from_default_env())
            .init();
    }

    let cli = Cli::parse();
    debug!("Running {cli:?}");

    match cli {
        Cli::Value(value) => value.run().await,
        Cli::Events(events) => events.run().await,
        Cli::PrepareWrite(prepare_write) => prepare_write.run(),
        Cli::Status(status) => status.run().await,
    }
}
