use std::panic;
use std::sync::Arc;

use anyhow::Context;
use backtrace::Backtrace;
use clap::Parser;
use mimalloc::MiMalloc;
use storage_gateway::config::Config;
use storage_gateway::gateway::StateGateway;
use storage_gateway::http;
use storage_gateway::metrics::Metrics;
use storage_gateway::rpc::ContractEndpoint;
use storage_gateway::rpc::JsonRpcNode;
use storage_gateway::rpc::NodeClient;
use storage_gateway::rpc::RpcAdapter;
use tracing::debug;
use tracing::error;
use tracing::info;
use tracing::info_span;
use tracing::level_filters::LevelFilter;
use tracing::warn;
use tracing::Instrument;
use tracing_subscriber::EnvFilter;

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

#[derive(Parser, Clone, Debug)]
struct Cli {
    /// Path to the configuration file.
    #[clap(short, long)]
    config: Option<String>,

    /// If set, output logs in JSON format.
    #[clap(short, long, action)]
    json: bool,
}

fn env_filter() -> EnvFilter {
    EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy()
}

fn setup_logging(json: bool) -> anyhow::Result<()> {
    let builder = tracing_subscriber::fmt()
        .with_level(true)
        .with_file(true)
        .with_line_number(true)
        .with_target(true)
        .with_env_filter(env_filter());

    let installed = if json {
        tracing::subscriber::set_global_default(builder.json().finish())
    } else {
        tracing::subscriber::set_global_default(builder.compact().finish())
    };
    installed.context("setting up logging")
}

/// Routes panics through `tracing`, so they land in the same sink as the rest of the logs.
fn install_panic_hook() {
    panic::set_hook(Box::new(|panic_info| {
        let payload = panic_info.payload();
        let msg = payload
            .downcast_ref::<&'static str>()
            .copied()
            .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
            .unwrap_or("Box<dyn Any>");
        let location = panic_info
            .location()
            .map_or_else(|| "<unknown>".to_string(), ToString::to_string);

        error!(msg, location = %location, "Panic occurred: {:?}", Backtrace::new());
    }));
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    setup_logging(cli.json)?;
    install_panic_hook();

    if let Err(err) = run(cli).await {
        error!("Gateway exited due to an error: {err:?}");
        Err(err)
    } else {
        Ok(())
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let version = env!("CARGO_PKG_VERSION");
    info!("Starting storage gateway. version: {}", version);

    let config = Config::load(cli.config).context("loading configuration")?;
    config.validate().context("validating configuration")?;
    debug!("Loaded configuration: {:?}", config);

    let endpoint = ContractEndpoint::from_config(&config)?;
    let span = info_span!(
        "gateway",
        contract = %endpoint.contract_address,
        chain_id = endpoint.chain_id,
        version,
    );

    serve(config, endpoint).instrument(span).await
}

async fn serve(
    config: Config,
    endpoint: ContractEndpoint,
) -> anyhow::Result<()> {
    let metrics = Metrics::new();
    if let Some(port) = config.prometheus.port {
        metrics_exporter_prometheus::PrometheusBuilder::new()
            .with_http_listener(([0, 0, 0, 0], port))
            .install()
            .context("setting up Prometheus")?;
    }

    let node = JsonRpcNode::connect(endpoint.rpc_url.clone(), config.rpc.request_timeout())
        .context("creating the RPC client")?;
    let adapter = RpcAdapter::new(endpoint, node);
    check_node_chain(&adapter, &metrics).await?;

    let gateway = Arc::new(StateGateway::new(adapter));
    let routes = http::routes(gateway, config.events.default_range(), metrics);

    info!("Serving on port {}", config.server.port);
    warp::serve(routes)
        .run(([0, 0, 0, 0], config.server.port))
        .await;

    Ok(())
}

/// A node on the wrong chain aborts startup. An unreachable one does not, reads will report it.
async fn check_node_chain<N: NodeClient>(
    adapter: &RpcAdapter<N>,
    metrics: &Metrics,
) -> anyhow::Result<()> {
    match adapter.node_chain_id().await {
        Ok(chain_id) => {
            if let Err(err) = adapter.check_chain_id(chain_id) {
                metrics.increment_node_chain_checks("mismatch");
                return Err(err);
            }
            metrics.increment_node_chain_checks("match");
            info!("Node serves chain {}", chain_id);
        },
        Err(err) => {
            metrics.increment_node_chain_checks("unreachable");
            warn!("Could not reach the node at startup: {}", err);
        },
    }
    Ok(())
}
