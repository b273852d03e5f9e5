use anyhow::Context;
use clap::{Parser, ValueEnum};
use minichain_core::ChainStore;
use minichain_node::constants::DEFAULT_FULL_NODE_ADDR;
use minichain_node::{Node, NodeConfig, SyncServer};
use minichain_storage::{JsonFileStore, SledStore};
use std::{net::SocketAddr, path::PathBuf, sync::Arc};
use tracing::{info, warn, Level};

#[derive(Clone, Copy, Debug, ValueEnum)]
enum StoreKind {
    Sled,
    Json,
}

#[derive(Parser, Debug)]
#[command(name = "minichain-node")]
#[command(about = "Serve a minichain node: full node or normal node")]
struct Args {
    /// Address to listen on, e.g. 127.0.0.1:8001
    #[arg(long, default_value = DEFAULT_FULL_NODE_ADDR)]
    listen: SocketAddr,

    /// Identity naming this node's chain in the store (defaults to the listen port)
    #[arg(long)]
    node_id: Option<String>,

    /// Act as the trusted full node
    #[arg(long)]
    full: bool,

    /// Full node to sync from when running as a normal node
    #[arg(long, default_value = DEFAULT_FULL_NODE_ADDR)]
    full_node: SocketAddr,

    /// Data directory for the chain store
    #[arg(long, default_value = "./data")]
    data_dir: PathBuf,

    #[arg(long, value_enum, default_value_t = StoreKind::Sled)]
    store: StoreKind,

    /// Re-check proof of work and linkage of headers pulled from the full node
    #[arg(long)]
    strict_sync: bool,
}

impl Args {
    fn node_config(&self) -> NodeConfig {
        let node_id = self
            .node_id
            .clone()
            .unwrap_or_else(|| self.listen.port().to_string());
        let config = if self.full {
            NodeConfig::full(node_id, self.listen)
        } else {
            NodeConfig::normal(node_id, self.listen, self.full_node)
        };
        config.with_strict_sync(self.strict_sync)
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(Level::DEBUG)
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args = Args::parse();
    let config = args.node_config();
    match args.store {
        StoreKind::Sled => serve(config, SledStore::open(&args.data_dir)?).await,
        StoreKind::Json => serve(config, JsonFileStore::open(&args.data_dir)?).await,
    }
}

async fn serve<S: ChainStore + 'static>(config: NodeConfig, store: S) -> anyhow::Result<()> {
    let node = Arc::new(Node::new(config, store));

    let chain = node.load().await?;
    if chain.is_empty() {
        warn!(node_id = node.node_id(), "starting with an empty chain");
    }
    info!(
        node_id = node.node_id(),
        role = ?node.config().role,
        len = chain.len(),
        valid = chain.validate_chain(),
        tip = %hex::encode(chain.tip_hash()),
        "chain loaded"
    );

    let server = SyncServer::bind(Arc::clone(&node))
        .await
        .context("cannot start listening")?;
    info!("minichain-node listening on {}", server.local_addr()?);
    server
        .run_until(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await;
    Ok(())
}
