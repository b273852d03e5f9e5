use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use minichain_core::constants::HASH_HEX_SIZE;
use minichain_core::{to_records, Chain, ChainStore, Hash, MerkleTree, ZERO_HASH};
use minichain_node::constants::DEFAULT_FULL_NODE_ADDR;
use minichain_node::{SubmitStatus, SyncClient};
use minichain_storage::{JsonFileStore, SledStore};
use std::{net::SocketAddr, path::PathBuf};
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser, Debug)]
#[command(name = "minichain")]
#[command(about = "Miner and query client for minichain nodes")]
struct Cli {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum StoreKind {
    Sled,
    Json,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Mine a block holding the given records on the node's tip and submit it
    Mine {
        /// Node to mine against (e.g. 127.0.0.1:8001)
        #[arg(long, default_value = DEFAULT_FULL_NODE_ADDR)]
        node: SocketAddr,
        /// Data records, comma separated
        #[arg(required = true, value_delimiter = ',')]
        data: Vec<String>,
    },
    /// Print every block header of the node's chain
    Headers {
        #[arg(long, default_value = DEFAULT_FULL_NODE_ADDR)]
        node: SocketAddr,
    },
    /// Look up a block header by its hash
    Block {
        #[arg(long, default_value = DEFAULT_FULL_NODE_ADDR)]
        node: SocketAddr,
        /// Block hash, 64 hex digits
        #[arg(long, value_parser = parse_hash)]
        hash: Hash,
    },
    /// Look up a full block by its merkle root
    Data {
        #[arg(long, default_value = DEFAULT_FULL_NODE_ADDR)]
        node: SocketAddr,
        /// Merkle root, 64 hex digits
        #[arg(long, value_parser = parse_hash)]
        root: Hash,
    },
    /// Print the merkle tree levels and root of the given records
    Merkle {
        #[arg(required = true, value_delimiter = ',')]
        data: Vec<String>,
    },
    /// Print and validate a chain straight from a local store
    Show {
        #[arg(long, default_value = "./data")]
        data_dir: PathBuf,
        #[arg(long, value_enum, default_value_t = StoreKind::Sled)]
        store: StoreKind,
        #[arg(long, default_value = "9999")]
        node_id: String,
    },
}

fn parse_hash(s: &str) -> Result<Hash> {
    let s = s.trim();
    if s.len() != HASH_HEX_SIZE {
        bail!("expected {HASH_HEX_SIZE} hex digits, got {}", s.len());
    }
    let mut hash = ZERO_HASH;
    hex::decode_to_slice(s, &mut hash).context("not a hex string")?;
    Ok(hash)
}

fn print_chain(chain: &Chain) -> Result<()> {
    if chain.is_empty() {
        println!("not found (node {})", chain.node_id);
        return Ok(());
    }
    println!("{}", serde_json::to_string_pretty(chain)?);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .pretty()
        .init();

    let cli = Cli::parse();
    match cli.cmd {
        Command::Mine { node, data } => {
            let client = SyncClient::new(node);
            info!(peer = %node, records = data.len(), "mining");
            let cancel = async {
                let _ = tokio::signal::ctrl_c().await;
            };
            match client.mine_and_submit(to_records(&data), cancel).await? {
                Some((block, status)) => {
                    println!("hash:   {}", hex::encode(block.hash));
                    println!("nonce:  {}", block.header.nonce);
                    println!("header: {}", hex::encode(block.serialize_header()));
                    println!("status: {status}");
                    if let SubmitStatus::Rejected(_) = status {
                        std::process::exit(1);
                    }
                }
                None => println!("mining cancelled, nothing submitted"),
            }
        }
        Command::Headers { node } => {
            let chain = SyncClient::new(node).fetch_headers().await?;
            print_chain(&chain)?;
            println!("valid: {}", chain.validate_chain());
        }
        Command::Block { node, hash } => {
            print_chain(&SyncClient::new(node).fetch_block(&hash).await?)?;
        }
        Command::Data { node, root } => {
            print_chain(&SyncClient::new(node).fetch_data(&root).await?)?;
        }
        Command::Merkle { data } => {
            let tree = MerkleTree::build(&to_records(&data));
            for (depth, level) in tree.levels().iter().enumerate() {
                let hashes: Vec<String> = level.iter().map(|n| hex::encode(n.hash)).collect();
                println!("level {depth}: {}", hashes.join(" "));
            }
            println!("root: {}", hex::encode(tree.root().hash));
        }
        Command::Show {
            data_dir,
            store,
            node_id,
        } => {
            let blocks = match store {
                StoreKind::Sled => SledStore::open(&data_dir)?.load(&node_id)?,
                StoreKind::Json => JsonFileStore::open(&data_dir)?.load(&node_id)?,
            };
            let chain = Chain::from_blocks(node_id, blocks);
            print_chain(&chain)?;
            println!("valid: {}", chain.validate_chain());
        }
    }
    Ok(())
}
