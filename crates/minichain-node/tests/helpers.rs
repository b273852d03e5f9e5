#![allow(dead_code)]

use minichain_core::{pow, to_records, Block, ChainStore, Hash, ZERO_HASH};
use minichain_node::{Node, NodeConfig, SyncServer};
use minichain_storage::MemoryStore;
use std::net::SocketAddr;
use std::sync::{Arc, OnceLock};

pub const FULL_NODE_ID: &str = "9999";

pub fn localhost() -> SocketAddr {
    "127.0.0.1:0".parse().expect("valid address")
}

pub fn mine(records: &[&str], prev: Hash, timestamp: u32) -> Block {
    let mut block = Block::new(to_records(records), prev, timestamp);
    pow::search(&mut block);
    block
}

/// Three linked, mined blocks, built once per test binary.
pub fn mined_chain() -> Vec<Block> {
    static CHAIN: OnceLock<Vec<Block>> = OnceLock::new();
    CHAIN
        .get_or_init(|| {
            let genesis = mine(&["New", "Genesis", "Block"], ZERO_HASH, 1_600_000_000);
            let second = mine(&["a", "b"], genesis.hash, 1_600_000_010);
            let third = mine(&["c", "d", "e"], second.hash, 1_600_000_020);
            vec![genesis, second, third]
        })
        .clone()
}

pub struct RunningNode<S: ChainStore = MemoryStore> {
    pub addr: SocketAddr,
    pub node: Arc<Node<S>>,
}

pub async fn serve<S: ChainStore + 'static>(config: NodeConfig, store: S) -> RunningNode<S> {
    let node = Arc::new(Node::new(config, store));
    let server = SyncServer::bind(Arc::clone(&node)).await.expect("bind");
    let addr = server.local_addr().expect("local addr");
    tokio::spawn(server.run());
    RunningNode { addr, node }
}

pub async fn start_full_node(blocks: Vec<Block>) -> RunningNode {
    serve(
        NodeConfig::full(FULL_NODE_ID, localhost()),
        MemoryStore::with_chain(FULL_NODE_ID, blocks),
    )
    .await
}

pub async fn start_normal_node(node_id: &str, full_node: SocketAddr, strict: bool) -> RunningNode {
    serve(
        NodeConfig::normal(node_id, localhost(), full_node).with_strict_sync(strict),
        MemoryStore::new(),
    )
    .await
}

/// Store whose disk is gone: every load and save fails.
pub struct UnreadableStore;

impl ChainStore for UnreadableStore {
    fn load(&self, _node_id: &str) -> anyhow::Result<Vec<Block>> {
        anyhow::bail!("disk unreadable")
    }

    fn save(&self, _node_id: &str, _block: &Block) -> anyhow::Result<()> {
        anyhow::bail!("disk unreadable")
    }
}

/// An address nothing listens on.
pub async fn dead_address() -> SocketAddr {
    let listener = tokio::net::TcpListener::bind(localhost()).await.expect("bind");
    let addr = listener.local_addr().expect("local addr");
    drop(listener);
    addr
}
