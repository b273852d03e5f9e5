use anyhow::{anyhow, Result};
use minichain_core::{Block, ChainStore};
use std::collections::HashMap;
use std::sync::RwLock;

/// Volatile store for tests and throwaway nodes.
#[derive(Debug, Default)]
pub struct MemoryStore {
    chains: RwLock<HashMap<String, Vec<Block>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store pre-seeded with `blocks` under `node_id`.
    pub fn with_chain(node_id: &str, blocks: Vec<Block>) -> Self {
        let store = Self::new();
        if let Ok(mut chains) = store.chains.write() {
            chains.insert(node_id.to_string(), blocks);
        }
        store
    }
}

impl ChainStore for MemoryStore {
    fn load(&self, node_id: &str) -> Result<Vec<Block>> {
        let chains = self
            .chains
            .read()
            .map_err(|_| anyhow!("memory store lock poisoned"))?;
        Ok(chains.get(node_id).cloned().unwrap_or_default())
    }

    fn save(&self, node_id: &str, block: &Block) -> Result<()> {
        let mut chains = self
            .chains
            .write()
            .map_err(|_| anyhow!("memory store lock poisoned"))?;
        chains
            .entry(node_id.to_string())
            .or_default()
            .push(block.clone());
        Ok(())
    }
}
