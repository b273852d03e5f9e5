use crate::check_node_id;
use anyhow::{Context, Result};
use minichain_core::{Block, ChainStore};
use sled::{Db, IVec};
use std::path::Path;
use tracing::{debug, info};

const TREE_CHAINS: &str = "chains";

/// One bincode blob per node identity. Each save swaps the whole blob in a
/// single compare-and-swap, so a crash leaves either the old or the new chain.
#[derive(Clone)]
pub struct SledStore {
  db: Db,
}

impl SledStore {
  pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
    let db = sled::open(path.as_ref())
      .with_context(|| format!("opening sled store at {}", path.as_ref().display()))?;
    info!("sled store opened");
    Ok(Self { db })
  }

  fn chains(&self) -> Result<sled::Tree> {
    Ok(self.db.open_tree(TREE_CHAINS)?)
  }

  pub fn node_ids(&self) -> Result<Vec<String>> {
    self
      .chains()?
      .iter()
      .keys()
      .map(|k| Ok(String::from_utf8_lossy(&k?).into_owned()))
      .collect()
  }

  pub fn clear(&self) -> Result<()> {
    self.chains()?.clear()?;
    self.db.flush()?;
    Ok(())
  }

  pub fn close(&self) -> Result<()> {
    self.db.flush()?;
    Ok(())
  }
}

fn decode(bytes: Option<&IVec>) -> Result<Vec<Block>> {
  match bytes {
    Some(ivec) => bincode::deserialize(ivec).context("decoding stored chain"),
    None => Ok(Vec::new()),
  }
}

impl ChainStore for SledStore {
  fn load(&self, node_id: &str) -> Result<Vec<Block>> {
    check_node_id(node_id)?;
    let stored = self.chains()?.get(node_id)?;
    decode(stored.as_ref())
  }

  fn save(&self, node_id: &str, block: &Block) -> Result<()> {
    check_node_id(node_id)?;
    let tree = self.chains()?;
    loop {
      let current = tree.get(node_id)?;
      let mut blocks = decode(current.as_ref())?;
      blocks.push(block.clone());
      let encoded = bincode::serialize(&blocks)?;
      match tree.compare_and_swap(node_id, current, Some(encoded))? {
        Ok(()) => {
          debug!(node_id, len = blocks.len(), "chain saved");
          break;
        }
        // another writer got in between, rebuild on top of its chain
        Err(_) => continue,
      }
    }
    self.db.flush()?;
    Ok(())
  }
}
