use crate::constants::GENESIS_DATA;
use crate::{pow, to_records, Block, Hash, LedgerError, Result, ZERO_HASH};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;

/// Persistence collaborator: one ordered list of blocks per node identity.
///
/// `save` must leave the stored chain for `node_id` equal to what it was
/// plus `block` at the end, or unchanged if it fails.
pub trait ChainStore: Send + Sync {
    fn load(&self, node_id: &str) -> anyhow::Result<Vec<Block>>;
    fn save(&self, node_id: &str, block: &Block) -> anyhow::Result<()>;
}

impl<S: ChainStore + ?Sized> ChainStore for Arc<S> {
    fn load(&self, node_id: &str) -> anyhow::Result<Vec<Block>> {
        (**self).load(node_id)
    }

    fn save(&self, node_id: &str, block: &Block) -> anyhow::Result<()> {
        (**self).save(node_id, block)
    }
}

/// Append-only sequence of blocks owned by one node identity.
/// Also the reply format for chain queries on the wire.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chain {
    pub node_id: String,
    #[serde(default)]
    pub blocks: Vec<Block>,
}

impl Chain {
    pub fn new(node_id: impl Into<String>) -> Self {
        Self {
            node_id: node_id.into(),
            blocks: Vec::new(),
        }
    }

    pub fn from_blocks(node_id: impl Into<String>, blocks: Vec<Block>) -> Self {
        Self {
            node_id: node_id.into(),
            blocks,
        }
    }

    pub fn load<S: ChainStore + ?Sized>(store: &S, node_id: &str) -> Result<Self> {
        let blocks = store.load(node_id)?;
        debug!(node_id, len = blocks.len(), "chain loaded");
        Ok(Self::from_blocks(node_id, blocks))
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    pub fn tip(&self) -> Option<&Block> {
        self.blocks.last()
    }

    /// Hash of the last block, all-zero for an empty chain.
    pub fn tip_hash(&self) -> Hash {
        self.tip().map(|b| b.hash).unwrap_or(ZERO_HASH)
    }

    /// Appends `block` if it links to the tip. Any block is accepted as the
    /// first one.
    pub fn append(&mut self, block: Block) -> Result<()> {
        if let Some(tip) = self.tip() {
            if block.header.prev_block_hash != tip.hash {
                return Err(LedgerError::HashMismatch {
                    expected: tip.hash,
                    found: block.header.prev_block_hash,
                });
            }
        }
        self.blocks.push(block);
        Ok(())
    }

    /// Appends and then persists. The in-memory chain is rolled back if the
    /// store refuses the block.
    pub fn append_and_save<S: ChainStore + ?Sized>(&mut self, store: &S, block: Block) -> Result<()> {
        self.append(block)?;
        self.persist_tip(store)
    }

    /// Appends and persists a header handed over by the full node, with no
    /// proof-of-work or linkage check. The full node is the authority.
    pub fn ingest_trusted<S: ChainStore + ?Sized>(&mut self, store: &S, block: Block) -> Result<()> {
        self.blocks.push(block);
        self.persist_tip(store)
    }

    fn persist_tip<S: ChainStore + ?Sized>(&mut self, store: &S) -> Result<()> {
        if let Some(tip) = self.blocks.last() {
            if let Err(e) = store.save(&self.node_id, tip) {
                self.blocks.pop();
                return Err(e.into());
            }
        }
        Ok(())
    }

    /// Acceptance rule for submitted blocks: proof of work on the recomputed
    /// hash, carried hash equal to the recomputed one, then linkage.
    pub fn accept<S: ChainStore + ?Sized>(&mut self, store: &S, block: Block) -> Result<()> {
        if !block.verify() {
            return Err(LedgerError::InvalidProofOfWork(block.compute_hash()));
        }
        self.append_and_save(store, block)
    }

    /// Checks proof of work of every block and linkage of every adjacent
    /// pair. Scans the whole chain before answering. Empty chains are invalid.
    pub fn validate_chain(&self) -> bool {
        validate_blocks(&self.blocks)
    }

    /// Same chain identity with every block stripped to its header.
    pub fn headers(&self) -> Chain {
        Chain::from_blocks(
            self.node_id.clone(),
            self.blocks.iter().map(Block::header_only).collect(),
        )
    }

    pub fn find_block(&self, hash: &Hash) -> Option<&Block> {
        self.blocks.iter().find(|b| &b.hash == hash)
    }

    /// First block committing to `root` whose data is held locally.
    pub fn find_data(&self, root: &Hash) -> Option<&Block> {
        self.blocks
            .iter()
            .find(|b| &b.header.merkle_root == root && b.has_data())
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        Ok(serde_json::from_slice(bytes)?)
    }
}

pub fn validate_blocks(blocks: &[Block]) -> bool {
    if blocks.is_empty() {
        return false;
    }
    let mut valid = true;
    for (i, block) in blocks.iter().enumerate() {
        if !pow::validate(block) {
            debug!(index = i, "block fails proof of work");
            valid = false;
        }
        if i > 0 && block.header.prev_block_hash != blocks[i - 1].hash {
            debug!(index = i, "block does not link to its predecessor");
            valid = false;
        }
    }
    valid
}

/// Mines the genesis block: fixed records on an all-zero previous hash.
pub fn genesis_block() -> Block {
    Block::create(to_records(GENESIS_DATA), ZERO_HASH)
}
