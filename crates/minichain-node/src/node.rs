use crate::client::SyncClient;
use crate::config::NodeConfig;
use crate::protocol::SubmitStatus;
use minichain_core::chain::genesis_block;
use minichain_core::{Block, Chain, ChainStore, Hash, LedgerError, Result};
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

/// Single owner of one node identity's chain.
///
/// Every operation takes the chain lock, reloads from the store (and, for a
/// normal node, pulls missing headers from the full node) and only then acts,
/// so at most one append is in flight per identity.
pub struct Node<S: ChainStore> {
    config: NodeConfig,
    store: S,
    chain: Mutex<Chain>,
    full_node: SyncClient,
}

impl<S: ChainStore> Node<S> {
    pub fn new(config: NodeConfig, store: S) -> Self {
        let chain = Mutex::new(Chain::new(config.node_id.clone()));
        let full_node = SyncClient::new(config.full_node);
        Self {
            config,
            store,
            chain,
            full_node,
        }
    }

    pub fn config(&self) -> &NodeConfig {
        &self.config
    }

    pub fn node_id(&self) -> &str {
        &self.config.node_id
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Current chain after reloading and syncing.
    pub async fn load(&self) -> Result<Chain> {
        let mut chain = self.chain.lock().await;
        self.refresh(&mut chain).await?;
        Ok(chain.clone())
    }

    pub async fn tip_hash(&self) -> Result<Hash> {
        let mut chain = self.chain.lock().await;
        self.refresh(&mut chain).await?;
        Ok(chain.tip_hash())
    }

    /// `getBC` answer: every header, no data.
    pub async fn headers(&self) -> Result<Chain> {
        let mut chain = self.chain.lock().await;
        self.refresh(&mut chain).await?;
        Ok(chain.headers())
    }

    /// `getBK` answer: the matching header, or an empty chain.
    pub async fn find_block(&self, hash: &Hash) -> Result<Chain> {
        let mut chain = self.chain.lock().await;
        self.refresh(&mut chain).await?;
        let found = chain.find_block(hash).map(Block::header_only);
        Ok(Chain::from_blocks(self.node_id(), found.into_iter().collect()))
    }

    /// `getTX` answer: the full block committing to `root`. A normal node
    /// that lacks the data relays the full node's answer.
    pub async fn find_data(&self, root: &Hash) -> Result<Chain> {
        let mut chain = self.chain.lock().await;
        self.refresh(&mut chain).await?;
        if let Some(block) = chain.find_data(root) {
            debug!(root = %hex::encode(root), "data found locally");
            return Ok(Chain::from_blocks(self.node_id(), vec![block.clone()]));
        }
        if self.config.is_full_node() {
            return Ok(Chain::new(self.node_id()));
        }

        debug!(root = %hex::encode(root), "data not held locally, asking full node");
        match self.full_node.fetch_data(root).await {
            Ok(relayed) => Ok(relayed),
            Err(e) => {
                warn!(error = %e, "full node lookup failed");
                Ok(Chain::new(self.node_id()))
            }
        }
    }

    /// Accepts a submitted block. A normal node first has the full node
    /// accept it; only then is it appended and persisted locally.
    pub async fn add_block(&self, block: Block) -> Result<()> {
        let mut chain = self.chain.lock().await;
        self.refresh(&mut chain).await?;

        if !block.verify() {
            return Err(LedgerError::InvalidProofOfWork(block.compute_hash()));
        }
        if self.config.is_full_node() {
            let hash = block.hash;
            chain.accept(&self.store, block)?;
            info!(
                node_id = self.node_id(),
                hash = %hex::encode(hash),
                len = chain.len(),
                "block appended"
            );
            return Ok(());
        }

        // nothing goes upstream that the local chain would refuse
        if !chain.is_empty() && block.header.prev_block_hash != chain.tip_hash() {
            return Err(LedgerError::HashMismatch {
                expected: chain.tip_hash(),
                found: block.header.prev_block_hash,
            });
        }
        match self.full_node.submit_block(&block).await? {
            SubmitStatus::Accepted => {}
            SubmitStatus::Rejected(reason) => return Err(LedgerError::Rejected(reason)),
        }

        let hash = block.hash;
        if let Err(e) = chain.accept(&self.store, block) {
            error!(
                node_id = self.node_id(),
                hash = %hex::encode(hash),
                error = %e,
                "full node committed block but local append failed, next sync will pull its header"
            );
            return Err(e);
        }
        info!(
            node_id = self.node_id(),
            hash = %hex::encode(hash),
            len = chain.len(),
            "block appended"
        );
        Ok(())
    }

    async fn refresh(&self, chain: &mut Chain) -> Result<()> {
        *chain = Chain::load(&self.store, self.node_id())?;
        if self.config.is_full_node() {
            if chain.is_empty() {
                info!(node_id = self.node_id(), "store is empty, mining genesis block");
                let genesis = tokio::task::spawn_blocking(genesis_block)
                    .await
                    .map_err(|e| LedgerError::Other(e.into()))?;
                chain.append_and_save(&self.store, genesis)?;
            }
            return Ok(());
        }
        self.sync_from_full_node(chain).await
    }

    /// Appends whatever headers the full node has beyond our length.
    async fn sync_from_full_node(&self, chain: &mut Chain) -> Result<()> {
        let remote = match self.full_node.fetch_headers().await {
            Ok(remote) => remote,
            Err(e) => {
                warn!(error = %e, "cannot sync with full node, using local chain");
                return Ok(());
            }
        };

        let before = chain.len();
        for header in remote.blocks.into_iter().skip(before) {
            if self.config.strict_sync {
                if !header.verify() {
                    warn!(hash = %hex::encode(header.hash), "full node header fails proof of work");
                    break;
                }
                if let Err(e) = chain.append_and_save(&self.store, header) {
                    warn!(error = %e, "full node header rejected");
                    break;
                }
            } else {
                chain.ingest_trusted(&self.store, header)?;
            }
        }
        if chain.len() > before {
            info!(added = chain.len() - before, len = chain.len(), "synced headers from full node");
        }
        Ok(())
    }
}
