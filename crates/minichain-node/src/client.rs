use crate::protocol::{hash_payload, read_frame, write_frame, Command, Request, SubmitStatus};
use minichain_core::mine::MiningJob;
use minichain_core::{Block, Chain, Hash, LedgerError, Result};
use std::future::Future;
use std::net::SocketAddr;
use std::sync::atomic::Ordering;
use tokio::net::TcpStream;
use tracing::{debug, info};

/// Client role: one connection per request to a serving node, usually the
/// full node. Every call is attempted exactly once.
#[derive(Clone, Debug)]
pub struct SyncClient {
    peer: SocketAddr,
}

impl SyncClient {
    pub fn new(peer: SocketAddr) -> Self {
        Self { peer }
    }

    async fn connect(&self) -> Result<TcpStream> {
        let stream = TcpStream::connect(self.peer)
            .await
            .map_err(|e| LedgerError::Connection(format!("{}: {e}", self.peer)))?;
        debug!(peer = %self.peer, "connected");
        Ok(stream)
    }

    async fn query(&self, request: Request) -> Result<Chain> {
        let mut stream = self.connect().await?;
        write_frame(&mut stream, &request.encode()).await?;
        let reply = read_frame(&mut stream).await?;
        Chain::from_bytes(&reply)
    }

    /// `getBC`: every block header of the peer's chain.
    pub async fn fetch_headers(&self) -> Result<Chain> {
        self.query(Request::bare(Command::GetChain)).await
    }

    /// `getBK`: the header whose hash is `hash`, or an empty chain.
    pub async fn fetch_block(&self, hash: &Hash) -> Result<Chain> {
        self.query(Request::new(Command::GetBlock, hash.to_vec())).await
    }

    /// `getTX`: the full block committing to `root`, or an empty chain.
    pub async fn fetch_data(&self, root: &Hash) -> Result<Chain> {
        self.query(Request::new(Command::GetData, root.to_vec())).await
    }

    /// First `addBK` phase. The returned submission keeps the connection
    /// open; the peer's tip hash is what a new block must point at.
    pub async fn begin_submission(&self) -> Result<Submission> {
        let mut stream = self.connect().await?;
        write_frame(&mut stream, &Request::bare(Command::AddBlock).encode()).await?;
        let reply = read_frame(&mut stream).await?;
        // a node that cannot read its own tip answers with a failure status
        let tip = match hash_payload(&reply) {
            Ok(tip) => tip,
            Err(_) => match SubmitStatus::parse(&reply) {
                SubmitStatus::Rejected(reason) => return Err(LedgerError::Rejected(reason)),
                SubmitStatus::Accepted => {
                    return Err(LedgerError::MalformedPayload("success status in place of tip".into()))
                }
            },
        };
        debug!(peer = %self.peer, tip = %hex::encode(tip), "received tip");
        Ok(Submission { stream, tip })
    }

    /// Both `addBK` phases for an already mined block.
    pub async fn submit_block(&self, block: &Block) -> Result<SubmitStatus> {
        self.begin_submission().await?.submit(block).await
    }

    /// Miner flow: fetch the tip, mine `data` on top of it, check the result
    /// and submit it on the same connection. Resolving `cancel` stops the
    /// search and drops the connection, so nothing is committed; `None` is
    /// returned in that case.
    pub async fn mine_and_submit<F>(
        &self,
        data: Vec<Vec<u8>>,
        cancel: F,
    ) -> Result<Option<(Block, SubmitStatus)>>
    where
        F: Future<Output = ()>,
    {
        let submission = self.begin_submission().await?;
        let job = MiningJob::create(data, submission.tip());
        let stop = job.stop_signal();
        let mining = tokio::task::spawn_blocking(move || job.join());

        let mined = tokio::select! {
            joined = mining => joined.map_err(|e| LedgerError::Other(e.into()))?,
            _ = cancel => {
                stop.store(true, Ordering::Relaxed);
                info!("mining cancelled");
                None
            }
        };
        let Some(block) = mined else {
            return Ok(None);
        };

        if !block.verify() {
            return Err(LedgerError::InvalidProofOfWork(block.compute_hash()));
        }
        info!(hash = %hex::encode(block.hash), nonce = block.header.nonce, "submitting mined block");
        let status = submission.submit(&block).await?;
        Ok(Some((block, status)))
    }
}

/// An open `addBK` exchange waiting for its block.
#[derive(Debug)]
pub struct Submission {
    stream: TcpStream,
    tip: Hash,
}

impl Submission {
    pub fn tip(&self) -> Hash {
        self.tip
    }

    pub async fn submit(mut self, block: &Block) -> Result<SubmitStatus> {
        let request = Request::new(Command::AddBlock, serde_json::to_vec(block)?);
        write_frame(&mut self.stream, &request.encode()).await?;
        let reply = read_frame(&mut self.stream).await?;
        let status = SubmitStatus::parse(&reply);
        info!(%status, "submission answered");
        Ok(status)
    }
}
