use crate::constants::MAX_FRAME_SIZE;
use crate::node::Node;
use crate::protocol::{hash_payload, read_frame, write_frame, Command, Request, SubmitStatus};
use minichain_core::{Block, Chain, ChainStore, LedgerError, Result};
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, error, info, warn};

/// Server role: accepts connections and answers one request per connection,
/// each on its own task.
pub struct SyncServer<S: ChainStore> {
    node: Arc<Node<S>>,
    listener: TcpListener,
}

impl<S: ChainStore + 'static> SyncServer<S> {
    pub async fn bind(node: Arc<Node<S>>) -> Result<Self> {
        let addr = node.config().listen;
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| LedgerError::Connection(format!("failed to bind {addr}: {e}")))?;
        info!(node_id = node.node_id(), %addr, "listening");
        Ok(Self { node, listener })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Serves until the process ends.
    pub async fn run(self) {
        self.run_until(std::future::pending()).await
    }

    /// Serves until `shutdown` resolves. Connections already accepted finish
    /// on their own tasks.
    pub async fn run_until<F: Future<Output = ()>>(self, shutdown: F) {
        tokio::pin!(shutdown);
        loop {
            tokio::select! {
                accepted = self.listener.accept() => match accepted {
                    Ok((stream, peer)) => {
                        let node = Arc::clone(&self.node);
                        tokio::spawn(async move {
                            if let Err(e) = handle_connection(node, stream, peer).await {
                                warn!(%peer, error = %e, "request aborted");
                            }
                            debug!(%peer, "connection closed");
                        });
                    }
                    Err(e) => error!(error = %e, "failed to accept connection"),
                },
                _ = &mut shutdown => {
                    info!(node_id = self.node.node_id(), "shutting down");
                    break;
                }
            }
        }
    }
}

async fn handle_connection<S: ChainStore>(
    node: Arc<Node<S>>,
    mut stream: TcpStream,
    peer: SocketAddr,
) -> Result<()> {
    debug!(%peer, "connection established");
    let body = read_frame(&mut stream).await?;
    let request = match Request::decode(&body) {
        Ok(request) => request,
        Err(e) => {
            warn!(%peer, error = %e, "unreadable request, answering with empty chain");
            return reply_chain(&mut stream, &Chain::new(node.node_id())).await;
        }
    };
    info!(%peer, command = %request.command, "request");

    let reply = match request.command {
        Command::AddBlock => return handle_add_block(&node, &mut stream, peer).await,
        Command::GetChain => node.headers().await,
        Command::GetBlock => match hash_payload(&request.payload) {
            Ok(hash) => node.find_block(&hash).await,
            Err(e) => {
                warn!(%peer, error = %e, "bad block hash");
                Ok(Chain::new(node.node_id()))
            }
        },
        Command::GetData => match hash_payload(&request.payload) {
            Ok(root) => node.find_data(&root).await,
            Err(e) => {
                warn!(%peer, error = %e, "bad merkle root");
                Ok(Chain::new(node.node_id()))
            }
        },
    };
    let chain = reply.unwrap_or_else(|e| {
        error!(%peer, command = %request.command, error = %e, "request failed, answering with empty chain");
        Chain::new(node.node_id())
    });
    reply_chain(&mut stream, &chain).await
}

/// Two phases on one connection: hand out the tip, then take the block.
/// If the peer goes away in between nothing is committed.
async fn handle_add_block<S: ChainStore>(
    node: &Node<S>,
    stream: &mut TcpStream,
    peer: SocketAddr,
) -> Result<()> {
    let tip = match node.tip_hash().await {
        Ok(tip) => tip,
        Err(e) => {
            error!(%peer, error = %e, "cannot read tip, refusing submission");
            let status = SubmitStatus::Rejected(e.to_string());
            return write_frame(stream, &status.to_bytes()).await;
        }
    };
    write_frame(stream, &tip).await?;
    debug!(%peer, tip = %hex::encode(tip), "sent tip, waiting for block");

    let body = read_frame(stream).await?;
    let status = match submitted_block(&body) {
        Ok(block) => match node.add_block(block).await {
            Ok(()) => SubmitStatus::Accepted,
            Err(e) => SubmitStatus::Rejected(e.to_string()),
        },
        Err(e) => SubmitStatus::Rejected(e.to_string()),
    };
    if status.is_accepted() {
        info!(%peer, "block accepted");
    } else {
        warn!(%peer, %status, "block rejected");
    }
    write_frame(stream, &status.to_bytes()).await
}

fn submitted_block(body: &[u8]) -> Result<Block> {
    let request = Request::decode(body)?;
    if request.command != Command::AddBlock {
        return Err(LedgerError::MalformedPayload(format!(
            "expected addBK with a block, got {}",
            request.command
        )));
    }
    serde_json::from_slice(&request.payload)
        .map_err(|e| LedgerError::MalformedPayload(format!("undecodable block: {e}")))
}

/// A reply over `MAX_FRAME_SIZE` cannot be framed; the peer gets an empty
/// chain instead of a dropped connection.
async fn reply_chain(stream: &mut TcpStream, chain: &Chain) -> Result<()> {
    let body = chain.to_bytes()?;
    if body.len() > MAX_FRAME_SIZE {
        error!(
            node_id = %chain.node_id,
            len = body.len(),
            limit = MAX_FRAME_SIZE,
            "reply exceeds frame limit, answering with empty chain"
        );
        return write_frame(stream, &Chain::new(chain.node_id.clone()).to_bytes()?).await;
    }
    write_frame(stream, &body).await
}
