use crate::Hash;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, LedgerError>;

#[derive(Debug, Error)]
pub enum LedgerError {
    /// Resolving, dialing or accepting a peer failed.
    #[error("connection error: {0}")]
    Connection(String),

    #[error("malformed payload: {0}")]
    MalformedPayload(String),

    #[error("block hash {} does not satisfy proof of work", hex::encode(.0))]
    InvalidProofOfWork(Hash),

    /// Linkage failure: the block does not point at the current tip.
    #[error("previous hash {} does not match tip {}", hex::encode(.found), hex::encode(.expected))]
    HashMismatch { expected: Hash, found: Hash },

    /// The full node answered a submission with a failure status.
    #[error("block rejected: {0}")]
    Rejected(String),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Persistence collaborator and background task failures.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}
