pub mod chain;
pub mod constants;
pub mod error;
pub mod merkle;
pub mod mine;

use constants::{BLOCK_CREATION_DELAY, HEADER_SIZE, MAGIC_NUMBER, MAGIC_SIZE};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::debug;

pub use chain::{Chain, ChainStore};
pub use error::{LedgerError, Result};
pub use merkle::{merkle_root, MerkleNode, MerkleTree};

pub type Hash = [u8; 32];

pub const ZERO_HASH: Hash = [0u8; 32];

pub fn sha256(bytes: &[u8]) -> Hash {
    Sha256::digest(bytes).into()
}

/// Seconds since the epoch, truncated to the 32-bit header field.
pub fn unix_timestamp() -> u32 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as u32)
        .unwrap_or_default()
}

/// Turns anything byte-like (`&str`, `String`, `Vec<u8>`) into data records.
pub fn to_records<I, R>(items: I) -> Vec<Vec<u8>>
where
    I: IntoIterator<Item = R>,
    R: AsRef<[u8]>,
{
    items.into_iter().map(|r| r.as_ref().to_vec()).collect()
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockHeader {
    pub timestamp: u32,
    #[serde(with = "hex")]
    pub prev_block_hash: Hash,
    #[serde(with = "hex")]
    pub merkle_root: Hash,
    pub nonce: u32,
}

impl BlockHeader {
    pub fn new(prev_block_hash: Hash, merkle_root: Hash, timestamp: u32) -> Self {
        Self {
            timestamp,
            prev_block_hash,
            merkle_root,
            nonce: 0,
        }
    }

    /// Canonical byte stream: magic ‖ timestamp ‖ prev hash ‖ merkle root ‖ nonce,
    /// integers big-endian.
    pub fn serialize(&self) -> [u8; HEADER_SIZE] {
        let mut bytes = [0u8; HEADER_SIZE];
        bytes[..8].copy_from_slice(&MAGIC_NUMBER);
        bytes[8..12].copy_from_slice(&self.timestamp.to_be_bytes());
        bytes[12..44].copy_from_slice(&self.prev_block_hash);
        bytes[44..76].copy_from_slice(&self.merkle_root);
        bytes[76..80].copy_from_slice(&self.nonce.to_be_bytes());
        bytes
    }

    /// SHA-256 over the serialized header with the magic number skipped.
    pub fn hash(&self) -> Hash {
        sha256(&self.serialize()[MAGIC_SIZE..])
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    pub header: BlockHeader,
    #[serde(with = "records_hex", default)]
    pub data: Vec<Vec<u8>>,
    #[serde(with = "hex")]
    pub hash: Hash,
}

impl Block {
    /// Assembles an unmined block (nonce 0) committing to `data`.
    pub fn new(data: Vec<Vec<u8>>, prev_block_hash: Hash, timestamp: u32) -> Self {
        let header = BlockHeader::new(prev_block_hash, merkle_root(&data), timestamp);
        Self {
            hash: header.hash(),
            header,
            data,
        }
    }

    /// Builds and mines a block on top of `prev_block_hash`.
    ///
    /// Waits `BLOCK_CREATION_DELAY` before stamping the time and starting the
    /// nonce search, which blocks the calling thread until a nonce is found.
    pub fn create(data: Vec<Vec<u8>>, prev_block_hash: Hash) -> Self {
        std::thread::sleep(BLOCK_CREATION_DELAY);
        let mut block = Self::new(data, prev_block_hash, unix_timestamp());
        let (nonce, hash) = pow::search(&mut block);
        debug!(nonce, hash = %hex::encode(hash), "block created");
        block
    }

    pub fn serialize_header(&self) -> [u8; HEADER_SIZE] {
        self.header.serialize()
    }

    pub fn compute_hash(&self) -> Hash {
        self.header.hash()
    }

    /// The carried hash matches the header and satisfies proof of work.
    pub fn verify(&self) -> bool {
        self.compute_hash() == self.hash && pow::validate(self)
    }

    pub fn header_only(&self) -> Self {
        Self {
            header: self.header,
            data: Vec::new(),
            hash: self.hash,
        }
    }

    pub fn has_data(&self) -> bool {
        !self.data.is_empty()
    }
}

/// Hex-encodes each data record so serialized chains stay readable.
mod records_hex {
    use serde::{de::Error, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(records: &[Vec<u8>], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(records.iter().map(hex::encode))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<Vec<u8>>, D::Error> {
        let encoded: Vec<String> = Vec::deserialize(deserializer)?;
        encoded
            .iter()
            .map(|s| hex::decode(s).map_err(D::Error::custom))
            .collect()
    }
}

pub mod pow {
    use super::{Block, Hash};
    use crate::constants::POW_TARGET_DIFFICULTY;
    use std::sync::atomic::{AtomicBool, Ordering};

    /// How many nonces are tried between looks at the stop flag.
    const STOP_CHECK_INTERVAL: u32 = 1024;

    /// Search nonces from 0 until the header hash carries `POW_TARGET_DIFFICULTY`
    /// leading zero hex digits. Sets `block.header.nonce` and `block.hash`.
    pub fn search(block: &mut Block) -> (u32, Hash) {
        search_with_difficulty(block, POW_TARGET_DIFFICULTY)
    }

    pub fn search_with_difficulty(block: &mut Block, difficulty: u32) -> (u32, Hash) {
        let never = AtomicBool::new(false);
        match search_until(block, difficulty, &never) {
            Some(found) => found,
            None => unreachable!("stop flag is never raised"),
        }
    }

    /// Like `search_with_difficulty` but gives up with `None` once `stop` is raised.
    /// The nonce wraps on overflow, so without a stop the search is unbounded.
    pub fn search_until(block: &mut Block, difficulty: u32, stop: &AtomicBool) -> Option<(u32, Hash)> {
        let mut nonce = 0u32;
        loop {
            if nonce % STOP_CHECK_INTERVAL == 0 && stop.load(Ordering::Relaxed) {
                return None;
            }
            block.header.nonce = nonce;
            let hash = block.header.hash();
            if meets_difficulty(&hash, difficulty) {
                block.hash = hash;
                return Some((nonce, hash));
            }
            nonce = nonce.wrapping_add(1);
        }
    }

    /// Recomputes the hash from the header fields alone and checks the predicate.
    pub fn validate(block: &Block) -> bool {
        validate_with_difficulty(block, POW_TARGET_DIFFICULTY)
    }

    pub fn validate_with_difficulty(block: &Block, difficulty: u32) -> bool {
        meets_difficulty(&block.header.hash(), difficulty)
    }

    pub fn meets_difficulty(hash: &Hash, difficulty: u32) -> bool {
        count_leading_zero_nibbles(hash) >= difficulty
    }

    /// Number of leading `'0'` characters in the hex form of `hash`.
    pub fn count_leading_zero_nibbles(hash: &Hash) -> u32 {
        let mut total = 0u32;
        for b in hash {
            if *b == 0 {
                total += 2;
            } else {
                if *b < 0x10 {
                    total += 1;
                }
                break;
            }
        }
        total
    }
}
