#![allow(dead_code)]

use std::fs;

use minichain_core::{pow, to_records, Block, Hash, ZERO_HASH};
use minichain_storage::SledStore;
use tempfile::{tempdir, TempDir};

pub fn create_temp_store() -> (TempDir, SledStore) {
    // Create a temporary directory for the sled database
    let temp_dir = tempdir().expect("Failed to create temp dir");
    let db_path = temp_dir.path().to_path_buf();
    (
        temp_dir,
        SledStore::open(&db_path).expect("Failed to open SledStore"),
    )
}

pub fn teardown_store(temp_dir: TempDir, store: SledStore) {
    let db_path = temp_dir.path().to_path_buf();
    store.clear().expect("Failed to clear the store");
    drop(store);
    temp_dir.close().expect("Failed to delete temp dir");
    let _ = fs::remove_dir_all(&db_path);
    assert!(!db_path.exists(), "Database directory should be removed");
}

/// Unmined block with a fixed timestamp; storage never checks proof of work.
pub fn block(record: &str, prev: Hash, timestamp: u32) -> Block {
    Block::new(to_records([record]), prev, timestamp)
}

pub fn mined_chain(len: usize) -> Vec<Block> {
    let mut blocks: Vec<Block> = Vec::with_capacity(len);
    for i in 0..len {
        let prev = blocks.last().map(|b| b.hash).unwrap_or(ZERO_HASH);
        let mut next = block(&format!("record-{i}"), prev, 1_600_000_000 + i as u32);
        pow::search(&mut next);
        blocks.push(next);
    }
    blocks
}
