use crate::constants::{BLOCK_CREATION_DELAY, POW_TARGET_DIFFICULTY};
use crate::{pow, unix_timestamp, Block, Hash};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use tracing::info;

/// Proof-of-work search running on its own thread. Raising the stop signal
/// makes the search give up and `join` return `None`.
pub struct MiningJob {
    stop: Arc<AtomicBool>,
    handle: JoinHandle<Option<Block>>,
}

impl MiningJob {
    /// Cancellable counterpart of `Block::create`: waits the creation delay,
    /// stamps the current time and searches at the fixed difficulty.
    pub fn create(data: Vec<Vec<u8>>, prev_block_hash: Hash) -> Self {
        Self::start(move |stop| {
            thread::sleep(BLOCK_CREATION_DELAY);
            if stop.load(Ordering::Relaxed) {
                return None;
            }
            let block = Block::new(data, prev_block_hash, unix_timestamp());
            search(block, POW_TARGET_DIFFICULTY, stop)
        })
    }

    /// Mines an already assembled block template without any delay.
    pub fn spawn(block: Block, difficulty: u32) -> Self {
        Self::start(move |stop| search(block, difficulty, stop))
    }

    fn start<F>(work: F) -> Self
    where
        F: FnOnce(&AtomicBool) -> Option<Block> + Send + 'static,
    {
        let stop = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&stop);
        let handle = thread::spawn(move || work(&flag));
        Self { stop, handle }
    }

    pub fn stop(&self) {
        self.stop.store(true, Ordering::Relaxed);
    }

    pub fn stop_signal(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.stop)
    }

    /// Waits for the search. `None` if it was stopped or the thread panicked.
    pub fn join(self) -> Option<Block> {
        self.handle.join().ok().flatten()
    }
}

fn search(mut block: Block, difficulty: u32, stop: &AtomicBool) -> Option<Block> {
    let (nonce, hash) = pow::search_until(&mut block, difficulty, stop)?;
    info!(nonce, hash = %hex::encode(hash), "block mined");
    Some(block)
}
