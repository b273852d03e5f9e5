pub mod file_store;
pub mod memory_store;
pub mod sled_store;

pub use file_store::JsonFileStore;
pub use memory_store::MemoryStore;
pub use sled_store::SledStore;

use anyhow::{bail, Result};

/// Node identities end up in file names and keys; keep them to a safe alphabet.
pub(crate) fn check_node_id(node_id: &str) -> Result<()> {
    let valid = !node_id.is_empty()
        && !node_id.starts_with('.')
        && node_id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'));
    if !valid {
        bail!("invalid node id {node_id:?}");
    }
    Ok(())
}
