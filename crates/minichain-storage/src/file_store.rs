use crate::check_node_id;
use anyhow::{anyhow, Context, Result};
use minichain_core::{Block, ChainStore};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::debug;

/// `blocks_<node id>.json` files under one directory, rewritten whole on
/// every save through a temporary file and a rename.
#[derive(Debug)]
pub struct JsonFileStore {
    dir: PathBuf,
    write_lock: Mutex<()>,
}

impl JsonFileStore {
    pub fn open<P: AsRef<Path>>(dir: P) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir).with_context(|| format!("creating {}", dir.display()))?;
        Ok(Self {
            dir,
            write_lock: Mutex::new(()),
        })
    }

    pub fn path_for(&self, node_id: &str) -> PathBuf {
        self.dir.join(format!("blocks_{node_id}.json"))
    }

    fn read(&self, path: &Path) -> Result<Vec<Block>> {
        match fs::read(path) {
            Ok(bytes) => serde_json::from_slice(&bytes)
                .with_context(|| format!("decoding {}", path.display())),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Vec::new()),
            Err(e) => Err(e).with_context(|| format!("reading {}", path.display())),
        }
    }
}

impl ChainStore for JsonFileStore {
    fn load(&self, node_id: &str) -> Result<Vec<Block>> {
        check_node_id(node_id)?;
        self.read(&self.path_for(node_id))
    }

    fn save(&self, node_id: &str, block: &Block) -> Result<()> {
        check_node_id(node_id)?;
        let _guard = self
            .write_lock
            .lock()
            .map_err(|_| anyhow!("file store lock poisoned"))?;

        let path = self.path_for(node_id);
        let mut blocks = self.read(&path)?;
        blocks.push(block.clone());

        let tmp = path.with_extension("json.tmp");
        {
            let mut file = fs::File::create(&tmp)
                .with_context(|| format!("creating {}", tmp.display()))?;
            file.write_all(&serde_json::to_vec(&blocks)?)?;
            file.sync_all()?;
        }
        fs::rename(&tmp, &path).with_context(|| format!("replacing {}", path.display()))?;
        debug!(node_id, len = blocks.len(), "chain saved");
        Ok(())
    }
}
