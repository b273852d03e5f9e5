mod helpers;

use helpers::{block, create_temp_store, mined_chain, teardown_store};
use minichain_core::{Chain, ChainStore, ZERO_HASH};
use minichain_storage::{JsonFileStore, MemoryStore, SledStore};
use rand::Rng;
use std::sync::Arc;
use tempfile::tempdir;

#[tokio::test]
async fn test_storage_integration() -> anyhow::Result<()> {
    let (temp_dir, store) = create_temp_store();
    let blocks = mined_chain(5);
    for b in &blocks {
        store.save("9999", b)?;
    }
    let loaded = store.load("9999")?;
    assert_eq!(loaded, blocks);
    assert!(Chain::from_blocks("9999", loaded).validate_chain());
    teardown_store(temp_dir, store);
    Ok(())
}

#[tokio::test]
async fn test_storage_unknown_node_is_empty() -> anyhow::Result<()> {
    let (temp_dir, store) = create_temp_store();
    assert!(store.load("nobody")?.is_empty());
    teardown_store(temp_dir, store);
    Ok(())
}

#[tokio::test]
async fn test_storage_persistence() -> anyhow::Result<()> {
    let temp_dir = tempdir()?;
    let db_path = temp_dir.path().to_path_buf();
    let blocks = mined_chain(2);
    {
        let store = SledStore::open(&db_path)?;
        store.save("9999", &blocks[0])?;
        store.save("9999", &blocks[1])?;
        store.close()?;
    }
    // Re-open and verify the chain survived
    {
        let store = SledStore::open(&db_path)?;
        let loaded = store.load("9999")?;
        assert_eq!(loaded, blocks);
        assert_eq!(store.node_ids()?, vec!["9999".to_string()]);
    }
    temp_dir.close()?;
    Ok(())
}

#[tokio::test]
async fn test_storage_keeps_node_identities_apart() -> anyhow::Result<()> {
    let (temp_dir, store) = create_temp_store();
    let a = block("a", ZERO_HASH, 1);
    let b = block("b", ZERO_HASH, 2);
    store.save("8001", &a)?;
    store.save("8002", &b)?;
    store.save("8001", &b)?;
    assert_eq!(store.load("8001")?, vec![a, b.clone()]);
    assert_eq!(store.load("8002")?, vec![b]);
    let mut ids = store.node_ids()?;
    ids.sort();
    assert_eq!(ids, vec!["8001".to_string(), "8002".to_string()]);
    teardown_store(temp_dir, store);
    Ok(())
}

#[tokio::test]
async fn test_storage_large_block() -> anyhow::Result<()> {
    let (temp_dir, store) = create_temp_store();
    let mut rng = rand::thread_rng();
    let records: Vec<Vec<u8>> = (0..10_000)
        .map(|_| (0..16).map(|_| rng.gen::<u8>()).collect())
        .collect();
    let large = minichain_core::Block::new(records.clone(), ZERO_HASH, 1_600_000_000);
    store.save("9999", &large)?;
    let loaded = store.load("9999")?;
    assert_eq!(loaded.len(), 1);
    assert_eq!(loaded[0].data, records);
    assert_eq!(loaded[0].header.merkle_root, minichain_core::merkle_root(&records));
    teardown_store(temp_dir, store);
    Ok(())
}

#[tokio::test]
async fn test_storage_concurrency() -> anyhow::Result<()> {
    let (temp_dir, store) = create_temp_store();
    let store = Arc::new(store);
    let num_blocks = 50;
    let mut handles = Vec::new();
    for i in 0..num_blocks {
        let store = Arc::clone(&store);
        handles.push(tokio::task::spawn_blocking(move || {
            store.save("9999", &block(&format!("tx-{i}"), ZERO_HASH, i))
        }));
    }
    for handle in handles {
        handle.await??;
    }
    // No save may be lost even when writers race
    let loaded = store.load("9999")?;
    assert_eq!(loaded.len(), num_blocks as usize);
    let mut stamps: Vec<u32> = loaded.iter().map(|b| b.header.timestamp).collect();
    stamps.sort();
    assert_eq!(stamps, (0..num_blocks).collect::<Vec<_>>());
    let store = Arc::try_unwrap(store).map_err(|_| anyhow::anyhow!("store still shared"))?;
    teardown_store(temp_dir, store);
    Ok(())
}

#[tokio::test]
async fn test_storage_corrupted_blob_is_an_error() -> anyhow::Result<()> {
    let temp_dir = tempdir()?;
    let db_path = temp_dir.path().to_path_buf();
    {
        let sled_db = sled::open(&db_path)?;
        sled_db.open_tree("chains")?.insert("9999", vec![0xFFu8; 10])?;
        sled_db.flush()?;
    }
    let store = SledStore::open(&db_path)?;
    assert!(store.load("9999").is_err());
    assert!(store.save("9999", &block("a", ZERO_HASH, 1)).is_err());
    temp_dir.close()?;
    Ok(())
}

#[tokio::test]
async fn test_storage_rejects_unsafe_node_ids() -> anyhow::Result<()> {
    let (temp_dir, store) = create_temp_store();
    assert!(store.load("../etc").is_err());
    assert!(store.save("", &block("a", ZERO_HASH, 1)).is_err());
    teardown_store(temp_dir, store);

    let dir = tempdir()?;
    let files = JsonFileStore::open(dir.path())?;
    assert!(files.save("a/b", &block("a", ZERO_HASH, 1)).is_err());
    Ok(())
}

#[tokio::test]
async fn test_json_file_store_round_trip() -> anyhow::Result<()> {
    let dir = tempdir()?;
    let blocks = mined_chain(3);
    {
        let store = JsonFileStore::open(dir.path().join("database"))?;
        assert!(store.load("9999")?.is_empty());
        for b in &blocks {
            store.save("9999", b)?;
        }
    }
    let store = JsonFileStore::open(dir.path().join("database"))?;
    let path = store.path_for("9999");
    assert!(path.ends_with("blocks_9999.json"));
    assert!(path.exists());
    assert!(!path.with_extension("json.tmp").exists());
    assert_eq!(store.load("9999")?, blocks);

    let text = std::fs::read_to_string(&path)?;
    assert!(text.contains(&hex::encode(blocks[2].hash)));
    Ok(())
}

#[tokio::test]
async fn test_json_file_store_garbled_file() -> anyhow::Result<()> {
    let dir = tempdir()?;
    let store = JsonFileStore::open(dir.path())?;
    std::fs::write(store.path_for("7000"), b"{ not json")?;
    assert!(store.load("7000").is_err());
    Ok(())
}

#[tokio::test]
async fn test_memory_store_seeding() -> anyhow::Result<()> {
    let blocks = mined_chain(2);
    let store = MemoryStore::with_chain("9999", blocks.clone());
    assert_eq!(store.load("9999")?, blocks);
    assert!(store.load("8000")?.is_empty());
    let extra = block("extra", blocks[1].hash, 1_600_000_100);
    store.save("9999", &extra)?;
    assert_eq!(store.load("9999")?.len(), 3);
    Ok(())
}

#[tokio::test]
async fn test_storage_trait_object() -> anyhow::Result<()> {
    let (temp_dir, sled_store) = create_temp_store();
    let stores: Vec<Arc<dyn ChainStore>> = vec![Arc::new(MemoryStore::new())];
    for store in &stores {
        store.save("1", &block("x", ZERO_HASH, 1))?;
        assert_eq!(Chain::load(store, "1")?.len(), 1);
    }
    let chain = Chain::load(&sled_store, "1")?;
    assert!(chain.is_empty());
    teardown_store(temp_dir, sled_store);
    Ok(())
}
