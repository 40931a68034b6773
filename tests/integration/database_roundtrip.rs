#![allow(missing_docs)]

use std::sync::{Arc, Once};

use redwood::storage::rbtree::{NodeRef, Ref};
use redwood::{
    connect, Address, Database, DbOptions, RedBlackTree, RedwoodError, Result, Storage,
    StorageOptions,
};
use tempfile::tempdir;
use tracing_subscriber::EnvFilter;

fn init_tracing() {
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new("redwood=debug"));
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .with_ansi(false)
            .try_init();
    });
}

fn count_nodes(node_ref: &NodeRef<u64, String>, storage: &Storage) -> Result<usize> {
    match node_ref.get(storage)? {
        None => Ok(0),
        Some(node) => {
            Ok(1 + count_nodes(node.left(), storage)? + count_nodes(node.right(), storage)?)
        }
    }
}

#[test]
fn committed_values_survive_reconnect() -> Result<()> {
    init_tracing();
    let dir = tempdir()?;
    let path = dir.path().join("roundtrip.db");

    let db = connect(&path)?;
    db.set("1:size".into(), "42".into())?;
    db.set("1:name".into(), "temperature".into())?;
    db.set("".into(), "empty key".into())?;
    db.set("unicode".into(), "żółw 🐢".into())?;
    db.commit()?;
    db.close()?;

    let reopened = connect(&path)?;
    assert_eq!(reopened.get(&"1:size".into())?, "42");
    assert_eq!(reopened.get(&"1:name".into())?, "temperature");
    assert_eq!(reopened.get(&"".into())?, "empty key");
    assert_eq!(reopened.get(&"unicode".into())?, "żółw 🐢");
    assert_eq!(reopened.len()?, 4);
    reopened.verify()?;
    Ok(())
}

#[test]
fn set_then_close_fails_every_later_call() -> Result<()> {
    init_tracing();
    let dir = tempdir()?;
    let db = connect(dir.path().join("closed.db"))?;
    db.set("a".into(), "1".into())?;
    db.close()?;

    assert!(matches!(db.get(&"a".into()), Err(RedwoodError::Closed)));
    assert!(matches!(
        db.set("a".into(), "2".into()),
        Err(RedwoodError::Closed)
    ));
    assert!(matches!(db.commit(), Err(RedwoodError::Closed)));
    Ok(())
}

#[test]
fn fresh_handle_reports_missing_keys() -> Result<()> {
    init_tracing();
    let dir = tempdir()?;
    let db = connect(dir.path().join("fresh.db"))?;
    for key in ["a", "", "1:size", "zzz"] {
        assert!(matches!(db.get(&key.into()), Err(RedwoodError::NotFound)));
    }
    assert!(db.is_empty()?);
    assert_eq!(db.root_address()?, Address::NONE);
    Ok(())
}

#[test]
fn file_only_grows_and_every_old_root_stays_readable() -> Result<()> {
    init_tracing();
    let dir = tempdir()?;
    let path = dir.path().join("grow.db");
    let db: Database<u64, String> = Database::open_with(&path, DbOptions::unsynced())?;

    let mut last_len = std::fs::metadata(&path)?.len();
    assert_eq!(last_len, 4096, "fresh file is just the superblock");
    let mut roots = Vec::new();
    for batch in 0..10u64 {
        for key in 0..20u64 {
            db.set(batch * 20 + key, format!("b{batch}"))?;
        }
        roots.push(db.commit()?);
        let len = std::fs::metadata(&path)?.len();
        assert!(len > last_len, "append-only file grows with each commit");
        last_len = len;
    }
    db.close()?;

    let storage = Arc::new(Storage::open(&path, StorageOptions::default())?);
    for (batch, root) in roots.iter().enumerate() {
        let old_root: NodeRef<u64, String> = Ref::on_disk(*root);
        assert_eq!(count_nodes(&old_root, &storage)?, (batch + 1) * 20);
    }
    let tree: RedBlackTree<u64, String> = RedBlackTree::open(storage)?;
    assert_eq!(tree.len()?, 200);
    assert_eq!(tree.get(&0)?, "b0");
    assert_eq!(tree.get(&199)?, "b9");
    Ok(())
}

#[test]
fn overwrites_are_visible_after_reconnect() -> Result<()> {
    init_tracing();
    let dir = tempdir()?;
    let path = dir.path().join("overwrite.db");
    for round in 0..3 {
        let db = connect(&path)?;
        db.set("counter".into(), round.to_string())?;
        db.commit()?;
    }
    let db = connect(&path)?;
    assert_eq!(db.get(&"counter".into())?, "2");
    assert_eq!(db.len()?, 1);
    Ok(())
}

#[test]
fn small_superblock_file_reopens_with_default_options() -> Result<()> {
    init_tracing();
    let dir = tempdir()?;
    let path = dir.path().join("small.db");
    let options = DbOptions {
        storage: StorageOptions {
            superblock_size: 16,
            ..StorageOptions::default()
        },
    };
    let db: Database = Database::open_with(&path, options)?;
    db.set("k".into(), "v".into())?;
    db.commit()?;
    db.close()?;
    let len = std::fs::metadata(&path)?.len();

    let reopened = connect(&path)?;
    assert_eq!(reopened.get(&"k".into())?, "v");
    assert_eq!(std::fs::metadata(&path)?.len(), len);
    Ok(())
}
