use super::*;
use crate::primitives::pager::StorageOptions;
use std::time::Duration;
use tempfile::{tempdir, NamedTempFile};

#[test]
fn database_round_trip() {
    let tmp = NamedTempFile::new().expect("temp file");
    let path = tmp.path().to_path_buf();

    {
        let db = connect(&path).expect("open db");
        db.set("alpha".into(), "1".into()).expect("set alpha");
        db.set("beta".into(), "2".into()).expect("set beta");
        db.commit().expect("commit");
        db.close().expect("close");
    }

    let db = connect(&path).expect("reopen db");
    assert_eq!(db.get(&"alpha".into()).expect("get alpha"), "1");
    assert_eq!(db.get(&"beta".into()).expect("get beta"), "2");
    assert_eq!(db.len().expect("len"), 2);
}

#[test]
fn closed_handle_rejects_everything() {
    let dir = tempdir().expect("tempdir");
    let db = connect(dir.path().join("closed.db")).expect("open db");
    db.set("a".into(), "1".into()).expect("set");
    db.close().expect("close");
    assert!(db.is_closed());

    assert!(matches!(db.get(&"a".into()), Err(RedwoodError::Closed)));
    assert!(matches!(db.set("b".into(), "2".into()), Err(RedwoodError::Closed)));
    assert!(matches!(db.commit(), Err(RedwoodError::Closed)));
    assert!(matches!(db.len(), Err(RedwoodError::Closed)));
    assert!(matches!(db.root_address(), Err(RedwoodError::Closed)));
    db.close().expect("second close is a no-op");
}

#[test]
fn uncommitted_changes_are_dropped_on_close() {
    let dir = tempdir().expect("tempdir");
    let path = dir.path().join("dropped.db");
    {
        let db = connect(&path).expect("open db");
        db.set("kept".into(), "yes".into()).expect("set");
        db.commit().expect("commit");
        db.set("lost".into(), "no".into()).expect("set");
        assert_eq!(db.get(&"lost".into()).expect("own write visible"), "no");
        db.close().expect("close");
    }
    let db = connect(&path).expect("reopen");
    assert_eq!(db.get(&"kept".into()).expect("get"), "yes");
    assert!(matches!(db.get(&"lost".into()), Err(RedwoodError::NotFound)));
}

#[test]
fn typed_keys_and_values() {
    let dir = tempdir().expect("tempdir");
    let path = dir.path().join("typed.db");
    {
        let db: Database<u64, Vec<u8>> =
            Database::open_with(&path, DbOptions::unsynced()).expect("open db");
        for n in (0..64u64).rev() {
            db.set(n, n.to_be_bytes().to_vec()).expect("set");
        }
        db.commit().expect("commit");
    }
    let db: Database<u64, Vec<u8>> = Database::connect(&path).expect("reopen");
    let keys: Vec<u64> = db
        .entries()
        .expect("entries")
        .into_iter()
        .map(|(k, _)| k)
        .collect();
    assert_eq!(keys, (0..64).collect::<Vec<_>>());
    assert_eq!(db.get(&7).expect("get"), 7u64.to_be_bytes().to_vec());
    let stats = db.verify().expect("verify");
    assert_eq!(stats.nodes, 64);
}

#[test]
fn commit_returns_the_superblock_root() {
    let dir = tempdir().expect("tempdir");
    let db = connect(dir.path().join("root.db")).expect("open db");
    assert_eq!(db.root_address().expect("root"), Address::NONE);
    assert_eq!(db.commit().expect("empty commit"), Address::NONE);

    db.set("k".into(), "v".into()).expect("set");
    let root = db.commit().expect("commit");
    assert_ne!(root, Address::NONE);
    assert_eq!(db.root_address().expect("root"), root);
    assert_eq!(db.node_address(&"k".into()).expect("node"), Some(root));
}

#[test]
fn invalid_superblock_size_is_rejected() {
    let dir = tempdir().expect("tempdir");
    let options = DbOptions {
        storage: StorageOptions {
            superblock_size: 1000,
            lock_timeout: Some(Duration::from_millis(10)),
            ..StorageOptions::default()
        },
    };
    let opened = Database::<String, String>::open_with(dir.path().join("bad.db"), options);
    assert!(matches!(opened, Err(RedwoodError::Invalid(_))));
}
