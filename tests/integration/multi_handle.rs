#![allow(missing_docs)]

use std::sync::mpsc;
use std::thread;
use std::time::Duration;

use redwood::{connect, Database, DbOptions, RedwoodError, Result, StorageOptions};
use tempfile::tempdir;

fn with_timeout(ms: u64) -> DbOptions {
    DbOptions {
        storage: StorageOptions {
            lock_timeout: Some(Duration::from_millis(ms)),
            ..StorageOptions::default()
        },
    }
}

#[test]
fn reader_sees_commits_from_another_handle() -> Result<()> {
    let dir = tempdir()?;
    let path = dir.path().join("shared.db");
    let writer = connect(&path)?;
    let reader = connect(&path)?;

    writer.set("k".into(), "v1".into())?;
    writer.commit()?;
    assert_eq!(reader.get(&"k".into())?, "v1");

    writer.set("k".into(), "v2".into())?;
    writer.commit()?;
    assert_eq!(reader.get(&"k".into())?, "v2");
    assert_eq!(reader.root_address()?, writer.root_address()?);
    Ok(())
}

#[test]
fn uncommitted_changes_stay_private() -> Result<()> {
    let dir = tempdir()?;
    let path = dir.path().join("private.db");
    let writer = connect(&path)?;
    let reader = connect(&path)?;

    writer.set("draft".into(), "pending".into())?;
    assert_eq!(writer.get(&"draft".into())?, "pending");
    assert!(matches!(
        reader.get(&"draft".into()),
        Err(RedwoodError::NotFound)
    ));

    writer.commit()?;
    assert_eq!(reader.get(&"draft".into())?, "pending");
    Ok(())
}

#[test]
fn alternating_writers_do_not_lose_updates() -> Result<()> {
    let dir = tempdir()?;
    let path = dir.path().join("alternate.db");
    let first = connect(&path)?;
    let second = connect(&path)?;

    for round in 0..5 {
        first.set(format!("first-{round}"), round.to_string())?;
        first.commit()?;
        // Taking the lock reloads the root, so this builds on `first`'s commit.
        second.set(format!("second-{round}"), round.to_string())?;
        second.commit()?;
    }

    let check = connect(&path)?;
    assert_eq!(check.len()?, 10);
    for round in 0..5 {
        assert_eq!(check.get(&format!("first-{round}"))?, round.to_string());
        assert_eq!(check.get(&format!("second-{round}"))?, round.to_string());
    }
    check.verify()?;
    Ok(())
}

#[test]
fn second_writer_times_out_while_lock_is_held() -> Result<()> {
    let dir = tempdir()?;
    let path = dir.path().join("contended.db");
    let holder = connect(&path)?;
    let waiter: Database = Database::open_with(&path, with_timeout(50))?;

    holder.set("owner".into(), "holder".into())?;
    assert!(matches!(
        waiter.set("owner".into(), "waiter".into()),
        Err(RedwoodError::LockUnavailable(_))
    ));

    holder.commit()?;
    waiter.set("owner".into(), "waiter".into())?;
    waiter.commit()?;
    assert_eq!(holder.get(&"owner".into())?, "waiter");
    Ok(())
}

#[test]
fn blocked_writer_proceeds_after_commit_in_other_thread() -> Result<()> {
    let dir = tempdir()?;
    let path = dir.path().join("threads.db");
    let (locked_tx, locked_rx) = mpsc::channel();

    let holder_path = path.clone();
    let holder = thread::spawn(move || -> Result<()> {
        let db = connect(&holder_path)?;
        db.set("from-holder".into(), "1".into())?;
        locked_tx.send(()).expect("main thread alive");
        thread::sleep(Duration::from_millis(50));
        db.commit()?;
        Ok(())
    });

    locked_rx.recv().expect("holder took the lock");
    let db = connect(&path)?;
    db.set("from-main".into(), "2".into())?;
    db.commit()?;
    holder.join().expect("holder thread")?;

    let check = connect(&path)?;
    assert_eq!(check.get(&"from-holder".into())?, "1");
    assert_eq!(check.get(&"from-main".into())?, "2");
    Ok(())
}
