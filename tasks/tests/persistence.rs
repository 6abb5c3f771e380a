//! Tasks survive closing and reopening a peer that persists to disk.

use parking_lot::Mutex;
use quickstart_tasks::{PeerConfig, TasksError, TasksPeer};
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;

fn persistent_peer(dir: &Path) -> TasksPeer {
    let mut config = PeerConfig::new("persistence-tests", "token");
    config.persistence_dir = Some(dir.to_path_buf());
    TasksPeer::new(config).unwrap()
}

#[test]
fn test_tasks_survive_reopen() {
    let dir = TempDir::new().unwrap();

    let (kept, deleted) = {
        let peer = persistent_peer(dir.path());
        let kept = peer.add_task("kept", true).unwrap();
        let deleted = peer.add_task("deleted", false).unwrap();
        peer.delete_task(&deleted).unwrap();
        (kept, deleted)
    };

    let peer = persistent_peer(dir.path());
    let active = peer.get_tasks(false).unwrap();
    assert_eq!(active.len(), 1);
    assert_eq!(active[0].id, kept);
    assert!(active[0].done);

    let all = peer.get_tasks(true).unwrap();
    assert!(all.iter().any(|task| task.id == deleted && task.deleted));
}

#[test]
fn test_eviction_is_persisted() {
    let dir = TempDir::new().unwrap();
    {
        let peer = persistent_peer(dir.path());
        let id = peer.add_task("short lived", false).unwrap();
        peer.delete_task(&id).unwrap();
        assert_eq!(peer.evict_deleted_tasks().unwrap(), 1);
    }

    let peer = persistent_peer(dir.path());
    assert!(peer.get_tasks(true).unwrap().is_empty());
}

#[test]
fn test_sync_state_is_not_persisted() {
    let dir = TempDir::new().unwrap();
    {
        let peer = persistent_peer(dir.path());
        peer.start_sync().unwrap();
        assert!(peer.is_sync_active());
    }

    let peer = persistent_peer(dir.path());
    assert!(!peer.is_sync_active());
}

#[test]
fn test_failed_save_does_not_add_task() {
    let dir = TempDir::new().unwrap();
    let store_dir = dir.path().join("store");
    let peer = persistent_peer(&store_dir);

    let counts = Arc::new(Mutex::new(Vec::new()));
    let sink = counts.clone();
    let _observer = peer
        .register_tasks_observer(move |tasks| sink.lock().push(tasks.len()))
        .unwrap();
    peer.add_task("saved", false).unwrap();

    // A plain file where the store directory should be makes every save fail.
    std::fs::remove_dir_all(&store_dir).unwrap();
    std::fs::write(&store_dir, "not a directory").unwrap();

    let err = peer.add_task("lost", false).unwrap_err();
    assert!(matches!(
        err,
        TasksError::Store {
            source: quickstart_engine::Error::Persistence(_),
            ..
        }
    ));
    let titles: Vec<_> = peer
        .get_tasks(true)
        .unwrap()
        .into_iter()
        .map(|task| task.title)
        .collect();
    assert_eq!(titles, ["saved"]);
    assert_eq!(*counts.lock(), vec![0, 1]);
}
