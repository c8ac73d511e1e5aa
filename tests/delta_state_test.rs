//! DeltaSync state machine and snapshot persistence tests
//!
//! Exercises the change-decision contract over event sequences, the
//! confirm lifecycle and the snapshot round-trip guarantee.

use std::path::PathBuf;
use tempfile::TempDir;

use syncmesh::delta::{DeltaSync, NoopMetrics, SyncStatus};
use syncmesh::watcher::{FileEvent, FileEventKind};

fn event(kind: FileEventKind, path: &str, hash: Option<&str>) -> FileEvent {
	FileEvent { kind, path: PathBuf::from(path), hash: hash.map(String::from), timestamp: 0 }
}

fn delta_in(dir: &TempDir) -> DeltaSync {
	DeltaSync::new(dir.path().join("snapshot.json"), Box::new(NoopMetrics))
}

#[test]
fn test_event_sequence_decisions() {
	let dir = TempDir::new().unwrap();
	let delta = delta_in(&dir);

	// add: always a change
	assert!(delta.handle_file_event(&event(FileEventKind::Add, "/p/a", Some("h1"))));

	// change with identical hash: no-op
	assert!(!delta.handle_file_event(&event(FileEventKind::Change, "/p/a", Some("h1"))));

	// change with differing hash: real change
	assert!(delta.handle_file_event(&event(FileEventKind::Change, "/p/a", Some("h2"))));

	// unlink: always a change, destroys state
	assert!(delta.handle_file_event(&event(FileEventKind::Unlink, "/p/a", None)));
	assert!(delta.state_of("/p/a").is_none());

	// change on a path with no state: treated as first observation
	assert!(delta.handle_file_event(&event(FileEventKind::Change, "/p/b", Some("h1"))));
	assert_eq!(delta.state_of("/p/b").unwrap().sync_status, SyncStatus::Pending);
}

#[test]
fn test_noop_change_does_not_mutate_state() {
	let dir = TempDir::new().unwrap();
	let delta = delta_in(&dir);

	delta.handle_file_event(&event(FileEventKind::Add, "/p/a", Some("h1")));
	delta.confirm_sync("/p/a");
	let confirmed = delta.state_of("/p/a").unwrap();

	// same hash again: the confirmed state must survive untouched
	assert!(!delta.handle_file_event(&event(FileEventKind::Change, "/p/a", Some("h1"))));
	assert_eq!(delta.state_of("/p/a").unwrap(), confirmed);
}

#[test]
fn test_confirm_sync_lifecycle() {
	let dir = TempDir::new().unwrap();
	let delta = delta_in(&dir);

	delta.handle_file_event(&event(FileEventKind::Add, "/p/a", Some("h1")));
	assert_eq!(delta.state_of("/p/a").unwrap().sync_status, SyncStatus::Pending);
	assert!(delta.state_of("/p/a").unwrap().last_sync_time.is_none());

	delta.confirm_sync("/p/a");
	let state = delta.state_of("/p/a").unwrap();
	assert_eq!(state.sync_status, SyncStatus::Synced);
	assert!(state.last_sync_time.is_some());

	// idempotent, and unknown paths are a no-op
	delta.confirm_sync("/p/a");
	delta.confirm_sync("/never/seen");
	assert_eq!(delta.state_of("/p/a").unwrap().sync_status, SyncStatus::Synced);

	// a new hash re-arms the pending state
	delta.handle_file_event(&event(FileEventKind::Change, "/p/a", Some("h2")));
	assert_eq!(delta.state_of("/p/a").unwrap().sync_status, SyncStatus::Pending);
}

#[test]
fn test_pending_syncs_view() {
	let dir = TempDir::new().unwrap();
	let delta = delta_in(&dir);

	delta.handle_file_event(&event(FileEventKind::Add, "/p/a", Some("h1")));
	delta.handle_file_event(&event(FileEventKind::Add, "/p/b", Some("h2")));
	delta.handle_file_event(&event(FileEventKind::Add, "/p/c", Some("h3")));
	delta.confirm_sync("/p/b");

	let mut pending: Vec<String> = delta.pending_syncs().into_iter().map(|s| s.path).collect();
	pending.sort();
	assert_eq!(pending, vec!["/p/a".to_string(), "/p/c".to_string()]);
}

#[tokio::test]
async fn test_snapshot_round_trip_restores_confirmed_state() {
	let dir = TempDir::new().unwrap();
	let delta = delta_in(&dir);

	delta.handle_file_event(&event(FileEventKind::Add, "/p/a", Some("h1")));
	delta.confirm_sync("/p/a");
	delta.handle_file_event(&event(FileEventKind::Add, "/p/b", Some("h2")));

	let confirmed = delta.state_of("/p/a").unwrap();
	let pending = delta.state_of("/p/b").unwrap();

	delta.save_snapshot().await.unwrap();
	delta.clear_state("/p/a");
	delta.clear_state("/p/b");
	assert!(delta.is_empty());

	let restored = delta.load_snapshot().await.unwrap();
	assert_eq!(restored, 2);
	assert_eq!(delta.state_of("/p/a").unwrap(), confirmed);
	assert_eq!(delta.state_of("/p/b").unwrap(), pending);
}

#[tokio::test]
async fn test_snapshot_survives_process_restart() {
	let dir = TempDir::new().unwrap();
	let snapshot = dir.path().join("snapshot.json");

	{
		let delta = DeltaSync::new(snapshot.clone(), Box::new(NoopMetrics));
		delta.handle_file_event(&event(FileEventKind::Add, "/p/a", Some("h1")));
		delta.confirm_sync("/p/a");
		delta.save_snapshot().await.unwrap();
	}

	// a fresh instance (as after a restart) reconstructs from disk
	let delta = DeltaSync::new(snapshot, Box::new(NoopMetrics));
	assert!(delta.is_empty());
	delta.load_snapshot().await.unwrap();
	let state = delta.state_of("/p/a").unwrap();
	assert_eq!(state.hash, "h1");
	assert_eq!(state.sync_status, SyncStatus::Synced);
}

#[tokio::test]
async fn test_atomic_snapshot_leaves_no_partial_files() {
	let dir = TempDir::new().unwrap();
	let delta = delta_in(&dir);

	for i in 0..50 {
		delta.handle_file_event(&event(FileEventKind::Add, &format!("/p/{}", i), Some("h")));
	}
	delta.save_snapshot().await.unwrap();
	delta.save_snapshot().await.unwrap();

	let entries: Vec<String> = std::fs::read_dir(dir.path())
		.unwrap()
		.map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
		.collect();
	assert_eq!(entries, vec!["snapshot.json".to_string()]);
}

// vim: ts=4
