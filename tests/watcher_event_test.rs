//! FileWatcher integration tests
//!
//! Exercises the OS notification wrapper against a real temp directory:
//! event kinds, content hashes and the initial scan. Timings are
//! generous so slow CI filesystems do not flake these tests.

use std::path::Path;
use std::time::Duration;
use tempfile::TempDir;
use tokio::sync::mpsc;

use syncmesh::util::hash_bytes;
use syncmesh::watcher::{FileEvent, FileEventKind, FileWatcher};

const WINDOW: Duration = Duration::from_millis(50);
const WAIT: Duration = Duration::from_secs(10);

/// Receive events until one matches the path (and optional kind filter)
async fn next_event_for(
	rx: &mut mpsc::UnboundedReceiver<FileEvent>,
	path: &Path,
	kind: Option<FileEventKind>,
) -> FileEvent {
	loop {
		let event = tokio::time::timeout(WAIT, rx.recv())
			.await
			.expect("timed out waiting for file event")
			.expect("watcher stream closed");
		if event.path == path && kind.map(|k| k == event.kind).unwrap_or(true) {
			return event;
		}
	}
}

#[tokio::test]
async fn test_create_emits_event_with_content_hash() {
	let dir = TempDir::new().unwrap();
	let (mut watcher, mut rx) = FileWatcher::new(WINDOW).unwrap();
	watcher.watch_path(dir.path()).unwrap();

	// give the OS watch a moment to arm
	tokio::time::sleep(Duration::from_millis(200)).await;

	let file = dir.path().join("created.txt");
	tokio::fs::write(&file, b"fresh content").await.unwrap();

	let event = next_event_for(&mut rx, &file, None).await;
	assert_ne!(event.kind, FileEventKind::Unlink);
	assert_eq!(event.hash.as_deref(), Some(hash_bytes(b"fresh content").as_str()));

	watcher.shutdown().await;
}

#[tokio::test]
async fn test_rapid_writes_coalesce_to_final_hash() {
	let dir = TempDir::new().unwrap();
	let (mut watcher, mut rx) = FileWatcher::new(WINDOW).unwrap();
	watcher.watch_path(dir.path()).unwrap();
	tokio::time::sleep(Duration::from_millis(200)).await;

	let file = dir.path().join("busy.txt");
	tokio::fs::write(&file, b"v1").await.unwrap();
	tokio::fs::write(&file, b"v2").await.unwrap();
	tokio::fs::write(&file, b"v3").await.unwrap();

	// whatever was coalesced, the first event carries the final content
	let event = next_event_for(&mut rx, &file, None).await;
	assert_eq!(event.hash.as_deref(), Some(hash_bytes(b"v3").as_str()));

	watcher.shutdown().await;
}

#[tokio::test]
async fn test_remove_emits_unlink_without_hash() {
	let dir = TempDir::new().unwrap();
	let file = dir.path().join("doomed.txt");
	std::fs::write(&file, b"short-lived").unwrap();

	let (mut watcher, mut rx) = FileWatcher::new(WINDOW).unwrap();
	watcher.watch_path(dir.path()).unwrap();
	tokio::time::sleep(Duration::from_millis(200)).await;

	tokio::fs::remove_file(&file).await.unwrap();

	let event = next_event_for(&mut rx, &file, Some(FileEventKind::Unlink)).await;
	assert!(event.hash.is_none());

	watcher.shutdown().await;
}

#[tokio::test]
async fn test_scan_existing_emits_change_per_file() {
	let dir = TempDir::new().unwrap();
	std::fs::write(dir.path().join("one.txt"), b"one").unwrap();
	std::fs::create_dir(dir.path().join("sub")).unwrap();
	std::fs::write(dir.path().join("sub/two.txt"), b"two").unwrap();

	let (mut watcher, mut rx) = FileWatcher::new(WINDOW).unwrap();
	let count = watcher.scan_existing(dir.path()).await.unwrap();
	assert_eq!(count, 2);

	// scan order is filesystem-dependent: collect both, then assert
	let mut events = Vec::new();
	for _ in 0..2 {
		let event = tokio::time::timeout(WAIT, rx.recv())
			.await
			.expect("timed out waiting for scan event")
			.expect("watcher stream closed");
		assert_eq!(event.kind, FileEventKind::Change);
		events.push(event);
	}
	events.sort_by(|a, b| a.path.cmp(&b.path));

	assert_eq!(events[0].path, dir.path().join("one.txt"));
	assert_eq!(events[0].hash.as_deref(), Some(hash_bytes(b"one").as_str()));
	assert_eq!(events[1].path, dir.path().join("sub/two.txt"));
	assert_eq!(events[1].hash.as_deref(), Some(hash_bytes(b"two").as_str()));

	watcher.shutdown().await;
}

#[tokio::test]
async fn test_shutdown_flushes_pending_events() {
	let dir = TempDir::new().unwrap();
	// a long window that would not expire on its own during this test
	let (mut watcher, mut rx) = FileWatcher::new(Duration::from_secs(30)).unwrap();
	watcher.scan_existing(dir.path()).await.unwrap(); // empty, just exercises the path

	std::fs::write(dir.path().join("late.txt"), b"late").unwrap();
	watcher.watch_path(dir.path()).unwrap();
	tokio::time::sleep(Duration::from_millis(200)).await;
	tokio::fs::write(dir.path().join("late.txt"), b"later").await.unwrap();
	tokio::time::sleep(Duration::from_millis(200)).await;

	// shutdown must flush the still-pending coalesced event
	watcher.shutdown().await;

	let mut seen = false;
	while let Ok(event) = rx.try_recv() {
		if event.path == dir.path().join("late.txt") {
			seen = true;
		}
	}
	assert!(seen, "pending event was dropped at shutdown");
}

// vim: ts=4
