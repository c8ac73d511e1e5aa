//! Filesystem change detection
//!
//! [`FileWatcher`] wraps the OS-native notification backend (inotify,
//! FSEvents, ReadDirectoryChangesW via `notify`) behind a typed event
//! stream. Raw notifications are coalesced per path inside a debounce
//! window so rapid repeated writes emit a single `change` carrying the
//! final content hash. The notification thread only forwards into an
//! unbounded channel; hashing happens on the coalescing task, never on
//! the delivery path.

use crate::error::WatchError;
use crate::logging::*;
use crate::util::{absolutize, hash_file, now_millis};
use notify::{RecommendedWatcher, RecursiveMode, Watcher};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, watch};

/// Kind of observed filesystem mutation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileEventKind {
	Add,
	Change,
	Unlink,
}

/// One observed filesystem mutation
///
/// `hash` is the BLAKE3 hex digest of the file content; absent for
/// `Unlink`. `add` and `unlink` always imply a change; whether a
/// `change` is real is decided downstream by hash comparison.
#[derive(Debug, Clone)]
pub struct FileEvent {
	pub kind: FileEventKind,
	pub path: PathBuf,
	pub hash: Option<String>,
	pub timestamp: u64,
}

/// Raw input into the coalescing task
enum RawEvent {
	Fs(notify::Event),

	/// Synthetic change from an initial scan
	Scan(PathBuf),
}

/// Recursive filesystem watcher with debounce coalescing
pub struct FileWatcher {
	watcher: Option<RecommendedWatcher>,
	watched: HashSet<PathBuf>,
	raw_tx: mpsc::UnboundedSender<RawEvent>,
	stop_tx: watch::Sender<bool>,
	worker: Option<tokio::task::JoinHandle<()>>,
}

impl FileWatcher {
	/// Create a watcher and the stream its [`FileEvent`]s arrive on
	pub fn new(
		debounce_window: Duration,
	) -> Result<(Self, mpsc::UnboundedReceiver<FileEvent>), WatchError> {
		let (raw_tx, raw_rx) = mpsc::unbounded_channel();
		let (out_tx, out_rx) = mpsc::unbounded_channel();
		let (stop_tx, stop_rx) = watch::channel(false);

		let notify_tx = raw_tx.clone();
		let watcher = notify::recommended_watcher(move |res: Result<notify::Event, notify::Error>| {
			match res {
				Ok(event) => {
					let _ = notify_tx.send(RawEvent::Fs(event));
				}
				Err(e) => warn!(error = %e, "Watch backend error"),
			}
		})
		.map_err(|e| WatchError::InitFailed { message: e.to_string() })?;

		let worker = tokio::spawn(coalesce_loop(raw_rx, out_tx, stop_rx, debounce_window));

		Ok((
			FileWatcher { watcher: Some(watcher), watched: HashSet::new(), raw_tx, stop_tx, worker: Some(worker) },
			out_rx,
		))
	}

	/// Begin recursive observation of a directory; idempotent per root
	pub fn watch_path(&mut self, dir: &Path) -> Result<(), WatchError> {
		let dir = absolutize(dir);
		if !dir.is_dir() {
			return Err(WatchError::NotADirectory { path: dir.display().to_string() });
		}
		if self.watched.contains(&dir) {
			return Ok(());
		}

		match &mut self.watcher {
			Some(watcher) => {
				watcher.watch(&dir, RecursiveMode::Recursive).map_err(|e| {
					WatchError::WatchFailed { path: dir.display().to_string(), message: e.to_string() }
				})?;
				info!(path = %dir.display(), "Watching directory");
				self.watched.insert(dir);
				Ok(())
			}
			None => Err(WatchError::InitFailed { message: "watcher already released".to_string() }),
		}
	}

	/// Emit a synthetic `change` event for every file under a root
	///
	/// Used once at engine startup to validate snapshot staleness:
	/// downstream hash comparison turns unchanged files into no-ops.
	pub async fn scan_existing(&self, dir: &Path) -> Result<usize, WatchError> {
		let dir = absolutize(dir);
		let root = dir.clone();

		let files = tokio::task::spawn_blocking(move || {
			let mut files = Vec::new();
			let walk = ignore::WalkBuilder::new(&root)
				.hidden(false)
				.ignore(false)
				.git_ignore(false)
				.git_global(false)
				.git_exclude(false)
				.build();
			for entry in walk {
				match entry {
					Ok(entry) => {
						if entry.file_type().map(|t| t.is_file()).unwrap_or(false) {
							files.push(entry.into_path());
						}
					}
					Err(e) => warn!(error = %e, "Scan entry error"),
				}
			}
			files
		})
		.await
		.map_err(|e| WatchError::ScanFailed { path: dir.display().to_string(), message: e.to_string() })?;

		let count = files.len();
		for path in files {
			let _ = self.raw_tx.send(RawEvent::Scan(path));
		}
		debug!(path = %dir.display(), files = count, "Initial scan queued");
		Ok(count)
	}

	/// Release all OS watch handles
	pub fn unwatch_all(&mut self) {
		if let Some(mut watcher) = self.watcher.take() {
			for dir in self.watched.drain() {
				let _ = watcher.unwatch(&dir);
			}
		}
	}

	/// Release watches and stop the coalescing task, flushing pending events
	pub async fn shutdown(&mut self) {
		self.unwatch_all();
		let _ = self.stop_tx.send(true);
		if let Some(worker) = self.worker.take() {
			let _ = worker.await;
		}
	}
}

/// Pending coalesced mutation for one path
struct Pending {
	kind: FileEventKind,
	deadline: Instant,
}

/// Merge a new observation into a pending one
///
/// Unlink always supersedes; a recreation after unlink is a change; an
/// add absorbs subsequent changes within the window.
fn merge_kind(pending: FileEventKind, new: FileEventKind) -> FileEventKind {
	match (pending, new) {
		(_, FileEventKind::Unlink) => FileEventKind::Unlink,
		(FileEventKind::Unlink, _) => FileEventKind::Change,
		(FileEventKind::Add, _) => FileEventKind::Add,
		(FileEventKind::Change, FileEventKind::Add) => FileEventKind::Add,
		(FileEventKind::Change, FileEventKind::Change) => FileEventKind::Change,
	}
}

/// Map a raw notification to per-path mutations
fn classify(event: &notify::Event) -> Vec<(PathBuf, FileEventKind)> {
	use notify::EventKind;

	let kind = match event.kind {
		EventKind::Create(_) => Some(FileEventKind::Add),
		EventKind::Modify(_) => Some(FileEventKind::Change),
		EventKind::Remove(_) => Some(FileEventKind::Unlink),
		_ => None,
	};

	match kind {
		Some(kind) => event.paths.iter().map(|p| (p.clone(), kind)).collect(),
		None => vec![],
	}
}

async fn coalesce_loop(
	mut raw_rx: mpsc::UnboundedReceiver<RawEvent>,
	out_tx: mpsc::UnboundedSender<FileEvent>,
	mut stop_rx: watch::Receiver<bool>,
	window: Duration,
) {
	let mut pending: HashMap<PathBuf, Pending> = HashMap::new();
	// Tick at a quarter of the window so flushes stay close to their deadline
	let tick = window.checked_div(4).filter(|d| !d.is_zero()).unwrap_or(Duration::from_millis(10));
	let mut interval = tokio::time::interval(tick);
	interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

	loop {
		tokio::select! {
			raw = raw_rx.recv() => {
				match raw {
					Some(RawEvent::Fs(event)) => {
						for (path, kind) in classify(&event) {
							record(&mut pending, path, kind, window);
						}
					}
					Some(RawEvent::Scan(path)) => {
						record(&mut pending, path, FileEventKind::Change, window);
					}
					None => break,
				}
			}
			_ = interval.tick() => {
				flush_due(&mut pending, &out_tx, Instant::now()).await;
			}
			res = stop_rx.changed() => {
				if res.is_err() || *stop_rx.borrow() {
					break;
				}
			}
		}
	}

	// Final flush so shutdown never drops observed mutations
	flush_due(&mut pending, &out_tx, Instant::now() + window + window).await;
}

fn record(pending: &mut HashMap<PathBuf, Pending>, path: PathBuf, kind: FileEventKind, window: Duration) {
	let deadline = Instant::now() + window;
	pending
		.entry(path)
		.and_modify(|p| {
			p.kind = merge_kind(p.kind, kind);
			p.deadline = deadline;
		})
		.or_insert(Pending { kind, deadline });
}

async fn flush_due(
	pending: &mut HashMap<PathBuf, Pending>,
	out_tx: &mpsc::UnboundedSender<FileEvent>,
	now: Instant,
) {
	let due: Vec<PathBuf> = pending
		.iter()
		.filter(|(_, p)| p.deadline <= now)
		.map(|(path, _)| path.clone())
		.collect();

	for path in due {
		let entry = match pending.remove(&path) {
			Some(entry) => entry,
			None => continue,
		};
		if let Some(event) = finalize(&path, entry.kind).await {
			let _ = out_tx.send(event);
		}
	}
}

/// Hash and emit a coalesced mutation; re-checks existence at flush time
async fn finalize(path: &Path, kind: FileEventKind) -> Option<FileEvent> {
	match kind {
		FileEventKind::Unlink => Some(FileEvent {
			kind: FileEventKind::Unlink,
			path: path.to_path_buf(),
			hash: None,
			timestamp: now_millis(),
		}),
		FileEventKind::Add | FileEventKind::Change => {
			if path.is_dir() {
				// Directory mutations carry no content; creation is implied
				// by the files that appear beneath it
				return None;
			}
			match hash_file(path).await {
				Ok(hash) => Some(FileEvent {
					kind,
					path: path.to_path_buf(),
					hash: Some(hash),
					timestamp: now_millis(),
				}),
				Err(e) if e.kind() == std::io::ErrorKind::NotFound => Some(FileEvent {
					kind: FileEventKind::Unlink,
					path: path.to_path_buf(),
					hash: None,
					timestamp: now_millis(),
				}),
				Err(e) => {
					warn!(path = %path.display(), error = %e, "Failed to hash changed file");
					None
				}
			}
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_merge_kind_unlink_supersedes() {
		assert_eq!(merge_kind(FileEventKind::Add, FileEventKind::Unlink), FileEventKind::Unlink);
		assert_eq!(merge_kind(FileEventKind::Change, FileEventKind::Unlink), FileEventKind::Unlink);
	}

	#[test]
	fn test_merge_kind_recreate_is_change() {
		assert_eq!(merge_kind(FileEventKind::Unlink, FileEventKind::Add), FileEventKind::Change);
	}

	#[test]
	fn test_merge_kind_add_absorbs_changes() {
		assert_eq!(merge_kind(FileEventKind::Add, FileEventKind::Change), FileEventKind::Add);
	}

	#[tokio::test]
	async fn test_watch_path_is_idempotent() {
		let dir = tempfile::tempdir().unwrap();
		let (mut watcher, _rx) = FileWatcher::new(Duration::from_millis(50)).unwrap();

		watcher.watch_path(dir.path()).unwrap();
		watcher.watch_path(dir.path()).unwrap();
		watcher.shutdown().await;
	}

	#[tokio::test]
	async fn test_watch_path_rejects_files() {
		let dir = tempfile::tempdir().unwrap();
		let file = dir.path().join("f.txt");
		std::fs::write(&file, b"x").unwrap();

		let (mut watcher, _rx) = FileWatcher::new(Duration::from_millis(50)).unwrap();
		assert!(matches!(watcher.watch_path(&file), Err(WatchError::NotADirectory { .. })));
		watcher.shutdown().await;
	}
}

// vim: ts=4
