//! Per-path sync state and snapshot persistence
//!
//! [`DeltaSync`] decides whether an observed event represents a real
//! change (content hash comparison) and owns the per-path state map.
//! The map is the sole recovery mechanism after a restart: it is
//! serialized to a snapshot document written atomically
//! (write-temp-then-rename), on a fixed interval and on demand.

use crate::error::StateError;
use crate::util::now_millis;
use crate::watcher::{FileEvent, FileEventKind};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// Sync lifecycle of one tracked path
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncStatus {
	/// Content changed since the last confirmed sync
	Pending,
	/// Confirmed in sync with the destination
	Synced,
}

/// State of one tracked path, owned exclusively by [`DeltaSync`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncState {
	pub path: String,
	pub hash: String,
	pub sync_status: SyncStatus,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub last_sync_time: Option<u64>,
}

/// Sink for operational counters
///
/// Injected so callers decide where numbers go; the default discards
/// them.
pub trait MetricsSink: Send + Sync {
	/// Count one occurrence of a named metric
	fn incr(&self, metric: &str);
}

/// Default sink that discards all metrics
pub struct NoopMetrics;

impl MetricsSink for NoopMetrics {
	fn incr(&self, _metric: &str) {}
}

/// Sink that logs counters at debug level
pub struct TracingMetrics;

impl MetricsSink for TracingMetrics {
	fn incr(&self, metric: &str) {
		tracing::debug!(metric = metric, "metric");
	}
}

/// Per-path sync state machine with snapshot persistence
pub struct DeltaSync {
	states: Mutex<BTreeMap<String, SyncState>>,
	snapshot_path: PathBuf,
	metrics: Box<dyn MetricsSink>,
}

impl DeltaSync {
	/// Create with a snapshot location and a metrics sink
	pub fn new(snapshot_path: PathBuf, metrics: Box<dyn MetricsSink>) -> Self {
		DeltaSync { states: Mutex::new(BTreeMap::new()), snapshot_path, metrics }
	}

	/// Decide whether an event represents a real change requiring sync
	///
	/// `add` and `unlink` always do; `change` only when the hash differs
	/// from the last recorded one. A no-op change mutates nothing. On a
	/// real change the state moves to pending with the new hash; unlink
	/// destroys the state entirely.
	pub fn handle_file_event(&self, event: &FileEvent) -> bool {
		self.metrics.incr("delta.events");
		let key = event.path.display().to_string();
		let mut states = self.states.lock().unwrap();

		match event.kind {
			FileEventKind::Unlink => {
				states.remove(&key);
				self.metrics.incr("delta.changes");
				true
			}
			FileEventKind::Add | FileEventKind::Change => {
				let hash = event.hash.clone().unwrap_or_default();
				if event.kind == FileEventKind::Change {
					if let Some(state) = states.get(&key) {
						if state.hash == hash {
							return false;
						}
					}
				}
				states.insert(
					key.clone(),
					SyncState { path: key, hash, sync_status: SyncStatus::Pending, last_sync_time: None },
				);
				self.metrics.incr("delta.changes");
				true
			}
		}
	}

	/// Confirm a successful sync: pending -> synced, stamps the time
	///
	/// Idempotent; confirming an unknown path is a no-op, not an error.
	pub fn confirm_sync(&self, path: &str) {
		let mut states = self.states.lock().unwrap();
		if let Some(state) = states.get_mut(path) {
			state.sync_status = SyncStatus::Synced;
			state.last_sync_time = Some(now_millis());
			self.metrics.incr("delta.confirms");
		}
	}

	/// All states still awaiting confirmation
	pub fn pending_syncs(&self) -> Vec<SyncState> {
		let states = self.states.lock().unwrap();
		states.values().filter(|s| s.sync_status == SyncStatus::Pending).cloned().collect()
	}

	/// Current state of one path
	pub fn state_of(&self, path: &str) -> Option<SyncState> {
		self.states.lock().unwrap().get(path).cloned()
	}

	/// Number of tracked paths
	pub fn len(&self) -> usize {
		self.states.lock().unwrap().len()
	}

	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}

	/// Forget one path
	pub fn clear_state(&self, path: &str) {
		self.states.lock().unwrap().remove(path);
	}

	/// Forget everything
	pub fn clear_all(&self) {
		self.states.lock().unwrap().clear();
	}

	/// Persist the full state map atomically
	///
	/// Writes to a temp file next to the snapshot and renames over it,
	/// so a crash mid-write never leaves a truncated snapshot behind.
	pub async fn save_snapshot(&self) -> Result<(), StateError> {
		let snapshot = {
			let states = self.states.lock().unwrap();
			serde_json::to_string_pretty(&*states)
				.map_err(|e| StateError::SaveFailed { source: Box::new(e) })?
		};

		if let Some(parent) = self.snapshot_path.parent() {
			if !parent.as_os_str().is_empty() && !parent.exists() {
				tokio::fs::create_dir_all(parent)
					.await
					.map_err(|e| StateError::SaveFailed { source: Box::new(e) })?;
			}
		}

		let tmp = self.snapshot_path.with_extension("json.tmp");
		tokio::fs::write(&tmp, snapshot)
			.await
			.map_err(|e| StateError::SaveFailed { source: Box::new(e) })?;
		tokio::fs::rename(&tmp, &self.snapshot_path)
			.await
			.map_err(|e| StateError::SaveFailed { source: Box::new(e) })?;

		self.metrics.incr("delta.snapshots");
		Ok(())
	}

	/// Restore the state map from the latest snapshot
	///
	/// Replaces the in-memory map wholesale. A missing snapshot restores
	/// nothing and is not an error; a corrupted one is.
	pub async fn load_snapshot(&self) -> Result<usize, StateError> {
		let contents = match tokio::fs::read_to_string(&self.snapshot_path).await {
			Ok(contents) => contents,
			Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
			Err(e) => return Err(StateError::LoadFailed { source: Box::new(e) }),
		};

		let loaded: BTreeMap<String, SyncState> = serde_json::from_str(&contents)
			.map_err(|e| StateError::Corrupted { message: e.to_string() })?;

		let count = loaded.len();
		*self.states.lock().unwrap() = loaded;
		Ok(count)
	}

	/// Snapshot file location
	pub fn snapshot_path(&self) -> &Path {
		&self.snapshot_path
	}
}


// vim: ts=4
