//! End-to-end sync orchestration
//!
//! The [`SyncEngine`] is the only component that talks to all others.
//! Watcher events flow through a dispatcher into single-writer per-path
//! worker tasks, so events for one path are processed in arrival order
//! while different paths proceed concurrently, bounded by
//! `advanced.maxConcurrentSyncs`. Hashing, copying, snapshots and
//! retraining all run on worker tasks, never on the watcher delivery
//! path.
//!
//! Failure flow: classify via [`ErrorHandler`], execute the recovery
//! plan phase by phase when recoverable, feed the outcome back into the
//! model, and freeze the path behind `critical_failure` when automatic
//! handling is exhausted.

use crate::bridge::{AgentBridge, NoopBridge};
use crate::config::{ConflictResolution, SyncStrategy};
use crate::delta::{DeltaSync, MetricsSink, NoopMetrics};
use crate::error::SyncError;
use crate::events::{EngineEvent, EventBus};
use crate::handler::{ClassifiedError, ErrorHandler, ErrorStats};
use crate::logging::*;
use crate::model::{FailureSample, MLModel};
use crate::recovery::{RecoveryAction, RecoveryPlan};
use crate::registry::Registry;
use crate::util::{hash_file, now_millis};
use crate::watcher::{FileEvent, FileEventKind, FileWatcher};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};
use tokio::sync::{broadcast, mpsc, watch, Semaphore};

/// Priority at or above which adaptive paths sync in realtime
const ADAPTIVE_REALTIME_PRIORITY: u32 = 5;

/// Bounded depth of each per-path work queue; a full queue delays
/// dispatch instead of dropping events
const WORKER_QUEUE_DEPTH: usize = 64;

/// Identity the engine syncs as, checked against access rules
#[derive(Debug, Clone, Default)]
pub struct Identity {
	pub user: String,
	pub groups: Vec<String>,
}

/// One completed sync action
#[derive(Debug, Clone)]
pub struct SyncRecord {
	pub path: String,
	pub strategy: SyncStrategy,
	pub priority: u32,
	pub duration_ms: u64,
	pub timestamp: u64,
}

/// Outcome of one recovery action within a phase
#[derive(Debug, Clone)]
pub struct PhaseOutcome {
	pub phase_id: String,
	pub succeeded: bool,
	pub detail: String,
}

/// One executed recovery attempt
#[derive(Debug, Clone)]
pub struct RecoveryRecord {
	pub path: String,
	pub error_id: String,
	pub phases: Vec<PhaseOutcome>,
	pub recovered: bool,
	pub timestamp: u64,
}

/// Observability view over completed work
#[derive(Debug, Clone, Default)]
pub struct EngineMetrics {
	pub syncs: Vec<SyncRecord>,
	pub recoveries: Vec<RecoveryRecord>,
}

/// What a recovery action reported
enum ActionOutcome {
	/// Check passed
	Success(String),
	/// Check passed with acceptable degradation
	Degraded(String),
	/// The failed operation was re-attempted and succeeded
	Repaired,
	/// Phase cannot proceed
	Failed(String),
}

/// Builder for a wired engine
pub struct SyncEngineBuilder {
	registry: Option<Registry>,
	plan: RecoveryPlan,
	bridge: Box<dyn AgentBridge>,
	metrics_sink: Box<dyn MetricsSink>,
	identity: Identity,
	snapshot_path: Option<PathBuf>,
}

impl SyncEngineBuilder {
	pub fn new() -> Self {
		SyncEngineBuilder {
			registry: None,
			plan: RecoveryPlan::default_plan(),
			bridge: Box::new(NoopBridge),
			metrics_sink: Box::new(NoopMetrics),
			identity: Identity::default(),
			snapshot_path: None,
		}
	}

	/// Policy registry (required)
	pub fn registry(mut self, registry: Registry) -> Self {
		self.registry = Some(registry);
		self
	}

	/// Recovery plan (built-in default plan otherwise)
	pub fn recovery_plan(mut self, plan: RecoveryPlan) -> Self {
		self.plan = plan;
		self
	}

	/// External agent hint source
	pub fn bridge(mut self, bridge: Box<dyn AgentBridge>) -> Self {
		self.bridge = bridge;
		self
	}

	/// Metrics sink for DeltaSync counters
	pub fn metrics_sink(mut self, sink: Box<dyn MetricsSink>) -> Self {
		self.metrics_sink = sink;
		self
	}

	/// Identity checked against access control rules
	pub fn identity(mut self, user: &str, groups: Vec<String>) -> Self {
		self.identity = Identity { user: user.to_string(), groups };
		self
	}

	/// Snapshot location override (default: `<stateDir>/snapshot.json`)
	pub fn snapshot_path(mut self, path: PathBuf) -> Self {
		self.snapshot_path = Some(path);
		self
	}

	pub fn build(self) -> Result<SyncEngine, SyncError> {
		let registry = self
			.registry
			.ok_or_else(|| SyncError::Other { message: "SyncEngineBuilder: registry is required".to_string() })?;

		let snapshot_path = self
			.snapshot_path
			.unwrap_or_else(|| registry.state_dir().join("snapshot.json"));

		let advanced = registry.advanced_config().clone();
		let events = EventBus::default();

		let (watcher, event_rx) =
			FileWatcher::new(Duration::from_millis(advanced.debounce_window_ms))?;

		let inner = Arc::new(EngineInner {
			delta: DeltaSync::new(snapshot_path, self.metrics_sink),
			model: MLModel::new(events.clone()),
			errors: ErrorHandler::new(events.clone()),
			plan: self.plan,
			bridge: self.bridge,
			events,
			identity: self.identity,
			metrics: Mutex::new(EngineMetrics::default()),
			frozen: Mutex::new(HashSet::new()),
			semaphore: Semaphore::new(advanced.max_concurrent_syncs.max(1)),
			registry,
		});

		let (shutdown_tx, shutdown_rx) = watch::channel(false);

		Ok(SyncEngine {
			inner,
			watcher: Some(watcher),
			event_rx: Some(event_rx),
			dispatcher: None,
			tasks: Vec::new(),
			shutdown_tx,
			shutdown_rx,
		})
	}
}

impl Default for SyncEngineBuilder {
	fn default() -> Self {
		Self::new()
	}
}

/// The orchestrator
pub struct SyncEngine {
	inner: Arc<EngineInner>,
	watcher: Option<FileWatcher>,
	event_rx: Option<mpsc::UnboundedReceiver<FileEvent>>,
	dispatcher: Option<tokio::task::JoinHandle<()>>,
	tasks: Vec<tokio::task::JoinHandle<()>>,
	shutdown_tx: watch::Sender<bool>,
	shutdown_rx: watch::Receiver<bool>,
}

impl SyncEngine {
	pub fn builder() -> SyncEngineBuilder {
		SyncEngineBuilder::new()
	}

	/// Wire all components and begin listening for file events
	///
	/// Loads the latest snapshot, registers a watch on every configured
	/// source root, seeds staleness validation with an initial scan and
	/// spawns the dispatcher plus the periodic snapshot loop.
	pub async fn initialize(&mut self) -> Result<(), SyncError> {
		let inner = self.inner.clone();

		if inner.registry.ml_config().enabled {
			inner.model.initialize();
		}

		match inner.delta.load_snapshot().await {
			Ok(count) if count > 0 => info!(paths = count, "State restored from snapshot"),
			Ok(_) => {}
			Err(e) => {
				// A bad snapshot must not keep the engine down; classify
				// and start from empty state
				inner.errors.handle("delta_sync", &e.to_string());
			}
		}

		let watcher = self
			.watcher
			.as_mut()
			.ok_or_else(|| SyncError::Other { message: "engine already shut down".to_string() })?;

		let roots: Vec<PathBuf> = inner.registry.path_rules().iter().map(|r| r.source.clone()).collect();
		for root in &roots {
			watcher.watch_path(root)?;
		}
		for root in &roots {
			watcher.scan_existing(root).await?;
		}

		let event_rx = self
			.event_rx
			.take()
			.ok_or_else(|| SyncError::Other { message: "engine already initialized".to_string() })?;

		self.dispatcher = Some(tokio::spawn(dispatch_loop(
			self.inner.clone(),
			event_rx,
			self.shutdown_rx.clone(),
		)));

		let snapshot_interval = inner.registry.advanced_config().snapshot_interval_ms;
		self.tasks.push(tokio::spawn(snapshot_loop(
			self.inner.clone(),
			snapshot_interval,
			self.shutdown_rx.clone(),
		)));

		let monitoring = inner.registry.monitoring_config();
		if monitoring.enabled {
			self.tasks.push(tokio::spawn(monitor_loop(
				self.inner.clone(),
				monitoring.interval_ms,
				self.shutdown_rx.clone(),
			)));
		}

		info!(project = %inner.registry.project_id(), roots = roots.len(), "Sync engine initialized");
		Ok(())
	}

	/// Subscribe to engine events
	pub fn subscribe(&self) -> broadcast::Receiver<EngineEvent> {
		self.inner.events.subscribe()
	}

	/// Completed syncs and recoveries
	pub fn get_metrics(&self) -> EngineMetrics {
		self.inner.metrics.lock().unwrap().clone()
	}

	/// Error health snapshot
	pub fn error_stats(&self) -> ErrorStats {
		self.inner.errors.stats()
	}

	/// The error registry, for queries and explicit retries
	pub fn errors(&self) -> &ErrorHandler {
		&self.inner.errors
	}

	/// The prediction model
	pub fn model(&self) -> &MLModel {
		&self.inner.model
	}

	/// The per-path state machine
	pub fn delta(&self) -> &DeltaSync {
		&self.inner.delta
	}

	/// The policy registry
	pub fn registry(&self) -> &Registry {
		&self.inner.registry
	}

	/// Offer every recoverable stored error for retry
	///
	/// Emits one `retry_error` per error; the actual re-execution
	/// happens when the next event for the path is observed (or after
	/// [`unfreeze`](Self::unfreeze)).
	pub fn retry_recoverable(&self) -> Vec<ClassifiedError> {
		self.inner.errors.retry_recoverable()
	}

	/// Paths currently frozen pending human intervention
	pub fn frozen_paths(&self) -> Vec<String> {
		let frozen = self.inner.frozen.lock().unwrap();
		frozen.iter().cloned().collect()
	}

	/// Manually clear a frozen path so automatic syncing resumes
	pub fn unfreeze(&self, path: &str) -> bool {
		self.inner.frozen.lock().unwrap().remove(path)
	}

	/// Stop watchers, drain in-flight work and flush a final snapshot
	///
	/// In-flight sync operations get a bounded drain window
	/// (`advanced.timeoutMs`); the final snapshot is written atomically
	/// regardless, so persisted state is never partial.
	pub async fn shutdown(&mut self) -> Result<(), SyncError> {
		info!("Shutting down sync engine");
		let timeout = Duration::from_millis(self.inner.registry.advanced_config().timeout_ms);

		if let Some(mut watcher) = self.watcher.take() {
			watcher.shutdown().await;
		}

		if let Some(dispatcher) = self.dispatcher.take() {
			if tokio::time::timeout(timeout, dispatcher).await.is_err() {
				warn!("In-flight syncs did not drain within shutdown timeout");
			}
		}

		let _ = self.shutdown_tx.send(true);
		for task in self.tasks.drain(..) {
			if tokio::time::timeout(timeout, task).await.is_err() {
				warn!("Background task did not stop within shutdown timeout");
			}
		}

		self.inner.delta.save_snapshot().await?;
		info!("Sync engine stopped");
		Ok(())
	}
}

/// Everything shared between worker tasks
struct EngineInner {
	registry: Registry,
	delta: DeltaSync,
	model: MLModel,
	errors: ErrorHandler,
	plan: RecoveryPlan,
	bridge: Box<dyn AgentBridge>,
	events: EventBus,
	identity: Identity,
	metrics: Mutex<EngineMetrics>,
	frozen: Mutex<HashSet<String>>,
	semaphore: Semaphore,
}

impl EngineInner {
	/// Full pipeline for one observed event
	async fn process_event(&self, event: FileEvent) {
		let key = event.path.display().to_string();

		if self.frozen.lock().unwrap().contains(&key) {
			debug!(path = %key, "Skipping frozen path");
			return;
		}
		if self.registry.is_excluded(&event.path) {
			return;
		}
		let (rule_index, rel) = match self.registry.rule_for(&event.path) {
			Some(found) => found,
			None => return,
		};
		if !self.registry.has_access(&event.path, &self.identity.user, &self.identity.groups) {
			let classified = self.errors.handle(
				"sync_engine",
				&format!("Access denied: '{}' may not sync {}", self.identity.user, key),
			);
			self.freeze(&key, &classified);
			return;
		}

		// Registry policy, refined by the model when it is confident enough
		let mut strategy = self.registry.sync_strategy_for(&event.path);
		let mut priority = self.registry.priority_for(&event.path);
		let ml = self.registry.ml_config();
		if ml.enabled {
			self.model.record_event(&event.path);
			let prediction = self.model.predict_sync_behavior(&event.path);
			if prediction.probability >= ml.thresholds.confidence {
				strategy = prediction.mode;
				priority = prediction.priority;
			}
		}

		let prior = self.delta.state_of(&key);
		if !self.delta.handle_file_event(&event) {
			return;
		}

		let hints = self.bridge.get_hints(&event.path).await;
		if !hints.is_empty() {
			debug!(path = %key, hints = hints.len(), "Agent hints received (advisory)");
		}

		let defer = match strategy {
			SyncStrategy::Realtime => false,
			SyncStrategy::Batch => true,
			SyncStrategy::Adaptive => priority < ADAPTIVE_REALTIME_PRIORITY,
		};
		if defer {
			let window = self.registry.advanced_config().batch_interval_ms;
			tokio::time::sleep(Duration::from_millis(window)).await;
		}

		let permit = match self.semaphore.acquire().await {
			Ok(permit) => permit,
			Err(_) => return,
		};
		let started = Instant::now();
		let prior_hash = prior.as_ref().map(|s| s.hash.as_str());
		let result = self.execute_sync(&event, rule_index, &rel, prior_hash).await;
		drop(permit);

		match result {
			Ok(()) => {
				self.delta.confirm_sync(&key);
				let duration_ms = started.elapsed().as_millis() as u64;
				self.metrics.lock().unwrap().syncs.push(SyncRecord {
					path: key.clone(),
					strategy,
					priority,
					duration_ms,
					timestamp: now_millis(),
				});
				self.events.emit(EngineEvent::SyncComplete {
					path: key,
					strategy: strategy.to_string(),
					duration_ms,
				});
			}
			Err(error) => self.handle_sync_failure(&event, rule_index, &rel, error).await,
		}
	}

	/// Propagate one change to the destination
	async fn execute_sync(
		&self,
		event: &FileEvent,
		rule_index: usize,
		rel: &Path,
		prior_hash: Option<&str>,
	) -> Result<(), SyncError> {
		let rule = &self.registry.path_rules()[rule_index];
		let dest = rule.destination.join(rel);

		match event.kind {
			FileEventKind::Unlink => match tokio::fs::remove_file(&dest).await {
				Ok(()) => Ok(()),
				Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
				Err(e) => Err(SyncError::Io(e)),
			},
			FileEventKind::Add | FileEventKind::Change => {
				let src_hash = event.hash.clone().unwrap_or_default();
				if dest.exists() {
					let dest_hash = hash_file(&dest).await?;
					if dest_hash == src_hash {
						return Ok(());
					}
					// Destination diverged from the last confirmed state:
					// both replicas changed independently
					let fast_forward = prior_hash.map(|h| h == dest_hash).unwrap_or(false);
					if !fast_forward {
						return self.resolve_conflict(event, &dest, &dest_hash).await;
					}
				}
				copy_file(&event.path, &dest).await
			}
		}
	}

	/// Decide and apply a conflict winner; the winner's content
	/// propagates to the losing side so both replicas converge
	async fn resolve_conflict(
		&self,
		event: &FileEvent,
		dest: &Path,
		dest_hash: &str,
	) -> Result<(), SyncError> {
		let key = event.path.display().to_string();
		let source_wins = match self.registry.conflict_resolution() {
			ConflictResolution::PreferSource => true,
			ConflictResolution::PreferDestination => false,
			ConflictResolution::PreferNewest => {
				modified_time(&event.path).await >= modified_time(dest).await
			}
			ConflictResolution::MlDriven => {
				self.model.predict_sync_behavior(&event.path).probability >= 0.5
			}
		};

		let winner = if source_wins { "source" } else { "destination" };
		info!(path = %key, winner = winner, "Both replicas changed, resolving conflict");

		if source_wins {
			copy_file(&event.path, dest).await
		} else {
			copy_file(dest, &event.path).await?;
			// Track the winning content so the next change event against
			// it is a no-op
			self.delta.handle_file_event(&FileEvent {
				kind: FileEventKind::Change,
				path: event.path.clone(),
				hash: Some(dest_hash.to_string()),
				timestamp: now_millis(),
			});
			Ok(())
		}
	}

	/// Classification, recovery and freezing for one failed sync
	async fn handle_sync_failure(
		&self,
		event: &FileEvent,
		rule_index: usize,
		rel: &Path,
		error: SyncError,
	) {
		let key = event.path.display().to_string();
		let classified = self.errors.handle("sync_engine", &error.to_string());

		if classified.classification.requires_human_intervention
			|| !classified.classification.recoverable
		{
			self.model.update_from_failure(FailureSample {
				path: key.clone(),
				error: classified.message.clone(),
				recovery: None,
			});
			self.freeze(&key, &classified);
			return;
		}

		let record = self.run_recovery(event, rule_index, rel, &classified).await;
		let recovered = record.recovered;
		self.metrics.lock().unwrap().recoveries.push(record);

		self.model.update_from_failure(FailureSample {
			path: key.clone(),
			error: classified.message.clone(),
			recovery: if recovered { Some("plan".to_string()) } else { None },
		});

		if recovered {
			self.delta.confirm_sync(&key);
			self.events.emit(EngineEvent::SyncComplete {
				path: key,
				strategy: "recovery".to_string(),
				duration_ms: 0,
			});
		} else {
			self.freeze(&key, &classified);
		}
	}

	/// Execute the recovery plan phase by phase
	///
	/// A phase advances only when its actions report success or an
	/// acceptable degradation; the first hard failure aborts the plan.
	async fn run_recovery(
		&self,
		event: &FileEvent,
		rule_index: usize,
		rel: &Path,
		classified: &ClassifiedError,
	) -> RecoveryRecord {
		let key = event.path.display().to_string();
		let mut phases = Vec::new();
		let mut recovered = false;
		let mut aborted = false;

		'plan: for phase in &self.plan.phases {
			for action in &phase.actions {
				match self.execute_action(*action, event, rule_index, rel).await {
					ActionOutcome::Success(detail) | ActionOutcome::Degraded(detail) => {
						phases.push(PhaseOutcome {
							phase_id: phase.id.clone(),
							succeeded: true,
							detail,
						});
					}
					ActionOutcome::Repaired => {
						phases.push(PhaseOutcome {
							phase_id: phase.id.clone(),
							succeeded: true,
							detail: format!("{} re-attempt succeeded", action),
						});
						recovered = true;
						break 'plan;
					}
					ActionOutcome::Failed(detail) => {
						phases.push(PhaseOutcome {
							phase_id: phase.id.clone(),
							succeeded: false,
							detail,
						});
						aborted = true;
						break 'plan;
					}
				}
			}
		}

		// Every check passed but no action re-attempted the operation
		if !recovered && !aborted {
			recovered = self.execute_sync(event, rule_index, rel, None).await.is_ok();
		}

		RecoveryRecord {
			path: key,
			error_id: classified.id.clone(),
			phases,
			recovered,
			timestamp: now_millis(),
		}
	}

	async fn execute_action(
		&self,
		action: RecoveryAction,
		event: &FileEvent,
		rule_index: usize,
		rel: &Path,
	) -> ActionOutcome {
		let rule = &self.registry.path_rules()[rule_index];
		let dest = rule.destination.join(rel);

		match action {
			RecoveryAction::FsCheck => {
				if event.kind == FileEventKind::Unlink || event.path.exists() {
					ActionOutcome::Success("source present".to_string())
				} else {
					ActionOutcome::Failed(format!("source missing: {}", event.path.display()))
				}
			}
			RecoveryAction::LinkCheck => match dest.parent() {
				Some(parent) if parent.exists() => {
					ActionOutcome::Success("destination reachable".to_string())
				}
				Some(parent) => match tokio::fs::create_dir_all(parent).await {
					Ok(()) => ActionOutcome::Degraded(format!(
						"created missing destination directory {}",
						parent.display()
					)),
					Err(e) => {
						ActionOutcome::Failed(format!("cannot create destination directory: {}", e))
					}
				},
				None => ActionOutcome::Failed("destination has no parent".to_string()),
			},
			RecoveryAction::IntelligentRepair => {
				let recovery = self.model.predict_recovery_strategy(&event.path);
				debug!(
					path = %event.path.display(),
					suggested = ?recovery.actions,
					confidence = recovery.confidence,
					"Model-guided repair"
				);
				let attempts = self.registry.advanced_config().retry_attempts.max(1);
				let mut last_error = String::new();
				for _ in 0..attempts {
					match self.execute_sync(event, rule_index, rel, None).await {
						Ok(()) => return ActionOutcome::Repaired,
						Err(e) => last_error = e.to_string(),
					}
				}
				ActionOutcome::Failed(last_error)
			}
			RecoveryAction::Resync => {
				if event.kind == FileEventKind::Unlink {
					return match self.execute_sync(event, rule_index, rel, None).await {
						Ok(()) => ActionOutcome::Repaired,
						Err(e) => ActionOutcome::Failed(e.to_string()),
					};
				}
				match hash_file(&event.path).await {
					Ok(hash) => {
						let refreshed = FileEvent {
							kind: FileEventKind::Change,
							path: event.path.clone(),
							hash: Some(hash),
							timestamp: now_millis(),
						};
						self.delta.handle_file_event(&refreshed);
						match self.execute_sync(&refreshed, rule_index, rel, None).await {
							Ok(()) => ActionOutcome::Repaired,
							Err(e) => ActionOutcome::Failed(e.to_string()),
						}
					}
					Err(e) => ActionOutcome::Failed(format!("cannot re-hash source: {}", e)),
				}
			}
			RecoveryAction::SnapshotRestore => match self.delta.load_snapshot().await {
				Ok(count) => ActionOutcome::Degraded(format!(
					"state restored from snapshot ({} paths)",
					count
				)),
				Err(e) => ActionOutcome::Failed(e.to_string()),
			},
		}
	}

	fn freeze(&self, path: &str, classified: &ClassifiedError) {
		self.frozen.lock().unwrap().insert(path.to_string());
		error!(path = path, error_id = %classified.id, "Critical failure, path frozen until manually cleared");
		self.events.emit(EngineEvent::CriticalFailure {
			path: path.to_string(),
			error_id: classified.id.clone(),
			message: classified.message.clone(),
		});
	}
}

/// Route watcher events to single-writer per-path workers
async fn dispatch_loop(
	inner: Arc<EngineInner>,
	mut rx: mpsc::UnboundedReceiver<FileEvent>,
	shutdown: watch::Receiver<bool>,
) {
	let mut workers: HashMap<String, mpsc::Sender<FileEvent>> = HashMap::new();
	let mut handles = Vec::new();

	while let Some(event) = rx.recv().await {
		inner.events.emit(EngineEvent::FileChanged(event.clone()));

		let key = event.path.display().to_string();
		let sender = workers.entry(key).or_insert_with(|| {
			let (tx, worker_rx) = mpsc::channel(WORKER_QUEUE_DEPTH);
			handles.push(tokio::spawn(path_worker(
				inner.clone(),
				worker_rx,
				shutdown.clone(),
			)));
			tx
		});
		// Backpressure: a full per-path queue delays dispatch rather
		// than dropping the event
		let _ = sender.send(event).await;
	}

	// Watcher closed: let workers drain their queues and exit
	drop(workers);
	for handle in handles {
		let _ = handle.await;
	}
}

/// Process events for one path, strictly in arrival order
async fn path_worker(
	inner: Arc<EngineInner>,
	mut rx: mpsc::Receiver<FileEvent>,
	mut shutdown: watch::Receiver<bool>,
) {
	loop {
		tokio::select! {
			event = rx.recv() => match event {
				Some(event) => inner.process_event(event).await,
				None => break,
			},
			res = shutdown.changed() => {
				if res.is_err() || *shutdown.borrow() {
					break;
				}
			}
		}
	}
}

/// Persist the state map on a fixed interval
async fn snapshot_loop(inner: Arc<EngineInner>, interval_ms: u64, mut shutdown: watch::Receiver<bool>) {
	let mut interval = tokio::time::interval(Duration::from_millis(interval_ms.max(100)));
	interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
	interval.tick().await; // first tick fires immediately

	loop {
		tokio::select! {
			_ = interval.tick() => {
				if let Err(e) = inner.delta.save_snapshot().await {
					warn!(error = %e, "Periodic snapshot failed");
				}
			}
			res = shutdown.changed() => {
				if res.is_err() || *shutdown.borrow() {
					break;
				}
			}
		}
	}
}

/// Log a periodic health line when monitoring is enabled
async fn monitor_loop(inner: Arc<EngineInner>, interval_ms: u64, mut shutdown: watch::Receiver<bool>) {
	let mut interval = tokio::time::interval(Duration::from_millis(interval_ms.max(100)));
	interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
	interval.tick().await;

	loop {
		tokio::select! {
			_ = interval.tick() => {
				let (syncs, recoveries) = {
					let metrics = inner.metrics.lock().unwrap();
					(metrics.syncs.len(), metrics.recoveries.len())
				};
				let stats = inner.errors.stats();
				info!(
					syncs = syncs,
					recoveries = recoveries,
					errors = stats.total,
					pending = inner.delta.pending_syncs().len(),
					"Engine health"
				);
			}
			res = shutdown.changed() => {
				if res.is_err() || *shutdown.borrow() {
					break;
				}
			}
		}
	}
}

async fn copy_file(from: &Path, to: &Path) -> Result<(), SyncError> {
	if let Some(parent) = to.parent() {
		if !parent.exists() {
			tokio::fs::create_dir_all(parent).await?;
		}
	}
	tokio::fs::copy(from, to).await?;
	Ok(())
}

async fn modified_time(path: &Path) -> SystemTime {
	match tokio::fs::metadata(path).await {
		Ok(meta) => meta.modified().unwrap_or(UNIX_EPOCH),
		Err(_) => UNIX_EPOCH,
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::config::{PathRule, SyncRegistryConfig};

	fn test_registry(dir: &Path) -> Registry {
		let mut config = SyncRegistryConfig::default();
		config.project_id = "3f2a8c1e-5b4d-4f6a-9c7e-2d1b0a9f8e7d".to_string();
		config.state_dir = dir.join("state");
		config.paths = vec![PathRule {
			source: dir.join("src"),
			destination: dir.join("dst"),
			strategy: Some(SyncStrategy::Realtime),
			priority: 5,
			exclude_patterns: vec![],
			include_patterns: vec![],
		}];
		Registry::new(config).unwrap()
	}

	#[tokio::test]
	async fn test_builder_requires_registry() {
		let result = SyncEngine::builder().build();
		assert!(result.is_err());
	}

	#[tokio::test]
	async fn test_freeze_and_unfreeze() {
		let dir = tempfile::tempdir().unwrap();
		std::fs::create_dir_all(dir.path().join("src")).unwrap();
		let engine = SyncEngine::builder().registry(test_registry(dir.path())).build().unwrap();

		let classified = engine.errors().handle("test", "ENOSPC: full");
		engine.inner.freeze("/some/path", &classified);
		assert_eq!(engine.frozen_paths(), vec!["/some/path".to_string()]);

		assert!(engine.unfreeze("/some/path"));
		assert!(engine.frozen_paths().is_empty());
		assert!(!engine.unfreeze("/some/path"));
	}
}

// vim: ts=4
