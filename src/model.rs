//! Lightweight online sync-behavior predictor
//!
//! Not a training framework: a frequency model over per-path and
//! per-category counters, retrained synchronously every
//! [`RETRAIN_BATCH_SIZE`] failure samples. Before `initialize()` every
//! prediction is a fixed conservative default so the engine degrades
//! gracefully without ML.
//!
//! Predictions and failure ingestion emit observability events carrying
//! the derived feature vector; those are side-channel signals, not part
//! of the return contract.

use crate::config::SyncStrategy;
use crate::events::{EngineEvent, EventBus};
use crate::logging::*;
use crate::util::now_millis;
use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::sync::Mutex;

/// Failure samples accumulated before a synchronous retrain
pub const RETRAIN_BATCH_SIZE: usize = 10;

/// Non-authoritative sync hint for one path
#[derive(Debug, Clone, PartialEq)]
pub struct SyncPrediction {
	pub mode: SyncStrategy,
	pub priority: u32,
	pub probability: f64,
}

impl SyncPrediction {
	/// Conservative default returned before the model is initialized
	pub fn conservative() -> Self {
		SyncPrediction { mode: SyncStrategy::Batch, priority: 1, probability: 0.5 }
	}
}

/// Suggested remediation for one path
#[derive(Debug, Clone)]
pub struct RecoveryPrediction {
	pub actions: Vec<String>,
	pub confidence: f64,
}

/// One ingested failure observation
#[derive(Debug, Clone)]
pub struct FailureSample {
	pub path: String,
	pub error: String,
	pub recovery: Option<String>,
}

/// Observable model internals, for operators and tests
#[derive(Debug, Clone)]
pub struct ModelState {
	pub initialized: bool,
	pub samples_processed: u64,
	pub pending_samples: usize,
	pub last_training_time: Option<u64>,
}

#[derive(Default)]
struct PathStats {
	events: u64,
	failures: u64,

	/// Rough category of the most recent failure ("io", "net", "other")
	last_failure_class: Option<&'static str>,
}

struct Inner {
	initialized: bool,
	path_stats: HashMap<String, PathStats>,

	/// Learned weight per failure class, folded in at retrain time
	class_weights: BTreeMap<&'static str, f64>,

	pending: Vec<FailureSample>,
	samples_processed: u64,
	last_training_time: Option<u64>,
}

/// Online predictor with explicit, injected lifetime
///
/// Never a process-wide singleton: construct one per engine, or one per
/// test.
pub struct MLModel {
	inner: Mutex<Inner>,
	events: EventBus,
	batch_size: usize,
}

impl MLModel {
	pub fn new(events: EventBus) -> Self {
		MLModel {
			inner: Mutex::new(Inner {
				initialized: false,
				path_stats: HashMap::new(),
				class_weights: BTreeMap::new(),
				pending: Vec::new(),
				samples_processed: 0,
				last_training_time: None,
			}),
			events,
			batch_size: RETRAIN_BATCH_SIZE,
		}
	}

	/// Enable non-default predictions
	pub fn initialize(&self) {
		let mut inner = self.inner.lock().unwrap();
		inner.initialized = true;
		info!("Prediction model initialized");
	}

	/// Record one observed event on a path, feeding the frequency features
	pub fn record_event(&self, path: &Path) {
		let key = path.display().to_string();
		let mut inner = self.inner.lock().unwrap();
		inner.path_stats.entry(key).or_default().events += 1;
	}

	/// Predict sync mode, priority and confidence for a path
	///
	/// Pure read against current model state. Uninitialized models
	/// always answer `{batch, 1, 0.5}`.
	pub fn predict_sync_behavior(&self, path: &Path) -> SyncPrediction {
		let key = path.display().to_string();
		let features = self.feature_vector(&key);

		let prediction = {
			let inner = self.inner.lock().unwrap();
			if !inner.initialized {
				SyncPrediction::conservative()
			} else {
				let score = score_features(&features);
				let mode = if score > 0.66 {
					SyncStrategy::Realtime
				} else if score > 0.33 {
					SyncStrategy::Adaptive
				} else {
					SyncStrategy::Batch
				};
				let priority = 1 + (score * 9.0).round() as u32;
				SyncPrediction { mode, priority: priority.min(10), probability: score }
			}
		};

		self.events.emit(EngineEvent::PredictionMade {
			path: key,
			prediction: prediction.clone(),
			features,
		});
		prediction
	}

	/// Predict a remediation sequence for a path
	///
	/// Derived from the class of failures previously seen on the path;
	/// paths with no failure history get a generic filesystem check with
	/// low confidence.
	pub fn predict_recovery_strategy(&self, path: &Path) -> RecoveryPrediction {
		let key = path.display().to_string();
		let inner = self.inner.lock().unwrap();

		let (class, failures) = inner
			.path_stats
			.get(&key)
			.map(|s| (s.last_failure_class, s.failures))
			.unwrap_or((None, 0));

		// No history on this path: fall back to the globally dominant
		// failure class learned at retrain time
		let class = class.or_else(|| dominant_class(&inner.class_weights));

		let actions: Vec<String> = match class {
			Some("net") => vec!["link_check".to_string(), "intelligent_repair".to_string()],
			Some("io") => vec!["fs_check".to_string(), "intelligent_repair".to_string()],
			Some(_) | None => vec!["fs_check".to_string()],
		};

		let confidence = if !inner.initialized {
			0.3
		} else {
			(0.3 + 0.1 * failures as f64).min(0.95)
		};

		RecoveryPrediction { actions, confidence }
	}

	/// Ingest one failure sample; retrains after every full batch
	///
	/// Retraining is synchronous: the call that completes a batch folds
	/// all pending samples into the model before returning.
	pub fn update_from_failure(&self, sample: FailureSample) {
		let features = self.feature_vector(&sample.path);
		let path = sample.path.clone();

		let retrained = {
			let mut inner = self.inner.lock().unwrap();
			inner.pending.push(sample);
			if inner.pending.len() >= self.batch_size {
				retrain(&mut inner);
				true
			} else {
				false
			}
		};

		if retrained {
			debug!(path = %path, "Model retrained");
		}
		self.events.emit(EngineEvent::FailureProcessed { path, features });
	}

	/// Observable snapshot of model internals
	pub fn model_state(&self) -> ModelState {
		let inner = self.inner.lock().unwrap();
		ModelState {
			initialized: inner.initialized,
			samples_processed: inner.samples_processed,
			pending_samples: inner.pending.len(),
			last_training_time: inner.last_training_time,
		}
	}

	/// Derive the feature vector for a path
	///
	/// [depth, extension class, event rate, failure rate, cpu load,
	/// memory pressure], attached to observability events for
	/// auditability.
	fn feature_vector(&self, path: &str) -> Vec<f64> {
		let depth = path.matches('/').count() as f64 / 16.0;
		let ext_class = extension_class(path);

		let (event_rate, failure_rate) = {
			let inner = self.inner.lock().unwrap();
			match inner.path_stats.get(path) {
				Some(stats) => {
					let events = stats.events as f64;
					let failures = stats.failures as f64;
					((events / (events + 10.0)).min(1.0), if events > 0.0 { (failures / events).min(1.0) } else { 0.0 })
				}
				None => (0.0, 0.0),
			}
		};

		let (cpu, mem) = system_load();

		vec![depth.min(1.0), ext_class, event_rate, failure_rate, cpu, mem]
	}
}

/// Weighted scoring over the feature vector, clamped to [0.05, 0.95]
fn score_features(features: &[f64]) -> f64 {
	// Busy paths lean realtime; failing paths and loaded systems lean batch
	let score = 0.35 + 0.25 * features[2] + 0.3 * features[1] - 0.3 * features[3]
		- 0.15 * features[4]
		- 0.05 * features[0];
	score.max(0.05).min(0.95)
}

/// Source-like files change often and deserve eager propagation
fn extension_class(path: &str) -> f64 {
	let ext = Path::new(path).extension().and_then(|e| e.to_str()).unwrap_or("");
	match ext {
		"rs" | "py" | "ts" | "js" | "go" | "c" | "h" | "cpp" | "java" => 0.9,
		"md" | "txt" | "yaml" | "yml" | "toml" | "json" => 0.7,
		"png" | "jpg" | "jpeg" | "gif" | "mp4" | "zip" | "tar" | "gz" => 0.2,
		"" => 0.5,
		_ => 0.4,
	}
}

/// CPU and memory pressure in [0, 1], from the OS
fn system_load() -> (f64, f64) {
	use sysinfo::System;

	let mut sys = System::new();
	sys.refresh_memory();
	sys.refresh_cpu_usage();

	let cpu = (sys.global_cpu_usage() as f64 / 100.0).max(0.0).min(1.0);
	let mem = if sys.total_memory() > 0 {
		(sys.used_memory() as f64 / sys.total_memory() as f64).max(0.0).min(1.0)
	} else {
		0.0
	};
	(cpu, mem)
}

fn retrain(inner: &mut Inner) {
	let pending = std::mem::take(&mut inner.pending);
	let count = pending.len() as u64;

	for sample in pending {
		let class = failure_class(&sample.error);
		let stats = inner.path_stats.entry(sample.path).or_default();
		stats.failures += 1;
		stats.last_failure_class = Some(class);

		// Successful recoveries soften the class penalty
		let delta = if sample.recovery.is_some() { 0.5 } else { 1.0 };
		*inner.class_weights.entry(class).or_insert(0.0) += delta;
	}

	inner.samples_processed += count;
	inner.last_training_time = Some(now_millis());
}

/// Failure class with the highest accumulated weight, if any
fn dominant_class(weights: &BTreeMap<&'static str, f64>) -> Option<&'static str> {
	weights
		.iter()
		.max_by(|a, b| a.1.partial_cmp(b.1).unwrap_or(std::cmp::Ordering::Equal))
		.map(|(class, _)| *class)
}

/// Coarse failure class from the error message
fn failure_class(error: &str) -> &'static str {
	let lower = error.to_lowercase();
	if lower.contains("enoent")
		|| lower.contains("enospc")
		|| lower.contains("no such file")
		|| lower.contains("i/o")
	{
		"io"
	} else if lower.contains("timed out")
		|| lower.contains("etimedout")
		|| lower.contains("connection")
		|| lower.contains("network")
	{
		"net"
	} else {
		"other"
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::path::PathBuf;

	fn sample(path: &str, error: &str) -> FailureSample {
		FailureSample { path: path.to_string(), error: error.to_string(), recovery: None }
	}

	#[test]
	fn test_uninitialized_prediction_is_exact_default() {
		let model = MLModel::new(EventBus::default());
		let prediction = model.predict_sync_behavior(&PathBuf::from("/any/path.rs"));
		assert_eq!(prediction.mode, SyncStrategy::Batch);
		assert_eq!(prediction.priority, 1);
		assert!((prediction.probability - 0.5).abs() < f64::EPSILON);
	}

	#[test]
	fn test_initialized_prediction_is_bounded() {
		let model = MLModel::new(EventBus::default());
		model.initialize();
		let prediction = model.predict_sync_behavior(&PathBuf::from("/src/main.rs"));
		assert!(prediction.probability >= 0.05 && prediction.probability <= 0.95);
		assert!(prediction.priority >= 1 && prediction.priority <= 10);
	}

	#[test]
	fn test_batch_of_ten_triggers_exactly_one_retrain() {
		let model = MLModel::new(EventBus::default());
		model.initialize();

		for i in 0..9 {
			model.update_from_failure(sample("/a", &format!("error {}", i)));
			assert_eq!(model.model_state().samples_processed, 0, "no retrain before batch");
		}

		model.update_from_failure(sample("/a", "error 9"));

		let state = model.model_state();
		assert_eq!(state.samples_processed, 10);
		assert_eq!(state.pending_samples, 0);
		assert!(state.last_training_time.is_some());
	}

	#[test]
	fn test_recovery_strategy_follows_failure_class() {
		let model = MLModel::new(EventBus::default());
		model.initialize();

		for _ in 0..10 {
			model.update_from_failure(sample("/flaky", "ETIMEDOUT: connection timed out"));
		}

		let recovery = model.predict_recovery_strategy(&PathBuf::from("/flaky"));
		assert_eq!(recovery.actions[0], "link_check");
		assert!(recovery.confidence > 0.3);
	}

	#[test]
	fn test_prediction_emits_feature_vector() {
		let bus = EventBus::default();
		let mut rx = bus.subscribe();
		let model = MLModel::new(bus);

		model.predict_sync_behavior(&PathBuf::from("/x"));

		match rx.try_recv().unwrap() {
			EngineEvent::PredictionMade { features, .. } => assert_eq!(features.len(), 6),
			other => panic!("unexpected event: {:?}", other),
		}
	}
}

// vim: ts=4
