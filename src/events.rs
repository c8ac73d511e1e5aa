//! Typed in-process event bus
//!
//! Side-channel signals (`sync_complete`, `error_handled`,
//! `prediction_made`, ...) are delivered over a broadcast channel.
//! Delivery is in-process and at-least-once for every non-lagging
//! subscriber; nothing is persisted. A subscriber that falls behind the
//! channel capacity loses the oldest events (tokio broadcast semantics)
//! rather than blocking producers.

use crate::handler::ClassifiedError;
use crate::model::SyncPrediction;
use crate::watcher::FileEvent;
use tokio::sync::broadcast;

/// Default buffered event capacity per subscriber
const DEFAULT_CAPACITY: usize = 256;

/// Every observable signal emitted by the engine and its components
#[derive(Debug, Clone)]
pub enum EngineEvent {
	/// A filesystem change was observed
	FileChanged(FileEvent),

	/// A sync action completed successfully
	SyncComplete { path: String, strategy: String, duration_ms: u64 },

	/// A path failed unrecoverably and was frozen
	CriticalFailure { path: String, error_id: String, message: String },

	/// An error was classified and stored
	ErrorHandled(ClassifiedError),

	/// An error requires a human, independent of severity
	HumanInterventionNeeded(ClassifiedError),

	/// The error store was wiped
	ErrorsCleared { count: usize },

	/// A recoverable error was offered for retry
	RetryError(ClassifiedError),

	/// The model produced a prediction (with its feature vector)
	PredictionMade { path: String, prediction: SyncPrediction, features: Vec<f64> },

	/// The model ingested a failure sample (with its feature vector)
	FailureProcessed { path: String, features: Vec<f64> },
}

/// Cloneable handle to the broadcast bus
#[derive(Clone)]
pub struct EventBus {
	tx: broadcast::Sender<EngineEvent>,
}

impl EventBus {
	pub fn new(capacity: usize) -> Self {
		let (tx, _) = broadcast::channel(capacity);
		EventBus { tx }
	}

	/// Subscribe to all future events
	pub fn subscribe(&self) -> broadcast::Receiver<EngineEvent> {
		self.tx.subscribe()
	}

	/// Emit an event; a bus with no subscribers drops it silently
	pub fn emit(&self, event: EngineEvent) {
		let _ = self.tx.send(event);
	}
}

impl Default for EventBus {
	fn default() -> Self {
		Self::new(DEFAULT_CAPACITY)
	}
}


// vim: ts=4
