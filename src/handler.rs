//! Error classification, tracking and recovery gating
//!
//! Every error in the system is normalized here before any handling
//! decision is made: already-classified errors pass through, raw ones
//! are pattern-matched by message signature into a severity/category
//! taxonomy. Normalization never fails. Classified errors stay in the
//! store until explicitly cleared; retries are explicit and observable,
//! never a background loop.

use crate::events::{EngineEvent, EventBus};
use crate::logging::*;
use crate::util::now_millis;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Mutex;

/// Error severity
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
	Low,
	Medium,
	High,
	Critical,
}

impl fmt::Display for Severity {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Severity::Low => write!(f, "low"),
			Severity::Medium => write!(f, "medium"),
			Severity::High => write!(f, "high"),
			Severity::Critical => write!(f, "critical"),
		}
	}
}

/// Error category
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
	Filesystem,
	Network,
	Sync,
	Security,
	Unknown,
}

impl fmt::Display for Category {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Category::Filesystem => write!(f, "filesystem"),
			Category::Network => write!(f, "network"),
			Category::Sync => write!(f, "sync"),
			Category::Security => write!(f, "security"),
			Category::Unknown => write!(f, "unknown"),
		}
	}
}

/// How an error should be treated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Classification {
	pub severity: Severity,
	pub category: Category,
	pub recoverable: bool,
	pub requires_human_intervention: bool,
}

/// A normalized, stored error
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassifiedError {
	pub id: String,
	pub component: String,
	pub message: String,
	pub classification: Classification,
	pub timestamp: u64,
}

/// Aggregate view of system error health
#[derive(Debug, Clone, Default)]
pub struct ErrorStats {
	pub total: usize,
	pub by_category: BTreeMap<String, usize>,
	pub by_severity: BTreeMap<String, usize>,
	pub recoverable: usize,
	pub human_intervention: usize,
}

/// In-memory error registry with explicit, injected lifetime
pub struct ErrorHandler {
	errors: Mutex<HashMap<String, ClassifiedError>>,
	events: EventBus,
}

impl ErrorHandler {
	pub fn new(events: EventBus) -> Self {
		ErrorHandler { errors: Mutex::new(HashMap::new()), events }
	}

	/// Normalize, store and announce an error; never fails
	///
	/// Emits `error_handled` always, and `human_intervention_needed`
	/// when flagged, independent of severity.
	pub fn handle(&self, component: &str, message: &str) -> ClassifiedError {
		let classified = ClassifiedError {
			id: uuid::Uuid::new_v4().to_string(),
			component: component.to_string(),
			message: message.to_string(),
			classification: classify_message(message),
			timestamp: now_millis(),
		};
		self.store(classified)
	}

	/// Store an error that arrives already classified (pass-through)
	pub fn handle_classified(&self, classified: ClassifiedError) -> ClassifiedError {
		self.store(classified)
	}

	fn store(&self, classified: ClassifiedError) -> ClassifiedError {
		{
			let mut errors = self.errors.lock().unwrap();
			errors.insert(classified.id.clone(), classified.clone());
		}

		warn!(
			component = %classified.component,
			category = %classified.classification.category,
			severity = %classified.classification.severity,
			"Error handled: {}", classified.message
		);
		self.events.emit(EngineEvent::ErrorHandled(classified.clone()));
		if classified.classification.requires_human_intervention {
			self.events.emit(EngineEvent::HumanInterventionNeeded(classified.clone()));
		}
		classified
	}

	/// Look up a stored error by id
	pub fn get(&self, id: &str) -> Option<ClassifiedError> {
		self.errors.lock().unwrap().get(id).cloned()
	}

	/// All stored errors in a category
	pub fn by_category(&self, category: Category) -> Vec<ClassifiedError> {
		let errors = self.errors.lock().unwrap();
		errors.values().filter(|e| e.classification.category == category).cloned().collect()
	}

	/// All stored errors at a severity
	pub fn by_severity(&self, severity: Severity) -> Vec<ClassifiedError> {
		let errors = self.errors.lock().unwrap();
		errors.values().filter(|e| e.classification.severity == severity).cloned().collect()
	}

	/// Complete, queryable picture of error health
	pub fn stats(&self) -> ErrorStats {
		let errors = self.errors.lock().unwrap();
		let mut stats = ErrorStats { total: errors.len(), ..Default::default() };

		for error in errors.values() {
			*stats.by_category.entry(error.classification.category.to_string()).or_insert(0) += 1;
			*stats.by_severity.entry(error.classification.severity.to_string()).or_insert(0) += 1;
			if error.classification.recoverable {
				stats.recoverable += 1;
			}
			if error.classification.requires_human_intervention {
				stats.human_intervention += 1;
			}
		}
		stats
	}

	/// Wipe all stored errors; emits `errors_cleared`
	pub fn clear(&self) -> usize {
		let count = {
			let mut errors = self.errors.lock().unwrap();
			let count = errors.len();
			errors.clear();
			count
		};
		self.events.emit(EngineEvent::ErrorsCleared { count });
		count
	}

	/// Offer every recoverable error for retry
	///
	/// Emits one `retry_error` per recoverable error and returns them;
	/// re-executing the failed operation is the caller's responsibility.
	pub fn retry_recoverable(&self) -> Vec<ClassifiedError> {
		let recoverable: Vec<ClassifiedError> = {
			let errors = self.errors.lock().unwrap();
			errors.values().filter(|e| e.classification.recoverable).cloned().collect()
		};

		for error in &recoverable {
			self.events.emit(EngineEvent::RetryError(error.clone()));
		}
		recoverable
	}
}

/// Message-signature classification table
///
/// The order matters: the first matching signature wins. Unmatched
/// messages classify as unknown/medium and stay recoverable so they
/// remain visible in the retry surface.
pub fn classify_message(message: &str) -> Classification {
	let upper = message.to_uppercase();

	if upper.contains("ENOSPC") {
		return Classification {
			severity: Severity::Critical,
			category: Category::Filesystem,
			recoverable: false,
			requires_human_intervention: true,
		};
	}
	if upper.contains("ENOENT") || upper.contains("ENOTDIR") || upper.contains("EISDIR") {
		return Classification {
			severity: Severity::High,
			category: Category::Filesystem,
			recoverable: true,
			requires_human_intervention: false,
		};
	}
	if upper.contains("EACCES") || upper.contains("EPERM") || upper.contains("ACCESS DENIED") {
		return Classification {
			severity: Severity::High,
			category: Category::Security,
			recoverable: false,
			requires_human_intervention: true,
		};
	}
	if upper.contains("ETIMEDOUT")
		|| upper.contains("ECONNREFUSED")
		|| upper.contains("ECONNRESET")
		|| upper.contains("EPIPE")
		|| upper.contains("TIMED OUT")
	{
		return Classification {
			severity: Severity::Medium,
			category: Category::Network,
			recoverable: true,
			requires_human_intervention: false,
		};
	}
	if upper.contains("HASH MISMATCH") || upper.contains("CONFLICT") {
		return Classification {
			severity: Severity::High,
			category: Category::Sync,
			recoverable: true,
			requires_human_intervention: false,
		};
	}

	Classification {
		severity: Severity::Medium,
		category: Category::Unknown,
		recoverable: true,
		requires_human_intervention: false,
	}
}


// vim: ts=4
