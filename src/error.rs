//! Error types for syncmesh operations

use std::error::Error;
use std::fmt;
use std::io;

/// Main error type for engine operations
#[derive(Debug)]
pub enum SyncError {
	/// Configuration error (nested)
	Config(ConfigError),

	/// Watcher error (nested)
	Watch(WatchError),

	/// State persistence error (nested)
	State(StateError),

	/// Recovery plan error (nested)
	Recovery(RecoveryError),

	/// Access denied by a security rule
	AccessDenied { path: String },

	/// Path is frozen pending human intervention
	PathFrozen { path: String },

	/// Both replicas changed and resolution failed
	Conflict { path: String, message: String },

	/// Hash verification failed
	HashMismatch { expected: String, actual: String },

	/// I/O error
	Io(io::Error),

	/// Operation aborted by shutdown
	Aborted,

	/// Generic error message
	Other { message: String },
}

impl fmt::Display for SyncError {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			SyncError::Config(e) => write!(f, "Configuration error: {}", e),
			SyncError::Watch(e) => write!(f, "Watch error: {}", e),
			SyncError::State(e) => write!(f, "State error: {}", e),
			SyncError::Recovery(e) => write!(f, "Recovery error: {}", e),
			SyncError::AccessDenied { path } => write!(f, "Access denied: {}", path),
			SyncError::PathFrozen { path } => {
				write!(f, "Path frozen pending intervention: {}", path)
			}
			SyncError::Conflict { path, message } => {
				write!(f, "Conflict on {}: {}", path, message)
			}
			SyncError::HashMismatch { expected, actual } => {
				write!(f, "Hash mismatch: expected {}, got {}", expected, actual)
			}
			SyncError::Io(e) => write!(f, "I/O error: {}", e),
			SyncError::Aborted => write!(f, "Operation aborted by shutdown"),
			SyncError::Other { message } => write!(f, "{}", message),
		}
	}
}

impl Error for SyncError {}

impl From<io::Error> for SyncError {
	fn from(e: io::Error) -> Self {
		SyncError::Io(e)
	}
}

impl From<String> for SyncError {
	fn from(e: String) -> Self {
		SyncError::Other { message: e }
	}
}

impl From<ConfigError> for SyncError {
	fn from(e: ConfigError) -> Self {
		SyncError::Config(e)
	}
}

impl From<WatchError> for SyncError {
	fn from(e: WatchError) -> Self {
		SyncError::Watch(e)
	}
}

impl From<StateError> for SyncError {
	fn from(e: StateError) -> Self {
		SyncError::State(e)
	}
}

impl From<RecoveryError> for SyncError {
	fn from(e: RecoveryError) -> Self {
		SyncError::Recovery(e)
	}
}

/// Configuration loading and validation errors
///
/// Validation is atomic: the first violation aborts the load and no
/// partially-initialized registry is ever exposed.
#[derive(Debug)]
pub enum ConfigError {
	/// Configuration document not found
	NotFound { path: String },

	/// Document failed to parse (malformed YAML, unknown enum value)
	Parse { message: String },

	/// projectId is not a valid UUID
	InvalidProjectId { value: String },

	/// Path rule priority outside the accepted range
	PriorityOutOfRange { index: usize, value: u32 },

	/// A glob pattern failed to compile
	InvalidPattern { pattern: String, message: String },

	/// A required field is missing or empty
	MissingField { field: String },

	/// A path rule is malformed
	InvalidRule { index: usize, message: String },
}

impl fmt::Display for ConfigError {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			ConfigError::NotFound { path } => {
				write!(f, "Configuration file not found: {}", path)
			}
			ConfigError::Parse { message } => {
				write!(f, "Failed to parse configuration: {}", message)
			}
			ConfigError::InvalidProjectId { value } => {
				write!(f, "projectId is not a valid UUID: {}", value)
			}
			ConfigError::PriorityOutOfRange { index, value } => {
				write!(f, "Path rule {}: priority {} out of range (1-100)", index, value)
			}
			ConfigError::InvalidPattern { pattern, message } => {
				write!(f, "Invalid glob pattern '{}': {}", pattern, message)
			}
			ConfigError::MissingField { field } => {
				write!(f, "Missing required field: {}", field)
			}
			ConfigError::InvalidRule { index, message } => {
				write!(f, "Path rule {}: {}", index, message)
			}
		}
	}
}

impl Error for ConfigError {}

/// Filesystem watcher errors
#[derive(Debug)]
pub enum WatchError {
	/// Failed to initialize the OS notification backend
	InitFailed { message: String },

	/// Failed to register a watch on a directory
	WatchFailed { path: String, message: String },

	/// Watch root is not a directory
	NotADirectory { path: String },

	/// Initial scan of a watch root failed
	ScanFailed { path: String, message: String },
}

impl fmt::Display for WatchError {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			WatchError::InitFailed { message } => {
				write!(f, "Failed to initialize watcher: {}", message)
			}
			WatchError::WatchFailed { path, message } => {
				write!(f, "Failed to watch {}: {}", path, message)
			}
			WatchError::NotADirectory { path } => {
				write!(f, "Not a directory: {}", path)
			}
			WatchError::ScanFailed { path, message } => {
				write!(f, "Failed to scan {}: {}", path, message)
			}
		}
	}
}

impl Error for WatchError {}

/// Snapshot persistence errors
#[derive(Debug)]
pub enum StateError {
	/// Failed to load a snapshot
	LoadFailed { source: Box<dyn Error + Send + Sync> },

	/// Failed to save a snapshot
	SaveFailed { source: Box<dyn Error + Send + Sync> },

	/// Snapshot file is corrupted
	Corrupted { message: String },
}

impl fmt::Display for StateError {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			StateError::LoadFailed { source } => write!(f, "Failed to load snapshot: {}", source),
			StateError::SaveFailed { source } => write!(f, "Failed to save snapshot: {}", source),
			StateError::Corrupted { message } => write!(f, "Snapshot corrupted: {}", message),
		}
	}
}

impl Error for StateError {}

/// Recovery plan errors
///
/// Unknown action identifiers are a configuration error reported at
/// plan-load time, not at execution time.
#[derive(Debug)]
pub enum RecoveryError {
	/// Plan document not found
	NotFound { path: String },

	/// Plan document failed to parse
	Parse { message: String },

	/// Unknown remediation action identifier
	UnknownAction { phase: String, action: String },

	/// Plan has no phases
	EmptyPlan,
}

impl fmt::Display for RecoveryError {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			RecoveryError::NotFound { path } => {
				write!(f, "Recovery plan not found: {}", path)
			}
			RecoveryError::Parse { message } => {
				write!(f, "Failed to parse recovery plan: {}", message)
			}
			RecoveryError::UnknownAction { phase, action } => {
				write!(f, "Unknown recovery action '{}' in phase '{}'", action, phase)
			}
			RecoveryError::EmptyPlan => write!(f, "Recovery plan has no phases"),
		}
	}
}

impl Error for RecoveryError {}

// vim: ts=4
