//! Declarative sync registry configuration
//!
//! The configuration document is YAML with top-level keys `version`,
//! `projectId`, `syncStrategy`, `paths`, `security`, `monitoring`, `ml`
//! and `advanced`. Loading is atomic: schema violations (bad UUID,
//! unknown enum value, out-of-range priority, invalid glob) abort the
//! load with a single [`ConfigError`] and no partial configuration is
//! ever exposed.

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

/// Accepted priority range for path rules
pub const PRIORITY_MIN: u32 = 1;
pub const PRIORITY_MAX: u32 = 100;

/// Per-path synchronization strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SyncStrategy {
	/// Sync immediately on every detected change
	Realtime,
	#[default]
	/// Defer and process changes in batches
	Batch,
	/// Realtime for high-priority paths, batch otherwise
	Adaptive,
}

impl fmt::Display for SyncStrategy {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			SyncStrategy::Realtime => write!(f, "realtime"),
			SyncStrategy::Batch => write!(f, "batch"),
			SyncStrategy::Adaptive => write!(f, "adaptive"),
		}
	}
}

/// Policy deciding which side wins when both replicas changed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum ConflictResolution {
	#[default]
	/// The watched source copy always wins
	PreferSource,
	/// The destination copy always wins
	PreferDestination,
	/// The copy with the newest modification time wins
	PreferNewest,
	/// The model's sync probability for the path breaks the tie
	MlDriven,
}

/// One source -> destination mapping with per-path policy
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PathRule {
	/// Watched source root
	pub source: PathBuf,

	/// Destination root changes are propagated to
	pub destination: PathBuf,

	/// Strategy override for this path (document default otherwise)
	pub strategy: Option<SyncStrategy>,

	/// Relative priority, 1 (lowest) to 100
	pub priority: u32,

	/// Glob patterns excluded from sync, relative to `source`
	pub exclude_patterns: Vec<String>,

	/// If non-empty, only matching paths are synced
	pub include_patterns: Vec<String>,
}

impl Default for PathRule {
	fn default() -> Self {
		PathRule {
			source: PathBuf::new(),
			destination: PathBuf::new(),
			strategy: None,
			priority: 1,
			exclude_patterns: vec![],
			include_patterns: vec![],
		}
	}
}

/// Allow or deny
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum AccessPolicy {
	#[default]
	Allow,
	Deny,
}

/// Path-scoped access rule keyed by user or group membership
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default, rename_all = "camelCase")]
pub struct AccessRule {
	/// Path prefix this rule governs
	pub path: PathBuf,

	/// Policy applied when the rule matches
	pub policy: AccessPolicy,

	/// Users this rule applies to (empty = everyone)
	pub users: Vec<String>,

	/// Groups this rule applies to (empty = everyone)
	pub groups: Vec<String>,
}

/// Access control section
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct AccessControlConfig {
	pub enabled: bool,
	pub default_policy: AccessPolicy,
	pub rules: Vec<AccessRule>,
}

impl Default for AccessControlConfig {
	fn default() -> Self {
		AccessControlConfig { enabled: false, default_policy: AccessPolicy::Allow, rules: vec![] }
	}
}

/// Security section
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default, rename_all = "camelCase")]
pub struct SecurityConfig {
	pub access_control: AccessControlConfig,
}

/// Monitoring section
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct MonitoringConfig {
	pub enabled: bool,

	/// Reporting interval in milliseconds
	pub interval_ms: u64,

	/// Metric names to report
	pub metrics: Vec<String>,
}

impl Default for MonitoringConfig {
	fn default() -> Self {
		MonitoringConfig {
			enabled: false,
			interval_ms: 5000,
			metrics: vec!["syncs".to_string(), "errors".to_string()],
		}
	}
}

/// ML thresholds
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct MlThresholds {
	/// Minimum prediction confidence before ML overrides registry policy
	pub confidence: f64,

	/// Error rate above which predictions are treated as unreliable
	pub error_rate: f64,
}

impl Default for MlThresholds {
	fn default() -> Self {
		MlThresholds { confidence: 0.7, error_rate: 0.1 }
	}
}

/// ML section
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct MlConfig {
	pub enabled: bool,

	/// Model refresh interval in milliseconds
	pub update_interval_ms: u64,

	pub thresholds: MlThresholds,
}

impl Default for MlConfig {
	fn default() -> Self {
		MlConfig { enabled: false, update_interval_ms: 60_000, thresholds: MlThresholds::default() }
	}
}

/// Advanced engine tunables
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct AdvancedConfig {
	/// Upper bound on concurrent sync actions across paths
	pub max_concurrent_syncs: usize,

	/// Maximum deferred events per batch flush
	pub batch_size: usize,

	/// Deferral window for batch-strategy paths in milliseconds
	pub batch_interval_ms: u64,

	/// Retry attempts for a failed sync action
	pub retry_attempts: u32,

	/// Cooperative shutdown timeout in milliseconds
	pub timeout_ms: u64,

	/// Interval between automatic snapshots in milliseconds
	pub snapshot_interval_ms: u64,

	/// Watcher coalescing window in milliseconds
	pub debounce_window_ms: u64,
}

impl Default for AdvancedConfig {
	fn default() -> Self {
		AdvancedConfig {
			max_concurrent_syncs: 4,
			batch_size: 50,
			batch_interval_ms: 1000,
			retry_attempts: 3,
			timeout_ms: 30_000,
			snapshot_interval_ms: 60_000,
			debounce_window_ms: 200,
		}
	}
}

/// Top-level sync registry configuration
///
/// Immutable after load; the [`Registry`](crate::registry::Registry)
/// answers all policy queries against it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SyncRegistryConfig {
	/// Document schema version
	pub version: String,

	/// Project identifier, must be a valid UUID
	pub project_id: String,

	/// Default strategy for paths without an override
	pub sync_strategy: SyncStrategy,

	/// Conflict resolution policy
	pub conflict_resolution: ConflictResolution,

	/// Home directory for snapshots and engine state
	pub state_dir: PathBuf,

	/// Ordered source -> destination rules
	pub paths: Vec<PathRule>,

	pub security: SecurityConfig,
	pub monitoring: MonitoringConfig,
	pub ml: MlConfig,
	pub advanced: AdvancedConfig,
}

impl Default for SyncRegistryConfig {
	fn default() -> Self {
		SyncRegistryConfig {
			version: "1".to_string(),
			project_id: String::new(),
			sync_strategy: SyncStrategy::default(),
			conflict_resolution: ConflictResolution::default(),
			state_dir: std::env::var("HOME")
				.ok()
				.map(|h| PathBuf::from(h).join(".syncmesh"))
				.unwrap_or_else(|| PathBuf::from(".syncmesh")),
			paths: vec![],
			security: SecurityConfig::default(),
			monitoring: MonitoringConfig::default(),
			ml: MlConfig::default(),
			advanced: AdvancedConfig::default(),
		}
	}
}

impl SyncRegistryConfig {
	/// Load and validate a configuration document from a YAML file
	pub fn load(path: &Path) -> Result<Self, ConfigError> {
		let contents = std::fs::read_to_string(path)
			.map_err(|_| ConfigError::NotFound { path: path.display().to_string() })?;
		Self::from_yaml(&contents)
	}

	/// Parse and validate a YAML document
	pub fn from_yaml(contents: &str) -> Result<Self, ConfigError> {
		let config: SyncRegistryConfig = serde_yaml::from_str(contents)
			.map_err(|e| ConfigError::Parse { message: e.to_string() })?;
		config.validate()?;
		Ok(config)
	}

	/// Validate the full document, failing on the first violation
	pub fn validate(&self) -> Result<(), ConfigError> {
		if self.project_id.is_empty() {
			return Err(ConfigError::MissingField { field: "projectId".to_string() });
		}
		if uuid::Uuid::parse_str(&self.project_id).is_err() {
			return Err(ConfigError::InvalidProjectId { value: self.project_id.clone() });
		}

		for (index, rule) in self.paths.iter().enumerate() {
			if rule.source.as_os_str().is_empty() {
				return Err(ConfigError::InvalidRule {
					index,
					message: "source must not be empty".to_string(),
				});
			}
			if rule.destination.as_os_str().is_empty() {
				return Err(ConfigError::InvalidRule {
					index,
					message: "destination must not be empty".to_string(),
				});
			}
			if rule.priority < PRIORITY_MIN || rule.priority > PRIORITY_MAX {
				return Err(ConfigError::PriorityOutOfRange { index, value: rule.priority });
			}
			for pattern in rule.exclude_patterns.iter().chain(rule.include_patterns.iter()) {
				globset::Glob::new(pattern).map_err(|e| ConfigError::InvalidPattern {
					pattern: pattern.clone(),
					message: e.to_string(),
				})?;
			}
		}

		for rule in &self.security.access_control.rules {
			if rule.path.as_os_str().is_empty() {
				return Err(ConfigError::MissingField {
					field: "security.accessControl.rules.path".to_string(),
				});
			}
		}

		Ok(())
	}
}


// vim: ts=4
