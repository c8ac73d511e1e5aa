//! Policy source of truth
//!
//! The [`Registry`] wraps a validated [`SyncRegistryConfig`] and answers
//! pure, read-only policy queries: which rule governs a path, what
//! strategy and priority apply, whether a path is excluded, and whether
//! an identity may touch it. Glob matchers are compiled once at load so
//! every query is O(number of path rules) or better.

use crate::config::{
	AccessPolicy, AdvancedConfig, ConflictResolution, MlConfig, MonitoringConfig, PathRule,
	SyncRegistryConfig, SyncStrategy,
};
use crate::error::ConfigError;
use crate::util::absolutize;
use globset::{Glob, GlobSet, GlobSetBuilder};
use std::path::{Path, PathBuf};

/// Compiled per-rule matchers
#[derive(Debug)]
struct RuleMatcher {
	/// Absolute source root used for prefix matching
	source: PathBuf,

	exclude: GlobSet,
	include: Option<GlobSet>,
}

/// Validated, immutable policy registry
#[derive(Debug)]
pub struct Registry {
	config: SyncRegistryConfig,
	matchers: Vec<RuleMatcher>,

	/// Access rule paths, absolutized in rule order
	access_paths: Vec<PathBuf>,
}

impl Registry {
	/// Load, validate and compile a configuration document
	pub fn load(path: &Path) -> Result<Self, ConfigError> {
		Self::new(SyncRegistryConfig::load(path)?)
	}

	/// Build a registry from an already-parsed configuration
	///
	/// Validates the document and compiles all glob sets; a failure here
	/// leaves no partially-initialized registry behind.
	pub fn new(config: SyncRegistryConfig) -> Result<Self, ConfigError> {
		config.validate()?;

		let mut matchers = Vec::with_capacity(config.paths.len());
		for rule in &config.paths {
			matchers.push(RuleMatcher {
				source: absolutize(&rule.source),
				exclude: build_glob_set(&rule.exclude_patterns)?,
				include: if rule.include_patterns.is_empty() {
					None
				} else {
					Some(build_glob_set(&rule.include_patterns)?)
				},
			});
		}

		let access_paths = config
			.security
			.access_control
			.rules
			.iter()
			.map(|r| absolutize(&r.path))
			.collect();

		Ok(Registry { config, matchers, access_paths })
	}

	/// The underlying configuration document
	pub fn config(&self) -> &SyncRegistryConfig {
		&self.config
	}

	/// Project identifier
	pub fn project_id(&self) -> &str {
		&self.config.project_id
	}

	/// Find the governing rule for a path: the longest source prefix wins
	///
	/// Returns the rule index and the path relative to the rule's source.
	pub fn rule_for(&self, path: &Path) -> Option<(usize, PathBuf)> {
		let path = absolutize(path);
		let mut best: Option<(usize, usize)> = None; // (index, prefix_len)

		for (index, matcher) in self.matchers.iter().enumerate() {
			if path.starts_with(&matcher.source) {
				let len = matcher.source.components().count();
				match best {
					Some((_, best_len)) if best_len >= len => {}
					_ => best = Some((index, len)),
				}
			}
		}

		best.map(|(index, _)| {
			let rel = path
				.strip_prefix(&self.matchers[index].source)
				.map(|p| p.to_path_buf())
				.unwrap_or_default();
			(index, rel)
		})
	}

	/// The governing [`PathRule`], if any
	pub fn path_rule(&self, path: &Path) -> Option<&PathRule> {
		self.rule_for(path).map(|(index, _)| &self.config.paths[index])
	}

	/// Strategy for a path: rule override, else the document default
	pub fn sync_strategy_for(&self, path: &Path) -> SyncStrategy {
		self.path_rule(path)
			.and_then(|r| r.strategy)
			.unwrap_or(self.config.sync_strategy)
	}

	/// Priority for a path: rule value, else 1
	pub fn priority_for(&self, path: &Path) -> u32 {
		self.path_rule(path).map(|r| r.priority).unwrap_or(1)
	}

	/// Whether a path is excluded from sync
	///
	/// A path is excluded when it matches any of the governing rule's
	/// exclude patterns, or when include patterns exist and it matches
	/// none of them. Exclusions always win over inclusions.
	pub fn is_excluded(&self, path: &Path) -> bool {
		let (index, rel) = match self.rule_for(path) {
			Some(found) => found,
			None => return false,
		};
		let matcher = &self.matchers[index];

		if matcher.exclude.is_match(&rel) {
			return true;
		}
		if let Some(include) = &matcher.include {
			if !include.is_match(&rel) {
				return true;
			}
		}
		false
	}

	/// Whether an identity may sync a path
	///
	/// The first access rule whose path prefix matches and whose
	/// user/group lists apply to the identity decides; empty lists apply
	/// to everyone. Absent a match the default policy applies. Disabled
	/// access control allows everything.
	pub fn has_access(&self, path: &Path, user: &str, groups: &[String]) -> bool {
		let ac = &self.config.security.access_control;
		if !ac.enabled {
			return true;
		}

		let path = absolutize(path);
		for (rule, rule_path) in ac.rules.iter().zip(self.access_paths.iter()) {
			if !path.starts_with(rule_path) {
				continue;
			}
			let open_to_all = rule.users.is_empty() && rule.groups.is_empty();
			let user_match = rule.users.iter().any(|u| u == user);
			let group_match = rule.groups.iter().any(|g| groups.contains(g));
			if open_to_all || user_match || group_match {
				return rule.policy == AccessPolicy::Allow;
			}
		}

		ac.default_policy == AccessPolicy::Allow
	}

	/// Monitoring section accessor
	pub fn monitoring_config(&self) -> &MonitoringConfig {
		&self.config.monitoring
	}

	/// ML section accessor
	pub fn ml_config(&self) -> &MlConfig {
		&self.config.ml
	}

	/// Advanced tunables accessor
	pub fn advanced_config(&self) -> &AdvancedConfig {
		&self.config.advanced
	}

	/// Conflict resolution policy
	pub fn conflict_resolution(&self) -> ConflictResolution {
		self.config.conflict_resolution
	}

	/// All configured path rules, in document order
	pub fn path_rules(&self) -> &[PathRule] {
		&self.config.paths
	}

	/// State home directory
	pub fn state_dir(&self) -> &Path {
		&self.config.state_dir
	}
}

fn build_glob_set(patterns: &[String]) -> Result<GlobSet, ConfigError> {
	let mut builder = GlobSetBuilder::new();
	for pattern in patterns {
		let glob = Glob::new(pattern).map_err(|e| ConfigError::InvalidPattern {
			pattern: pattern.clone(),
			message: e.to_string(),
		})?;
		builder.add(glob);
	}
	builder.build().map_err(|e| ConfigError::InvalidPattern {
		pattern: patterns.join(","),
		message: e.to_string(),
	})
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::config::AccessRule;

	fn test_config() -> SyncRegistryConfig {
		let mut config = SyncRegistryConfig::default();
		config.project_id = "3f2a8c1e-5b4d-4f6a-9c7e-2d1b0a9f8e7d".to_string();
		config.sync_strategy = SyncStrategy::Batch;
		config.paths = vec![
			PathRule {
				source: PathBuf::from("/project"),
				destination: PathBuf::from("/mirror/project"),
				strategy: None,
				priority: 2,
				exclude_patterns: vec!["*.tmp".to_string()],
				include_patterns: vec![],
			},
			PathRule {
				source: PathBuf::from("/project/docs"),
				destination: PathBuf::from("/mirror/docs"),
				strategy: Some(SyncStrategy::Realtime),
				priority: 9,
				exclude_patterns: vec![],
				include_patterns: vec!["**/*.md".to_string()],
			},
		];
		config
	}

	#[test]
	fn test_longest_prefix_wins() {
		let registry = Registry::new(test_config()).unwrap();
		assert_eq!(
			registry.sync_strategy_for(Path::new("/project/docs/readme.md")),
			SyncStrategy::Realtime
		);
		assert_eq!(
			registry.sync_strategy_for(Path::new("/project/src/main.rs")),
			SyncStrategy::Batch
		);
		assert_eq!(registry.priority_for(Path::new("/project/docs/readme.md")), 9);
		assert_eq!(registry.priority_for(Path::new("/project/src/main.rs")), 2);
	}

	#[test]
	fn test_unmatched_path_gets_defaults() {
		let registry = Registry::new(test_config()).unwrap();
		assert_eq!(registry.sync_strategy_for(Path::new("/elsewhere/x")), SyncStrategy::Batch);
		assert_eq!(registry.priority_for(Path::new("/elsewhere/x")), 1);
	}

	#[test]
	fn test_exclusion_patterns() {
		let registry = Registry::new(test_config()).unwrap();
		assert!(registry.is_excluded(Path::new("/project/build/a.tmp")));
		assert!(!registry.is_excluded(Path::new("/project/src/main.rs")));
	}

	#[test]
	fn test_include_patterns_imply_exclusion() {
		let registry = Registry::new(test_config()).unwrap();
		// docs rule only includes markdown
		assert!(!registry.is_excluded(Path::new("/project/docs/guide.md")));
		assert!(registry.is_excluded(Path::new("/project/docs/raw.bin")));
	}

	#[test]
	fn test_exclude_wins_over_include() {
		let mut config = test_config();
		config.paths[1].exclude_patterns = vec!["**/secret.md".to_string()];
		let registry = Registry::new(config).unwrap();
		assert!(registry.is_excluded(Path::new("/project/docs/notes/secret.md")));
	}

	#[test]
	fn test_access_control_disabled_allows_all() {
		let registry = Registry::new(test_config()).unwrap();
		assert!(registry.has_access(Path::new("/project/x"), "nobody", &[]));
	}

	#[test]
	fn test_access_first_match_wins() {
		let mut config = test_config();
		config.security.access_control.enabled = true;
		config.security.access_control.default_policy = AccessPolicy::Deny;
		config.security.access_control.rules = vec![
			AccessRule {
				path: PathBuf::from("/project/docs"),
				policy: AccessPolicy::Deny,
				users: vec!["mallory".to_string()],
				groups: vec![],
			},
			AccessRule {
				path: PathBuf::from("/project"),
				policy: AccessPolicy::Allow,
				users: vec![],
				groups: vec!["sync-ops".to_string()],
			},
		];
		let registry = Registry::new(config).unwrap();

		let ops = vec!["sync-ops".to_string()];
		assert!(!registry.has_access(Path::new("/project/docs/a.md"), "mallory", &[]));
		assert!(registry.has_access(Path::new("/project/docs/a.md"), "alice", &ops));
		// No matching rule for this identity: default policy (deny)
		assert!(!registry.has_access(Path::new("/project/src/x"), "alice", &[]));
	}
}

// vim: ts=4
