//! Declarative recovery plans
//!
//! A plan is an ordered list of phases, each an ordered list of named
//! remediation actions. The document is consumed verbatim; unknown
//! action identifiers fail at plan-load time, not at execution time.
//! Interpretation of the actions lives in the engine.

use crate::error::RecoveryError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::str::FromStr;

/// Closed set of remediation actions the engine knows how to execute
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecoveryAction {
	/// Verify the source file exists and is readable
	FsCheck,
	/// Verify the destination parent exists, creating it on demand
	LinkCheck,
	/// Model-guided re-attempt of the failed operation
	IntelligentRepair,
	/// Re-hash the source, force the path pending and re-attempt
	Resync,
	/// Reload the last persisted state snapshot
	SnapshotRestore,
}

impl FromStr for RecoveryAction {
	type Err = String;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s {
			"fs_check" => Ok(RecoveryAction::FsCheck),
			"link_check" => Ok(RecoveryAction::LinkCheck),
			"intelligent_repair" => Ok(RecoveryAction::IntelligentRepair),
			"resync" => Ok(RecoveryAction::Resync),
			"snapshot_restore" => Ok(RecoveryAction::SnapshotRestore),
			other => Err(other.to_string()),
		}
	}
}

impl fmt::Display for RecoveryAction {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			RecoveryAction::FsCheck => write!(f, "fs_check"),
			RecoveryAction::LinkCheck => write!(f, "link_check"),
			RecoveryAction::IntelligentRepair => write!(f, "intelligent_repair"),
			RecoveryAction::Resync => write!(f, "resync"),
			RecoveryAction::SnapshotRestore => write!(f, "snapshot_restore"),
		}
	}
}

/// One validated phase
#[derive(Debug, Clone)]
pub struct RecoveryPhase {
	pub id: String,
	pub actions: Vec<RecoveryAction>,
}

/// A validated, executable recovery plan
#[derive(Debug, Clone)]
pub struct RecoveryPlan {
	pub phases: Vec<RecoveryPhase>,
}

/// Raw document shape before validation
#[derive(Debug, Serialize, Deserialize)]
struct RawPlan {
	phases: Vec<RawPhase>,
}

#[derive(Debug, Serialize, Deserialize)]
struct RawPhase {
	id: String,
	#[serde(default)]
	actions: Vec<String>,
}

impl RecoveryPlan {
	/// Load and validate a plan document from a YAML file
	pub fn load(path: &Path) -> Result<Self, RecoveryError> {
		let contents = std::fs::read_to_string(path)
			.map_err(|_| RecoveryError::NotFound { path: path.display().to_string() })?;
		Self::from_yaml(&contents)
	}

	/// Parse and validate a YAML plan document
	pub fn from_yaml(contents: &str) -> Result<Self, RecoveryError> {
		let raw: RawPlan = serde_yaml::from_str(contents)
			.map_err(|e| RecoveryError::Parse { message: e.to_string() })?;
		Self::from_raw(raw)
	}

	fn from_raw(raw: RawPlan) -> Result<Self, RecoveryError> {
		if raw.phases.is_empty() {
			return Err(RecoveryError::EmptyPlan);
		}

		let mut phases = Vec::with_capacity(raw.phases.len());
		for phase in raw.phases {
			let mut actions = Vec::with_capacity(phase.actions.len());
			for action in &phase.actions {
				let parsed = action.parse().map_err(|_| RecoveryError::UnknownAction {
					phase: phase.id.clone(),
					action: action.clone(),
				})?;
				actions.push(parsed);
			}
			phases.push(RecoveryPhase { id: phase.id, actions });
		}

		Ok(RecoveryPlan { phases })
	}

	/// Built-in plan used when no document is supplied
	pub fn default_plan() -> Self {
		RecoveryPlan {
			phases: vec![
				RecoveryPhase {
					id: "verify".to_string(),
					actions: vec![RecoveryAction::FsCheck, RecoveryAction::LinkCheck],
				},
				RecoveryPhase {
					id: "repair".to_string(),
					actions: vec![RecoveryAction::IntelligentRepair],
				},
			],
		}
	}
}


// vim: ts=4
