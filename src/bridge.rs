//! External agent hint collaborator
//!
//! The engine consumes weighted hints about a path from an external
//! agent layer. Hints are advisory input only, never a control signal:
//! the engine logs them and nothing else depends on them.

use async_trait::async_trait;
use std::path::Path;

/// One weighted hint from an external agent
#[derive(Debug, Clone)]
pub struct AgentHint {
	pub agent: String,
	pub weight: f64,
}

/// Interface to the external agent layer
#[async_trait]
pub trait AgentBridge: Send + Sync {
	/// Advisory hints for a path; an empty list is a valid answer
	async fn get_hints(&self, path: &Path) -> Vec<AgentHint>;
}

/// Default bridge that has no opinions
pub struct NoopBridge;

#[async_trait]
impl AgentBridge for NoopBridge {
	async fn get_hints(&self, _path: &Path) -> Vec<AgentHint> {
		vec![]
	}
}


// vim: ts=4
