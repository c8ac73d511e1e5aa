//! # SyncMesh - Multi-Path File Synchronization Engine
//!
//! SyncMesh keeps directories consistent across linked projects using
//! content-hash change detection, per-path policy (realtime, batch or
//! adaptive), model-assisted conflict resolution and structured error
//! recovery.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use syncmesh::engine::SyncEngine;
//! use syncmesh::registry::Registry;
//! use std::path::Path;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let registry = Registry::load(Path::new("syncmesh.yaml"))?;
//!     let mut engine = SyncEngine::builder().registry(registry).build()?;
//!     engine.initialize().await?;
//!     // ... engine now reacts to filesystem changes ...
//!     engine.shutdown().await?;
//!     Ok(())
//! }
//! ```

pub mod bridge;
pub mod config;
pub mod delta;
pub mod engine;
pub mod error;
pub mod events;
pub mod handler;
pub mod logging;
pub mod model;
pub mod recovery;
pub mod registry;
pub mod util;
pub mod watcher;

// Re-export commonly used types and functions
pub use config::{SyncRegistryConfig, SyncStrategy};
pub use engine::SyncEngine;
pub use error::{ConfigError, RecoveryError, StateError, SyncError, WatchError};
pub use events::{EngineEvent, EventBus};
pub use registry::Registry;

// vim: ts=4
