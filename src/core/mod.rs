//! Core repository logic.
//!
//! This module contains:
//! - Error: the repository error taxonomy
//! - Cascade: ordered, transitive deletion of dependents
//! - Explorer: nested tree materialization for presentation

pub mod cascade;
pub mod error;
pub mod explorer;

// Re-export commonly used types
pub use cascade::{CascadeEngine, CascadeReport};
pub use error::{RepoError, RepoResult};
pub use explorer::{Explorer, ExplorerNode, NodeKind};
