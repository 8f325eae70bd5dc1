//! syllabus - Course, lesson and annotation repository
//!
//! Stores courses, nested lessons, annotations and free-standing notes in
//! SQLite and exposes them through a transport-agnostic request/response
//! layer.
//!
//! # Architecture
//!
//! - Deleting an owner cascades to everything it owns, dependents first
//! - The explorer tree is assembled from flat reads on every request
//! - Identifiers are either generated UUIDs or legacy string tokens
//!
//! # Modules
//!
//! - `api`: Request handlers returning status + JSON body
//! - `core`: Cascade deletion, explorer tree, error type
//! - `domain`: Data structures (Course, Lesson, Annotation, Note, EntityId)
//! - `store`: Storage trait and its SQLite implementation
//! - `cli`: Command-line interface
//!
//! # Usage
//!
//! ```bash
//! # Create a course with a nested lesson
//! syllabus course add "Math"
//! syllabus lesson add <course-id> "Algebra"
//!
//! # Print the tree
//! syllabus tree
//!
//! # Remove a course and everything under it
//! syllabus course rm <course-id>
//! ```

pub mod api;
pub mod cli;
pub mod config;
pub mod core;
pub mod domain;
pub mod store;

// Re-export main types at crate root for convenience
pub use api::{ApiResponse, ContentApi};
pub use core::{CascadeEngine, CascadeReport, Explorer, ExplorerNode, NodeKind, RepoError, RepoResult};
pub use domain::{Annotation, Course, EntityId, EntityKind, Lesson, Note};
pub use store::{ContentStore, Database, DbLocation, SqliteStore};
