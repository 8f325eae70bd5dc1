//! Content store: CRUD primitives over courses, lessons, annotations and
//! notes.
//!
//! The store performs no cross-reference validation. Referential
//! integrity on delete is the cascade engine's job (`core::cascade`).
//!
//! # Storage Layout
//!
//! ```text
//! ~/.syllabus/
//! └── content.db        # SQLite: courses, lessons, annotations, notes
//! ```

pub mod database;
pub mod schema;
pub mod sqlite;

use async_trait::async_trait;

use crate::core::error::RepoResult;
use crate::domain::{
    Annotation, AnnotationFilter, AnnotationPatch, Course, EntityId, Lesson, LessonFilter,
    LessonPatch, NewAnnotation, NewLesson, NewNote, Note, NotePatch,
};

pub use database::{Database, DbLocation};
pub use sqlite::SqliteStore;

/// Storage contract shared by every entity kind.
///
/// `list_*` results are ordered by `updated_at` descending. `update_*`
/// always refreshes `updated_at`. `get_*`, `update_*` and `delete_*`
/// return `RepoError::NotFound` when no record matches.
#[async_trait]
pub trait ContentStore: Send + Sync {
    async fn create_course(&self, title: &str) -> RepoResult<Course>;
    async fn get_course(&self, id: &EntityId) -> RepoResult<Course>;
    async fn list_courses(&self) -> RepoResult<Vec<Course>>;
    async fn rename_course(&self, id: &EntityId, title: &str) -> RepoResult<Course>;
    async fn delete_course(&self, id: &EntityId) -> RepoResult<()>;

    async fn create_lesson(&self, lesson: NewLesson) -> RepoResult<Lesson>;
    async fn get_lesson(&self, id: &EntityId) -> RepoResult<Lesson>;
    async fn list_lessons(&self, filter: &LessonFilter) -> RepoResult<Vec<Lesson>>;
    async fn update_lesson(&self, id: &EntityId, patch: LessonPatch) -> RepoResult<Lesson>;
    async fn delete_lesson(&self, id: &EntityId) -> RepoResult<()>;

    async fn create_annotation(&self, annotation: NewAnnotation) -> RepoResult<Annotation>;
    async fn get_annotation(&self, id: &EntityId) -> RepoResult<Annotation>;
    async fn list_annotations(&self, filter: &AnnotationFilter) -> RepoResult<Vec<Annotation>>;
    async fn update_annotation(
        &self,
        id: &EntityId,
        patch: AnnotationPatch,
    ) -> RepoResult<Annotation>;
    async fn delete_annotation(&self, id: &EntityId) -> RepoResult<()>;

    async fn create_note(&self, note: NewNote) -> RepoResult<Note>;
    async fn get_note(&self, id: &EntityId) -> RepoResult<Note>;
    async fn list_notes(&self) -> RepoResult<Vec<Note>>;
    async fn update_note(&self, id: &EntityId, patch: NotePatch) -> RepoResult<Note>;
    async fn delete_note(&self, id: &EntityId) -> RepoResult<()>;
}
