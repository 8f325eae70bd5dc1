//! Domain types for the content repository.
//!
//! This module contains the records stored in the hierarchy:
//! - Course: root of the hierarchy
//! - Lesson: nests under a course and optionally under another lesson
//! - Annotation: leaf content owned by a lesson
//! - Note: free-standing record outside the hierarchy

pub mod annotation;
pub mod course;
pub mod id;
pub mod lesson;
pub mod note;

use serde::{Deserialize, Serialize};

// Re-export commonly used types
pub use annotation::{Annotation, AnnotationFilter, AnnotationPatch, NewAnnotation, PLACEHOLDER_NAME};
pub use course::Course;
pub use id::EntityId;
pub use lesson::{Lesson, LessonFilter, LessonPatch, NewLesson};
pub use note::{NewNote, Note, NotePatch};

/// Kind of stored entity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Course,
    Lesson,
    Annotation,
    Note,
}

impl std::fmt::Display for EntityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EntityKind::Course => write!(f, "course"),
            EntityKind::Lesson => write!(f, "lesson"),
            EntityKind::Annotation => write!(f, "annotation"),
            EntityKind::Note => write!(f, "note"),
        }
    }
}
