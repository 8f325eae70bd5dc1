//! Lessons and their self-referencing parent edge.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::id::EntityId;

/// A lesson belongs to one course and may nest under another lesson.
///
/// Lessons are flat records; the tree only exists once the explorer
/// assembles it from `parent_id` edges.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Lesson {
    pub id: EntityId,

    /// Owning course
    pub course_id: EntityId,

    /// Parent lesson; `None` marks a top-level lesson
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<EntityId>,

    pub title: String,

    pub created_at: DateTime<Utc>,

    pub updated_at: DateTime<Utc>,
}

impl Lesson {
    /// Whether the lesson sits directly under its course
    pub fn is_top_level(&self) -> bool {
        self.parent_id.is_none()
    }
}

/// Fields for creating a lesson
#[derive(Debug, Clone)]
pub struct NewLesson {
    pub course_id: EntityId,
    pub title: String,
    pub parent_id: Option<EntityId>,
}

impl NewLesson {
    /// Create a top-level lesson under a course
    pub fn new(course_id: EntityId, title: impl Into<String>) -> Self {
        Self {
            course_id,
            title: title.into(),
            parent_id: None,
        }
    }

    /// Nest the lesson under a parent lesson
    pub fn with_parent(mut self, parent_id: EntityId) -> Self {
        self.parent_id = Some(parent_id);
        self
    }
}

/// Equality filter for listing lessons
#[derive(Debug, Clone, Default)]
pub struct LessonFilter {
    pub course_id: Option<EntityId>,
    pub parent_id: Option<EntityId>,
}

impl LessonFilter {
    /// Lessons belonging to a course
    pub fn course(course_id: EntityId) -> Self {
        Self {
            course_id: Some(course_id),
            parent_id: None,
        }
    }

    /// Direct children of a lesson
    pub fn children_of(parent_id: EntityId) -> Self {
        Self {
            course_id: None,
            parent_id: Some(parent_id),
        }
    }
}

/// Partial lesson update; only supplied fields change
#[derive(Debug, Clone, Default)]
pub struct LessonPatch {
    pub title: Option<String>,

    /// `Some(None)` detaches the lesson to the top level
    pub parent_id: Option<Option<EntityId>>,
}

impl LessonPatch {
    /// Rename only
    pub fn title(title: impl Into<String>) -> Self {
        Self {
            title: Some(title.into()),
            parent_id: None,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.title.is_none() && self.parent_id.is_none()
    }
}
