//! Courses: the roots of the content hierarchy.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::id::EntityId;

/// A course groups lessons by reference (`Lesson::course_id`)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Course {
    /// Course identifier
    pub id: EntityId,

    /// Human-readable title
    pub title: String,

    /// When the course was created
    pub created_at: DateTime<Utc>,

    /// Last rename (or creation)
    pub updated_at: DateTime<Utc>,
}
