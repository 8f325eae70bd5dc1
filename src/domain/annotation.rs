//! Annotations: leaf content records owned by a lesson.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::id::EntityId;

/// Display name used when an annotation has neither title nor content
pub const PLACEHOLDER_NAME: &str = "annotation";

/// A leaf note attached to a lesson
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Annotation {
    pub id: EntityId,

    /// Owning lesson
    pub lesson_id: EntityId,

    /// Optional explicit title
    pub title: Option<String>,

    /// Markdown body (may be empty)
    #[serde(default)]
    pub content: String,

    pub created_at: DateTime<Utc>,

    pub updated_at: DateTime<Utc>,
}

impl Annotation {
    /// Name shown in the explorer.
    ///
    /// Falls back from the title to the first line of content, then to
    /// [`PLACEHOLDER_NAME`]. Never empty.
    pub fn display_name(&self) -> String {
        if let Some(title) = self.title.as_deref().filter(|t| !t.trim().is_empty()) {
            return title.to_string();
        }

        match self.content.lines().next().map(str::trim_end) {
            Some(first) if !first.trim().is_empty() => first.to_string(),
            _ => PLACEHOLDER_NAME.to_string(),
        }
    }
}

/// Fields for creating an annotation
#[derive(Debug, Clone)]
pub struct NewAnnotation {
    pub lesson_id: EntityId,
    pub title: Option<String>,
    pub content: String,
}

impl NewAnnotation {
    pub fn new(lesson_id: EntityId, content: impl Into<String>) -> Self {
        Self {
            lesson_id,
            title: None,
            content: content.into(),
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }
}

/// Equality filter for listing annotations
#[derive(Debug, Clone, Default)]
pub struct AnnotationFilter {
    pub lesson_id: Option<EntityId>,
}

impl AnnotationFilter {
    pub fn lesson(lesson_id: EntityId) -> Self {
        Self {
            lesson_id: Some(lesson_id),
        }
    }
}

/// Partial annotation update; only supplied fields change
#[derive(Debug, Clone, Default)]
pub struct AnnotationPatch {
    pub title: Option<String>,
    pub content: Option<String>,
}

impl AnnotationPatch {
    pub fn is_empty(&self) -> bool {
        self.title.is_none() && self.content.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn annotation(title: Option<&str>, content: &str) -> Annotation {
        let now = Utc::now();
        Annotation {
            id: EntityId::generate(),
            lesson_id: EntityId::generate(),
            title: title.map(String::from),
            content: content.to_string(),
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_display_name_prefers_title() {
        assert_eq!(annotation(Some("Quiz1"), "body").display_name(), "Quiz1");
    }

    #[test]
    fn test_display_name_falls_back_to_first_line() {
        let a = annotation(None, "# Heading\nmore text");
        assert_eq!(a.display_name(), "# Heading");

        let blank_title = annotation(Some("  "), "first\nsecond");
        assert_eq!(blank_title.display_name(), "first");
    }

    #[test]
    fn test_display_name_placeholder() {
        assert_eq!(annotation(None, "").display_name(), PLACEHOLDER_NAME);
        assert_eq!(annotation(None, "\nsecond line").display_name(), PLACEHOLDER_NAME);
    }
}
