//! Request/response contract for callers of the repository.
//!
//! Transport-agnostic: every operation takes already-decoded request
//! values and answers with an HTTP-style status plus a JSON body, so an
//! HTTP router (or the CLI) only has to move bytes. Error bodies have the
//! shape `{ "error": "<message>" }`.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, error};

use crate::core::{CascadeEngine, Explorer, RepoError, RepoResult};
use crate::domain::{
    AnnotationFilter, AnnotationPatch, EntityId, LessonFilter, LessonPatch, NewAnnotation,
    NewLesson, NewNote, NotePatch,
};
use crate::store::ContentStore;

/// Deepest lesson nesting accepted through the API; keeps the encoded
/// explorer tree within what JSON encoders and parsers handle
pub const MAX_LESSON_DEPTH: usize = 256;

/// Status and JSON body of a handled request
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ApiResponse {
    pub status: u16,
    pub body: Value,
}

impl ApiResponse {
    pub fn error(status: u16, message: impl Into<String>) -> Self {
        Self {
            status,
            body: json!({ "error": message.into() }),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Error message, when this is an error response
    pub fn error_message(&self) -> Option<&str> {
        self.body.get("error").and_then(Value::as_str)
    }
}

impl From<&RepoError> for ApiResponse {
    fn from(e: &RepoError) -> Self {
        ApiResponse::error(e.status_code(), e.to_string())
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateCourseRequest {
    #[serde(default)]
    pub title: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateCourseRequest {
    #[serde(default)]
    pub title: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateLessonRequest {
    #[serde(default)]
    pub course_id: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub parent_id: Option<String>,
}

/// Query parameters for listing lessons
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LessonQuery {
    #[serde(default)]
    pub course_id: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateLessonRequest {
    #[serde(default)]
    pub title: Option<String>,
    /// New parent; an empty string moves the lesson to the top level
    #[serde(default)]
    pub parent_id: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateAnnotationRequest {
    #[serde(default)]
    pub lesson_id: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
}

/// Query parameters for listing annotations
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnnotationQuery {
    #[serde(default)]
    pub lesson_id: Option<String>,
}

/// Full annotation update: title and content are both required
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReplaceAnnotationRequest {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
}

/// Partial annotation update addressed by body id
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PatchAnnotationRequest {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NoteRequest {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
}

/// Repository operations exposed to a transport
pub struct ContentApi<S> {
    store: S,
}

impl<S: ContentStore> ContentApi<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// The underlying store
    pub fn store(&self) -> &S {
        &self.store
    }

    // ------------------------------------------------------------------
    // Courses
    // ------------------------------------------------------------------

    pub async fn create_course(&self, req: CreateCourseRequest) -> ApiResponse {
        let result = async move {
            let title = required(req.title.as_deref(), "title is required")?;
            self.store.create_course(title).await
        }
        .await;
        respond(201, result)
    }

    pub async fn list_courses(&self) -> ApiResponse {
        respond(200, self.store.list_courses().await)
    }

    pub async fn update_course(&self, id: &str, req: UpdateCourseRequest) -> ApiResponse {
        let result = async move {
            let id = EntityId::parse(id)?;
            let title = required(req.title.as_deref(), "title is required")?;
            self.store.rename_course(&id, title).await
        }
        .await;
        respond(200, result)
    }

    pub async fn delete_course(&self, id: &str) -> ApiResponse {
        let result = async move {
            let id = EntityId::parse(id)?;
            CascadeEngine::new(&self.store).delete_course(&id).await
        }
        .await;
        respond(200, result.map(deleted))
    }

    // ------------------------------------------------------------------
    // Lessons
    // ------------------------------------------------------------------

    pub async fn create_lesson(&self, req: CreateLessonRequest) -> ApiResponse {
        let result = async move {
            let (course_id, title) = match (req.course_id.as_deref(), req.title.as_deref()) {
                (Some(c), Some(t)) if !c.trim().is_empty() && !t.trim().is_empty() => (c, t),
                _ => return Err(RepoError::validation("courseId and title are required")),
            };

            let mut lesson = NewLesson::new(EntityId::parse(course_id)?, title);
            lesson.parent_id = optional_id(req.parent_id.as_deref())?;
            if let Some(parent) = &lesson.parent_id {
                check_depth(self.ancestry(parent).await?.len() + 1)?;
            }
            self.store.create_lesson(lesson).await
        }
        .await;
        respond(201, result)
    }

    pub async fn list_lessons(&self, query: LessonQuery) -> ApiResponse {
        let result = async move {
            let filter = LessonFilter {
                course_id: optional_id(query.course_id.as_deref())?,
                parent_id: None,
            };
            self.store.list_lessons(&filter).await
        }
        .await;
        respond(200, result)
    }

    pub async fn update_lesson(&self, id: &str, req: UpdateLessonRequest) -> ApiResponse {
        let result = async move {
            let id = EntityId::parse(id)?;

            let mut patch = LessonPatch::default();
            if let Some(title) = req.title.as_deref() {
                patch.title = Some(required(Some(title), "title must not be empty")?.to_string());
            }
            if let Some(parent) = req.parent_id.as_deref() {
                let parent = optional_id(Some(parent))?;
                if let Some(parent) = &parent {
                    if *parent == id {
                        return Err(RepoError::validation("a lesson cannot be its own parent"));
                    }
                    let ancestors = self.ancestry(parent).await?;
                    if ancestors.contains(&id) {
                        return Err(RepoError::validation(
                            "a lesson cannot move under its own descendant",
                        ));
                    }
                    check_depth(ancestors.len() + 1 + self.subtree_height(&id).await?)?;
                }
                patch.parent_id = Some(parent);
            }
            if patch.is_empty() {
                return Err(RepoError::validation("nothing to update"));
            }

            self.store.update_lesson(&id, patch).await
        }
        .await;
        respond(200, result)
    }

    pub async fn delete_lesson(&self, id: &str) -> ApiResponse {
        let result = async move {
            let id = EntityId::parse(id)?;
            CascadeEngine::new(&self.store).delete_lesson(&id).await
        }
        .await;
        respond(200, result.map(deleted))
    }

    // ------------------------------------------------------------------
    // Annotations
    // ------------------------------------------------------------------

    pub async fn create_annotation(&self, req: CreateAnnotationRequest) -> ApiResponse {
        let result = async move {
            let lesson_id = required(req.lesson_id.as_deref(), "lessonId is required")?;
            let annotation = NewAnnotation {
                lesson_id: EntityId::parse(lesson_id)?,
                title: req.title.filter(|t| !t.trim().is_empty()),
                content: req.content.unwrap_or_default(),
            };
            self.store.create_annotation(annotation).await
        }
        .await;
        respond(201, result)
    }

    /// Fetch one annotation; a valid but unknown id answers `null`
    pub async fn get_annotation(&self, id: &str) -> ApiResponse {
        let result = async move {
            let id = EntityId::parse(id)?;
            match self.store.get_annotation(&id).await {
                Ok(annotation) => Ok(Some(annotation)),
                Err(e) if e.is_not_found() => Ok(None),
                Err(e) => Err(e),
            }
        }
        .await;
        respond(200, result)
    }

    pub async fn list_annotations(&self, query: AnnotationQuery) -> ApiResponse {
        let result = async move {
            let filter = AnnotationFilter {
                lesson_id: optional_id(query.lesson_id.as_deref())?,
            };
            self.store.list_annotations(&filter).await
        }
        .await;
        respond(200, result)
    }

    pub async fn replace_annotation(&self, id: &str, req: ReplaceAnnotationRequest) -> ApiResponse {
        let result = async move {
            let id = EntityId::parse(id)?;
            let (title, content) = match (req.title, req.content) {
                (Some(t), Some(c)) if !t.trim().is_empty() && !c.is_empty() => (t, c),
                _ => return Err(RepoError::validation("title and content are required")),
            };

            let patch = AnnotationPatch {
                title: Some(title),
                content: Some(content),
            };
            self.store.update_annotation(&id, patch).await
        }
        .await;
        respond(200, result)
    }

    pub async fn patch_annotation(&self, req: PatchAnnotationRequest) -> ApiResponse {
        let result = async move {
            let id = required(req.id.as_deref(), "id is required")?;
            let id = EntityId::parse(id)?;

            let patch = AnnotationPatch {
                title: req.title,
                content: req.content,
            };
            if patch.is_empty() {
                return Err(RepoError::validation("nothing to update"));
            }

            self.store.update_annotation(&id, patch).await
        }
        .await;
        respond(200, result)
    }

    pub async fn delete_annotation(&self, id: &str) -> ApiResponse {
        let result = async move {
            let id = EntityId::parse(id)?;
            CascadeEngine::new(&self.store).delete_annotation(&id).await
        }
        .await;
        respond(200, result.map(deleted))
    }

    // ------------------------------------------------------------------
    // Explorer
    // ------------------------------------------------------------------

    /// Nested course tree. Trees nested deeper than the API ever creates
    /// (imported data) answer 500 instead of being encoded.
    pub async fn explorer(&self) -> ApiResponse {
        let result = async move {
            let tree = Explorer::new(&self.store).build().await?;
            // Course level plus lesson levels plus the annotation leaf
            if let Some(course) = tree.iter().find(|c| c.depth() > MAX_LESSON_DEPTH + 2) {
                return Err(RepoError::Storage(format!(
                    "course {} nests lessons deeper than {} levels",
                    course.id, MAX_LESSON_DEPTH
                )));
            }
            Ok(tree)
        }
        .await;
        respond(200, result)
    }

    // ------------------------------------------------------------------
    // Notes
    // ------------------------------------------------------------------

    pub async fn create_note(&self, req: NoteRequest) -> ApiResponse {
        let result = async move {
            let (title, content) = title_and_content(req)?;
            self.store.create_note(NewNote { title, content }).await
        }
        .await;
        respond(201, result)
    }

    pub async fn list_notes(&self) -> ApiResponse {
        respond(200, self.store.list_notes().await)
    }

    pub async fn update_note(&self, id: &str, req: NoteRequest) -> ApiResponse {
        let result = async move {
            let id = EntityId::parse(id)?;
            let (title, content) = title_and_content(req)?;
            let patch = NotePatch {
                title: Some(title),
                content: Some(content),
            };
            self.store.update_note(&id, patch).await
        }
        .await;
        respond(200, result)
    }

    pub async fn delete_note(&self, id: &str) -> ApiResponse {
        let result = async move {
            let id = EntityId::parse(id)?;
            self.store.delete_note(&id).await
        }
        .await;
        respond(200, result.map(|()| json!({ "ok": true })))
    }

    // ------------------------------------------------------------------
    // Lesson graph checks
    // ------------------------------------------------------------------

    /// `lesson` followed by its ancestors, nearest first. Stops at a
    /// top-level lesson, an unresolvable parent or an existing cycle.
    async fn ancestry(&self, lesson: &EntityId) -> RepoResult<Vec<EntityId>> {
        let mut chain = Vec::new();
        let mut seen = HashSet::new();
        let mut current = Some(lesson.clone());

        while let Some(id) = current.take() {
            if !seen.insert(id.clone()) {
                break;
            }
            current = match self.store.get_lesson(&id).await {
                Ok(found) => found.parent_id,
                Err(e) if e.is_not_found() => None,
                Err(e) => return Err(e),
            };
            chain.push(id);
        }

        Ok(chain)
    }

    /// Number of lesson levels below `lesson`
    async fn subtree_height(&self, lesson: &EntityId) -> RepoResult<usize> {
        let mut seen = HashSet::from([lesson.clone()]);
        let mut level = vec![lesson.clone()];
        let mut height = 0;

        loop {
            let mut next = Vec::new();
            for id in &level {
                let children = self
                    .store
                    .list_lessons(&LessonFilter::children_of(id.clone()))
                    .await?;
                next.extend(children.into_iter().map(|c| c.id).filter(|c| seen.insert(c.clone())));
            }
            if next.is_empty() {
                return Ok(height);
            }
            height += 1;
            level = next;
        }
    }
}

/// Reject lesson chains deeper than [`MAX_LESSON_DEPTH`]
fn check_depth(depth: usize) -> RepoResult<()> {
    if depth > MAX_LESSON_DEPTH {
        return Err(RepoError::validation(format!(
            "lessons nest at most {} levels deep",
            MAX_LESSON_DEPTH
        )));
    }
    Ok(())
}

fn respond<T: Serialize>(status: u16, result: RepoResult<T>) -> ApiResponse {
    match result {
        Ok(value) => match serde_json::to_value(value) {
            Ok(body) => ApiResponse { status, body },
            Err(e) => {
                error!("Failed to encode response: {}", e);
                ApiResponse::error(500, "failed to encode response")
            }
        },
        Err(e) => {
            if e.status_code() >= 500 {
                error!("Request failed: {}", e);
            } else {
                debug!("Request rejected: {}", e);
            }
            ApiResponse::from(&e)
        }
    }
}

fn deleted<T: Serialize>(report: T) -> Value {
    json!({ "ok": true, "deleted": report })
}

/// A present, non-blank string
fn required<'a>(value: Option<&'a str>, message: &str) -> RepoResult<&'a str> {
    match value {
        Some(v) if !v.trim().is_empty() => Ok(v),
        _ => Err(RepoError::validation(message)),
    }
}

/// An optional identifier; absent and empty both mean "none"
fn optional_id(value: Option<&str>) -> RepoResult<Option<EntityId>> {
    match value {
        Some(v) if !v.is_empty() => Ok(Some(EntityId::parse(v)?)),
        _ => Ok(None),
    }
}

fn title_and_content(req: NoteRequest) -> RepoResult<(String, String)> {
    match (req.title, req.content) {
        (Some(t), Some(c)) if !t.trim().is_empty() && !c.is_empty() => Ok((t, c)),
        _ => Err(RepoError::validation("title and content are required")),
    }
}
