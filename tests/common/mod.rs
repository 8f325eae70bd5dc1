//! Shared fixtures for integration tests.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use syllabus::core::{RepoError, RepoResult};
use syllabus::domain::{
    Annotation, AnnotationFilter, AnnotationPatch, Course, EntityId, Lesson, LessonFilter,
    LessonPatch, NewAnnotation, NewLesson, NewNote, Note, NotePatch,
};
use syllabus::store::{ContentStore, SqliteStore};

/// In-memory store with switchable storage failures
pub struct FaultyStore {
    pub inner: SqliteStore,

    /// Fail every `delete_course`
    pub fail_course_delete: AtomicBool,

    /// Fail the n-th (1-based) `list_annotations` call and every later one
    pub fail_annotation_list_from: AtomicUsize,

    annotation_lists: AtomicUsize,
}

#[allow(dead_code)]
impl FaultyStore {
    pub fn new() -> Self {
        Self {
            inner: SqliteStore::in_memory(),
            fail_course_delete: AtomicBool::new(false),
            fail_annotation_list_from: AtomicUsize::new(usize::MAX),
            annotation_lists: AtomicUsize::new(0),
        }
    }

    /// Start failing `list_annotations` at the n-th call from now
    pub fn fail_annotation_lists_after(&self, healthy_calls: usize) {
        let done = self.annotation_lists.load(Ordering::SeqCst);
        self.fail_annotation_list_from
            .store(done + healthy_calls + 1, Ordering::SeqCst);
    }
}

fn disk_error() -> RepoError {
    RepoError::Storage("disk I/O error".to_string())
}

#[async_trait]
impl ContentStore for FaultyStore {
    async fn create_course(&self, title: &str) -> RepoResult<Course> {
        self.inner.create_course(title).await
    }
    async fn get_course(&self, id: &EntityId) -> RepoResult<Course> {
        self.inner.get_course(id).await
    }
    async fn list_courses(&self) -> RepoResult<Vec<Course>> {
        self.inner.list_courses().await
    }
    async fn rename_course(&self, id: &EntityId, title: &str) -> RepoResult<Course> {
        self.inner.rename_course(id, title).await
    }
    async fn delete_course(&self, id: &EntityId) -> RepoResult<()> {
        if self.fail_course_delete.load(Ordering::SeqCst) {
            return Err(disk_error());
        }
        self.inner.delete_course(id).await
    }

    async fn create_lesson(&self, lesson: NewLesson) -> RepoResult<Lesson> {
        self.inner.create_lesson(lesson).await
    }
    async fn get_lesson(&self, id: &EntityId) -> RepoResult<Lesson> {
        self.inner.get_lesson(id).await
    }
    async fn list_lessons(&self, filter: &LessonFilter) -> RepoResult<Vec<Lesson>> {
        self.inner.list_lessons(filter).await
    }
    async fn update_lesson(&self, id: &EntityId, patch: LessonPatch) -> RepoResult<Lesson> {
        self.inner.update_lesson(id, patch).await
    }
    async fn delete_lesson(&self, id: &EntityId) -> RepoResult<()> {
        self.inner.delete_lesson(id).await
    }

    async fn create_annotation(&self, annotation: NewAnnotation) -> RepoResult<Annotation> {
        self.inner.create_annotation(annotation).await
    }
    async fn get_annotation(&self, id: &EntityId) -> RepoResult<Annotation> {
        self.inner.get_annotation(id).await
    }
    async fn list_annotations(&self, filter: &AnnotationFilter) -> RepoResult<Vec<Annotation>> {
        let call = self.annotation_lists.fetch_add(1, Ordering::SeqCst) + 1;
        if call >= self.fail_annotation_list_from.load(Ordering::SeqCst) {
            return Err(disk_error());
        }
        self.inner.list_annotations(filter).await
    }
    async fn update_annotation(
        &self,
        id: &EntityId,
        patch: AnnotationPatch,
    ) -> RepoResult<Annotation> {
        self.inner.update_annotation(id, patch).await
    }
    async fn delete_annotation(&self, id: &EntityId) -> RepoResult<()> {
        self.inner.delete_annotation(id).await
    }

    async fn create_note(&self, note: NewNote) -> RepoResult<Note> {
        self.inner.create_note(note).await
    }
    async fn get_note(&self, id: &EntityId) -> RepoResult<Note> {
        self.inner.get_note(id).await
    }
    async fn list_notes(&self) -> RepoResult<Vec<Note>> {
        self.inner.list_notes().await
    }
    async fn update_note(&self, id: &EntityId, patch: NotePatch) -> RepoResult<Note> {
        self.inner.update_note(id, patch).await
    }
    async fn delete_note(&self, id: &EntityId) -> RepoResult<()> {
        self.inner.delete_note(id).await
    }
}
