//! Cascade deletion across the course → lesson → annotation hierarchy.
//!
//! Dependents are deleted before their owner, owner last, so a failure part
//! way through never leaves an orphan behind. There is no rollback: a
//! storage failure is surfaced as-is and earlier deletions stay deleted.
//! `SqliteStore::delete_course_atomic` and `delete_lesson_atomic` offer a
//! transactional alternative.

use std::collections::{HashSet, VecDeque};

use serde::Serialize;
use tracing::{debug, info, instrument, warn};

use crate::domain::{AnnotationFilter, EntityId, Lesson, LessonFilter};
use crate::store::ContentStore;

use super::error::RepoResult;

/// Number of records removed by a cascade
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CascadeReport {
    pub courses: usize,
    pub lessons: usize,
    pub annotations: usize,
}

impl CascadeReport {
    /// Total records removed
    pub fn total(&self) -> usize {
        self.courses + self.lessons + self.annotations
    }
}

/// Ordered, best-effort cascade over any [`ContentStore`]
pub struct CascadeEngine<'a, S: ContentStore + ?Sized> {
    store: &'a S,
}

impl<'a, S: ContentStore + ?Sized> CascadeEngine<'a, S> {
    pub fn new(store: &'a S) -> Self {
        Self { store }
    }

    /// Delete a course, its lessons (including every nested descendant)
    /// and their annotations.
    ///
    /// Returns `NotFound` only when the course itself is missing; the
    /// dependent sweep has already run by then.
    #[instrument(skip(self), fields(course = %id))]
    pub async fn delete_course(&self, id: &EntityId) -> RepoResult<CascadeReport> {
        let mut report = CascadeReport::default();

        // Lessons of the course, plus descendants reached through parent
        // edges (a child may name a different course)
        let mut queue: VecDeque<EntityId> = self
            .store
            .list_lessons(&LessonFilter::course(id.clone()))
            .await?
            .into_iter()
            .map(|lesson| lesson.id)
            .collect();

        let mut visited = HashSet::new();
        let mut lessons = Vec::new();
        while let Some(lesson) = queue.pop_front() {
            if !visited.insert(lesson.clone()) {
                continue;
            }
            for child in self.children_of(&lesson).await? {
                if child.course_id != *id {
                    warn!(
                        lesson = %child.id,
                        owner = %child.course_id,
                        "Sweeping nested lesson that belongs to another course"
                    );
                }
                queue.push_back(child.id);
            }
            lessons.push(lesson);
        }
        debug!(lessons = lessons.len(), "Resolved course lessons");

        for lesson in &lessons {
            report.annotations += self.delete_annotations_of(lesson).await?;
        }

        for lesson in &lessons {
            if removed(self.store.delete_lesson(lesson).await)? {
                report.lessons += 1;
            }
        }

        self.store.delete_course(id).await?;
        report.courses = 1;

        info!(?report, "Course deleted");
        Ok(report)
    }

    /// Delete a lesson, every descendant lesson (transitively) and all
    /// annotations owned anywhere in that subtree.
    ///
    /// Each descendant is handled post-order: its annotations, then its own
    /// children, then the lesson itself.
    #[instrument(skip(self), fields(lesson = %id))]
    pub async fn delete_lesson(&self, id: &EntityId) -> RepoResult<CascadeReport> {
        let mut report = CascadeReport::default();

        report.annotations += self.delete_annotations_of(id).await?;

        let mut visited = HashSet::from([id.clone()]);
        let mut stack = vec![(id.clone(), self.child_ids(id).await?)];

        loop {
            let next = match stack.last_mut() {
                Some((_, pending)) => pending.pop(),
                None => break,
            };

            match next {
                Some(child) => {
                    // Parent cycles are not prevented by the store
                    if !visited.insert(child.clone()) {
                        continue;
                    }
                    report.annotations += self.delete_annotations_of(&child).await?;
                    let grandchildren = self.child_ids(&child).await?;
                    stack.push((child, grandchildren));
                }
                None => {
                    if let Some((lesson, _)) = stack.pop() {
                        if lesson != *id && removed(self.store.delete_lesson(&lesson).await)? {
                            report.lessons += 1;
                        }
                    }
                }
            }
        }

        self.store.delete_lesson(id).await?;
        report.lessons += 1;

        info!(?report, "Lesson deleted");
        Ok(report)
    }

    /// Delete a single annotation. Annotations own nothing.
    #[instrument(skip(self), fields(annotation = %id))]
    pub async fn delete_annotation(&self, id: &EntityId) -> RepoResult<CascadeReport> {
        self.store.delete_annotation(id).await?;
        Ok(CascadeReport {
            annotations: 1,
            ..Default::default()
        })
    }

    async fn children_of(&self, lesson: &EntityId) -> RepoResult<Vec<Lesson>> {
        self.store
            .list_lessons(&LessonFilter::children_of(lesson.clone()))
            .await
    }

    async fn child_ids(&self, lesson: &EntityId) -> RepoResult<Vec<EntityId>> {
        let mut children: Vec<EntityId> = self
            .children_of(lesson)
            .await?
            .into_iter()
            .map(|child| child.id)
            .collect();
        // Popped from the back, so reverse to visit in listing order
        children.reverse();
        Ok(children)
    }

    async fn delete_annotations_of(&self, lesson: &EntityId) -> RepoResult<usize> {
        let annotations = self
            .store
            .list_annotations(&AnnotationFilter::lesson(lesson.clone()))
            .await?;

        let mut count = 0;
        for annotation in &annotations {
            if removed(self.store.delete_annotation(&annotation.id).await)? {
                count += 1;
            }
        }
        Ok(count)
    }
}

/// A dependent that vanished between listing and deleting counts as gone
fn removed(result: RepoResult<()>) -> RepoResult<bool> {
    match result {
        Ok(()) => Ok(true),
        Err(e) if e.is_not_found() => {
            debug!("Dependent already removed: {}", e);
            Ok(false)
        }
        Err(e) => Err(e),
    }
}
