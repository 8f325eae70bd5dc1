//! Explorer tree: nested course → lesson → annotation view assembled from
//! flat store reads.
//!
//! Lessons are placed through an arena (index per lesson, child index
//! lists) rather than linked objects, so a malformed parent graph can never
//! produce a cyclic structure. Every lesson and annotation reachable from a
//! course appears exactly once.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, warn};

use crate::domain::{AnnotationFilter, Course, EntityId, Lesson, LessonFilter};
use crate::store::ContentStore;

use super::error::RepoResult;

/// Kind of explorer node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    Course,
    Lesson,
    Annotation,
}

/// One node of the explorer tree
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExplorerNode {
    /// Display name
    pub name: String,

    pub id: String,

    #[serde(rename = "type")]
    pub kind: NodeKind,

    /// Owning course (lesson nodes only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub course_id: Option<String>,

    /// Child nodes; `None` for annotation leaves
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub children: Option<Vec<ExplorerNode>>,
}

impl ExplorerNode {
    fn leaf(name: String, id: &EntityId) -> Self {
        Self {
            name,
            id: id.to_string(),
            kind: NodeKind::Annotation,
            course_id: None,
            children: None,
        }
    }

    /// Child nodes (empty for leaves)
    pub fn children(&self) -> &[ExplorerNode] {
        self.children.as_deref().unwrap_or_default()
    }

    /// This node and every node below it, depth-first
    pub fn descendants(&self) -> Descendants<'_> {
        Descendants { stack: vec![self] }
    }

    /// Levels in this subtree; a leaf has depth 1
    pub fn depth(&self) -> usize {
        let mut deepest = 0;
        let mut stack = vec![(self, 1)];
        while let Some((node, depth)) = stack.pop() {
            deepest = deepest.max(depth);
            stack.extend(node.children().iter().map(|c| (c, depth + 1)));
        }
        deepest
    }

    /// Count nodes of `kind` in this subtree, including this node
    pub fn count(&self, kind: NodeKind) -> usize {
        self.descendants().filter(|n| n.kind == kind).count()
    }

    /// Find the first node with `name` in this subtree (depth-first)
    pub fn find(&self, name: &str) -> Option<&ExplorerNode> {
        self.descendants().find(|n| n.name == name)
    }
}

// Lesson nesting has no depth limit, so teardown must not recurse
impl Drop for ExplorerNode {
    fn drop(&mut self) {
        let mut pending = self.children.take().unwrap_or_default();
        while let Some(mut node) = pending.pop() {
            if let Some(children) = node.children.take() {
                pending.extend(children);
            }
        }
    }
}

/// Pre-order walk over an [`ExplorerNode`] subtree
pub struct Descendants<'a> {
    stack: Vec<&'a ExplorerNode>,
}

impl<'a> Iterator for Descendants<'a> {
    type Item = &'a ExplorerNode;

    fn next(&mut self) -> Option<Self::Item> {
        let node = self.stack.pop()?;
        self.stack.extend(node.children().iter().rev());
        Some(node)
    }
}

/// Builds the explorer tree from a [`ContentStore`]
pub struct Explorer<'a, S: ContentStore + ?Sized> {
    store: &'a S,
}

impl<'a, S: ContentStore + ?Sized> Explorer<'a, S> {
    pub fn new(store: &'a S) -> Self {
        Self { store }
    }

    /// Build the full tree, one root per course (most recently updated
    /// first). Any storage failure aborts the whole build.
    #[instrument(skip(self))]
    pub async fn build(&self) -> RepoResult<Vec<ExplorerNode>> {
        let courses = self.store.list_courses().await?;

        let mut tree = Vec::with_capacity(courses.len());
        for course in courses {
            tree.push(self.course_node(course).await?);
        }

        debug!(courses = tree.len(), "Explorer tree built");
        Ok(tree)
    }

    async fn course_node(&self, course: Course) -> RepoResult<ExplorerNode> {
        let course_key = course.id.to_string();
        let lessons = self
            .store
            .list_lessons(&LessonFilter::course(course.id.clone()))
            .await?;

        // Annotations become the first children of their lesson
        let mut leaves = Vec::with_capacity(lessons.len());
        for lesson in &lessons {
            let annotations = self
                .store
                .list_annotations(&AnnotationFilter::lesson(lesson.id.clone()))
                .await?;
            leaves.push(
                annotations
                    .iter()
                    .map(|a| ExplorerNode::leaf(a.display_name(), &a.id))
                    .collect::<Vec<_>>(),
            );
        }

        let children = LessonArena::new(&lessons, leaves).into_roots(&course_key);

        Ok(ExplorerNode {
            name: course.title,
            id: course_key,
            kind: NodeKind::Course,
            course_id: None,
            children: Some(children),
        })
    }
}

/// Index-based lesson graph for one course
struct LessonArena<'l> {
    lessons: &'l [Lesson],
    leaves: Vec<Vec<ExplorerNode>>,
    children: Vec<Vec<usize>>,
    roots: Vec<usize>,
}

impl<'l> LessonArena<'l> {
    fn new(lessons: &'l [Lesson], leaves: Vec<Vec<ExplorerNode>>) -> Self {
        let index: HashMap<&EntityId, usize> = lessons
            .iter()
            .enumerate()
            .map(|(i, lesson)| (&lesson.id, i))
            .collect();

        let mut children = vec![Vec::new(); lessons.len()];
        let mut roots = Vec::new();

        // Single pass in read order; unresolvable parents degrade to top level
        for (i, lesson) in lessons.iter().enumerate() {
            match lesson.parent_id.as_ref().and_then(|p| index.get(p)) {
                Some(&parent) if parent != i => children[parent].push(i),
                _ => roots.push(i),
            }
        }

        Self {
            lessons,
            leaves,
            children,
            roots,
        }
    }

    fn into_roots(mut self, course_key: &str) -> Vec<ExplorerNode> {
        let mut placed = vec![false; self.lessons.len()];
        let mut nodes = Vec::new();

        for root in std::mem::take(&mut self.roots) {
            self.assemble(root, course_key, &mut placed, &mut nodes);
        }

        // Lessons only reachable through a parent cycle are promoted
        for i in 0..self.lessons.len() {
            if !placed[i] {
                warn!(lesson = %self.lessons[i].id, "Lesson parent chain forms a cycle; placing at top level");
                self.assemble(i, course_key, &mut placed, &mut nodes);
            }
        }

        nodes
    }

    /// Build the subtree under `root` post-order with an explicit stack and
    /// push it onto `out`
    fn assemble(
        &mut self,
        root: usize,
        course_key: &str,
        placed: &mut [bool],
        out: &mut Vec<ExplorerNode>,
    ) {
        placed[root] = true;
        let mut stack = vec![self.open(root)];

        while let Some(frame) = stack.last_mut() {
            if let Some(child) = frame.pending.pop() {
                if !placed[child] {
                    placed[child] = true;
                    let next = self.open(child);
                    stack.push(next);
                }
                continue;
            }

            if let Some(done) = stack.pop() {
                let node = self.close(done, course_key);
                match stack.last_mut() {
                    Some(parent) => parent.nodes.push(node),
                    None => out.push(node),
                }
            }
        }
    }

    fn open(&mut self, i: usize) -> Frame {
        let mut pending = std::mem::take(&mut self.children[i]);
        // Popped from the back, so reverse to keep read order
        pending.reverse();

        Frame {
            index: i,
            pending,
            nodes: std::mem::take(&mut self.leaves[i]),
        }
    }

    fn close(&self, frame: Frame, course_key: &str) -> ExplorerNode {
        let lesson = &self.lessons[frame.index];
        ExplorerNode {
            name: lesson.title.clone(),
            id: lesson.id.to_string(),
            kind: NodeKind::Lesson,
            course_id: Some(course_key.to_string()),
            children: Some(frame.nodes),
        }
    }
}

/// A lesson whose children are still being assembled
struct Frame {
    index: usize,
    pending: Vec<usize>,
    nodes: Vec<ExplorerNode>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{LessonPatch, NewAnnotation, NewLesson};
    use crate::store::SqliteStore;

    #[tokio::test]
    async fn test_empty_store_builds_empty_tree() {
        let store = SqliteStore::in_memory();
        assert!(Explorer::new(&store).build().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_annotations_precede_child_lessons() {
        let store = SqliteStore::in_memory();
        let course = store.create_course("Math").await.unwrap();
        let algebra = store
            .create_lesson(NewLesson::new(course.id.clone(), "Algebra"))
            .await
            .unwrap();
        store
            .create_lesson(NewLesson::new(course.id.clone(), "Equations").with_parent(algebra.id.clone()))
            .await
            .unwrap();
        store
            .create_annotation(NewAnnotation::new(algebra.id.clone(), "Overview\nbody"))
            .await
            .unwrap();

        let tree = Explorer::new(&store).build().await.unwrap();
        let algebra_node = &tree[0].children()[0];

        let names: Vec<_> = algebra_node.children().iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["Overview", "Equations"]);
        assert_eq!(algebra_node.children()[0].kind, NodeKind::Annotation);
        assert_eq!(algebra_node.course_id.as_deref(), Some(course.id.to_string().as_str()));
    }

    #[tokio::test]
    async fn test_unresolvable_parent_is_top_level() {
        let store = SqliteStore::in_memory();
        let course = store.create_course("Math").await.unwrap();
        store
            .create_lesson(NewLesson::new(course.id.clone(), "Orphan").with_parent(EntityId::generate()))
            .await
            .unwrap();

        let tree = Explorer::new(&store).build().await.unwrap();
        assert_eq!(tree[0].children().len(), 1);
        assert_eq!(tree[0].children()[0].name, "Orphan");
    }

    #[tokio::test]
    async fn test_parent_cycle_keeps_every_lesson_once() {
        let store = SqliteStore::in_memory();
        let course = store.create_course("Loop").await.unwrap();
        let a = store
            .create_lesson(NewLesson::new(course.id.clone(), "A"))
            .await
            .unwrap();
        let b = store
            .create_lesson(NewLesson::new(course.id.clone(), "B").with_parent(a.id.clone()))
            .await
            .unwrap();
        store
            .update_lesson(
                &a.id,
                LessonPatch {
                    title: None,
                    parent_id: Some(Some(b.id.clone())),
                },
            )
            .await
            .unwrap();
        // Self-parented lesson
        let c = store
            .create_lesson(NewLesson::new(course.id.clone(), "C"))
            .await
            .unwrap();
        store
            .update_lesson(
                &c.id,
                LessonPatch {
                    title: None,
                    parent_id: Some(Some(c.id.clone())),
                },
            )
            .await
            .unwrap();

        let tree = Explorer::new(&store).build().await.unwrap();
        assert_eq!(tree[0].count(NodeKind::Lesson), 3);
        assert!(tree[0].find("A").is_some());
        assert!(tree[0].find("B").is_some());
        assert!(tree[0].find("C").is_some());
    }

    #[test]
    fn test_node_serialization_shape() {
        let node = ExplorerNode::leaf("Quiz1".to_string(), &EntityId::parse("old-1").unwrap());
        let json = serde_json::to_value(&node).unwrap();

        assert_eq!(json["type"], "annotation");
        assert_eq!(json["id"], "old-1");
        assert!(json.get("children").is_none());
        assert!(json.get("courseId").is_none());
    }
}
