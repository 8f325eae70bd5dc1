//! Explorer Tree Integration Tests
//!
//! Shape of the assembled course → lesson → annotation tree.

mod common;

use common::FaultyStore;
use syllabus::api::ContentApi;
use syllabus::core::{Explorer, ExplorerNode, NodeKind, RepoError};
use syllabus::domain::{EntityId, NewAnnotation, NewLesson, PLACEHOLDER_NAME};
use syllabus::store::{ContentStore, SqliteStore};

fn names(nodes: &[ExplorerNode]) -> Vec<&str> {
    nodes.iter().map(|n| n.name.as_str()).collect()
}

#[tokio::test]
async fn test_math_fixture_tree() {
    let store = SqliteStore::in_memory();
    let math = store.create_course("Math").await.unwrap();
    let algebra = store
        .create_lesson(NewLesson::new(math.id.clone(), "Algebra"))
        .await
        .unwrap();
    let equations = store
        .create_lesson(NewLesson::new(math.id.clone(), "Equations").with_parent(algebra.id.clone()))
        .await
        .unwrap();
    store
        .create_annotation(NewAnnotation::new(equations.id.clone(), "Solve for x").with_title("Quiz1"))
        .await
        .unwrap();

    let tree = Explorer::new(&store).build().await.unwrap();

    assert_eq!(names(&tree), vec!["Math"]);
    let math_node = &tree[0];
    assert_eq!(math_node.kind, NodeKind::Course);
    assert_eq!(names(math_node.children()), vec!["Algebra"]);

    let algebra_node = &math_node.children()[0];
    assert_eq!(names(algebra_node.children()), vec!["Equations"]);

    let equations_node = &algebra_node.children()[0];
    assert_eq!(names(equations_node.children()), vec!["Quiz1"]);

    let quiz = &equations_node.children()[0];
    assert_eq!(quiz.kind, NodeKind::Annotation);
    assert!(quiz.children.is_none());

    assert_eq!(math_node.count(NodeKind::Annotation), 1);
    assert_eq!(math_node.count(NodeKind::Lesson), 2);
}

#[tokio::test]
async fn test_untitled_empty_annotation_uses_placeholder() {
    let store = SqliteStore::in_memory();
    let course = store.create_course("Art").await.unwrap();
    let lesson = store
        .create_lesson(NewLesson::new(course.id.clone(), "Color"))
        .await
        .unwrap();
    store
        .create_annotation(NewAnnotation::new(lesson.id.clone(), ""))
        .await
        .unwrap();

    let tree = Explorer::new(&store).build().await.unwrap();
    let leaf = &tree[0].children()[0].children()[0];

    assert_eq!(leaf.name, PLACEHOLDER_NAME);
    assert!(!leaf.name.is_empty());
}

#[tokio::test]
async fn test_untitled_annotation_uses_first_content_line() {
    let store = SqliteStore::in_memory();
    let course = store.create_course("Art").await.unwrap();
    let lesson = store
        .create_lesson(NewLesson::new(course.id.clone(), "Color"))
        .await
        .unwrap();
    store
        .create_annotation(NewAnnotation::new(lesson.id.clone(), "Primary colors\nred, yellow, blue"))
        .await
        .unwrap();

    let tree = Explorer::new(&store).build().await.unwrap();
    assert!(tree[0].find("Primary colors").is_some());
}

#[tokio::test]
async fn test_courses_and_siblings_most_recent_first() {
    let store = SqliteStore::in_memory();
    let first = store.create_course("First").await.unwrap();
    store.create_course("Second").await.unwrap();

    store
        .create_lesson(NewLesson::new(first.id.clone(), "Older"))
        .await
        .unwrap();
    tokio::time::sleep(std::time::Duration::from_millis(5)).await;
    store
        .create_lesson(NewLesson::new(first.id.clone(), "Newer"))
        .await
        .unwrap();

    // Renaming touches updatedAt and moves the course to the front
    tokio::time::sleep(std::time::Duration::from_millis(5)).await;
    store.rename_course(&first.id, "First (renamed)").await.unwrap();

    let tree = Explorer::new(&store).build().await.unwrap();
    assert_eq!(names(&tree), vec!["First (renamed)", "Second"]);
    assert_eq!(names(tree[0].children()), vec!["Newer", "Older"]);
}

#[tokio::test]
async fn test_foreign_course_parent_degrades_to_top_level() {
    let store = SqliteStore::in_memory();
    let math = store.create_course("Math").await.unwrap();
    let physics = store.create_course("Physics").await.unwrap();
    let algebra = store
        .create_lesson(NewLesson::new(math.id.clone(), "Algebra"))
        .await
        .unwrap();
    store
        .create_lesson(NewLesson::new(physics.id.clone(), "Vectors").with_parent(algebra.id.clone()))
        .await
        .unwrap();

    let tree = Explorer::new(&store).build().await.unwrap();
    let physics_node = tree.iter().find(|n| n.name == "Physics").unwrap();
    let math_node = tree.iter().find(|n| n.name == "Math").unwrap();

    assert_eq!(names(physics_node.children()), vec!["Vectors"]);
    assert!(math_node.find("Vectors").is_none());
}

#[tokio::test]
async fn test_every_node_appears_once() {
    let store = SqliteStore::in_memory();
    let course = store.create_course("Big").await.unwrap();

    let mut parent: Option<EntityId> = None;
    for depth in 0..5 {
        let mut lesson = NewLesson::new(course.id.clone(), format!("L{}", depth));
        if let Some(p) = parent.take() {
            lesson = lesson.with_parent(p);
        }
        let lesson = store.create_lesson(lesson).await.unwrap();
        for n in 0..2 {
            store
                .create_annotation(NewAnnotation::new(lesson.id.clone(), format!("L{} note {}", depth, n)))
                .await
                .unwrap();
        }
        parent = Some(lesson.id);
    }

    let tree = Explorer::new(&store).build().await.unwrap();
    assert_eq!(tree[0].count(NodeKind::Lesson), 5);
    assert_eq!(tree[0].count(NodeKind::Annotation), 10);
    assert_eq!(names(tree[0].children()), vec!["L0"]);
}

#[tokio::test]
async fn test_storage_failure_aborts_whole_build() {
    let store = FaultyStore::new();
    let course = store.create_course("Math").await.unwrap();
    for title in ["Algebra", "Geometry", "Calculus"] {
        let lesson = store
            .create_lesson(NewLesson::new(course.id.clone(), title))
            .await
            .unwrap();
        store
            .create_annotation(NewAnnotation::new(lesson.id, "notes"))
            .await
            .unwrap();
    }

    // First lesson's annotations load, the second lesson's fail
    store.fail_annotation_lists_after(1);
    let result = Explorer::new(&store).build().await;
    assert!(matches!(result, Err(RepoError::Storage(_))));

    let api = ContentApi::new(store);
    api.store().fail_annotation_lists_after(1);
    let response = api.explorer().await;
    assert_eq!(response.status, 500);
    assert!(response.body.get("error").is_some());
    assert!(response.body.as_array().is_none());
}

#[tokio::test]
async fn test_very_deep_nesting_builds() {
    const DEPTH: usize = 10_000;

    let store = SqliteStore::in_memory();
    let course = store.create_course("Deep").await.unwrap();
    let course_key = course.id.to_string();

    store
        .database()
        .with_conn(move |conn| {
            let tx = conn.transaction()?;
            let stamp = "2024-01-01T00:00:00.000000Z";
            for n in 0..DEPTH {
                let parent = n.checked_sub(1).map(|p| format!("deep-{}", p));
                tx.execute(
                    "INSERT INTO lessons (id, course_id, parent_id, title, created_at, updated_at) \
                     VALUES (?1, ?2, ?3, ?1, ?4, ?4)",
                    rusqlite::params![format!("deep-{}", n), course_key, parent, stamp],
                )?;
            }
            tx.commit()?;
            Ok(())
        })
        .await
        .unwrap();

    let tree = Explorer::new(&store).build().await.unwrap();

    assert_eq!(names(tree[0].children()), vec!["deep-0"]);
    assert_eq!(tree[0].count(NodeKind::Lesson), DEPTH);

    let deepest = tree[0].find(&format!("deep-{}", DEPTH - 1)).unwrap();
    assert!(deepest.children().is_empty());
    assert_eq!(tree[0].descendants().count(), DEPTH + 1);
    assert_eq!(tree[0].depth(), DEPTH + 1);
    drop(tree);

    // Too deep to hand out as JSON: a clean error, not a crash
    let response = ContentApi::new(store).explorer().await;
    assert_eq!(response.status, 500);
}
