//! SQLite-backed content store.
//!
//! Identifier columns hold [`EntityId::normalized`] text, so a record
//! matches whether the caller holds a native key or its legacy string.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, SubsecRound, Utc};
use rusqlite::types::Type;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row, Statement};
use tracing::{debug, info, instrument};

use crate::core::cascade::CascadeReport;
use crate::core::error::{RepoError, RepoResult};
use crate::domain::{
    Annotation, AnnotationFilter, AnnotationPatch, Course, EntityId, EntityKind, Lesson,
    LessonFilter, LessonPatch, NewAnnotation, NewLesson, NewNote, Note, NotePatch,
};

use super::database::Database;
use super::ContentStore;

/// Lessons of a course plus every lesson nested below them
const COURSE_SUBTREE_SQL: &str = "
    WITH RECURSIVE subtree(id) AS (
        SELECT id FROM lessons WHERE course_id = ?1
        UNION
        SELECT l.id FROM lessons l JOIN subtree s ON l.parent_id = s.id
    )
    SELECT id FROM subtree";

/// A lesson plus every lesson nested below it
const LESSON_SUBTREE_SQL: &str = "
    WITH RECURSIVE subtree(id) AS (
        SELECT ?1
        UNION
        SELECT l.id FROM lessons l JOIN subtree s ON l.parent_id = s.id
    )
    SELECT id FROM subtree";

/// Content store over a shared [`Database`] handle
#[derive(Debug, Clone)]
pub struct SqliteStore {
    db: Arc<Database>,
}

impl SqliteStore {
    pub fn new(db: Database) -> Self {
        Self { db: Arc::new(db) }
    }

    /// Share an existing handle
    pub fn from_shared(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Store over a private in-memory database
    pub fn in_memory() -> Self {
        Self::new(Database::in_memory())
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    /// Delete a course and everything below it in one transaction.
    ///
    /// Unlike the default cascade, nothing is removed when the course
    /// itself does not exist.
    #[instrument(skip(self), fields(course = %id))]
    pub async fn delete_course_atomic(&self, id: &EntityId) -> RepoResult<CascadeReport> {
        let key = id.normalized();

        let report = self
            .db
            .with_conn(move |conn| {
                let tx = conn.transaction()?;
                let lessons = collect_ids(&tx, COURSE_SUBTREE_SQL, &key)?;

                let mut report = CascadeReport::default();
                for lesson in &lessons {
                    report.annotations +=
                        tx.execute("DELETE FROM annotations WHERE lesson_id = ?1", [lesson])?;
                }
                for lesson in &lessons {
                    report.lessons += tx.execute("DELETE FROM lessons WHERE id = ?1", [lesson])?;
                }

                report.courses = tx.execute("DELETE FROM courses WHERE id = ?1", [&key])?;
                if report.courses == 0 {
                    // Dropping the transaction rolls it back
                    return Ok(None);
                }

                tx.commit()?;
                Ok(Some(report))
            })
            .await?;

        let report = report.ok_or_else(|| RepoError::not_found(EntityKind::Course, id))?;
        info!(?report, "Course deleted atomically");
        Ok(report)
    }

    /// Delete a lesson, its descendant lessons and all their annotations in
    /// one transaction.
    #[instrument(skip(self), fields(lesson = %id))]
    pub async fn delete_lesson_atomic(&self, id: &EntityId) -> RepoResult<CascadeReport> {
        let key = id.normalized();

        let report = self
            .db
            .with_conn(move |conn| {
                let tx = conn.transaction()?;

                let exists = tx
                    .query_row("SELECT 1 FROM lessons WHERE id = ?1", [&key], |_| Ok(()))
                    .optional()?
                    .is_some();
                if !exists {
                    return Ok(None);
                }

                let lessons = collect_ids(&tx, LESSON_SUBTREE_SQL, &key)?;

                let mut report = CascadeReport::default();
                for lesson in &lessons {
                    report.annotations +=
                        tx.execute("DELETE FROM annotations WHERE lesson_id = ?1", [lesson])?;
                }
                for lesson in &lessons {
                    report.lessons += tx.execute("DELETE FROM lessons WHERE id = ?1", [lesson])?;
                }

                tx.commit()?;
                Ok(Some(report))
            })
            .await?;

        let report = report.ok_or_else(|| RepoError::not_found(EntityKind::Lesson, id))?;
        info!(?report, "Lesson deleted atomically");
        Ok(report)
    }

    async fn fetch<T, F>(&self, sql: &'static str, key: String, map: F) -> RepoResult<Option<T>>
    where
        T: Send + 'static,
        F: Fn(&Row<'_>) -> rusqlite::Result<T> + Send + 'static,
    {
        self.db
            .with_conn(move |conn| Ok(conn.query_row(sql, [&key], map).optional()?))
            .await
    }

    async fn fetch_all<T, F>(&self, sql: String, values: Vec<String>, map: F) -> RepoResult<Vec<T>>
    where
        T: Send + 'static,
        F: Fn(&Row<'_>) -> rusqlite::Result<T> + Send + 'static,
    {
        debug!("Executing query: {}", sql);
        self.db
            .with_conn(move |conn| {
                let mut stmt = conn.prepare(&sql)?;
                let rows = stmt
                    .query_map(params_from_iter(values.iter()), map)?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(rows)
            })
            .await
    }

    async fn update<T, F>(
        &self,
        kind: EntityKind,
        id: &EntityId,
        fields: Vec<(&'static str, Option<String>)>,
        map: F,
    ) -> RepoResult<T>
    where
        T: Send + 'static,
        F: Fn(&Row<'_>) -> rusqlite::Result<T> + Send + 'static,
    {
        let table = table_name(kind);
        let key = id.normalized();
        let stamp = encode_time(&now());

        let updated = self
            .db
            .with_conn(move |conn| {
                if !apply_update(conn, table, &key, stamp, fields)? {
                    return Ok(None);
                }
                let sql = format!("SELECT * FROM {} WHERE id = ?1", table);
                Ok(Some(conn.query_row(&sql, [&key], map)?))
            })
            .await?;

        updated.ok_or_else(|| RepoError::not_found(kind, id))
    }

    async fn delete(&self, kind: EntityKind, id: &EntityId) -> RepoResult<()> {
        let table = table_name(kind);
        let key = id.normalized();

        let removed = self
            .db
            .with_conn(move |conn| {
                let sql = format!("DELETE FROM {} WHERE id = ?1", table);
                Ok(conn.execute(&sql, [&key])?)
            })
            .await?;

        if removed == 0 {
            return Err(RepoError::not_found(kind, id));
        }

        debug!(%kind, %id, "Deleted record");
        Ok(())
    }
}

#[async_trait]
impl ContentStore for SqliteStore {
    async fn create_course(&self, title: &str) -> RepoResult<Course> {
        let now = now();
        let course = Course {
            id: EntityId::generate(),
            title: title.to_string(),
            created_at: now,
            updated_at: now,
        };

        let record = course.clone();
        self.db
            .with_conn(move |conn| {
                conn.execute(
                    "INSERT INTO courses (id, title, created_at, updated_at) VALUES (?1, ?2, ?3, ?4)",
                    params![
                        record.id.normalized(),
                        record.title,
                        encode_time(&record.created_at),
                        encode_time(&record.updated_at),
                    ],
                )?;
                Ok(())
            })
            .await?;

        debug!(id = %course.id, "Created course");
        Ok(course)
    }

    async fn get_course(&self, id: &EntityId) -> RepoResult<Course> {
        self.fetch("SELECT * FROM courses WHERE id = ?1", id.normalized(), course_from_row)
            .await?
            .ok_or_else(|| RepoError::not_found(EntityKind::Course, id))
    }

    async fn list_courses(&self) -> RepoResult<Vec<Course>> {
        self.fetch_all(
            "SELECT * FROM courses ORDER BY updated_at DESC, rowid DESC".to_string(),
            Vec::new(),
            course_from_row,
        )
        .await
    }

    async fn rename_course(&self, id: &EntityId, title: &str) -> RepoResult<Course> {
        let fields = vec![("title", Some(title.to_string()))];
        self.update(EntityKind::Course, id, fields, course_from_row).await
    }

    async fn delete_course(&self, id: &EntityId) -> RepoResult<()> {
        self.delete(EntityKind::Course, id).await
    }

    async fn create_lesson(&self, lesson: NewLesson) -> RepoResult<Lesson> {
        let now = now();
        let lesson = Lesson {
            id: EntityId::generate(),
            course_id: lesson.course_id,
            parent_id: lesson.parent_id,
            title: lesson.title,
            created_at: now,
            updated_at: now,
        };

        let record = lesson.clone();
        self.db
            .with_conn(move |conn| {
                conn.execute(
                    "INSERT INTO lessons (id, course_id, parent_id, title, created_at, updated_at) \
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                    params![
                        record.id.normalized(),
                        record.course_id.normalized(),
                        record.parent_id.as_ref().map(EntityId::normalized),
                        record.title,
                        encode_time(&record.created_at),
                        encode_time(&record.updated_at),
                    ],
                )?;
                Ok(())
            })
            .await?;

        debug!(id = %lesson.id, course = %lesson.course_id, "Created lesson");
        Ok(lesson)
    }

    async fn get_lesson(&self, id: &EntityId) -> RepoResult<Lesson> {
        self.fetch("SELECT * FROM lessons WHERE id = ?1", id.normalized(), lesson_from_row)
            .await?
            .ok_or_else(|| RepoError::not_found(EntityKind::Lesson, id))
    }

    async fn list_lessons(&self, filter: &LessonFilter) -> RepoResult<Vec<Lesson>> {
        let mut conditions = Vec::new();
        let mut values = Vec::new();

        if let Some(ref course_id) = filter.course_id {
            values.push(course_id.normalized());
            conditions.push(format!("course_id = ?{}", values.len()));
        }
        if let Some(ref parent_id) = filter.parent_id {
            values.push(parent_id.normalized());
            conditions.push(format!("parent_id = ?{}", values.len()));
        }

        let sql = select_ordered("lessons", &conditions);
        self.fetch_all(sql, values, lesson_from_row).await
    }

    async fn update_lesson(&self, id: &EntityId, patch: LessonPatch) -> RepoResult<Lesson> {
        let mut fields = Vec::new();
        if let Some(title) = patch.title {
            fields.push(("title", Some(title)));
        }
        if let Some(parent_id) = patch.parent_id {
            fields.push(("parent_id", parent_id.as_ref().map(EntityId::normalized)));
        }

        self.update(EntityKind::Lesson, id, fields, lesson_from_row).await
    }

    async fn delete_lesson(&self, id: &EntityId) -> RepoResult<()> {
        self.delete(EntityKind::Lesson, id).await
    }

    async fn create_annotation(&self, annotation: NewAnnotation) -> RepoResult<Annotation> {
        let now = now();
        let annotation = Annotation {
            id: EntityId::generate(),
            lesson_id: annotation.lesson_id,
            title: annotation.title,
            content: annotation.content,
            created_at: now,
            updated_at: now,
        };

        let record = annotation.clone();
        self.db
            .with_conn(move |conn| {
                conn.execute(
                    "INSERT INTO annotations (id, lesson_id, title, content, created_at, updated_at) \
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                    params![
                        record.id.normalized(),
                        record.lesson_id.normalized(),
                        record.title,
                        record.content,
                        encode_time(&record.created_at),
                        encode_time(&record.updated_at),
                    ],
                )?;
                Ok(())
            })
            .await?;

        debug!(id = %annotation.id, lesson = %annotation.lesson_id, "Created annotation");
        Ok(annotation)
    }

    async fn get_annotation(&self, id: &EntityId) -> RepoResult<Annotation> {
        self.fetch(
            "SELECT * FROM annotations WHERE id = ?1",
            id.normalized(),
            annotation_from_row,
        )
        .await?
        .ok_or_else(|| RepoError::not_found(EntityKind::Annotation, id))
    }

    async fn list_annotations(&self, filter: &AnnotationFilter) -> RepoResult<Vec<Annotation>> {
        let mut conditions = Vec::new();
        let mut values = Vec::new();

        if let Some(ref lesson_id) = filter.lesson_id {
            values.push(lesson_id.normalized());
            conditions.push(format!("lesson_id = ?{}", values.len()));
        }

        let sql = select_ordered("annotations", &conditions);
        self.fetch_all(sql, values, annotation_from_row).await
    }

    async fn update_annotation(
        &self,
        id: &EntityId,
        patch: AnnotationPatch,
    ) -> RepoResult<Annotation> {
        let mut fields = Vec::new();
        if let Some(title) = patch.title {
            fields.push(("title", Some(title)));
        }
        if let Some(content) = patch.content {
            fields.push(("content", Some(content)));
        }

        self.update(EntityKind::Annotation, id, fields, annotation_from_row)
            .await
    }

    async fn delete_annotation(&self, id: &EntityId) -> RepoResult<()> {
        self.delete(EntityKind::Annotation, id).await
    }

    async fn create_note(&self, note: NewNote) -> RepoResult<Note> {
        let now = now();
        let note = Note {
            id: EntityId::generate(),
            title: note.title,
            content: note.content,
            created_at: now,
            updated_at: now,
        };

        let record = note.clone();
        self.db
            .with_conn(move |conn| {
                conn.execute(
                    "INSERT INTO notes (id, title, content, created_at, updated_at) \
                     VALUES (?1, ?2, ?3, ?4, ?5)",
                    params![
                        record.id.normalized(),
                        record.title,
                        record.content,
                        encode_time(&record.created_at),
                        encode_time(&record.updated_at),
                    ],
                )?;
                Ok(())
            })
            .await?;

        Ok(note)
    }

    async fn get_note(&self, id: &EntityId) -> RepoResult<Note> {
        self.fetch("SELECT * FROM notes WHERE id = ?1", id.normalized(), note_from_row)
            .await?
            .ok_or_else(|| RepoError::not_found(EntityKind::Note, id))
    }

    async fn list_notes(&self) -> RepoResult<Vec<Note>> {
        self.fetch_all(select_ordered("notes", &[]), Vec::new(), note_from_row)
            .await
    }

    async fn update_note(&self, id: &EntityId, patch: NotePatch) -> RepoResult<Note> {
        let mut fields = Vec::new();
        if let Some(title) = patch.title {
            fields.push(("title", Some(title)));
        }
        if let Some(content) = patch.content {
            fields.push(("content", Some(content)));
        }

        self.update(EntityKind::Note, id, fields, note_from_row).await
    }

    async fn delete_note(&self, id: &EntityId) -> RepoResult<()> {
        self.delete(EntityKind::Note, id).await
    }
}

/// Current time at the precision stored in the database
fn now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(6)
}

/// Fixed-width RFC 3339 so text ordering matches time ordering
fn encode_time(time: &DateTime<Utc>) -> String {
    time.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn table_name(kind: EntityKind) -> &'static str {
    match kind {
        EntityKind::Course => "courses",
        EntityKind::Lesson => "lessons",
        EntityKind::Annotation => "annotations",
        EntityKind::Note => "notes",
    }
}

fn select_ordered(table: &str, conditions: &[String]) -> String {
    let mut sql = format!("SELECT * FROM {}", table);
    if !conditions.is_empty() {
        sql.push_str(" WHERE ");
        sql.push_str(&conditions.join(" AND "));
    }
    // Ties go to the most recently inserted row
    sql.push_str(" ORDER BY updated_at DESC, rowid DESC");
    sql
}

/// Set `updated_at` plus the supplied columns; false when no row matched
fn apply_update(
    conn: &Connection,
    table: &str,
    key: &str,
    stamp: String,
    fields: Vec<(&'static str, Option<String>)>,
) -> RepoResult<bool> {
    let mut assignments = vec!["updated_at = ?1".to_string()];
    let mut values = vec![Some(stamp)];

    for (column, value) in fields {
        values.push(value);
        assignments.push(format!("{} = ?{}", column, values.len()));
    }

    values.push(Some(key.to_string()));
    let sql = format!(
        "UPDATE {} SET {} WHERE id = ?{}",
        table,
        assignments.join(", "),
        values.len()
    );

    let changed = conn.execute(&sql, params_from_iter(values.iter()))?;
    Ok(changed > 0)
}

fn collect_ids(conn: &Connection, sql: &str, key: &str) -> RepoResult<Vec<String>> {
    let mut stmt = conn.prepare(sql)?;
    let ids = stmt
        .query_map([key], |row| row.get(0))?
        .collect::<Result<Vec<String>, _>>()?;
    Ok(ids)
}

fn id_column(row: &Row<'_>, column: &str) -> rusqlite::Result<EntityId> {
    Ok(EntityId::from_stored(row.get(column)?))
}

fn time_column(row: &Row<'_>, column: &str) -> rusqlite::Result<DateTime<Utc>> {
    let stmt: &Statement<'_> = row.as_ref();
    let index = stmt.column_index(column)?;
    let raw: String = row.get(index)?;
    DateTime::parse_from_rfc3339(&raw)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(index, Type::Text, Box::new(e)))
}

fn course_from_row(row: &Row<'_>) -> rusqlite::Result<Course> {
    Ok(Course {
        id: id_column(row, "id")?,
        title: row.get("title")?,
        created_at: time_column(row, "created_at")?,
        updated_at: time_column(row, "updated_at")?,
    })
}

fn lesson_from_row(row: &Row<'_>) -> rusqlite::Result<Lesson> {
    let parent: Option<String> = row.get("parent_id")?;
    Ok(Lesson {
        id: id_column(row, "id")?,
        course_id: id_column(row, "course_id")?,
        parent_id: parent.filter(|p| !p.is_empty()).map(EntityId::from_stored),
        title: row.get("title")?,
        created_at: time_column(row, "created_at")?,
        updated_at: time_column(row, "updated_at")?,
    })
}

fn annotation_from_row(row: &Row<'_>) -> rusqlite::Result<Annotation> {
    Ok(Annotation {
        id: id_column(row, "id")?,
        lesson_id: id_column(row, "lesson_id")?,
        title: row.get("title")?,
        content: row.get::<_, Option<String>>("content")?.unwrap_or_default(),
        created_at: time_column(row, "created_at")?,
        updated_at: time_column(row, "updated_at")?,
    })
}

fn note_from_row(row: &Row<'_>) -> rusqlite::Result<Note> {
    Ok(Note {
        id: id_column(row, "id")?,
        title: row.get("title")?,
        content: row.get("content")?,
        created_at: time_column(row, "created_at")?,
        updated_at: time_column(row, "updated_at")?,
    })
}
