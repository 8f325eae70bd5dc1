//! Command-line interface for syllabus.
//!
//! Provides commands for managing courses, lessons, annotations and notes,
//! and for printing the explorer tree. Every command goes through
//! [`ContentApi`], so the CLI sees the same validation and status codes as
//! any other transport.

use std::io::{self, IsTerminal, Read};
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde_json::{json, Value};

use crate::api::{
    AnnotationQuery, ApiResponse, ContentApi, CreateAnnotationRequest, CreateCourseRequest,
    CreateLessonRequest, LessonQuery, NoteRequest, PatchAnnotationRequest,
    ReplaceAnnotationRequest, UpdateCourseRequest, UpdateLessonRequest,
};
use crate::core::{ExplorerNode, NodeKind, RepoResult};
use crate::domain::EntityId;
use crate::store::{Database, SqliteStore};

/// syllabus - Course, lesson and annotation repository
#[derive(Parser, Debug)]
#[command(name = "syllabus")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Print raw JSON responses
    #[arg(long, global = true)]
    pub json: bool,

    /// Database file (overrides configuration)
    #[arg(long, global = true, env = "SYLLABUS_DB")]
    pub db: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Manage courses
    Course {
        #[command(subcommand)]
        command: CourseCommands,
    },

    /// Manage lessons
    Lesson {
        #[command(subcommand)]
        command: LessonCommands,
    },

    /// Manage annotations
    Annotation {
        #[command(subcommand)]
        command: AnnotationCommands,
    },

    /// Manage free-standing notes
    Note {
        #[command(subcommand)]
        command: NoteCommands,
    },

    /// Print the course/lesson/annotation tree
    Tree,

    /// Show resolved configuration (debug)
    Config,
}

#[derive(Subcommand, Debug)]
pub enum CourseCommands {
    /// Create a course
    Add { title: String },

    /// List courses, most recently updated first
    List,

    /// Rename a course
    Rename { id: String, title: String },

    /// Delete a course with all its lessons and annotations
    Rm {
        id: String,

        /// Delete everything in one transaction
        #[arg(long)]
        atomic: bool,
    },
}

#[derive(Subcommand, Debug)]
pub enum LessonCommands {
    /// Create a lesson
    Add {
        course_id: String,
        title: String,

        /// Parent lesson
        #[arg(short, long)]
        parent: Option<String>,
    },

    /// List lessons
    List {
        /// Only lessons of this course
        #[arg(short, long)]
        course: Option<String>,
    },

    /// Rename a lesson
    Rename { id: String, title: String },

    /// Move a lesson under another lesson (top level when omitted)
    Move {
        id: String,

        #[arg(short, long)]
        parent: Option<String>,
    },

    /// Delete a lesson, its nested lessons and their annotations
    Rm {
        id: String,

        /// Delete everything in one transaction
        #[arg(long)]
        atomic: bool,
    },
}

#[derive(Subcommand, Debug)]
pub enum AnnotationCommands {
    /// Create an annotation (content read from stdin when piped)
    Add {
        lesson_id: String,

        #[arg(short, long)]
        title: Option<String>,

        #[arg(short, long)]
        content: Option<String>,
    },

    /// Show one annotation
    Show { id: String },

    /// List annotations
    List {
        /// Only annotations of this lesson
        #[arg(short, long)]
        lesson: Option<String>,
    },

    /// Change the title and/or content
    Edit {
        id: String,

        #[arg(short, long)]
        title: Option<String>,

        #[arg(short, long)]
        content: Option<String>,
    },

    /// Replace both title and content
    Replace {
        id: String,
        title: String,
        content: String,
    },

    /// Delete an annotation
    Rm { id: String },
}

#[derive(Subcommand, Debug)]
pub enum NoteCommands {
    /// Create a note
    Add { title: String, content: String },

    /// List notes
    List,

    /// Replace a note's title and content
    Edit {
        id: String,
        title: String,
        content: String,
    },

    /// Delete a note
    Rm { id: String },
}

impl Cli {
    /// Execute the CLI command
    pub async fn execute(self) -> Result<()> {
        let store = match self.db {
            Some(ref path) => SqliteStore::new(Database::file(path)),
            None => crate::config::config()?.open_store(),
        };
        let api = ContentApi::new(store);

        match self.command {
            Commands::Course { command } => emit(course_command(&api, command).await, self.json),
            Commands::Lesson { command } => emit(lesson_command(&api, command).await, self.json),
            Commands::Annotation { command } => {
                emit(annotation_command(&api, command).await?, self.json)
            }
            Commands::Note { command } => emit(note_command(&api, command).await, self.json),
            Commands::Tree => show_tree(api.explorer().await, self.json),
            Commands::Config => show_config(),
        }
    }
}

async fn course_command(api: &ContentApi<SqliteStore>, command: CourseCommands) -> ApiResponse {
    match command {
        CourseCommands::Add { title } => {
            api.create_course(CreateCourseRequest { title: Some(title) })
                .await
        }
        CourseCommands::List => api.list_courses().await,
        CourseCommands::Rename { id, title } => {
            api.update_course(&id, UpdateCourseRequest { title: Some(title) })
                .await
        }
        CourseCommands::Rm { id, atomic: false } => api.delete_course(&id).await,
        CourseCommands::Rm { id, atomic: true } => {
            let result = match EntityId::parse(&id) {
                Ok(id) => api.store().delete_course_atomic(&id).await,
                Err(e) => Err(e),
            };
            deleted_response(result)
        }
    }
}

async fn lesson_command(api: &ContentApi<SqliteStore>, command: LessonCommands) -> ApiResponse {
    match command {
        LessonCommands::Add {
            course_id,
            title,
            parent,
        } => {
            api.create_lesson(CreateLessonRequest {
                course_id: Some(course_id),
                title: Some(title),
                parent_id: parent,
            })
            .await
        }
        LessonCommands::List { course } => {
            api.list_lessons(LessonQuery { course_id: course }).await
        }
        LessonCommands::Rename { id, title } => {
            let req = UpdateLessonRequest {
                title: Some(title),
                parent_id: None,
            };
            api.update_lesson(&id, req).await
        }
        LessonCommands::Move { id, parent } => {
            let req = UpdateLessonRequest {
                title: None,
                parent_id: Some(parent.unwrap_or_default()),
            };
            api.update_lesson(&id, req).await
        }
        LessonCommands::Rm { id, atomic: false } => api.delete_lesson(&id).await,
        LessonCommands::Rm { id, atomic: true } => {
            let result = match EntityId::parse(&id) {
                Ok(id) => api.store().delete_lesson_atomic(&id).await,
                Err(e) => Err(e),
            };
            deleted_response(result)
        }
    }
}

async fn annotation_command(
    api: &ContentApi<SqliteStore>,
    command: AnnotationCommands,
) -> Result<ApiResponse> {
    let response = match command {
        AnnotationCommands::Add {
            lesson_id,
            title,
            content,
        } => {
            let content = match content {
                Some(content) => Some(content),
                None if !io::stdin().is_terminal() => {
                    let mut buffer = String::new();
                    io::stdin()
                        .read_to_string(&mut buffer)
                        .context("Failed to read content from stdin")?;
                    Some(buffer)
                }
                None => None,
            };

            api.create_annotation(CreateAnnotationRequest {
                lesson_id: Some(lesson_id),
                title,
                content,
            })
            .await
        }
        AnnotationCommands::Show { id } => api.get_annotation(&id).await,
        AnnotationCommands::List { lesson } => {
            api.list_annotations(AnnotationQuery { lesson_id: lesson })
                .await
        }
        AnnotationCommands::Edit { id, title, content } => {
            api.patch_annotation(PatchAnnotationRequest {
                id: Some(id),
                title,
                content,
            })
            .await
        }
        AnnotationCommands::Replace { id, title, content } => {
            let req = ReplaceAnnotationRequest {
                title: Some(title),
                content: Some(content),
            };
            api.replace_annotation(&id, req).await
        }
        AnnotationCommands::Rm { id } => api.delete_annotation(&id).await,
    };

    Ok(response)
}

async fn note_command(api: &ContentApi<SqliteStore>, command: NoteCommands) -> ApiResponse {
    match command {
        NoteCommands::Add { title, content } => {
            api.create_note(NoteRequest {
                title: Some(title),
                content: Some(content),
            })
            .await
        }
        NoteCommands::List => api.list_notes().await,
        NoteCommands::Edit { id, title, content } => {
            let req = NoteRequest {
                title: Some(title),
                content: Some(content),
            };
            api.update_note(&id, req).await
        }
        NoteCommands::Rm { id } => api.delete_note(&id).await,
    }
}

fn deleted_response<T: serde::Serialize>(result: RepoResult<T>) -> ApiResponse {
    match result {
        Ok(report) => ApiResponse {
            status: 200,
            body: json!({ "ok": true, "deleted": report }),
        },
        Err(e) => ApiResponse::from(&e),
    }
}

/// Print a response, failing on error statuses
fn emit(response: ApiResponse, as_json: bool) -> Result<()> {
    let response = check(response)?;

    if as_json {
        println!("{}", serde_json::to_string_pretty(&response.body)?);
        return Ok(());
    }

    match &response.body {
        Value::Array(items) if items.is_empty() => println!("(none)"),
        Value::Array(items) => {
            for item in items {
                println!("{}", summarize(item));
            }
        }
        Value::Null => println!("(not found)"),
        body if body.get("deleted").is_some() => {
            let deleted = &body["deleted"];
            println!(
                "Deleted {} course(s), {} lesson(s), {} annotation(s)",
                deleted["courses"].as_u64().unwrap_or(0),
                deleted["lessons"].as_u64().unwrap_or(0),
                deleted["annotations"].as_u64().unwrap_or(0)
            );
        }
        body if body.get("ok").is_some() => println!("Deleted"),
        body => println!("{}", summarize(body)),
    }

    Ok(())
}

fn check(response: ApiResponse) -> Result<ApiResponse> {
    if !response.is_success() {
        anyhow::bail!(
            "{} (status {})",
            response.error_message().unwrap_or("request failed"),
            response.status
        );
    }
    Ok(response)
}

/// One-line summary of a record: id, then title or first content line
fn summarize(record: &Value) -> String {
    let id = record["id"].as_str().unwrap_or("?");
    let label = record["title"]
        .as_str()
        .filter(|t| !t.is_empty())
        .or_else(|| record["content"].as_str().and_then(|c| c.lines().next()))
        .unwrap_or("");
    format!("{}  {}", id, label)
}

fn show_tree(response: ApiResponse, as_json: bool) -> Result<()> {
    let response = check(response)?;

    if as_json {
        println!("{}", serde_json::to_string_pretty(&response.body)?);
        return Ok(());
    }

    let tree: Vec<ExplorerNode> =
        serde_json::from_value(response.body).context("Failed to decode explorer tree")?;
    if tree.is_empty() {
        println!("(no courses)");
    }

    for course in &tree {
        println!("{}  [{}]", course.name, course.id);
        for line in outline(course) {
            println!("{}", line);
        }
    }

    Ok(())
}

/// Outline lines for the nodes below `root`, one per node
fn outline(root: &ExplorerNode) -> Vec<String> {
    let mut lines = Vec::new();
    let mut stack: Vec<(&ExplorerNode, String, bool)> = Vec::new();
    push_children(&mut stack, root, String::new());

    while let Some((node, prefix, last)) = stack.pop() {
        let branch = if last { "└── " } else { "├── " };
        let marker = match node.kind {
            NodeKind::Annotation => "· ",
            _ => "",
        };
        lines.push(format!("{}{}{}{}", prefix, branch, marker, node.name));

        let next = format!("{}{}", prefix, if last { "    " } else { "│   " });
        push_children(&mut stack, node, next);
    }

    lines
}

fn push_children<'a>(
    stack: &mut Vec<(&'a ExplorerNode, String, bool)>,
    node: &'a ExplorerNode,
    prefix: String,
) {
    let children = node.children();
    // Reversed so the first child is printed first
    for (i, child) in children.iter().enumerate().rev() {
        stack.push((child, prefix.clone(), i + 1 == children.len()));
    }
}

/// Show resolved configuration
fn show_config() -> Result<()> {
    let config = crate::config::config()?;

    println!("Configuration:");
    println!("  home:         {}", config.home.display());
    println!("  database:     {}", config.database.display());
    println!("  busy timeout: {} ms", config.busy_timeout.as_millis());
    match &config.config_file {
        Some(path) => println!("  config file:  {}", path.display()),
        None => println!("  config file:  (none, using defaults)"),
    }

    Ok(())
}
