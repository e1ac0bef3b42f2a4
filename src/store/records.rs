//! Persisted record types.

use std::fmt;
use std::str::FromStr;

use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, Value, ValueRef};
use rusqlite::Row;
use serde::{Deserialize, Serialize};

use crate::error::Error;

use super::entity::Entity;

/// DDL for every table, in dependency order.
pub const SCHEMAS: &[&str] = &[
    Project::SCHEMA,
    Task::SCHEMA,
    DefaultProjectBinding::SCHEMA,
    PinnedNote::SCHEMA,
];

/// Task progress.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    #[default]
    Init,
    Doing,
    Done,
}

impl TaskStatus {
    pub const ALL: [TaskStatus; 3] = [TaskStatus::Init, TaskStatus::Doing, TaskStatus::Done];

    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Init => "init",
            TaskStatus::Doing => "doing",
            TaskStatus::Done => "done",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            TaskStatus::Init => "Not Started Yet",
            TaskStatus::Doing => "Doing",
            TaskStatus::Done => "Done",
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "init" | "not_start" | "not_started" | "todo" => Ok(TaskStatus::Init),
            "doing" => Ok(TaskStatus::Doing),
            "done" => Ok(TaskStatus::Done),
            other => Err(Error::Validation(format!(
                "Unknown status '{}'. Use one of: init, doing, done",
                other
            ))),
        }
    }
}

impl ToSql for TaskStatus {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for TaskStatus {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        value
            .as_str()?
            .parse()
            .map_err(|e: Error| FromSqlError::Other(e.to_string().into()))
    }
}

/// A unit of work belonging to a project.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Task {
    pub id: i64,
    pub project_id: i64,
    pub title: String,
    pub deadline: Option<String>,
    pub status: TaskStatus,
    /// Chat handle such as `@bob`, or empty when unassigned.
    pub assignee: String,
    pub description: Option<String>,
}

impl Task {
    /// One-line rendering; the id is the leading token so replies can refer back to it.
    pub fn summary(&self) -> String {
        let mut line = format!("{} {}", self.id, self.title);
        if !self.assignee.is_empty() {
            line.push_str(&format!(" - {}", self.assignee));
        }
        if let Some(deadline) = &self.deadline {
            line.push_str(&format!(" - {}", deadline));
        }
        line.push_str(&format!(" [{}]", self.status));
        if let Some(description) = &self.description {
            line.push_str(&format!("\n{}", description));
        }
        line
    }
}

impl Entity for Task {
    const TABLE: &'static str = "tasks";
    const KIND: &'static str = "task";
    const COLUMNS: &'static [&'static str] = &[
        "project_id",
        "title",
        "deadline",
        "status",
        "assignee",
        "description",
    ];
    const INDEXED: &'static [&'static str] = &["project_id", "status", "assignee"];
    const SCHEMA: &'static str = r#"
        CREATE TABLE IF NOT EXISTS tasks (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            project_id INTEGER NOT NULL REFERENCES projects(id),
            title TEXT NOT NULL,
            deadline TEXT,
            status TEXT NOT NULL DEFAULT 'init',
            assignee TEXT NOT NULL DEFAULT '',
            description TEXT
        );
        CREATE INDEX IF NOT EXISTS idx_tasks_project ON tasks(project_id);
        CREATE INDEX IF NOT EXISTS idx_tasks_status ON tasks(status);
        CREATE INDEX IF NOT EXISTS idx_tasks_assignee ON tasks(assignee);
    "#;

    fn id(&self) -> i64 {
        self.id
    }

    fn set_id(&mut self, id: i64) {
        self.id = id;
    }

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            project_id: row.get(1)?,
            title: row.get(2)?,
            deadline: row.get(3)?,
            status: row.get(4)?,
            assignee: row.get(5)?,
            description: row.get(6)?,
        })
    }

    fn values(&self) -> Vec<Value> {
        vec![
            Value::Integer(self.project_id),
            Value::Text(self.title.clone()),
            opt_text(&self.deadline),
            Value::Text(self.status.as_str().to_string()),
            Value::Text(self.assignee.clone()),
            opt_text(&self.description),
        ]
    }
}

/// A named group of tasks.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Project {
    pub id: i64,
    pub title: String,
    pub creator: String,
    /// Reserved; no flow sets it yet.
    pub status: String,
}

impl Entity for Project {
    const TABLE: &'static str = "projects";
    const KIND: &'static str = "project";
    const COLUMNS: &'static [&'static str] = &["title", "creator", "status"];
    const INDEXED: &'static [&'static str] = &["creator", "status"];
    const SCHEMA: &'static str = r#"
        CREATE TABLE IF NOT EXISTS projects (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            title TEXT NOT NULL,
            creator TEXT NOT NULL DEFAULT '',
            status TEXT NOT NULL DEFAULT ''
        );
        CREATE INDEX IF NOT EXISTS idx_projects_creator ON projects(creator);
        CREATE INDEX IF NOT EXISTS idx_projects_status ON projects(status);
    "#;

    fn id(&self) -> i64 {
        self.id
    }

    fn set_id(&mut self, id: i64) {
        self.id = id;
    }

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            title: row.get(1)?,
            creator: row.get(2)?,
            status: row.get(3)?,
        })
    }

    fn values(&self) -> Vec<Value> {
        vec![
            Value::Text(self.title.clone()),
            Value::Text(self.creator.clone()),
            Value::Text(self.status.clone()),
        ]
    }
}

/// Chat → project association, at most one per chat.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct DefaultProjectBinding {
    pub id: i64,
    pub chat_id: i64,
    pub project_id: i64,
}

impl Entity for DefaultProjectBinding {
    const TABLE: &'static str = "default_projects";
    const KIND: &'static str = "default project binding";
    const COLUMNS: &'static [&'static str] = &["chat_id", "project_id"];
    const INDEXED: &'static [&'static str] = &["chat_id"];
    const UNIQUE: &'static [&'static str] = &["chat_id"];
    const SCHEMA: &'static str = r#"
        CREATE TABLE IF NOT EXISTS default_projects (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            chat_id INTEGER NOT NULL UNIQUE,
            project_id INTEGER NOT NULL REFERENCES projects(id)
        );
    "#;

    fn id(&self) -> i64 {
        self.id
    }

    fn set_id(&mut self, id: i64) {
        self.id = id;
    }

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            chat_id: row.get(1)?,
            project_id: row.get(2)?,
        })
    }

    fn values(&self) -> Vec<Value> {
        vec![Value::Integer(self.chat_id), Value::Integer(self.project_id)]
    }
}

/// Free-text note pinned in a chat, at most one per chat.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct PinnedNote {
    pub id: i64,
    pub chat_id: i64,
    pub text: String,
}

impl Entity for PinnedNote {
    const TABLE: &'static str = "pinned_notes";
    const KIND: &'static str = "pinned note";
    const COLUMNS: &'static [&'static str] = &["chat_id", "text"];
    const INDEXED: &'static [&'static str] = &["chat_id"];
    const UNIQUE: &'static [&'static str] = &["chat_id"];
    const SCHEMA: &'static str = r#"
        CREATE TABLE IF NOT EXISTS pinned_notes (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            chat_id INTEGER NOT NULL UNIQUE,
            text TEXT NOT NULL
        );
    "#;

    fn id(&self) -> i64 {
        self.id
    }

    fn set_id(&mut self, id: i64) {
        self.id = id;
    }

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            chat_id: row.get(1)?,
            text: row.get(2)?,
        })
    }

    fn values(&self) -> Vec<Value> {
        vec![Value::Integer(self.chat_id), Value::Text(self.text.clone())]
    }
}

fn opt_text(value: &Option<String>) -> Value {
    match value {
        Some(s) => Value::Text(s.clone()),
        None => Value::Null,
    }
}
