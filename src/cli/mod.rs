//! CLI commands for taskbot using clap.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, Subcommand};

use crate::config::{get_settings_path, load_settings_or_default, save_settings, Settings, TOKEN_ENV};
use crate::core::parse::normalize_handle;
use crate::core::{Router, SessionStore};
use crate::store::{EntityStore, Project, ProjectRepository, Task, TaskRepository, TaskStatus};

/// taskbot - Telegram task tracker with per-chat projects.
#[derive(Parser)]
#[command(name = "taskbot")]
#[command(version)]
#[command(about = "Track tasks and projects from Telegram chats", long_about = None)]
pub struct Commands {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Run the Telegram bot
    Start,

    /// Write the settings file
    Setup {
        /// Telegram bot token
        #[arg(long)]
        token: String,

        /// Database file (defaults to ~/.taskbot/taskbot.db)
        #[arg(long)]
        db: Option<PathBuf>,
    },

    /// Show configuration and store summary
    Status,

    /// List projects
    Projects,

    /// List tasks
    Tasks {
        /// Only tasks with this status: init, doing, done
        #[arg(long)]
        status: Option<String>,

        /// Only tasks assigned to this handle
        #[arg(long)]
        assignee: Option<String>,
    },
}

impl Commands {
    pub async fn run(self) -> Result<()> {
        match self.command {
            Command::Start => start().await,
            Command::Setup { token, db } => setup(token, db),
            Command::Status => status(),
            Command::Projects => projects(),
            Command::Tasks { status, assignee } => tasks(status, assignee),
        }
    }
}

fn open_store(settings: &Settings) -> Result<EntityStore> {
    Ok(EntityStore::open(&settings.resolve_db_path()?)?)
}

async fn start() -> Result<()> {
    let settings = load_settings_or_default();
    let token = settings.resolve_token()?;
    let store = Arc::new(open_store(&settings)?);
    let router = Arc::new(Router::new(store, Arc::new(SessionStore::new())));

    crate::telegram::run_telegram_daemon(token, router).await?;
    Ok(())
}

fn setup(token: String, db: Option<PathBuf>) -> Result<()> {
    let mut settings = load_settings_or_default();
    settings.bot_token = Some(token);
    if db.is_some() {
        settings.db_path = db;
    }
    let path = save_settings(&settings)?;
    println!("Settings written to {}", path.display());
    println!("Database: {}", settings.resolve_db_path()?.display());
    Ok(())
}

fn status() -> Result<()> {
    let settings = load_settings_or_default();
    let db_path = settings.resolve_db_path()?;

    println!("Settings:  {}", get_settings_path()?.display());
    println!("Database:  {}", db_path.display());
    println!(
        "Token:     {}",
        match settings.resolve_token() {
            Ok(_) => "configured".to_string(),
            Err(_) => format!("missing (run 'taskbot setup' or set {})", TOKEN_ENV),
        }
    );

    if db_path.exists() {
        let store = open_store(&settings)?;
        println!("Projects:  {}", store.count::<Project>()?);
        println!("Tasks:     {}", store.count::<Task>()?);
    } else {
        println!("Store:     not created yet");
    }
    Ok(())
}

fn projects() -> Result<()> {
    let store = open_store(&load_settings_or_default())?;
    let projects = ProjectRepository::new(&store).list_projects()?;
    if projects.is_empty() {
        println!("No projects.");
    }
    for project in projects {
        println!("{:>4}  {}  ({})", project.id, project.title, project.creator);
    }
    Ok(())
}

fn tasks(status: Option<String>, assignee: Option<String>) -> Result<()> {
    let store = open_store(&load_settings_or_default())?;
    let tasks = filter_tasks(&store, status.as_deref(), assignee.as_deref())?;
    if tasks.is_empty() {
        println!("No tasks.");
    }
    for task in tasks {
        println!("{}", task.summary());
    }
    Ok(())
}

/// Tasks matching the optional status and assignee filters.
fn filter_tasks(store: &EntityStore, status: Option<&str>, assignee: Option<&str>) -> Result<Vec<Task>> {
    let repo = TaskRepository::new(store);
    let status = status.map(str::parse::<TaskStatus>).transpose()?;
    let assignee = assignee.map(normalize_handle).transpose()?;

    let tasks = match (status, assignee) {
        (Some(status), Some(handle)) => repo
            .tasks_by_status(status)?
            .into_iter()
            .filter(|t| t.assignee == handle)
            .collect(),
        (Some(status), None) => repo.tasks_by_status(status)?,
        (None, Some(handle)) => repo.tasks_by_assignee(&handle)?,
        (None, None) => repo.list_tasks()?,
    };
    Ok(tasks)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_tasks_filters() {
        let cli = Commands::try_parse_from(["taskbot", "tasks", "--status", "doing", "--assignee", "bob"])
            .unwrap();
        match cli.command {
            Command::Tasks { status, assignee } => {
                assert_eq!(status.as_deref(), Some("doing"));
                assert_eq!(assignee.as_deref(), Some("bob"));
            }
            _ => panic!("expected tasks command"),
        }
        assert!(Commands::try_parse_from(["taskbot", "setup"]).is_err());
    }

    #[test]
    fn test_filter_tasks() {
        let store = EntityStore::in_memory().unwrap();
        let project = ProjectRepository::new(&store).create_project("Launch", "@alice").unwrap();
        let repo = TaskRepository::new(&store);
        let mut a = repo.create_task("a", "@bob", None, project.id).unwrap();
        repo.create_task("b", "@bob", None, project.id).unwrap();
        repo.create_task("c", "@carol", None, project.id).unwrap();
        a.status = TaskStatus::Done;
        repo.update_task(&a).unwrap();

        assert_eq!(filter_tasks(&store, None, None).unwrap().len(), 3);
        assert_eq!(filter_tasks(&store, None, Some("bob")).unwrap().len(), 2);
        assert_eq!(filter_tasks(&store, Some("done"), Some("@bob")).unwrap().len(), 1);
        assert!(filter_tasks(&store, Some("done"), Some("@carol")).unwrap().is_empty());
        assert!(filter_tasks(&store, Some("later"), None).is_err());
    }
}
