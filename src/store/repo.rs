//! Typed repositories over the entity store.
//!
//! These carry no state and do no business validation; the router checks
//! titles and references before calling in.

use crate::error::Result;

use super::entity::EntityStore;
use super::records::{Project, Task, TaskStatus};

/// Fields of a task that does not exist yet.
#[derive(Debug, Clone, Default)]
pub struct NewTask {
    pub project_id: i64,
    pub title: String,
    pub assignee: String,
    pub deadline: Option<String>,
    pub description: Option<String>,
}

pub struct TaskRepository<'a> {
    store: &'a EntityStore,
}

impl<'a> TaskRepository<'a> {
    pub fn new(store: &'a EntityStore) -> Self {
        Self { store }
    }

    pub fn create_task(
        &self,
        title: &str,
        assignee: &str,
        deadline: Option<&str>,
        project_id: i64,
    ) -> Result<Task> {
        self.create(NewTask {
            project_id,
            title: title.to_string(),
            assignee: assignee.to_string(),
            deadline: deadline.map(str::to_string),
            description: None,
        })
    }

    /// Persist a task in the initial status.
    pub fn create(&self, new: NewTask) -> Result<Task> {
        let mut task = Task {
            id: 0,
            project_id: new.project_id,
            title: new.title,
            deadline: new.deadline,
            status: TaskStatus::default(),
            assignee: new.assignee,
            description: new.description,
        };
        self.store.insert(&mut task)?;
        tracing::info!(
            "Created task {} '{}' in project {}",
            task.id,
            task.title,
            task.project_id
        );
        Ok(task)
    }

    pub fn update_task(&self, task: &Task) -> Result<()> {
        self.store.update(task)?;
        tracing::info!("Updated task {}", task.id);
        Ok(())
    }

    pub fn list_tasks(&self) -> Result<Vec<Task>> {
        self.store.list_all()
    }

    pub fn tasks_by_status(&self, status: TaskStatus) -> Result<Vec<Task>> {
        self.store.find_by_field("status", status)
    }

    pub fn tasks_by_assignee(&self, handle: &str) -> Result<Vec<Task>> {
        self.store.find_by_field("assignee", handle)
    }

    pub fn tasks_by_project(&self, project_id: i64) -> Result<Vec<Task>> {
        self.store.find_by_field("project_id", project_id)
    }

    pub fn task_by_id(&self, id: i64) -> Result<Task> {
        self.store.get_by_id(id)
    }
}

pub struct ProjectRepository<'a> {
    store: &'a EntityStore,
}

impl<'a> ProjectRepository<'a> {
    pub fn new(store: &'a EntityStore) -> Self {
        Self { store }
    }

    pub fn create_project(&self, title: &str, creator: &str) -> Result<Project> {
        let mut project = Project {
            id: 0,
            title: title.to_string(),
            creator: creator.to_string(),
            status: String::new(),
        };
        self.store.insert(&mut project)?;
        tracing::info!("Created project {} '{}' by {}", project.id, project.title, creator);
        Ok(project)
    }

    pub fn list_projects(&self) -> Result<Vec<Project>> {
        self.store.list_all()
    }

    pub fn project_by_id(&self, id: i64) -> Result<Project> {
        self.store.get_by_id(id)
    }
}
