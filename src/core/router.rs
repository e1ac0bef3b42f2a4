//! Command routing and multi-step flows.
//!
//! Every inbound update takes the lock of its (user, chat) session for the
//! whole time it is handled. A recognised command abandons whatever flow was
//! pending; plain text is fed to the pending flow, which is always consumed:
//! the session returns to idle (or moves to the next step) whether the action
//! succeeded or not, and a failure becomes a single error reply.

use std::sync::Arc;

use crate::error::{Error, Result};
use crate::store::{
    DefaultProjectResolver, EntityStore, NewTask, PinnedNoteStore, Project, ProjectRepository,
    Task, TaskRepository,
};

use super::message::{Choice, ChoiceAction, ChoiceSelected, Inbound, Reply, Sender, MAX_CHOICES};
use super::parse::{
    parse_command, parse_task_line, parse_task_ref, split_task_args, target_handle, Command,
    TASK_LINE_FORMAT,
};
use super::session::{SelectionPurpose, SessionState, SessionStore};

pub struct Router {
    store: Arc<EntityStore>,
    sessions: Arc<SessionStore>,
}

impl Router {
    pub fn new(store: Arc<EntityStore>, sessions: Arc<SessionStore>) -> Self {
        Self { store, sessions }
    }

    pub fn store(&self) -> &EntityStore {
        &self.store
    }

    pub fn sessions(&self) -> &SessionStore {
        &self.sessions
    }

    pub(super) fn tasks(&self) -> TaskRepository<'_> {
        TaskRepository::new(&self.store)
    }

    pub(super) fn projects(&self) -> ProjectRepository<'_> {
        ProjectRepository::new(&self.store)
    }

    pub(super) fn defaults(&self) -> DefaultProjectResolver<'_> {
        DefaultProjectResolver::new(&self.store)
    }

    pub(super) fn notes(&self) -> PinnedNoteStore<'_> {
        PinnedNoteStore::new(&self.store)
    }

    /// Handle a message or command.
    pub async fn handle_message(&self, msg: &Inbound) -> Vec<Reply> {
        let key = msg.key();
        let mut session = self.sessions.lock(key).await;
        let replies = self.route_message(msg, &mut session);
        self.sessions.release(key, session);
        replies
    }

    fn route_message(&self, msg: &Inbound, session: &mut SessionState) -> Vec<Reply> {
        let key = msg.key();
        match parse_command(&msg.text) {
            Some(cmd) => {
                let abandoned = session.take();
                if !abandoned.is_idle() {
                    tracing::debug!("Session {} abandoned {:?} for /{}", key, abandoned, cmd.name);
                }
                tracing::info!("Session {} command /{}", key, cmd.name);
                if cmd.name == "cancel" {
                    return vec![Reply::text(if abandoned.is_idle() {
                        "Nothing to cancel."
                    } else {
                        "Cancelled."
                    })];
                }
                self.dispatch(&cmd, msg, session)
            }
            None => {
                let pending = session.take();
                tracing::debug!("Session {} follow-up for {:?}", key, pending);
                self.continue_flow(pending, msg, session)
            }
        }
    }

    /// Handle a selected inline choice.
    pub async fn handle_choice(&self, selected: &ChoiceSelected) -> Vec<Reply> {
        let action = match selected.choice_id.parse::<ChoiceAction>() {
            Ok(action) => action,
            Err(e) => {
                tracing::warn!("Ignoring choice '{}': {}", selected.choice_id, e);
                return vec![Reply::text("That option is no longer available.")];
            }
        };

        // Listing is read-only and leaves any pending flow untouched.
        if let ChoiceAction::List(filter) = action {
            return self.list_tasks(filter);
        }

        let key = selected.key();
        let mut session = self.sessions.lock(key).await;
        let pending = session.take();
        tracing::debug!("Session {} choice {} while {:?}", key, action, pending);

        let replies = match action {
            ChoiceAction::Project(project_id) => {
                let purpose = match pending {
                    SessionState::AwaitingProjectSelection { purpose } => purpose,
                    _ => SelectionPurpose::SetDefault,
                };
                self.select_project(selected.chat_id, project_id, purpose, &mut session)
            }
            ChoiceAction::Assign(task_id) => {
                respond("assign task", self.await_assign_target(task_id, &mut session))
            }
            ChoiceAction::List(_) => Vec::new(),
        };
        self.sessions.release(key, session);
        replies
    }

    fn dispatch(&self, cmd: &Command<'_>, msg: &Inbound, session: &mut SessionState) -> Vec<Reply> {
        match cmd.name.as_str() {
            "start" | "help" => vec![Reply::text(super::commands::HELP_TEXT)],
            "create_project" => {
                if cmd.args.is_empty() {
                    *session = SessionState::AwaitingProjectName;
                    vec![Reply::text("Project name:")]
                } else {
                    respond("create project", self.save_project(cmd.args, &msg.sender))
                }
            }
            "list_projects" => self.list_projects(),
            "set_default_project" => self.offer_projects(
                SelectionPurpose::SetDefault,
                "Which project do you want to set as default for this chat?",
                session,
            ),
            "current_project" => self.current_project(msg.chat_id),
            "create_task" => self.start_create_task(msg.chat_id, session),
            "list_tasks" => self.list_tasks_command(cmd.args),
            "list_by_status" => self.list_by_status(cmd.args),
            "list_by_assignee" => self.list_by_assignee(cmd.args, &msg.mentions),
            "mine" => self.my_tasks(&msg.sender),
            "assign" => respond("assign task", self.start_assign(cmd, msg, session)),
            "set_deadline" => self.set_deadline(cmd, msg),
            "set_status" => self.set_status(cmd, msg),
            "pin" => self.pin(cmd, msg),
            other => {
                tracing::debug!("Unknown command /{}", other);
                vec![Reply::text("Unknown command. Send /help for available commands.")]
            }
        }
    }

    /// Feed plain text to the flow that was pending. `session` is already idle.
    fn continue_flow(&self, pending: SessionState, msg: &Inbound, session: &mut SessionState) -> Vec<Reply> {
        match pending {
            SessionState::Idle => Vec::new(),
            SessionState::AwaitingProjectName => {
                respond("create project", self.save_project(&msg.text, &msg.sender))
            }
            SessionState::AwaitingTaskTitle => respond("create task", self.save_task(msg)),
            SessionState::AwaitingProjectSelection { purpose } => {
                match self.project_by_name_or_id(msg.text.trim()) {
                    Ok(project) => self.select_project(msg.chat_id, project.id, purpose, session),
                    Err(e) => vec![Reply::text(e.to_reply("select project"))],
                }
            }
            SessionState::AwaitingAssignTarget { task_id } => {
                respond("assign task", self.assign(task_id, &msg.mentions, &msg.text))
            }
        }
    }

    fn save_project(&self, title: &str, creator: &Sender) -> Result<Vec<Reply>> {
        let title = title.trim();
        if title.is_empty() {
            return Err(Error::validation("Project title is required"));
        }
        let project = self.projects().create_project(title, &creator.label())?;
        Ok(vec![Reply::text(format!(
            "Created project {} (#{}) successfully",
            project.title, project.id
        ))])
    }

    fn start_create_task(&self, chat_id: i64, session: &mut SessionState) -> Vec<Reply> {
        match self.defaults().get(chat_id) {
            Ok(Some(project)) => {
                *session = SessionState::AwaitingTaskTitle;
                vec![Reply::text(task_prompt(&project))]
            }
            Ok(None) => self.offer_projects(
                SelectionPurpose::CreateTask,
                "Which project do you want to create a task for?",
                session,
            ),
            Err(e) => {
                tracing::warn!("create task failed: {}", e);
                vec![Reply::text(e.to_reply("create task"))]
            }
        }
    }

    /// Offer every project as a choice and wait for the selection.
    fn offer_projects(&self, purpose: SelectionPurpose, prompt: &str, session: &mut SessionState) -> Vec<Reply> {
        let projects = match self.projects().list_projects() {
            Ok(projects) => projects,
            Err(e) => return vec![Reply::text(e.to_reply("list projects"))],
        };
        if projects.is_empty() {
            return vec![Reply::text(
                "There is no project yet. Create one with /create_project.",
            )];
        }

        *session = SessionState::AwaitingProjectSelection { purpose };
        let choices = projects
            .iter()
            .map(|p| Choice::new(ChoiceAction::Project(p.id), p.title.clone()))
            .collect();
        vec![capped_choices(prompt, choices, "Send a project title or id to pick another one.")]
    }

    fn project_by_name_or_id(&self, text: &str) -> Result<Project> {
        if let Ok(id) = text.trim_start_matches('#').parse::<i64>() {
            return self.projects().project_by_id(id);
        }
        self.projects()
            .list_projects()?
            .into_iter()
            .find(|p| p.title.eq_ignore_ascii_case(text))
            .ok_or_else(|| Error::NotFound(format!("project '{}'", text)))
    }

    /// Bind the chat's default project, then continue into task creation if
    /// that is why the project was asked for.
    fn select_project(
        &self,
        chat_id: i64,
        project_id: i64,
        purpose: SelectionPurpose,
        session: &mut SessionState,
    ) -> Vec<Reply> {
        let result = self.stale_if_missing(self.projects().project_by_id(project_id)).and_then(|project| {
            self.defaults().set(chat_id, project.id)?;
            Ok(project)
        });

        match (result, purpose) {
            (Ok(project), SelectionPurpose::CreateTask) => {
                *session = SessionState::AwaitingTaskTitle;
                vec![Reply::text(task_prompt(&project))]
            }
            (Ok(project), SelectionPurpose::SetDefault) => vec![Reply::text(format!(
                "Default project for this chat now is: {}",
                project.title
            ))],
            (Err(e), _) => {
                tracing::warn!("set default project failed: {}", e);
                vec![Reply::text(e.to_reply("set default project"))]
            }
        }
    }

    fn save_task(&self, msg: &Inbound) -> Result<Vec<Reply>> {
        let line = parse_task_line(&msg.text, &msg.mentions)?;
        let project = self.defaults().get(msg.chat_id)?.ok_or_else(|| {
            Error::StaleReference("this chat has no default project anymore".to_string())
        })?;

        let task = self.tasks().create(NewTask {
            project_id: project.id,
            title: line.title,
            assignee: line.assignee,
            deadline: line.deadline,
            description: line.description,
        })?;

        let mut text = format!("Created task {} {} in {}", task.id, task.title, project.title);
        if !task.assignee.is_empty() {
            text.push_str(&format!(" for {}", task.assignee));
        }
        Ok(vec![Reply::text(text)])
    }

    /// `/assign` as a reply to a task, `/assign <id> [@who]`, or bare to pick a task.
    fn start_assign(&self, cmd: &Command<'_>, msg: &Inbound, session: &mut SessionState) -> Result<Vec<Reply>> {
        let (task_id, target_text) = match &msg.reply_to {
            Some(replied) => (parse_task_ref(replied)?, cmd.args),
            None if !cmd.args.is_empty() => split_task_args(cmd.args)?,
            None => return self.offer_tasks_to_assign(),
        };

        if msg.mentions.is_empty() && target_text.is_empty() {
            return self.await_assign_target(task_id, session);
        }
        self.assign(task_id, &msg.mentions, target_text)
    }

    fn offer_tasks_to_assign(&self) -> Result<Vec<Reply>> {
        let tasks = self.tasks().list_tasks()?;
        if tasks.is_empty() {
            return Ok(vec![Reply::text("There is no task yet.")]);
        }
        // Newest first, so recent work survives the cap.
        let choices = tasks
            .iter()
            .rev()
            .map(|t| Choice::new(ChoiceAction::Assign(t.id), format!("{} {}", t.id, t.title)))
            .collect();
        Ok(vec![capped_choices(
            "Which task do you want to assign?",
            choices,
            "Use /assign <id> @user for older tasks.",
        )])
    }

    fn await_assign_target(&self, task_id: i64, session: &mut SessionState) -> Result<Vec<Reply>> {
        let task = self.task_for_flow(task_id)?;
        *session = SessionState::AwaitingAssignTarget { task_id };
        Ok(vec![Reply::text(format!(
            "Who should take task {} {}? Mention a user or send a @handle.",
            task.id, task.title
        ))])
    }

    fn assign(&self, task_id: i64, mentions: &[String], text: &str) -> Result<Vec<Reply>> {
        let handle = target_handle(mentions, text)?;
        let mut task = self.task_for_flow(task_id)?;
        task.assignee = handle;
        self.tasks().update_task(&task)?;
        Ok(vec![Reply::text(format!(
            "Task {} is assigned to {} successfully",
            task.title, task.assignee
        ))])
    }

    /// Load a task a flow refers to; a missing one is a stale reference.
    pub(super) fn task_for_flow(&self, task_id: i64) -> Result<Task> {
        self.stale_if_missing(self.tasks().task_by_id(task_id))
    }

    fn stale_if_missing<T>(&self, result: Result<T>) -> Result<T> {
        result.map_err(|e| match e {
            Error::NotFound(what) => Error::StaleReference(format!("{} no longer exists", what)),
            other => other,
        })
    }
}

/// Unwrap a handler result into replies, turning an error into one line.
pub(super) fn respond(action: &str, result: Result<Vec<Reply>>) -> Vec<Reply> {
    match result {
        Ok(replies) => replies,
        Err(e) => {
            tracing::warn!("{} failed: {}", action, e);
            vec![Reply::text(e.to_reply(action))]
        }
    }
}

/// Choice reply with at most [`MAX_CHOICES`] options; when some are cut the
/// prompt says so and appends `overflow_hint`.
fn capped_choices(prompt: &str, mut choices: Vec<Choice>, overflow_hint: &str) -> Reply {
    let total = choices.len();
    let text = if total > MAX_CHOICES {
        choices.truncate(MAX_CHOICES);
        format!(
            "{}\nShowing {} of {}. {}",
            prompt, MAX_CHOICES, total, overflow_hint
        )
    } else {
        prompt.to_string()
    };
    Reply::Choices { text, choices }
}

fn task_prompt(project: &Project) -> String {
    format!(
        "Create task for {}. Follow this structure:\n{}",
        project.title, TASK_LINE_FORMAT
    )
}
