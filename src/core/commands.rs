//! Single-message commands: listings, task field edits and the pinned note.

use crate::error::{Error, Result};
use crate::store::{Task, TaskStatus};

use super::message::{Choice, ChoiceAction, Inbound, ListFilter, Reply, Sender};
use super::parse::{parse_task_ref, split_task_args, target_handle, Command};
use super::router::{respond, Router};

pub const HELP_TEXT: &str = r#"This is a bot for managing tasks.

/help - Show this help
/create_project [title] - Create a project
/list_projects - List projects
/set_default_project - Choose this chat's project
/current_project - Show this chat's project
/create_task - Create a task in this chat's project
/list_tasks [status] - List tasks (all, init, doing, done)
/list_by_status <status> - List tasks with a status
/list_by_assignee <@user> - List tasks of a user
/mine - List your tasks
/assign - Assign a task (reply to a task, or /assign <id> @user)
/set_deadline <deadline> - Reply to a task to set its deadline
/set_status <status> - Reply to a task to set its status
/pin [text] - Show the pinned note, or reply to a message to pin it
/cancel - Cancel the current step"#;

impl Router {
    pub(super) fn list_projects(&self) -> Vec<Reply> {
        respond("get list projects", self.render_projects())
    }

    fn render_projects(&self) -> Result<Vec<Reply>> {
        let projects = self.projects().list_projects()?;
        if projects.is_empty() {
            return Ok(vec![Reply::text("There is not a project yet.")]);
        }
        let mut text = String::from("Project list:\n");
        for project in &projects {
            text.push_str(&format!(
                "{} {} created by {}\n",
                project.id, project.title, project.creator
            ));
        }
        Ok(vec![Reply::text(text.trim_end())])
    }

    pub(super) fn current_project(&self, chat_id: i64) -> Vec<Reply> {
        let result = self.defaults().get(chat_id).map(|project| match project {
            Some(project) => vec![Reply::text(format!(
                "Current project for this chat: {}",
                project.title
            ))],
            None => vec![Reply::text(
                "This chat has no default project yet. Use /set_default_project.",
            )],
        });
        respond("get current project", result)
    }

    /// `/list_tasks` offers the filters; `/list_tasks <filter>` lists directly.
    pub(super) fn list_tasks_command(&self, args: &str) -> Vec<Reply> {
        if args.is_empty() {
            let mut choices = vec![Choice::new(ChoiceAction::List(ListFilter::All), ListFilter::All.label())];
            choices.extend(TaskStatus::ALL.iter().map(|status| {
                let filter = ListFilter::Status(*status);
                Choice::new(ChoiceAction::List(filter), filter.label())
            }));
            return vec![Reply::Choices {
                text: "Which tasks do you want to list?".to_string(),
                choices,
            }];
        }
        if args.eq_ignore_ascii_case("all") {
            return self.list_tasks(ListFilter::All);
        }
        match args.parse::<TaskStatus>() {
            Ok(status) => self.list_tasks(ListFilter::Status(status)),
            Err(e) => vec![Reply::text(e.to_reply("get task list"))],
        }
    }

    pub(super) fn list_by_status(&self, args: &str) -> Vec<Reply> {
        if args.is_empty() {
            return vec![Reply::text("Usage: /list_by_status <init|doing|done>")];
        }
        match args.parse::<TaskStatus>() {
            Ok(status) => self.list_tasks(ListFilter::Status(status)),
            Err(e) => vec![Reply::text(e.to_reply("get task list"))],
        }
    }

    /// Header plus one message per task, so each can be replied to.
    pub(super) fn list_tasks(&self, filter: ListFilter) -> Vec<Reply> {
        let result = match filter {
            ListFilter::All => self.tasks().list_tasks(),
            ListFilter::Status(status) => self.tasks().tasks_by_status(status),
        };
        let tasks = match result {
            Ok(tasks) => tasks,
            Err(e) => return vec![Reply::text(e.to_reply("get task list"))],
        };
        if tasks.is_empty() {
            return vec![Reply::text(format!(
                "There is no {} task to show.",
                filter.label().to_lowercase()
            ))];
        }

        let mut replies = vec![Reply::text(format!("Task list ({}):", filter.label()))];
        replies.extend(tasks.iter().map(|task| Reply::text(task.summary())));
        replies
    }

    pub(super) fn list_by_assignee(&self, args: &str, mentions: &[String]) -> Vec<Reply> {
        let result = target_handle(mentions, args)
            .map_err(|_| Error::validation("Usage: /list_by_assignee @username"))
            .and_then(|handle| {
                let tasks = self.tasks().tasks_by_assignee(&handle)?;
                Ok(render_task_block(&format!("Tasks of {}", handle), &tasks))
            });
        respond("get task list", result)
    }

    pub(super) fn my_tasks(&self, sender: &Sender) -> Vec<Reply> {
        let result = sender
            .handle()
            .ok_or_else(|| Error::validation("you need a username to have tasks assigned"))
            .and_then(|handle| {
                let tasks = self.tasks().tasks_by_assignee(&handle)?;
                Ok(render_task_block("Your task list", &tasks))
            });
        respond("get your task list", result)
    }

    pub(super) fn set_deadline(&self, cmd: &Command<'_>, msg: &Inbound) -> Vec<Reply> {
        let result = edit_target(cmd, msg, "deadline").and_then(|(task_id, deadline)| {
            let mut task = self.task_for_flow(task_id)?;
            task.deadline = Some(deadline.to_string());
            self.tasks().update_task(&task)?;
            Ok(vec![Reply::text(format!(
                "Task {} deadline set to {} successfully",
                task.title, deadline
            ))])
        });
        respond("set task deadline", result)
    }

    pub(super) fn set_status(&self, cmd: &Command<'_>, msg: &Inbound) -> Vec<Reply> {
        let result = edit_target(cmd, msg, "status").and_then(|(task_id, value)| {
            let status: TaskStatus = value.parse()?;
            let mut task = self.task_for_flow(task_id)?;
            task.status = status;
            self.tasks().update_task(&task)?;
            Ok(vec![Reply::text(format!(
                "Task {} status set to {} successfully",
                task.title, status
            ))])
        });
        respond("set task status", result)
    }

    /// Reply to a message to pin its text, `/pin text` to pin text, bare to show.
    pub(super) fn pin(&self, cmd: &Command<'_>, msg: &Inbound) -> Vec<Reply> {
        let new_note = msg
            .reply_to
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .or(Some(cmd.args).filter(|a| !a.is_empty()));

        match new_note {
            Some(note) => {
                let result = self
                    .notes()
                    .set(msg.chat_id, note)
                    .map(|_| vec![Reply::text("Update pin message successfully")]);
                respond("pin message", result)
            }
            None => {
                let result = self.notes().get(msg.chat_id).map(|note| match note {
                    Some(note) => vec![Reply::text(format!("Pinned message: {}", note))],
                    None => vec![Reply::text("There is no pinned message yet")],
                });
                respond("show pin message", result)
            }
        }
    }
}

/// Task id and new value of an edit command: from the replied-to task message
/// plus the arguments, or from `<id> <value>` arguments.
fn edit_target<'a>(cmd: &Command<'a>, msg: &Inbound, field: &str) -> Result<(i64, &'a str)> {
    let (task_id, value) = match &msg.reply_to {
        Some(replied) => (parse_task_ref(replied)?, cmd.args),
        None if !cmd.args.is_empty() => split_task_args(cmd.args)?,
        None => {
            return Err(Error::Validation(format!(
                "You should reply to a task to set {}",
                field
            )))
        }
    };
    if value.is_empty() {
        return Err(Error::Validation(format!("Usage: /set_{} <{}>", field, field)));
    }
    Ok((task_id, value))
}

fn render_task_block(title: &str, tasks: &[Task]) -> Vec<Reply> {
    if tasks.is_empty() {
        return vec![Reply::text(format!("{}: no tasks.", title))];
    }
    let mut text = format!("{}:\n", title);
    for task in tasks {
        text.push_str(&task.summary());
        text.push('\n');
    }
    vec![Reply::text(text.trim_end())]
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::core::session::SessionStore;
    use crate::store::EntityStore;

    const CHAT: i64 = 42;

    fn setup() -> (Router, i64) {
        let router = Router::new(
            Arc::new(EntityStore::in_memory().unwrap()),
            Arc::new(SessionStore::new()),
        );
        let project = router.projects().create_project("Launch", "@alice").unwrap();
        (router, project.id)
    }

    fn msg(text: &str, chat_id: i64) -> Inbound {
        Inbound {
            chat_id,
            sender: Sender {
                id: 9,
                username: Some("bob".to_string()),
                display_name: "Bob".to_string(),
            },
            text: text.to_string(),
            reply_to: None,
            mentions: Vec::new(),
        }
    }

    fn bodies(replies: &[Reply]) -> Vec<&str> {
        replies.iter().map(Reply::body).collect()
    }

    #[tokio::test]
    async fn test_list_tasks_offers_filters() {
        let (router, _) = setup();
        let replies = router.handle_message(&msg("/list_tasks", CHAT)).await;
        match &replies[..] {
            [Reply::Choices { choices, .. }] => {
                let ids: Vec<_> = choices.iter().map(|c| c.id.as_str()).collect();
                assert_eq!(ids, vec!["list:all", "list:init", "list:doing", "list:done"]);
            }
            other => panic!("expected choices, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_list_tasks_by_status() {
        let (router, project_id) = setup();
        let tasks = router.tasks();
        let mut a = tasks.create_task("a", "", None, project_id).unwrap();
        tasks.create_task("b", "", None, project_id).unwrap();
        a.status = TaskStatus::Doing;
        tasks.update_task(&a).unwrap();

        let replies = router.handle_message(&msg("/list_tasks doing", CHAT)).await;
        assert_eq!(bodies(&replies), vec!["Task list (Doing):", "1 a [doing]"]);

        let replies = router.handle_message(&msg("/list_by_status done", CHAT)).await;
        assert_eq!(bodies(&replies), vec!["There is no done task to show."]);

        let replies = router.handle_message(&msg("/list_tasks all", CHAT)).await;
        assert_eq!(replies.len(), 3);
    }

    #[tokio::test]
    async fn test_list_tasks_twice_is_stable() {
        let (router, project_id) = setup();
        router.tasks().create_task("a", "", None, project_id).unwrap();
        let first = router.handle_message(&msg("/list_tasks all", CHAT)).await;
        let second = router.handle_message(&msg("/list_tasks all", CHAT)).await;
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_list_projects() {
        let (router, _) = setup();
        let replies = router.handle_message(&msg("/list_projects", CHAT)).await;
        assert_eq!(bodies(&replies), vec!["Project list:\n1 Launch created by @alice"]);
    }

    #[tokio::test]
    async fn test_mine_and_by_assignee() {
        let (router, project_id) = setup();
        router.tasks().create_task("mine", "@bob", Some("Friday"), project_id).unwrap();
        router.tasks().create_task("theirs", "@carol", None, project_id).unwrap();

        let replies = router.handle_message(&msg("/mine", CHAT)).await;
        assert_eq!(bodies(&replies), vec!["Your task list:\n1 mine - @bob - Friday [init]"]);

        let replies = router.handle_message(&msg("/list_by_assignee carol", CHAT)).await;
        assert!(replies[0].body().contains("theirs"));

        let replies = router.handle_message(&msg("/list_by_assignee", CHAT)).await;
        assert!(replies[0].body().contains("Usage"));
    }

    #[tokio::test]
    async fn test_mine_ignores_handle_case() {
        let (router, project_id) = setup();
        let task = router.tasks().create_task("Fix", "", None, project_id).unwrap();
        router.handle_message(&msg(&format!("/assign {} @Bob", task.id), CHAT)).await;
        assert_eq!(router.tasks().task_by_id(task.id).unwrap().assignee, "@bob");

        let mut m = msg("/mine", CHAT);
        m.sender.username = Some("BOB".to_string());
        let replies = router.handle_message(&m).await;
        assert!(replies[0].body().contains("1 Fix - @bob [init]"));

        let replies = router.handle_message(&msg("/list_by_assignee @BoB", CHAT)).await;
        assert!(replies[0].body().contains("Fix"));
    }

    #[tokio::test]
    async fn test_mine_without_username() {
        let (router, _) = setup();
        let mut m = msg("/mine", CHAT);
        m.sender.username = None;
        let replies = router.handle_message(&m).await;
        assert!(replies[0].body().starts_with("Cannot get your task list"));
    }

    #[tokio::test]
    async fn test_set_deadline_and_status_by_reply() {
        let (router, project_id) = setup();
        let task = router.tasks().create_task("Fix", "", None, project_id).unwrap();

        let mut m = msg("/set_deadline next monday", CHAT);
        m.reply_to = Some(task.summary());
        let replies = router.handle_message(&m).await;
        assert!(replies[0].body().contains("next monday"));

        let mut m = msg("/set_status doing", CHAT);
        m.reply_to = Some(task.summary());
        router.handle_message(&m).await;

        let stored = router.tasks().task_by_id(task.id).unwrap();
        assert_eq!(stored.deadline.as_deref(), Some("next monday"));
        assert_eq!(stored.status, TaskStatus::Doing);
    }

    #[tokio::test]
    async fn test_set_status_inline_and_errors() {
        let (router, project_id) = setup();
        let task = router.tasks().create_task("Fix", "", None, project_id).unwrap();

        router.handle_message(&msg(&format!("/set_status {} done", task.id), CHAT)).await;
        assert_eq!(router.tasks().task_by_id(task.id).unwrap().status, TaskStatus::Done);

        let replies = router.handle_message(&msg(&format!("/set_status {} later", task.id), CHAT)).await;
        assert!(replies[0].body().starts_with("Cannot set task status"));

        let replies = router.handle_message(&msg("/set_status", CHAT)).await;
        assert!(replies[0].body().contains("reply to a task"));

        let replies = router.handle_message(&msg("/set_deadline 77 friday", CHAT)).await;
        assert!(replies[0].body().contains("stale reference"));
    }

    #[tokio::test]
    async fn test_pin_per_chat() {
        let (router, _) = setup();
        let replies = router.handle_message(&msg("/pin", CHAT)).await;
        assert_eq!(bodies(&replies), vec!["There is no pinned message yet"]);

        let mut m = msg("/pin", CHAT);
        m.reply_to = Some("Standup moved to 11".to_string());
        router.handle_message(&m).await;
        router.handle_message(&msg("/pin Other chat note", CHAT + 1)).await;

        let replies = router.handle_message(&msg("/pin", CHAT)).await;
        assert_eq!(bodies(&replies), vec!["Pinned message: Standup moved to 11"]);
        let replies = router.handle_message(&msg("/pin", CHAT + 1)).await;
        assert_eq!(bodies(&replies), vec!["Pinned message: Other chat note"]);
    }

    #[tokio::test]
    async fn test_current_project_without_binding() {
        let (router, _) = setup();
        let replies = router.handle_message(&msg("/current_project", CHAT)).await;
        assert!(replies[0].body().contains("no default project"));
    }

    #[tokio::test]
    async fn test_help_and_unknown() {
        let (router, _) = setup();
        let replies = router.handle_message(&msg("/help", CHAT)).await;
        assert!(replies[0].body().contains("/create_task"));
        let replies = router.handle_message(&msg("/frobnicate", CHAT)).await;
        assert!(replies[0].body().starts_with("Unknown command"));
    }
}
