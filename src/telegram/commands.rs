//! Bot command menu registered with Telegram.

use teloxide::types::BotCommand;

/// Commands shown in the Telegram command menu, in display order.
pub const MENU: &[(&str, &str)] = &[
    ("help", "Show help"),
    ("create_project", "Create a project"),
    ("list_projects", "List projects"),
    ("set_default_project", "Choose this chat's project"),
    ("current_project", "Show this chat's project"),
    ("create_task", "Create a task"),
    ("list_tasks", "List tasks"),
    ("list_by_status", "List tasks with a status"),
    ("list_by_assignee", "List tasks of a user"),
    ("mine", "List your tasks"),
    ("assign", "Assign a task"),
    ("set_deadline", "Set a task deadline"),
    ("set_status", "Set a task status"),
    ("pin", "Show or set the pinned note"),
    ("cancel", "Cancel the current step"),
];

pub fn bot_commands() -> Vec<BotCommand> {
    MENU.iter()
        .map(|(name, description)| BotCommand::new(*name, *description))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_menu_commands_are_documented() {
        for (name, _) in MENU {
            assert!(
                crate::core::commands::HELP_TEXT.contains(&format!("/{}", name)),
                "/{} missing from help",
                name
            );
        }
        assert_eq!(bot_commands().len(), MENU.len());
    }
}
