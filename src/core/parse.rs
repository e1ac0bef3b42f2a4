//! Parsing of commands and structured free-text input.

use std::sync::OnceLock;

use regex::Regex;

use crate::error::{Error, Result};

/// Field separator of a structured task line.
pub const TASK_FIELD_DELIMITER: char = '-';

/// Prompt describing the structured task line.
pub const TASK_LINE_FORMAT: &str =
    "Task Title (required) - @username (optional) - Deadline (optional) - Description (optional)";

/// A `/command` and its trailing arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command<'a> {
    /// Lowercased name without the slash or a `@botname` suffix.
    pub name: String,
    /// Everything after the command word, trimmed.
    pub args: &'a str,
}

/// Parse `/name@bot args...`. Returns `None` for plain text.
pub fn parse_command(text: &str) -> Option<Command<'_>> {
    let text = text.trim_start();
    let rest = text.strip_prefix('/')?;
    let (word, args) = match rest.find(char::is_whitespace) {
        Some(idx) => (&rest[..idx], rest[idx..].trim()),
        None => (rest, ""),
    };
    let name = word.split('@').next().unwrap_or("");
    if name.is_empty() {
        return None;
    }
    Some(Command {
        name: name.to_lowercase(),
        args,
    })
}

/// Fields of a structured task line.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TaskLine {
    pub title: String,
    pub assignee: String,
    pub deadline: Option<String>,
    pub description: Option<String>,
}

/// Split `title - @assignee - deadline - description` into its fields.
///
/// Fields are positional and may be left empty. The description is the
/// remainder of the line and may itself contain the delimiter. A mention
/// entity supplied by the transport is used for the assignee only when it
/// sits in the assignee slot; mentions in other fields are plain text.
pub fn parse_task_line(text: &str, mentions: &[String]) -> Result<TaskLine> {
    let fields: Vec<&str> = text.trim().splitn(4, TASK_FIELD_DELIMITER).map(str::trim).collect();

    let title = fields.first().copied().unwrap_or("");
    if title.is_empty() {
        return Err(Error::validation("Task title is required"));
    }

    let assignee = match fields.get(1) {
        Some(slot) if !slot.is_empty() => match mention_in(slot, mentions) {
            Some(mention) => mention,
            None => normalize_handle(slot)?,
        },
        _ => String::new(),
    };

    let non_empty = |idx: usize| {
        fields
            .get(idx)
            .filter(|s| !s.is_empty())
            .map(|s| s.to_string())
    };

    Ok(TaskLine {
        title: title.to_string(),
        assignee,
        deadline: non_empty(2),
        description: non_empty(3),
    })
}

/// First mention whose text appears in `slot`, in canonical form.
fn mention_in(slot: &str, mentions: &[String]) -> Option<String> {
    let slot = slot.to_lowercase();
    mentions
        .iter()
        .find(|m| !m.is_empty() && slot.contains(&m.to_lowercase()))
        .map(|m| canonical_mention(m))
}

/// `@handles` are case-insensitive and stored lowercased; display names of
/// users without a username are kept as given.
pub fn canonical_mention(mention: &str) -> String {
    let mention = mention.trim();
    if mention.starts_with('@') {
        mention.to_lowercase()
    } else {
        mention.to_string()
    }
}

fn handle_regex() -> &'static Regex {
    static HANDLE: OnceLock<Regex> = OnceLock::new();
    HANDLE.get_or_init(|| Regex::new(r"^@?([A-Za-z0-9_]{1,64})$").expect("valid handle regex"))
}

/// Turn `bob`, `@bob` or `@Bob` into `@bob`.
pub fn normalize_handle(token: &str) -> Result<String> {
    let token = token.trim();
    handle_regex()
        .captures(token)
        .and_then(|cap| cap.get(1))
        .map(|m| format!("@{}", m.as_str().to_lowercase()))
        .ok_or_else(|| Error::Validation(format!("'{}' is not a valid @handle", token)))
}

/// Assignment target of a message: the first mention entity, otherwise the
/// first word of `text` read as a handle.
pub fn target_handle(mentions: &[String], text: &str) -> Result<String> {
    if let Some(mention) = mentions.first() {
        return Ok(canonical_mention(mention));
    }
    match text.split_whitespace().next() {
        Some(token) => normalize_handle(token),
        None => Err(Error::validation("Mention a user or send a @handle to assign")),
    }
}

/// Task id from the leading token of a rendered task message.
pub fn parse_task_ref(text: &str) -> Result<i64> {
    text.split_whitespace()
        .next()
        .and_then(|token| token.trim_start_matches('#').parse::<i64>().ok())
        .ok_or_else(|| Error::validation("Cannot find a task id in that message"))
}

/// Split `<task id> <value...>` arguments.
pub fn split_task_args(args: &str) -> Result<(i64, &str)> {
    let args = args.trim();
    let (first, rest) = match args.find(char::is_whitespace) {
        Some(idx) => (&args[..idx], args[idx..].trim()),
        None => (args, ""),
    };
    let id = parse_task_ref(first)?;
    Ok((id, rest))
}
