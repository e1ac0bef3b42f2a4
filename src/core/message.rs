//! Transport-neutral inbound updates and outbound replies.

use std::fmt;
use std::str::FromStr;

use crate::error::Error;
use crate::store::TaskStatus;

use super::session::SessionKey;

/// Author of an inbound update.
#[derive(Debug, Clone, PartialEq)]
pub struct Sender {
    pub id: u64,
    /// Chat username without the leading `@`.
    pub username: Option<String>,
    pub display_name: String,
}

impl Sender {
    /// Lowercased `@username`, if the user has one.
    pub fn handle(&self) -> Option<String> {
        self.username.as_ref().map(|u| format!("@{}", u.to_lowercase()))
    }

    /// Handle when available, otherwise the display name.
    pub fn label(&self) -> String {
        self.handle().unwrap_or_else(|| self.display_name.clone())
    }
}

/// A text message or command delivered by the transport.
#[derive(Debug, Clone)]
pub struct Inbound {
    pub chat_id: i64,
    pub sender: Sender,
    pub text: String,
    /// Text of the message this one replies to.
    pub reply_to: Option<String>,
    /// Users mentioned through transport entities, in message order, as `@handle`
    /// (or a display name for users without a username).
    pub mentions: Vec<String>,
}

impl Inbound {
    pub fn key(&self) -> SessionKey {
        SessionKey::new(self.sender.id, self.chat_id)
    }
}

/// A user picked one of the choices attached to an earlier reply.
#[derive(Debug, Clone)]
pub struct ChoiceSelected {
    pub chat_id: i64,
    pub sender: Sender,
    pub choice_id: String,
}

impl ChoiceSelected {
    pub fn key(&self) -> SessionKey {
        SessionKey::new(self.sender.id, self.chat_id)
    }
}

/// Most options offered in one reply. Telegram caps inline keyboards at 100 buttons.
pub const MAX_CHOICES: usize = 30;

/// One selectable option: opaque id plus the label shown to the user.
#[derive(Debug, Clone, PartialEq)]
pub struct Choice {
    pub id: String,
    pub label: String,
}

impl Choice {
    pub fn new(action: ChoiceAction, label: impl Into<String>) -> Self {
        Self {
            id: action.to_string(),
            label: label.into(),
        }
    }
}

/// Outbound intent; the transport adapter decides how to render it.
#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    Text(String),
    Choices { text: String, choices: Vec<Choice> },
}

impl Reply {
    pub fn text(text: impl Into<String>) -> Self {
        Reply::Text(text.into())
    }

    pub fn body(&self) -> &str {
        match self {
            Reply::Text(text) => text,
            Reply::Choices { text, .. } => text,
        }
    }
}

/// Task listing filter offered by `/list_tasks`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListFilter {
    All,
    Status(TaskStatus),
}

impl ListFilter {
    pub fn label(&self) -> &'static str {
        match self {
            ListFilter::All => "All",
            ListFilter::Status(status) => status.label(),
        }
    }
}

/// What a choice does when selected. Encoded as the choice's opaque id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChoiceAction {
    Project(i64),
    List(ListFilter),
    Assign(i64),
}

impl fmt::Display for ChoiceAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChoiceAction::Project(id) => write!(f, "project:{}", id),
            ChoiceAction::List(ListFilter::All) => write!(f, "list:all"),
            ChoiceAction::List(ListFilter::Status(status)) => write!(f, "list:{}", status),
            ChoiceAction::Assign(id) => write!(f, "assign:{}", id),
        }
    }
}

impl FromStr for ChoiceAction {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || Error::Validation(format!("Unknown choice '{}'", s));
        let (kind, value) = s.split_once(':').ok_or_else(invalid)?;
        match kind {
            "project" => value.parse().map(ChoiceAction::Project).map_err(|_| invalid()),
            "assign" => value.parse().map(ChoiceAction::Assign).map_err(|_| invalid()),
            "list" if value == "all" => Ok(ChoiceAction::List(ListFilter::All)),
            "list" => value
                .parse()
                .map(|status| ChoiceAction::List(ListFilter::Status(status)))
                .map_err(|_| invalid()),
            _ => Err(invalid()),
        }
    }
}
