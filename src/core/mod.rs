//! Core module - sessions, parsing and command routing.
//!
//! This module contains the transport-neutral heart of taskbot:
//! - Per-(user, chat) session state for multi-step flows
//! - Parsing of commands and structured task lines
//! - The router turning inbound updates into replies

pub mod commands;
pub mod message;
pub mod parse;
pub mod router;
pub mod session;

pub use message::{
    Choice, ChoiceAction, ChoiceSelected, Inbound, ListFilter, Reply, Sender, MAX_CHOICES,
};
pub use router::Router;
pub use session::{SelectionPurpose, SessionKey, SessionState, SessionStore};
