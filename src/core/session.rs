//! Per-(user, chat) conversational state.
//!
//! A session records which multi-step flow a user has started in a chat and
//! any partial input it carries. Sessions are transient: they live in memory
//! for the lifetime of the process and are never persisted.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

/// Identifies a session: one user inside one chat.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionKey {
    pub user_id: u64,
    pub chat_id: i64,
}

impl SessionKey {
    pub fn new(user_id: u64, chat_id: i64) -> Self {
        Self { user_id, chat_id }
    }
}

impl fmt::Display for SessionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}", self.user_id, self.chat_id)
    }
}

/// Why a project list was offered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectionPurpose {
    /// Continue into task creation once a project is chosen.
    CreateTask,
    /// Only bind the chat's default project.
    SetDefault,
}

/// Flow in progress for a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionState {
    /// No flow in progress.
    #[default]
    Idle,
    AwaitingProjectName,
    AwaitingTaskTitle,
    AwaitingProjectSelection { purpose: SelectionPurpose },
    AwaitingAssignTarget { task_id: i64 },
}

impl SessionState {
    pub fn is_idle(&self) -> bool {
        matches!(self, SessionState::Idle)
    }

    /// Consume the current state, leaving the session idle.
    pub fn take(&mut self) -> SessionState {
        std::mem::take(self)
    }
}

/// Exclusive access to one session for the duration of an update.
pub type SessionGuard = OwnedMutexGuard<SessionState>;

/// Concurrent map of sessions with one lock per key.
///
/// The outer mutex only guards slot lookup and is never held across an
/// await; the per-key async mutex is held while an update for that key is
/// handled, so updates for the same (user, chat) run one at a time while
/// other keys proceed independently. Only sessions with a flow in progress
/// keep a slot once their update is released.
#[derive(Default)]
pub struct SessionStore {
    slots: Mutex<HashMap<SessionKey, Arc<AsyncMutex<SessionState>>>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn slots(&self) -> MutexGuard<'_, HashMap<SessionKey, Arc<AsyncMutex<SessionState>>>> {
        self.slots.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Wait for exclusive access to the session of `key`.
    pub async fn lock(&self, key: SessionKey) -> SessionGuard {
        let slot = self.slots().entry(key).or_default().clone();
        slot.lock_owned().await
    }

    /// End an update. An idle session nobody else is waiting on is dropped.
    pub fn release(&self, key: SessionKey, guard: SessionGuard) {
        let idle = guard.is_idle();
        drop(guard);
        if !idle {
            return;
        }

        // Clones are only taken under this lock, so a count of one means no
        // update for `key` is queued.
        let mut slots = self.slots();
        let unused = slots.get(&key).is_some_and(|slot| {
            Arc::strong_count(slot) == 1 && slot.try_lock().is_ok_and(|state| state.is_idle())
        });
        if unused {
            slots.remove(&key);
        }
    }

    /// Snapshot of the session state, waiting for any in-flight update.
    pub async fn peek(&self, key: SessionKey) -> SessionState {
        let slot = self.slots().get(&key).cloned();
        match slot {
            Some(slot) => *slot.lock().await,
            None => SessionState::Idle,
        }
    }

    /// Number of sessions currently holding a slot.
    pub fn len(&self) -> usize {
        self.slots().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
