//! Persistence: a generic SQLite entity store and typed facades over it.

pub mod bindings;
pub mod entity;
pub mod records;
pub mod repo;

pub use bindings::{DefaultProjectResolver, PinnedNoteStore};
pub use entity::{Entity, EntityStore};
pub use records::{DefaultProjectBinding, PinnedNote, Project, Task, TaskStatus};
pub use repo::{NewTask, ProjectRepository, TaskRepository};
