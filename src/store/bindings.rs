//! Per-chat bindings maintained by upsert: default project and pinned note.

use crate::error::{Error, Result};

use super::entity::EntityStore;
use super::records::{DefaultProjectBinding, PinnedNote, Project};

pub struct DefaultProjectResolver<'a> {
    store: &'a EntityStore,
}

impl<'a> DefaultProjectResolver<'a> {
    pub fn new(store: &'a EntityStore) -> Self {
        Self { store }
    }

    pub fn binding(&self, chat_id: i64) -> Result<Option<DefaultProjectBinding>> {
        let found: Vec<DefaultProjectBinding> = self.store.find_by_field("chat_id", chat_id)?;
        Ok(found.into_iter().next())
    }

    /// Default project of the chat. No binding is `None`; a binding to a
    /// project that no longer resolves is a `StaleReference`.
    pub fn get(&self, chat_id: i64) -> Result<Option<Project>> {
        let Some(binding) = self.binding(chat_id)? else {
            return Ok(None);
        };
        match self.store.get_by_id::<Project>(binding.project_id) {
            Ok(project) => Ok(Some(project)),
            Err(Error::NotFound(_)) => Err(Error::StaleReference(format!(
                "default project {} of this chat no longer exists",
                binding.project_id
            ))),
            Err(e) => Err(e),
        }
    }

    pub fn set(&self, chat_id: i64, project_id: i64) -> Result<DefaultProjectBinding> {
        let mut binding = DefaultProjectBinding {
            id: 0,
            chat_id,
            project_id,
        };
        self.store.upsert_by("chat_id", &mut binding)?;
        tracing::info!("Chat {} default project set to {}", chat_id, project_id);
        Ok(binding)
    }
}

pub struct PinnedNoteStore<'a> {
    store: &'a EntityStore,
}

impl<'a> PinnedNoteStore<'a> {
    pub fn new(store: &'a EntityStore) -> Self {
        Self { store }
    }

    pub fn get(&self, chat_id: i64) -> Result<Option<String>> {
        let found: Vec<PinnedNote> = self.store.find_by_field("chat_id", chat_id)?;
        Ok(found.into_iter().next().map(|note| note.text))
    }

    pub fn set(&self, chat_id: i64, text: &str) -> Result<()> {
        let mut note = PinnedNote {
            id: 0,
            chat_id,
            text: text.to_string(),
        };
        self.store.upsert_by("chat_id", &mut note)?;
        tracing::info!("Chat {} pinned note updated", chat_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::repo::ProjectRepository;

    #[test]
    fn test_default_project_absent_is_none() {
        let store = EntityStore::in_memory().unwrap();
        assert!(DefaultProjectResolver::new(&store).get(1).unwrap().is_none());
    }

    #[test]
    fn test_default_project_rebind_updates_in_place() {
        let store = EntityStore::in_memory().unwrap();
        let projects = ProjectRepository::new(&store);
        let a = projects.create_project("A", "@x").unwrap();
        let b = projects.create_project("B", "@x").unwrap();

        let resolver = DefaultProjectResolver::new(&store);
        let first = resolver.set(10, a.id).unwrap();
        let second = resolver.set(10, b.id).unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(resolver.get(10).unwrap().unwrap().title, "B");
        assert_eq!(store.count::<DefaultProjectBinding>().unwrap(), 1);
    }

    #[test]
    fn test_concurrent_binds_keep_one_binding() {
        let store = EntityStore::in_memory().unwrap();
        let projects = ProjectRepository::new(&store);
        let ids: Vec<i64> = (0..4)
            .map(|i| projects.create_project(&format!("P{}", i), "@x").unwrap().id)
            .collect();

        std::thread::scope(|s| {
            for round in 0..8 {
                let store = &store;
                let project_id = ids[round % ids.len()];
                s.spawn(move || {
                    DefaultProjectResolver::new(store).set(55, project_id).unwrap();
                });
            }
        });

        let bindings: Vec<DefaultProjectBinding> = store.find_by_field("chat_id", 55i64).unwrap();
        assert_eq!(bindings.len(), 1);
        assert!(ids.contains(&bindings[0].project_id));
    }

    #[test]
    fn test_pinned_notes_are_per_chat() {
        let store = EntityStore::in_memory().unwrap();
        let notes = PinnedNoteStore::new(&store);

        notes.set(1, "standup at 10").unwrap();
        notes.set(2, "release friday").unwrap();
        notes.set(1, "standup at 11").unwrap();

        assert_eq!(notes.get(1).unwrap().as_deref(), Some("standup at 11"));
        assert_eq!(notes.get(2).unwrap().as_deref(), Some("release friday"));
        assert!(notes.get(3).unwrap().is_none());
        assert_eq!(store.count::<PinnedNote>().unwrap(), 2);
    }

    #[test]
    fn test_concurrent_pins_keep_one_note() {
        let store = EntityStore::in_memory().unwrap();
        std::thread::scope(|s| {
            for i in 0..8 {
                let store = &store;
                s.spawn(move || {
                    PinnedNoteStore::new(store).set(9, &format!("note {}", i)).unwrap();
                });
            }
        });
        assert_eq!(store.count::<PinnedNote>().unwrap(), 1);
        assert!(PinnedNoteStore::new(&store).get(9).unwrap().is_some());
    }
}
