//! Generic SQLite entity store.
//!
//! Every record type implements [`Entity`], which describes its table, its
//! ordered columns and which of those columns may be used for equality
//! lookups. The store builds all SQL from those constants, so field names
//! never come from user input.

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use rusqlite::types::{ToSql, Value};
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};

use crate::error::{Error, Result};

use super::records;

/// A record type persisted in its own table with an auto-increment `id`.
pub trait Entity: Sized {
    /// Table name.
    const TABLE: &'static str;

    /// Human readable name used in error messages.
    const KIND: &'static str;

    /// Columns other than `id`, in the order of [`Entity::values`].
    const COLUMNS: &'static [&'static str];

    /// Columns accepted by [`EntityStore::find_by_field`].
    const INDEXED: &'static [&'static str];

    /// Columns carrying a UNIQUE constraint, accepted by [`EntityStore::upsert_by`].
    const UNIQUE: &'static [&'static str] = &[];

    /// DDL creating the table and its indexes.
    const SCHEMA: &'static str;

    fn id(&self) -> i64;

    fn set_id(&mut self, id: i64);

    /// Decode a row selected as `id, COLUMNS...`.
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self>;

    /// Column values in `COLUMNS` order.
    fn values(&self) -> Vec<Value>;
}

/// Durable store shared by every repository.
///
/// A single connection sits behind a mutex; each statement autocommits, so a
/// mutating call has reached the database file before it returns.
pub struct EntityStore {
    conn: Mutex<Connection>,
}

impl EntityStore {
    /// Open (or create) the database file at `path`.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(path)?;
        let store = Self::init(conn)?;
        tracing::info!("Entity store opened at {}", path.display());
        Ok(store)
    }

    /// Store backed by a private in-memory database.
    pub fn in_memory() -> Result<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self> {
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        for schema in records::SCHEMAS {
            conn.execute_batch(schema)?;
        }
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| Error::Other("entity store lock poisoned".to_string()))
    }

    /// Insert a new record, assigning and returning its id.
    pub fn insert<E: Entity>(&self, record: &mut E) -> Result<i64> {
        let sql = format!(
            "INSERT INTO {} ({}) VALUES ({})",
            E::TABLE,
            E::COLUMNS.join(", "),
            placeholders(E::COLUMNS.len())
        );
        let conn = self.conn()?;
        conn.execute(&sql, params_from_iter(record.values()))?;
        let id = conn.last_insert_rowid();
        record.set_id(id);
        Ok(id)
    }

    /// Overwrite the record with the same id.
    pub fn update<E: Entity>(&self, record: &E) -> Result<()> {
        let assignments = E::COLUMNS
            .iter()
            .enumerate()
            .map(|(i, col)| format!("{} = ?{}", col, i + 1))
            .collect::<Vec<_>>()
            .join(", ");
        let sql = format!(
            "UPDATE {} SET {} WHERE id = ?{}",
            E::TABLE,
            assignments,
            E::COLUMNS.len() + 1
        );
        let mut values = record.values();
        values.push(Value::Integer(record.id()));

        let changed = self.conn()?.execute(&sql, params_from_iter(values))?;
        if changed == 0 {
            return Err(Error::NotFound(format!("{} {}", E::KIND, record.id())));
        }
        Ok(())
    }

    pub fn get_by_id<E: Entity>(&self, id: i64) -> Result<E> {
        let sql = format!("{} WHERE id = ?1", select_sql::<E>());
        self.conn()?
            .query_row(&sql, params![id], |row| E::from_row(row))
            .optional()?
            .ok_or_else(|| Error::NotFound(format!("{} {}", E::KIND, id)))
    }

    /// All records ordered by id.
    pub fn list_all<E: Entity>(&self) -> Result<Vec<E>> {
        let sql = format!("{} ORDER BY id", select_sql::<E>());
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map([], |row| E::from_row(row))?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    /// Exact-match lookup on an indexed column, ordered by id.
    pub fn find_by_field<E: Entity, V: ToSql>(&self, field: &str, value: V) -> Result<Vec<E>> {
        if !E::INDEXED.contains(&field) {
            return Err(Error::Validation(format!(
                "{} is not an indexed field of {}",
                field,
                E::TABLE
            )));
        }
        let sql = format!("{} WHERE {} = ?1 ORDER BY id", select_sql::<E>(), field);
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map(params![value], |row| E::from_row(row))?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    /// Insert `record`, or update the existing row holding the same value in
    /// the unique column `field`. One statement, so concurrent callers can
    /// never create two rows for the same key.
    pub fn upsert_by<E: Entity>(&self, field: &str, record: &mut E) -> Result<i64> {
        if !E::UNIQUE.contains(&field) {
            return Err(Error::Validation(format!(
                "{} is not a unique field of {}",
                field,
                E::TABLE
            )));
        }
        let updates = E::COLUMNS
            .iter()
            .filter(|col| **col != field)
            .map(|col| format!("{col} = excluded.{col}"))
            .collect::<Vec<_>>()
            .join(", ");
        let sql = format!(
            "INSERT INTO {} ({}) VALUES ({}) ON CONFLICT({}) DO UPDATE SET {} RETURNING id",
            E::TABLE,
            E::COLUMNS.join(", "),
            placeholders(E::COLUMNS.len()),
            field,
            updates
        );
        let id: i64 = self
            .conn()?
            .query_row(&sql, params_from_iter(record.values()), |row| row.get(0))?;
        record.set_id(id);
        Ok(id)
    }

    pub fn count<E: Entity>(&self) -> Result<i64> {
        let sql = format!("SELECT COUNT(*) FROM {}", E::TABLE);
        Ok(self.conn()?.query_row(&sql, [], |row| row.get(0))?)
    }
}

fn select_sql<E: Entity>() -> String {
    format!("SELECT id, {} FROM {}", E::COLUMNS.join(", "), E::TABLE)
}

fn placeholders(n: usize) -> String {
    (1..=n)
        .map(|i| format!("?{}", i))
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::records::{PinnedNote, Project, Task, TaskStatus};
    use tempfile::TempDir;

    fn project(title: &str) -> Project {
        Project {
            id: 0,
            title: title.to_string(),
            creator: "@alice".to_string(),
            status: String::new(),
        }
    }

    fn task(project_id: i64, title: &str, status: TaskStatus) -> Task {
        Task {
            id: 0,
            project_id,
            title: title.to_string(),
            deadline: None,
            status,
            assignee: String::new(),
            description: None,
        }
    }

    #[test]
    fn test_insert_assigns_monotonic_ids() {
        let store = EntityStore::in_memory().unwrap();
        let mut a = project("Alpha");
        let mut b = project("Beta");
        let id_a = store.insert(&mut a).unwrap();
        let id_b = store.insert(&mut b).unwrap();

        assert!(id_b > id_a);
        assert_eq!(a.id, id_a);
        assert_eq!(store.get_by_id::<Project>(id_b).unwrap().title, "Beta");
    }

    #[test]
    fn test_missing_id_is_not_found() {
        let store = EntityStore::in_memory().unwrap();
        assert!(matches!(store.get_by_id::<Task>(42), Err(Error::NotFound(_))));

        let mut ghost = task(1, "ghost", TaskStatus::Init);
        ghost.id = 42;
        assert!(matches!(store.update(&ghost), Err(Error::NotFound(_))));
    }

    #[test]
    fn test_find_by_field_on_empty_store() {
        let store = EntityStore::in_memory().unwrap();
        let found: Vec<Task> = store.find_by_field("status", "doing").unwrap();
        assert!(found.is_empty());
    }

    #[test]
    fn test_find_by_field_requires_index() {
        let store = EntityStore::in_memory().unwrap();
        let err = store.find_by_field::<Task, _>("title", "x").unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }

    #[test]
    fn test_find_by_field_exact_match() {
        let store = EntityStore::in_memory().unwrap();
        let mut p = project("Launch");
        let pid = store.insert(&mut p).unwrap();
        store.insert(&mut task(pid, "one", TaskStatus::Doing)).unwrap();
        store.insert(&mut task(pid, "two", TaskStatus::Done)).unwrap();
        store.insert(&mut task(pid, "three", TaskStatus::Doing)).unwrap();

        let doing: Vec<Task> = store.find_by_field("status", "doing").unwrap();
        let titles: Vec<_> = doing.iter().map(|t| t.title.as_str()).collect();
        assert_eq!(titles, vec!["one", "three"]);
    }

    #[test]
    fn test_list_all_is_stable() {
        let store = EntityStore::in_memory().unwrap();
        store.insert(&mut project("A")).unwrap();
        store.insert(&mut project("B")).unwrap();

        let first: Vec<Project> = store.list_all().unwrap();
        let second: Vec<Project> = store.list_all().unwrap();
        assert_eq!(first, second);
        assert_eq!(store.count::<Project>().unwrap(), 2);
    }

    #[test]
    fn test_task_requires_existing_project() {
        let store = EntityStore::in_memory().unwrap();
        let err = store.insert(&mut task(99, "orphan", TaskStatus::Init)).unwrap_err();
        assert!(matches!(err, Error::Storage(_)));
    }

    #[test]
    fn test_upsert_by_keeps_one_row() {
        let store = EntityStore::in_memory().unwrap();
        let mut first = PinnedNote {
            id: 0,
            chat_id: 7,
            text: "first".to_string(),
        };
        let id1 = store.upsert_by("chat_id", &mut first).unwrap();

        let mut second = PinnedNote {
            id: 0,
            chat_id: 7,
            text: "second".to_string(),
        };
        let id2 = store.upsert_by("chat_id", &mut second).unwrap();

        assert_eq!(id1, id2);
        let notes: Vec<PinnedNote> = store.list_all().unwrap();
        assert_eq!(notes.len(), 1);
        assert_eq!(notes[0].text, "second");
    }

    #[test]
    fn test_upsert_by_rejects_non_unique_field() {
        let store = EntityStore::in_memory().unwrap();
        let mut note = PinnedNote {
            id: 0,
            chat_id: 7,
            text: "x".to_string(),
        };
        assert!(matches!(
            store.upsert_by("text", &mut note),
            Err(Error::Validation(_))
        ));
    }

    #[test]
    fn test_writes_survive_reopen() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("data").join("tasks.db");

        let id = {
            let store = EntityStore::open(&path).unwrap();
            store.insert(&mut project("Durable")).unwrap()
        };

        let store = EntityStore::open(&path).unwrap();
        assert_eq!(store.get_by_id::<Project>(id).unwrap().title, "Durable");
    }
}
