//! Generic record collections.
//!
//! Each collection stores JSON records keyed by a string id. `put` is an
//! upsert (last write wins) and `delete` never cascades.

use rusqlite::{params, Connection, OptionalExtension};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::warn;

use crate::error::Result;
use crate::models::{AiProcess, ModelConfig, User};

/// The four independent collections.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Collection {
    Settings,
    Models,
    Users,
    Processes,
}

impl Collection {
    pub const ALL: [Collection; 4] = [
        Collection::Settings,
        Collection::Models,
        Collection::Users,
        Collection::Processes,
    ];

    /// Backing table name.
    pub fn table(&self) -> &'static str {
        match self {
            Collection::Settings => "settings",
            Collection::Models => "models",
            Collection::Users => "users",
            Collection::Processes => "processes",
        }
    }
}

/// A record stored in a collection under its own id.
pub trait Record: Serialize + DeserializeOwned {
    const COLLECTION: Collection;

    fn key(&self) -> &str;
}

impl Record for ModelConfig {
    const COLLECTION: Collection = Collection::Models;

    fn key(&self) -> &str {
        &self.id
    }
}

impl Record for User {
    const COLLECTION: Collection = Collection::Users;

    fn key(&self) -> &str {
        &self.id
    }
}

impl Record for AiProcess {
    const COLLECTION: Collection = Collection::Processes;

    fn key(&self) -> &str {
        &self.id
    }
}

/// Repository for collection operations.
pub struct CollectionRepo;

impl CollectionRepo {
    /// Get the raw JSON record for a key.
    pub fn get_raw(
        conn: &Connection,
        collection: Collection,
        key: &str,
    ) -> Result<Option<serde_json::Value>> {
        let sql = format!("SELECT record FROM {} WHERE id = ?1", collection.table());
        let record: Option<String> = conn
            .query_row(&sql, [key], |row| row.get(0))
            .optional()?;

        match record {
            Some(text) => Ok(Some(serde_json::from_str(&text)?)),
            None => Ok(None),
        }
    }

    /// Get every raw JSON record in a collection, in key order.
    pub fn get_all_raw(conn: &Connection, collection: Collection) -> Result<Vec<serde_json::Value>> {
        let sql = format!("SELECT id, record FROM {} ORDER BY id", collection.table());
        let mut stmt = conn.prepare(&sql)?;

        let rows = stmt
            .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)))?
            .filter_map(|r| r.ok())
            .filter_map(|(id, text)| match serde_json::from_str(&text) {
                Ok(value) => Some(value),
                Err(e) => {
                    warn!(table = collection.table(), %id, "Skipping unreadable record: {}", e);
                    None
                }
            })
            .collect();

        Ok(rows)
    }

    /// Insert or replace a raw JSON record.
    pub fn put_raw(
        conn: &Connection,
        collection: Collection,
        key: &str,
        record: &serde_json::Value,
    ) -> Result<()> {
        let text = serde_json::to_string(record)?;
        let sql = format!(
            "INSERT INTO {} (id, record) VALUES (?1, ?2)
             ON CONFLICT(id) DO UPDATE SET record = ?2, updated_at = datetime('now')",
            collection.table()
        );
        conn.execute(&sql, params![key, text])?;
        Ok(())
    }

    /// Delete a record. Returns whether anything was removed.
    pub fn delete(conn: &Connection, collection: Collection, key: &str) -> Result<bool> {
        let sql = format!("DELETE FROM {} WHERE id = ?1", collection.table());
        let deleted = conn.execute(&sql, [key])?;
        Ok(deleted > 0)
    }

    /// Count records in a collection.
    pub fn count(conn: &Connection, collection: Collection) -> Result<i64> {
        let sql = format!("SELECT COUNT(*) FROM {}", collection.table());
        Ok(conn.query_row(&sql, [], |row| row.get(0))?)
    }

    /// Get a typed record by key.
    pub fn get<R: Record>(conn: &Connection, key: &str) -> Result<Option<R>> {
        match Self::get_raw(conn, R::COLLECTION, key)? {
            Some(value) => Ok(Some(serde_json::from_value(value)?)),
            None => Ok(None),
        }
    }

    /// Get every typed record, skipping ones that no longer decode.
    pub fn get_all<R: Record>(conn: &Connection) -> Result<Vec<R>> {
        let records = Self::get_all_raw(conn, R::COLLECTION)?
            .into_iter()
            .filter_map(|value| match serde_json::from_value(value) {
                Ok(record) => Some(record),
                Err(e) => {
                    warn!(table = R::COLLECTION.table(), "Skipping malformed record: {}", e);
                    None
                }
            })
            .collect();

        Ok(records)
    }

    /// Upsert a typed record under its own key.
    pub fn put<R: Record>(conn: &Connection, record: &R) -> Result<()> {
        let value = serde_json::to_value(record)?;
        Self::put_raw(conn, R::COLLECTION, record.key(), &value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{default_models, NewProcess, ProcessStatus, ProcessType};
    use crate::schema::run_migrations;
    use serde_json::json;

    fn setup_db() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        run_migrations(&conn).unwrap();
        conn
    }

    #[test]
    fn test_missing_key_is_none() {
        let conn = setup_db();
        assert!(CollectionRepo::get_raw(&conn, Collection::Settings, "main_settings")
            .unwrap()
            .is_none());
        assert!(CollectionRepo::get::<User>(&conn, "nobody").unwrap().is_none());
    }

    #[test]
    fn test_put_is_upsert() {
        let conn = setup_db();
        let mut user = User::with_id("u1", "Ali", "ali@example.com");

        CollectionRepo::put(&conn, &user).unwrap();
        user.name = "Ali Hassan".into();
        CollectionRepo::put(&conn, &user).unwrap();

        let stored: User = CollectionRepo::get(&conn, "u1").unwrap().unwrap();
        assert_eq!(stored.name, "Ali Hassan");
        assert_eq!(CollectionRepo::count(&conn, Collection::Users).unwrap(), 1);
    }

    #[test]
    fn test_collections_are_independent() {
        let conn = setup_db();
        CollectionRepo::put_raw(&conn, Collection::Users, "same", &json!({"a": 1})).unwrap();
        CollectionRepo::put_raw(&conn, Collection::Models, "same", &json!({"b": 2})).unwrap();

        assert!(CollectionRepo::delete(&conn, Collection::Users, "same").unwrap());
        assert!(CollectionRepo::get_raw(&conn, Collection::Models, "same")
            .unwrap()
            .is_some());
    }

    #[test]
    fn test_delete_missing_returns_false() {
        let conn = setup_db();
        assert!(!CollectionRepo::delete(&conn, Collection::Users, "ghost").unwrap());
    }

    #[test]
    fn test_get_all_skips_malformed_rows() {
        let conn = setup_db();
        for model in default_models() {
            CollectionRepo::put(&conn, &model).unwrap();
        }
        CollectionRepo::put_raw(&conn, Collection::Models, "broken", &json!({"id": 3})).unwrap();
        conn.execute(
            "INSERT INTO models (id, record) VALUES ('garbage', 'not json')",
            [],
        )
        .unwrap();

        let models: Vec<ModelConfig> = CollectionRepo::get_all(&conn).unwrap();
        assert_eq!(models.len(), 2);
    }

    #[test]
    fn test_process_round_trip() {
        let conn = setup_db();
        let process = NewProcess::now(None, ProcessType::Editing, ProcessStatus::Success, "m")
            .into_process("p1".into());
        CollectionRepo::put(&conn, &process).unwrap();

        let all: Vec<AiProcess> = CollectionRepo::get_all(&conn).unwrap();
        assert_eq!(all, vec![process]);
    }
}
