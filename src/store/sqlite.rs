use std::path::Path;
use std::sync::{Mutex, PoisonError};

use rusqlite::{Connection, params};

use super::{PersistentStore, migrations};
use crate::error::Result;

/// SQLite-backed preferences table.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        migrations::run_migrations(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        migrations::run_migrations(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }
}

impl PersistentStore for SqliteStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let conn = self.conn.lock().unwrap_or_else(PoisonError::into_inner);
        let mut stmt = conn.prepare("SELECT value FROM preferences WHERE key = ?1")?;
        let mut rows = stmt.query_map(params![key], |row| row.get(0))?;
        match rows.next() {
            Some(row) => Ok(Some(row?)),
            None => Ok(None),
        }
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        let conn = self.conn.lock().unwrap_or_else(PoisonError::into_inner);
        conn.execute(
            "INSERT INTO preferences (key, value) VALUES (?1, ?2)
             ON CONFLICT(key) DO UPDATE SET
                value = excluded.value,
                updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')",
            params![key, value],
        )?;
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        let conn = self.conn.lock().unwrap_or_else(PoisonError::into_inner);
        conn.execute("DELETE FROM preferences", [])?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_store() -> SqliteStore {
        SqliteStore::open_in_memory().expect("Failed to create test store")
    }

    #[test]
    fn test_migrations_run() {
        let store = test_store();
        let conn = store.conn.lock().unwrap();
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM _migrations", [], |row| row.get(0))
            .unwrap();
        assert!(count >= 1);
    }

    #[test]
    fn test_migrations_are_idempotent() {
        let store = test_store();
        let conn = store.conn.lock().unwrap();
        migrations::run_migrations(&conn).unwrap();
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM _migrations", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 1);
    }

    #[test]
    fn test_preferences_get_set() {
        let store = test_store();
        assert!(store.get("consent_string").unwrap().is_none());

        store.set("consent_string", "{\"consent_state\":\"unknown\"}").unwrap();
        let val = store.get("consent_string").unwrap().unwrap();
        assert_eq!(val, "{\"consent_state\":\"unknown\"}");

        // Update
        store
            .set("consent_string", "{\"consent_state\":\"personalized\"}")
            .unwrap();
        let val = store.get("consent_string").unwrap().unwrap();
        assert_eq!(val, "{\"consent_state\":\"personalized\"}");
    }

    #[test]
    fn test_clear_removes_all_keys() {
        let store = test_store();
        store.set("consent_string", "{}").unwrap();
        store.set("other", "x").unwrap();

        store.clear().unwrap();

        assert!(store.get("consent_string").unwrap().is_none());
        assert!(store.get("other").unwrap().is_none());
    }
}
