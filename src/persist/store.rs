//! Raw key-value backends behind the persistence facade.

use color_eyre::{eyre::eyre, Result};
use rusqlite::{params, OptionalExtension};

use crate::db::Database;

/// A string-to-string store. Any operation may fail; the facade masks failures.
pub trait PersistenceStore: Send + Sync {
  fn get(&self, key: &str) -> Result<Option<String>>;

  fn set(&self, key: &str, raw: &str) -> Result<()>;

  /// Removing an absent key is not an error.
  fn remove(&self, key: &str) -> Result<()>;

  fn keys(&self) -> Result<Vec<String>>;
}

/// SQLite-backed store using the `kv_entries` table.
pub struct SqliteStore {
  db: Database,
}

impl SqliteStore {
  pub fn new(db: Database) -> Self {
    Self { db }
  }
}

impl PersistenceStore for SqliteStore {
  fn get(&self, key: &str) -> Result<Option<String>> {
    let conn = self.db.conn()?;

    conn
      .query_row(
        "SELECT value FROM kv_entries WHERE key = ?",
        params![key],
        |row| row.get(0),
      )
      .optional()
      .map_err(|e| eyre!("Failed to read {}: {}", key, e))
  }

  fn set(&self, key: &str, raw: &str) -> Result<()> {
    let conn = self.db.conn()?;

    conn
      .execute(
        "INSERT OR REPLACE INTO kv_entries (key, value, updated_at) VALUES (?, ?, datetime('now'))",
        params![key, raw],
      )
      .map_err(|e| eyre!("Failed to write {}: {}", key, e))?;

    Ok(())
  }

  fn remove(&self, key: &str) -> Result<()> {
    let conn = self.db.conn()?;

    conn
      .execute("DELETE FROM kv_entries WHERE key = ?", params![key])
      .map_err(|e| eyre!("Failed to remove {}: {}", key, e))?;

    Ok(())
  }

  fn keys(&self) -> Result<Vec<String>> {
    let conn = self.db.conn()?;

    let mut stmt = conn
      .prepare("SELECT key FROM kv_entries ORDER BY key")
      .map_err(|e| eyre!("Failed to prepare query: {}", e))?;

    let keys = stmt
      .query_map([], |row| row.get(0))
      .map_err(|e| eyre!("Failed to list keys: {}", e))?
      .collect::<rusqlite::Result<Vec<String>>>()
      .map_err(|e| eyre!("Failed to read key: {}", e))?;

    Ok(keys)
  }
}

#[cfg(test)]
pub use memory::MemoryStore;
