//! Cache generation storage trait and SQLite implementation.

use chrono::{DateTime, Utc};
use color_eyre::{eyre::eyre, Result};
use rusqlite::{params, OptionalExtension};

use super::traits::{CachedResponse, Response};
use crate::db::Database;

/// Trait for cache storage backends.
///
/// A backend holds any number of generations; the worker decides which one is
/// current.
pub trait CacheStorage: Send + Sync {
  /// Replace the contents of `version` with `entries`, all or nothing.
  fn put_generation(&self, version: &str, entries: &[CachedResponse]) -> Result<()>;

  /// Get the entry stored under `url` in `version`.
  fn get_entry(&self, version: &str, url: &str) -> Result<Option<CachedResponse>>;

  /// All generation identifiers, oldest first.
  fn generations(&self) -> Result<Vec<String>>;

  /// Number of entries in `version`.
  fn entry_count(&self, version: &str) -> Result<usize>;

  /// Delete `version` and its entries. Returns false if it did not exist.
  fn delete_generation(&self, version: &str) -> Result<bool>;
}

/// SQLite-based cache storage implementation.
pub struct SqliteStorage {
  db: Database,
}

impl SqliteStorage {
  pub fn new(db: Database) -> Self {
    Self { db }
  }
}

impl CacheStorage for SqliteStorage {
  fn put_generation(&self, version: &str, entries: &[CachedResponse]) -> Result<()> {
    let mut conn = self.db.conn()?;

    // Dropping the transaction without commit rolls everything back
    let tx = conn
      .transaction()
      .map_err(|e| eyre!("Failed to begin transaction: {}", e))?;

    tx.execute(
      "INSERT OR IGNORE INTO cache_generations (version) VALUES (?)",
      params![version],
    )
    .map_err(|e| eyre!("Failed to create cache generation {}: {}", version, e))?;

    tx.execute(
      "DELETE FROM cache_entries WHERE version = ?",
      params![version],
    )
    .map_err(|e| eyre!("Failed to clear cache generation {}: {}", version, e))?;

    for entry in entries {
      tx.execute(
        "INSERT OR REPLACE INTO cache_entries (version, url, status, content_type, body, digest, cached_at)
         VALUES (?, ?, ?, ?, ?, ?, ?)",
        params![
          version,
          entry.url,
          entry.response.status,
          entry.response.content_type,
          entry.response.body,
          entry.digest,
          format_datetime(entry.cached_at),
        ],
      )
      .map_err(|e| eyre!("Failed to store {}: {}", entry.url, e))?;
    }

    tx.commit()
      .map_err(|e| eyre!("Failed to commit cache generation {}: {}", version, e))?;

    Ok(())
  }

  fn get_entry(&self, version: &str, url: &str) -> Result<Option<CachedResponse>> {
    let conn = self.db.conn()?;

    let mut stmt = conn
      .prepare(
        "SELECT status, content_type, body, digest, cached_at FROM cache_entries
         WHERE version = ? AND url = ?",
      )
      .map_err(|e| eyre!("Failed to prepare query: {}", e))?;

    let row: Option<(u16, Option<String>, Vec<u8>, String, String)> = stmt
      .query_row(params![version, url], |row| {
        Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?, row.get(4)?))
      })
      .optional()
      .map_err(|e| eyre!("Failed to read cache entry {}: {}", url, e))?;

    match row {
      Some((status, content_type, body, digest, cached_at_str)) => Ok(Some(CachedResponse {
        url: url.to_string(),
        response: Response {
          status,
          content_type,
          body,
        },
        digest,
        cached_at: parse_datetime(&cached_at_str)?,
      })),
      None => Ok(None),
    }
  }

  fn generations(&self) -> Result<Vec<String>> {
    let conn = self.db.conn()?;

    let mut stmt = conn
      .prepare("SELECT version FROM cache_generations ORDER BY created_at, rowid")
      .map_err(|e| eyre!("Failed to prepare query: {}", e))?;

    let versions = stmt
      .query_map([], |row| row.get(0))
      .map_err(|e| eyre!("Failed to list cache generations: {}", e))?
      .collect::<rusqlite::Result<Vec<String>>>()
      .map_err(|e| eyre!("Failed to read cache generation: {}", e))?;

    Ok(versions)
  }

  fn entry_count(&self, version: &str) -> Result<usize> {
    let conn = self.db.conn()?;

    let count: i64 = conn
      .query_row(
        "SELECT COUNT(*) FROM cache_entries WHERE version = ?",
        params![version],
        |row| row.get(0),
      )
      .map_err(|e| eyre!("Failed to count entries in {}: {}", version, e))?;

    Ok(count as usize)
  }

  fn delete_generation(&self, version: &str) -> Result<bool> {
    let conn = self.db.conn()?;

    // Entries go with the generation (ON DELETE CASCADE)
    let deleted = conn
      .execute(
        "DELETE FROM cache_generations WHERE version = ?",
        params![version],
      )
      .map_err(|e| eyre!("Failed to delete cache generation {}: {}", version, e))?;

    Ok(deleted > 0)
  }
}

/// Format a timestamp the way SQLite's datetime() does.
fn format_datetime(dt: DateTime<Utc>) -> String {
  dt.format("%Y-%m-%d %H:%M:%S").to_string()
}

/// Parse a datetime string from SQLite format.
fn parse_datetime(s: &str) -> Result<DateTime<Utc>> {
  // SQLite stores as "YYYY-MM-DD HH:MM:SS"
  chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S")
    .map(|dt| dt.and_utc())
    .map_err(|e| eyre!("Failed to parse datetime '{}': {}", s, e))
}

#[cfg(test)]
pub use memory::MemoryStorage;

#[cfg(test)]
mod memory {
  use super::*;
  use std::collections::{BTreeMap, HashSet};
  use std::sync::Mutex;

  /// In-memory storage for tests. Individual generations can be made undeletable.
  #[derive(Default)]
  pub struct MemoryStorage {
    generations: Mutex<Vec<(String, BTreeMap<String, CachedResponse>)>>,
    undeletable: Mutex<HashSet<String>>,
  }

  impl MemoryStorage {
    pub fn new() -> Self {
      Self::default()
    }

    /// Make deletes of `version` fail.
    pub fn fail_deletes_for(&self, version: &str) {
      self.undeletable.lock().unwrap().insert(version.to_string());
    }
  }

  impl CacheStorage for MemoryStorage {
    fn put_generation(&self, version: &str, entries: &[CachedResponse]) -> Result<()> {
      let map: BTreeMap<String, CachedResponse> = entries
        .iter()
        .map(|e| (e.url.clone(), e.clone()))
        .collect();
      let mut generations = self.generations.lock().unwrap();
      match generations.iter_mut().find(|(v, _)| v == version) {
        Some((_, existing)) => *existing = map,
        None => generations.push((version.to_string(), map)),
      }
      Ok(())
    }

    fn get_entry(&self, version: &str, url: &str) -> Result<Option<CachedResponse>> {
      let generations = self.generations.lock().unwrap();
      Ok(
        generations
          .iter()
          .find(|(v, _)| v == version)
          .and_then(|(_, entries)| entries.get(url).cloned()),
      )
    }

    fn generations(&self) -> Result<Vec<String>> {
      let generations = self.generations.lock().unwrap();
      Ok(generations.iter().map(|(v, _)| v.clone()).collect())
    }

    fn entry_count(&self, version: &str) -> Result<usize> {
      let generations = self.generations.lock().unwrap();
      Ok(
        generations
          .iter()
          .find(|(v, _)| v == version)
          .map(|(_, entries)| entries.len())
          .unwrap_or(0),
      )
    }

    fn delete_generation(&self, version: &str) -> Result<bool> {
      if self.undeletable.lock().unwrap().contains(version) {
        return Err(eyre!("Cache generation {} is locked", version));
      }
      let mut generations = self.generations.lock().unwrap();
      let before = generations.len();
      generations.retain(|(v, _)| v != version);
      Ok(generations.len() != before)
    }
  }
}
