//! Failure-safe JSON persistence over a key-value store.
//!
//! Every operation is total: reads fall back to the caller's default, writes
//! and removals are best-effort. Masked failures are reported as `warn!`
//! events and, for reads, as a [`Fallback`] on [`Loaded`].

pub mod keys;
mod store;

use serde::{de::DeserializeOwned, Serialize};
use std::sync::Arc;
use tracing::warn;

#[cfg(test)]
pub use store::MemoryStore;
pub use store::{PersistenceStore, SqliteStore};

/// Why a load returned the caller's default.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Fallback {
  /// No entry under the key
  Missing,
  /// Entry present but not valid JSON for the requested type
  Corrupt(String),
  /// The backend failed to read
  Backend(String),
}

/// Result of a load: the value handed to the caller, plus why the default was used.
#[derive(Debug, Clone, PartialEq)]
pub struct Loaded<T> {
  pub value: T,
  pub fallback: Option<Fallback>,
}

impl<T> Loaded<T> {
  fn hit(value: T) -> Self {
    Self {
      value,
      fallback: None,
    }
  }

  fn fallback(value: T, reason: Fallback) -> Self {
    Self {
      value,
      fallback: Some(reason),
    }
  }
}

/// The load/save/remove facade.
pub struct Persistence<S: PersistenceStore> {
  store: Arc<S>,
}

impl<S: PersistenceStore> Persistence<S> {
  pub fn new(store: S) -> Self {
    Self {
      store: Arc::new(store),
    }
  }

  /// The underlying store.
  #[cfg(test)]
  pub fn store(&self) -> &S {
    &self.store
  }

  /// Load `key` as JSON, or `default` when missing, corrupt or unreadable.
  pub fn load<T: DeserializeOwned>(&self, key: &str, default: T) -> T {
    self.load_detailed(key, default).value
  }

  /// Like [`load`](Self::load), but also reports why the default was used.
  pub fn load_detailed<T: DeserializeOwned>(&self, key: &str, default: T) -> Loaded<T> {
    match self.store.get(key) {
      Ok(None) => Loaded::fallback(default, Fallback::Missing),
      Ok(Some(raw)) => match serde_json::from_str(&raw) {
        Ok(value) => Loaded::hit(value),
        Err(e) => {
          warn!(key, error = %e, "Could not parse stored value, using default");
          Loaded::fallback(default, Fallback::Corrupt(e.to_string()))
        }
      },
      Err(e) => {
        warn!(key, error = %e, "Could not load key from storage, using default");
        Loaded::fallback(default, Fallback::Backend(e.to_string()))
      }
    }
  }

  /// Serialize `value` as JSON under `key`. Failures are logged and dropped.
  pub fn save<T: Serialize + ?Sized>(&self, key: &str, value: &T) {
    let raw = match serde_json::to_string(value) {
      Ok(raw) => raw,
      Err(e) => {
        warn!(key, error = %e, "Could not serialize value, save dropped");
        return;
      }
    };

    if let Err(e) = self.store.set(key, &raw) {
      warn!(key, error = %e, "Could not save key to storage");
    }
  }

  /// Delete `key` if present. Failures are logged and dropped.
  pub fn remove(&self, key: &str) {
    if let Err(e) = self.store.remove(key) {
      warn!(key, error = %e, "Could not remove key from storage");
    }
  }

  /// Read `key` as a plain string, without JSON decoding.
  pub fn load_raw(&self, key: &str) -> Option<String> {
    match self.store.get(key) {
      Ok(raw) => raw,
      Err(e) => {
        warn!(key, error = %e, "Could not load key from storage");
        None
      }
    }
  }

  /// Write `raw` under `key` as-is. Failures are logged and dropped.
  pub fn save_raw(&self, key: &str, raw: &str) {
    if let Err(e) = self.store.set(key, raw) {
      warn!(key, error = %e, "Could not save key to storage");
    }
  }

  /// Stored keys; empty when the backend cannot list them.
  pub fn keys(&self) -> Vec<String> {
    self.store.keys().unwrap_or_else(|e| {
      warn!(error = %e, "Could not list stored keys");
      Vec::new()
    })
  }
}

impl<S: PersistenceStore> Clone for Persistence<S> {
  fn clone(&self) -> Self {
    Self {
      store: Arc::clone(&self.store),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::db::Database;
  use serde::Deserialize;
  use serde_json::{json, Value};
  use std::collections::HashMap;

  fn persistence() -> Persistence<MemoryStore> {
    Persistence::new(MemoryStore::new())
  }

  #[test]
  fn test_missing_key_returns_default() {
    let p = persistence();
    assert_eq!(p.load("missing-key", 42), 42);

    let loaded = p.load_detailed("missing-key", "fallback".to_string());
    assert_eq!(loaded.value, "fallback");
    assert_eq!(loaded.fallback, Some(Fallback::Missing));
  }

  #[test]
  fn test_save_then_load_dark_mode() {
    let p = persistence();
    p.save(keys::DARK_MODE, &true);
    assert!(p.load(keys::DARK_MODE, false));
    assert_eq!(p.store().get(keys::DARK_MODE).unwrap().as_deref(), Some("true"));
  }

  #[test]
  fn test_round_trip_json_values() {
    let p = persistence();
    let values = [
      json!(null),
      json!("en"),
      json!(3.5),
      json!([1, 2, 3]),
      json!({"name": "sara", "email": "sara@example.com", "role": "student"}),
      json!([{"id": 1717000000000_i64, "title": "Titration lab", "date": "2026-05-01"}]),
    ];
    for value in values {
      p.save("entry", &value);
      let loaded = p.load_detailed("entry", json!("default"));
      assert_eq!(loaded.value, value);
      assert_eq!(loaded.fallback, None);
    }
  }

  #[test]
  fn test_round_trip_typed_struct() {
    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Task {
      id: i64,
      title: String,
    }

    let p = persistence();
    let tasks = vec![Task {
      id: 7,
      title: "Revise organic chemistry".to_string(),
    }];
    p.save(keys::PLANNER_TASKS, &tasks);
    assert_eq!(p.load::<Vec<Task>>(keys::PLANNER_TASKS, Vec::new()), tasks);
  }

  #[test]
  fn test_corrupt_entry_returns_default() {
    let p = persistence();
    p.store().set("user", "{not json").unwrap();

    let loaded = p.load_detailed::<Option<Value>>("user", None);
    assert_eq!(loaded.value, None);
    assert!(matches!(loaded.fallback, Some(Fallback::Corrupt(_))));
  }

  #[test]
  fn test_wrong_shape_returns_default() {
    let p = persistence();
    p.save("darkMode", &"yes");
    assert!(!p.load("darkMode", false));
  }

  #[test]
  fn test_remove_then_load_returns_default() {
    let p = persistence();
    p.save(keys::LANGUAGE, &"ar");
    p.remove(keys::LANGUAGE);
    assert_eq!(p.load(keys::LANGUAGE, "en".to_string()), "en");

    // Removing again is a no-op
    p.remove(keys::LANGUAGE);
  }

  #[test]
  fn test_failed_write_keeps_prior_value() {
    let p = persistence();
    p.save("user", &json!({"name": "sara"}));

    p.store().fail_writes(true);
    p.save("user", &json!({"name": "omar"}));
    p.store().fail_writes(false);

    assert_eq!(p.load("user", Value::Null), json!({"name": "sara"}));
  }

  #[test]
  fn test_failed_first_write_leaves_key_missing() {
    let p = persistence();
    p.store().fail_writes(true);
    p.save("user", &json!({"name": "sara"}));

    let loaded = p.load_detailed("user", Value::Null);
    assert_eq!(loaded.value, Value::Null);
    assert_eq!(loaded.fallback, Some(Fallback::Missing));
  }

  #[test]
  fn test_unserializable_value_is_dropped() {
    let p = persistence();
    let mut map = HashMap::new();
    map.insert((1, 2), "tuple keys are not JSON object keys");

    p.save("bad", &map);
    assert!(p.keys().is_empty());
  }

  #[test]
  fn test_failed_remove_is_masked() {
    let p = persistence();
    p.save(keys::USER, &json!({"name": "sara"}));
    p.store().fail_removes(true);
    p.remove(keys::USER);
    assert_eq!(p.load(keys::USER, Value::Null), json!({"name": "sara"}));
  }

  #[test]
  fn test_raw_entries_are_not_json_decoded() {
    let p = persistence();
    p.save_raw(keys::GEMINI_API_KEY, "AIzaSyExample");
    assert_eq!(p.load_raw(keys::GEMINI_API_KEY).as_deref(), Some("AIzaSyExample"));

    // Not valid JSON, so the JSON path falls back
    assert_eq!(p.load(keys::GEMINI_API_KEY, String::new()), "");
  }

  #[test]
  fn test_sqlite_backend_round_trip() {
    let p = Persistence::new(SqliteStore::new(Database::open_in_memory().unwrap()));
    p.save(keys::ACTIVE_TAB, &"planner");
    assert_eq!(p.load(keys::ACTIVE_TAB, "dashboard".to_string()), "planner");
    p.remove(keys::ACTIVE_TAB);
    assert_eq!(p.load(keys::ACTIVE_TAB, "dashboard".to_string()), "dashboard");
  }
}
