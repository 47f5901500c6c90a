//! Client state restored from, and written back to, the persistence facade.

use serde::{Deserialize, Serialize};

use crate::persist::{keys, Persistence, PersistenceStore};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
  #[default]
  Student,
  Admin,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
  pub name: String,
  #[serde(default)]
  pub email: String,
  #[serde(default)]
  pub role: Role,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlannerTask {
  /// Creation time in epoch milliseconds
  pub id: i64,
  pub subject_key: String,
  pub title: String,
  /// Free text as entered; usually `YYYY-MM-DD` but never validated
  pub date: String,
  #[serde(default)]
  pub color: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Upload {
  pub id: i64,
  pub name: String,
}

/// Everything the client keeps across restarts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
  pub dark_mode: bool,
  pub language: String,
  pub user: Option<User>,
  pub active_tab: String,
  pub planner_tasks: Vec<PlannerTask>,
  pub uploads: Vec<Upload>,
}

pub const DEFAULT_LANGUAGE: &str = "en";
pub const DEFAULT_TAB: &str = "dashboard";

impl Default for Session {
  fn default() -> Self {
    Self {
      dark_mode: false,
      language: DEFAULT_LANGUAGE.to_string(),
      user: None,
      active_tab: DEFAULT_TAB.to_string(),
      planner_tasks: Vec::new(),
      uploads: Vec::new(),
    }
  }
}

impl Session {
  /// Load every key, each falling back to its default independently.
  pub fn restore<S: PersistenceStore>(persistence: &Persistence<S>) -> Self {
    let defaults = Self::default();
    Self {
      dark_mode: persistence.load(keys::DARK_MODE, defaults.dark_mode),
      language: persistence.load(keys::LANGUAGE, defaults.language),
      user: persistence.load(keys::USER, defaults.user),
      active_tab: persistence.load(keys::ACTIVE_TAB, defaults.active_tab),
      planner_tasks: persistence.load(keys::PLANNER_TASKS, defaults.planner_tasks),
      uploads: persistence.load(keys::USER_UPLOADS, defaults.uploads),
    }
  }

  /// Save every key. Best-effort, like every facade write.
  pub fn persist<S: PersistenceStore>(&self, persistence: &Persistence<S>) {
    persistence.save(keys::DARK_MODE, &self.dark_mode);
    persistence.save(keys::LANGUAGE, &self.language);
    persistence.save(keys::USER, &self.user);
    persistence.save(keys::ACTIVE_TAB, &self.active_tab);
    persistence.save(keys::PLANNER_TASKS, &self.planner_tasks);
    persistence.save(keys::USER_UPLOADS, &self.uploads);
  }

  /// Forget the user and return to the dashboard.
  pub fn logout<S: PersistenceStore>(&mut self, persistence: &Persistence<S>) {
    self.user = None;
    self.active_tab = DEFAULT_TAB.to_string();
    persistence.remove(keys::USER);
    persistence.save(keys::ACTIVE_TAB, &self.active_tab);
  }
}

/// The AI provider key, stored as a plain string.
pub fn api_key<S: PersistenceStore>(persistence: &Persistence<S>) -> Option<String> {
  persistence
    .load_raw(keys::GEMINI_API_KEY)
    .filter(|k| !k.is_empty())
}

/// Store the AI provider key exactly as given. Empty keys are ignored.
pub fn set_api_key<S: PersistenceStore>(persistence: &Persistence<S>, key: &str) {
  if !key.is_empty() {
    persistence.save_raw(keys::GEMINI_API_KEY, key);
  }
}

pub fn clear_api_key<S: PersistenceStore>(persistence: &Persistence<S>) {
  persistence.remove(keys::GEMINI_API_KEY);
}
