//! Known keys in the flat persisted namespace.

pub const DARK_MODE: &str = "darkMode";
pub const LANGUAGE: &str = "language";
pub const USER: &str = "user";
pub const ACTIVE_TAB: &str = "activeTab";
pub const PLANNER_TASKS: &str = "plannerTasks";
pub const USER_UPLOADS: &str = "userUploads";
/// Stored as a plain string, not JSON
pub const GEMINI_API_KEY: &str = "GEMINI_API_KEY";
