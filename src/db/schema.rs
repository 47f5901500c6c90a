/// Schema for the offline cache and the persistence facade.
pub const SCHEMA: &str = r#"
-- One row per cache generation (version tag)
CREATE TABLE IF NOT EXISTS cache_generations (
    version TEXT PRIMARY KEY,
    created_at TEXT NOT NULL DEFAULT (datetime('now'))
);

-- Captured responses, keyed by absolute URL within a generation
CREATE TABLE IF NOT EXISTS cache_entries (
    version TEXT NOT NULL,
    url TEXT NOT NULL,
    status INTEGER NOT NULL,
    content_type TEXT,
    body BLOB NOT NULL,
    digest TEXT NOT NULL,
    cached_at TEXT NOT NULL DEFAULT (datetime('now')),
    PRIMARY KEY (version, url),
    FOREIGN KEY (version) REFERENCES cache_generations(version) ON DELETE CASCADE
);

-- Flat JSON key-value space
CREATE TABLE IF NOT EXISTS kv_entries (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL,
    updated_at TEXT NOT NULL DEFAULT (datetime('now'))
);
"#;
