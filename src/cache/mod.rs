//! Offline cache for the application shell.
//!
//! This module provides a service-worker style cache that:
//! - Precaches a fixed manifest as one versioned generation, all or nothing
//! - Purges every other generation on activation
//! - Serves navigations from the cached entry document
//! - Never caches or intercepts AI provider traffic
//! - Serves cache-then-network for everything else, with an empty offline fallback

mod network;
mod route;
mod storage;
mod traits;
mod worker;

pub use network::HttpNetwork;
pub use route::{route, Request, RequestMode};
pub use storage::{CacheStorage, SqliteStorage};
pub use traits::Outcome;
pub use worker::{CacheSettings, OfflineCache};
