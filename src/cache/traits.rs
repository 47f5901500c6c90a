//! Core types for the offline cache.

use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};

/// A response as seen by the interceptor, either live or replayed from cache.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
  pub status: u16,
  pub content_type: Option<String>,
  pub body: Vec<u8>,
}

impl Response {
  pub fn new(status: u16, content_type: Option<&str>, body: impl Into<Vec<u8>>) -> Self {
    Self {
      status,
      content_type: content_type.map(String::from),
      body: body.into(),
    }
  }

  /// Whether the status is in the 2xx range. Only these may be precached.
  pub fn is_success(&self) -> bool {
    (200..300).contains(&self.status)
  }
}

/// A response captured into a cache generation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedResponse {
  /// Cache key (absolute URL without fragment)
  pub url: String,
  pub response: Response,
  /// Hex SHA-256 of the body
  pub digest: String,
  /// When the response was stored
  pub cached_at: DateTime<Utc>,
}

impl CachedResponse {
  /// Capture a live response under `url`.
  pub fn capture(url: impl Into<String>, response: Response) -> Self {
    let digest = body_digest(&response.body);
    Self {
      url: url.into(),
      response,
      digest,
      cached_at: Utc::now(),
    }
  }
}

/// Hex-encoded SHA-256 of a response body.
pub fn body_digest(body: &[u8]) -> String {
  let mut hasher = Sha256::new();
  hasher.update(body);
  hex::encode(hasher.finalize())
}

/// What the interceptor resolved a request with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
  /// Request was not intercepted; the network answered directly
  PassThrough(Response),
  /// Served from a cache generation
  Cached(CachedResponse),
  /// Cache miss, served from the network
  Network(Response),
  /// Cache miss and the network failed. No response.
  Offline,
}

impl Outcome {
  /// The response body to hand back, if any.
  pub fn response(&self) -> Option<&Response> {
    match self {
      Outcome::PassThrough(r) | Outcome::Network(r) => Some(r),
      Outcome::Cached(c) => Some(&c.response),
      Outcome::Offline => None,
    }
  }

  /// Short label for logs and CLI output.
  pub fn source(&self) -> &'static str {
    match self {
      Outcome::PassThrough(_) => "passthrough",
      Outcome::Cached(_) => "cache",
      Outcome::Network(_) => "network",
      Outcome::Offline => "offline",
    }
  }
}
