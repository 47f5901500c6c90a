//! Request routing for the interceptor.
//!
//! Routing is a pure decision over the request and a [`RoutePolicy`]; executing
//! the resulting [`Action`] is the worker's job.

use color_eyre::{eyre::eyre, Result};
use url::Url;

/// How the request was initiated.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RequestMode {
  /// Full-page load
  Navigate,
  /// Asset, XHR or fetch() sub-request
  #[default]
  Subresource,
}

/// An outgoing request seen by the interceptor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
  pub url: Url,
  pub mode: RequestMode,
}

impl Request {
  pub fn navigate(url: Url) -> Self {
    Self {
      url,
      mode: RequestMode::Navigate,
    }
  }

  pub fn subresource(url: Url) -> Self {
    Self {
      url,
      mode: RequestMode::Subresource,
    }
  }

  /// Parse `input` as an absolute URL, or as a path relative to `origin`.
  pub fn parse(input: &str, origin: &Url, mode: RequestMode) -> Result<Self> {
    let url = match Url::parse(input) {
      Ok(url) => url,
      Err(url::ParseError::RelativeUrlWithoutBase) => origin
        .join(input)
        .map_err(|e| eyre!("Invalid request path {:?}: {}", input, e))?,
      Err(e) => return Err(eyre!("Invalid request URL {:?}: {}", input, e)),
    };
    Ok(Self { url, mode })
  }
}

/// What the interceptor should do with a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
  /// Leave the request alone: network only, no cache reads or writes
  PassThrough,
  /// Serve the cached document at `key`, else fetch the request itself
  ServeCachedOrFetch { key: String },
  /// Serve the cached entry at `key`, else fetch; a failed fetch yields no response
  CacheThenNetwork { key: String },
}

/// Inputs to the routing decision.
#[derive(Debug, Clone)]
pub struct RoutePolicy {
  bypass_hosts: Vec<String>,
  entry_key: String,
}

impl RoutePolicy {
  pub fn new<I, S>(bypass_hosts: I, entry_key: impl Into<String>) -> Self
  where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
  {
    Self {
      bypass_hosts: bypass_hosts
        .into_iter()
        .map(|s| s.as_ref().to_ascii_lowercase())
        .filter(|s| !s.is_empty())
        .collect(),
      entry_key: entry_key.into(),
    }
  }

  /// Whether the URL's hostname contains a bypass fragment (case-insensitive).
  pub fn bypasses(&self, url: &Url) -> bool {
    let Some(host) = url.host_str() else {
      return false;
    };
    let host = host.to_ascii_lowercase();
    self
      .bypass_hosts
      .iter()
      .any(|fragment| host.contains(fragment.as_str()))
  }
}

/// Decide how to serve `request`.
pub fn route(request: &Request, policy: &RoutePolicy) -> Action {
  if policy.bypasses(&request.url) {
    return Action::PassThrough;
  }

  if request.mode == RequestMode::Navigate {
    return Action::ServeCachedOrFetch {
      key: policy.entry_key.clone(),
    };
  }

  Action::CacheThenNetwork {
    key: cache_key(&request.url),
  }
}

/// Cache key for a URL. Fragments never reach the server, so they are dropped.
pub fn cache_key(url: &Url) -> String {
  let mut url = url.clone();
  url.set_fragment(None);
  url.to_string()
}

#[cfg(test)]
mod tests {
  use super::*;

  fn policy() -> RoutePolicy {
    RoutePolicy::new(["generative", "googleapis"], "http://localhost:8080/index.html")
  }

  fn url(s: &str) -> Url {
    Url::parse(s).unwrap()
  }

  #[test]
  fn test_ai_hosts_pass_through() {
    let policy = policy();
    for u in [
      "https://generativelanguage.googleapis.com/v1beta/models",
      "https://GENERATIVE.example.com/x",
      "https://www.GoogleApis.com/",
      "https://fonts.googleapis.com/css",
    ] {
      let request = Request::subresource(url(u));
      assert_eq!(route(&request, &policy), Action::PassThrough, "{}", u);
    }
  }

  #[test]
  fn test_ai_navigation_still_passes_through() {
    let request = Request::navigate(url("https://generativelanguage.googleapis.com/"));
    assert_eq!(route(&request, &policy()), Action::PassThrough);
  }

  #[test]
  fn test_fragment_in_path_does_not_bypass() {
    // Only the hostname is matched
    let request = Request::subresource(url("http://localhost:8080/generative/googleapis.js"));
    assert_eq!(
      route(&request, &policy()),
      Action::CacheThenNetwork {
        key: "http://localhost:8080/generative/googleapis.js".to_string()
      }
    );
  }

  #[test]
  fn test_navigation_serves_entry_document_for_any_path() {
    for u in [
      "http://localhost:8080/",
      "http://localhost:8080/planner",
      "http://localhost:8080/quizzes/chemistry?week=3#q2",
    ] {
      let request = Request::navigate(url(u));
      assert_eq!(
        route(&request, &policy()),
        Action::ServeCachedOrFetch {
          key: "http://localhost:8080/index.html".to_string()
        }
      );
    }
  }

  #[test]
  fn test_subresource_uses_exact_key() {
    let request = Request::subresource(url("http://localhost:8080/assets/logo.svg?v=2#top"));
    assert_eq!(
      route(&request, &policy()),
      Action::CacheThenNetwork {
        key: "http://localhost:8080/assets/logo.svg?v=2".to_string()
      }
    );
  }

  #[test]
  fn test_hostless_url_never_bypasses() {
    let policy = RoutePolicy::new(["data"], "http://localhost/index.html");
    assert!(!policy.bypasses(&url("data:text/plain,hello")));
  }

  #[test]
  fn test_empty_fragments_are_ignored() {
    let policy = RoutePolicy::new(["", "GoogleApis"], "http://localhost/index.html");
    assert!(!policy.bypasses(&url("http://localhost/")));
    assert!(policy.bypasses(&url("https://fonts.googleapis.com/")));
  }

  #[test]
  fn test_parse_relative_and_absolute() {
    let origin = url("http://localhost:8080");
    let relative = Request::parse("/src/App.js", &origin, RequestMode::Subresource).unwrap();
    assert_eq!(relative.url.as_str(), "http://localhost:8080/src/App.js");

    let absolute = Request::parse("https://example.org/a", &origin, RequestMode::Navigate).unwrap();
    assert_eq!(absolute.url.as_str(), "https://example.org/a");
    assert_eq!(absolute.mode, RequestMode::Navigate);
  }
}
