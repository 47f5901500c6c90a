//! Offline cache worker: install, activate and intercept.
//!
//! Mirrors the lifecycle of a service worker for the application shell:
//! - `install` precaches the manifest as a new generation, all or nothing
//! - `activate` purges every other generation and claims clients
//! - `handle` serves requests per [`route`], never caching AI traffic

use color_eyre::{eyre::eyre, Result};
use futures::future::try_join_all;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info, warn};
use url::Url;

use super::network::Network;
use super::route::{cache_key, route, Action, Request, RoutePolicy};
use super::storage::CacheStorage;
use super::traits::{CachedResponse, Outcome};
use crate::config::Config;

/// Static description of the shell to cache.
#[derive(Debug, Clone)]
pub struct CacheSettings {
  /// Current generation identifier
  pub version: String,
  /// Origin the manifest paths are resolved against
  pub origin: Url,
  /// Ordered precache manifest
  pub precache: Vec<String>,
  /// Path of the document served for navigations
  pub entry_document: String,
  /// Hostname fragments that bypass the cache
  pub bypass_hosts: Vec<String>,
}

impl CacheSettings {
  pub fn from_config(config: &Config) -> Result<Self> {
    Ok(Self {
      version: config.cache.version.clone(),
      origin: config.origin_url()?,
      precache: config.cache.precache.clone(),
      entry_document: config.cache.entry_document.clone(),
      bypass_hosts: config.cache.bypass_hosts.clone(),
    })
  }

  /// Routing policy for this shell: bypass fragments plus the entry document key.
  pub fn policy(&self) -> Result<RoutePolicy> {
    let entry_key = cache_key(&self.resolve(&self.entry_document)?);
    Ok(RoutePolicy::new(&self.bypass_hosts, entry_key))
  }

  fn resolve(&self, path: &str) -> Result<Url> {
    self
      .origin
      .join(path)
      .map_err(|e| eyre!("Invalid precache path {:?}: {}", path, e))
  }
}

/// Lifecycle state of this worker instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
  /// Constructed, nothing installed by this instance
  Parsed,
  /// Current generation precached, waiting skipped
  Installed,
  /// Stale generations purged, clients claimed
  Active,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallReport {
  pub version: String,
  pub entries: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ActivationReport {
  pub kept: Option<String>,
  pub deleted: Vec<String>,
  /// Generations whose deletion failed; they stay behind until the next activation
  pub failed: Vec<String>,
}

/// Offline cache for the application shell.
pub struct OfflineCache<S: CacheStorage, N: Network> {
  storage: Arc<S>,
  network: Arc<N>,
  settings: CacheSettings,
  policy: RoutePolicy,
  state: WorkerState,
}

impl<S: CacheStorage, N: Network> OfflineCache<S, N> {
  pub fn new(storage: S, network: N, settings: CacheSettings) -> Result<Self> {
    let policy = settings.policy()?;

    Ok(Self {
      storage: Arc::new(storage),
      network: Arc::new(network),
      settings,
      policy,
      state: WorkerState::Parsed,
    })
  }

  pub fn state(&self) -> WorkerState {
    self.state
  }

  pub fn version(&self) -> &str {
    &self.settings.version
  }

  pub fn storage(&self) -> &S {
    &self.storage
  }

  /// Absolute URLs of the precache manifest, in order.
  ///
  /// Duplicate entries are rejected, as a batched cache add would.
  pub fn precache_urls(&self) -> Result<Vec<Url>> {
    let mut seen = HashSet::new();
    let mut urls = Vec::with_capacity(self.settings.precache.len());

    for path in &self.settings.precache {
      let url = self.settings.resolve(path)?;
      if !seen.insert(cache_key(&url)) {
        return Err(eyre!("Duplicate precache entry: {}", url));
      }
      urls.push(url);
    }

    Ok(urls)
  }

  /// Precache every manifest asset into the current generation.
  ///
  /// All fetches must succeed with a 2xx status before anything is written.
  /// On failure the error is returned and existing generations are untouched.
  pub async fn install(&mut self) -> Result<InstallReport> {
    let version = self.settings.version.clone();
    let urls = self.precache_urls()?;

    info!(version = %version, assets = urls.len(), "Installing cache generation");

    let network = self.network.as_ref();
    let fetches = urls.iter().map(|url| async move {
      let request = Request::subresource(url.clone());
      let response = network
        .fetch(&request)
        .await
        .map_err(|e| eyre!("Failed to precache {}: {}", url, e))?;

      if !response.is_success() {
        return Err(eyre!(
          "Failed to precache {}: status {}",
          url,
          response.status
        ));
      }

      Ok(CachedResponse::capture(cache_key(url), response))
    });

    let entries = match try_join_all(fetches).await {
      Ok(entries) => entries,
      Err(e) => {
        warn!(version = %version, error = %e, "Install failed, keeping previous generation");
        return Err(e);
      }
    };

    self.storage.put_generation(&version, &entries)?;

    // Skip waiting: eligible for activation right away
    self.state = WorkerState::Installed;
    info!(version = %version, entries = entries.len(), "Cache generation installed");

    Ok(InstallReport {
      version,
      entries: entries.len(),
    })
  }

  /// Delete every generation other than the current one, then claim clients.
  ///
  /// Refuses to run when the current generation was never installed, so a
  /// failed install cannot take the previous generation down with it.
  /// Individual deletion failures are logged and skipped.
  pub async fn activate(&mut self) -> Result<ActivationReport> {
    let version = self.settings.version.clone();
    let generations = self.storage.generations()?;

    if !generations.iter().any(|g| *g == version) {
      return Err(eyre!(
        "Cache generation {} is not installed; run install first",
        version
      ));
    }

    let mut report = ActivationReport {
      kept: Some(version.clone()),
      ..Default::default()
    };

    for generation in generations.into_iter().filter(|g| *g != version) {
      match self.storage.delete_generation(&generation) {
        Ok(true) => {
          debug!(generation = %generation, "Deleted stale cache generation");
          report.deleted.push(generation);
        }
        Ok(false) => {}
        Err(e) => {
          warn!(generation = %generation, error = %e, "Could not delete stale cache generation");
          report.failed.push(generation);
        }
      }
    }

    self.state = WorkerState::Active;
    info!(
      version = %version,
      deleted = report.deleted.len(),
      failed = report.failed.len(),
      "Cache generation active, clients claimed"
    );

    Ok(report)
  }

  /// Serve a request.
  ///
  /// Errors only surface from pass-through and navigation fetches; a cache
  /// miss on a sub-resource with no network resolves to [`Outcome::Offline`].
  pub async fn handle(&self, request: &Request) -> Result<Outcome> {
    let action = route(request, &self.policy);
    debug!(url = %request.url, ?action, "Routing request");

    match action {
      Action::PassThrough => {
        let response = self.network.fetch(request).await?;
        Ok(Outcome::PassThrough(response))
      }
      Action::ServeCachedOrFetch { key } => {
        if let Some(cached) = self.lookup(&key) {
          return Ok(Outcome::Cached(cached));
        }
        let response = self.network.fetch(request).await?;
        Ok(Outcome::Network(response))
      }
      Action::CacheThenNetwork { key } => {
        if let Some(cached) = self.lookup(&key) {
          return Ok(Outcome::Cached(cached));
        }
        match self.network.fetch(request).await {
          Ok(response) => Ok(Outcome::Network(response)),
          Err(e) => {
            warn!(url = %request.url, error = %e, "Cache miss and network unavailable");
            Ok(Outcome::Offline)
          }
        }
      }
    }
  }

  /// Find `key` in any stored generation, current one first.
  ///
  /// Until activation runs, an older generation may still be the only one
  /// holding the asset. Storage errors count as a miss.
  fn lookup(&self, key: &str) -> Option<CachedResponse> {
    let current = self.settings.version.as_str();
    let mut order = vec![current.to_string()];
    match self.storage.generations() {
      Ok(generations) => order.extend(generations.into_iter().rev().filter(|g| g != current)),
      Err(e) => warn!(error = %e, "Could not list cache generations"),
    }

    for generation in &order {
      match self.storage.get_entry(generation, key) {
        Ok(Some(entry)) => return Some(entry),
        Ok(None) => {}
        Err(e) => warn!(generation = %generation, key, error = %e, "Cache lookup failed"),
      }
    }

    None
  }
}

impl<S: CacheStorage, N: Network> Clone for OfflineCache<S, N> {
  fn clone(&self) -> Self {
    Self {
      storage: Arc::clone(&self.storage),
      network: Arc::clone(&self.network),
      settings: self.settings.clone(),
      policy: self.policy.clone(),
      state: self.state,
    }
  }
}
