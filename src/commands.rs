//! CLI subcommands and their execution.

use clap::Subcommand;
use color_eyre::{eyre::eyre, Result};
use serde_json::Value;
use std::io::Write;
use std::time::Duration;
use tracing::info;

use crate::cache::{
  route, CacheSettings, CacheStorage, HttpNetwork, OfflineCache, Outcome, Request, RequestMode,
  SqliteStorage,
};
use crate::config::Config;
use crate::db::Database;
use crate::persist::{keys, Persistence, SqliteStore};
use crate::session::{self, Session};

#[derive(Subcommand, Debug)]
pub enum Command {
  /// Precache the shell manifest into the current cache generation.
  ///
  /// Older generations are kept until `activate`; use `update` to do both.
  Install,
  /// Purge every other cache generation and take control
  Activate,
  /// Install, then activate without waiting
  Update,
  /// List cache generations and their entry counts
  Status,
  /// Show how a request would be routed
  Route {
    /// Absolute URL, or a path relative to the origin
    url: String,
    /// Treat the request as a full-page navigation
    #[arg(long)]
    navigate: bool,
  },
  /// Serve a request through the offline cache and write the body to stdout
  Fetch {
    /// Absolute URL, or a path relative to the origin
    url: String,
    /// Treat the request as a full-page navigation
    #[arg(long)]
    navigate: bool,
  },
  /// Read and write persisted client state
  #[command(subcommand)]
  Kv(KvCommand),
  /// Print the restored client session as JSON
  Session,
  /// Manage the stored AI provider key
  #[command(subcommand)]
  ApiKey(ApiKeyCommand),
}

#[derive(Subcommand, Debug)]
pub enum KvCommand {
  /// Print the JSON value stored under a key
  Get {
    key: String,
    /// JSON value printed when the key is missing or corrupt
    #[arg(long)]
    default: Option<String>,
  },
  /// Store a value. Input that is not valid JSON is stored as a string.
  Set { key: String, value: String },
  /// Remove a key
  Rm { key: String },
  /// List stored keys
  List,
}

#[derive(Subcommand, Debug)]
pub enum ApiKeyCommand {
  /// Store the key
  Set { key: String },
  /// Remove the key
  Clear,
  /// Report whether a key is stored
  Show,
}

/// Execute a command against the configured database and origin.
pub async fn run(command: Command, config: &Config) -> Result<()> {
  match command {
    Command::Route { url, navigate } => route_request(config, &url, navigate),
    Command::Install => {
      let mut cache = open_cache(config)?;
      let report = cache.install().await?;
      println!("installed {} ({} entries)", report.version, report.entries);
      Ok(())
    }
    Command::Activate => {
      let mut cache = open_cache(config)?;
      let report = cache.activate().await?;
      print_activation(cache.version(), &report.deleted, &report.failed);
      Ok(())
    }
    Command::Update => {
      let mut cache = open_cache(config)?;
      let installed = cache.install().await?;
      println!("installed {} ({} entries)", installed.version, installed.entries);
      let report = cache.activate().await?;
      info!(state = ?cache.state(), "Update complete");
      print_activation(cache.version(), &report.deleted, &report.failed);
      Ok(())
    }
    Command::Status => {
      let cache = open_cache(config)?;
      let storage = cache.storage();
      let generations = storage.generations()?;
      if generations.is_empty() {
        println!("no cache generations");
      }
      for generation in generations {
        let marker = if generation == cache.version() { "*" } else { " " };
        println!(
          "{} {} ({} entries)",
          marker,
          generation,
          storage.entry_count(&generation)?
        );
      }
      Ok(())
    }
    Command::Fetch { url, navigate } => {
      let cache = open_cache(config)?;
      let request = Request::parse(&url, &config.origin_url()?, mode(navigate))?;
      let outcome = cache.handle(&request).await?;
      info!(url = %request.url, source = outcome.source(), "Request served");
      if let Outcome::Cached(entry) = &outcome {
        info!(digest = %entry.digest, cached_at = %entry.cached_at, "Cached copy");
      }

      match outcome.response() {
        Some(response) => {
          let mut stdout = std::io::stdout().lock();
          stdout.write_all(&response.body)?;
          stdout.flush()?;
          Ok(())
        }
        None => Err(eyre!("Offline: no cached copy of {}", request.url)),
      }
    }
    Command::Kv(kv) => run_kv(kv, &open_persistence(config)?),
    Command::Session => {
      let session = Session::restore(&open_persistence(config)?);
      println!("{}", serde_json::to_string_pretty(&session)?);
      Ok(())
    }
    Command::ApiKey(cmd) => {
      let persistence = open_persistence(config)?;
      match cmd {
        ApiKeyCommand::Set { key } => session::set_api_key(&persistence, &key),
        ApiKeyCommand::Clear => session::clear_api_key(&persistence),
        ApiKeyCommand::Show => match session::api_key(&persistence) {
          Some(_) => println!("{} is set", keys::GEMINI_API_KEY),
          None => println!("{} is not set", keys::GEMINI_API_KEY),
        },
      }
      Ok(())
    }
  }
}

fn run_kv(command: KvCommand, persistence: &Persistence<SqliteStore>) -> Result<()> {
  match command {
    KvCommand::Get { key, default } => {
      let default = match default {
        Some(raw) => serde_json::from_str(&raw)
          .map_err(|e| eyre!("--default is not valid JSON: {}", e))?,
        None => Value::Null,
      };
      let value: Value = persistence.load(&key, default);
      println!("{}", value);
    }
    KvCommand::Set { key, value } => {
      let value = parse_value(value);
      persistence.save(&key, &value);
    }
    KvCommand::Rm { key } => persistence.remove(&key),
    KvCommand::List => {
      for key in persistence.keys() {
        println!("{}", key);
      }
    }
  }
  Ok(())
}

fn route_request(config: &Config, url: &str, navigate: bool) -> Result<()> {
  let settings = CacheSettings::from_config(config)?;
  let request = Request::parse(url, &settings.origin, mode(navigate))?;
  let action = route(&request, &settings.policy()?);
  println!("{:?}", action);
  Ok(())
}

fn open_cache(config: &Config) -> Result<OfflineCache<SqliteStorage, HttpNetwork>> {
  let settings = CacheSettings::from_config(config)?;
  let storage = SqliteStorage::new(open_database(config)?);
  let network = HttpNetwork::new(Duration::from_secs(config.cache.request_timeout_secs))?;
  OfflineCache::new(storage, network, settings)
}

fn open_persistence(config: &Config) -> Result<Persistence<SqliteStore>> {
  Ok(Persistence::new(SqliteStore::new(open_database(config)?)))
}

fn open_database(config: &Config) -> Result<Database> {
  Database::open(&config.database_path()?)
}

fn mode(navigate: bool) -> RequestMode {
  if navigate {
    RequestMode::Navigate
  } else {
    RequestMode::Subresource
  }
}

/// Parse CLI input as JSON, falling back to a JSON string.
fn parse_value(input: String) -> Value {
  serde_json::from_str(&input).unwrap_or(Value::String(input))
}

fn print_activation(version: &str, deleted: &[String], failed: &[String]) {
  println!("active {}", version);
  for generation in deleted {
    println!("  deleted {}", generation);
  }
  for generation in failed {
    println!("  could not delete {}", generation);
  }
}
