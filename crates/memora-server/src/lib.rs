//! HTTP server for Memora.
//!
//! Wires configuration, the SQLite store and service authentication around
//! the [`memora_api`] router. The binary in `main.rs` is a thin shell over
//! [`open_store`] and [`router`].

pub mod auth;
pub mod error;

pub use error::Error;

use std::{
  path::{Path, PathBuf},
  sync::Arc,
};

use axum::{Router, middleware};
use memora_api::{ApiState, Backend};
use memora_core::{
  duplicates::DetectionConfig,
  lifecycle::{
    DEFAULT_ACTIVATION_LEASE_SECS, MAX_ACTIVATION_LEASE_SECS, validate_lease,
  },
};
use memora_store_sqlite::SqliteStore;
use serde::Deserialize;
use tower_http::trace::TraceLayer;

use auth::{AuthConfig, require_auth};

// ─── Configuration ────────────────────────────────────────────────────────────

/// Runtime server configuration, deserialised from `config.toml` and
/// `MEMORA_*` environment variables.
#[derive(Deserialize, Clone)]
pub struct ServerConfig {
  pub host:                  String,
  pub port:                  u16,
  pub store_path:            PathBuf,
  pub auth_username:         String,
  pub auth_password_hash:    String,
  #[serde(default = "default_lease_secs")]
  pub activation_lease_secs: u64,
  #[serde(default)]
  pub detection:             DetectionConfig,
}

fn default_lease_secs() -> u64 { DEFAULT_ACTIVATION_LEASE_SECS.unsigned_abs() }

impl ServerConfig {
  /// The configured activation lease, rejected if zero or longer than a day.
  pub fn activation_lease(&self) -> Result<chrono::Duration, Error> {
    let secs = i64::try_from(self.activation_lease_secs)
      .unwrap_or(i64::MAX)
      .min(MAX_ACTIVATION_LEASE_SECS + 1);
    validate_lease(chrono::Duration::seconds(secs)).map_err(Error::Config)
  }

  /// Check every setting that deserialisation alone cannot.
  pub fn validate(&self) -> Result<(), Error> {
    self.activation_lease()?;
    Ok(())
  }

  pub fn auth(&self) -> AuthConfig {
    AuthConfig {
      username:      self.auth_username.clone(),
      password_hash: self.auth_password_hash.clone(),
    }
  }
}

// ─── Application state ────────────────────────────────────────────────────────

/// Everything the router needs, shared across requests.
#[derive(Clone)]
pub struct AppState<S> {
  pub store:  Arc<S>,
  pub config: Arc<ServerConfig>,
  pub auth:   Arc<AuthConfig>,
}

impl<S> AppState<S> {
  pub fn new(store: S, config: ServerConfig) -> Self {
    Self {
      store:  Arc::new(store),
      auth:   Arc::new(config.auth()),
      config: Arc::new(config),
    }
  }
}

// ─── Router ───────────────────────────────────────────────────────────────────

/// Build the server router: the JSON API under `/api`, behind Basic auth,
/// with request tracing. Fails if the configuration is invalid.
pub fn router<S: Backend>(state: AppState<S>) -> Result<Router, Error> {
  let api_state = ApiState::new(state.store.clone())
    .with_detection(state.config.detection)
    .with_activation_lease(state.config.activation_lease()?)
    .map_err(Error::Config)?;

  let api = memora_api::api_router(api_state)
    .layer(middleware::from_fn_with_state(state.auth.clone(), require_auth));

  Ok(
    Router::new()
      .nest("/api", api)
      .layer(TraceLayer::new_for_http()),
  )
}

/// Open the SQLite store named by `config.store_path`, expanding a leading
/// `~`.
pub async fn open_store(config: &ServerConfig) -> Result<SqliteStore, Error> {
  let path = expand_tilde(&config.store_path);
  tracing::info!(path = %path.display(), "opening store");
  Ok(SqliteStore::open(&path).await?)
}

/// Expand a leading `~` to the user's home directory.
pub fn expand_tilde(path: &Path) -> PathBuf {
  let s = path.to_string_lossy();
  if let Some(rest) = s.strip_prefix("~/")
    && let Ok(home) = std::env::var("HOME")
  {
    return PathBuf::from(home).join(rest);
  }
  path.to_path_buf()
}
