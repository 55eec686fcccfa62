//! Error type for `memora-store-sqlite`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("database error: {0}")]
  Database(#[from] tokio_rusqlite::Error),

  #[error("json error: {0}")]
  Json(#[from] serde_json::Error),

  #[error("uuid parse error: {0}")]
  Uuid(#[from] uuid::Error),

  #[error("date/time parse error: {0}")]
  DateParse(String),

  #[error("unknown profile status: {0:?}")]
  UnknownStatus(String),

  /// A converted row is missing one of its activation columns.
  #[error("living profile {0} is converted but has an incomplete activation record")]
  IncompleteActivation(uuid::Uuid),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
