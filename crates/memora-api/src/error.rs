//! API error type and [`axum::response::IntoResponse`] implementation.

use axum::{
  Json,
  http::StatusCode,
  response::{IntoResponse, Response},
};
use memora_core::ErrorKind;
use serde_json::json;
use thiserror::Error;

use crate::duplicates::LabeledMatch;

/// An error returned by an API handler.
#[derive(Debug, Error)]
pub enum ApiError {
  #[error(transparent)]
  Core(#[from] memora_core::Error),

  #[error("not found: {0}")]
  NotFound(String),

  #[error("missing or malformed X-Memora-User header")]
  Unauthenticated,

  #[error("potential duplicates found")]
  Duplicates(Vec<LabeledMatch>),
}

impl ApiError {
  pub fn status(&self) -> StatusCode {
    match self {
      ApiError::Core(e) => match e.kind() {
        ErrorKind::Validation => StatusCode::BAD_REQUEST,
        ErrorKind::NotFound => StatusCode::NOT_FOUND,
        ErrorKind::Ownership | ErrorKind::Authentication => StatusCode::FORBIDDEN,
        ErrorKind::TerminalState | ErrorKind::Conflict => StatusCode::CONFLICT,
        ErrorKind::Dependency => StatusCode::BAD_GATEWAY,
      },
      ApiError::NotFound(_) => StatusCode::NOT_FOUND,
      ApiError::Unauthenticated => StatusCode::UNAUTHORIZED,
      ApiError::Duplicates(_) => StatusCode::CONFLICT,
    }
  }
}

impl IntoResponse for ApiError {
  fn into_response(self) -> Response {
    let status = self.status();
    if status.is_server_error() {
      tracing::error!(error = %self, "request failed");
    }

    let body = match self {
      ApiError::Duplicates(matches) => json!({
        "error": "potential duplicates found",
        "matches": matches,
      }),
      other => json!({ "error": other.to_string() }),
    };
    (status, Json(body)).into_response()
  }
}
