//! Extractor for the acting end user.

use axum::{
  extract::{FromRequestParts, OptionalFromRequestParts},
  http::request::Parts,
};
use uuid::Uuid;

use crate::error::ApiError;

/// Header carrying the acting user's UUID.
pub const CALLER_HEADER: &str = "x-memora-user";

/// The user on whose behalf a request is made.
///
/// Extracting `Caller` rejects with 401 when the header is missing or not a
/// UUID. Extracting `Option<Caller>` accepts a missing header but still
/// rejects a malformed one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Caller(pub Uuid);

fn parse(parts: &Parts) -> Result<Option<Caller>, ApiError> {
  let Some(value) = parts.headers.get(CALLER_HEADER) else {
    return Ok(None);
  };
  value
    .to_str()
    .ok()
    .and_then(|s| Uuid::parse_str(s.trim()).ok())
    .map(|id| Some(Caller(id)))
    .ok_or(ApiError::Unauthenticated)
}

impl<S: Send + Sync> FromRequestParts<S> for Caller {
  type Rejection = ApiError;

  async fn from_request_parts(
    parts: &mut Parts,
    _state: &S,
  ) -> Result<Self, Self::Rejection> {
    parse(parts)?.ok_or(ApiError::Unauthenticated)
  }
}

impl<S: Send + Sync> OptionalFromRequestParts<S> for Caller {
  type Rejection = ApiError;

  async fn from_request_parts(
    parts: &mut Parts,
    _state: &S,
  ) -> Result<Option<Self>, Self::Rejection> {
    parse(parts)
  }
}
