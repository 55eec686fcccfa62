//! Handlers for `/profiles` endpoints.
//!
//! | Method   | Path | Notes |
//! |----------|------|-------|
//! | `POST`   | `/profiles` | 409 if the caller already has one |
//! | `GET`    | `/profiles/mine` | 404 if the caller has none |
//! | `GET`    | `/profiles/{id}` | Drafts are 404 to anyone but the owner |
//! | `PATCH`  | `/profiles/{id}` | Merge patch; owner only |
//! | `POST`   | `/profiles/{id}/publish` | Owner only |
//! | `POST`   | `/profiles/{id}/family` | Owner only |
//! | `DELETE` | `/profiles/{id}/family/{member_id}` | Owner only |
//! | `POST`   | `/profiles/{id}/activate` | Body: phrase, death date, place |

use std::sync::Arc;

use axum::{
  Json,
  extract::{Path, State},
  http::StatusCode,
  response::IntoResponse,
};
use chrono::NaiveDate;
use memora_core::{
  family::{FamilyMember, NewFamilyMember},
  lifecycle::{Activated, ActivationRequest},
  profile::{LivingProfile, NewLivingProfile, ProfilePatch},
};
use serde::Deserialize;
use uuid::Uuid;

use crate::{ApiState, Backend, Caller, error::ApiError};

type ApiResult<T> = Result<T, ApiError>;

// ─── Create & read ───────────────────────────────────────────────────────────

/// `POST /profiles`
pub async fn create<S: Backend>(
  State(state): State<Arc<ApiState<S>>>,
  Caller(caller): Caller,
  Json(body): Json<NewLivingProfile>,
) -> ApiResult<impl IntoResponse> {
  let profile = state.lifecycle.create(caller, body).await?;
  Ok((StatusCode::CREATED, Json(profile)))
}

/// `GET /profiles/mine`
pub async fn mine<S: Backend>(
  State(state): State<Arc<ApiState<S>>>,
  Caller(caller): Caller,
) -> ApiResult<Json<LivingProfile>> {
  let profile = state
    .lifecycle
    .get_own_profile(caller)
    .await?
    .ok_or_else(|| ApiError::NotFound(format!("user {caller} has no living profile")))?;
  Ok(Json(profile))
}

/// `GET /profiles/{id}`
pub async fn get_one<S: Backend>(
  State(state): State<Arc<ApiState<S>>>,
  caller: Option<Caller>,
  Path(id): Path<Uuid>,
) -> ApiResult<Json<LivingProfile>> {
  let profile = state
    .lifecycle
    .get_profile(caller.map(|Caller(c)| c), id)
    .await?;
  Ok(Json(profile))
}

// ─── Owner edits ─────────────────────────────────────────────────────────────

/// `PATCH /profiles/{id}`
pub async fn update<S: Backend>(
  State(state): State<Arc<ApiState<S>>>,
  Caller(caller): Caller,
  Path(id): Path<Uuid>,
  Json(patch): Json<ProfilePatch>,
) -> ApiResult<Json<LivingProfile>> {
  Ok(Json(state.lifecycle.update(caller, id, patch).await?))
}

/// `POST /profiles/{id}/publish`
pub async fn publish<S: Backend>(
  State(state): State<Arc<ApiState<S>>>,
  Caller(caller): Caller,
  Path(id): Path<Uuid>,
) -> ApiResult<Json<LivingProfile>> {
  Ok(Json(state.lifecycle.publish(caller, id).await?))
}

/// `POST /profiles/{id}/family`
pub async fn add_family_member<S: Backend>(
  State(state): State<Arc<ApiState<S>>>,
  Caller(caller): Caller,
  Path(id): Path<Uuid>,
  Json(body): Json<NewFamilyMember>,
) -> ApiResult<impl IntoResponse> {
  let member: FamilyMember = state.lifecycle.add_family_member(caller, id, body).await?;
  Ok((StatusCode::CREATED, Json(member)))
}

/// `DELETE /profiles/{id}/family/{member_id}`
pub async fn remove_family_member<S: Backend>(
  State(state): State<Arc<ApiState<S>>>,
  Caller(caller): Caller,
  Path((id, member_id)): Path<(Uuid, Uuid)>,
) -> ApiResult<Json<LivingProfile>> {
  let profile = state
    .lifecycle
    .remove_family_member(caller, id, member_id)
    .await?;
  Ok(Json(profile))
}

// ─── Activation ──────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct ActivateBody {
  #[serde(default)]
  pub secret_phrase: String,
  pub death_date:    NaiveDate,
  pub death_place:   Option<String>,
}

/// `POST /profiles/{id}/activate`. The caller is recorded as the activator.
pub async fn activate<S: Backend>(
  State(state): State<Arc<ApiState<S>>>,
  Caller(caller): Caller,
  Path(id): Path<Uuid>,
  Json(body): Json<ActivateBody>,
) -> ApiResult<Json<Activated>> {
  let request = ActivationRequest {
    profile_id:    id,
    secret_phrase: body.secret_phrase,
    death_date:    body.death_date,
    death_place:   body.death_place,
    activated_by:  caller,
  };
  Ok(Json(state.lifecycle.activate(request).await?))
}
