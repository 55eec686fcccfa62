//! Handler for `POST /memorials`.
//!
//! The memorial is owned by the caller. Unless `override_duplicates` is set,
//! probable duplicates turn the request into a 409 carrying the matches.

use std::sync::Arc;

use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use chrono::NaiveDate;
use memora_core::{duplicates::CreateOutcome, memorial::NewMemorial};
use serde::Deserialize;

use crate::{ApiState, Backend, Caller, duplicates::labeled, error::ApiError};

#[derive(Debug, Deserialize)]
pub struct CreateBody {
  pub first_name:          String,
  pub last_name:           String,
  pub birth_date:          Option<NaiveDate>,
  pub death_date:          NaiveDate,
  pub birth_place:         Option<String>,
  pub death_place:         Option<String>,
  pub father_name:         Option<String>,
  pub mother_name:         Option<String>,
  #[serde(default)]
  pub override_duplicates: bool,
}

/// `POST /memorials`
pub async fn create<S: Backend>(
  State(state): State<Arc<ApiState<S>>>,
  Caller(caller): Caller,
  Json(body): Json<CreateBody>,
) -> Result<impl IntoResponse, ApiError> {
  let input = NewMemorial {
    owner_id:          caller,
    first_name:        body.first_name,
    last_name:         body.last_name,
    birth_date:        body.birth_date,
    death_date:        body.death_date,
    birth_place:       body.birth_place,
    death_place:       body.death_place,
    father_name:       body.father_name,
    mother_name:       body.mother_name,
    living_profile_id: None,
  };

  let outcome = state
    .detector
    .create_unless_duplicate(state.store.as_ref(), input, body.override_duplicates)
    .await?;
  match outcome {
    CreateOutcome::Created(memorial) => Ok((StatusCode::CREATED, Json(memorial))),
    CreateOutcome::Duplicates(matches) => Err(ApiError::Duplicates(labeled(matches))),
  }
}
