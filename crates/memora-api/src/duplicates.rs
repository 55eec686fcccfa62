//! Handler for `POST /duplicates`.
//!
//! Body: a [`MatchInput`]. Always answers 200; an incomplete input or an
//! unavailable record store yields an empty list.

use std::sync::Arc;

use axum::{Json, extract::State};
use memora_core::{
  duplicates::DuplicateMatch,
  memorial::MatchInput,
  similarity::{SimilarityLabel, similarity_label},
};
use serde::Serialize;

use crate::{ApiState, Backend};

/// A [`DuplicateMatch`] with its human-facing confidence band.
#[derive(Debug, Clone, Serialize)]
pub struct LabeledMatch {
  #[serde(flatten)]
  pub inner: DuplicateMatch,
  pub label: SimilarityLabel,
}

impl From<DuplicateMatch> for LabeledMatch {
  fn from(inner: DuplicateMatch) -> Self {
    Self { label: similarity_label(inner.score), inner }
  }
}

pub fn labeled(matches: Vec<DuplicateMatch>) -> Vec<LabeledMatch> {
  matches.into_iter().map(LabeledMatch::from).collect()
}

/// `POST /duplicates`
pub async fn check<S: Backend>(
  State(state): State<Arc<ApiState<S>>>,
  Json(input): Json<MatchInput>,
) -> Json<Vec<LabeledMatch>> {
  let matches = state.detector.find_potential_duplicates(&input).await;
  Json(labeled(matches))
}
