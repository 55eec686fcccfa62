//! Advisory duplicate detection for proposed memorials.
//!
//! Retrieval is broad (either name fragment may match) and scoring
//! restores precision. Nothing here blocks record creation: retrieval
//! failures degrade to "no duplicates found".

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::{
  Error, Result,
  memorial::{CandidateRecord, Memorial, MatchInput, NewMemorial},
  normalize::normalize,
  similarity::{MatchedField, score},
  store::{CandidateRetriever, MemorialFactory},
};

/// Tunables for [`DuplicateDetector`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectionConfig {
  /// Upper bound on candidates pulled from the retriever.
  pub candidate_limit: usize,
  /// Matches scoring below this are discarded.
  pub min_score:       u8,
  /// Upper bound on matches returned.
  pub max_results:     usize,
}

impl Default for DetectionConfig {
  fn default() -> Self {
    Self { candidate_limit: 50, min_score: 50, max_results: 5 }
  }
}

/// A candidate judged a probable duplicate of the input.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DuplicateMatch {
  pub candidate:      CandidateRecord,
  /// Integer in `0..=100`.
  pub score:          u8,
  pub matched_fields: Vec<MatchedField>,
}

/// Result of [`DuplicateDetector::create_unless_duplicate`].
#[derive(Debug, Clone)]
pub enum CreateOutcome {
  Created(Memorial),
  /// Probable duplicates exist and the caller did not override.
  Duplicates(Vec<DuplicateMatch>),
}

pub struct DuplicateDetector<R> {
  retriever: Arc<R>,
  config:    DetectionConfig,
}

impl<R> Clone for DuplicateDetector<R> {
  fn clone(&self) -> Self {
    Self { retriever: self.retriever.clone(), config: self.config }
  }
}

impl<R: CandidateRetriever> DuplicateDetector<R> {
  pub fn new(retriever: Arc<R>) -> Self {
    Self::with_config(retriever, DetectionConfig::default())
  }

  pub fn with_config(retriever: Arc<R>, config: DetectionConfig) -> Self {
    Self { retriever, config }
  }

  pub fn config(&self) -> DetectionConfig { self.config }

  /// Rank existing memorials that probably describe the same person as
  /// `input`, best first.
  ///
  /// Returns an empty list when the first name, last name or death date is
  /// missing, and when the retriever fails.
  pub async fn find_potential_duplicates(
    &self,
    input: &MatchInput,
  ) -> Vec<DuplicateMatch> {
    if !input.is_checkable() {
      return Vec::new();
    }

    let first = normalize(&input.first_name);
    let last = normalize(&input.last_name);
    let candidates = match self
      .retriever
      .search_candidates(&first, &last, self.config.candidate_limit)
      .await
    {
      Ok(candidates) => candidates,
      Err(e) => {
        tracing::warn!(error = %e, "candidate retrieval failed; skipping duplicate check");
        return Vec::new();
      }
    };

    let retrieved = candidates.len();
    let mut matches: Vec<DuplicateMatch> = candidates
      .into_iter()
      .filter_map(|candidate| {
        let s = score(input, &candidate);
        (s.value >= self.config.min_score).then(|| DuplicateMatch {
          candidate,
          score: s.value,
          matched_fields: s.matched_fields,
        })
      })
      .collect();

    // `sort_by` is stable: equal scores keep retrieval order.
    matches.sort_by(|a, b| b.score.cmp(&a.score));
    matches.truncate(self.config.max_results);

    tracing::debug!(retrieved, matched = matches.len(), "duplicate check complete");
    matches
  }

  /// Create `input` through `factory` unless probable duplicates exist.
  /// `override_duplicates` skips the check's verdict.
  pub async fn create_unless_duplicate<F: MemorialFactory>(
    &self,
    factory: &F,
    input: NewMemorial,
    override_duplicates: bool,
  ) -> Result<CreateOutcome> {
    if input.first_name.trim().is_empty() || input.last_name.trim().is_empty() {
      return Err(Error::Validation("first_name and last_name are required".into()));
    }

    if !override_duplicates {
      let matches = self.find_potential_duplicates(&input.match_input()).await;
      if !matches.is_empty() {
        return Ok(CreateOutcome::Duplicates(matches));
      }
    }

    let memorial = factory
      .create_memorial(input)
      .await
      .map_err(|e| Error::Factory(Box::new(e)))?;
    tracing::info!(memorial_id = %memorial.memorial_id, override_duplicates, "memorial created");
    Ok(CreateOutcome::Created(memorial))
  }
}
