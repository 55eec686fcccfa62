//! Edit-distance similarity and the weighted multi-field duplicate score.
//!
//! The score is a fixed 100-point pool split across five buckets. Buckets
//! whose inputs are missing still count toward the denominator, so a pair of
//! records that share only a name and a death date can never score above 70.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display};

use crate::{
  memorial::{CandidateRecord, MatchInput},
  normalize::{is_blank, normalize},
};

// ─── Weights ─────────────────────────────────────────────────────────────────

pub const NAME_WEIGHT:        f64 = 40.0;
pub const DEATH_DATE_WEIGHT:  f64 = 30.0;
pub const BIRTH_DATE_WEIGHT:  f64 = 20.0;
pub const BIRTH_PLACE_WEIGHT: f64 = 5.0;
pub const DEATH_PLACE_WEIGHT: f64 = 5.0;

/// Sum of every bucket weight; always the denominator of the final score.
pub const TOTAL_WEIGHT: f64 = NAME_WEIGHT
  + DEATH_DATE_WEIGHT
  + BIRTH_DATE_WEIGHT
  + BIRTH_PLACE_WEIGHT
  + DEATH_PLACE_WEIGHT;

/// Average first/last-name similarity must exceed this for the name bucket.
pub const NAME_THRESHOLD:  f64 = 0.8;
/// Place similarity must exceed this for a place bucket.
pub const PLACE_THRESHOLD: f64 = 0.7;

// ─── Matched fields ──────────────────────────────────────────────────────────

/// A scoring bucket that contributed to a match. Declaration order is the
/// order in which labels appear in [`Score::matched_fields`].
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  PartialOrd,
  Ord,
  Hash,
  Serialize,
  Deserialize,
  Display,
  AsRefStr,
)]
pub enum MatchedField {
  #[serde(rename = "name")]
  #[strum(serialize = "name")]
  Name,
  #[serde(rename = "death date")]
  #[strum(serialize = "death date")]
  DeathDate,
  #[serde(rename = "birth date")]
  #[strum(serialize = "birth date")]
  BirthDate,
  #[serde(rename = "birth place")]
  #[strum(serialize = "birth place")]
  BirthPlace,
  #[serde(rename = "death place")]
  #[strum(serialize = "death place")]
  DeathPlace,
}

/// The outcome of comparing one input against one candidate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Score {
  /// Integer in `0..=100`.
  pub value:          u8,
  pub matched_fields: Vec<MatchedField>,
}

// ─── Primitives ──────────────────────────────────────────────────────────────

/// Similarity ratio in `[0, 1]` between two strings after normalization.
///
/// `1 - levenshtein / longest`, measured in characters. Two strings that
/// normalize to the same value (including both empty) score exactly `1.0`.
pub fn string_similarity(a: &str, b: &str) -> f64 {
  let a = normalize(a);
  let b = normalize(b);
  if a == b {
    return 1.0;
  }

  let longest = a.chars().count().max(b.chars().count());
  let distance = strsim::levenshtein(&a, &b);
  1.0 - distance as f64 / longest as f64
}

/// Exact date equality. Two absent dates do not match.
pub fn dates_match(a: Option<NaiveDate>, b: Option<NaiveDate>) -> bool {
  matches!((a, b), (Some(a), Some(b)) if a == b)
}

fn place_similarity(a: Option<&str>, b: Option<&str>) -> Option<f64> {
  if is_blank(a) || is_blank(b) {
    return None;
  }
  Some(string_similarity(a?, b?))
}

// ─── Aggregate ───────────────────────────────────────────────────────────────

/// Score `input` against `candidate` across all five buckets.
pub fn score(input: &MatchInput, candidate: &CandidateRecord) -> Score {
  let mut total = 0.0;
  let mut matched_fields = Vec::new();

  let name_similarity = (string_similarity(&input.first_name, &candidate.first_name)
    + string_similarity(&input.last_name, &candidate.last_name))
    / 2.0;
  if name_similarity > NAME_THRESHOLD {
    total += name_similarity * NAME_WEIGHT;
    matched_fields.push(MatchedField::Name);
  }

  if dates_match(input.death_date, Some(candidate.death_date)) {
    total += DEATH_DATE_WEIGHT;
    matched_fields.push(MatchedField::DeathDate);
  }

  if dates_match(input.birth_date, candidate.birth_date) {
    total += BIRTH_DATE_WEIGHT;
    matched_fields.push(MatchedField::BirthDate);
  }

  let places = [
    (
      input.birth_place.as_deref(),
      candidate.birth_place.as_deref(),
      BIRTH_PLACE_WEIGHT,
      MatchedField::BirthPlace,
    ),
    (
      input.death_place.as_deref(),
      candidate.death_place.as_deref(),
      DEATH_PLACE_WEIGHT,
      MatchedField::DeathPlace,
    ),
  ];
  for (ours, theirs, weight, field) in places {
    if let Some(similarity) = place_similarity(ours, theirs)
      && similarity > PLACE_THRESHOLD
    {
      total += similarity * weight;
      matched_fields.push(field);
    }
  }

  let value = (100.0 * total / TOTAL_WEIGHT).round().clamp(0.0, 100.0) as u8;
  Score { value, matched_fields }
}

// ─── Presentation ────────────────────────────────────────────────────────────

/// Human-facing confidence band for a score. Never used for gating.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Display, AsRefStr)]
pub enum SimilarityLabel {
  #[serde(rename = "very high")]
  #[strum(serialize = "very high")]
  VeryHigh,
  #[serde(rename = "high")]
  #[strum(serialize = "high")]
  High,
  #[serde(rename = "medium")]
  #[strum(serialize = "medium")]
  Medium,
  #[serde(rename = "low")]
  #[strum(serialize = "low")]
  Low,
}

pub fn similarity_label(score: u8) -> SimilarityLabel {
  match score {
    90..=u8::MAX => SimilarityLabel::VeryHigh,
    75..=89 => SimilarityLabel::High,
    60..=74 => SimilarityLabel::Medium,
    _ => SimilarityLabel::Low,
  }
}
