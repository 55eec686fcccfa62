//! Memorial records and the comparable projections used for duplicate
//! detection.
//!
//! A memorial is created once by a [`MemorialFactory`](crate::store::MemorialFactory)
//! and never mutated afterwards.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::normalize::is_blank;

// ─── Memorial ────────────────────────────────────────────────────────────────

/// A public memorial record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Memorial {
  pub memorial_id:       Uuid,
  pub owner_id:          Uuid,
  pub first_name:        String,
  pub last_name:         String,
  pub birth_date:        Option<NaiveDate>,
  pub death_date:        NaiveDate,
  pub birth_place:       Option<String>,
  pub death_place:       Option<String>,
  pub father_name:       Option<String>,
  pub mother_name:       Option<String>,
  /// Set when the memorial was produced by activating a living profile.
  pub living_profile_id: Option<Uuid>,
  /// Server-assigned.
  pub created_at:        DateTime<Utc>,
}

impl Memorial {
  /// The fields duplicate detection compares against.
  pub fn to_candidate(&self) -> CandidateRecord {
    CandidateRecord {
      memorial_id: self.memorial_id,
      first_name:  self.first_name.clone(),
      last_name:   self.last_name.clone(),
      birth_date:  self.birth_date,
      death_date:  self.death_date,
      birth_place: self.birth_place.clone(),
      death_place: self.death_place.clone(),
    }
  }
}

/// Input to [`MemorialFactory::create_memorial`](crate::store::MemorialFactory::create_memorial).
/// `memorial_id` and `created_at` are always assigned by the factory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewMemorial {
  pub owner_id:          Uuid,
  pub first_name:        String,
  pub last_name:         String,
  pub birth_date:        Option<NaiveDate>,
  pub death_date:        NaiveDate,
  pub birth_place:       Option<String>,
  pub death_place:       Option<String>,
  pub father_name:       Option<String>,
  pub mother_name:       Option<String>,
  #[serde(default)]
  pub living_profile_id: Option<Uuid>,
}

impl NewMemorial {
  /// The duplicate-detection view of this not-yet-created memorial.
  pub fn match_input(&self) -> MatchInput {
    MatchInput {
      first_name:  self.first_name.clone(),
      last_name:   self.last_name.clone(),
      birth_date:  self.birth_date,
      death_date:  Some(self.death_date),
      birth_place: self.birth_place.clone(),
      death_place: self.death_place.clone(),
    }
  }
}

// ─── Comparison projections ──────────────────────────────────────────────────

/// An existing memorial's comparable fields, as returned by a
/// [`CandidateRetriever`](crate::store::CandidateRetriever).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateRecord {
  pub memorial_id: Uuid,
  pub first_name:  String,
  pub last_name:   String,
  pub birth_date:  Option<NaiveDate>,
  pub death_date:  NaiveDate,
  pub birth_place: Option<String>,
  pub death_place: Option<String>,
}

/// The proposed record being checked for duplicates.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchInput {
  #[serde(default)]
  pub first_name:  String,
  #[serde(default)]
  pub last_name:   String,
  pub birth_date:  Option<NaiveDate>,
  pub death_date:  Option<NaiveDate>,
  pub birth_place: Option<String>,
  pub death_place: Option<String>,
}

impl MatchInput {
  /// First name, last name and death date are all present.
  pub fn is_checkable(&self) -> bool {
    !is_blank(Some(&self.first_name))
      && !is_blank(Some(&self.last_name))
      && self.death_date.is_some()
  }
}
