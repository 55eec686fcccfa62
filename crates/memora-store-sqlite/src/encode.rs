//! Encoding and decoding helpers between Rust domain types and the plain-text
//! representations stored in SQLite columns.
//!
//! Timestamps are stored as RFC 3339 strings, calendar dates as `YYYY-MM-DD`.
//! Embedded collections (images, family members, activation settings) are
//! stored as compact JSON. UUIDs are stored as hyphenated lowercase strings.

use chrono::{DateTime, NaiveDate, Utc};
use memora_core::{
  family::FamilyMembers,
  memorial::{CandidateRecord, Memorial},
  profile::{Activation, ActivationSettings, LivingProfile, ProfileStatus},
};
use uuid::Uuid;

use crate::{Error, Result};

// ─── Uuid ─────────────────────────────────────────────────────────────────────

pub fn encode_uuid(id: Uuid) -> String { id.hyphenated().to_string() }

pub fn decode_uuid(s: &str) -> Result<Uuid> { Ok(Uuid::parse_str(s)?) }

fn decode_opt_uuid(s: Option<String>) -> Result<Option<Uuid>> {
  s.as_deref().map(decode_uuid).transpose()
}

// ─── DateTime<Utc> ───────────────────────────────────────────────────────────

pub fn encode_dt(dt: DateTime<Utc>) -> String { dt.to_rfc3339() }

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(e.to_string()))
}

// ─── NaiveDate ───────────────────────────────────────────────────────────────

pub fn encode_date(d: NaiveDate) -> String { d.format("%Y-%m-%d").to_string() }

pub fn decode_date(s: &str) -> Result<NaiveDate> {
  NaiveDate::parse_from_str(s, "%Y-%m-%d")
    .map_err(|e| Error::DateParse(format!("{s:?}: {e}")))
}

fn decode_opt_date(s: Option<String>) -> Result<Option<NaiveDate>> {
  s.as_deref().map(decode_date).transpose()
}

// ─── ProfileStatus ───────────────────────────────────────────────────────────

pub fn encode_status(s: ProfileStatus) -> &'static str {
  match s {
    ProfileStatus::Draft => "draft",
    ProfileStatus::Active => "active",
    ProfileStatus::Converted => "converted",
  }
}

pub fn decode_status(s: &str) -> Result<ProfileStatus> {
  s.parse().map_err(|_| Error::UnknownStatus(s.to_owned()))
}

// ─── JSON columns ────────────────────────────────────────────────────────────

pub fn encode_images(images: &[String]) -> Result<String> {
  Ok(serde_json::to_string(images)?)
}

pub fn encode_family(members: &FamilyMembers) -> Result<String> {
  Ok(serde_json::to_string(members)?)
}

pub fn encode_settings(settings: &ActivationSettings) -> Result<String> {
  Ok(serde_json::to_string(settings)?)
}

// ─── Row types ───────────────────────────────────────────────────────────────

/// Column list matching the field order of [`RawProfile`].
pub const PROFILE_COLUMNS: &str = "
  profile_id, owner_id, first_name, last_name, birth_date, birth_place,
  father_name, mother_name, biography, images, status, family_members,
  activation_settings, memorial_id, death_date, activated_at, activated_by,
  created_at, updated_at, version";

/// Raw strings read directly from a `living_profiles` row.
pub struct RawProfile {
  pub profile_id:          String,
  pub owner_id:            String,
  pub first_name:          String,
  pub last_name:           String,
  pub birth_date:          String,
  pub birth_place:         Option<String>,
  pub father_name:         Option<String>,
  pub mother_name:         Option<String>,
  pub biography:           Option<String>,
  pub images:              String,
  pub status:              String,
  pub family_members:      String,
  pub activation_settings: String,
  // activation columns
  pub memorial_id:         Option<String>,
  pub death_date:          Option<String>,
  pub activated_at:        Option<String>,
  pub activated_by:        Option<String>,
  pub created_at:          String,
  pub updated_at:          String,
  pub version:             i64,
}

impl RawProfile {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      profile_id:          row.get(0)?,
      owner_id:            row.get(1)?,
      first_name:          row.get(2)?,
      last_name:           row.get(3)?,
      birth_date:          row.get(4)?,
      birth_place:         row.get(5)?,
      father_name:         row.get(6)?,
      mother_name:         row.get(7)?,
      biography:           row.get(8)?,
      images:              row.get(9)?,
      status:              row.get(10)?,
      family_members:      row.get(11)?,
      activation_settings: row.get(12)?,
      memorial_id:         row.get(13)?,
      death_date:          row.get(14)?,
      activated_at:        row.get(15)?,
      activated_by:        row.get(16)?,
      created_at:          row.get(17)?,
      updated_at:          row.get(18)?,
      version:             row.get(19)?,
    })
  }

  pub fn into_profile(self) -> Result<LivingProfile> {
    let profile_id = decode_uuid(&self.profile_id)?;
    let status = decode_status(&self.status)?;

    let activation = match (
      self.memorial_id,
      self.death_date,
      self.activated_at,
      self.activated_by,
    ) {
      (Some(memorial_id), Some(death_date), Some(activated_at), Some(activated_by)) => {
        Some(Activation {
          memorial_id:  decode_uuid(&memorial_id)?,
          death_date:   decode_date(&death_date)?,
          activated_at: decode_dt(&activated_at)?,
          activated_by: decode_uuid(&activated_by)?,
        })
      }
      _ if status.is_converted() => {
        return Err(Error::IncompleteActivation(profile_id));
      }
      _ => None,
    };

    Ok(LivingProfile {
      profile_id,
      owner_id: decode_uuid(&self.owner_id)?,
      first_name: self.first_name,
      last_name: self.last_name,
      birth_date: decode_date(&self.birth_date)?,
      birth_place: self.birth_place,
      father_name: self.father_name,
      mother_name: self.mother_name,
      biography: self.biography,
      images: serde_json::from_str(&self.images)?,
      status,
      family_members: serde_json::from_str(&self.family_members)?,
      activation_settings: serde_json::from_str(&self.activation_settings)?,
      activation,
      created_at: decode_dt(&self.created_at)?,
      updated_at: decode_dt(&self.updated_at)?,
      version: u64::try_from(self.version).unwrap_or_default(),
    })
  }
}

/// Column list matching the field order of [`RawMemorial`].
pub const MEMORIAL_COLUMNS: &str = "
  memorial_id, owner_id, first_name, last_name, birth_date, death_date,
  birth_place, death_place, father_name, mother_name, living_profile_id,
  created_at";

/// Raw strings read directly from a `memorials` row.
pub struct RawMemorial {
  pub memorial_id:       String,
  pub owner_id:          String,
  pub first_name:        String,
  pub last_name:         String,
  pub birth_date:        Option<String>,
  pub death_date:        String,
  pub birth_place:       Option<String>,
  pub death_place:       Option<String>,
  pub father_name:       Option<String>,
  pub mother_name:       Option<String>,
  pub living_profile_id: Option<String>,
  pub created_at:        String,
}

impl RawMemorial {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      memorial_id:       row.get(0)?,
      owner_id:          row.get(1)?,
      first_name:        row.get(2)?,
      last_name:         row.get(3)?,
      birth_date:        row.get(4)?,
      death_date:        row.get(5)?,
      birth_place:       row.get(6)?,
      death_place:       row.get(7)?,
      father_name:       row.get(8)?,
      mother_name:       row.get(9)?,
      living_profile_id: row.get(10)?,
      created_at:        row.get(11)?,
    })
  }

  pub fn into_memorial(self) -> Result<Memorial> {
    Ok(Memorial {
      memorial_id:       decode_uuid(&self.memorial_id)?,
      owner_id:          decode_uuid(&self.owner_id)?,
      first_name:        self.first_name,
      last_name:         self.last_name,
      birth_date:        decode_opt_date(self.birth_date)?,
      death_date:        decode_date(&self.death_date)?,
      birth_place:       self.birth_place,
      death_place:       self.death_place,
      father_name:       self.father_name,
      mother_name:       self.mother_name,
      living_profile_id: decode_opt_uuid(self.living_profile_id)?,
      created_at:        decode_dt(&self.created_at)?,
    })
  }

  pub fn into_candidate(self) -> Result<CandidateRecord> {
    Ok(self.into_memorial()?.to_candidate())
  }
}
