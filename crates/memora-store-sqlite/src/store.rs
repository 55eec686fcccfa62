//! [`SqliteStore`], the SQLite implementation of the Memora collaborator
//! traits.

use std::path::Path;

use chrono::{DateTime, Utc};
use rusqlite::OptionalExtension as _;
use uuid::Uuid;

use memora_core::{
  memorial::{CandidateRecord, Memorial, NewMemorial},
  normalize::normalize,
  profile::{Activation, LivingProfile},
  store::{CandidateRetriever, LivingProfileStore, MemorialFactory},
};

use crate::{
  Result,
  encode::{
    MEMORIAL_COLUMNS, PROFILE_COLUMNS, RawMemorial, RawProfile, encode_date,
    encode_dt, encode_family, encode_images, encode_settings, encode_status,
    encode_uuid,
  },
  schema::SCHEMA,
};

// ─── Store ───────────────────────────────────────────────────────────────────

/// A Memora store backed by a single SQLite file.
///
/// Clones share the same underlying connection.
#[derive(Clone)]
pub struct SqliteStore {
  conn: tokio_rusqlite::Connection,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an in-memory store.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  /// Retrieve a memorial by UUID. Returns `None` if not found.
  pub async fn get_memorial(&self, id: Uuid) -> Result<Option<Memorial>> {
    let id_str = encode_uuid(id);

    let raw: Option<RawMemorial> = self
      .conn
      .call(move |conn| {
        Ok(conn
          .query_row(
            &format!("SELECT {MEMORIAL_COLUMNS} FROM memorials WHERE memorial_id = ?1"),
            rusqlite::params![id_str],
            RawMemorial::from_row,
          )
          .optional()?)
      })
      .await?;

    raw.map(RawMemorial::into_memorial).transpose()
  }

  /// All memorials created from the given living profile. The schema allows
  /// at most one.
  pub async fn memorials_for_profile(&self, profile_id: Uuid) -> Result<Vec<Memorial>> {
    let id_str = encode_uuid(profile_id);

    let raws: Vec<RawMemorial> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {MEMORIAL_COLUMNS} FROM memorials WHERE living_profile_id = ?1"
        ))?;
        let rows = stmt
          .query_map(rusqlite::params![id_str], RawMemorial::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawMemorial::into_memorial).collect()
  }

  async fn profile_where(
    &self,
    column: &'static str,
    value: Uuid,
  ) -> Result<Option<LivingProfile>> {
    let value_str = encode_uuid(value);

    let raw: Option<RawProfile> = self
      .conn
      .call(move |conn| {
        Ok(conn
          .query_row(
            &format!("SELECT {PROFILE_COLUMNS} FROM living_profiles WHERE {column} = ?1"),
            rusqlite::params![value_str],
            RawProfile::from_row,
          )
          .optional()?)
      })
      .await?;

    raw.map(RawProfile::into_profile).transpose()
  }
}

// ─── CandidateRetriever impl ─────────────────────────────────────────────────

impl CandidateRetriever for SqliteStore {
  type Error = crate::Error;

  async fn search_candidates(
    &self,
    first_fragment: &str,
    last_fragment:  &str,
    limit:          usize,
  ) -> Result<Vec<CandidateRecord>> {
    // Both sides are normalized, so LIKE never sees `%` or `_` from input.
    let first_pattern = format!("%{}%", normalize(first_fragment));
    let last_pattern  = format!("%{}%", normalize(last_fragment));
    let limit_val     = i64::try_from(limit).unwrap_or(i64::MAX);

    let raws: Vec<RawMemorial> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {MEMORIAL_COLUMNS}
           FROM memorials
           WHERE first_name_norm LIKE ?1 OR last_name_norm LIKE ?2
           ORDER BY rowid
           LIMIT ?3"
        ))?;
        let rows = stmt
          .query_map(
            rusqlite::params![first_pattern, last_pattern, limit_val],
            RawMemorial::from_row,
          )?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawMemorial::into_candidate).collect()
  }
}

// ─── MemorialFactory impl ────────────────────────────────────────────────────

impl MemorialFactory for SqliteStore {
  type Error = crate::Error;

  async fn create_memorial(&self, input: NewMemorial) -> Result<Memorial> {
    let memorial = Memorial {
      memorial_id:       Uuid::new_v4(),
      owner_id:          input.owner_id,
      first_name:        input.first_name,
      last_name:         input.last_name,
      birth_date:        input.birth_date,
      death_date:        input.death_date,
      birth_place:       input.birth_place,
      death_place:       input.death_place,
      father_name:       input.father_name,
      mother_name:       input.mother_name,
      living_profile_id: input.living_profile_id,
      created_at:        Utc::now(),
    };

    let id_str         = encode_uuid(memorial.memorial_id);
    let owner_str      = encode_uuid(memorial.owner_id);
    let first_name     = memorial.first_name.clone();
    let last_name      = memorial.last_name.clone();
    let first_norm     = normalize(&memorial.first_name);
    let last_norm      = normalize(&memorial.last_name);
    let birth_date_str = memorial.birth_date.map(encode_date);
    let death_date_str = encode_date(memorial.death_date);
    let birth_place    = memorial.birth_place.clone();
    let death_place    = memorial.death_place.clone();
    let father_name    = memorial.father_name.clone();
    let mother_name    = memorial.mother_name.clone();
    let profile_str    = memorial.living_profile_id.map(encode_uuid);
    let created_str    = encode_dt(memorial.created_at);

    let existing: Option<RawMemorial> = self
      .conn
      .call(move |conn| {
        // UNIQUE(living_profile_id) makes creation from a profile
        // idempotent: a second call returns the first call's memorial.
        let n = conn.execute(
          "INSERT INTO memorials (
             memorial_id, owner_id, first_name, last_name,
             first_name_norm, last_name_norm, birth_date, death_date,
             birth_place, death_place, father_name, mother_name,
             living_profile_id, created_at
           ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)
           ON CONFLICT(living_profile_id) DO NOTHING",
          rusqlite::params![
            id_str,
            owner_str,
            first_name,
            last_name,
            first_norm,
            last_norm,
            birth_date_str,
            death_date_str,
            birth_place,
            death_place,
            father_name,
            mother_name,
            profile_str,
            created_str,
          ],
        )?;
        if n == 1 {
          return Ok(None);
        }
        Ok(Some(conn.query_row(
          &format!("SELECT {MEMORIAL_COLUMNS} FROM memorials WHERE living_profile_id = ?1"),
          rusqlite::params![profile_str],
          RawMemorial::from_row,
        )?))
      })
      .await?;

    match existing {
      Some(raw) => raw.into_memorial(),
      None => Ok(memorial),
    }
  }
}

// ─── LivingProfileStore impl ─────────────────────────────────────────────────

impl LivingProfileStore for SqliteStore {
  type Error = crate::Error;

  async fn insert_profile(&self, profile: &LivingProfile) -> Result<bool> {
    let id_str         = encode_uuid(profile.profile_id);
    let owner_str      = encode_uuid(profile.owner_id);
    let first_name     = profile.first_name.clone();
    let last_name      = profile.last_name.clone();
    let birth_date_str = encode_date(profile.birth_date);
    let birth_place    = profile.birth_place.clone();
    let father_name    = profile.father_name.clone();
    let mother_name    = profile.mother_name.clone();
    let biography      = profile.biography.clone();
    let images_str     = encode_images(&profile.images)?;
    let status_str     = encode_status(profile.status);
    let family_str     = encode_family(&profile.family_members)?;
    let settings_str   = encode_settings(&profile.activation_settings)?;
    let created_str    = encode_dt(profile.created_at);
    let updated_str    = encode_dt(profile.updated_at);
    let version        = i64::try_from(profile.version).unwrap_or(i64::MAX);

    let inserted = self
      .conn
      .call(move |conn| {
        // UNIQUE(owner_id) decides the one-profile-per-owner race.
        let n = conn.execute(
          "INSERT INTO living_profiles (
             profile_id, owner_id, first_name, last_name, birth_date,
             birth_place, father_name, mother_name, biography, images,
             status, family_members, activation_settings,
             created_at, updated_at, version
           ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16)
           ON CONFLICT(owner_id) DO NOTHING",
          rusqlite::params![
            id_str,
            owner_str,
            first_name,
            last_name,
            birth_date_str,
            birth_place,
            father_name,
            mother_name,
            biography,
            images_str,
            status_str,
            family_str,
            settings_str,
            created_str,
            updated_str,
            version,
          ],
        )?;
        Ok(n == 1)
      })
      .await?;

    Ok(inserted)
  }

  async fn get_profile(&self, profile_id: Uuid) -> Result<Option<LivingProfile>> {
    self.profile_where("profile_id", profile_id).await
  }

  async fn get_profile_by_owner(&self, owner_id: Uuid) -> Result<Option<LivingProfile>> {
    self.profile_where("owner_id", owner_id).await
  }

  async fn replace_profile(
    &self,
    profile:          &LivingProfile,
    expected_version: u64,
    stale_before:     DateTime<Utc>,
  ) -> Result<bool> {
    let id_str         = encode_uuid(profile.profile_id);
    let first_name     = profile.first_name.clone();
    let last_name      = profile.last_name.clone();
    let birth_date_str = encode_date(profile.birth_date);
    let birth_place    = profile.birth_place.clone();
    let father_name    = profile.father_name.clone();
    let mother_name    = profile.mother_name.clone();
    let biography      = profile.biography.clone();
    let images_str     = encode_images(&profile.images)?;
    let status_str     = encode_status(profile.status);
    let family_str     = encode_family(&profile.family_members)?;
    let settings_str   = encode_settings(&profile.activation_settings)?;
    let updated_str    = encode_dt(profile.updated_at);
    let version        = i64::try_from(profile.version).unwrap_or(i64::MAX);
    let expected       = i64::try_from(expected_version).unwrap_or(i64::MAX);
    let stale_ms       = stale_before.timestamp_millis();

    let replaced = self
      .conn
      .call(move |conn| {
        let n = conn.execute(
          "UPDATE living_profiles SET
             first_name = ?2, last_name = ?3, birth_date = ?4,
             birth_place = ?5, father_name = ?6, mother_name = ?7,
             biography = ?8, images = ?9, status = ?10,
             family_members = ?11, activation_settings = ?12,
             updated_at = ?13, version = ?14
           WHERE profile_id = ?1
             AND version = ?15
             AND status <> 'converted'
             AND ?10 <> 'converted'
             AND (activation_claim IS NULL OR claimed_at < ?16)",
          rusqlite::params![
            id_str,
            first_name,
            last_name,
            birth_date_str,
            birth_place,
            father_name,
            mother_name,
            biography,
            images_str,
            status_str,
            family_str,
            settings_str,
            updated_str,
            version,
            expected,
            stale_ms,
          ],
        )?;
        Ok(n == 1)
      })
      .await?;

    Ok(replaced)
  }

  async fn claim_activation(
    &self,
    profile_id:   Uuid,
    claim_id:     Uuid,
    claimed_at:   DateTime<Utc>,
    stale_before: DateTime<Utc>,
  ) -> Result<bool> {
    let id_str    = encode_uuid(profile_id);
    let claim_str = encode_uuid(claim_id);
    let at_ms     = claimed_at.timestamp_millis();
    let stale_ms  = stale_before.timestamp_millis();

    let claimed = self
      .conn
      .call(move |conn| {
        let n = conn.execute(
          "UPDATE living_profiles
           SET activation_claim = ?2, claimed_at = ?3
           WHERE profile_id = ?1
             AND status <> 'converted'
             AND (activation_claim IS NULL OR claimed_at < ?4)",
          rusqlite::params![id_str, claim_str, at_ms, stale_ms],
        )?;
        Ok(n == 1)
      })
      .await?;

    Ok(claimed)
  }

  async fn release_activation(&self, profile_id: Uuid, claim_id: Uuid) -> Result<bool> {
    let id_str    = encode_uuid(profile_id);
    let claim_str = encode_uuid(claim_id);

    let released = self
      .conn
      .call(move |conn| {
        let n = conn.execute(
          "UPDATE living_profiles
           SET activation_claim = NULL, claimed_at = NULL
           WHERE profile_id = ?1 AND activation_claim = ?2",
          rusqlite::params![id_str, claim_str],
        )?;
        Ok(n == 1)
      })
      .await?;

    Ok(released)
  }

  async fn complete_activation(
    &self,
    profile_id: Uuid,
    activation: &Activation,
  ) -> Result<bool> {
    let id_str          = encode_uuid(profile_id);
    let memorial_str    = encode_uuid(activation.memorial_id);
    let death_date_str  = encode_date(activation.death_date);
    let activated_str   = encode_dt(activation.activated_at);
    let activated_by    = encode_uuid(activation.activated_by);

    let completed = self
      .conn
      .call(move |conn| {
        let n = conn.execute(
          "UPDATE living_profiles SET
             status = 'converted',
             memorial_id = ?2, death_date = ?3,
             activated_at = ?4, activated_by = ?5,
             activation_claim = NULL, claimed_at = NULL,
             updated_at = ?4, version = version + 1
           WHERE profile_id = ?1
             AND status <> 'converted'",
          rusqlite::params![
            id_str,
            memorial_str,
            death_date_str,
            activated_str,
            activated_by,
          ],
        )?;
        Ok(n == 1)
      })
      .await?;

    Ok(completed)
  }
}
