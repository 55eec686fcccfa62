//! The living-profile state machine and activation protocol.
//!
//! ```text
//!   draft ──publish──▶ active
//!     │                  │
//!     └────activate──────┴──▶ converted (terminal)
//! ```
//!
//! Owner edits are optimistic: each write is conditional on the version that
//! was read and on the profile not being converted. Activation takes a
//! storage-level claim before invoking the memorial factory, so of any number
//! of concurrent activations at most one ever creates a memorial.

use std::sync::Arc;

use chrono::{Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
  Error, Result,
  family::{FamilyMember, NewFamilyMember},
  memorial::Memorial,
  profile::{
    Activation, LivingProfile, NewLivingProfile, ProfilePatch, ProfileStatus,
  },
  store::{LivingProfileStore, MemorialFactory},
};

/// How long, in seconds, an activation claim blocks other activations before
/// it is considered abandoned.
pub const DEFAULT_ACTIVATION_LEASE_SECS: i64 = 60;

/// Shortest accepted activation lease, in seconds.
pub const MIN_ACTIVATION_LEASE_SECS: i64 = 1;

/// Longest accepted activation lease, in seconds (one day).
pub const MAX_ACTIVATION_LEASE_SECS: i64 = 86_400;

/// Check that `lease` lies within
/// [`MIN_ACTIVATION_LEASE_SECS`]..=[`MAX_ACTIVATION_LEASE_SECS`].
pub fn validate_lease(lease: Duration) -> Result<Duration> {
  let secs = lease.num_seconds();
  if lease < Duration::seconds(MIN_ACTIVATION_LEASE_SECS)
    || secs > MAX_ACTIVATION_LEASE_SECS
  {
    return Err(Error::Validation(format!(
      "activation lease must be between {MIN_ACTIVATION_LEASE_SECS} and \
       {MAX_ACTIVATION_LEASE_SECS} seconds, got {secs}"
    )));
  }
  Ok(lease)
}

// ─── Activation I/O ──────────────────────────────────────────────────────────

/// Input to [`LifecycleController::activate`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActivationRequest {
  pub profile_id:    Uuid,
  /// Compared verbatim against the profile's configured phrase.
  #[serde(default)]
  pub secret_phrase: String,
  pub death_date:    NaiveDate,
  pub death_place:   Option<String>,
  pub activated_by:  Uuid,
}

/// The result of a successful activation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Activated {
  pub profile_id: Uuid,
  pub memorial:   Memorial,
  pub activation: Activation,
}

// ─── Controller ──────────────────────────────────────────────────────────────

pub struct LifecycleController<S, F> {
  store:   Arc<S>,
  factory: Arc<F>,
  lease:   Duration,
}

impl<S, F> Clone for LifecycleController<S, F> {
  fn clone(&self) -> Self {
    Self {
      store:   self.store.clone(),
      factory: self.factory.clone(),
      lease:   self.lease,
    }
  }
}

impl<S, F> LifecycleController<S, F>
where
  S: LivingProfileStore,
  F: MemorialFactory,
{
  pub fn new(store: Arc<S>, factory: Arc<F>) -> Self {
    Self {
      store,
      factory,
      lease: Duration::seconds(DEFAULT_ACTIVATION_LEASE_SECS),
    }
  }

  /// Replace the activation lease. Fails for leases outside
  /// [`validate_lease`]'s bounds.
  pub fn with_lease(mut self, lease: Duration) -> Result<Self> {
    self.lease = validate_lease(lease)?;
    Ok(self)
  }

  pub fn lease(&self) -> Duration { self.lease }

  // ── Reads ─────────────────────────────────────────────────────────────────

  async fn load(&self, profile_id: Uuid) -> Result<LivingProfile> {
    self
      .store
      .get_profile(profile_id)
      .await
      .map_err(Error::store)?
      .ok_or(Error::ProfileNotFound(profile_id))
  }

  /// Fetch a profile as seen by `caller`. Drafts are visible only to their
  /// owner; to anyone else they do not exist. Non-owners get the
  /// [`public_view`](LivingProfile::public_view).
  pub async fn get_profile(
    &self,
    caller: Option<Uuid>,
    profile_id: Uuid,
  ) -> Result<LivingProfile> {
    let profile = self.load(profile_id).await?;
    if caller.is_some_and(|c| profile.is_owned_by(c)) {
      return Ok(profile);
    }
    if profile.status == ProfileStatus::Draft {
      return Err(Error::ProfileNotFound(profile_id));
    }
    Ok(profile.public_view())
  }

  pub async fn get_own_profile(&self, owner_id: Uuid) -> Result<Option<LivingProfile>> {
    self
      .store
      .get_profile_by_owner(owner_id)
      .await
      .map_err(Error::store)
  }

  // ── Owner transitions ─────────────────────────────────────────────────────

  /// Create `owner_id`'s living profile in the draft state.
  pub async fn create(
    &self,
    owner_id: Uuid,
    input: NewLivingProfile,
  ) -> Result<LivingProfile> {
    let profile = LivingProfile::new(owner_id, input)?;

    let inserted = self
      .store
      .insert_profile(&profile)
      .await
      .map_err(Error::store)?;
    if !inserted {
      return Err(Error::ProfileExists(owner_id));
    }

    tracing::info!(profile_id = %profile.profile_id, %owner_id, "living profile created");
    Ok(profile)
  }

  /// Load, check ownership and status, apply `f`, and write back
  /// conditionally on the version that was loaded.
  async fn edit(
    &self,
    caller: Uuid,
    profile_id: Uuid,
    f: impl FnOnce(&mut LivingProfile) -> Result<()>,
  ) -> Result<LivingProfile> {
    let mut profile = self.load(profile_id).await?;
    ensure_editable(&profile, caller)?;

    let expected_version = profile.version;
    f(&mut profile)?;
    let now = Utc::now();
    profile.version = expected_version + 1;
    profile.updated_at = now;

    // A live activation claim blocks the write; an abandoned one does not.
    let replaced = self
      .store
      .replace_profile(&profile, expected_version, now - self.lease)
      .await
      .map_err(Error::store)?;
    if !replaced {
      let current = self.load(profile_id).await?;
      return Err(if current.status.is_converted() {
        Error::AlreadyConverted(profile_id)
      } else {
        Error::ConcurrentModification(profile_id)
      });
    }
    Ok(profile)
  }

  /// Merge `patch` into the profile. Activation settings are merged field by
  /// field rather than replaced.
  pub async fn update(
    &self,
    caller: Uuid,
    profile_id: Uuid,
    patch: ProfilePatch,
  ) -> Result<LivingProfile> {
    self.edit(caller, profile_id, |p| p.apply(patch)).await
  }

  /// Move a draft to active. Publishing an active profile changes nothing.
  pub async fn publish(&self, caller: Uuid, profile_id: Uuid) -> Result<LivingProfile> {
    let current = self.load(profile_id).await?;
    ensure_editable(&current, caller)?;
    if current.status == ProfileStatus::Active {
      return Ok(current);
    }

    let profile = self
      .edit(caller, profile_id, |p| {
        if p.status.can_transition_to(ProfileStatus::Active) {
          p.status = ProfileStatus::Active;
        }
        Ok(())
      })
      .await?;
    tracing::info!(%profile_id, "living profile published");
    Ok(profile)
  }

  pub async fn add_family_member(
    &self,
    caller: Uuid,
    profile_id: Uuid,
    input: NewFamilyMember,
  ) -> Result<FamilyMember> {
    let member = input.into_member(Utc::now())?;
    let added = member.clone();
    self
      .edit(caller, profile_id, move |p| {
        p.family_members = p.family_members.with_member(added);
        Ok(())
      })
      .await?;
    Ok(member)
  }

  pub async fn remove_family_member(
    &self,
    caller: Uuid,
    profile_id: Uuid,
    member_id: Uuid,
  ) -> Result<LivingProfile> {
    self
      .edit(caller, profile_id, |p| {
        p.family_members = p
          .family_members
          .without_member(member_id)
          .ok_or(Error::FamilyMemberNotFound { profile_id, member_id })?;
        Ok(())
      })
      .await
  }

  // ── Activation ────────────────────────────────────────────────────────────

  /// Irreversibly convert a draft or active profile into a memorial.
  ///
  /// Anyone who knows the profile's secret phrase may activate it; the
  /// per-member `can_activate` flag is not consulted. On any failure the
  /// profile is left exactly as it was.
  pub async fn activate(&self, request: ActivationRequest) -> Result<Activated> {
    let profile_id = request.profile_id;

    let profile = self.load(profile_id).await?;
    if profile.status.is_converted() {
      return Err(Error::AlreadyConverted(profile_id));
    }
    if !profile.activation_settings.accepts_phrase(&request.secret_phrase) {
      tracing::warn!(%profile_id, activated_by = %request.activated_by, "activation rejected: phrase mismatch");
      return Err(Error::PhraseMismatch);
    }

    let claim_id = Uuid::new_v4();
    let now = Utc::now();
    let claimed = self
      .store
      .claim_activation(profile_id, claim_id, now, now - self.lease)
      .await
      .map_err(Error::store)?;
    if !claimed {
      tracing::warn!(%profile_id, "activation lost race for claim");
      return Err(self.terminal_error(profile_id).await);
    }

    match self.activate_claimed(&request, claim_id).await {
      Ok(activated) => Ok(activated),
      Err(e) => {
        self.release(profile_id, claim_id).await;
        Err(e)
      }
    }
  }

  /// Everything after the claim is held. Errors leave the claim for the
  /// caller to release.
  ///
  /// Completion does not require the claim to still be ours. If the lease ran
  /// out while the factory was running and another activation took over, both
  /// get the same memorial back from the factory and whichever completes
  /// first converts the profile.
  async fn activate_claimed(
    &self,
    request: &ActivationRequest,
    claim_id: Uuid,
  ) -> Result<Activated> {
    let profile_id = request.profile_id;

    // Re-read under the claim: the owner may have edited in between.
    let profile = self.load(profile_id).await?;
    if !profile.activation_settings.accepts_phrase(&request.secret_phrase) {
      return Err(Error::PhraseMismatch);
    }

    let snapshot =
      profile.memorial_snapshot(request.death_date, request.death_place.clone());
    let memorial = self
      .factory
      .create_memorial(snapshot)
      .await
      .map_err(|e| Error::Factory(Box::new(e)))?;

    let activation = Activation {
      memorial_id:  memorial.memorial_id,
      death_date:   request.death_date,
      activated_at: Utc::now(),
      activated_by: request.activated_by,
    };
    let completed = self
      .store
      .complete_activation(profile_id, &activation)
      .await
      .map_err(Error::store)?;
    if !completed {
      let current = self.load(profile_id).await?;
      let recorded = current.activation.as_ref().map(|a| a.memorial_id);
      if recorded != Some(memorial.memorial_id) {
        tracing::error!(
          %profile_id,
          %claim_id,
          orphaned_memorial_id = %memorial.memorial_id,
          "activation completed elsewhere with a different memorial",
        );
      } else {
        tracing::warn!(%profile_id, %claim_id, "activation completed by a takeover");
      }
      return Err(Error::AlreadyConverted(profile_id));
    }

    tracing::info!(
      %profile_id,
      memorial_id = %memorial.memorial_id,
      activated_by = %request.activated_by,
      "living profile converted",
    );
    Ok(Activated { profile_id, memorial, activation })
  }

  async fn release(&self, profile_id: Uuid, claim_id: Uuid) {
    if let Err(e) = self.store.release_activation(profile_id, claim_id).await {
      tracing::error!(%profile_id, error = %e, "failed to release activation claim");
    }
  }

  /// The error reported to an activation that could not take or keep the
  /// claim.
  async fn terminal_error(&self, profile_id: Uuid) -> Error {
    match self.load(profile_id).await {
      Ok(p) if p.status.is_converted() => Error::AlreadyConverted(profile_id),
      Ok(_) => Error::ActivationInProgress(profile_id),
      Err(e) => e,
    }
  }
}

fn ensure_editable(profile: &LivingProfile, caller: Uuid) -> Result<()> {
  if !profile.is_owned_by(caller) {
    return Err(Error::NotOwner { profile_id: profile.profile_id, caller });
  }
  if profile.status.is_converted() {
    return Err(Error::AlreadyConverted(profile.profile_id));
  }
  Ok(())
}
