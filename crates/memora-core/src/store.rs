//! Collaborator traits: candidate retrieval, living-profile persistence and
//! memorial creation.
//!
//! Storage backends (e.g. `memora-store-sqlite`) implement these; the
//! services in [`crate::duplicates`] and [`crate::lifecycle`] depend only on
//! the abstraction.
//!
//! All methods return `Send` futures so implementations can be shared across a
//! multi-threaded tokio runtime (e.g. behind `axum`).

use std::future::Future;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::{
  memorial::{CandidateRecord, Memorial, NewMemorial},
  profile::{Activation, LivingProfile},
};

// ─── Candidate retrieval ─────────────────────────────────────────────────────

pub trait CandidateRetriever: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  /// Existing memorials whose first name contains `first_fragment` **or**
  /// whose last name contains `last_fragment`, case-insensitively, at most
  /// `limit` of them, in a stable order.
  fn search_candidates<'a>(
    &'a self,
    first_fragment: &'a str,
    last_fragment: &'a str,
    limit: usize,
  ) -> impl Future<Output = Result<Vec<CandidateRecord>, Self::Error>> + Send + 'a;
}

// ─── Memorial creation ───────────────────────────────────────────────────────

pub trait MemorialFactory: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  /// Persist a new, immutable memorial. The id and `created_at` are assigned
  /// by the factory.
  ///
  /// Must be idempotent on `input.living_profile_id`: when it is set and a
  /// memorial for that profile already exists, return the existing memorial
  /// instead of creating another. Activation relies on this when a claim is
  /// taken over while the previous holder's call is still in flight.
  fn create_memorial(
    &self,
    input: NewMemorial,
  ) -> impl Future<Output = Result<Memorial, Self::Error>> + Send + '_;
}

// ─── Living profiles ─────────────────────────────────────────────────────────

/// Persistence for the living-profile aggregate.
///
/// Every write that guards an invariant is a single conditional statement;
/// the returned `bool` says whether it took effect. Callers never emulate
/// these with a read followed by a write.
pub trait LivingProfileStore: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  /// Insert `profile` unless its owner already has one. Returns `false` on
  /// an owner conflict.
  fn insert_profile<'a>(
    &'a self,
    profile: &'a LivingProfile,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + 'a;

  fn get_profile(
    &self,
    profile_id: Uuid,
  ) -> impl Future<Output = Result<Option<LivingProfile>, Self::Error>> + Send + '_;

  fn get_profile_by_owner(
    &self,
    owner_id: Uuid,
  ) -> impl Future<Output = Result<Option<LivingProfile>, Self::Error>> + Send + '_;

  /// Overwrite the owner-editable state of `profile` (everything but the
  /// activation record) and store `profile.version`, only if the stored
  /// version equals `expected_version`, the stored status is not converted,
  /// and no activation claim taken at or after `stale_before` is held.
  fn replace_profile<'a>(
    &'a self,
    profile: &'a LivingProfile,
    expected_version: u64,
    stale_before: DateTime<Utc>,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + 'a;

  /// Take the activation claim on a non-converted profile. Succeeds when no
  /// claim is held or the held claim was taken before `stale_before`.
  fn claim_activation(
    &self,
    profile_id: Uuid,
    claim_id: Uuid,
    claimed_at: DateTime<Utc>,
    stale_before: DateTime<Utc>,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + '_;

  /// Drop `claim_id` if it is still the held claim.
  fn release_activation(
    &self,
    profile_id: Uuid,
    claim_id: Uuid,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + '_;

  /// Mark the profile converted with `activation`, provided it is not
  /// already converted. Clears any held claim in the same write.
  fn complete_activation<'a>(
    &'a self,
    profile_id: Uuid,
    activation: &'a Activation,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + 'a;
}
