//! Error types for `memora-core`.

use thiserror::Error;
use uuid::Uuid;

/// A boxed error raised by a storage backend or other collaborator.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Debug, Error)]
pub enum Error {
  #[error("validation failed: {0}")]
  Validation(String),

  #[error("living profile not found: {0}")]
  ProfileNotFound(Uuid),

  #[error("family member {member_id} not found on profile {profile_id}")]
  FamilyMemberNotFound { profile_id: Uuid, member_id: Uuid },

  #[error("user {caller} does not own living profile {profile_id}")]
  NotOwner { profile_id: Uuid, caller: Uuid },

  #[error("living profile {0} is already converted")]
  AlreadyConverted(Uuid),

  #[error("owner {0} already has a living profile")]
  ProfileExists(Uuid),

  #[error("living profile {0} is being activated by another request")]
  ActivationInProgress(Uuid),

  #[error("secret phrase does not match")]
  PhraseMismatch,

  #[error("living profile {0} was modified concurrently")]
  ConcurrentModification(Uuid),

  #[error("store error: {0}")]
  Store(#[source] BoxError),

  #[error("memorial factory error: {0}")]
  Factory(#[source] BoxError),
}

/// Coarse classification of [`Error`], used by callers to decide how to
/// report a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
  Validation,
  NotFound,
  Ownership,
  /// The profile is converted, the owner already has one, or an activation
  /// claim is held elsewhere.
  TerminalState,
  Authentication,
  Conflict,
  Dependency,
}

impl Error {
  pub fn kind(&self) -> ErrorKind {
    match self {
      Self::Validation(_) => ErrorKind::Validation,
      Self::ProfileNotFound(_) | Self::FamilyMemberNotFound { .. } => {
        ErrorKind::NotFound
      }
      Self::NotOwner { .. } => ErrorKind::Ownership,
      Self::AlreadyConverted(_)
      | Self::ProfileExists(_)
      | Self::ActivationInProgress(_) => ErrorKind::TerminalState,
      Self::PhraseMismatch => ErrorKind::Authentication,
      Self::ConcurrentModification(_) => ErrorKind::Conflict,
      Self::Store(_) | Self::Factory(_) => ErrorKind::Dependency,
    }
  }

  pub(crate) fn store<E>(e: E) -> Self
  where
    E: std::error::Error + Send + Sync + 'static,
  {
    Self::Store(Box::new(e))
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
