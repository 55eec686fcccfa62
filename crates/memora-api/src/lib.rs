//! JSON REST API for Memora.
//!
//! Exposes an axum [`Router`] over the duplicate detector and lifecycle
//! controller, backed by any type implementing all three collaborator traits
//! from [`memora_core::store`]. Service authentication, TLS and transport
//! concerns are the caller's responsibility; the acting end user arrives in
//! the [`caller::CALLER_HEADER`] header.
//!
//! # Mounting
//!
//! ```rust,ignore
//! .nest("/api", memora_api::api_router(ApiState::new(store.clone())))
//! ```

pub mod caller;
pub mod duplicates;
pub mod error;
pub mod memorials;
pub mod profiles;

use std::sync::Arc;

use axum::{
  Router,
  routing::{delete, get, post},
};
use chrono::Duration;
use memora_core::{
  duplicates::{DetectionConfig, DuplicateDetector},
  lifecycle::LifecycleController,
  store::{CandidateRetriever, LivingProfileStore, MemorialFactory},
};

pub use caller::Caller;
pub use error::ApiError;

/// A single storage backend serving every collaborator role.
pub trait Backend:
  CandidateRetriever + LivingProfileStore + MemorialFactory + 'static
{
}

impl<T> Backend for T where
  T: CandidateRetriever + LivingProfileStore + MemorialFactory + 'static
{
}

/// Shared handler state: the services, wired to one backend.
pub struct ApiState<S> {
  pub store:     Arc<S>,
  pub detector:  DuplicateDetector<S>,
  pub lifecycle: LifecycleController<S, S>,
}

impl<S: Backend> ApiState<S> {
  pub fn new(store: Arc<S>) -> Self {
    Self {
      detector: DuplicateDetector::new(store.clone()),
      lifecycle: LifecycleController::new(store.clone(), store.clone()),
      store,
    }
  }

  pub fn with_detection(mut self, config: DetectionConfig) -> Self {
    self.detector = DuplicateDetector::with_config(self.store.clone(), config);
    self
  }

  /// Fails with a validation error if `lease` is out of range.
  pub fn with_activation_lease(mut self, lease: Duration) -> memora_core::Result<Self> {
    self.lifecycle = self.lifecycle.with_lease(lease)?;
    Ok(self)
  }
}

/// Build a fully-materialised API router.
///
/// The returned `Router<()>` can be nested into any parent router regardless
/// of its own state type.
pub fn api_router<S: Backend>(state: ApiState<S>) -> Router<()> {
  Router::new()
    // Duplicate detection & memorials
    .route("/duplicates", post(duplicates::check::<S>))
    .route("/memorials", post(memorials::create::<S>))
    // Living profiles
    .route("/profiles", post(profiles::create::<S>))
    .route("/profiles/mine", get(profiles::mine::<S>))
    .route(
      "/profiles/{id}",
      get(profiles::get_one::<S>).patch(profiles::update::<S>),
    )
    .route("/profiles/{id}/publish", post(profiles::publish::<S>))
    .route("/profiles/{id}/family", post(profiles::add_family_member::<S>))
    .route(
      "/profiles/{id}/family/{member_id}",
      delete(profiles::remove_family_member::<S>),
    )
    .route("/profiles/{id}/activate", post(profiles::activate::<S>))
    .with_state(Arc::new(state))
}
