//! Living profiles: memorials authored by their subject before death.
//!
//! A profile is an aggregate: personal fields, authored content, the embedded
//! family-member roster and the activation settings are read and written
//! together. Once a profile is converted every field is frozen.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};
use uuid::Uuid;

use crate::{
  Error, Result,
  family::FamilyMembers,
  memorial::NewMemorial,
  normalize::is_blank,
};

// ─── Status ──────────────────────────────────────────────────────────────────

/// Lifecycle state. Transitions only ever move forward:
/// `Draft → Active`, `Draft → Converted`, `Active → Converted`.
#[derive(
  Debug,
  Clone,
  Copy,
  Default,
  PartialEq,
  Eq,
  Serialize,
  Deserialize,
  Display,
  AsRefStr,
  EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ProfileStatus {
  #[default]
  Draft,
  Active,
  Converted,
}

impl ProfileStatus {
  pub fn is_converted(self) -> bool { matches!(self, Self::Converted) }

  /// Whether a profile may move from `self` to `next`.
  pub fn can_transition_to(self, next: ProfileStatus) -> bool {
    matches!(
      (self, next),
      (Self::Draft, Self::Active)
        | (Self::Draft, Self::Converted)
        | (Self::Active, Self::Converted)
    )
  }
}

// ─── Activation settings ─────────────────────────────────────────────────────

/// How a profile may be activated and what happens when it is.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivationSettings {
  /// Shared phrase an activating party must supply verbatim. When unset,
  /// activation is not phrase-gated.
  pub secret_phrase:               Option<String>,
  #[serde(default)]
  pub require_verification:        bool,
  #[serde(default)]
  pub notify_family_on_activation: bool,
}

/// Partial [`ActivationSettings`]; unset fields keep their prior values.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivationSettingsPatch {
  pub secret_phrase:               Option<String>,
  pub require_verification:        Option<bool>,
  pub notify_family_on_activation: Option<bool>,
}

impl ActivationSettings {
  pub fn merged(&self, patch: ActivationSettingsPatch) -> Self {
    Self {
      secret_phrase:               patch
        .secret_phrase
        .or_else(|| self.secret_phrase.clone()),
      require_verification:        patch
        .require_verification
        .unwrap_or(self.require_verification),
      notify_family_on_activation: patch
        .notify_family_on_activation
        .unwrap_or(self.notify_family_on_activation),
    }
  }

  /// `true` if `supplied` satisfies the phrase gate.
  pub fn accepts_phrase(&self, supplied: &str) -> bool {
    self.secret_phrase.as_deref().is_none_or(|phrase| phrase == supplied)
  }
}

// ─── Activation record ───────────────────────────────────────────────────────

/// Written exactly once, when the profile is converted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Activation {
  pub memorial_id:  Uuid,
  pub death_date:   NaiveDate,
  pub activated_at: DateTime<Utc>,
  pub activated_by: Uuid,
}

// ─── LivingProfile ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LivingProfile {
  pub profile_id:          Uuid,
  pub owner_id:            Uuid,

  pub first_name:          String,
  pub last_name:           String,
  pub birth_date:          NaiveDate,
  pub birth_place:         Option<String>,
  pub father_name:         Option<String>,
  pub mother_name:         Option<String>,

  pub biography:           Option<String>,
  /// Opaque references to uploaded images; uploads live elsewhere.
  pub images:              Vec<String>,

  pub status:              ProfileStatus,
  pub family_members:      FamilyMembers,
  pub activation_settings: ActivationSettings,
  /// Present if and only if `status` is [`ProfileStatus::Converted`].
  pub activation:          Option<Activation>,

  pub created_at:          DateTime<Utc>,
  pub updated_at:          DateTime<Utc>,
  /// Bumped on every owner write; guards against lost updates.
  pub version:             u64,
}

impl LivingProfile {
  /// Build a fresh draft owned by `owner_id`.
  pub fn new(owner_id: Uuid, input: NewLivingProfile) -> Result<Self> {
    input.validate()?;
    let now = Utc::now();
    Ok(Self {
      profile_id: Uuid::new_v4(),
      owner_id,
      first_name: input.first_name.trim().to_owned(),
      last_name: input.last_name.trim().to_owned(),
      birth_date: input.birth_date,
      birth_place: input.birth_place,
      father_name: input.father_name,
      mother_name: input.mother_name,
      biography: input.biography,
      images: input.images,
      status: ProfileStatus::Draft,
      family_members: FamilyMembers::default(),
      activation_settings: input.activation_settings.unwrap_or_default(),
      activation: None,
      created_at: now,
      updated_at: now,
      version: 0,
    })
  }

  pub fn is_owned_by(&self, user_id: Uuid) -> bool { self.owner_id == user_id }

  /// The profile as shown to anyone other than its owner: the secret phrase
  /// is withheld.
  pub fn public_view(mut self) -> Self {
    self.activation_settings.secret_phrase = None;
    self
  }

  /// Snapshot of the personal fields as a memorial to be created.
  pub fn memorial_snapshot(
    &self,
    death_date: NaiveDate,
    death_place: Option<String>,
  ) -> NewMemorial {
    NewMemorial {
      owner_id: self.owner_id,
      first_name: self.first_name.clone(),
      last_name: self.last_name.clone(),
      birth_date: Some(self.birth_date),
      death_date,
      birth_place: self.birth_place.clone(),
      death_place,
      father_name: self.father_name.clone(),
      mother_name: self.mother_name.clone(),
      living_profile_id: Some(self.profile_id),
    }
  }

  /// Apply an owner edit. Does not check status or ownership.
  pub fn apply(&mut self, patch: ProfilePatch) -> Result<()> {
    patch.validate()?;

    if let Some(v) = patch.first_name {
      self.first_name = v.trim().to_owned();
    }
    if let Some(v) = patch.last_name {
      self.last_name = v.trim().to_owned();
    }
    if let Some(v) = patch.birth_date {
      self.birth_date = v;
    }
    if let Some(v) = patch.birth_place {
      self.birth_place = Some(v);
    }
    if let Some(v) = patch.father_name {
      self.father_name = Some(v);
    }
    if let Some(v) = patch.mother_name {
      self.mother_name = Some(v);
    }
    if let Some(v) = patch.biography {
      self.biography = Some(v);
    }
    if let Some(v) = patch.images {
      self.images = v;
    }
    if let Some(settings) = patch.activation_settings {
      self.activation_settings = self.activation_settings.merged(settings);
    }
    Ok(())
  }
}

// ─── Inputs ──────────────────────────────────────────────────────────────────

/// Input to [`LifecycleController::create`](crate::lifecycle::LifecycleController::create).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewLivingProfile {
  pub first_name:          String,
  pub last_name:           String,
  pub birth_date:          NaiveDate,
  pub birth_place:         Option<String>,
  pub father_name:         Option<String>,
  pub mother_name:         Option<String>,
  pub biography:           Option<String>,
  #[serde(default)]
  pub images:              Vec<String>,
  pub activation_settings: Option<ActivationSettings>,
}

impl NewLivingProfile {
  /// Convenience constructor with every optional field unset.
  pub fn new(
    first_name: impl Into<String>,
    last_name: impl Into<String>,
    birth_date: NaiveDate,
  ) -> Self {
    Self {
      first_name: first_name.into(),
      last_name: last_name.into(),
      birth_date,
      birth_place: None,
      father_name: None,
      mother_name: None,
      biography: None,
      images: Vec::new(),
      activation_settings: None,
    }
  }

  fn validate(&self) -> Result<()> {
    if is_blank(Some(&self.first_name)) {
      return Err(Error::Validation("first_name is required".into()));
    }
    if is_blank(Some(&self.last_name)) {
      return Err(Error::Validation("last_name is required".into()));
    }
    Ok(())
  }
}

/// A merge patch over the owner-editable fields of a profile.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProfilePatch {
  pub first_name:          Option<String>,
  pub last_name:           Option<String>,
  pub birth_date:          Option<NaiveDate>,
  pub birth_place:         Option<String>,
  pub father_name:         Option<String>,
  pub mother_name:         Option<String>,
  pub biography:           Option<String>,
  pub images:              Option<Vec<String>>,
  pub activation_settings: Option<ActivationSettingsPatch>,
}

impl ProfilePatch {
  fn validate(&self) -> Result<()> {
    if self.first_name.as_deref().is_some_and(|s| s.trim().is_empty()) {
      return Err(Error::Validation("first_name cannot be blank".into()));
    }
    if self.last_name.as_deref().is_some_and(|s| s.trim().is_empty()) {
      return Err(Error::Validation("last_name cannot be blank".into()));
    }
    Ok(())
  }
}
