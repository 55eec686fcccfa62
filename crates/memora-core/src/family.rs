//! The family-member roster embedded in a living profile.
//!
//! The roster is an ordered collection keyed by member id. Adding or removing
//! a member produces a new roster value; the profile aggregate swaps it in and
//! persists the whole thing in one write.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};
use uuid::Uuid;

use crate::{Error, Result};

/// How a family member is related to the profile's subject.
#[derive(
  Debug,
  Clone,
  Copy,
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
pub enum Relationship {
  Spouse,
  Child,
  Sibling,
  Parent,
  Other,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FamilyMember {
  pub member_id:    Uuid,
  pub email:        String,
  pub name:         String,
  pub relationship: Relationship,
  /// Recorded for each member but not consulted by activation, which is
  /// gated on the secret phrase alone.
  pub can_activate: bool,
  pub invited_at:   DateTime<Utc>,
  pub accepted_at:  Option<DateTime<Utc>>,
}

/// Input to [`LifecycleController::add_family_member`](crate::lifecycle::LifecycleController::add_family_member).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewFamilyMember {
  pub email:        String,
  pub name:         String,
  pub relationship: Relationship,
  #[serde(default)]
  pub can_activate: bool,
}

impl NewFamilyMember {
  fn validate(&self) -> Result<()> {
    let email = self.email.trim();
    if email.is_empty() || !email.contains('@') {
      return Err(Error::Validation(format!(
        "invalid family member email: {:?}",
        self.email
      )));
    }
    if self.name.trim().is_empty() {
      return Err(Error::Validation("family member name is required".into()));
    }
    Ok(())
  }

  /// Stamp the input with a fresh id and invitation time.
  pub fn into_member(self, invited_at: DateTime<Utc>) -> Result<FamilyMember> {
    self.validate()?;
    Ok(FamilyMember {
      member_id: Uuid::new_v4(),
      email: self.email.trim().to_owned(),
      name: self.name.trim().to_owned(),
      relationship: self.relationship,
      can_activate: self.can_activate,
      invited_at,
      accepted_at: None,
    })
  }
}

// ─── Roster ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FamilyMembers(Vec<FamilyMember>);

impl FamilyMembers {
  pub fn is_empty(&self) -> bool { self.0.is_empty() }

  pub fn len(&self) -> usize { self.0.len() }

  pub fn iter(&self) -> impl Iterator<Item = &FamilyMember> { self.0.iter() }

  pub fn get(&self, member_id: Uuid) -> Option<&FamilyMember> {
    self.0.iter().find(|m| m.member_id == member_id)
  }

  /// A new roster with `member` appended. Email uniqueness is not enforced.
  pub fn with_member(&self, member: FamilyMember) -> Self {
    let mut members = self.0.clone();
    members.push(member);
    Self(members)
  }

  /// A new roster without `member_id`, or `None` if no such member exists.
  pub fn without_member(&self, member_id: Uuid) -> Option<Self> {
    self.get(member_id)?;
    Some(Self(
      self
        .0
        .iter()
        .filter(|m| m.member_id != member_id)
        .cloned()
        .collect(),
    ))
  }

  /// Members flagged as able to activate.
  pub fn activators(&self) -> impl Iterator<Item = &FamilyMember> {
    self.0.iter().filter(|m| m.can_activate)
  }
}

impl From<Vec<FamilyMember>> for FamilyMembers {
  fn from(members: Vec<FamilyMember>) -> Self { Self(members) }
}

impl<'a> IntoIterator for &'a FamilyMembers {
  type Item = &'a FamilyMember;
  type IntoIter = std::slice::Iter<'a, FamilyMember>;

  fn into_iter(self) -> Self::IntoIter { self.0.iter() }
}
