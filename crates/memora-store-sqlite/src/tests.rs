//! Integration tests for `SqliteStore` and the core services running on top
//! of it, against an in-memory database.

use std::sync::Arc;

use chrono::{Duration, NaiveDate, Utc};
use memora_core::{
  ErrorKind,
  duplicates::{CreateOutcome, DuplicateDetector},
  family::{NewFamilyMember, Relationship},
  lifecycle::{ActivationRequest, LifecycleController},
  memorial::{CandidateRecord, MatchInput, Memorial, NewMemorial},
  profile::{
    ActivationSettings, ActivationSettingsPatch, NewLivingProfile, ProfilePatch,
    ProfileStatus,
  },
  similarity::MatchedField,
  store::{CandidateRetriever, LivingProfileStore, MemorialFactory},
};
use tokio::{sync::Notify, task::JoinSet};
use uuid::Uuid;

use crate::SqliteStore;

async fn store() -> Arc<SqliteStore> {
  Arc::new(
    SqliteStore::open_in_memory()
      .await
      .expect("in-memory store"),
  )
}

fn controller(s: &Arc<SqliteStore>) -> LifecycleController<SqliteStore, SqliteStore> {
  LifecycleController::new(s.clone(), s.clone())
}

fn date(s: &str) -> NaiveDate { s.parse().unwrap() }

fn new_memorial(first: &str, last: &str, death: &str) -> NewMemorial {
  NewMemorial {
    owner_id:          Uuid::new_v4(),
    first_name:        first.into(),
    last_name:         last.into(),
    birth_date:        None,
    death_date:        date(death),
    birth_place:       None,
    death_place:       None,
    father_name:       None,
    mother_name:       None,
    living_profile_id: None,
  }
}

fn match_input(first: &str, last: &str, death: &str) -> MatchInput {
  MatchInput {
    first_name: first.into(),
    last_name: last.into(),
    death_date: Some(date(death)),
    ..Default::default()
  }
}

fn new_profile() -> NewLivingProfile {
  let mut input = NewLivingProfile::new("Milena", "Pavlović", date("1950-03-14"));
  input.birth_place = Some("Kraljevo".into());
  input.mother_name = Some("Vera".into());
  input.activation_settings = Some(ActivationSettings {
    secret_phrase: Some("lavender fields".into()),
    ..Default::default()
  });
  input
}

fn activation(profile_id: Uuid, phrase: &str) -> ActivationRequest {
  ActivationRequest {
    profile_id,
    secret_phrase: phrase.into(),
    death_date: date("2025-11-02"),
    death_place: Some("Kraljevo".into()),
    activated_by: Uuid::new_v4(),
  }
}

// ─── Test collaborators ──────────────────────────────────────────────────────

struct BrokenRetriever;

impl CandidateRetriever for BrokenRetriever {
  type Error = std::io::Error;

  async fn search_candidates(
    &self,
    _: &str,
    _: &str,
    _: usize,
  ) -> Result<Vec<CandidateRecord>, Self::Error> {
    Err(std::io::Error::other("record store unavailable"))
  }
}

struct BrokenFactory;

impl MemorialFactory for BrokenFactory {
  type Error = std::io::Error;

  async fn create_memorial(&self, _: NewMemorial) -> Result<Memorial, Self::Error> {
    Err(std::io::Error::other("memorial service unavailable"))
  }
}

/// Delegates to a real store, but parks inside `create_memorial` until the
/// test opens the gate.
struct GatedFactory {
  store:   Arc<SqliteStore>,
  entered: Notify,
  open:    Notify,
}

impl GatedFactory {
  fn new(store: &Arc<SqliteStore>) -> Arc<Self> {
    Arc::new(Self {
      store:   store.clone(),
      entered: Notify::new(),
      open:    Notify::new(),
    })
  }
}

impl MemorialFactory for GatedFactory {
  type Error = crate::Error;

  async fn create_memorial(&self, input: NewMemorial) -> Result<Memorial, Self::Error> {
    self.entered.notify_one();
    self.open.notified().await;
    self.store.create_memorial(input).await
  }
}

// ─── Memorials & candidate retrieval ─────────────────────────────────────────

#[tokio::test]
async fn create_and_get_memorial() {
  let s = store().await;
  let mut input = new_memorial("Jovan", "Petrović", "2024-01-10");
  input.birth_place = Some("Čačak".into());

  let memorial = s.create_memorial(input).await.unwrap();
  let fetched = s.get_memorial(memorial.memorial_id).await.unwrap().unwrap();
  assert_eq!(fetched, memorial);
  assert_eq!(fetched.birth_place.as_deref(), Some("Čačak"));
}

#[tokio::test]
async fn get_memorial_missing_returns_none() {
  let s = store().await;
  assert!(s.get_memorial(Uuid::new_v4()).await.unwrap().is_none());
}

#[tokio::test]
async fn search_is_accent_and_case_insensitive() {
  let s = store().await;
  s.create_memorial(new_memorial("Jovan", "Petrović", "2024-01-10"))
    .await
    .unwrap();

  let found = s.search_candidates("JOVAN", "", 50).await.unwrap();
  assert_eq!(found.len(), 1);
  let found = s.search_candidates("zzz", "petrovic", 50).await.unwrap();
  assert_eq!(found.len(), 1);
  let found = s.search_candidates("ovan", "zzz", 50).await.unwrap();
  assert_eq!(found.len(), 1, "substring match on first name");
}

#[tokio::test]
async fn search_uses_or_semantics_and_limit() {
  let s = store().await;
  s.create_memorial(new_memorial("Ana", "Jović", "2020-01-01")).await.unwrap();
  s.create_memorial(new_memorial("Marko", "Ilić", "2020-01-01")).await.unwrap();
  s.create_memorial(new_memorial("Ana", "Ilić", "2020-01-01")).await.unwrap();
  s.create_memorial(new_memorial("Petar", "Kostić", "2020-01-01")).await.unwrap();

  let found = s.search_candidates("ana", "ilic", 50).await.unwrap();
  let names: Vec<_> = found
    .iter()
    .map(|c| format!("{} {}", c.first_name, c.last_name))
    .collect();
  assert_eq!(names, vec!["Ana Jović", "Marko Ilić", "Ana Ilić"]);

  let limited = s.search_candidates("ana", "ilic", 2).await.unwrap();
  assert_eq!(limited.len(), 2);
}

// ─── Duplicate detection ─────────────────────────────────────────────────────

#[tokio::test]
async fn detects_accented_duplicate() {
  let s = store().await;
  let existing = s
    .create_memorial(new_memorial("Jovan", "Petrovic", "2024-01-10"))
    .await
    .unwrap();

  let detector = DuplicateDetector::new(s.clone());
  let matches = detector
    .find_potential_duplicates(&match_input("Jovan", "Petrović", "2024-01-10"))
    .await;

  assert_eq!(matches.len(), 1);
  assert_eq!(matches[0].candidate.memorial_id, existing.memorial_id);
  assert!(matches[0].score >= 70);
  assert!(matches[0].matched_fields.contains(&MatchedField::Name));
  assert!(matches[0].matched_fields.contains(&MatchedField::DeathDate));
}

#[tokio::test]
async fn missing_required_fields_return_empty() {
  let s = store().await;
  s.create_memorial(new_memorial("Jovan", "Petrovic", "2024-01-10"))
    .await
    .unwrap();
  let detector = DuplicateDetector::new(s.clone());

  let mut no_death = match_input("Jovan", "Petrovic", "2024-01-10");
  no_death.death_date = None;
  assert!(detector.find_potential_duplicates(&no_death).await.is_empty());

  let blank_last = match_input("Jovan", "  ", "2024-01-10");
  assert!(detector.find_potential_duplicates(&blank_last).await.is_empty());
}

#[tokio::test]
async fn below_threshold_candidates_are_dropped() {
  let s = store().await;
  // Shares a last name only: retrieved, but the name bucket never fires.
  s.create_memorial(new_memorial("Zorica", "Petrović", "1999-09-09"))
    .await
    .unwrap();
  // Name matches but nothing else: 40 < 50.
  s.create_memorial(new_memorial("Jovan", "Petrović", "1980-01-01"))
    .await
    .unwrap();

  let detector = DuplicateDetector::new(s.clone());
  let matches = detector
    .find_potential_duplicates(&match_input("Jovan", "Petrović", "2024-01-10"))
    .await;
  assert!(matches.is_empty());
}

#[tokio::test]
async fn ranked_capped_and_stable() {
  let s = store().await;
  let mut ids = Vec::new();
  for _ in 0..7 {
    let m = s
      .create_memorial(new_memorial("Jovan", "Petrović", "2024-01-10"))
      .await
      .unwrap();
    ids.push(m.memorial_id);
  }
  let mut best = new_memorial("Jovan", "Petrović", "2024-01-10");
  best.birth_date = Some(date("1940-05-05"));
  let best = s.create_memorial(best).await.unwrap();

  let detector = DuplicateDetector::new(s.clone());
  let mut input = match_input("Jovan", "Petrović", "2024-01-10");
  input.birth_date = Some(date("1940-05-05"));
  let matches = detector.find_potential_duplicates(&input).await;

  assert_eq!(matches.len(), 5);
  assert_eq!(matches[0].candidate.memorial_id, best.memorial_id);
  assert_eq!(matches[0].score, 90);
  assert!(matches.windows(2).all(|w| w[0].score >= w[1].score));
  assert!(matches.iter().all(|m| m.score >= 50));

  // Ties keep retrieval (insertion) order.
  let tied: Vec<_> = matches[1..].iter().map(|m| m.candidate.memorial_id).collect();
  assert_eq!(tied, ids[..4].to_vec());
}

#[tokio::test]
async fn retriever_failure_reports_no_duplicates() {
  let detector = DuplicateDetector::new(Arc::new(BrokenRetriever));
  let matches = detector
    .find_potential_duplicates(&match_input("Jovan", "Petrović", "2024-01-10"))
    .await;
  assert!(matches.is_empty());
}

#[tokio::test]
async fn create_unless_duplicate_requires_override() {
  let s = store().await;
  s.create_memorial(new_memorial("Jovan", "Petrovic", "2024-01-10"))
    .await
    .unwrap();
  let detector = DuplicateDetector::new(s.clone());

  let outcome = detector
    .create_unless_duplicate(&*s, new_memorial("Jovan", "Petrović", "2024-01-10"), false)
    .await
    .unwrap();
  assert!(matches!(outcome, CreateOutcome::Duplicates(ref m) if m.len() == 1));

  let outcome = detector
    .create_unless_duplicate(&*s, new_memorial("Jovan", "Petrović", "2024-01-10"), true)
    .await
    .unwrap();
  assert!(matches!(outcome, CreateOutcome::Created(_)));

  let outcome = detector
    .create_unless_duplicate(&*s, new_memorial("Vesna", "Marić", "2024-01-10"), false)
    .await
    .unwrap();
  assert!(matches!(outcome, CreateOutcome::Created(_)));
}

// ─── Profile creation & reads ────────────────────────────────────────────────

#[tokio::test]
async fn create_profile_roundtrip() {
  let s = store().await;
  let ctl = controller(&s);
  let owner = Uuid::new_v4();

  let created = ctl.create(owner, new_profile()).await.unwrap();
  assert_eq!(created.status, ProfileStatus::Draft);

  let fetched = ctl.get_profile(Some(owner), created.profile_id).await.unwrap();
  assert_eq!(fetched, created);
  let own = ctl.get_own_profile(owner).await.unwrap().unwrap();
  assert_eq!(own.profile_id, created.profile_id);
  assert!(ctl.get_own_profile(Uuid::new_v4()).await.unwrap().is_none());
}

#[tokio::test]
async fn one_profile_per_owner() {
  let s = store().await;
  let ctl = controller(&s);
  let owner = Uuid::new_v4();

  ctl.create(owner, new_profile()).await.unwrap();
  let err = ctl.create(owner, new_profile()).await.unwrap_err();
  assert_eq!(err.kind(), ErrorKind::TerminalState);
}

#[tokio::test]
async fn concurrent_creates_yield_one_profile() {
  let s = store().await;
  let owner = Uuid::new_v4();

  let mut set = JoinSet::new();
  for _ in 0..6 {
    let ctl = controller(&s);
    set.spawn(async move { ctl.create(owner, new_profile()).await });
  }

  let mut ok = 0;
  while let Some(res) = set.join_next().await {
    match res.unwrap() {
      Ok(_) => ok += 1,
      Err(e) => assert_eq!(e.kind(), ErrorKind::TerminalState),
    }
  }
  assert_eq!(ok, 1);
}

#[tokio::test]
async fn drafts_are_hidden_from_other_callers() {
  let s = store().await;
  let ctl = controller(&s);
  let owner = Uuid::new_v4();
  let p = ctl.create(owner, new_profile()).await.unwrap();

  let err = ctl.get_profile(Some(Uuid::new_v4()), p.profile_id).await.unwrap_err();
  assert_eq!(err.kind(), ErrorKind::NotFound);
  let err = ctl.get_profile(None, p.profile_id).await.unwrap_err();
  assert_eq!(err.kind(), ErrorKind::NotFound);

  ctl.publish(owner, p.profile_id).await.unwrap();
  let seen = ctl.get_profile(None, p.profile_id).await.unwrap();
  assert_eq!(seen.status, ProfileStatus::Active);
  assert!(seen.activation_settings.secret_phrase.is_none());
  let own = ctl.get_profile(Some(owner), p.profile_id).await.unwrap();
  assert_eq!(own.activation_settings.secret_phrase.as_deref(), Some("lavender fields"));
}

// ─── Owner edits ─────────────────────────────────────────────────────────────

#[tokio::test]
async fn update_merges_fields_and_settings() {
  let s = store().await;
  let ctl = controller(&s);
  let owner = Uuid::new_v4();
  let p = ctl.create(owner, new_profile()).await.unwrap();

  let updated = ctl
    .update(owner, p.profile_id, ProfilePatch {
      biography: Some("Taught mathematics for forty years.".into()),
      images: Some(vec!["img/portrait.jpg".into()]),
      activation_settings: Some(ActivationSettingsPatch {
        notify_family_on_activation: Some(true),
        ..Default::default()
      }),
      ..Default::default()
    })
    .await
    .unwrap();

  assert_eq!(updated.version, p.version + 1);
  let stored = s.get_profile(p.profile_id).await.unwrap().unwrap();
  assert_eq!(stored, updated);
  assert_eq!(stored.first_name, "Milena");
  assert_eq!(stored.images, vec!["img/portrait.jpg".to_string()]);
  assert_eq!(
    stored.activation_settings.secret_phrase.as_deref(),
    Some("lavender fields")
  );
  assert!(stored.activation_settings.notify_family_on_activation);
}

#[tokio::test]
async fn non_owner_cannot_edit() {
  let s = store().await;
  let ctl = controller(&s);
  let owner = Uuid::new_v4();
  let intruder = Uuid::new_v4();
  let p = ctl.create(owner, new_profile()).await.unwrap();

  let err = ctl
    .update(intruder, p.profile_id, ProfilePatch {
      biography: Some("nope".into()),
      ..Default::default()
    })
    .await
    .unwrap_err();
  assert_eq!(err.kind(), ErrorKind::Ownership);

  let err = ctl.publish(intruder, p.profile_id).await.unwrap_err();
  assert_eq!(err.kind(), ErrorKind::Ownership);

  let member = NewFamilyMember {
    email:        "x@example.com".into(),
    name:         "X".into(),
    relationship: Relationship::Other,
    can_activate: true,
  };
  let err = ctl
    .add_family_member(intruder, p.profile_id, member)
    .await
    .unwrap_err();
  assert_eq!(err.kind(), ErrorKind::Ownership);

  assert_eq!(s.get_profile(p.profile_id).await.unwrap().unwrap(), p);
}

#[tokio::test]
async fn stale_version_is_rejected() {
  let s = store().await;
  let ctl = controller(&s);
  let owner = Uuid::new_v4();
  let p = ctl.create(owner, new_profile()).await.unwrap();
  ctl.publish(owner, p.profile_id).await.unwrap();

  // `p` still carries the pre-publish version.
  let mut stale = p.clone();
  stale.biography = Some("lost update".into());
  stale.version += 1;
  assert!(
    !s.replace_profile(&stale, p.version, Utc::now())
      .await
      .unwrap()
  );
}

#[tokio::test]
async fn live_claim_blocks_owner_edits() {
  let s = store().await;
  let ctl = controller(&s);
  let owner = Uuid::new_v4();
  let p = ctl.create(owner, new_profile()).await.unwrap();

  let claim = Uuid::new_v4();
  let now = Utc::now();
  assert!(
    s.claim_activation(p.profile_id, claim, now, now - ctl.lease())
      .await
      .unwrap()
  );

  let patch = ProfilePatch {
    activation_settings: Some(ActivationSettingsPatch {
      secret_phrase: Some("changed under the claim".into()),
      ..Default::default()
    }),
    ..Default::default()
  };
  let err = ctl.update(owner, p.profile_id, patch.clone()).await.unwrap_err();
  assert_eq!(err.kind(), ErrorKind::Conflict);
  let err = ctl.publish(owner, p.profile_id).await.unwrap_err();
  assert_eq!(err.kind(), ErrorKind::Conflict);
  assert_eq!(s.get_profile(p.profile_id).await.unwrap().unwrap(), p);

  // Once the claim is released the same edit goes through.
  assert!(s.release_activation(p.profile_id, claim).await.unwrap());
  let updated = ctl.update(owner, p.profile_id, patch).await.unwrap();
  assert!(updated.activation_settings.accepts_phrase("changed under the claim"));
}

#[tokio::test]
async fn abandoned_claim_does_not_block_owner_edits() {
  let s = store().await;
  let ctl = controller(&s);
  let owner = Uuid::new_v4();
  let p = ctl.create(owner, new_profile()).await.unwrap();

  let long_ago = Utc::now() - Duration::minutes(10);
  assert!(
    s.claim_activation(p.profile_id, Uuid::new_v4(), long_ago, long_ago)
      .await
      .unwrap()
  );

  let updated = ctl
    .update(owner, p.profile_id, ProfilePatch {
      biography: Some("Still here.".into()),
      ..Default::default()
    })
    .await
    .unwrap();
  assert_eq!(updated.biography.as_deref(), Some("Still here."));
}

#[tokio::test]
async fn publish_is_one_directional() {
  let s = store().await;
  let ctl = controller(&s);
  let owner = Uuid::new_v4();
  let p = ctl.create(owner, new_profile()).await.unwrap();

  let active = ctl.publish(owner, p.profile_id).await.unwrap();
  assert_eq!(active.status, ProfileStatus::Active);
  let again = ctl.publish(owner, p.profile_id).await.unwrap();
  assert_eq!(again, active);
}

#[tokio::test]
async fn family_members_add_and_remove() {
  let s = store().await;
  let ctl = controller(&s);
  let owner = Uuid::new_v4();
  let p = ctl.create(owner, new_profile()).await.unwrap();

  let daughter = ctl
    .add_family_member(owner, p.profile_id, NewFamilyMember {
      email:        "ivana@example.com".into(),
      name:         "Ivana".into(),
      relationship: Relationship::Child,
      can_activate: true,
    })
    .await
    .unwrap();
  let brother = ctl
    .add_family_member(owner, p.profile_id, NewFamilyMember {
      email:        "ivana@example.com".into(),
      name:         "Nikola".into(),
      relationship: Relationship::Sibling,
      can_activate: false,
    })
    .await
    .unwrap();
  assert!(daughter.accepted_at.is_none());

  let stored = s.get_profile(p.profile_id).await.unwrap().unwrap();
  let ids: Vec<_> = stored.family_members.iter().map(|m| m.member_id).collect();
  assert_eq!(ids, vec![daughter.member_id, brother.member_id]);

  let after = ctl
    .remove_family_member(owner, p.profile_id, daughter.member_id)
    .await
    .unwrap();
  assert_eq!(after.family_members.len(), 1);
  assert!(after.family_members.get(brother.member_id).is_some());

  let err = ctl
    .remove_family_member(owner, p.profile_id, daughter.member_id)
    .await
    .unwrap_err();
  assert_eq!(err.kind(), ErrorKind::NotFound);
}

// ─── Activation ──────────────────────────────────────────────────────────────

#[tokio::test]
async fn activate_converts_draft() {
  let s = store().await;
  let ctl = controller(&s);
  let owner = Uuid::new_v4();
  let p = ctl.create(owner, new_profile()).await.unwrap();

  let req = activation(p.profile_id, "lavender fields");
  let activator = req.activated_by;
  let done = ctl.activate(req).await.unwrap();

  assert_eq!(done.memorial.owner_id, owner);
  assert_eq!(done.memorial.first_name, "Milena");
  assert_eq!(done.memorial.birth_date, Some(date("1950-03-14")));
  assert_eq!(done.memorial.death_date, date("2025-11-02"));
  assert_eq!(done.memorial.mother_name.as_deref(), Some("Vera"));
  assert_eq!(done.memorial.living_profile_id, Some(p.profile_id));

  let stored = s.get_profile(p.profile_id).await.unwrap().unwrap();
  assert_eq!(stored.status, ProfileStatus::Converted);
  let record = stored.activation.unwrap();
  assert_eq!(record.memorial_id, done.memorial.memorial_id);
  assert_eq!(record.death_date, date("2025-11-02"));
  assert_eq!(record.activated_by, activator);

  // Converted profiles are publicly readable.
  assert!(ctl.get_profile(None, p.profile_id).await.is_ok());
}

#[tokio::test]
async fn activate_without_phrase_is_open() {
  let s = store().await;
  let ctl = controller(&s);
  let owner = Uuid::new_v4();
  let p = ctl
    .create(owner, NewLivingProfile::new("Stevan", "Ristić", date("1938-07-07")))
    .await
    .unwrap();
  ctl.publish(owner, p.profile_id).await.unwrap();

  let done = ctl.activate(activation(p.profile_id, "")).await.unwrap();
  assert_eq!(done.memorial.first_name, "Stevan");
}

#[tokio::test]
async fn second_activation_is_terminal() {
  let s = store().await;
  let ctl = controller(&s);
  let owner = Uuid::new_v4();
  let p = ctl.create(owner, new_profile()).await.unwrap();
  ctl.publish(owner, p.profile_id).await.unwrap();

  let first = ctl
    .activate(activation(p.profile_id, "lavender fields"))
    .await
    .unwrap();
  let err = ctl
    .activate(activation(p.profile_id, "lavender fields"))
    .await
    .unwrap_err();
  assert_eq!(err.kind(), ErrorKind::TerminalState);

  let stored = s.get_profile(p.profile_id).await.unwrap().unwrap();
  assert_eq!(
    stored.activation.unwrap().memorial_id,
    first.memorial.memorial_id
  );
  assert_eq!(s.memorials_for_profile(p.profile_id).await.unwrap().len(), 1);
}

#[tokio::test]
async fn concurrent_activation_creates_one_memorial() {
  let s = store().await;
  let owner = Uuid::new_v4();
  let p = controller(&s).create(owner, new_profile()).await.unwrap();

  let ctl = controller(&s);
  let (a, b) = tokio::join!(
    ctl.activate(activation(p.profile_id, "lavender fields")),
    ctl.activate(activation(p.profile_id, "lavender fields")),
  );

  let (won, lost) = match (a, b) {
    (Ok(w), Err(l)) | (Err(l), Ok(w)) => (w, l),
    other => panic!("expected exactly one winner, got {other:?}"),
  };
  assert_eq!(lost.kind(), ErrorKind::TerminalState);

  let memorials = s.memorials_for_profile(p.profile_id).await.unwrap();
  assert_eq!(memorials.len(), 1);
  assert_eq!(memorials[0].memorial_id, won.memorial.memorial_id);
}

#[tokio::test]
async fn many_parallel_activations_create_one_memorial() {
  let s = store().await;
  let owner = Uuid::new_v4();
  let p = controller(&s).create(owner, new_profile()).await.unwrap();

  let mut set = JoinSet::new();
  for _ in 0..8 {
    let ctl = controller(&s);
    let req = activation(p.profile_id, "lavender fields");
    set.spawn(async move { ctl.activate(req).await });
  }

  let mut winners = 0;
  while let Some(res) = set.join_next().await {
    match res.unwrap() {
      Ok(_) => winners += 1,
      Err(e) => assert_eq!(e.kind(), ErrorKind::TerminalState),
    }
  }
  assert_eq!(winners, 1);
  assert_eq!(s.memorials_for_profile(p.profile_id).await.unwrap().len(), 1);
}

#[tokio::test]
async fn wrong_phrase_leaves_profile_untouched() {
  let s = store().await;
  let ctl = controller(&s);
  let owner = Uuid::new_v4();
  let p = ctl.create(owner, new_profile()).await.unwrap();
  ctl
    .add_family_member(owner, p.profile_id, NewFamilyMember {
      email:        "ivana@example.com".into(),
      name:         "Ivana".into(),
      relationship: Relationship::Child,
      can_activate: true,
    })
    .await
    .unwrap();
  let before = s.get_profile(p.profile_id).await.unwrap().unwrap();

  for phrase in ["Lavender fields", "lavender", ""] {
    let err = ctl.activate(activation(p.profile_id, phrase)).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Authentication);
  }

  let after = s.get_profile(p.profile_id).await.unwrap().unwrap();
  assert_eq!(after, before);
  assert!(s.memorials_for_profile(p.profile_id).await.unwrap().is_empty());
}

#[tokio::test]
async fn factory_failure_leaves_profile_untouched() {
  let s = store().await;
  let owner = Uuid::new_v4();
  let p = controller(&s).create(owner, new_profile()).await.unwrap();

  let broken = LifecycleController::new(s.clone(), Arc::new(BrokenFactory));
  let err = broken
    .activate(activation(p.profile_id, "lavender fields"))
    .await
    .unwrap_err();
  assert_eq!(err.kind(), ErrorKind::Dependency);
  assert_eq!(s.get_profile(p.profile_id).await.unwrap().unwrap(), p);

  // The claim was released, so a healthy factory can still activate.
  let done = controller(&s)
    .activate(activation(p.profile_id, "lavender fields"))
    .await
    .unwrap();
  assert_eq!(done.profile_id, p.profile_id);
}

#[tokio::test]
async fn converted_profile_is_frozen() {
  let s = store().await;
  let ctl = controller(&s);
  let owner = Uuid::new_v4();
  let p = ctl.create(owner, new_profile()).await.unwrap();
  ctl
    .activate(activation(p.profile_id, "lavender fields"))
    .await
    .unwrap();
  let frozen = s.get_profile(p.profile_id).await.unwrap().unwrap();

  let patches = [
    ProfilePatch::default(),
    ProfilePatch { first_name: Some("Mila".into()), ..Default::default() },
    ProfilePatch {
      activation_settings: Some(ActivationSettingsPatch {
        secret_phrase: Some("new".into()),
        ..Default::default()
      }),
      ..Default::default()
    },
  ];
  for patch in patches {
    let err = ctl.update(owner, p.profile_id, patch).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::TerminalState);
  }

  let err = ctl.publish(owner, p.profile_id).await.unwrap_err();
  assert_eq!(err.kind(), ErrorKind::TerminalState);
  let member = NewFamilyMember {
    email:        "late@example.com".into(),
    name:         "Late".into(),
    relationship: Relationship::Other,
    can_activate: false,
  };
  let err = ctl
    .add_family_member(owner, p.profile_id, member)
    .await
    .unwrap_err();
  assert_eq!(err.kind(), ErrorKind::TerminalState);

  assert_eq!(s.get_profile(p.profile_id).await.unwrap().unwrap(), frozen);
}

#[tokio::test]
async fn held_claim_blocks_until_stale() {
  let s = store().await;
  let owner = Uuid::new_v4();
  let p = controller(&s).create(owner, new_profile()).await.unwrap();

  // An abandoned claim from a crashed activation.
  let crashed = Uuid::new_v4();
  let long_ago = Utc::now() - Duration::minutes(10);
  assert!(
    s.claim_activation(p.profile_id, crashed, long_ago, long_ago - Duration::minutes(1))
      .await
      .unwrap()
  );

  // With a lease longer than the claim's age, activation is blocked.
  let patient = controller(&s).with_lease(Duration::hours(1)).unwrap();
  let err = patient
    .activate(activation(p.profile_id, "lavender fields"))
    .await
    .unwrap_err();
  assert_eq!(err.kind(), ErrorKind::TerminalState);

  // With the default lease the claim is stale and can be taken over.
  let done = controller(&s)
    .activate(activation(p.profile_id, "lavender fields"))
    .await
    .unwrap();
  assert_eq!(done.profile_id, p.profile_id);

  // A converted profile cannot be completed a second time.
  let late = memora_core::profile::Activation {
    memorial_id:  Uuid::new_v4(),
    death_date:   date("2025-11-02"),
    activated_at: Utc::now(),
    activated_by: Uuid::new_v4(),
  };
  assert!(!s.complete_activation(p.profile_id, &late).await.unwrap());
  let stored = s.get_profile(p.profile_id).await.unwrap().unwrap();
  assert_eq!(stored.activation.unwrap().memorial_id, done.memorial.memorial_id);
}

#[tokio::test]
async fn out_of_range_lease_is_rejected() {
  let s = store().await;
  for lease in [Duration::zero(), Duration::seconds(-5), Duration::days(2)] {
    let err = controller(&s).with_lease(lease).err().unwrap();
    assert_eq!(err.kind(), ErrorKind::Validation);
  }
  let ctl = controller(&s).with_lease(Duration::seconds(1)).unwrap();
  assert_eq!(ctl.lease(), Duration::seconds(1));
}

#[tokio::test]
async fn memorial_creation_is_idempotent_per_profile() {
  let s = store().await;
  let profile_id = Uuid::new_v4();
  let mut input = new_memorial("Milena", "Pavlović", "2025-11-02");
  input.living_profile_id = Some(profile_id);

  let first = s.create_memorial(input.clone()).await.unwrap();
  let mut again = input;
  again.death_place = Some("Beograd".into());
  let second = s.create_memorial(again).await.unwrap();

  assert_eq!(second, first);
  assert_eq!(s.memorials_for_profile(profile_id).await.unwrap(), vec![first]);

  // Memorials not created from a profile are never merged.
  let a = s.create_memorial(new_memorial("Ana", "Ilić", "2020-01-01")).await.unwrap();
  let b = s.create_memorial(new_memorial("Ana", "Ilić", "2020-01-01")).await.unwrap();
  assert_ne!(a.memorial_id, b.memorial_id);
}

/// The claimant's factory call outlives its lease and a second activation
/// takes the claim over. The takeover completes first; the original
/// claimant then gets the same memorial back and reports the profile as
/// converted.
#[tokio::test]
async fn takeover_during_slow_factory_creates_one_memorial() {
  let s = store().await;
  let owner = Uuid::new_v4();
  let p = controller(&s).create(owner, new_profile()).await.unwrap();

  let gated = GatedFactory::new(&s);
  let slow = LifecycleController::new(s.clone(), gated.clone())
    .with_lease(Duration::seconds(1))
    .unwrap();
  let req = activation(p.profile_id, "lavender fields");
  let first = tokio::spawn(async move { slow.activate(req).await });
  gated.entered.notified().await;

  // Outlive the one-second lease while the factory is parked.
  tokio::time::sleep(std::time::Duration::from_millis(1_200)).await;

  let takeover = controller(&s)
    .with_lease(Duration::seconds(1))
    .unwrap()
    .activate(activation(p.profile_id, "lavender fields"))
    .await
    .unwrap();

  gated.open.notify_one();
  let err = first.await.unwrap().unwrap_err();
  assert_eq!(err.kind(), ErrorKind::TerminalState);

  let memorials = s.memorials_for_profile(p.profile_id).await.unwrap();
  assert_eq!(memorials.len(), 1);
  assert_eq!(memorials[0].memorial_id, takeover.memorial.memorial_id);

  let stored = s.get_profile(p.profile_id).await.unwrap().unwrap();
  assert_eq!(stored.status, ProfileStatus::Converted);
  assert_eq!(stored.activation.unwrap().memorial_id, takeover.memorial.memorial_id);

  let err = controller(&s)
    .activate(activation(p.profile_id, "lavender fields"))
    .await
    .unwrap_err();
  assert_eq!(err.kind(), ErrorKind::TerminalState);
}

/// As above, but the original claimant finishes while the takeover is still
/// inside its own factory call. The original converts the profile and the
/// takeover gets the same memorial back.
#[tokio::test]
async fn original_claimant_completes_after_takeover() {
  let s = store().await;
  let owner = Uuid::new_v4();
  let p = controller(&s).create(owner, new_profile()).await.unwrap();

  let first_gate = GatedFactory::new(&s);
  let first_ctl = LifecycleController::new(s.clone(), first_gate.clone())
    .with_lease(Duration::seconds(1))
    .unwrap();
  let req = activation(p.profile_id, "lavender fields");
  let first = tokio::spawn(async move { first_ctl.activate(req).await });
  first_gate.entered.notified().await;

  tokio::time::sleep(std::time::Duration::from_millis(1_200)).await;

  let second_gate = GatedFactory::new(&s);
  let second_ctl = LifecycleController::new(s.clone(), second_gate.clone())
    .with_lease(Duration::seconds(1))
    .unwrap();
  let req = activation(p.profile_id, "lavender fields");
  let second = tokio::spawn(async move { second_ctl.activate(req).await });
  second_gate.entered.notified().await;

  first_gate.open.notify_one();
  let won = first.await.unwrap().unwrap();
  let stored = s.get_profile(p.profile_id).await.unwrap().unwrap();
  assert_eq!(stored.status, ProfileStatus::Converted);

  second_gate.open.notify_one();
  let err = second.await.unwrap().unwrap_err();
  assert_eq!(err.kind(), ErrorKind::TerminalState);

  let memorials = s.memorials_for_profile(p.profile_id).await.unwrap();
  assert_eq!(memorials, vec![won.memorial.clone()]);
  let stored = s.get_profile(p.profile_id).await.unwrap().unwrap();
  assert_eq!(stored.activation.unwrap().memorial_id, won.memorial.memorial_id);
}
