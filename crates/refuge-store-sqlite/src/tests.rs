//! Integration tests for `SqliteStore` against an in-memory database.

use chrono::NaiveDate;
use refuge_core::{
  clock::FixedClock,
  label::{Label, LabelCatalog, ids},
  lifecycle::{FamilyInput, Lifecycle, NewResident, Registry},
  resident::{
    AnimalDetails, ArchiveReason, FamilyRole, HumanDetails, ResidentKind, Variant,
  },
  store::{Changeset, ResidentQuery, ResidentStore, load_registry},
};
use uuid::Uuid;

use crate::SqliteStore;

async fn store() -> SqliteStore {
  SqliteStore::open_in_memory()
    .await
    .expect("in-memory store")
}

fn lifecycle() -> Lifecycle<FixedClock> {
  use chrono::TimeZone;
  Lifecycle::with_clock(FixedClock(
    chrono::Utc.with_ymd_and_hms(2024, 6, 1, 9, 0, 0).unwrap(),
  ))
}

fn human(first: &str) -> NewResident {
  NewResident {
    first_name:  first.into(),
    last_name:   "Hassan".into(),
    birth_date:  NaiveDate::from_ymd_opt(1980, 1, 1),
    gender:      String::new(),
    room_number: "4".into(),
    labels:      Default::default(),
    family:      None,
    kind:        ResidentKind::Human(HumanDetails::default()),
  }
}

fn dog(owner: Uuid) -> NewResident {
  NewResident {
    first_name:  "Bram".into(),
    last_name:   String::new(),
    birth_date:  None,
    gender:      String::new(),
    room_number: "4".into(),
    labels:      Default::default(),
    family:      Some(FamilyInput {
      role: Some(FamilyRole::Pet),
      members: vec![owner],
      ..Default::default()
    }),
    kind:        ResidentKind::Dog(AnimalDetails::default()),
  }
}

/// A registry with an owner and their dog, fully persisted.
async fn populated(s: &SqliteStore) -> (Registry, Uuid, Uuid) {
  let mut registry = Registry::new(LabelCatalog::defaults());
  let lc = lifecycle();
  let owner = lc.create(&mut registry, human("Amira"));
  let pet = lc.create(&mut registry, dog(owner));
  s.put_residents(registry.residents.iter().cloned().collect())
    .await
    .unwrap();
  (registry, owner, pet)
}

// ─── Residents ───────────────────────────────────────────────────────────────

#[tokio::test]
async fn put_and_get_resident() {
  let s = store().await;
  let (registry, owner, _) = populated(&s).await;

  let fetched = s.get_resident(owner).await.unwrap().unwrap();
  assert_eq!(Some(&fetched), registry.residents.get(owner));
  assert!(fetched.labels.contains(ids::PET_OWNER));
}

#[tokio::test]
async fn get_resident_missing_returns_none() {
  let s = store().await;
  assert!(s.get_resident(Uuid::new_v4()).await.unwrap().is_none());
}

#[tokio::test]
async fn put_residents_upserts() {
  let s = store().await;
  let (mut registry, _, pet) = populated(&s).await;

  let before = registry.clone();
  lifecycle().archive(&mut registry, pet, ArchiveReason::Adopted, None);
  let changed: Vec<_> = registry
    .residents
    .changed_since(&before.residents)
    .into_iter()
    .cloned()
    .collect();
  // The dog and its owner's label.
  assert_eq!(changed.len(), 2);
  s.put_residents(changed).await.unwrap();

  let all = s.list_residents(ResidentQuery::default()).await.unwrap();
  assert_eq!(all.len(), 2);
  let stored = s.get_resident(pet).await.unwrap().unwrap();
  assert!(stored.is_archived());
}

#[tokio::test]
async fn list_residents_filters_by_archive_and_variant() {
  let s = store().await;
  let (mut registry, owner, pet) = populated(&s).await;
  let before = registry.clone();
  lifecycle().archive(&mut registry, pet, ArchiveReason::Transferred, None);
  s.put_residents(
    registry
      .residents
      .changed_since(&before.residents)
      .into_iter()
      .cloned()
      .collect(),
  )
  .await
  .unwrap();

  let active = s
    .list_residents(ResidentQuery {
      archived: Some(false),
      variant:  None,
    })
    .await
    .unwrap();
  assert_eq!(active.iter().map(|r| r.id).collect::<Vec<_>>(), vec![owner]);

  let dogs = s
    .list_residents(ResidentQuery {
      archived: None,
      variant:  Some(Variant::Dog),
    })
    .await
    .unwrap();
  assert_eq!(dogs.iter().map(|r| r.id).collect::<Vec<_>>(), vec![pet]);

  let archived_humans = s
    .list_residents(ResidentQuery {
      archived: Some(true),
      variant:  Some(Variant::Human),
    })
    .await
    .unwrap();
  assert!(archived_humans.is_empty());
}

// ─── Labels ──────────────────────────────────────────────────────────────────

#[tokio::test]
async fn seed_labels_only_fills_an_empty_table() {
  let s = store().await;
  let defaults = LabelCatalog::defaults();

  assert_eq!(s.seed_labels(&defaults).await.unwrap(), defaults.len());
  assert_eq!(s.seed_labels(&defaults).await.unwrap(), 0);
  assert_eq!(s.list_labels().await.unwrap(), defaults);
}

#[tokio::test]
async fn put_label_replaces_and_delete_reports() {
  let s = store().await;
  s.put_label(Label::manual("vip", "VIP", "#111827", "star"))
    .await
    .unwrap();
  s.put_label(Label::manual("vip", "Very important", "#111827", "star"))
    .await
    .unwrap();

  let catalog = s.list_labels().await.unwrap();
  assert_eq!(catalog.len(), 1);
  assert_eq!(catalog.get("vip").map(|l| l.name.as_str()), Some("Very important"));

  assert!(s.delete_label("vip".into()).await.unwrap());
  assert!(!s.delete_label("vip".into()).await.unwrap());
  assert!(s.list_labels().await.unwrap().is_empty());
}

// ─── Commit ──────────────────────────────────────────────────────────────────

/// A registry whose catalog defines "vip" and whose owner carries it, with
/// both persisted.
async fn vip_registry(s: &SqliteStore) -> (Registry, Uuid) {
  let mut registry = Registry::new(LabelCatalog::defaults());
  let lc = lifecycle();
  lc.upsert_label(&mut registry, Label::manual("vip", "VIP", "#111827", "star"));
  let mut input = human("Amira");
  input.labels.insert("vip".into());
  let owner = lc.create(&mut registry, input);
  s.commit(Changeset::between(&Registry::new(LabelCatalog::new()), &registry))
    .await
    .unwrap();
  (registry, owner)
}

#[tokio::test]
async fn commit_applies_labels_and_residents_together() {
  let s = store().await;
  let (mut registry, owner) = vip_registry(&s).await;

  let before = registry.clone();
  lifecycle().delete_label_from_catalog(&mut registry, "vip");
  s.commit(Changeset::between(&before, &registry)).await.unwrap();

  assert!(!s.list_labels().await.unwrap().contains("vip"));
  let stored = s.get_resident(owner).await.unwrap().unwrap();
  assert!(!stored.labels.contains("vip"));
}

#[tokio::test]
async fn failed_commit_leaves_nothing_behind() {
  let s = store().await;
  let (mut registry, owner) = vip_registry(&s).await;
  s.execute_batch(
    "CREATE TRIGGER reject_resident_insert BEFORE INSERT ON residents
     BEGIN SELECT RAISE(ABORT, 'residents are read-only'); END;
     CREATE TRIGGER reject_resident_update BEFORE UPDATE ON residents
     BEGIN SELECT RAISE(ABORT, 'residents are read-only'); END;",
  )
  .await
  .unwrap();

  let before = registry.clone();
  lifecycle().delete_label_from_catalog(&mut registry, "vip");
  let changes = Changeset::between(&before, &registry);
  assert_eq!(changes.labels_deleted, vec!["vip".to_owned()]);
  assert!(s.commit(changes).await.is_err());

  // The label deletion ran first and was rolled back with the rest.
  assert!(s.list_labels().await.unwrap().contains("vip"));
  let stored = s.get_resident(owner).await.unwrap().unwrap();
  assert!(stored.labels.contains("vip"));
}

// ─── Registry ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn load_registry_round_trips_population_and_catalog() {
  let s = store().await;
  s.seed_labels(&LabelCatalog::defaults()).await.unwrap();
  let (registry, _, _) = populated(&s).await;

  let loaded = load_registry(&s).await.unwrap();
  assert_eq!(loaded.catalog, registry.catalog);
  assert_eq!(loaded.residents.len(), registry.residents.len());
  for resident in registry.residents.iter() {
    assert_eq!(loaded.residents.get(resident.id), Some(resident));
  }
}
