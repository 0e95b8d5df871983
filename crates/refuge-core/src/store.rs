//! The `ResidentStore` trait and supporting query types.
//!
//! The trait is implemented by storage backends (e.g. `refuge-store-sqlite`).
//! The engine itself works on an in-memory [`Registry`]; a store loads it at
//! startup and persists the residents and labels an operation touched.

use std::future::Future;

use crate::{
  label::{Label, LabelCatalog, LabelId},
  lifecycle::Registry,
  population::Population,
  resident::{Resident, ResidentId, Variant},
};

// ─── Query type ──────────────────────────────────────────────────────────────

/// Parameters for [`ResidentStore::list_residents`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResidentQuery {
  /// `Some(false)` for the active population, `Some(true)` for the archive.
  pub archived: Option<bool>,
  pub variant:  Option<Variant>,
}

impl ResidentQuery {
  pub fn matches(&self, resident: &Resident) -> bool {
    self.archived.is_none_or(|a| a == resident.is_archived())
      && self.variant.is_none_or(|v| v == resident.variant())
  }
}

// ─── Changeset ───────────────────────────────────────────────────────────────

/// Every write produced by one registry operation. Applied as a unit by
/// [`ResidentStore::commit`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Changeset {
  pub labels_put:     Vec<Label>,
  pub labels_deleted: Vec<LabelId>,
  pub residents:      Vec<Resident>,
}

impl Changeset {
  /// The catalog entries and residents that differ between `before` and
  /// `after`.
  pub fn between(before: &Registry, after: &Registry) -> Self {
    let labels_put = after
      .catalog
      .iter()
      .filter(|l| before.catalog.get(&l.id) != Some(*l))
      .cloned()
      .collect();
    let labels_deleted = before
      .catalog
      .iter()
      .filter(|l| !after.catalog.contains(&l.id))
      .map(|l| l.id.clone())
      .collect();
    let residents = after
      .residents
      .changed_since(&before.residents)
      .into_iter()
      .cloned()
      .collect();
    Self { labels_put, labels_deleted, residents }
  }

  pub fn is_empty(&self) -> bool {
    self.labels_put.is_empty()
      && self.labels_deleted.is_empty()
      && self.residents.is_empty()
  }
}

// ─── Trait ───────────────────────────────────────────────────────────────────

/// Abstraction over a resident store backend.
///
/// All methods return `Send` futures so the trait can be used in
/// multi-threaded async runtimes (e.g. tokio with `axum`).
pub trait ResidentStore: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  // ── Residents ─────────────────────────────────────────────────────────

  /// List residents in registration order.
  fn list_residents(
    &self,
    query: ResidentQuery,
  ) -> impl Future<Output = Result<Vec<Resident>, Self::Error>> + Send + '_;

  /// Retrieve a resident by id. Returns `None` if not found.
  fn get_resident(
    &self,
    id: ResidentId,
  ) -> impl Future<Output = Result<Option<Resident>, Self::Error>> + Send + '_;

  /// Insert or replace residents in a single transaction.
  fn put_residents(
    &self,
    residents: Vec<Resident>,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  // ── Labels ────────────────────────────────────────────────────────────

  fn list_labels(
    &self,
  ) -> impl Future<Output = Result<LabelCatalog, Self::Error>> + Send + '_;

  /// Insert or replace a label definition.
  fn put_label(
    &self,
    label: Label,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  /// Remove a label definition. Returns `false` if it did not exist.
  fn delete_label(
    &self,
    id: String,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + '_;

  // ── Batches ───────────────────────────────────────────────────────────

  /// Apply every write in `changes` or none of them.
  fn commit(
    &self,
    changes: Changeset,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;
}

/// Read the whole population and catalog into a [`Registry`].
pub async fn load_registry<S: ResidentStore>(store: &S) -> Result<Registry, S::Error> {
  let residents: Population = store
    .list_residents(ResidentQuery::default())
    .await?
    .into_iter()
    .collect();
  let catalog = store.list_labels().await?;
  Ok(Registry { residents, catalog })
}

#[cfg(test)]
mod tests {
  use chrono::Utc;
  use uuid::Uuid;

  use super::*;
  use crate::resident::{
    AnimalDetails, Archival, ArchiveReason, FamilyLink, HumanDetails, ResidentKind,
  };

  fn resident(kind: ResidentKind, archived: bool) -> Resident {
    Resident {
      id: Uuid::new_v4(),
      first_name: "Test".into(),
      last_name: String::new(),
      birth_date: None,
      gender: String::new(),
      room_number: String::new(),
      registration_date: Utc::now(),
      labels: Default::default(),
      label_history: vec![],
      archive: archived.then(|| Archival {
        reason:      ArchiveReason::Departed,
        date:        Utc::now(),
        custom_text: None,
      }),
      family: FamilyLink::default(),
      kind,
    }
  }

  #[test]
  fn empty_query_matches_everything() {
    let q = ResidentQuery::default();
    assert!(q.matches(&resident(ResidentKind::Human(HumanDetails::default()), true)));
    assert!(q.matches(&resident(ResidentKind::Dog(AnimalDetails::default()), false)));
  }

  #[test]
  fn query_filters_combine() {
    let q = ResidentQuery {
      archived: Some(false),
      variant:  Some(Variant::Dog),
    };
    assert!(q.matches(&resident(ResidentKind::Dog(AnimalDetails::default()), false)));
    assert!(!q.matches(&resident(ResidentKind::Dog(AnimalDetails::default()), true)));
    assert!(!q.matches(&resident(ResidentKind::Cat(AnimalDetails::default()), false)));
  }

  #[test]
  fn changeset_collects_label_and_resident_differences() {
    let mut before = Registry::new(LabelCatalog::defaults());
    before.catalog.insert(Label::manual("vip", "VIP", "#111827", "star"));
    let untouched = resident(ResidentKind::Human(HumanDetails::default()), false);
    let edited = resident(ResidentKind::Cat(AnimalDetails::default()), false);
    before.residents.insert(untouched.clone());
    before.residents.insert(edited.clone());

    let mut after = before.clone();
    after.catalog.remove("vip");
    after.catalog.insert(Label::manual("quiet", "Quiet", "#e5e7eb", "moon"));
    if let Some(cat) = after.residents.get_mut(edited.id) {
      cat.room_number = "12".into();
    }

    let changes = Changeset::between(&before, &after);
    assert_eq!(changes.labels_deleted, vec!["vip".to_owned()]);
    assert_eq!(changes.labels_put.len(), 1);
    assert_eq!(changes.labels_put[0].id, "quiet");
    assert_eq!(changes.residents.len(), 1);
    assert_eq!(changes.residents[0].id, edited.id);

    assert!(Changeset::between(&after, &after).is_empty());
  }
}
