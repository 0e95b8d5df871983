//! Label catalog and the per-resident label history trail.
//!
//! A label is either *automatic* (owned by [`crate::derive`] and the
//! pet-owner pass in [`crate::family`]) or *manual* (toggled by a user and
//! preserved verbatim across updates).

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub type LabelId = String;

/// Identifiers of the labels the engine knows how to derive.
pub mod ids {
  pub const CAT: &str = "cat";
  pub const DOG: &str = "dog";
  pub const VACCINATED: &str = "vaccinated";
  pub const VACCINATION_NEEDED: &str = "vaccination-needed";
  pub const CHIPPED: &str = "chipped";
  pub const STERILIZED: &str = "sterilized";
  pub const BABY: &str = "baby";
  pub const TODDLER: &str = "toddler";
  pub const MINOR: &str = "minor";
  pub const SENIOR: &str = "senior";
  pub const MISSING_BSN: &str = "missing-bsn";
  pub const NEW_ARRIVAL: &str = "new-arrival";
  pub const PET_OWNER: &str = "pet-owner";

  // Legacy age bands kept for catalogs that still define them.
  pub const UNDER_2: &str = "under-2";
  pub const UNDER_18: &str = "under-18";
  pub const SIXTY_FIVE_PLUS: &str = "65-plus";
}

// ─── Label ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Label {
  pub id:        LabelId,
  pub name:      String,
  /// CSS colour, e.g. `#3b82f6`.
  pub color:     String,
  pub icon:      String,
  pub automatic: bool,
}

impl Label {
  pub fn manual(id: &str, name: &str, color: &str, icon: &str) -> Self {
    Self {
      id:        id.to_owned(),
      name:      name.to_owned(),
      color:     color.to_owned(),
      icon:      icon.to_owned(),
      automatic: false,
    }
  }

  pub fn automatic(id: &str, name: &str, color: &str, icon: &str) -> Self {
    Self {
      automatic: true,
      ..Self::manual(id, name, color, icon)
    }
  }
}

// ─── Catalog ─────────────────────────────────────────────────────────────────

/// The set of label definitions, keyed by id.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<Label>", into = "Vec<Label>")]
pub struct LabelCatalog {
  labels: BTreeMap<LabelId, Label>,
}

impl LabelCatalog {
  pub fn new() -> Self { Self::default() }

  /// The automatic labels the derivation rules produce, without the legacy
  /// age bands.
  pub fn defaults() -> Self {
    [
      Label::automatic(ids::CAT, "Cat", "#f59e0b", "cat"),
      Label::automatic(ids::DOG, "Dog", "#b45309", "dog"),
      Label::automatic(ids::VACCINATED, "Vaccinated", "#16a34a", "syringe"),
      Label::automatic(
        ids::VACCINATION_NEEDED,
        "Vaccination needed",
        "#dc2626",
        "alert-triangle",
      ),
      Label::automatic(ids::CHIPPED, "Chipped", "#0891b2", "cpu"),
      Label::automatic(ids::STERILIZED, "Sterilized", "#7c3aed", "scissors"),
      Label::automatic(ids::BABY, "Baby (0-1)", "#f472b6", "baby"),
      Label::automatic(ids::TODDLER, "Toddler", "#fb7185", "smile"),
      Label::automatic(ids::MINOR, "Minor", "#60a5fa", "user"),
      Label::automatic(ids::SENIOR, "Senior", "#6b7280", "user-check"),
      Label::automatic(ids::MISSING_BSN, "Missing BSN", "#ef4444", "id-card"),
      Label::automatic(ids::NEW_ARRIVAL, "New arrival", "#22c55e", "sparkles"),
      Label::automatic(ids::PET_OWNER, "Pet owner", "#a16207", "paw-print"),
    ]
    .into_iter()
    .collect()
  }

  /// [`Self::defaults`] plus the legacy "under 2" / "under 18" / "65+"
  /// bands.
  pub fn with_legacy_age_bands() -> Self {
    let mut catalog = Self::defaults();
    catalog.insert(Label::automatic(ids::UNDER_2, "Under 2", "#f9a8d4", "baby"));
    catalog.insert(Label::automatic(ids::UNDER_18, "Under 18", "#93c5fd", "user"));
    catalog.insert(Label::automatic(
      ids::SIXTY_FIVE_PLUS,
      "65+",
      "#9ca3af",
      "user-check",
    ));
    catalog
  }

  pub fn get(&self, id: &str) -> Option<&Label> { self.labels.get(id) }

  pub fn contains(&self, id: &str) -> bool { self.labels.contains_key(id) }

  /// `Some(true)` for automatic labels, `Some(false)` for manual ones,
  /// `None` when the id is not in the catalog.
  pub fn is_automatic(&self, id: &str) -> Option<bool> {
    self.labels.get(id).map(|l| l.automatic)
  }

  pub fn is_manual(&self, id: &str) -> bool {
    self.is_automatic(id) == Some(false)
  }

  /// Insert or replace a definition, returning the previous one.
  pub fn insert(&mut self, label: Label) -> Option<Label> {
    self.labels.insert(label.id.clone(), label)
  }

  pub fn remove(&mut self, id: &str) -> Option<Label> { self.labels.remove(id) }

  pub fn iter(&self) -> impl Iterator<Item = &Label> { self.labels.values() }

  pub fn len(&self) -> usize { self.labels.len() }

  pub fn is_empty(&self) -> bool { self.labels.is_empty() }
}

impl FromIterator<Label> for LabelCatalog {
  fn from_iter<I: IntoIterator<Item = Label>>(iter: I) -> Self {
    Self {
      labels: iter.into_iter().map(|l| (l.id.clone(), l)).collect(),
    }
  }
}

impl From<Vec<Label>> for LabelCatalog {
  fn from(labels: Vec<Label>) -> Self { labels.into_iter().collect() }
}

impl From<LabelCatalog> for Vec<Label> {
  fn from(catalog: LabelCatalog) -> Self {
    catalog.labels.into_values().collect()
  }
}

// ─── Changes ─────────────────────────────────────────────────────────────────

/// A label that appeared on, or disappeared from, a resident's current set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelChange {
  pub resident_id: Uuid,
  pub label_id:    LabelId,
  pub added:       bool,
}

// ─── History ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LabelAction {
  Added,
  Removed,
  Archived,
  Restored,
}

/// One append-only entry in a resident's history trail.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelHistoryEntry {
  pub id:         Uuid,
  /// `None` for archive/restore entries.
  pub label_id:   Option<LabelId>,
  /// The label's display name at the time of the change.
  pub label_name: Option<String>,
  pub action:     LabelAction,
  pub timestamp:  DateTime<Utc>,
  pub reason:     String,
  /// Who performed the action, when the caller supplied it.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub actor:      Option<String>,
}

impl LabelHistoryEntry {
  /// An `added` or `removed` entry for `label_id`. The name is looked up in
  /// `catalog` and falls back to the id for labels the catalog no longer
  /// defines.
  pub fn label_change(
    catalog: &LabelCatalog,
    label_id: &str,
    added: bool,
    timestamp: DateTime<Utc>,
    reason: impl Into<String>,
  ) -> Self {
    let label_name = catalog
      .get(label_id)
      .map(|l| l.name.clone())
      .unwrap_or_else(|| label_id.to_owned());
    Self {
      id: Uuid::new_v4(),
      label_id: Some(label_id.to_owned()),
      label_name: Some(label_name),
      action: if added {
        LabelAction::Added
      } else {
        LabelAction::Removed
      },
      timestamp,
      reason: reason.into(),
      actor: None,
    }
  }

  /// An `archived` or `restored` entry.
  pub fn archival(
    action: LabelAction,
    timestamp: DateTime<Utc>,
    reason: impl Into<String>,
  ) -> Self {
    Self {
      id: Uuid::new_v4(),
      label_id: None,
      label_name: None,
      action,
      timestamp,
      reason: reason.into(),
      actor: None,
    }
  }

  pub fn by(mut self, actor: Option<&str>) -> Self {
    self.actor = actor.map(str::to_owned);
    self
  }
}
