//! The resident lifecycle controller, the only code that mutates a
//! [`Registry`].
//!
//! Each resident moves `Active → Archived → Active → …` with no terminal
//! state. Every create, update, archive and restore re-derives labels and
//! then recomputes the relational "pet owner" label across the whole
//! population, because one pet's status can change several owners at once.
//!
//! Operations on unknown ids are no-ops that leave the registry untouched
//! and report `None`/`false`.

use std::collections::BTreeSet;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use tracing::{debug, info};
use uuid::Uuid;

use crate::{
  clock::{Clock, SystemClock},
  derive::derive_automatic_labels,
  family::{self, InverseRoles, UnlinkReport},
  label::{
    Label, LabelAction, LabelCatalog, LabelChange, LabelHistoryEntry, LabelId,
    ids,
  },
  population::Population,
  resident::{
    Archival, ArchiveReason, FamilyId, FamilyLink, FamilyRole, Resident,
    ResidentId, ResidentKind,
  },
};

pub const REASON_REGISTERED: &str = "Registered";
pub const REASON_UPDATED: &str = "Details updated";
pub const REASON_REFRESHED: &str = "Periodic recalculation";
pub const REASON_MANUAL: &str = "Manual change";
pub const REASON_RELATIONS: &str = "Family or pet status changed";
pub const REASON_RESTORED: &str = "Restored";

// ─── Registry ────────────────────────────────────────────────────────────────

/// The population and the label catalog, passed together into every
/// operation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Registry {
  pub residents: Population,
  pub catalog:   LabelCatalog,
}

impl Registry {
  pub fn new(catalog: LabelCatalog) -> Self {
    Self {
      residents: Population::new(),
      catalog,
    }
  }
}

// ─── Inputs ──────────────────────────────────────────────────────────────────

/// Family placement supplied with a create or update.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FamilyInput {
  /// Reused when set; otherwise taken from the members or freshly minted.
  pub family_id: Option<FamilyId>,
  pub role:      Option<FamilyRole>,
  pub members:   Vec<ResidentId>,
}

/// Input to [`Lifecycle::create`]. The id and registration date are always
/// assigned by the controller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewResident {
  #[serde(default)]
  pub first_name:  String,
  #[serde(default)]
  pub last_name:   String,
  #[serde(default)]
  pub birth_date:  Option<NaiveDate>,
  #[serde(default)]
  pub gender:      String,
  #[serde(default)]
  pub room_number: String,
  /// Manual labels chosen by the user.
  #[serde(default)]
  pub labels:      BTreeSet<LabelId>,
  #[serde(default)]
  pub family:      Option<FamilyInput>,
  pub kind:        ResidentKind,
}

/// Input to [`Lifecycle::update`]. Absent fields are left unchanged.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResidentPatch {
  pub first_name:  Option<String>,
  pub last_name:   Option<String>,
  /// `Some(None)` clears the birth date.
  #[serde(deserialize_with = "double_option")]
  pub birth_date:  Option<Option<NaiveDate>>,
  pub gender:      Option<String>,
  pub room_number: Option<String>,
  pub kind:        Option<ResidentKind>,
  /// The label set as the user left it; only its manual labels are kept.
  pub labels:      Option<BTreeSet<LabelId>>,
  /// Replaces the resident's family placement. An empty input leaves the
  /// family.
  pub family:      Option<FamilyInput>,
}

/// Distinguishes an explicit `null` from an absent field.
fn double_option<'de, D, T>(de: D) -> Result<Option<Option<T>>, D::Error>
where
  D: Deserializer<'de>,
  T: Deserialize<'de>,
{
  Option::<T>::deserialize(de).map(Some)
}

/// What [`Lifecycle::toggle_label`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToggleOutcome {
  pub action:    LabelAction,
  /// The label is automatic; the next recalculation will override the
  /// toggle.
  pub automatic: bool,
}

// ─── Controller ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct Lifecycle<C = SystemClock> {
  clock:         C,
  inverse_roles: InverseRoles,
  actor:         Option<String>,
}

impl Default for Lifecycle<SystemClock> {
  fn default() -> Self { Self::new() }
}

impl Lifecycle<SystemClock> {
  pub fn new() -> Self { Self::with_clock(SystemClock) }
}

impl<C: Clock> Lifecycle<C> {
  pub fn with_clock(clock: C) -> Self {
    Self {
      clock,
      inverse_roles: InverseRoles::standard(),
      actor: None,
    }
  }

  pub fn with_inverse_roles(mut self, inverse_roles: InverseRoles) -> Self {
    self.inverse_roles = inverse_roles;
    self
  }

  /// A copy of this controller that attributes history entries to `actor`.
  pub fn acting_as(&self, actor: impl Into<String>) -> Self
  where
    C: Clone,
  {
    Self {
      actor: Some(actor.into()),
      ..self.clone()
    }
  }

  pub fn now(&self) -> DateTime<Utc> { self.clock.now() }

  // ── Create / update ──────────────────────────────────────────────────────

  /// Register a new resident and return its id.
  pub fn create(&self, registry: &mut Registry, input: NewResident) -> ResidentId {
    let now = self.now();
    let Registry { residents, catalog } = registry;

    let mut resident = Resident {
      id:                Uuid::new_v4(),
      first_name:        input.first_name,
      last_name:         input.last_name,
      birth_date:        input.birth_date,
      gender:            input.gender,
      room_number:       input.room_number,
      registration_date: now,
      labels:            BTreeSet::new(),
      label_history:     Vec::new(),
      archive:           None,
      family:            FamilyLink::default(),
      kind:              input.kind,
    };
    let id = resident.id;
    let variant = resident.variant();

    let next = next_labels(&resident, &input.labels, catalog, now);
    apply_labels(&mut resident, next, catalog, now, REASON_REGISTERED, self.actor());
    residents.insert(resident);

    if let Some(placement) = input.family {
      self.place_in_family(residents, id, placement);
    }

    info!(resident_id = %id, %variant, "resident registered");
    self.recompute_relations(registry, now);
    id
  }

  /// Apply `patch` to a resident and recompute its labels. Manual labels
  /// survive; automatic ones are re-derived from the patched attributes.
  pub fn update(
    &self,
    registry: &mut Registry,
    id: ResidentId,
    patch: ResidentPatch,
  ) -> bool {
    let now = self.now();
    let Registry { residents, catalog } = registry;
    let Some(resident) = residents.get_mut(id) else {
      debug!(resident_id = %id, "update: unknown resident");
      return false;
    };

    if let Some(first_name) = patch.first_name {
      resident.first_name = first_name;
    }
    if let Some(last_name) = patch.last_name {
      resident.last_name = last_name;
    }
    if let Some(birth_date) = patch.birth_date {
      resident.birth_date = birth_date;
    }
    if let Some(gender) = patch.gender {
      resident.gender = gender;
    }
    if let Some(room_number) = patch.room_number {
      resident.room_number = room_number;
    }
    if let Some(kind) = patch.kind {
      resident.kind = kind;
    }

    let chosen = patch.labels.unwrap_or_else(|| resident.labels.clone());
    let next = next_labels(resident, &chosen, catalog, now);
    apply_labels(resident, next, catalog, now, REASON_UPDATED, self.actor());

    if let Some(placement) = patch.family {
      // A placement that keeps every current member only adds links.
      let keeps_members = residents.get(id).is_some_and(|r| {
        placement.family_id.is_none_or(|f| r.family.family_id == Some(f))
          && r.family.members.iter().all(|m| placement.members.contains(m))
      });
      let former = if keeps_members {
        None
      } else {
        family::detach(residents, id)
      };
      self.place_in_family(residents, id, placement);
      if let Some(former) = former {
        for warning in family::family_warnings(residents, &former.former_members) {
          warning.log();
        }
      }
    }

    info!(resident_id = %id, "resident updated");
    self.recompute_relations(registry, now);
    true
  }

  /// Re-derive the automatic labels of every resident at the current time,
  /// e.g. to expire "new arrival" labels. Manual labels are untouched.
  pub fn refresh(&self, registry: &mut Registry) -> Vec<LabelChange> {
    let now = self.now();
    let Registry { residents, catalog } = registry;

    let mut changes = Vec::new();
    for resident in residents.iter_mut() {
      let current = resident.labels.clone();
      let next = next_labels(resident, &current, catalog, now);
      changes.extend(apply_labels(
        resident,
        next,
        catalog,
        now,
        REASON_REFRESHED,
        self.actor(),
      ));
    }
    changes.extend(self.recompute_relations(registry, now));
    debug!(changes = changes.len(), "labels refreshed");
    changes
  }

  // ── Labels ───────────────────────────────────────────────────────────────

  /// Flip one label on one resident and record it in the history.
  ///
  /// Automatic labels can be toggled too, but the next update or refresh
  /// derives them again; [`ToggleOutcome::automatic`] reports this. Returns
  /// `None` for an unknown resident or a label missing from the catalog.
  pub fn toggle_label(
    &self,
    registry: &mut Registry,
    id: ResidentId,
    label_id: &str,
    reason: Option<&str>,
  ) -> Option<ToggleOutcome> {
    let now = self.now();
    let Registry { residents, catalog } = registry;
    let Some(automatic) = catalog.is_automatic(label_id) else {
      debug!(label_id, "toggle_label: label not in catalog");
      return None;
    };
    let Some(resident) = residents.get_mut(id) else {
      debug!(resident_id = %id, "toggle_label: unknown resident");
      return None;
    };

    let added = if resident.labels.remove(label_id) {
      false
    } else {
      resident.labels.insert(label_id.to_owned());
      true
    };
    resident.label_history.push(
      LabelHistoryEntry::label_change(
        catalog,
        label_id,
        added,
        now,
        reason.unwrap_or(REASON_MANUAL),
      )
      .by(self.actor()),
    );

    if automatic {
      debug!(resident_id = %id, label_id, "automatic label toggled by hand");
    }
    let action = if added {
      LabelAction::Added
    } else {
      LabelAction::Removed
    };
    Some(ToggleOutcome { action, automatic })
  }

  /// Add or replace a catalog entry, returning the previous definition.
  pub fn upsert_label(&self, registry: &mut Registry, label: Label) -> Option<Label> {
    info!(label_id = %label.id, automatic = label.automatic, "label saved");
    registry.catalog.insert(label)
  }

  /// Remove a label from the catalog and from every resident's current
  /// labels. History entries that mention it are kept.
  pub fn delete_label_from_catalog(
    &self,
    registry: &mut Registry,
    label_id: &str,
  ) -> Option<Label> {
    let removed = registry.catalog.remove(label_id)?;
    let mut purged = 0_usize;
    for resident in registry.residents.iter_mut() {
      if resident.labels.remove(label_id) {
        purged += 1;
      }
    }
    info!(label_id, purged, "label deleted from catalog");
    Some(removed)
  }

  // ── Archive / restore ────────────────────────────────────────────────────

  /// Archive an active resident. Returns `false` for unknown or already
  /// archived residents.
  pub fn archive(
    &self,
    registry: &mut Registry,
    id: ResidentId,
    reason: ArchiveReason,
    custom_text: Option<String>,
  ) -> bool {
    let now = self.now();
    let Some(resident) = registry.residents.get_mut(id) else {
      debug!(resident_id = %id, "archive: unknown resident");
      return false;
    };
    if resident.is_archived() {
      debug!(resident_id = %id, "archive: already archived");
      return false;
    }

    let custom_text = custom_text
      .map(|t| t.trim().to_owned())
      .filter(|t| !t.is_empty());
    let text = match &custom_text {
      Some(custom) => format!("{}: {custom}", reason.description()),
      None => reason.description().to_owned(),
    };

    resident.archive = Some(Archival {
      reason,
      date: now,
      custom_text,
    });
    resident.label_history.push(
      LabelHistoryEntry::archival(LabelAction::Archived, now, text).by(self.actor()),
    );

    info!(resident_id = %id, reason = reason.as_ref(), "resident archived");
    self.recompute_relations(registry, now);
    true
  }

  /// Return an archived resident to the active population. Returns `false`
  /// for unknown or active residents.
  pub fn restore(
    &self,
    registry: &mut Registry,
    id: ResidentId,
    reason: Option<&str>,
  ) -> bool {
    let now = self.now();
    let Some(resident) = registry.residents.get_mut(id) else {
      debug!(resident_id = %id, "restore: unknown resident");
      return false;
    };
    if resident.archive.take().is_none() {
      debug!(resident_id = %id, "restore: not archived");
      return false;
    }
    resident.label_history.push(
      LabelHistoryEntry::archival(
        LabelAction::Restored,
        now,
        reason.unwrap_or(REASON_RESTORED),
      )
      .by(self.actor()),
    );

    info!(resident_id = %id, "resident restored");
    self.recompute_relations(registry, now);
    true
  }

  // ── Family ───────────────────────────────────────────────────────────────

  /// Link a resident to `related_ids`, e.g. after accepting a suggestion.
  ///
  /// The family id is taken from the resident, then from the first related
  /// resident that has one, and minted otherwise. Returns the family id, or
  /// `None` for an unknown resident.
  pub fn add_to_family(
    &self,
    registry: &mut Registry,
    id: ResidentId,
    related_ids: &[ResidentId],
    role: Option<FamilyRole>,
  ) -> Option<FamilyId> {
    if !registry.residents.contains(id) {
      debug!(resident_id = %id, "add_to_family: unknown resident");
      return None;
    }
    let family_id = self.place_in_family(
      &mut registry.residents,
      id,
      FamilyInput {
        family_id: None,
        role,
        members: related_ids.to_vec(),
      },
    );
    self.recompute_relations(registry, self.now());
    family_id
  }

  /// Take a resident out of its family. See [`family::unlink_family`] for
  /// the warnings this can report.
  pub fn remove_from_family(
    &self,
    registry: &mut Registry,
    id: ResidentId,
  ) -> Option<UnlinkReport> {
    let report = family::unlink_family(&mut registry.residents, id)?;
    info!(
      resident_id = %id,
      warnings = report.warnings.len(),
      "resident removed from family"
    );
    self.recompute_relations(registry, self.now());
    Some(report)
  }

  /// Clear families that shrank to a single member. See
  /// [`family::reconcile_dissolved_families`].
  pub fn reconcile_families(&self, registry: &mut Registry) -> Vec<ResidentId> {
    let cleared = family::reconcile_dissolved_families(&mut registry.residents);
    if !cleared.is_empty() {
      info!(cleared = cleared.len(), "dissolved families cleared");
      self.recompute_relations(registry, self.now());
    }
    cleared
  }

  // ── Internals ────────────────────────────────────────────────────────────

  fn actor(&self) -> Option<&str> { self.actor.as_deref() }

  /// Link `id` as described by `placement`. An input with neither members
  /// nor a family id places nothing.
  fn place_in_family(
    &self,
    residents: &mut Population,
    id: ResidentId,
    placement: FamilyInput,
  ) -> Option<FamilyId> {
    if placement.members.is_empty() && placement.family_id.is_none() {
      return None;
    }
    let family_id = placement
      .family_id
      .or_else(|| residents.get(id).and_then(|r| r.family.family_id))
      .or_else(|| {
        placement
          .members
          .iter()
          .find_map(|m| residents.get(*m).and_then(|r| r.family.family_id))
      })
      .unwrap_or_else(Uuid::new_v4);

    family::link_family(
      residents,
      id,
      &placement.members,
      family_id,
      placement.role,
      Some(&self.inverse_roles),
    )
    .then_some(family_id)
  }

  /// Recompute "pet owner" for the whole population and log each change in
  /// the affected resident's history. Skipped unless the catalog defines the
  /// label as automatic.
  fn recompute_relations(
    &self,
    registry: &mut Registry,
    now: DateTime<Utc>,
  ) -> Vec<LabelChange> {
    if registry.catalog.is_automatic(ids::PET_OWNER) != Some(true) {
      return Vec::new();
    }
    let changes = family::recompute_pet_owner_labels(&mut registry.residents, now);
    for change in &changes {
      if let Some(resident) = registry.residents.get_mut(change.resident_id) {
        resident.label_history.push(
          LabelHistoryEntry::label_change(
            &registry.catalog,
            &change.label_id,
            change.added,
            now,
            REASON_RELATIONS,
          )
          .by(self.actor()),
        );
      }
    }
    changes
  }
}

/// The label set a resident should carry: the manual labels among `chosen`,
/// the derived labels the catalog flags automatic, and a human's relational
/// "pet owner" label as it stands until the next recompute settles it.
///
/// The catalog decides which side a label is on. A derived id that has been
/// redefined as manual is left to the user: derivation neither adds nor
/// removes it.
fn next_labels(
  resident: &Resident,
  chosen: &BTreeSet<LabelId>,
  catalog: &LabelCatalog,
  now: DateTime<Utc>,
) -> BTreeSet<LabelId> {
  let mut next: BTreeSet<LabelId> = chosen
    .iter()
    .filter(|id| catalog.is_manual(id))
    .cloned()
    .collect();
  next.extend(
    derive_automatic_labels(resident, now)
      .into_iter()
      .filter(|id| catalog.is_automatic(id) == Some(true)),
  );
  if resident.is_human()
    && resident.labels.contains(ids::PET_OWNER)
    && catalog.is_automatic(ids::PET_OWNER) == Some(true)
  {
    next.insert(ids::PET_OWNER.to_owned());
  }
  next
}

/// Replace `resident.labels` with `next`, appending a history entry for
/// every label that appeared or disappeared.
fn apply_labels(
  resident: &mut Resident,
  next: BTreeSet<LabelId>,
  catalog: &LabelCatalog,
  at: DateTime<Utc>,
  reason: &str,
  actor: Option<&str>,
) -> Vec<LabelChange> {
  let mut changes = Vec::new();
  for removed in resident.labels.difference(&next) {
    changes.push(LabelChange {
      resident_id: resident.id,
      label_id:    removed.clone(),
      added:       false,
    });
  }
  for added in next.difference(&resident.labels) {
    changes.push(LabelChange {
      resident_id: resident.id,
      label_id:    added.clone(),
      added:       true,
    });
  }
  for change in &changes {
    resident.label_history.push(
      LabelHistoryEntry::label_change(catalog, &change.label_id, change.added, at, reason)
        .by(actor),
    );
  }
  resident.labels = next;
  changes
}

#[cfg(test)]
mod tests {
  use chrono::TimeZone;

  use super::*;
  use crate::{
    clock::FixedClock,
    family::FamilyWarning,
    resident::{AnimalDetails, FamilyState, HumanDetails},
  };

  fn at(y: i32, m: u32, d: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(y, m, d, 9, 0, 0).unwrap()
  }

  fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
  }

  fn lifecycle() -> Lifecycle<FixedClock> {
    Lifecycle::with_clock(FixedClock(at(2024, 6, 1)))
  }

  fn registry() -> Registry {
    let mut catalog = LabelCatalog::defaults();
    catalog.insert(Label::manual("vip", "VIP", "#111827", "star"));
    catalog.insert(Label::manual("diet", "Dietary needs", "#65a30d", "apple"));
    Registry::new(catalog)
  }

  fn person(first: &str, birth: NaiveDate, labels: &[&str]) -> NewResident {
    NewResident {
      first_name:  first.into(),
      last_name:   "Hassan".into(),
      birth_date:  Some(birth),
      gender:      String::new(),
      room_number: "4".into(),
      labels:      labels.iter().map(|l| l.to_string()).collect(),
      family:      None,
      kind:        ResidentKind::Human(HumanDetails::default()),
    }
  }

  fn adult(first: &str) -> NewResident { person(first, date(1980, 1, 1), &[]) }

  fn cat_of(owner: ResidentId) -> NewResident {
    NewResident {
      first_name:  "Minoes".into(),
      last_name:   String::new(),
      birth_date:  None,
      gender:      String::new(),
      room_number: "4".into(),
      labels:      BTreeSet::new(),
      family:      Some(FamilyInput {
        family_id: None,
        role:      Some(FamilyRole::Pet),
        members:   vec![owner],
      }),
      kind:        ResidentKind::Cat(AnimalDetails::default()),
    }
  }

  fn resident(registry: &Registry, id: ResidentId) -> &Resident {
    registry.residents.get(id).unwrap()
  }

  fn has(registry: &Registry, id: ResidentId, label: &str) -> bool {
    resident(registry, id).labels.contains(label)
  }

  #[test]
  fn create_merges_derived_and_manual_labels() {
    let mut reg = registry();
    let id = lifecycle().create(
      &mut reg,
      person("Amira", date(1980, 1, 1), &["vip", ids::MINOR, "unknown"]),
    );

    let r = resident(&reg, id);
    assert_eq!(r.registration_date, at(2024, 6, 1));
    assert!(has(&reg, id, "vip"));
    assert!(has(&reg, id, ids::NEW_ARRIVAL));
    assert!(has(&reg, id, ids::MISSING_BSN));
    // Automatic labels come from derivation only; unknown ids are dropped.
    assert!(!has(&reg, id, ids::MINOR));
    assert!(!has(&reg, id, "unknown"));

    assert_eq!(r.label_history.len(), r.labels.len());
    assert!(r.label_history.iter().all(|e| {
      e.action == LabelAction::Added && e.reason == REASON_REGISTERED && e.actor.is_none()
    }));
  }

  #[test]
  fn update_keeps_manual_labels() {
    let mut reg = registry();
    let lc = lifecycle();
    let id = lc.create(&mut reg, person("Amira", date(1980, 1, 1), &["vip"]));
    let before = resident(&reg, id).clone();

    assert!(lc.update(&mut reg, id, ResidentPatch {
      room_number: Some("12".into()),
      ..Default::default()
    }));

    let after = resident(&reg, id);
    assert_eq!(after.room_number, "12");
    assert_eq!(after.labels, before.labels);
    assert_eq!(after.label_history, before.label_history);
    assert_eq!(after.registration_date, before.registration_date);
  }

  #[test]
  fn update_rederives_automatic_labels() {
    let mut reg = registry();
    let lc = lifecycle();
    let id = lc.create(&mut reg, adult("Amira"));
    assert!(has(&reg, id, ids::MISSING_BSN));

    lc.update(&mut reg, id, ResidentPatch {
      kind: Some(ResidentKind::Human(HumanDetails {
        bsn: Some("123456782".into()),
        ..Default::default()
      })),
      ..Default::default()
    });

    assert!(!has(&reg, id, ids::MISSING_BSN));
    let last = resident(&reg, id).label_history.last().unwrap();
    assert_eq!(last.label_id.as_deref(), Some(ids::MISSING_BSN));
    assert_eq!(last.action, LabelAction::Removed);
    assert_eq!(last.reason, REASON_UPDATED);
  }

  #[test]
  fn update_with_label_set_replaces_manual_labels_only() {
    let mut reg = registry();
    let lc = lifecycle();
    let id = lc.create(&mut reg, person("Amira", date(1980, 1, 1), &["vip"]));

    // The user removed "vip", added "diet" and stripped an automatic label.
    lc.update(&mut reg, id, ResidentPatch {
      labels: Some(["diet".to_string()].into()),
      ..Default::default()
    });

    assert!(has(&reg, id, "diet"));
    assert!(!has(&reg, id, "vip"));
    assert!(has(&reg, id, ids::NEW_ARRIVAL));
  }

  #[test]
  fn clearing_birth_date_drops_age_labels() {
    let mut reg = registry();
    let lc = lifecycle();
    let id = lc.create(&mut reg, person("Yusuf", date(2015, 3, 1), &[]));
    assert!(has(&reg, id, ids::MINOR));

    let absent: ResidentPatch = serde_json::from_str("{}").unwrap();
    assert_eq!(absent.birth_date, None);
    let clear: ResidentPatch = serde_json::from_str(r#"{"birth_date":null}"#).unwrap();
    assert_eq!(clear.birth_date, Some(None));

    lc.update(&mut reg, id, clear);
    assert_eq!(resident(&reg, id).birth_date, None);
    assert!(!has(&reg, id, ids::MINOR));
  }

  #[test]
  fn unknown_ids_leave_the_registry_untouched() {
    let mut reg = registry();
    let lc = lifecycle();
    lc.create(&mut reg, adult("Amira"));
    let before = reg.clone();
    let ghost = Uuid::new_v4();

    assert!(!lc.update(&mut reg, ghost, ResidentPatch::default()));
    assert!(!lc.archive(&mut reg, ghost, ArchiveReason::Departed, None));
    assert!(!lc.restore(&mut reg, ghost, None));
    assert_eq!(lc.toggle_label(&mut reg, ghost, "vip", None), None);
    assert_eq!(lc.add_to_family(&mut reg, ghost, &[], None), None);
    assert_eq!(lc.remove_from_family(&mut reg, ghost), None);
    assert_eq!(lc.delete_label_from_catalog(&mut reg, "nonexistent"), None);
    assert_eq!(reg, before);
  }

  #[test]
  fn toggle_flips_a_label_and_records_it() {
    let mut reg = registry();
    let lc = lifecycle().acting_as("intake-desk");
    let id = lc.create(&mut reg, adult("Amira"));

    let on = lc.toggle_label(&mut reg, id, "vip", None).unwrap();
    assert_eq!(on, ToggleOutcome {
      action:    LabelAction::Added,
      automatic: false,
    });
    assert!(has(&reg, id, "vip"));

    let off = lc.toggle_label(&mut reg, id, "vip", Some("Mistake")).unwrap();
    assert_eq!(off.action, LabelAction::Removed);
    assert!(!has(&reg, id, "vip"));

    let history = &resident(&reg, id).label_history;
    let last_two = &history[history.len() - 2..];
    assert_eq!(last_two[0].reason, REASON_MANUAL);
    assert_eq!(last_two[1].reason, "Mistake");
    assert!(history.iter().all(|e| e.actor.as_deref() == Some("intake-desk")));
  }

  #[test]
  fn toggled_automatic_label_returns_on_next_update() {
    let mut reg = registry();
    let lc = lifecycle();
    let id = lc.create(&mut reg, adult("Amira"));

    let outcome = lc.toggle_label(&mut reg, id, ids::MISSING_BSN, None).unwrap();
    assert_eq!(outcome.action, LabelAction::Removed);
    assert!(outcome.automatic);
    assert!(!has(&reg, id, ids::MISSING_BSN));

    lc.update(&mut reg, id, ResidentPatch::default());
    assert!(has(&reg, id, ids::MISSING_BSN));
  }

  #[test]
  fn toggle_rejects_labels_outside_the_catalog() {
    let mut reg = registry();
    let lc = lifecycle();
    let id = lc.create(&mut reg, adult("Amira"));
    assert_eq!(lc.toggle_label(&mut reg, id, "nonexistent", None), None);
    assert!(!has(&reg, id, "nonexistent"));
  }

  #[test]
  fn pet_owner_follows_pet_archive_and_restore() {
    let mut reg = registry();
    let lc = lifecycle();
    let owner = lc.create(&mut reg, adult("Amira"));
    let cat = lc.create(&mut reg, cat_of(owner));

    assert!(has(&reg, owner, ids::PET_OWNER));
    let added = resident(&reg, owner).label_history.last().unwrap();
    assert_eq!(added.label_id.as_deref(), Some(ids::PET_OWNER));
    assert_eq!(added.reason, REASON_RELATIONS);

    assert!(lc.archive(
      &mut reg,
      cat,
      ArchiveReason::Adopted,
      Some("  By the Jansen family ".into())
    ));
    assert!(!has(&reg, owner, ids::PET_OWNER));
    let archived = resident(&reg, cat);
    assert_eq!(
      archived.archive.as_ref().and_then(|a| a.custom_text.as_deref()),
      Some("By the Jansen family")
    );
    let entry = archived.label_history.last().unwrap();
    assert_eq!(entry.action, LabelAction::Archived);
    assert_eq!(entry.reason, "Adopted: By the Jansen family");
    assert!(!lc.archive(&mut reg, cat, ArchiveReason::Other, None));

    assert!(lc.restore(&mut reg, cat, None));
    assert!(has(&reg, owner, ids::PET_OWNER));
    let entry = resident(&reg, cat).label_history.last().unwrap();
    assert_eq!(entry.action, LabelAction::Restored);
    assert_eq!(entry.reason, REASON_RESTORED);
    assert!(!lc.restore(&mut reg, cat, None));
  }

  #[test]
  fn update_does_not_churn_pet_owner_history() {
    let mut reg = registry();
    let lc = lifecycle();
    let owner = lc.create(&mut reg, adult("Amira"));
    lc.create(&mut reg, cat_of(owner));
    let history_len = resident(&reg, owner).label_history.len();

    lc.update(&mut reg, owner, ResidentPatch {
      room_number: Some("7".into()),
      ..Default::default()
    });

    assert!(has(&reg, owner, ids::PET_OWNER));
    assert_eq!(resident(&reg, owner).label_history.len(), history_len);
  }

  #[test]
  fn pet_owner_is_skipped_once_deleted_from_catalog() {
    let mut reg = registry();
    let lc = lifecycle();
    assert!(lc.delete_label_from_catalog(&mut reg, ids::PET_OWNER).is_some());

    let owner = lc.create(&mut reg, adult("Amira"));
    lc.create(&mut reg, cat_of(owner));
    assert!(!has(&reg, owner, ids::PET_OWNER));
  }

  #[test]
  fn deleting_a_label_purges_it_but_keeps_history() {
    let mut reg = registry();
    let lc = lifecycle();
    let id = lc.create(&mut reg, person("Amira", date(1980, 1, 1), &["vip"]));

    let removed = lc.delete_label_from_catalog(&mut reg, "vip").unwrap();
    assert_eq!(removed.name, "VIP");
    assert!(!has(&reg, id, "vip"));
    assert!(!reg.catalog.contains("vip"));
    assert!(
      resident(&reg, id)
        .label_history
        .iter()
        .any(|e| e.label_id.as_deref() == Some("vip"))
    );
    assert_eq!(lc.delete_label_from_catalog(&mut reg, "vip"), None);
  }

  #[test]
  fn upsert_replaces_a_definition() {
    let mut reg = registry();
    let lc = lifecycle();
    let previous =
      lc.upsert_label(&mut reg, Label::manual("vip", "Very important", "#000000", "star"));
    assert_eq!(previous.map(|l| l.name), Some("VIP".to_string()));
    assert_eq!(reg.catalog.get("vip").map(|l| l.name.as_str()), Some("Very important"));
  }

  #[test]
  fn add_to_family_reuses_the_existing_family_id() {
    let mut reg = registry();
    let lc = lifecycle();
    let a = lc.create(&mut reg, adult("Amira"));
    let b = lc.create(&mut reg, adult("Omar"));
    let family_id = lc
      .add_to_family(&mut reg, a, &[b], Some(FamilyRole::Spouse))
      .unwrap();

    let c = lc.create(&mut reg, person("Yusuf", date(2015, 3, 1), &[]));
    assert_eq!(
      lc.add_to_family(&mut reg, c, &[a], Some(FamilyRole::Child)),
      Some(family_id)
    );

    assert_eq!(resident(&reg, b).family.role, Some(FamilyRole::Spouse));
    assert_eq!(resident(&reg, a).family.role, Some(FamilyRole::Spouse));
    assert_eq!(resident(&reg, c).family.role, Some(FamilyRole::Child));
    assert!(resident(&reg, c).family.members.contains(&a));
    assert!(resident(&reg, a).family.members.contains(&c));
    for id in [a, b, c] {
      assert_eq!(resident(&reg, id).family.family_id, Some(family_id));
    }
  }

  #[test]
  fn removing_from_a_pair_leaves_a_dissolved_family() {
    let mut reg = registry();
    let lc = lifecycle();
    let a = lc.create(&mut reg, adult("Amira"));
    let b = lc.create(&mut reg, adult("Omar"));
    let family_id = lc.add_to_family(&mut reg, a, &[b], None).unwrap();

    let report = lc.remove_from_family(&mut reg, a).unwrap();
    assert_eq!(report.former_family_id, Some(family_id));
    assert_eq!(report.warnings, vec![FamilyWarning::DissolvedFamily {
      resident_id: b,
      family_id,
    }]);
    assert_eq!(resident(&reg, a).family_state(), FamilyState::Unaffiliated);
    assert_eq!(resident(&reg, b).family_state(), FamilyState::Dissolved { family_id });
  }

  #[test]
  fn reconcile_clears_the_dissolved_survivor() {
    let mut reg = registry();
    let lc = lifecycle();
    let a = lc.create(&mut reg, adult("Amira"));
    let b = lc.create(&mut reg, adult("Omar"));
    lc.add_to_family(&mut reg, a, &[b], None);
    lc.remove_from_family(&mut reg, a);

    assert_eq!(lc.reconcile_families(&mut reg), vec![b]);
    assert_eq!(resident(&reg, b).family_state(), FamilyState::Unaffiliated);
    assert!(lc.reconcile_families(&mut reg).is_empty());
  }

  #[test]
  fn update_can_replace_family_placement() {
    let mut reg = registry();
    let lc = lifecycle();
    let a = lc.create(&mut reg, adult("Amira"));
    let b = lc.create(&mut reg, adult("Omar"));
    let c = lc.create(&mut reg, adult("Layla"));
    lc.add_to_family(&mut reg, a, &[b], None);

    lc.update(&mut reg, a, ResidentPatch {
      family: Some(FamilyInput {
        members: vec![c],
        ..Default::default()
      }),
      ..Default::default()
    });

    let members = &resident(&reg, a).family.members;
    assert!(members.contains(&c));
    assert!(!members.contains(&b));
    assert!(!resident(&reg, b).family.members.contains(&a));
    assert!(matches!(resident(&reg, b).family_state(), FamilyState::Dissolved { .. }));
  }

  #[test]
  fn update_extending_a_family_keeps_existing_links() {
    let mut reg = registry();
    let lc = lifecycle();
    let a = lc.create(&mut reg, adult("Amira"));
    let b = lc.create(&mut reg, adult("Omar"));
    let c = lc.create(&mut reg, adult("Layla"));
    let family_id = lc
      .add_to_family(&mut reg, a, &[b], Some(FamilyRole::Spouse))
      .unwrap();

    lc.update(&mut reg, a, ResidentPatch {
      family: Some(FamilyInput {
        members: vec![b, c],
        ..Default::default()
      }),
      ..Default::default()
    });

    assert_eq!(resident(&reg, a).family.members, BTreeSet::from([b, c]));
    assert_eq!(resident(&reg, a).family.role, Some(FamilyRole::Spouse));
    assert!(resident(&reg, b).family.members.contains(&a));
    for id in [a, b, c] {
      assert_eq!(resident(&reg, id).family.family_id, Some(family_id));
    }
  }

  #[test]
  fn owner_turned_animal_loses_pet_owner() {
    let mut reg = registry();
    let lc = lifecycle();
    let owner = lc.create(&mut reg, adult("Amira"));
    lc.create(&mut reg, cat_of(owner));
    assert!(has(&reg, owner, ids::PET_OWNER));

    lc.update(&mut reg, owner, ResidentPatch {
      kind: Some(ResidentKind::Dog(AnimalDetails::default())),
      ..Default::default()
    });

    assert!(has(&reg, owner, ids::DOG));
    assert!(!has(&reg, owner, ids::PET_OWNER));
    let last_pet_owner_entry = resident(&reg, owner)
      .label_history
      .iter()
      .rev()
      .find(|e| e.label_id.as_deref() == Some(ids::PET_OWNER))
      .unwrap();
    assert_eq!(last_pet_owner_entry.action, LabelAction::Removed);

    lc.refresh(&mut reg);
    assert!(!has(&reg, owner, ids::PET_OWNER));
  }

  #[test]
  fn derived_id_redefined_as_manual_is_left_to_the_user() {
    let mut reg = registry();
    let lc = lifecycle();
    lc.upsert_label(&mut reg, Label::manual(ids::SENIOR, "Senior", "#6b7280", "cane"));

    let id = lc.create(&mut reg, person("Fatima", date(1950, 1, 1), &[]));
    assert!(!has(&reg, id, ids::SENIOR));

    lc.toggle_label(&mut reg, id, ids::SENIOR, None);
    lc.update(&mut reg, id, ResidentPatch {
      birth_date: Some(Some(date(1990, 1, 1))),
      ..Default::default()
    });
    assert!(has(&reg, id, ids::SENIOR));

    lc.toggle_label(&mut reg, id, ids::SENIOR, None);
    lc.update(&mut reg, id, ResidentPatch {
      birth_date: Some(Some(date(1950, 1, 1))),
      ..Default::default()
    });
    assert!(!has(&reg, id, ids::SENIOR));
  }

  #[test]
  fn refresh_expires_new_arrivals() {
    let mut reg = registry();
    let id = lifecycle().create(&mut reg, person("Amira", date(1980, 1, 1), &["vip"]));
    assert!(has(&reg, id, ids::NEW_ARRIVAL));

    let later = Lifecycle::with_clock(FixedClock(at(2024, 7, 15)));
    let changes = later.refresh(&mut reg);

    assert_eq!(changes, vec![LabelChange {
      resident_id: id,
      label_id:    ids::NEW_ARRIVAL.to_owned(),
      added:       false,
    }]);
    assert!(!has(&reg, id, ids::NEW_ARRIVAL));
    assert!(has(&reg, id, "vip"));
    assert_eq!(
      resident(&reg, id).label_history.last().map(|e| e.reason.as_str()),
      Some(REASON_REFRESHED)
    );
  }

  #[test]
  fn legacy_bands_apply_only_when_catalogued() {
    let lc = lifecycle();
    let baby = || person("Noor", date(2024, 1, 1), &[]);

    let mut legacy = Registry::new(LabelCatalog::with_legacy_age_bands());
    let id = lc.create(&mut legacy, baby());
    for label in [ids::BABY, ids::UNDER_2, ids::UNDER_18, ids::MINOR] {
      assert!(has(&legacy, id, label), "missing {label}");
    }

    let mut current = registry();
    let id = lc.create(&mut current, baby());
    assert!(has(&current, id, ids::BABY));
    assert!(!has(&current, id, ids::UNDER_2));
  }
}
