//! Family graph maintenance.
//!
//! Keeps `family.members` symmetric across the population, spreads a shared
//! family id over each connected group, and recomputes the relational
//! "pet owner" label for every human.
//!
//! Roles are relative: a parent links a child with role `child`, and the
//! parent's own role only changes if an [`InverseRoles`] table is supplied.

use std::collections::{BTreeMap, BTreeSet, HashMap, VecDeque};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::{
  label::{LabelChange, ids},
  population::Population,
  resident::{FamilyId, FamilyRole, ResidentId},
};

// ─── Inverse roles ───────────────────────────────────────────────────────────

/// Maps a role to the role its counterpart takes. Roles without an entry map
/// to [`FamilyRole::Other`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InverseRoles(HashMap<FamilyRole, FamilyRole>);

impl InverseRoles {
  pub fn new(pairs: impl IntoIterator<Item = (FamilyRole, FamilyRole)>) -> Self {
    Self(pairs.into_iter().collect())
  }

  /// parent↔child, spouse↔spouse, partner↔partner, sibling↔sibling, and the
  /// guardian/stepparent/pet relations.
  pub fn standard() -> Self {
    use FamilyRole::*;
    Self::new([
      (Parent, Child),
      (Child, Parent),
      (Spouse, Spouse),
      (Partner, Partner),
      (Sibling, Sibling),
      (Guardian, Child),
      (Stepparent, Child),
      (Pet, Other),
    ])
  }

  pub fn inverse_of(&self, role: FamilyRole) -> FamilyRole {
    self.0.get(&role).copied().unwrap_or(FamilyRole::Other)
  }
}

// ─── Link ────────────────────────────────────────────────────────────────────

/// Put `resident_id` into family `family_id` with `role`, linked to each of
/// `related_ids` in both directions.
///
/// The family id is stamped onto the related residents and then spread over
/// the whole connected group, so merging two families leaves one id. Related
/// residents without a role get the inverse of `role` when `inverse_roles`
/// is given. Unknown ids are skipped. Returns `false` when `resident_id`
/// itself is unknown, in which case nothing changes.
pub fn link_family(
  residents: &mut Population,
  resident_id: ResidentId,
  related_ids: &[ResidentId],
  family_id: FamilyId,
  role: Option<FamilyRole>,
  inverse_roles: Option<&InverseRoles>,
) -> bool {
  let Some(resident) = residents.get_mut(resident_id) else {
    debug!(%resident_id, "link_family: unknown resident");
    return false;
  };
  resident.family.family_id = Some(family_id);
  if role.is_some() {
    resident.family.role = role;
  }

  let inverse = match (role, inverse_roles) {
    (Some(role), Some(table)) => Some(table.inverse_of(role)),
    _ => None,
  };

  let mut linked = Vec::with_capacity(related_ids.len());
  for &related_id in related_ids {
    if related_id == resident_id {
      continue;
    }
    let Some(related) = residents.get_mut(related_id) else {
      debug!(%resident_id, %related_id, "link_family: skipping unknown relative");
      continue;
    };
    related.family.members.insert(resident_id);
    related.family.family_id = Some(family_id);
    if related.family.role.is_none() {
      related.family.role = inverse;
    }
    linked.push(related_id);
  }

  if let Some(resident) = residents.get_mut(resident_id) {
    resident.family.members.extend(linked);
  }

  spread_family_id(residents, resident_id, family_id);
  true
}

/// Assign `family_id` to everyone reachable from `start` through
/// `family.members`.
fn spread_family_id(
  residents: &mut Population,
  start: ResidentId,
  family_id: FamilyId,
) {
  for id in component_of(residents, start) {
    if let Some(resident) = residents.get_mut(id) {
      resident.family.family_id = Some(family_id);
    }
  }
}

/// Everyone reachable from `start` through `family.members`, `start`
/// included.
fn component_of(residents: &Population, start: ResidentId) -> BTreeSet<ResidentId> {
  let mut seen = BTreeSet::from([start]);
  let mut queue = VecDeque::from([start]);
  while let Some(id) = queue.pop_front() {
    let Some(resident) = residents.get(id) else {
      continue;
    };
    for &member in &resident.family.members {
      if seen.insert(member) {
        queue.push_back(member);
      }
    }
  }
  seen
}

// ─── Unlink ──────────────────────────────────────────────────────────────────

/// A consistency problem left behind by a family operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FamilyWarning {
  /// `resident_id` has no family members left but still carries
  /// `family_id`.
  DissolvedFamily {
    resident_id: ResidentId,
    family_id:   FamilyId,
  },
  /// The group that shared `family_id` fell apart into `components`, which
  /// still all carry it.
  SplitFamily {
    family_id:  FamilyId,
    components: Vec<BTreeSet<ResidentId>>,
  },
}

impl FamilyWarning {
  pub(crate) fn log(&self) {
    match self {
      Self::DissolvedFamily { resident_id, family_id } => warn!(
        %resident_id,
        %family_id,
        "family reduced to a single member; family id left in place"
      ),
      Self::SplitFamily { family_id, components } => warn!(
        %family_id,
        components = components.len(),
        "family split into disconnected groups sharing one id"
      ),
    }
  }
}

/// What [`unlink_family`] did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnlinkReport {
  pub resident_id:      ResidentId,
  pub former_family_id: Option<FamilyId>,
  pub former_members:   BTreeSet<ResidentId>,
  pub warnings:         Vec<FamilyWarning>,
}

/// Remove `resident_id` from its family: clear its own family fields and
/// drop it from every other resident's member set.
///
/// The remaining members keep their family id. Each survivor left without
/// members is reported as [`FamilyWarning::DissolvedFamily`], and a group
/// that fell apart into several parts as [`FamilyWarning::SplitFamily`].
/// Use [`reconcile_dissolved_families`] to clear dissolved survivors.
/// Returns `None` for an unknown id.
pub fn unlink_family(
  residents: &mut Population,
  resident_id: ResidentId,
) -> Option<UnlinkReport> {
  let report = detach(residents, resident_id)?;
  for warning in &report.warnings {
    warning.log();
  }
  Some(report)
}

/// [`unlink_family`] without logging its warnings.
pub(crate) fn detach(
  residents: &mut Population,
  resident_id: ResidentId,
) -> Option<UnlinkReport> {
  let resident = residents.get_mut(resident_id)?;
  let former_family_id = resident.family.family_id.take();
  let former_members = std::mem::take(&mut resident.family.members);
  resident.family.role = None;

  for other in residents.iter_mut() {
    other.family.members.remove(&resident_id);
  }

  let warnings = family_warnings(residents, &former_members);
  Some(UnlinkReport {
    resident_id,
    former_family_id,
    former_members,
    warnings,
  })
}

/// Inconsistencies among the groups `members` belong to: members left
/// alone with a family id, and family ids now carried by more than one
/// disconnected group.
pub fn family_warnings(
  residents: &Population,
  members: &BTreeSet<ResidentId>,
) -> Vec<FamilyWarning> {
  let mut warnings = Vec::new();
  let mut seen = BTreeSet::new();
  let mut groups: BTreeMap<FamilyId, Vec<BTreeSet<ResidentId>>> = BTreeMap::new();

  for &id in members {
    let Some(resident) = residents.get(id) else {
      continue;
    };
    let Some(family_id) = resident.family.family_id else {
      continue;
    };
    if resident.family.members.is_empty() {
      warnings.push(FamilyWarning::DissolvedFamily {
        resident_id: id,
        family_id,
      });
    }
    if seen.contains(&id) {
      continue;
    }
    let component = component_of(residents, id);
    seen.extend(component.iter().copied());
    groups.entry(family_id).or_default().push(component);
  }

  for (family_id, mut components) in groups {
    if components.len() > 1 {
      components.sort();
      warnings.push(FamilyWarning::SplitFamily {
        family_id,
        components,
      });
    }
  }
  warnings
}

/// Clear the family id and role of every resident that has one but no
/// members left. Returns the residents that changed.
pub fn reconcile_dissolved_families(residents: &mut Population) -> Vec<ResidentId> {
  let mut cleared = Vec::new();
  for resident in residents.iter_mut() {
    if resident.family.family_id.is_some() && resident.family.members.is_empty() {
      resident.family.family_id = None;
      resident.family.role = None;
      cleared.push(resident.id);
    }
  }
  cleared
}

// ─── Pet owner ───────────────────────────────────────────────────────────────

/// Recompute the "pet owner" label across the population.
///
/// A human owns a pet when some non-archived animal shares their family id
/// and lists them as a member. Only adults (18 or older at `reference`) get
/// the label; everyone else, animals included, loses it. Returns the
/// changes made.
pub fn recompute_pet_owner_labels(
  residents: &mut Population,
  reference: DateTime<Utc>,
) -> Vec<LabelChange> {
  let today = reference.date_naive();

  let active_pets: Vec<(FamilyId, &BTreeSet<ResidentId>)> = residents
    .iter()
    .filter(|r| r.is_animal() && !r.is_archived())
    .filter_map(|r| Some((r.family.family_id?, &r.family.members)))
    .collect();

  let verdicts: Vec<(ResidentId, bool)> = residents
    .iter()
    .map(|resident| {
      let has_active_pet = resident.family.family_id.is_some_and(|family_id| {
        active_pets.iter().any(|(pet_family, members)| {
          *pet_family == family_id && members.contains(&resident.id)
        })
      });
      let owns_pet =
        resident.is_human() && has_active_pet && resident.is_adult_on(today);
      (resident.id, owns_pet)
    })
    .collect();

  let mut changes = Vec::new();
  for (id, owns_pet) in verdicts {
    let Some(resident) = residents.get_mut(id) else {
      continue;
    };
    let changed = if owns_pet {
      resident.labels.insert(ids::PET_OWNER.to_owned())
    } else {
      resident.labels.remove(ids::PET_OWNER)
    };
    if changed {
      changes.push(LabelChange {
        resident_id: id,
        label_id:    ids::PET_OWNER.to_owned(),
        added:       owns_pet,
      });
    }
  }
  changes
}
