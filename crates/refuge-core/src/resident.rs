//! Resident records: people and their pets.
//!
//! A resident carries a common envelope (identity, room, labels, archive
//! state, family link) plus a variant-specific payload selected by
//! [`ResidentKind`].

use std::{collections::BTreeSet, fmt, str::FromStr};

use chrono::{DateTime, Datelike, NaiveDate, Utc};
use serde::{Deserialize, Serialize, Serializer, ser::SerializeStruct as _};
use uuid::Uuid;

use crate::{
  Error, Result,
  label::{LabelHistoryEntry, LabelId},
};

pub type ResidentId = Uuid;
pub type FamilyId = Uuid;

// ─── Variant ─────────────────────────────────────────────────────────────────

/// The discriminant of [`ResidentKind`].
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Hash,
  Serialize,
  Deserialize,
  strum::AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Variant {
  Human,
  Cat,
  Dog,
}

impl Variant {
  pub fn is_animal(self) -> bool { !matches!(self, Self::Human) }
}

impl fmt::Display for Variant {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_ref())
  }
}

impl FromStr for Variant {
  type Err = Error;

  fn from_str(s: &str) -> Result<Self> {
    match s.trim().to_ascii_lowercase().as_str() {
      "human" => Ok(Self::Human),
      "cat" => Ok(Self::Cat),
      "dog" => Ok(Self::Dog),
      _ => Err(Error::UnknownVariant(s.to_owned())),
    }
  }
}

// ─── Variant payloads ────────────────────────────────────────────────────────

/// Identity documents a human resident has handed in.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Documents {
  pub has_passport:         bool,
  pub has_residence_permit: bool,
  pub has_registration:     bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HumanDetails {
  pub nationality: String,
  /// National identification number; see [`crate::bsn`].
  pub bsn:         Option<String>,
  pub phone:       String,
  pub email:       String,
  pub documents:   Documents,
}

impl HumanDetails {
  /// The BSN with whitespace removed, or `None` when absent or blank.
  pub fn normalized_bsn(&self) -> Option<String> {
    let bsn = crate::bsn::normalize(self.bsn.as_deref()?);
    (!bsn.is_empty()).then_some(bsn)
  }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnimalDetails {
  pub breed:                 String,
  pub is_vaccinated:         bool,
  pub vaccination_date:      Option<NaiveDate>,
  pub next_vaccination_date: Option<NaiveDate>,
  pub is_chipped:            bool,
  pub chip_number:           Option<String>,
  pub is_sterilized:         bool,
  pub sterilization_date:    Option<NaiveDate>,
}

/// The variant-specific part of a resident.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "variant", rename_all = "lowercase")]
pub enum ResidentKind {
  Human(HumanDetails),
  Cat(AnimalDetails),
  Dog(AnimalDetails),
}

impl ResidentKind {
  pub fn variant(&self) -> Variant {
    match self {
      Self::Human(_) => Variant::Human,
      Self::Cat(_) => Variant::Cat,
      Self::Dog(_) => Variant::Dog,
    }
  }

  pub fn human(&self) -> Option<&HumanDetails> {
    match self {
      Self::Human(h) => Some(h),
      _ => None,
    }
  }

  pub fn animal(&self) -> Option<&AnimalDetails> {
    match self {
      Self::Cat(a) | Self::Dog(a) => Some(a),
      Self::Human(_) => None,
    }
  }
}

// ─── Archive state ───────────────────────────────────────────────────────────

/// Why a resident left the active population.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ArchiveReason {
  Departed,
  Relocated,
  PermanentHousing,
  Transferred,
  Adopted,
  Deceased,
  Other,
}

impl ArchiveReason {
  /// Human-readable text embedded in history entries.
  pub fn description(self) -> &'static str {
    match self {
      Self::Departed => "Left the shelter",
      Self::Relocated => "Moved to another location",
      Self::PermanentHousing => "Found permanent housing",
      Self::Transferred => "Transferred to another facility",
      Self::Adopted => "Adopted",
      Self::Deceased => "Deceased",
      Self::Other => "Other",
    }
  }
}

/// Present only while a resident is archived.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Archival {
  pub reason:      ArchiveReason,
  pub date:        DateTime<Utc>,
  pub custom_text: Option<String>,
}

// ─── Family ──────────────────────────────────────────────────────────────────

/// A resident's role within their family group, relative to the person who
/// linked them.
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Hash,
  PartialOrd,
  Ord,
  Serialize,
  Deserialize,
  strum::AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum FamilyRole {
  Parent,
  Child,
  Spouse,
  Partner,
  Sibling,
  Guardian,
  Stepparent,
  Pet,
  Other,
}

impl FamilyRole {
  pub fn label(self) -> &'static str {
    match self {
      Self::Parent => "Parent",
      Self::Child => "Child",
      Self::Spouse => "Spouse",
      Self::Partner => "Partner",
      Self::Sibling => "Sibling",
      Self::Guardian => "Guardian",
      Self::Stepparent => "Stepparent",
      Self::Pet => "Pet",
      Self::Other => "Other",
    }
  }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FamilyLink {
  pub family_id: Option<FamilyId>,
  pub role:      Option<FamilyRole>,
  /// Residents this record recognises as family. Kept symmetric by
  /// [`crate::family`].
  pub members:   BTreeSet<ResidentId>,
}

/// How a resident currently relates to a family group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum FamilyState {
  Unaffiliated,
  Member { family_id: FamilyId },
  /// Still carries a family id although every other member is gone.
  Dissolved { family_id: FamilyId },
}

// ─── Resident ────────────────────────────────────────────────────────────────

/// Serialises with an extra read-only `is_archived` flag derived from
/// `archive`; the flag is ignored on input.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Resident {
  pub id:                ResidentId,
  pub first_name:        String,
  /// Empty for animals.
  pub last_name:         String,
  pub birth_date:        Option<NaiveDate>,
  pub gender:            String,
  pub room_number:       String,
  /// Set once at creation; never changes.
  pub registration_date: DateTime<Utc>,
  pub labels:            BTreeSet<LabelId>,
  pub label_history:     Vec<LabelHistoryEntry>,
  pub archive:           Option<Archival>,
  pub family:            FamilyLink,
  pub kind:              ResidentKind,
}

impl Resident {
  pub fn variant(&self) -> Variant { self.kind.variant() }

  pub fn is_human(&self) -> bool { self.variant() == Variant::Human }

  pub fn is_animal(&self) -> bool { self.variant().is_animal() }

  pub fn is_archived(&self) -> bool { self.archive.is_some() }

  /// Age in whole years on `on`, or `None` without a usable birth date.
  pub fn age_on(&self, on: NaiveDate) -> Option<u32> {
    age_in_years(self.birth_date?, on)
  }

  pub fn is_adult_on(&self, on: NaiveDate) -> bool {
    self.age_on(on).is_some_and(|age| age >= 18)
  }

  pub fn display_name(&self) -> String {
    let first = self.first_name.trim();
    let last = self.last_name.trim();
    match (first.is_empty(), last.is_empty()) {
      (false, false) => format!("{first} {last}"),
      (false, true) => first.to_owned(),
      (true, false) => last.to_owned(),
      (true, true) => self.id.to_string(),
    }
  }

  pub fn family_state(&self) -> FamilyState {
    match self.family.family_id {
      None => FamilyState::Unaffiliated,
      Some(family_id) if self.family.members.is_empty() => {
        FamilyState::Dissolved { family_id }
      }
      Some(family_id) => FamilyState::Member { family_id },
    }
  }
}

impl Serialize for Resident {
  fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
    let mut out = serializer.serialize_struct("Resident", 13)?;
    out.serialize_field("id", &self.id)?;
    out.serialize_field("first_name", &self.first_name)?;
    out.serialize_field("last_name", &self.last_name)?;
    out.serialize_field("birth_date", &self.birth_date)?;
    out.serialize_field("gender", &self.gender)?;
    out.serialize_field("room_number", &self.room_number)?;
    out.serialize_field("registration_date", &self.registration_date)?;
    out.serialize_field("labels", &self.labels)?;
    out.serialize_field("label_history", &self.label_history)?;
    out.serialize_field("is_archived", &self.is_archived())?;
    out.serialize_field("archive", &self.archive)?;
    out.serialize_field("family", &self.family)?;
    out.serialize_field("kind", &self.kind)?;
    out.end()
  }
}

/// Calendar-aware age: whole years between `birth` and `on`, minus one when
/// the birthday has not yet come round in `on`'s year. `None` when `birth`
/// lies after `on`.
pub fn age_in_years(birth: NaiveDate, on: NaiveDate) -> Option<u32> {
  if birth > on {
    return None;
  }
  let mut years = on.year() - birth.year();
  if (on.month(), on.day()) < (birth.month(), birth.day()) {
    years -= 1;
  }
  u32::try_from(years).ok()
}

#[cfg(test)]
mod tests {
  use super::*;

  fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
  }

  #[test]
  fn age_counts_completed_years() {
    assert_eq!(age_in_years(date(2000, 6, 15), date(2024, 6, 14)), Some(23));
    assert_eq!(age_in_years(date(2000, 6, 15), date(2024, 6, 15)), Some(24));
    assert_eq!(age_in_years(date(2000, 6, 15), date(2024, 12, 1)), Some(24));
  }

  #[test]
  fn age_of_future_birth_is_none() {
    assert_eq!(age_in_years(date(2030, 1, 1), date(2024, 1, 1)), None);
  }

  #[test]
  fn leap_day_birthday_is_reached_on_march_first() {
    assert_eq!(age_in_years(date(2004, 2, 29), date(2023, 2, 28)), Some(18));
    assert_eq!(age_in_years(date(2004, 2, 29), date(2023, 3, 1)), Some(19));
  }

  #[test]
  fn variant_parses_case_insensitively() {
    assert_eq!("Cat".parse::<Variant>().unwrap(), Variant::Cat);
    assert_eq!(" human ".parse::<Variant>().unwrap(), Variant::Human);
    assert!("parrot".parse::<Variant>().is_err());
  }

  #[test]
  fn kind_serializes_with_variant_tag() {
    let kind = ResidentKind::Dog(AnimalDetails {
      breed: "Beagle".into(),
      ..Default::default()
    });
    let json = serde_json::to_value(&kind).unwrap();
    assert_eq!(json["variant"], "dog");
    assert_eq!(json["breed"], "Beagle");

    let back: ResidentKind = serde_json::from_value(json).unwrap();
    assert_eq!(back.variant(), Variant::Dog);
  }

  #[test]
  fn wire_form_exposes_archive_flag() {
    let mut resident = Resident {
      id:                Uuid::new_v4(),
      first_name:        "Minoes".into(),
      last_name:         String::new(),
      birth_date:        None,
      gender:            String::new(),
      room_number:       "3".into(),
      registration_date: Utc::now(),
      labels:            BTreeSet::new(),
      label_history:     vec![],
      archive:           None,
      family:            FamilyLink::default(),
      kind:              ResidentKind::Cat(AnimalDetails::default()),
    };
    assert_eq!(serde_json::to_value(&resident).unwrap()["is_archived"], false);

    resident.archive = Some(Archival {
      reason:      ArchiveReason::Adopted,
      date:        Utc::now(),
      custom_text: None,
    });
    let json = serde_json::to_value(&resident).unwrap();
    assert_eq!(json["is_archived"], true);
    assert_eq!(json["archive"]["reason"], "adopted");

    let back: Resident = serde_json::from_value(json).unwrap();
    assert_eq!(back, resident);
  }
}
