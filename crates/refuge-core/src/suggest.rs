//! Relationship suggestions for a resident that is about to be registered.
//!
//! Scoring is heuristic and advisory: nothing here mutates the population.
//! A caller that accepts a suggestion turns it into an explicit
//! [`crate::lifecycle::Lifecycle::add_to_family`] call.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::{
  population::Population,
  resident::{FamilyId, FamilyRole, Resident, ResidentId, age_in_years},
};

/// At most this many suggestions are returned.
pub const MAX_SUGGESTIONS: usize = 5;

/// Suggestions must score strictly above this.
pub const MIN_CONFIDENCE: f64 = 0.3;

/// The identifying fields known so far about a resident being registered.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Candidate {
  pub first_name:   String,
  pub last_name:    String,
  pub birth_date:   Option<NaiveDate>,
  pub room_number:  String,
  pub nationality:  String,
  /// Defaults to the reference date.
  pub arrival_date: Option<NaiveDate>,
  /// Set when the candidate is already known to belong to a family.
  pub family_id:    Option<FamilyId>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SuggestedRelationship {
  /// What the existing resident would be to the candidate.
  pub kind:  FamilyRole,
  pub label: String,
}

impl From<FamilyRole> for SuggestedRelationship {
  fn from(kind: FamilyRole) -> Self {
    Self {
      kind,
      label: kind.label().to_owned(),
    }
  }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Suggestion {
  pub resident_id:        ResidentId,
  pub resident_name:      String,
  pub relationships:      Vec<SuggestedRelationship>,
  /// In `[0, 1]`.
  pub confidence:         f64,
  pub existing_family_id: Option<FamilyId>,
  /// Nationalities differ but both arrived together.
  pub mixed_nationality:  bool,
}

/// Rank existing residents by how likely they are family of `candidate`.
///
/// Returns nothing unless the candidate has a first name, last name and
/// birth date. Only active humans with a known birth date are considered.
pub fn suggest_relationships(
  candidate: &Candidate,
  residents: &Population,
  reference: NaiveDate,
) -> Vec<Suggestion> {
  let Some(birth) = candidate.birth_date else {
    return Vec::new();
  };
  if candidate.first_name.trim().is_empty() || candidate.last_name.trim().is_empty() {
    return Vec::new();
  }
  let Some(candidate_age) = age_in_years(birth, reference) else {
    return Vec::new();
  };
  let arrival = candidate.arrival_date.unwrap_or(reference);

  let mut suggestions: Vec<Suggestion> = residents
    .iter()
    .filter(|r| r.is_human() && !r.is_archived())
    .filter_map(|existing| {
      let age = existing.age_on(reference)?;
      let pair = Pair::new(candidate, candidate_age, arrival, existing, age);
      pair.passes_prefilter().then(|| pair.score())
    })
    .filter(|s| !s.relationships.is_empty() && s.confidence > MIN_CONFIDENCE)
    .collect();

  suggestions.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));
  suggestions.truncate(MAX_SUGGESTIONS);
  suggestions
}

/// The facts about one candidate/resident pairing that the rules consult.
struct Pair<'a> {
  existing:          &'a Resident,
  existing_is_older: bool,
  age_diff:          u32,
  both_adults:       bool,
  candidate_minor:   bool,
  same_arrival:      bool,
  same_room:         bool,
  surname_match:     bool,
  nationality_match: bool,
  mixed_nationality: bool,
  same_family:       bool,
}

impl<'a> Pair<'a> {
  fn new(
    candidate: &Candidate,
    candidate_age: u32,
    arrival: NaiveDate,
    existing: &'a Resident,
    existing_age: u32,
  ) -> Self {
    let existing_nationality = existing
      .kind
      .human()
      .map(|h| normalize(&h.nationality))
      .unwrap_or_default();
    let candidate_nationality = normalize(&candidate.nationality);
    let same_arrival =
      (existing.registration_date.date_naive() - arrival).num_days().abs() <= 1;

    Self {
      existing,
      existing_is_older: existing_age > candidate_age,
      age_diff: existing_age.abs_diff(candidate_age),
      both_adults: existing_age >= 18 && candidate_age >= 18,
      candidate_minor: candidate_age < 18,
      same_arrival,
      same_room: !candidate.room_number.trim().is_empty()
        && candidate.room_number.trim() == existing.room_number.trim(),
      surname_match: normalize(&candidate.last_name) == normalize(&existing.last_name),
      nationality_match: candidate_nationality == existing_nationality,
      mixed_nationality: same_arrival
        && !candidate_nationality.is_empty()
        && !existing_nationality.is_empty()
        && candidate_nationality != existing_nationality,
      same_family: candidate.family_id.is_some()
        && candidate.family_id == existing.family.family_id,
    }
  }

  fn couple_pattern(&self) -> bool {
    self.same_arrival && self.age_diff <= 15 && self.both_adults
  }

  fn in_family(&self) -> bool { self.existing.family.family_id.is_some() }

  /// Cheap gate that bounds which pairs are scored at all.
  fn passes_prefilter(&self) -> bool {
    let couple = self.couple_pattern();
    (self.surname_match || couple || self.same_room || self.same_family)
      && (self.nationality_match || couple)
  }

  fn score(&self) -> Suggestion {
    let mut relationships: Vec<FamilyRole> = Vec::new();
    let mut confidence = 0.0_f64;

    if self.surname_match && (16..=50).contains(&self.age_diff) {
      relationships.push(if self.existing_is_older {
        FamilyRole::Parent
      } else {
        FamilyRole::Child
      });
      confidence += 0.8;
    }

    if self.surname_match && self.age_diff <= 15 {
      relationships.push(FamilyRole::Sibling);
      confidence += 0.6;
    }

    if self.both_adults && self.age_diff <= 15 {
      let couple = match (self.same_arrival, self.same_room) {
        (true, true) => Some((FamilyRole::Spouse, 0.9)),
        (true, false) => Some((FamilyRole::Partner, 0.8)),
        (false, true) => Some((FamilyRole::Partner, 0.7)),
        (false, false) if self.surname_match => Some((FamilyRole::Spouse, 0.7)),
        (false, false) => None,
      };
      if let Some((role, weight)) = couple {
        relationships.push(role);
        confidence += weight;
      }
    }

    if self.candidate_minor && self.age_diff >= 10 {
      relationships.push(FamilyRole::Guardian);
      confidence += 0.5;
    }

    if self.in_family()
      && self.candidate_minor
      && self.age_diff >= 16
      && !self.surname_match
    {
      relationships.push(FamilyRole::Stepparent);
      confidence += 0.6;
    }

    // Context bonuses apply whatever the relationship.
    if self.same_arrival {
      confidence += 0.3;
    }
    if self.same_room {
      confidence += 0.2;
    }
    if self.in_family() {
      confidence += 0.2;
    }
    if self.mixed_nationality {
      confidence += 0.1;
    }

    Suggestion {
      resident_id:        self.existing.id,
      resident_name:      self.existing.display_name(),
      relationships:      relationships.into_iter().map(Into::into).collect(),
      confidence:         confidence.min(1.0),
      existing_family_id: self.existing.family.family_id,
      mixed_nationality:  self.mixed_nationality,
    }
  }
}

fn normalize(s: &str) -> String { s.trim().to_lowercase() }
