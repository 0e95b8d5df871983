//! Automatic label derivation.
//!
//! [`derive_automatic_labels`] maps a resident's attributes to the set of
//! automatic label ids that apply at a reference instant. It reads nothing
//! but its arguments, so the same resident at the same instant always yields
//! the same set. The relational "pet owner" label depends on other residents
//! and lives in [`crate::family`] instead.

use std::collections::BTreeSet;

use chrono::{DateTime, Days, Months, NaiveDate, Utc};

use crate::{
  label::{LabelId, ids},
  resident::{AnimalDetails, HumanDetails, Resident, ResidentKind},
};

/// Days ahead of a scheduled vaccination at which it is flagged as needed.
pub const VACCINATION_WARNING_DAYS: u64 = 7;

pub fn derive_automatic_labels(
  resident: &Resident,
  reference: DateTime<Utc>,
) -> BTreeSet<LabelId> {
  let today = reference.date_naive();
  let mut labels = BTreeSet::new();

  match &resident.kind {
    ResidentKind::Cat(animal) => {
      labels.insert(ids::CAT.to_owned());
      animal_labels(animal, today, &mut labels);
    }
    ResidentKind::Dog(animal) => {
      labels.insert(ids::DOG.to_owned());
      animal_labels(animal, today, &mut labels);
    }
    ResidentKind::Human(human) => {
      if let Some(age) = resident.age_on(today) {
        age_labels(age, &mut labels);
      }
      bsn_labels(human, &mut labels);
    }
  }

  if is_new_arrival(resident.registration_date, today) {
    labels.insert(ids::NEW_ARRIVAL.to_owned());
  }

  labels
}

fn animal_labels(
  animal: &AnimalDetails,
  today: NaiveDate,
  labels: &mut BTreeSet<LabelId>,
) {
  if animal.is_vaccinated {
    labels.insert(ids::VACCINATED.to_owned());
  } else if let Some(next) = animal.next_vaccination_date {
    // Overdue dates are covered too: they precede the warning horizon.
    let horizon = today
      .checked_add_days(Days::new(VACCINATION_WARNING_DAYS))
      .unwrap_or(NaiveDate::MAX);
    if next <= horizon {
      labels.insert(ids::VACCINATION_NEEDED.to_owned());
    }
  }
  if animal.is_chipped {
    labels.insert(ids::CHIPPED.to_owned());
  }
  if animal.is_sterilized {
    labels.insert(ids::STERILIZED.to_owned());
  }
}

/// Each band is checked on its own; an age of exactly one is both a baby and
/// a toddler.
fn age_labels(age: u32, labels: &mut BTreeSet<LabelId>) {
  if age <= 1 {
    labels.insert(ids::BABY.to_owned());
  }
  if (1..=4).contains(&age) {
    labels.insert(ids::TODDLER.to_owned());
  }
  if age < 18 {
    labels.insert(ids::MINOR.to_owned());
  }
  if age >= 65 {
    labels.insert(ids::SENIOR.to_owned());
  }

  // Legacy bands.
  if age < 2 {
    labels.insert(ids::UNDER_2.to_owned());
  }
  if age < 18 {
    labels.insert(ids::UNDER_18.to_owned());
  }
  if age >= 65 {
    labels.insert(ids::SIXTY_FIVE_PLUS.to_owned());
  }
}

fn bsn_labels(human: &HumanDetails, labels: &mut BTreeSet<LabelId>) {
  if human.normalized_bsn().is_none() {
    labels.insert(ids::MISSING_BSN.to_owned());
  }
}

/// Whether `today` falls within one calendar month after registration.
fn is_new_arrival(registered: DateTime<Utc>, today: NaiveDate) -> bool {
  let start = registered.date_naive();
  let end = start
    .checked_add_months(Months::new(1))
    .unwrap_or(NaiveDate::MAX);
  start <= today && today < end
}
