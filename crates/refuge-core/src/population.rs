//! [`Population`]: the resident collection every engine operation reads and
//! writes.
//!
//! Records live in an arena in insertion order; an id index gives O(1)
//! lookup. Residents are never removed here: archival is a state, not a
//! deletion.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::resident::{Resident, ResidentId};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<Resident>", into = "Vec<Resident>")]
pub struct Population {
  records: Vec<Resident>,
  index:   HashMap<ResidentId, usize>,
}

impl Population {
  pub fn new() -> Self { Self::default() }

  /// Insert a resident, replacing any existing record with the same id in
  /// place.
  pub fn insert(&mut self, resident: Resident) {
    match self.index.get(&resident.id) {
      Some(&slot) => self.records[slot] = resident,
      None => {
        self.index.insert(resident.id, self.records.len());
        self.records.push(resident);
      }
    }
  }

  pub fn get(&self, id: ResidentId) -> Option<&Resident> {
    self.index.get(&id).map(|&slot| &self.records[slot])
  }

  pub fn get_mut(&mut self, id: ResidentId) -> Option<&mut Resident> {
    self.index.get(&id).map(|&slot| &mut self.records[slot])
  }

  pub fn contains(&self, id: ResidentId) -> bool { self.index.contains_key(&id) }

  pub fn iter(&self) -> impl Iterator<Item = &Resident> { self.records.iter() }

  pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Resident> {
    self.records.iter_mut()
  }

  pub fn ids(&self) -> Vec<ResidentId> { self.records.iter().map(|r| r.id).collect() }

  pub fn len(&self) -> usize { self.records.len() }

  pub fn is_empty(&self) -> bool { self.records.is_empty() }

  /// Residents whose record differs from (or is absent in) `before`.
  ///
  /// Used by callers that persist only what an operation touched.
  pub fn changed_since<'a>(&'a self, before: &Population) -> Vec<&'a Resident> {
    self
      .records
      .iter()
      .filter(|r| before.get(r.id) != Some(*r))
      .collect()
  }
}

impl FromIterator<Resident> for Population {
  fn from_iter<I: IntoIterator<Item = Resident>>(iter: I) -> Self {
    let mut population = Self::new();
    for resident in iter {
      population.insert(resident);
    }
    population
  }
}

impl From<Vec<Resident>> for Population {
  fn from(records: Vec<Resident>) -> Self { records.into_iter().collect() }
}

impl From<Population> for Vec<Resident> {
  fn from(population: Population) -> Self { population.records }
}
