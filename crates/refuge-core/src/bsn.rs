//! BSN (Dutch citizen service number) validation and display formatting.
//!
//! A BSN is nine digits that must pass the 11-proof: the first eight digits
//! weighted 9 down to 2, minus the ninth digit, must be divisible by 11.

use serde::{Deserialize, Serialize};

use crate::{population::Population, resident::ResidentId};

pub const LENGTH_MESSAGE: &str = "BSN must consist of exactly 9 digits";
pub const CHECKSUM_MESSAGE: &str = "BSN is not valid (11-proof check failed)";

/// Outcome of [`validate_bsn`]. Validation failures are values, not errors.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BsnValidation {
  pub valid:   bool,
  /// Empty when valid.
  pub message: String,
}

impl BsnValidation {
  fn ok() -> Self {
    Self {
      valid:   true,
      message: String::new(),
    }
  }

  fn invalid(message: impl Into<String>) -> Self {
    Self {
      valid:   false,
      message: message.into(),
    }
  }
}

/// Remove all whitespace.
pub fn normalize(input: &str) -> String {
  input.chars().filter(|c| !c.is_whitespace()).collect()
}

/// Whether nine digits pass the 11-proof. Anything else returns `false`.
pub fn passes_eleven_proof(bsn: &str) -> bool {
  let digits: Vec<i64> = bsn
    .chars()
    .map_while(|c| c.to_digit(10).map(i64::from))
    .collect();
  if digits.len() != 9 || bsn.len() != 9 {
    return false;
  }
  let weighted: i64 = digits[..8]
    .iter()
    .zip((2..=9).rev())
    .map(|(d, w)| d * w)
    .sum();
  (weighted - digits[8]) % 11 == 0
}

/// Validate `input` as an optional BSN for `current_id` (`None` when the
/// resident does not exist yet).
///
/// The number is also rejected when a *different* resident already holds it.
pub fn validate_bsn(
  input: &str,
  residents: &Population,
  current_id: Option<ResidentId>,
) -> BsnValidation {
  let bsn = normalize(input);
  if bsn.is_empty() {
    return BsnValidation::ok();
  }
  if bsn.len() != 9 || !bsn.chars().all(|c| c.is_ascii_digit()) {
    return BsnValidation::invalid(LENGTH_MESSAGE);
  }
  if !passes_eleven_proof(&bsn) {
    return BsnValidation::invalid(CHECKSUM_MESSAGE);
  }

  let holder = residents.iter().find(|r| {
    Some(r.id) != current_id
      && r.kind.human().and_then(|h| h.normalized_bsn()).as_deref()
        == Some(bsn.as_str())
  });
  match holder {
    Some(other) => BsnValidation::invalid(format!(
      "BSN is already registered to {}",
      other.display_name()
    )),
    None => BsnValidation::ok(),
  }
}

/// Group nine digits as `123 456 782` for display. Input that is not nine
/// characters after removing whitespace is returned trimmed, unchanged.
pub fn format_bsn(input: &str) -> String {
  let bsn = normalize(input);
  if bsn.chars().count() != 9 {
    return input.trim().to_owned();
  }
  let chars: Vec<char> = bsn.chars().collect();
  chars
    .chunks(3)
    .map(|chunk| chunk.iter().collect::<String>())
    .collect::<Vec<_>>()
    .join(" ")
}
