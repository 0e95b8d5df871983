//! Error types for `refuge-core`.
//!
//! The engine itself never fails: unknown ids are no-ops and validation
//! problems are reported as values. These errors only cover parsing of the
//! enum-like strings that cross the crate boundary.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("unknown resident variant: {0:?}")]
  UnknownVariant(String),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
