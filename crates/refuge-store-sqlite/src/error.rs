//! Error type for `refuge-store-sqlite`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("core error: {0}")]
  Core(#[from] refuge_core::Error),

  #[error("database error: {0}")]
  Database(#[from] tokio_rusqlite::Error),

  #[error("json error: {0}")]
  Json(#[from] serde_json::Error),

  #[error("uuid parse error: {0}")]
  Uuid(#[from] uuid::Error),

  /// A row whose indexed columns disagree with its JSON payload.
  #[error("corrupt row for {id}: {detail}")]
  Corrupt { id: String, detail: String },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
