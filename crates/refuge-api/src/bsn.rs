//! Handler for `POST /bsn/validate`.
//!
//! Body: `{"bsn":"123 456 782","resident_id":"…"}`. `resident_id` names the
//! resident being edited so their own number is not reported as a duplicate.

use axum::{Json, extract::State};
use refuge_core::{
  bsn::{format_bsn, validate_bsn},
  resident::ResidentId,
  store::ResidentStore,
};
use serde::{Deserialize, Serialize};

use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct ValidateBody {
  pub bsn:         String,
  #[serde(default)]
  pub resident_id: Option<ResidentId>,
}

#[derive(Debug, Serialize)]
pub struct ValidateResponse {
  pub valid:     bool,
  pub message:   String,
  /// Grouped for display, e.g. `123 456 782`.
  pub formatted: String,
}

/// `POST /bsn/validate`
pub async fn validate<S>(
  State(state): State<AppState<S>>,
  Json(body): Json<ValidateBody>,
) -> Json<ValidateResponse>
where
  S: ResidentStore,
  S::Error: std::error::Error + Send + Sync + 'static,
{
  let registry = state.registry.lock().await;
  let validation = validate_bsn(&body.bsn, &registry.residents, body.resident_id);
  Json(ValidateResponse {
    valid:     validation.valid,
    message:   validation.message,
    formatted: format_bsn(&body.bsn),
  })
}
