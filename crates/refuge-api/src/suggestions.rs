//! Handler for `POST /suggestions`.
//!
//! Body: a [`Candidate`]. Optional `?on=YYYY-MM-DD` fixes the reference date
//! used for ages and the arrival default; it defaults to today (UTC).

use axum::{
  Json,
  extract::{Query, State},
};
use chrono::{NaiveDate, Utc};
use refuge_core::{
  store::ResidentStore,
  suggest::{Candidate, Suggestion, suggest_relationships},
};
use serde::Deserialize;

use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct SuggestParams {
  pub on: Option<NaiveDate>,
}

/// `POST /suggestions[?on=<date>]`
pub async fn handler<S>(
  State(state): State<AppState<S>>,
  Query(params): Query<SuggestParams>,
  Json(candidate): Json<Candidate>,
) -> Json<Vec<Suggestion>>
where
  S: ResidentStore,
  S::Error: std::error::Error + Send + Sync + 'static,
{
  let reference = params.on.unwrap_or_else(|| Utc::now().date_naive());
  let registry = state.registry.lock().await;
  let suggestions = suggest_relationships(&candidate, &registry.residents, reference);
  tracing::debug!(count = suggestions.len(), "relationship suggestions computed");
  Json(suggestions)
}
