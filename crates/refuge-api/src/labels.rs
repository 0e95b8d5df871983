//! Handlers for the label catalog.
//!
//! | Method   | Path | Notes |
//! |----------|------|-------|
//! | `GET`    | `/labels` | The whole catalog |
//! | `POST`   | `/labels` | Body: a label; 201 when new, 200 when replaced |
//! | `DELETE` | `/labels/:id` | Also strips the label from every resident |

use axum::{
  Json,
  extract::{Path, State},
  http::{HeaderMap, StatusCode},
};
use refuge_core::{label::Label, store::ResidentStore};

use crate::{AppState, actor, error::ApiError};

/// `GET /labels`
pub async fn list<S>(State(state): State<AppState<S>>) -> Json<Vec<Label>>
where
  S: ResidentStore,
  S::Error: std::error::Error + Send + Sync + 'static,
{
  let registry = state.registry.lock().await;
  Json(registry.catalog.iter().cloned().collect())
}

/// `POST /labels`
pub async fn upsert<S>(
  State(state): State<AppState<S>>,
  headers: HeaderMap,
  Json(label): Json<Label>,
) -> Result<(StatusCode, Json<Label>), ApiError>
where
  S: ResidentStore,
  S::Error: std::error::Error + Send + Sync + 'static,
{
  if label.id.trim().is_empty() || label.name.trim().is_empty() {
    return Err(ApiError::BadRequest("label id and name are required".into()));
  }
  let saved = label.clone();
  let previous = state
    .mutate(actor(&headers), move |lc, registry| {
      Ok(lc.upsert_label(registry, label))
    })
    .await?;
  let status = if previous.is_some() {
    StatusCode::OK
  } else {
    StatusCode::CREATED
  };
  Ok((status, Json(saved)))
}

/// `DELETE /labels/:id`: returns the removed definition.
pub async fn delete_one<S>(
  State(state): State<AppState<S>>,
  Path(id): Path<String>,
  headers: HeaderMap,
) -> Result<Json<Label>, ApiError>
where
  S: ResidentStore,
  S::Error: std::error::Error + Send + Sync + 'static,
{
  let removed = state
    .mutate(actor(&headers), move |lc, registry| {
      lc.delete_label_from_catalog(registry, &id)
        .ok_or_else(|| ApiError::label_not_found(&id))
    })
    .await?;
  Ok(Json(removed))
}
