//! Handlers for `/residents` endpoints.
//!
//! | Method  | Path | Notes |
//! |---------|------|-------|
//! | `GET`   | `/residents` | Optional `?archived=true\|false&variant=human\|cat\|dog` |
//! | `POST`  | `/residents` | Body: [`NewResident`]; 422 on an invalid BSN |
//! | `POST`  | `/residents/refresh` | Re-derive automatic labels for everyone |
//! | `GET`   | `/residents/:id` | 404 if not found |
//! | `PATCH` | `/residents/:id` | Body: [`ResidentPatch`] |
//! | `POST`  | `/residents/:id/archive` | Body: `{"reason":"adopted","custom_text":"…"}` |
//! | `POST`  | `/residents/:id/restore` | Optional `?reason=` |
//! | `POST`  | `/residents/:id/labels/:label_id/toggle` | Optional `?reason=` |
//!
//! Every mutating endpoint honours the [`crate::ACTOR_HEADER`] header.

use axum::{
  Json,
  extract::{Path, Query, State},
  http::{HeaderMap, StatusCode},
  response::IntoResponse,
};
use refuge_core::{
  bsn::validate_bsn,
  label::LabelChange,
  lifecycle::{NewResident, Registry, ResidentPatch, ToggleOutcome},
  population::Population,
  resident::{ArchiveReason, Resident, ResidentId, ResidentKind, Variant},
  store::{ResidentQuery, ResidentStore},
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{AppState, actor, error::ApiError};

/// Clone a resident out of the registry, or 404.
pub(crate) fn fetch(registry: &Registry, id: ResidentId) -> Result<Resident, ApiError> {
  registry
    .residents
    .get(id)
    .cloned()
    .ok_or_else(|| ApiError::resident_not_found(id))
}

/// Reject a human whose BSN is malformed or held by someone else.
fn check_bsn(
  kind: &ResidentKind,
  residents: &Population,
  current: Option<ResidentId>,
) -> Result<(), ApiError> {
  let Some(bsn) = kind.human().and_then(|h| h.bsn.as_deref()) else {
    return Ok(());
  };
  let validation = validate_bsn(bsn, residents, current);
  if validation.valid {
    Ok(())
  } else {
    Err(ApiError::InvalidBsn(validation.message))
  }
}

// ─── List ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct ListParams {
  pub archived: Option<bool>,
  pub variant:  Option<Variant>,
}

/// `GET /residents[?archived=<bool>&variant=<variant>]`
pub async fn list<S>(
  State(state): State<AppState<S>>,
  Query(params): Query<ListParams>,
) -> Json<Vec<Resident>>
where
  S: ResidentStore,
  S::Error: std::error::Error + Send + Sync + 'static,
{
  let query = ResidentQuery {
    archived: params.archived,
    variant:  params.variant,
  };
  let registry = state.registry.lock().await;
  Json(
    registry
      .residents
      .iter()
      .filter(|r| query.matches(r))
      .cloned()
      .collect(),
  )
}

// ─── Create ───────────────────────────────────────────────────────────────────

/// `POST /residents`
pub async fn create<S>(
  State(state): State<AppState<S>>,
  headers: HeaderMap,
  Json(body): Json<NewResident>,
) -> Result<impl IntoResponse, ApiError>
where
  S: ResidentStore,
  S::Error: std::error::Error + Send + Sync + 'static,
{
  let resident = state
    .mutate(actor(&headers), move |lc, registry| {
      check_bsn(&body.kind, &registry.residents, None)?;
      let id = lc.create(registry, body);
      fetch(registry, id)
    })
    .await?;
  Ok((StatusCode::CREATED, Json(resident)))
}

// ─── Get one ──────────────────────────────────────────────────────────────────

/// `GET /residents/:id`
pub async fn get_one<S>(
  State(state): State<AppState<S>>,
  Path(id): Path<Uuid>,
) -> Result<Json<Resident>, ApiError>
where
  S: ResidentStore,
  S::Error: std::error::Error + Send + Sync + 'static,
{
  let registry = state.registry.lock().await;
  Ok(Json(fetch(&registry, id)?))
}

// ─── Update ───────────────────────────────────────────────────────────────────

/// `PATCH /residents/:id`
pub async fn update<S>(
  State(state): State<AppState<S>>,
  Path(id): Path<Uuid>,
  headers: HeaderMap,
  Json(patch): Json<ResidentPatch>,
) -> Result<Json<Resident>, ApiError>
where
  S: ResidentStore,
  S::Error: std::error::Error + Send + Sync + 'static,
{
  let resident = state
    .mutate(actor(&headers), move |lc, registry| {
      if let Some(kind) = &patch.kind {
        check_bsn(kind, &registry.residents, Some(id))?;
      }
      if !lc.update(registry, id, patch) {
        return Err(ApiError::resident_not_found(id));
      }
      fetch(registry, id)
    })
    .await?;
  Ok(Json(resident))
}

/// `POST /residents/refresh`: returns the label changes made.
pub async fn refresh<S>(
  State(state): State<AppState<S>>,
  headers: HeaderMap,
) -> Result<Json<Vec<LabelChange>>, ApiError>
where
  S: ResidentStore,
  S::Error: std::error::Error + Send + Sync + 'static,
{
  let changes = state
    .mutate(actor(&headers), |lc, registry| Ok(lc.refresh(registry)))
    .await?;
  Ok(Json(changes))
}

// ─── Archive / restore ────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct ArchiveBody {
  pub reason:      ArchiveReason,
  #[serde(default)]
  pub custom_text: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ReasonParams {
  pub reason: Option<String>,
}

/// `POST /residents/:id/archive`
pub async fn archive<S>(
  State(state): State<AppState<S>>,
  Path(id): Path<Uuid>,
  headers: HeaderMap,
  Json(body): Json<ArchiveBody>,
) -> Result<Json<Resident>, ApiError>
where
  S: ResidentStore,
  S::Error: std::error::Error + Send + Sync + 'static,
{
  let resident = state
    .mutate(actor(&headers), move |lc, registry| {
      fetch(registry, id)?;
      if !lc.archive(registry, id, body.reason, body.custom_text) {
        return Err(ApiError::BadRequest(format!(
          "resident {id} is already archived"
        )));
      }
      fetch(registry, id)
    })
    .await?;
  Ok(Json(resident))
}

/// `POST /residents/:id/restore[?reason=<text>]`
pub async fn restore<S>(
  State(state): State<AppState<S>>,
  Path(id): Path<Uuid>,
  Query(params): Query<ReasonParams>,
  headers: HeaderMap,
) -> Result<Json<Resident>, ApiError>
where
  S: ResidentStore,
  S::Error: std::error::Error + Send + Sync + 'static,
{
  let resident = state
    .mutate(actor(&headers), move |lc, registry| {
      fetch(registry, id)?;
      if !lc.restore(registry, id, params.reason.as_deref()) {
        return Err(ApiError::BadRequest(format!("resident {id} is not archived")));
      }
      fetch(registry, id)
    })
    .await?;
  Ok(Json(resident))
}

// ─── Toggle label ─────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
pub struct ToggleResponse {
  #[serde(flatten)]
  pub outcome:  ToggleOutcome,
  pub resident: Resident,
}

/// `POST /residents/:id/labels/:label_id/toggle[?reason=<text>]`
pub async fn toggle_label<S>(
  State(state): State<AppState<S>>,
  Path((id, label_id)): Path<(Uuid, String)>,
  Query(params): Query<ReasonParams>,
  headers: HeaderMap,
) -> Result<Json<ToggleResponse>, ApiError>
where
  S: ResidentStore,
  S::Error: std::error::Error + Send + Sync + 'static,
{
  let response = state
    .mutate(actor(&headers), move |lc, registry| {
      fetch(registry, id)?;
      let outcome = lc
        .toggle_label(registry, id, &label_id, params.reason.as_deref())
        .ok_or_else(|| ApiError::label_not_found(&label_id))?;
      Ok(ToggleResponse {
        outcome,
        resident: fetch(registry, id)?,
      })
    })
    .await?;
  Ok(Json(response))
}
