//! Handlers for family membership.
//!
//! | Method   | Path | Notes |
//! |----------|------|-------|
//! | `POST`   | `/residents/:id/family` | Body: `{"members":[…],"role":"parent"}` |
//! | `DELETE` | `/residents/:id/family` | Returns the unlink report and its warnings |
//! | `POST`   | `/families/reconcile` | Clears families reduced to one member |

use axum::{
  Json,
  extract::{Path, State},
  http::HeaderMap,
};
use refuge_core::{
  family::UnlinkReport,
  resident::{FamilyId, FamilyRole, Resident, ResidentId},
  store::ResidentStore,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{AppState, actor, error::ApiError, residents::fetch};

#[derive(Debug, Deserialize)]
pub struct AddBody {
  pub members: Vec<ResidentId>,
  #[serde(default)]
  pub role:    Option<FamilyRole>,
}

#[derive(Debug, Serialize)]
pub struct AddResponse {
  pub family_id: FamilyId,
  pub resident:  Resident,
}

/// `POST /residents/:id/family`
pub async fn add<S>(
  State(state): State<AppState<S>>,
  Path(id): Path<Uuid>,
  headers: HeaderMap,
  Json(body): Json<AddBody>,
) -> Result<Json<AddResponse>, ApiError>
where
  S: ResidentStore,
  S::Error: std::error::Error + Send + Sync + 'static,
{
  if body.members.is_empty() {
    return Err(ApiError::BadRequest("members must not be empty".into()));
  }
  let response = state
    .mutate(actor(&headers), move |lc, registry| {
      if let Some(missing) = body
        .members
        .iter()
        .find(|m| !registry.residents.contains(**m))
      {
        return Err(ApiError::resident_not_found(*missing));
      }
      let family_id = lc
        .add_to_family(registry, id, &body.members, body.role)
        .ok_or_else(|| ApiError::resident_not_found(id))?;
      Ok(AddResponse {
        family_id,
        resident: fetch(registry, id)?,
      })
    })
    .await?;
  Ok(Json(response))
}

/// `DELETE /residents/:id/family`
pub async fn remove<S>(
  State(state): State<AppState<S>>,
  Path(id): Path<Uuid>,
  headers: HeaderMap,
) -> Result<Json<UnlinkReport>, ApiError>
where
  S: ResidentStore,
  S::Error: std::error::Error + Send + Sync + 'static,
{
  let report = state
    .mutate(actor(&headers), move |lc, registry| {
      lc.remove_from_family(registry, id)
        .ok_or_else(|| ApiError::resident_not_found(id))
    })
    .await?;
  Ok(Json(report))
}

/// `POST /families/reconcile`: returns the residents whose family was
/// cleared.
pub async fn reconcile<S>(
  State(state): State<AppState<S>>,
  headers: HeaderMap,
) -> Result<Json<Vec<ResidentId>>, ApiError>
where
  S: ResidentStore,
  S::Error: std::error::Error + Send + Sync + 'static,
{
  let cleared = state
    .mutate(actor(&headers), |lc, registry| Ok(lc.reconcile_families(registry)))
    .await?;
  Ok(Json(cleared))
}
