//! JSON REST API for Refuge.
//!
//! Exposes an axum [`Router`] over an in-memory [`Registry`] backed by any
//! [`ResidentStore`]. Every mutation runs under one lock: the lifecycle
//! controller changes the registry, then the residents and labels it
//! touched are written to the store in one transaction. A failed write
//! rolls the registry back.
//!
//! Auth, TLS, and transport concerns are the caller's responsibility.

pub mod bsn;
pub mod error;
pub mod families;
pub mod labels;
pub mod residents;
pub mod suggestions;

use std::{path::PathBuf, sync::Arc};

use axum::{
  Router,
  http::HeaderMap,
  routing::{delete, get, post},
};
use refuge_core::{
  lifecycle::{Lifecycle, Registry},
  store::{Changeset, ResidentStore, load_registry},
};
use serde::Deserialize;
use tokio::sync::Mutex;
use tower_http::trace::TraceLayer;

pub use error::ApiError;

/// Request header naming the staff member behind a change. Recorded on
/// every history entry the request produces.
pub const ACTOR_HEADER: &str = "x-refuge-actor";

// ─── Configuration ────────────────────────────────────────────────────────────

/// Runtime server configuration, deserialised from `refuge.toml` and
/// `REFUGE_*` environment variables.
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ServerConfig {
  pub host:                String,
  pub port:                u16,
  pub store_path:          PathBuf,
  /// Write the default label catalog when the store has none.
  pub seed_default_labels: bool,
}

impl Default for ServerConfig {
  fn default() -> Self {
    Self {
      host:                "127.0.0.1".to_string(),
      port:                8080,
      store_path:          PathBuf::from("~/.local/share/refuge/refuge.db"),
      seed_default_labels: true,
    }
  }
}

// ─── Application state ────────────────────────────────────────────────────────

/// Shared state threaded through all axum handlers.
#[derive(Clone)]
pub struct AppState<S: ResidentStore> {
  pub store:     Arc<S>,
  pub registry:  Arc<Mutex<Registry>>,
  pub lifecycle: Arc<Lifecycle>,
}

impl<S> AppState<S>
where
  S: ResidentStore,
  S::Error: std::error::Error + Send + Sync + 'static,
{
  /// Load the registry from `store`.
  pub async fn load(store: S) -> Result<Self, S::Error> {
    let registry = load_registry(&store).await?;
    tracing::info!(
      residents = registry.residents.len(),
      labels = registry.catalog.len(),
      "registry loaded"
    );
    Ok(Self {
      store:     Arc::new(store),
      registry:  Arc::new(Mutex::new(registry)),
      lifecycle: Arc::new(Lifecycle::new()),
    })
  }

  /// Run `op` against the registry and persist every resident and label it
  /// changed.
  ///
  /// `op` receives a controller that attributes history to `actor`. If `op`
  /// fails or the store write fails, the registry is restored to its state
  /// before the call.
  pub async fn mutate<T, F>(&self, actor: Option<&str>, op: F) -> Result<T, ApiError>
  where
    T: Send,
    F: FnOnce(&Lifecycle, &mut Registry) -> Result<T, ApiError> + Send,
  {
    let lifecycle = match actor {
      Some(actor) => self.lifecycle.acting_as(actor),
      None => (*self.lifecycle).clone(),
    };

    let mut registry = self.registry.lock().await;
    let before = registry.clone();

    let value = match op(&lifecycle, &mut *registry) {
      Ok(value) => value,
      Err(e) => {
        *registry = before;
        return Err(e);
      }
    };

    let persisted = self.persist(&before, &registry).await;
    if let Err(e) = persisted {
      *registry = before;
      return Err(e);
    }
    Ok(value)
  }

  /// Write the catalog entries and residents that differ between `before`
  /// and `after` in one store transaction.
  async fn persist(&self, before: &Registry, after: &Registry) -> Result<(), ApiError> {
    let changes = Changeset::between(before, after);
    if changes.is_empty() {
      return Ok(());
    }
    self.store.commit(changes).await.map_err(ApiError::store)
  }
}

/// The actor named by [`ACTOR_HEADER`], if present and non-blank.
pub fn actor(headers: &HeaderMap) -> Option<&str> {
  headers
    .get(ACTOR_HEADER)
    .and_then(|v| v.to_str().ok())
    .map(str::trim)
    .filter(|v| !v.is_empty())
}

// ─── Router ───────────────────────────────────────────────────────────────────

/// Build the API router for `state`.
pub fn router<S>(state: AppState<S>) -> Router
where
  S: ResidentStore + Clone + Send + Sync + 'static,
  S::Error: std::error::Error + Send + Sync + 'static,
{
  Router::new()
    // Residents
    .route(
      "/residents",
      get(residents::list::<S>).post(residents::create::<S>),
    )
    .route("/residents/refresh", post(residents::refresh::<S>))
    .route(
      "/residents/{id}",
      get(residents::get_one::<S>).patch(residents::update::<S>),
    )
    .route("/residents/{id}/archive", post(residents::archive::<S>))
    .route("/residents/{id}/restore", post(residents::restore::<S>))
    .route(
      "/residents/{id}/labels/{label_id}/toggle",
      post(residents::toggle_label::<S>),
    )
    // Families
    .route(
      "/residents/{id}/family",
      post(families::add::<S>).delete(families::remove::<S>),
    )
    .route("/families/reconcile", post(families::reconcile::<S>))
    // Labels
    .route("/labels", get(labels::list::<S>).post(labels::upsert::<S>))
    .route("/labels/{id}", delete(labels::delete_one::<S>))
    // Suggestions and validation
    .route("/suggestions", post(suggestions::handler::<S>))
    .route("/bsn/validate", post(bsn::validate::<S>))
    .layer(TraceLayer::new_for_http())
    .with_state(state)
}
