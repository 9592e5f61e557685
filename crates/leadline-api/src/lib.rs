//! JSON REST API for Leadline.
//!
//! Exposes axum routers backed by an [`Ingestor`] over any
//! [`LeadStore`], plus a platform collaborator for polling. Webhook
//! signature checks, scheduler auth, TLS and transport concerns are the
//! caller's responsibility; the three routers are split so the caller can
//! layer each one differently.
//!
//! # Mounting
//!
//! ```rust,ignore
//! let state = ApiState::new(ingestor, Arc::new(platform));
//! Router::new()
//!   .merge(leadline_api::api_router(state.clone()))
//!   .merge(leadline_api::webhook_router(state.clone()).layer(verify))
//!   .merge(leadline_api::scheduler_router(state).layer(bearer))
//! ```

pub mod auth;
pub mod calls;
pub mod error;
pub mod integrations;
pub mod leads;
pub mod webhooks;

use std::sync::Arc;

use axum::{
  Json, Router,
  routing::{delete, get, post},
};
use leadline_core::store::LeadStore;
use leadline_ingest::{CredentialProvider, Ingestor, LeadFetcher};
use serde_json::{Value, json};

pub use auth::Caller;
pub use error::ApiError;

// ─── State ───────────────────────────────────────────────────────────────────

/// Shared state threaded through all handlers.
pub struct ApiState<S, P> {
  pub ingestor: Ingestor<S>,
  pub platform: Arc<P>,
}

impl<S, P> Clone for ApiState<S, P> {
  fn clone(&self) -> Self {
    Self {
      ingestor: self.ingestor.clone(),
      platform: Arc::clone(&self.platform),
    }
  }
}

impl<S, P> ApiState<S, P> {
  pub fn new(ingestor: Ingestor<S>, platform: Arc<P>) -> Self {
    Self { ingestor, platform }
  }

  pub(crate) fn store(&self) -> &S { self.ingestor.store() }
}

// ─── Routers ─────────────────────────────────────────────────────────────────

/// Routes for signed-in users. Every handler except `/health` requires the
/// auth-context headers.
pub fn api_router<S, P>(state: ApiState<S, P>) -> Router<()>
where
  S: LeadStore + 'static,
  P: CredentialProvider + LeadFetcher + 'static,
{
  Router::new()
    .route("/health", get(health))
    // Integrations
    .route("/integrations", post(integrations::create::<S, P>))
    .route(
      "/integrations/{id}",
      get(integrations::get_one::<S, P>).delete(integrations::remove::<S, P>),
    )
    .route("/integrations/{id}/sync", post(integrations::sync::<S, P>))
    .route("/integrations/{id}/sync-logs", get(integrations::sync_logs::<S, P>))
    // Assignment rules
    .route(
      "/integrations/{id}/rules",
      get(integrations::list_rules::<S, P>).put(integrations::upsert_rule::<S, P>),
    )
    .route(
      "/integrations/{id}/rules/{rule_id}",
      delete(integrations::delete_rule::<S, P>),
    )
    // Leads
    .route("/leads", get(leads::list::<S, P>).post(leads::create::<S, P>))
    .route("/leads/import", post(leads::import::<S, P>))
    .route("/leads/reassign", post(leads::reassign::<S, P>))
    // Call logs
    .route("/call-logs", post(calls::upload::<S, P>))
    .with_state(state)
}

/// `POST /webhooks/{integration_id}`. Unauthenticated at this layer.
pub fn webhook_router<S, P>(state: ApiState<S, P>) -> Router<()>
where
  S: LeadStore + 'static,
  P: CredentialProvider + LeadFetcher + 'static,
{
  Router::new()
    .route("/webhooks/{integration_id}", post(webhooks::receive::<S, P>))
    .with_state(state)
}

/// `POST /sync/poll`, the scheduled poll of every eligible integration.
/// Unauthenticated at this layer.
pub fn scheduler_router<S, P>(state: ApiState<S, P>) -> Router<()>
where
  S: LeadStore + 'static,
  P: CredentialProvider + LeadFetcher + 'static,
{
  Router::new()
    .route("/sync/poll", post(integrations::poll::<S, P>))
    .with_state(state)
}

/// `GET /health`
pub async fn health() -> Json<Value> { Json(json!({ "status": "ok" })) }
