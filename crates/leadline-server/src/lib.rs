//! HTTP server assembly for Leadline.
//!
//! Combines the [`leadline_api`] routers with webhook signature checks,
//! scheduler auth and request tracing.

pub mod auth;
pub mod error;

pub use error::Error;

use std::path::PathBuf;

use axum::{Router, middleware};
use leadline_api::{ApiState, api_router, scheduler_router, webhook_router};
use leadline_ingest::{CredentialProvider, IngestSettings, LeadFetcher};
use leadline_sources::{GoogleSettings, MetaSettings};
use leadline_store_sqlite::SqliteStore;
use serde::Deserialize;
use tower_http::trace::TraceLayer;

use auth::{SchedulerToken, WebhookSecret, require_scheduler, require_signature};

// ─── Configuration ────────────────────────────────────────────────────────────

/// Runtime server configuration, deserialised from `leadline.toml` and
/// `LEADLINE_*` environment variables.
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ServerConfig {
  pub host:            String,
  pub port:            u16,
  pub store_path:      PathBuf,
  /// HMAC key for `X-Hub-Signature-256`. Unsigned webhooks are accepted
  /// when unset.
  pub webhook_secret:  Option<String>,
  /// Bearer token for `/sync/poll`. The route is not mounted when unset.
  pub scheduler_token: Option<String>,
  pub ingest:          IngestSettings,
  pub meta:            MetaSettings,
  pub google:          GoogleSettings,
}

impl Default for ServerConfig {
  fn default() -> Self {
    Self {
      host:            "127.0.0.1".into(),
      port:            8080,
      store_path:      PathBuf::from("leadline.db"),
      webhook_secret:  None,
      scheduler_token: None,
      ingest:          IngestSettings::default(),
      meta:            MetaSettings::default(),
      google:          GoogleSettings::default(),
    }
  }
}

// ─── Router ───────────────────────────────────────────────────────────────────

/// Build the full application router.
pub fn router<P>(state: ApiState<SqliteStore, P>, config: &ServerConfig) -> Router
where
  P: CredentialProvider + LeadFetcher + 'static,
{
  let mut webhooks = webhook_router(state.clone());
  match &config.webhook_secret {
    Some(secret) => {
      webhooks = webhooks.layer(middleware::from_fn_with_state(
        WebhookSecret::new(secret),
        require_signature,
      ));
    }
    None => tracing::warn!("webhook_secret unset; webhook signatures are not checked"),
  }

  let mut app = api_router(state.clone()).merge(webhooks);
  match &config.scheduler_token {
    Some(token) => {
      app = app.merge(scheduler_router(state).layer(middleware::from_fn_with_state(
        SchedulerToken::new(token),
        require_scheduler,
      )));
    }
    None => tracing::warn!("scheduler_token unset; /sync/poll is disabled"),
  }

  app.layer(TraceLayer::new_for_http())
}

// ─── Integration tests ────────────────────────────────────────────────────────
