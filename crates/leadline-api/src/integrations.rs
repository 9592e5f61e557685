//! Handlers for `/integrations` endpoints and the scheduled poll.
//!
//! | Method   | Path | Notes |
//! |----------|------|-------|
//! | `POST`   | `/integrations` | Admin. Body: platform, config, credentials |
//! | `GET`    | `/integrations/{id}` | Credentials are never returned |
//! | `DELETE` | `/integrations/{id}` | Admin. Cascades to rules and logs |
//! | `POST`   | `/integrations/{id}/sync` | Admin. 409 if already syncing |
//! | `GET`    | `/integrations/{id}/sync-logs` | `?limit=`, newest first |
//! | `GET`    | `/integrations/{id}/rules` | |
//! | `PUT`    | `/integrations/{id}/rules` | Admin. Upsert by external id |
//! | `DELETE` | `/integrations/{id}/rules/{rule_id}` | Admin |
//! | `POST`   | `/sync/poll` | Scheduler only |

use axum::{
  Json,
  extract::{Path, Query, State},
  http::StatusCode,
  response::IntoResponse,
};
use leadline_core::{
  integration::{
    Credentials, Integration, IntegrationConfig, NewIntegration, Platform, SyncLog,
  },
  routing::{AssignmentRule, NewAssignmentRule},
  store::LeadStore,
  user::{AuthContext, Role},
};
use leadline_ingest::{
  CredentialProvider, LeadFetcher, assign::can_own, sync::SyncReport,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{ApiState, Caller, error::ApiError};

const DEFAULT_LOG_LIMIT: usize = 20;

fn require_admin(ctx: &AuthContext, action: &str) -> Result<(), ApiError> {
  if ctx.role == Role::Admin {
    Ok(())
  } else {
    Err(ApiError::Forbidden(format!("only admins can {action}")))
  }
}

/// The integration `id` if it belongs to the caller's org.
async fn org_integration<S: LeadStore>(
  store: &S,
  ctx: &AuthContext,
  id: Uuid,
) -> Result<Integration, ApiError> {
  store
    .get_integration(id)
    .await
    .map_err(ApiError::store)?
    .filter(|i| i.org_id == ctx.org_id)
    .ok_or_else(|| ApiError::NotFound(format!("integration {id} not found")))
}

// ─── Create / read / delete ──────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct CreateBody {
  pub platform:    Platform,
  pub config:      IntegrationConfig,
  #[serde(default)]
  pub credentials: Credentials,
}

fn config_fits(platform: Platform, config: &IntegrationConfig) -> bool {
  matches!(
    (platform, config),
    (Platform::Facebook | Platform::Instagram, IntegrationConfig::MetaLeadAds { .. })
      | (Platform::GoogleSheets, IntegrationConfig::GoogleSheets { .. })
      | (Platform::Webhook, IntegrationConfig::Webhook)
  )
}

/// `POST /integrations`
pub async fn create<S, P>(
  State(state): State<ApiState<S, P>>,
  Caller(ctx): Caller,
  Json(body): Json<CreateBody>,
) -> Result<impl IntoResponse, ApiError>
where
  S: LeadStore,
{
  require_admin(&ctx, "connect integrations")?;
  if !config_fits(body.platform, &body.config) {
    return Err(ApiError::BadRequest(format!(
      "config does not match platform {}",
      body.platform
    )));
  }
  let store = state.store();
  if let Some(owner) = body.config.sheet_default_assignee() {
    if !can_own(store, ctx.org_id, owner).await.map_err(ApiError::store)? {
      return Err(ApiError::BadRequest(format!(
        "user {owner} cannot own leads in this organization"
      )));
    }
  }

  let integration = store
    .add_integration(NewIntegration {
      org_id:      ctx.org_id,
      platform:    body.platform,
      credentials: body.credentials,
      config:      body.config,
      created_by:  ctx.user_id,
    })
    .await
    .map_err(ApiError::store)?;
  tracing::info!(integration_id = %integration.id, platform = %integration.platform, "integration connected");
  Ok((StatusCode::CREATED, Json(integration)))
}

/// `GET /integrations/{id}`
pub async fn get_one<S, P>(
  State(state): State<ApiState<S, P>>,
  Caller(ctx): Caller,
  Path(id): Path<Uuid>,
) -> Result<Json<Integration>, ApiError>
where
  S: LeadStore,
{
  Ok(Json(org_integration(state.store(), &ctx, id).await?))
}

/// `DELETE /integrations/{id}`
pub async fn remove<S, P>(
  State(state): State<ApiState<S, P>>,
  Caller(ctx): Caller,
  Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError>
where
  S: LeadStore,
{
  require_admin(&ctx, "disconnect integrations")?;
  let store = state.store();
  org_integration(store, &ctx, id).await?;
  store.delete_integration(id).await.map_err(ApiError::store)?;
  Ok(StatusCode::NO_CONTENT)
}

// ─── Sync ────────────────────────────────────────────────────────────────────

/// `POST /integrations/{id}/sync`
pub async fn sync<S, P>(
  State(state): State<ApiState<S, P>>,
  Caller(ctx): Caller,
  Path(id): Path<Uuid>,
) -> Result<Json<SyncReport>, ApiError>
where
  S: LeadStore,
  P: CredentialProvider + LeadFetcher,
{
  let report = state
    .ingestor
    .sync_now(ctx, id, state.platform.as_ref())
    .await?;
  Ok(Json(report))
}

#[derive(Debug, Deserialize)]
pub struct LogParams {
  pub limit: Option<usize>,
}

/// `GET /integrations/{id}/sync-logs[?limit=<n>]`
pub async fn sync_logs<S, P>(
  State(state): State<ApiState<S, P>>,
  Caller(ctx): Caller,
  Path(id): Path<Uuid>,
  Query(params): Query<LogParams>,
) -> Result<Json<Vec<SyncLog>>, ApiError>
where
  S: LeadStore,
{
  if ctx.role == Role::Sales {
    return Err(ApiError::Forbidden("sales users cannot view sync logs".into()));
  }
  let store = state.store();
  org_integration(store, &ctx, id).await?;
  let logs = store
    .list_sync_logs(id, params.limit.unwrap_or(DEFAULT_LOG_LIMIT))
    .await
    .map_err(ApiError::store)?;
  Ok(Json(logs))
}

/// One integration's line in the poll response.
#[derive(Debug, Serialize)]
pub struct PollSummary {
  pub integration_id:     Uuid,
  pub created:            Option<u32>,
  pub skipped_duplicates: Option<u32>,
  pub errors:             Option<u32>,
  pub error:              Option<String>,
}

/// `POST /sync/poll`
pub async fn poll<S, P>(
  State(state): State<ApiState<S, P>>,
) -> Result<Json<Vec<PollSummary>>, ApiError>
where
  S: LeadStore,
  P: CredentialProvider + LeadFetcher,
{
  let results = state.ingestor.poll_all(state.platform.as_ref()).await?;
  let summaries = results
    .into_iter()
    .map(|r| match r.result {
      Ok(report) => PollSummary {
        integration_id:     r.integration_id,
        created:            Some(report.outcome.created),
        skipped_duplicates: Some(report.outcome.skipped_duplicates),
        errors:             Some(report.outcome.error_count),
        error:              None,
      },
      Err(e) => PollSummary {
        integration_id:     r.integration_id,
        created:            None,
        skipped_duplicates: None,
        errors:             None,
        error:              Some(e.to_string()),
      },
    })
    .collect();
  Ok(Json(summaries))
}

// ─── Assignment rules ────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct RuleBody {
  /// Form or campaign id.
  pub external_id: String,
  pub assigned_to: Uuid,
  #[serde(default = "default_true")]
  pub is_active:   bool,
}

fn default_true() -> bool { true }

/// `GET /integrations/{id}/rules`
pub async fn list_rules<S, P>(
  State(state): State<ApiState<S, P>>,
  Caller(ctx): Caller,
  Path(id): Path<Uuid>,
) -> Result<Json<Vec<AssignmentRule>>, ApiError>
where
  S: LeadStore,
{
  let store = state.store();
  org_integration(store, &ctx, id).await?;
  let rules = store.list_assignment_rules(id).await.map_err(ApiError::store)?;
  Ok(Json(rules))
}

/// `PUT /integrations/{id}/rules`
pub async fn upsert_rule<S, P>(
  State(state): State<ApiState<S, P>>,
  Caller(ctx): Caller,
  Path(id): Path<Uuid>,
  Json(body): Json<RuleBody>,
) -> Result<Json<AssignmentRule>, ApiError>
where
  S: LeadStore,
{
  require_admin(&ctx, "edit assignment rules")?;
  let external_id = body.external_id.trim();
  if external_id.is_empty() {
    return Err(ApiError::BadRequest("external_id must not be empty".into()));
  }
  let store = state.store();
  org_integration(store, &ctx, id).await?;
  if !can_own(store, ctx.org_id, body.assigned_to)
    .await
    .map_err(ApiError::store)?
  {
    return Err(ApiError::BadRequest(format!(
      "user {} cannot own leads in this organization",
      body.assigned_to
    )));
  }

  let rule = store
    .upsert_assignment_rule(NewAssignmentRule {
      org_id:         ctx.org_id,
      integration_id: id,
      external_id:    external_id.to_owned(),
      assigned_to:    body.assigned_to,
      is_active:      body.is_active,
    })
    .await
    .map_err(ApiError::store)?;
  Ok(Json(rule))
}

/// `DELETE /integrations/{id}/rules/{rule_id}`
pub async fn delete_rule<S, P>(
  State(state): State<ApiState<S, P>>,
  Caller(ctx): Caller,
  Path((id, rule_id)): Path<(Uuid, Uuid)>,
) -> Result<StatusCode, ApiError>
where
  S: LeadStore,
{
  require_admin(&ctx, "edit assignment rules")?;
  let store = state.store();
  org_integration(store, &ctx, id).await?;
  let owned = store
    .list_assignment_rules(id)
    .await
    .map_err(ApiError::store)?
    .iter()
    .any(|r| r.id == rule_id);
  if !owned {
    return Err(ApiError::NotFound(format!("rule {rule_id} not found")));
  }
  store
    .delete_assignment_rule(rule_id)
    .await
    .map_err(ApiError::store)?;
  Ok(StatusCode::NO_CONTENT)
}
