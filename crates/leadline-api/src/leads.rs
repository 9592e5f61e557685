//! Handlers for `/leads` endpoints.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `GET`  | `/leads` | Scoped to what the caller may see |
//! | `POST` | `/leads` | Single manual entry; 409 on duplicate |
//! | `POST` | `/leads/import` | Preview import; admins and managers |
//! | `POST` | `/leads/reassign` | 403 with nothing changed on any violation |

use axum::{
  Json,
  extract::{Query, State},
  http::StatusCode,
  response::{IntoResponse, Response},
};
use leadline_core::{
  lead::{Lead, RawLeadData},
  store::{LeadQuery, LeadStore},
  user::{Role, reportees},
};
use leadline_ingest::{LeadOutcome, manual::ImportReport};
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use crate::{ApiState, Caller, error::ApiError};

// ─── List ────────────────────────────────────────────────────────────────────

#[derive(Debug, Default, Deserialize)]
pub struct ListParams {
  pub assigned_to: Option<Uuid>,
  #[serde(default)]
  pub unassigned:  bool,
  pub limit:       Option<usize>,
  pub offset:      Option<usize>,
}

/// `GET /leads[?assigned_to=<id>][&unassigned=true][&limit=&offset=]`
///
/// Admins see the whole org, managers their subtree, sales users the leads
/// assigned to or created by them.
pub async fn list<S, P>(
  State(state): State<ApiState<S, P>>,
  Caller(ctx): Caller,
  Query(params): Query<ListParams>,
) -> Result<Json<Vec<Lead>>, ApiError>
where
  S: LeadStore,
{
  let store = state.store();
  let visible_to = match ctx.role {
    Role::Admin => None,
    Role::Manager => {
      let users = store.list_users(ctx.org_id).await.map_err(ApiError::store)?;
      let mut team = reportees(&users, ctx.user_id);
      team.insert(ctx.user_id);
      Some(team.into_iter().collect())
    }
    Role::Sales => Some(vec![ctx.user_id]),
  };

  let leads = store
    .list_leads(&LeadQuery {
      org_id: ctx.org_id,
      assigned_to: params.assigned_to,
      created_by: None,
      visible_to,
      unassigned_only: params.unassigned,
      limit: params.limit,
      offset: params.offset,
    })
    .await
    .map_err(ApiError::store)?;
  Ok(Json(leads))
}

// ─── Manual entry ────────────────────────────────────────────────────────────

/// `POST /leads`. Body: a raw lead.
pub async fn create<S, P>(
  State(state): State<ApiState<S, P>>,
  Caller(ctx): Caller,
  Json(raw): Json<RawLeadData>,
) -> Result<Response, ApiError>
where
  S: LeadStore,
{
  match state.ingestor.create_manual_lead(ctx, raw).await {
    LeadOutcome::Created(lead) => Ok((StatusCode::CREATED, Json(lead)).into_response()),
    LeadOutcome::Duplicate { existing } => Ok(
      (
        StatusCode::CONFLICT,
        Json(json!({ "error": "duplicate lead", "existing_id": existing })),
      )
        .into_response(),
    ),
    LeadOutcome::MissingPhone => Err(ApiError::BadRequest("missing phone number".into())),
    LeadOutcome::Failed(message) => Err(ApiError::BadRequest(message)),
  }
}

// ─── Import ──────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct ImportBody {
  /// Attribute the leads to this integration and log the run against it.
  pub integration_id: Option<Uuid>,
  pub leads:          Vec<RawLeadData>,
}

/// `POST /leads/import`
pub async fn import<S, P>(
  State(state): State<ApiState<S, P>>,
  Caller(ctx): Caller,
  Json(body): Json<ImportBody>,
) -> Result<Json<ImportReport>, ApiError>
where
  S: LeadStore,
{
  let report = state
    .ingestor
    .import_leads(ctx, body.integration_id, body.leads)
    .await?;
  Ok(Json(report))
}

// ─── Reassign ────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct ReassignBody {
  pub lead_ids:    Vec<Uuid>,
  /// `null` unassigns (admins only).
  pub assigned_to: Option<Uuid>,
}

/// `POST /leads/reassign`
pub async fn reassign<S, P>(
  State(state): State<ApiState<S, P>>,
  Caller(ctx): Caller,
  Json(body): Json<ReassignBody>,
) -> Result<Json<serde_json::Value>, ApiError>
where
  S: LeadStore,
{
  let updated = state
    .ingestor
    .reassign_leads(ctx, &body.lead_ids, body.assigned_to)
    .await?;
  Ok(Json(json!({ "updated": updated })))
}
