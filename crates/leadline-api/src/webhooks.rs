//! `POST /webhooks/{integration_id}`: pushed lead deliveries.
//!
//! The body is either one raw lead or `{"leads": [...]}`. Redelivery is
//! safe: leads already on record count as duplicates.

use axum::{
  Json,
  extract::{Path, State},
};
use leadline_core::{lead::RawLeadData, store::LeadStore};
use leadline_ingest::sync::SyncReport;
use serde::Deserialize;
use uuid::Uuid;

use crate::{ApiState, error::ApiError};

#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum WebhookBody {
  Batch { leads: Vec<RawLeadData> },
  Single(RawLeadData),
}

impl WebhookBody {
  pub fn into_leads(self) -> Vec<RawLeadData> {
    match self {
      Self::Batch { leads } => leads,
      Self::Single(lead) => vec![lead],
    }
  }
}

pub async fn receive<S, P>(
  State(state): State<ApiState<S, P>>,
  Path(integration_id): Path<Uuid>,
  Json(body): Json<WebhookBody>,
) -> Result<Json<SyncReport>, ApiError>
where
  S: LeadStore,
{
  let report = state
    .ingestor
    .ingest_webhook(integration_id, body.into_leads())
    .await?;
  tracing::info!(
    %integration_id,
    created = report.outcome.created,
    duplicates = report.outcome.skipped_duplicates,
    errors = report.outcome.error_count,
    "webhook delivery ingested"
  );
  Ok(Json(report))
}
