//! `POST /call-logs`: device call-history upload for the calling user.

use axum::{Json, extract::State};
use leadline_core::{call::RawCallLog, store::LeadStore};
use leadline_ingest::calls::CallLogOutcome;
use serde::Deserialize;

use crate::{ApiState, Caller, error::ApiError};

#[derive(Debug, Deserialize)]
pub struct UploadBody {
  pub calls: Vec<RawCallLog>,
}

pub async fn upload<S, P>(
  State(state): State<ApiState<S, P>>,
  Caller(ctx): Caller,
  Json(body): Json<UploadBody>,
) -> Result<Json<CallLogOutcome>, ApiError>
where
  S: LeadStore,
{
  Ok(Json(state.ingestor.ingest_call_logs(ctx, body.calls).await))
}
