//! API error type and [`axum::response::IntoResponse`] implementation.

use axum::{
  Json,
  http::StatusCode,
  response::{IntoResponse, Response},
};
use leadline_ingest::Error as IngestError;
use serde_json::json;
use thiserror::Error;

/// An error returned by an API handler.
#[derive(Debug, Error)]
pub enum ApiError {
  #[error("unauthorized: {0}")]
  Unauthorized(String),

  #[error("forbidden: {0}")]
  Forbidden(String),

  #[error("not found: {0}")]
  NotFound(String),

  #[error("bad request: {0}")]
  BadRequest(String),

  #[error("conflict: {0}")]
  Conflict(String),

  /// A platform or sync failure the caller cannot fix by changing the
  /// request.
  #[error("{0}")]
  Internal(String),

  #[error("store error: {0}")]
  Store(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl ApiError {
  pub(crate) fn store<E>(e: E) -> Self
  where
    E: std::error::Error + Send + Sync + 'static,
  {
    Self::Store(Box::new(e))
  }
}

impl From<IngestError> for ApiError {
  fn from(e: IngestError) -> Self {
    match e {
      IngestError::Store(e) => Self::Store(e),
      IngestError::Forbidden(m) => Self::Forbidden(m),
      e @ (IngestError::IntegrationNotFound(_) | IngestError::LeadNotFound(_)) => {
        Self::NotFound(e.to_string())
      }
      e @ (IngestError::SyncInProgress(_) | IngestError::IntegrationInactive(_)) => {
        Self::Conflict(e.to_string())
      }
      e @ IngestError::InvalidAssignee(_) => Self::BadRequest(e.to_string()),
      e @ (IngestError::Credential(_)
      | IngestError::Platform(_)
      | IngestError::Timeout { .. }) => Self::Internal(e.to_string()),
      IngestError::Bookkeeping { ref run, .. } => match run {
        Some(run) => Self::Internal(format!("{run}; {e}")),
        None => Self::Internal(e.to_string()),
      },
    }
  }
}

impl IntoResponse for ApiError {
  fn into_response(self) -> Response {
    let (status, message) = match &self {
      ApiError::Unauthorized(m) => (StatusCode::UNAUTHORIZED, m.clone()),
      ApiError::Forbidden(m) => (StatusCode::FORBIDDEN, m.clone()),
      ApiError::NotFound(m) => (StatusCode::NOT_FOUND, m.clone()),
      ApiError::BadRequest(m) => (StatusCode::BAD_REQUEST, m.clone()),
      ApiError::Conflict(m) => (StatusCode::CONFLICT, m.clone()),
      ApiError::Internal(m) => (StatusCode::INTERNAL_SERVER_ERROR, m.clone()),
      ApiError::Store(e) => {
        tracing::error!(error = %e, "store failure");
        (StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
      }
    };
    (status, Json(json!({ "error": message }))).into_response()
  }
}
