//! Rejections raised by the server's own middleware.

use axum::{
  Json,
  http::StatusCode,
  response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("unauthorized: {0}")]
  Unauthorized(&'static str),
  #[error("request body too large")]
  PayloadTooLarge,
}

impl IntoResponse for Error {
  fn into_response(self) -> Response {
    let status = match self {
      Error::Unauthorized(_) => StatusCode::UNAUTHORIZED,
      Error::PayloadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
    };
    (status, Json(json!({ "error": self.to_string() }))).into_response()
  }
}
