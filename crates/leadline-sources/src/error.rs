//! Error types for the platform adapters.

use leadline_core::integration::Platform;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  /// Request URLs are stripped before the error is kept.
  #[error("HTTP error: {0}")]
  Http(reqwest::Error),

  #[error("invalid URL: {0}")]
  Url(String),

  #[error("base URL cannot take a path: {0}")]
  BaseUrl(String),

  /// The platform answered with a non-success status.
  #[error("{platform} returned {status}: {body}")]
  Status {
    platform: &'static str,
    status:   u16,
    body:     String,
  },

  #[error("JSON error: {0}")]
  Json(#[from] serde_json::Error),

  #[error("integration has no {0}")]
  MissingCredential(&'static str),

  #[error("OAuth client is not configured")]
  OAuthNotConfigured,

  /// Webhook-only integrations have nothing to poll.
  #[error("{0} integrations cannot be polled")]
  NotPollable(Platform),

  /// Platform and config kind disagree.
  #[error("integration config does not match platform {0}")]
  ConfigMismatch(Platform),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

impl From<reqwest::Error> for Error {
  fn from(e: reqwest::Error) -> Self { Error::Http(e.without_url()) }
}

pub(crate) fn parse_url(raw: &str) -> Result<reqwest::Url> {
  reqwest::Url::parse(raw).map_err(|e| Error::Url(e.to_string()))
}

/// Turn a non-success response into [`Error::Status`], keeping the body.
pub(crate) async fn check(
  platform: &'static str,
  resp: reqwest::Response,
) -> Result<reqwest::Response> {
  let status = resp.status();
  if status.is_success() {
    return Ok(resp);
  }
  let body = resp.text().await.unwrap_or_default();
  Err(Error::Status { platform, status: status.as_u16(), body })
}
