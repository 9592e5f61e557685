//! Google OAuth refresh-token exchange.

use chrono::{DateTime, Duration, Utc};
use leadline_core::integration::Credentials;
use serde::{Deserialize, Serialize};

use crate::{
  GoogleSettings, Result,
  error::{self, Error},
};

/// Tokens this close to expiry are refreshed before use.
const EXPIRY_MARGIN_SECS: i64 = 60;

#[derive(Serialize)]
struct RefreshRequest<'a> {
  grant_type:    &'static str,
  client_id:     &'a str,
  client_secret: &'a str,
  refresh_token: &'a str,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
  access_token:  String,
  expires_in:    Option<i64>,
  /// Only present when Google rotates the refresh token.
  refresh_token: Option<String>,
}

/// Whether the stored access token can be used as-is at `now`.
pub fn is_fresh(credentials: &Credentials, now: DateTime<Utc>) -> bool {
  credentials.access_token.is_some()
    && credentials
      .expires_at
      .is_some_and(|at| at - Duration::seconds(EXPIRY_MARGIN_SECS) > now)
}

/// The credentials after a successful refresh response.
fn rotated(previous: &Credentials, resp: TokenResponse, now: DateTime<Utc>) -> Credentials {
  Credentials {
    access_token:  Some(resp.access_token),
    refresh_token: resp.refresh_token.or_else(|| previous.refresh_token.clone()),
    expires_at:    resp.expires_in.map(|secs| now + Duration::seconds(secs)),
  }
}

/// Exchange the stored refresh token for a new access token.
pub(crate) async fn refresh(
  http: &reqwest::Client,
  settings: &GoogleSettings,
  credentials: &Credentials,
) -> Result<Credentials> {
  let refresh_token = credentials
    .refresh_token
    .as_deref()
    .ok_or(Error::MissingCredential("refresh token"))?;
  let (Some(client_id), Some(client_secret)) =
    (settings.client_id.as_deref(), settings.client_secret.as_deref())
  else {
    return Err(Error::OAuthNotConfigured);
  };

  let now = Utc::now();
  let resp = http
    .post(&settings.token_url)
    .json(&RefreshRequest {
      grant_type: "refresh_token",
      client_id,
      client_secret,
      refresh_token,
    })
    .send()
    .await?;
  let token: TokenResponse = error::check("google oauth", resp).await?.json().await?;
  tracing::info!(expires_in = ?token.expires_in, "refreshed google access token");
  Ok(rotated(credentials, token, now))
}
