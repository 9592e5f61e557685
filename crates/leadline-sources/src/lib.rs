//! Platform adapters for Leadline.
//!
//! [`PlatformClient`] implements the ingest crate's
//! [`CredentialProvider`] and [`LeadFetcher`] for Meta lead ads and Google
//! Sheets, decoding each platform's payloads into
//! [`leadline_core::lead::RawLeadData`].

pub mod error;
pub mod google;
pub mod meta;
pub mod sheets;

use std::time::Duration;

use chrono::{DateTime, Utc};
use leadline_core::{
  integration::{Integration, IntegrationConfig, Platform},
  lead::RawLeadData,
};
use leadline_ingest::{AccessToken, BoxError, CredentialProvider, LeadFetcher};
use serde::Deserialize;

pub use error::{Error, Result};

// ─── Settings ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MetaSettings {
  pub graph_base_url: String,
  /// `limit` requested per Graph page.
  pub page_size:      u32,
}

impl Default for MetaSettings {
  fn default() -> Self {
    Self {
      graph_base_url: "https://graph.facebook.com/v19.0".into(),
      page_size:      100,
    }
  }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GoogleSettings {
  pub token_url:       String,
  pub sheets_base_url: String,
  pub client_id:       Option<String>,
  pub client_secret:   Option<String>,
}

impl Default for GoogleSettings {
  fn default() -> Self {
    Self {
      token_url:       "https://oauth2.googleapis.com/token".into(),
      sheets_base_url: "https://sheets.googleapis.com/v4".into(),
      client_id:       None,
      client_secret:   None,
    }
  }
}

// ─── Client ──────────────────────────────────────────────────────────────────

/// HTTP client for every supported platform.
///
/// Cheap to clone; the inner [`reqwest::Client`] is `Arc`-based.
#[derive(Clone)]
pub struct PlatformClient {
  http:   reqwest::Client,
  meta:   MetaSettings,
  google: GoogleSettings,
}

impl PlatformClient {
  pub fn new(meta: MetaSettings, google: GoogleSettings, timeout: Duration) -> Result<Self> {
    let http = reqwest::Client::builder().timeout(timeout).build()?;
    Ok(Self { http, meta, google })
  }

  async fn token_for(&self, integration: &Integration) -> Result<AccessToken> {
    let credentials = &integration.credentials;
    match integration.platform {
      // Long-lived page tokens; nothing to refresh.
      Platform::Facebook | Platform::Instagram => credentials
        .access_token
        .clone()
        .map(AccessToken::unchanged)
        .ok_or(Error::MissingCredential("access token")),
      Platform::GoogleSheets => {
        if let Some(token) = credentials.access_token.as_deref() {
          if google::is_fresh(credentials, Utc::now()) {
            return Ok(AccessToken::unchanged(token));
          }
        }
        let refreshed = google::refresh(&self.http, &self.google, credentials).await?;
        let token = refreshed.access_token.clone().unwrap_or_default();
        Ok(AccessToken { token, refreshed: Some(refreshed) })
      }
      Platform::Webhook => Err(Error::NotPollable(Platform::Webhook)),
    }
  }

  async fn leads_for(
    &self,
    integration: &Integration,
    token: &AccessToken,
    since: Option<DateTime<Utc>>,
  ) -> Result<Vec<RawLeadData>> {
    match (&integration.config, integration.platform) {
      (
        IntegrationConfig::MetaLeadAds { page_id, form_ids, .. },
        Platform::Facebook | Platform::Instagram,
      ) => {
        meta::fetch_leads(
          &self.http,
          &self.meta,
          &token.token,
          page_id.as_deref(),
          form_ids,
          since,
        )
        .await
      }
      // Sheets have no creation time; re-reading is cheap and rows dedupe
      // on their external id.
      (
        IntegrationConfig::GoogleSheets { spreadsheet_id, range, columns, .. },
        Platform::GoogleSheets,
      ) => {
        sheets::fetch_rows(&self.http, &self.google, &token.token, spreadsheet_id, range, columns)
          .await
      }
      (IntegrationConfig::Webhook, platform) => Err(Error::NotPollable(platform)),
      (_, platform) => Err(Error::ConfigMismatch(platform)),
    }
  }
}

impl CredentialProvider for PlatformClient {
  async fn access_token(&self, integration: &Integration) -> Result<AccessToken, BoxError> {
    Ok(self.token_for(integration).await?)
  }
}

impl LeadFetcher for PlatformClient {
  async fn fetch_leads(
    &self,
    integration: &Integration,
    token: &AccessToken,
    since: Option<DateTime<Utc>>,
  ) -> Result<Vec<RawLeadData>, BoxError> {
    Ok(self.leads_for(integration, token, since).await?)
  }
}
