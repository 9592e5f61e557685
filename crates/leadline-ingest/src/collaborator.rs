//! Interfaces to the external systems an integration run depends on.
//!
//! Implemented for real platforms by `leadline-sources`; tests supply fakes.

use std::future::Future;

use chrono::{DateTime, Utc};
use leadline_core::{
  integration::{Credentials, Integration},
  lead::RawLeadData,
};

use crate::error::BoxError;

/// A currently-valid bearer token.
#[derive(Debug, Clone)]
pub struct AccessToken {
  pub token:     String,
  /// Set when obtaining the token rotated the stored credentials; the
  /// runner persists it before fetching.
  pub refreshed: Option<Credentials>,
}

impl AccessToken {
  pub fn unchanged(token: impl Into<String>) -> Self {
    Self { token: token.into(), refreshed: None }
  }
}

/// Turns an integration's stored credentials into a usable access token.
pub trait CredentialProvider: Send + Sync {
  fn access_token<'a>(
    &'a self,
    integration: &'a Integration,
  ) -> impl Future<Output = Result<AccessToken, BoxError>> + Send + 'a;
}

/// Pulls raw leads created since `since` (everything when `None`).
pub trait LeadFetcher: Send + Sync {
  fn fetch_leads<'a>(
    &'a self,
    integration: &'a Integration,
    token: &'a AccessToken,
    since: Option<DateTime<Utc>>,
  ) -> impl Future<Output = Result<Vec<RawLeadData>, BoxError>> + Send + 'a;
}
