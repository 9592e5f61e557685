//! Lead ingestion for Leadline: deduplication, assignment, the batch
//! pipeline, integration sync runs, and device call-log upload.
//!
//! [`Ingestor`] is generic over any [`leadline_core::store::LeadStore`] and
//! is shared by every entry path (webhook delivery, manual sync, scheduled
//! poll, bulk import, manual entry).

pub mod assign;
pub mod batch;
pub mod calls;
pub mod collaborator;
pub mod dedupe;
pub mod error;
pub mod manual;
pub mod reassign;
pub mod sync;

use std::{sync::Arc, time::Duration};

use chrono::{DateTime, Utc};
use leadline_core::phone::{IndiaHeuristic, PhoneNormalizer};
use serde::Deserialize;

pub use batch::{BatchContext, BatchOutcome, BatchStatus, LeadOutcome, MissingPhone};
pub use collaborator::{AccessToken, CredentialProvider, LeadFetcher};
pub use error::{BoxError, Error, Result};

// ─── Settings ────────────────────────────────────────────────────────────────

/// Tunables for the pipeline, read from the `[ingest]` config table.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct IngestSettings {
  /// Leads of one batch processed at once.
  pub concurrency:                 usize,
  /// Error strings kept per batch outcome and sync log.
  pub max_logged_errors:           usize,
  /// Bound on each credential refresh and each platform fetch.
  pub platform_timeout_secs:       u64,
  /// Whether single manual entry demands a phone number.
  pub manual_entry_requires_phone: bool,
  /// A `syncing` integration untouched for this long is treated as
  /// abandoned by a crashed run and may be locked again.
  pub stale_sync_secs:             u64,
}

impl Default for IngestSettings {
  fn default() -> Self {
    Self {
      concurrency:                 8,
      max_logged_errors:           50,
      platform_timeout_secs:       30,
      manual_entry_requires_phone: true,
      stale_sync_secs:             3600,
    }
  }
}

impl IngestSettings {
  pub fn platform_timeout(&self) -> Duration {
    Duration::from_secs(self.platform_timeout_secs)
  }

  /// Sync locks last refreshed before this instant are stale.
  pub fn stale_cutoff(&self) -> DateTime<Utc> {
    let secs = i64::try_from(self.stale_sync_secs).unwrap_or(i64::MAX);
    let age = chrono::Duration::try_seconds(secs).unwrap_or(chrono::Duration::MAX);
    Utc::now()
      .checked_sub_signed(age)
      .unwrap_or(DateTime::<Utc>::MIN_UTC)
  }
}

// ─── Ingestor ────────────────────────────────────────────────────────────────

/// Entry point for every ingestion path.
pub struct Ingestor<S> {
  store:      Arc<S>,
  settings:   IngestSettings,
  normalizer: Arc<dyn PhoneNormalizer>,
}

impl<S> Clone for Ingestor<S> {
  fn clone(&self) -> Self {
    Self {
      store:      Arc::clone(&self.store),
      settings:   self.settings.clone(),
      normalizer: Arc::clone(&self.normalizer),
    }
  }
}

impl<S> Ingestor<S> {
  pub fn new(store: Arc<S>, settings: IngestSettings) -> Self {
    Self { store, settings, normalizer: Arc::new(IndiaHeuristic) }
  }

  /// Replace the default India-centric phone normaliser.
  pub fn with_normalizer(mut self, normalizer: Arc<dyn PhoneNormalizer>) -> Self {
    self.normalizer = normalizer;
    self
  }

  pub fn store(&self) -> &Arc<S> { &self.store }

  pub fn settings(&self) -> &IngestSettings { &self.settings }
}

#[cfg(test)]
mod tests;
