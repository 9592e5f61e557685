//! Error type for `leadline-ingest`.
//!
//! Only integration-level and caller-facing failures surface here. Per-lead
//! problems are aggregated into a [`crate::BatchOutcome`] instead.

use std::time::Duration;

use thiserror::Error;
use uuid::Uuid;

/// Boxed error from a store or an external collaborator.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Debug, Error)]
pub enum Error {
  #[error("store error: {0}")]
  Store(#[source] BoxError),

  #[error("integration not found: {0}")]
  IntegrationNotFound(Uuid),

  #[error("integration {0} is inactive")]
  IntegrationInactive(Uuid),

  /// Another run holds the sync lock.
  #[error("integration {0} is already syncing")]
  SyncInProgress(Uuid),

  #[error("credential refresh failed: {0}")]
  Credential(#[source] BoxError),

  #[error("platform fetch failed: {0}")]
  Platform(#[source] BoxError),

  #[error("{stage} timed out after {after:?}")]
  Timeout { stage: &'static str, after: Duration },

  /// Releasing the sync lock or writing the sync log failed. `run` is the
  /// integration-level error that ended the run, if any.
  #[error("sync bookkeeping failed: {}", .failures.join("; "))]
  Bookkeeping {
    failures: Vec<String>,
    #[source]
    run:      Option<Box<Error>>,
  },

  /// The caller's role does not permit the request. Nothing was mutated.
  #[error("forbidden: {0}")]
  Forbidden(String),

  #[error("lead not found: {0}")]
  LeadNotFound(Uuid),

  /// Target user missing, inactive, or in another organization.
  #[error("user {0} cannot own leads in this organization")]
  InvalidAssignee(Uuid),
}

impl Error {
  pub(crate) fn store<E>(e: E) -> Self
  where
    E: std::error::Error + Send + Sync + 'static,
  {
    Self::Store(Box::new(e))
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
