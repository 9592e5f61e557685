//! Error type for `leadline-store-sqlite`.

use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum Error {
  #[error("core error: {0}")]
  Core(#[from] leadline_core::Error),

  #[error("database error: {0}")]
  Database(#[from] tokio_rusqlite::Error),

  #[error("json error: {0}")]
  Json(#[from] serde_json::Error),

  #[error("uuid parse error: {0}")]
  Uuid(#[from] uuid::Error),

  #[error("date/time parse error: {0}")]
  DateParse(String),

  /// The `(org_id, external_id)` uniqueness constraint rejected an insert.
  #[error("lead with external id {external_id:?} already exists in org {org_id}")]
  DuplicateExternalId { org_id: Uuid, external_id: String },

  /// A write referenced a row that does not exist.
  #[error("integration not found: {0}")]
  IntegrationNotFound(Uuid),
}

impl Error {
  /// Whether SQLite rejected a write on a UNIQUE index.
  pub fn is_unique_violation(&self) -> bool {
    matches!(
      self,
      Self::Database(tokio_rusqlite::Error::Rusqlite(
        rusqlite::Error::SqliteFailure(f, _)
      )) if f.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
    )
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
