//! Error types for `leadline-core`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("unknown {kind} value: {value:?}")]
  UnknownVariant { kind: &'static str, value: String },

  #[error("serialization error: {0}")]
  Serialization(#[from] serde_json::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

impl Error {
  pub(crate) fn unknown(kind: &'static str, value: &str) -> Self {
    Self::UnknownVariant { kind, value: value.to_owned() }
  }
}
