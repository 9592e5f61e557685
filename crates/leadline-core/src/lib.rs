//! Core types and trait definitions for the Leadline ingestion pipeline.
//!
//! This crate is deliberately free of HTTP and database dependencies.
//! Every other crate depends on it; it depends on nothing proprietary.

// We intentionally use native `async fn` in traits (stabilised in Rust 1.75).
// Suppress the advisory lint about `Send` bounds on the returned futures.
#![allow(async_fn_in_trait)]

/// Implements `as_str`, `Display` and `FromStr` for a fieldless enum whose
/// serde names are snake_case. The string table is the one stored in the
/// database, so it must agree with the serde attributes.
macro_rules! wire_enum {
  ($ty:ident, $kind:literal, { $($variant:ident => $name:literal),+ $(,)? }) => {
    impl $ty {
      pub fn as_str(self) -> &'static str {
        match self {
          $(Self::$variant => $name,)+
        }
      }
    }

    impl ::std::fmt::Display for $ty {
      fn fmt(&self, f: &mut ::std::fmt::Formatter<'_>) -> ::std::fmt::Result {
        f.write_str(self.as_str())
      }
    }

    impl ::std::str::FromStr for $ty {
      type Err = $crate::Error;

      fn from_str(s: &str) -> ::std::result::Result<Self, Self::Err> {
        match s {
          $($name => Ok(Self::$variant),)+
          other => Err($crate::Error::unknown($kind, other)),
        }
      }
    }
  };
}

pub mod call;
pub mod error;
pub mod integration;
pub mod lead;
pub mod mapper;
pub mod phone;
pub mod routing;
pub mod store;
pub mod user;
pub mod window;

pub use error::{Error, Result};
