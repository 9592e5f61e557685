//! The caller's identity, as asserted by the upstream gateway.
//!
//! Every authenticated route reads `x-user-id`, `x-org-id` and `x-role`.
//! The values are trusted as-is; this layer only checks they are present
//! and well formed.

use axum::{
  extract::FromRequestParts,
  http::{HeaderMap, request::Parts},
};
use leadline_core::user::{AuthContext, Role};
use uuid::Uuid;

use crate::error::ApiError;

pub const USER_HEADER: &str = "x-user-id";
pub const ORG_HEADER: &str = "x-org-id";
pub const ROLE_HEADER: &str = "x-role";

/// Extractor wrapping the request's [`AuthContext`].
#[derive(Debug, Clone, Copy)]
pub struct Caller(pub AuthContext);

fn header<'h>(headers: &'h HeaderMap, name: &str) -> Result<&'h str, ApiError> {
  headers
    .get(name)
    .and_then(|v| v.to_str().ok())
    .ok_or_else(|| ApiError::Unauthorized(format!("missing {name} header")))
}

fn uuid_header(headers: &HeaderMap, name: &str) -> Result<Uuid, ApiError> {
  header(headers, name)?
    .parse()
    .map_err(|_| ApiError::Unauthorized(format!("malformed {name} header")))
}

/// Read the auth context from request headers.
pub fn auth_context(headers: &HeaderMap) -> Result<AuthContext, ApiError> {
  let role: Role = header(headers, ROLE_HEADER)?
    .parse()
    .map_err(|_| ApiError::Unauthorized(format!("malformed {ROLE_HEADER} header")))?;
  Ok(AuthContext {
    user_id: uuid_header(headers, USER_HEADER)?,
    org_id: uuid_header(headers, ORG_HEADER)?,
    role,
  })
}

impl<St> FromRequestParts<St> for Caller
where
  St: Send + Sync,
{
  type Rejection = ApiError;

  async fn from_request_parts(parts: &mut Parts, _state: &St) -> Result<Self, Self::Rejection> {
    auth_context(&parts.headers).map(Caller)
  }
}

#[cfg(test)]
mod tests {
  use axum::http::HeaderValue;

  use super::*;

  fn headers(pairs: &[(&'static str, &str)]) -> HeaderMap {
    let mut map = HeaderMap::new();
    for (name, value) in pairs {
      map.insert(*name, HeaderValue::from_str(value).unwrap());
    }
    map
  }

  #[test]
  fn complete_headers_parse() {
    let user = Uuid::new_v4();
    let org = Uuid::new_v4();
    let ctx = auth_context(&headers(&[
      (USER_HEADER, &user.to_string()),
      (ORG_HEADER, &org.to_string()),
      (ROLE_HEADER, "manager"),
    ]))
    .unwrap();
    assert_eq!(ctx, AuthContext { user_id: user, org_id: org, role: Role::Manager });
  }

  #[test]
  fn missing_or_malformed_headers_are_unauthorized() {
    let org = Uuid::new_v4().to_string();
    assert!(matches!(
      auth_context(&headers(&[(ORG_HEADER, &org), (ROLE_HEADER, "admin")])),
      Err(ApiError::Unauthorized(_))
    ));
    assert!(matches!(
      auth_context(&headers(&[
        (USER_HEADER, "not-a-uuid"),
        (ORG_HEADER, &org),
        (ROLE_HEADER, "admin"),
      ])),
      Err(ApiError::Unauthorized(_))
    ));
    assert!(matches!(
      auth_context(&headers(&[
        (USER_HEADER, &org),
        (ORG_HEADER, &org),
        (ROLE_HEADER, "owner"),
      ])),
      Err(ApiError::Unauthorized(_))
    ));
  }
}
