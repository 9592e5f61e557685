//! Webhook signature verification and scheduler bearer auth.
//!
//! Webhook senders sign the raw request body with HMAC-SHA256 and send it
//! as `X-Hub-Signature-256: sha256=<hex>`. The poll endpoint takes a static
//! bearer token shared with the external scheduler.

use std::sync::Arc;

use axum::{
  body::Body,
  extract::{Request, State},
  http::header,
  middleware::Next,
  response::Response,
};
use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::error::Error;

type HmacSha256 = Hmac<Sha256>;

pub const SIGNATURE_HEADER: &str = "x-hub-signature-256";

/// Largest webhook body buffered for verification.
const MAX_WEBHOOK_BODY: usize = 2 * 1024 * 1024;

/// Shared HMAC key for inbound webhooks.
#[derive(Clone)]
pub struct WebhookSecret(Arc<[u8]>);

impl WebhookSecret {
  pub fn new(secret: &str) -> Self { Self(secret.as_bytes().into()) }
}

/// Bearer token expected on `/sync/poll`.
#[derive(Clone)]
pub struct SchedulerToken(Arc<str>);

impl SchedulerToken {
  pub fn new(token: &str) -> Self { Self(token.into()) }
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
  if a.len() != b.len() {
    return false;
  }
  a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

/// Check `signature` (the full header value) against `body`.
pub fn verify_signature(secret: &[u8], body: &[u8], signature: &str) -> Result<(), Error> {
  let hex_sig = signature
    .strip_prefix("sha256=")
    .ok_or(Error::Unauthorized("malformed signature"))?;
  let expected = hex::decode(hex_sig).map_err(|_| Error::Unauthorized("malformed signature"))?;

  let mut mac =
    HmacSha256::new_from_slice(secret).map_err(|_| Error::Unauthorized("bad webhook key"))?;
  mac.update(body);
  mac
    .verify_slice(&expected)
    .map_err(|_| Error::Unauthorized("signature mismatch"))
}

/// Middleware: buffer the body, verify its signature, pass it on intact.
pub async fn require_signature(
  State(secret): State<WebhookSecret>,
  req: Request,
  next: Next,
) -> Result<Response, Error> {
  let (parts, body) = req.into_parts();
  let bytes = axum::body::to_bytes(body, MAX_WEBHOOK_BODY)
    .await
    .map_err(|_| Error::PayloadTooLarge)?;

  let signature = parts
    .headers
    .get(SIGNATURE_HEADER)
    .and_then(|v| v.to_str().ok())
    .ok_or(Error::Unauthorized("missing signature"))?;
  if let Err(e) = verify_signature(&secret.0, &bytes, signature) {
    tracing::warn!(uri = %parts.uri, error = %e, "rejected webhook");
    return Err(e);
  }

  Ok(next.run(Request::from_parts(parts, Body::from(bytes))).await)
}

/// Middleware: require `Authorization: Bearer <scheduler token>`.
pub async fn require_scheduler(
  State(token): State<SchedulerToken>,
  req: Request,
  next: Next,
) -> Result<Response, Error> {
  let presented = req
    .headers()
    .get(header::AUTHORIZATION)
    .and_then(|v| v.to_str().ok())
    .and_then(|v| v.strip_prefix("Bearer "))
    .ok_or(Error::Unauthorized("missing bearer token"))?;
  if !constant_time_eq(presented.as_bytes(), token.0.as_bytes()) {
    return Err(Error::Unauthorized("invalid bearer token"));
  }
  Ok(next.run(req).await)
}

/// `sha256=<hex>` for `body` under `secret`, as a sender would compute it.
#[cfg(test)]
pub(crate) fn sign(secret: &str, body: &[u8]) -> String {
  let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).unwrap();
  mac.update(body);
  format!("sha256={}", hex::encode(mac.finalize().into_bytes()))
}
