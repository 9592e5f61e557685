//! Duplicate detection: exact external-id lookup and tolerant phone match.

use leadline_core::{
  lead::Lead,
  phone::{self, PhoneMatch, PhoneNormalizer},
  store::{LeadStore, PhoneCandidateQuery},
  window::{MatchKind, TolerantScan},
};
use uuid::Uuid;

/// Candidate rows fetched per round trip.
pub const PAGE_SIZE: usize = 1000;

/// An existing lead with this provider id, if any. Authoritative: a hit is
/// always a duplicate regardless of phone.
pub async fn find_by_external_id<S: LeadStore>(
  store: &S,
  org_id: Uuid,
  external_id: &str,
) -> Result<Option<Lead>, S::Error> {
  store.find_lead_by_external_id(org_id, external_id).await
}

/// An existing lead of `org_id` whose phone matches `raw_phone`.
///
/// Candidates are scanned newest first, a page at a time, until a short
/// page. An exact match on the normalised form wins immediately; otherwise
/// the first candidate sharing the last ten digits is returned. The store's
/// digit-suffix filter only narrows the scan; equality is decided here.
///
/// A store failure is returned as-is. Callers must not treat it as "no
/// duplicate".
pub async fn find_duplicate<S: LeadStore>(
  store: &S,
  normalizer: &dyn PhoneNormalizer,
  org_id: Uuid,
  raw_phone: &str,
) -> Result<Option<Lead>, S::Error> {
  let wanted = normalizer.normalize(raw_phone, None);
  if wanted.is_empty() {
    return Ok(None);
  }

  let mut query = PhoneCandidateQuery {
    org_id,
    digits_suffix: Some(phone::subscriber_suffix(&wanted)),
    limit: PAGE_SIZE,
    offset: 0,
  };
  let mut scan = TolerantScan::new();

  loop {
    let page = store.phone_candidates(&query).await?;
    let full = page.len() == PAGE_SIZE;

    let hit = scan.feed(page, |lead| {
      let existing = normalizer.normalize(lead.phone.as_deref()?, None);
      match phone::compare(&existing, &wanted)? {
        PhoneMatch::Exact => Some(MatchKind::Exact),
        PhoneMatch::Suffix => Some(MatchKind::Fuzzy),
      }
    });
    if hit.is_some() {
      return Ok(hit);
    }
    if !full {
      return Ok(scan.finish());
    }
    query.offset += PAGE_SIZE;
  }
}
