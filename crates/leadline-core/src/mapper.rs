//! Raw payload → candidate lead, and the validation that gates persistence.

use chrono::Utc;
use uuid::Uuid;

use crate::{
  integration::Integration,
  lead::{CandidateLead, LeadSource, RawLeadData},
  phone,
};

/// Name given to leads whose source omitted one.
pub const UNKNOWN_NAME: &str = "Unknown";

/// Provenance stamped onto every candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LeadOrigin {
  pub source:         LeadSource,
  pub integration_id: Option<Uuid>,
}

impl LeadOrigin {
  pub fn integration(integration: &Integration) -> Self {
    Self {
      source:         integration.platform.lead_source(),
      integration_id: Some(integration.id),
    }
  }

  pub fn manual() -> Self {
    Self { source: LeadSource::Manual, integration_id: None }
  }
}

fn clean(value: Option<String>) -> Option<String> {
  value
    .map(|v| v.trim().to_string())
    .filter(|v| !v.is_empty())
}

/// Pure transformation of a platform payload into the canonical shape.
/// Never fails; whether the result is acceptable is
/// [`validate_mapped_lead`]'s call.
pub fn map_lead(
  raw: RawLeadData,
  org_id: Uuid,
  origin: LeadOrigin,
) -> CandidateLead {
  CandidateLead {
    org_id,
    external_id: clean(raw.external_id),
    name: clean(raw.name).unwrap_or_else(|| UNKNOWN_NAME.to_string()),
    phone: clean(raw.phone),
    email: clean(raw.email),
    company: clean(raw.company),
    source: origin.source,
    integration_id: origin.integration_id,
    metadata: raw.metadata,
    custom_fields: raw.custom_fields,
    created_at: raw.created_at.unwrap_or_else(Utc::now),
  }
}

// ─── Validation ──────────────────────────────────────────────────────────────

/// Whether the ingestion path in force demands a phone number.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PhonePolicy {
  /// Every automated path, and manual entry unless configured otherwise.
  Required,
  /// The legacy manual-entry allowance.
  Optional,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationIssue {
  MissingOrg,
  MissingPhone,
}

impl std::fmt::Display for ValidationIssue {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    match self {
      Self::MissingOrg => f.write_str("missing organization"),
      Self::MissingPhone => f.write_str("missing phone number"),
    }
  }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationReport {
  pub errors: Vec<ValidationIssue>,
}

impl ValidationReport {
  pub fn is_valid(&self) -> bool { self.errors.is_empty() }

  pub fn has(&self, issue: ValidationIssue) -> bool {
    self.errors.contains(&issue)
  }

  /// All issues joined for an error list entry.
  pub fn summary(&self) -> String {
    self
      .errors
      .iter()
      .map(ToString::to_string)
      .collect::<Vec<_>>()
      .join(", ")
  }
}

/// Check a candidate against the rules for its ingestion path. A phone
/// that normalises to nothing counts as missing.
pub fn validate_mapped_lead(
  candidate: &CandidateLead,
  policy: PhonePolicy,
) -> ValidationReport {
  let mut report = ValidationReport::default();
  if candidate.org_id.is_nil() {
    report.errors.push(ValidationIssue::MissingOrg);
  }
  let has_phone = candidate
    .phone
    .as_deref()
    .is_some_and(|p| !phone::normalize(p).is_empty());
  if policy == PhonePolicy::Required && !has_phone {
    report.errors.push(ValidationIssue::MissingPhone);
  }
  report
}
