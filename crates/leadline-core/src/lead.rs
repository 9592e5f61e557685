//! Lead types: the canonical record every ingestion path produces.
//!
//! Raw payloads from each platform are decoded into [`RawLeadData`] by the
//! source adapters, mapped into a [`CandidateLead`] by
//! [`crate::mapper::map_lead`], and finally persisted as a [`Lead`].

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::routing::Assignment;

// ─── Enums ───────────────────────────────────────────────────────────────────

/// Where a lead came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LeadSource {
  Manual,
  Facebook,
  Instagram,
  GoogleSheets,
  Webhook,
  Other,
}

wire_enum!(LeadSource, "lead source", {
  Manual => "manual",
  Facebook => "facebook",
  Instagram => "instagram",
  GoogleSheets => "google_sheets",
  Webhook => "webhook",
  Other => "other",
});

/// Workflow status. Labels and colours are customised per organization
/// elsewhere; business logic only ever sees this fixed value set.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum LeadStatus {
  #[default]
  New,
  Contacted,
  Qualified,
  Converted,
  Lost,
}

wire_enum!(LeadStatus, "lead status", {
  New => "new",
  Contacted => "contacted",
  Qualified => "qualified",
  Converted => "converted",
  Lost => "lost",
});

// ─── Metadata ────────────────────────────────────────────────────────────────

/// Platform-specific provenance carried alongside a lead.
///
/// The assignment resolver pattern-matches on the known shapes to find a
/// form or campaign id; `Unstructured` is the passthrough for anything else.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum LeadMetadata {
  #[default]
  Empty,
  /// A Meta (Facebook / Instagram) lead-ads submission.
  MetaLeadAd {
    form_id:     Option<String>,
    campaign_id: Option<String>,
    ad_id:       Option<String>,
    page_id:     Option<String>,
  },
  /// One row of a connected spreadsheet.
  SheetRow {
    spreadsheet_id: String,
    sheet_name:     Option<String>,
    /// 1-based row number, header row included.
    row:            u32,
  },
  /// A generic webhook push that named its form and/or campaign.
  Webhook {
    form_id:     Option<String>,
    campaign_id: Option<String>,
  },
  Unstructured {
    fields: BTreeMap<String, serde_json::Value>,
  },
}

impl LeadMetadata {
  /// Identifiers an assignment rule may be keyed on, most specific first
  /// (form before campaign).
  pub fn routing_keys(&self) -> Vec<&str> {
    match self {
      Self::MetaLeadAd { form_id, campaign_id, .. }
      | Self::Webhook { form_id, campaign_id } => {
        [form_id.as_deref(), campaign_id.as_deref()]
          .into_iter()
          .flatten()
          .filter(|id| !id.is_empty())
          .collect()
      }
      Self::Empty | Self::SheetRow { .. } | Self::Unstructured { .. } => {
        Vec::new()
      }
    }
  }
}

// ─── Raw input ───────────────────────────────────────────────────────────────

/// The one shape every platform adapter normalises into before handing off
/// to the mapper.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawLeadData {
  /// Provider-issued id; opaque and compared by exact equality.
  pub external_id:   Option<String>,
  pub name:          Option<String>,
  pub phone:         Option<String>,
  pub email:         Option<String>,
  pub company:       Option<String>,
  /// When the platform says the lead was created.
  pub created_at:    Option<DateTime<Utc>>,
  #[serde(default)]
  pub metadata:      LeadMetadata,
  /// Source fields with no dedicated column.
  #[serde(default)]
  pub custom_fields: BTreeMap<String, String>,
}

// ─── Candidate ───────────────────────────────────────────────────────────────

/// A mapped, not yet validated or persisted lead.
#[derive(Debug, Clone, PartialEq)]
pub struct CandidateLead {
  pub org_id:         Uuid,
  pub external_id:    Option<String>,
  pub name:           String,
  pub phone:          Option<String>,
  pub email:          Option<String>,
  pub company:        Option<String>,
  pub source:         LeadSource,
  pub integration_id: Option<Uuid>,
  pub metadata:       LeadMetadata,
  pub custom_fields:  BTreeMap<String, String>,
  pub created_at:     DateTime<Utc>,
}

// ─── Lead ────────────────────────────────────────────────────────────────────

/// A persisted lead.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Lead {
  pub id:             Uuid,
  pub org_id:         Uuid,
  pub external_id:    Option<String>,
  pub name:           String,
  pub phone:          Option<String>,
  pub email:          Option<String>,
  pub company:        Option<String>,
  pub source:         LeadSource,
  pub integration_id: Option<Uuid>,
  /// `None` means unassigned.
  pub assigned_to:    Option<Uuid>,
  /// The user accountable for an unassigned lead's visibility.
  pub created_by:     Option<Uuid>,
  pub status:         LeadStatus,
  pub metadata:       LeadMetadata,
  pub custom_fields:  BTreeMap<String, String>,
  pub created_at:     DateTime<Utc>,
  pub updated_at:     DateTime<Utc>,
}

/// Input to [`crate::store::LeadStore::insert_lead`].
/// `id` and `updated_at` are always set by the store.
#[derive(Debug, Clone)]
pub struct NewLead {
  pub org_id:         Uuid,
  pub external_id:    Option<String>,
  pub name:           String,
  pub phone:          Option<String>,
  pub email:          Option<String>,
  pub company:        Option<String>,
  pub source:         LeadSource,
  pub integration_id: Option<Uuid>,
  pub assigned_to:    Option<Uuid>,
  pub created_by:     Option<Uuid>,
  pub status:         LeadStatus,
  pub metadata:       LeadMetadata,
  pub custom_fields:  BTreeMap<String, String>,
  pub created_at:     DateTime<Utc>,
}

impl NewLead {
  /// Combine a validated candidate with the resolver's decision.
  pub fn from_candidate(candidate: CandidateLead, assignment: &Assignment) -> Self {
    Self {
      org_id:         candidate.org_id,
      external_id:    candidate.external_id,
      name:           candidate.name,
      phone:          candidate.phone,
      email:          candidate.email,
      company:        candidate.company,
      source:         candidate.source,
      integration_id: candidate.integration_id,
      assigned_to:    assignment.assigned_to,
      created_by:     assignment.created_by,
      status:         LeadStatus::default(),
      metadata:       candidate.metadata,
      custom_fields:  candidate.custom_fields,
      created_at:     candidate.created_at,
    }
  }
}
