//! Integrations, their sync state, and the sync audit log.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::lead::LeadSource;

// ─── Platform ────────────────────────────────────────────────────────────────

/// An external system leads are pulled from or pushed by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Platform {
  Facebook,
  Instagram,
  GoogleSheets,
  Webhook,
}

wire_enum!(Platform, "platform", {
  Facebook => "facebook",
  Instagram => "instagram",
  GoogleSheets => "google_sheets",
  Webhook => "webhook",
});

impl Platform {
  /// The fixed platform → lead source lookup used by the mapper.
  pub fn lead_source(self) -> LeadSource {
    match self {
      Self::Facebook => LeadSource::Facebook,
      Self::Instagram => LeadSource::Instagram,
      Self::GoogleSheets => LeadSource::GoogleSheets,
      Self::Webhook => LeadSource::Webhook,
    }
  }
}

// ─── Credentials & config ────────────────────────────────────────────────────

/// The opaque token blob kept for an integration. Only the credential
/// collaborator interprets it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
  pub access_token:  Option<String>,
  pub refresh_token: Option<String>,
  pub expires_at:    Option<DateTime<Utc>>,
}

/// Column headers used to read a lead out of a spreadsheet row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SheetColumns {
  #[serde(default = "SheetColumns::default_name")]
  pub name:    String,
  #[serde(default = "SheetColumns::default_phone")]
  pub phone:   String,
  #[serde(default = "SheetColumns::default_email")]
  pub email:   String,
  #[serde(default = "SheetColumns::default_company")]
  pub company: String,
}

impl SheetColumns {
  fn default_name() -> String { "name".into() }
  fn default_phone() -> String { "phone".into() }
  fn default_email() -> String { "email".into() }
  fn default_company() -> String { "company".into() }
}

impl Default for SheetColumns {
  fn default() -> Self {
    Self {
      name:    Self::default_name(),
      phone:   Self::default_phone(),
      email:   Self::default_email(),
      company: Self::default_company(),
    }
  }
}

/// Platform-specific integration settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum IntegrationConfig {
  /// Facebook and Instagram lead ads, both served by the Graph API.
  MetaLeadAds {
    page_id:        Option<String>,
    /// Lead forms to poll. Empty means webhook-only.
    #[serde(default)]
    form_ids:       Vec<String>,
    #[serde(default)]
    ad_account_ids: Vec<String>,
  },
  GoogleSheets {
    spreadsheet_id:   String,
    /// A1 range including the header row, e.g. `Leads!A1:Z`.
    range:            String,
    #[serde(default)]
    columns:          SheetColumns,
    /// Owner for every lead of this sheet when no finer rule matches.
    default_assignee: Option<Uuid>,
  },
  /// A generic push endpoint; nothing to poll.
  Webhook,
}

impl IntegrationConfig {
  /// The sheet-level catch-all assignee, if this is a spreadsheet
  /// integration that has one.
  pub fn sheet_default_assignee(&self) -> Option<Uuid> {
    match self {
      Self::GoogleSheets { default_assignee, .. } => *default_assignee,
      Self::MetaLeadAds { .. } | Self::Webhook => None,
    }
  }
}

// ─── Sync state ──────────────────────────────────────────────────────────────

#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum SyncStatus {
  #[default]
  Idle,
  Syncing,
  Error,
}

wire_enum!(SyncStatus, "sync status", {
  Idle => "idle",
  Syncing => "syncing",
  Error => "error",
});

/// Per-integration sync state. Transitions are driven by the orchestrator;
/// this type only answers whether a poll may start.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncState {
  pub status:        SyncStatus,
  /// Lower bound of the next poll's lookback window.
  pub last_sync_at:  Option<DateTime<Utc>>,
  pub error_message: Option<String>,
}

impl SyncState {
  /// A run may start unless another one is in flight.
  pub fn is_eligible(&self) -> bool { self.status != SyncStatus::Syncing }
}

/// How a run ended, as written back by
/// [`crate::store::LeadStore::finish_sync`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncCompletion {
  pub status:        SyncStatus,
  pub error_message: Option<String>,
  /// New watermark; `None` leaves the stored one untouched.
  pub last_sync_at:  Option<DateTime<Utc>>,
}

// ─── Integration ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize)]
pub struct Integration {
  pub id:          Uuid,
  pub org_id:      Uuid,
  pub platform:    Platform,
  #[serde(skip_serializing)]
  pub credentials: Credentials,
  pub config:      IntegrationConfig,
  pub is_active:   bool,
  pub sync:        SyncState,
  /// The admin who connected the integration; accountable for the
  /// visibility of leads it brings in unassigned.
  pub created_by:  Uuid,
  pub created_at:  DateTime<Utc>,
  pub updated_at:  DateTime<Utc>,
}

/// Input to [`crate::store::LeadStore::add_integration`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewIntegration {
  pub org_id:      Uuid,
  pub platform:    Platform,
  #[serde(default)]
  pub credentials: Credentials,
  pub config:      IntegrationConfig,
  pub created_by:  Uuid,
}

// ─── Sync log ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncType {
  Manual,
  Scheduled,
  Webhook,
}

wire_enum!(SyncType, "sync type", {
  Manual => "manual",
  Scheduled => "scheduled",
  Webhook => "webhook",
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncLogStatus {
  Success,
  Partial,
  Error,
}

wire_enum!(SyncLogStatus, "sync log status", {
  Success => "success",
  Partial => "partial",
  Error => "error",
});

/// One append-only audit row per ingestion run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncLog {
  pub id:             Uuid,
  pub integration_id: Uuid,
  pub sync_type:      SyncType,
  pub status:         SyncLogStatus,
  pub leads_created:  u32,
  /// Duplicates skipped.
  pub leads_updated:  u32,
  pub error_message:  Option<String>,
  /// At most the configured number of per-lead error strings.
  pub errors:         Vec<String>,
  pub created_at:     DateTime<Utc>,
}

/// Input to [`crate::store::LeadStore::append_sync_log`].
#[derive(Debug, Clone)]
pub struct NewSyncLog {
  pub integration_id: Uuid,
  pub sync_type:      SyncType,
  pub status:         SyncLogStatus,
  pub leads_created:  u32,
  pub leads_updated:  u32,
  pub error_message:  Option<String>,
  pub errors:         Vec<String>,
}
