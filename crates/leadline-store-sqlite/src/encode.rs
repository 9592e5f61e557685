//! Encoding and decoding helpers between Rust domain types and the plain-text
//! representations stored in SQLite columns.
//!
//! Timestamps are stored as RFC 3339 strings with a fixed microsecond
//! precision and a `Z` suffix, so that string comparison in SQL agrees with
//! chronological order. Structured fields (metadata, custom fields, config,
//! credentials, error lists) are stored as compact JSON. UUIDs are stored as
//! hyphenated lowercase strings. Enums use their wire names.

use std::str::FromStr;

use chrono::{DateTime, SecondsFormat, Utc};
use leadline_core::{
  call::CallLog,
  integration::{Integration, SyncState, SyncLog},
  lead::Lead,
  routing::AssignmentRule,
  user::User,
};
use serde::{Serialize, de::DeserializeOwned};
use uuid::Uuid;

use crate::{Error, Result};

// ─── Scalars ─────────────────────────────────────────────────────────────────

pub fn encode_uuid(id: Uuid) -> String { id.hyphenated().to_string() }

pub fn decode_uuid(s: &str) -> Result<Uuid> { Ok(Uuid::parse_str(s)?) }

pub fn decode_opt_uuid(s: Option<String>) -> Result<Option<Uuid>> {
  s.as_deref().map(decode_uuid).transpose()
}

pub fn encode_dt(dt: DateTime<Utc>) -> String {
  dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(e.to_string()))
}

pub fn decode_opt_dt(s: Option<String>) -> Result<Option<DateTime<Utc>>> {
  s.as_deref().map(decode_dt).transpose()
}

/// Parse a wire-named enum column.
pub fn decode_enum<T>(s: &str) -> Result<T>
where
  T: FromStr<Err = leadline_core::Error>,
{
  Ok(s.parse()?)
}

pub fn encode_json<T: Serialize>(value: &T) -> Result<String> {
  Ok(serde_json::to_string(value)?)
}

pub fn decode_json<T: DeserializeOwned>(s: &str) -> Result<T> {
  Ok(serde_json::from_str(s)?)
}

// ─── Column lists ────────────────────────────────────────────────────────────
//
// Each `Raw*` reader below consumes exactly these columns, in this order.

pub const LEAD_COLUMNS: &str = "id, org_id, external_id, name, phone, email, \
  company, source, integration_id, assigned_to, created_by, status, metadata, \
  custom_fields, created_at, updated_at";

pub const USER_COLUMNS: &str =
  "id, org_id, name, role, reports_to, is_active, created_at";

pub const INTEGRATION_COLUMNS: &str = "id, org_id, platform, credentials, \
  config, is_active, sync_status, last_sync_at, error_message, created_by, \
  created_at, updated_at";

pub const RULE_COLUMNS: &str = "id, org_id, integration_id, external_id, \
  assigned_to, is_active, created_at, updated_at";

pub const SYNC_LOG_COLUMNS: &str = "id, integration_id, sync_type, status, \
  leads_created, leads_updated, error_message, errors, created_at";

pub const CALL_LOG_COLUMNS: &str = "id, org_id, user_id, lead_id, phone, \
  direction, started_at, duration_secs, created_at";

// ─── Row types ───────────────────────────────────────────────────────────────

/// Raw values read directly from a `leads` row.
pub struct RawLead {
  pub id:             String,
  pub org_id:         String,
  pub external_id:    Option<String>,
  pub name:           String,
  pub phone:          Option<String>,
  pub email:          Option<String>,
  pub company:        Option<String>,
  pub source:         String,
  pub integration_id: Option<String>,
  pub assigned_to:    Option<String>,
  pub created_by:     Option<String>,
  pub status:         String,
  pub metadata:       String,
  pub custom_fields:  String,
  pub created_at:     String,
  pub updated_at:     String,
}

impl RawLead {
  pub fn read(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      id:             row.get(0)?,
      org_id:         row.get(1)?,
      external_id:    row.get(2)?,
      name:           row.get(3)?,
      phone:          row.get(4)?,
      email:          row.get(5)?,
      company:        row.get(6)?,
      source:         row.get(7)?,
      integration_id: row.get(8)?,
      assigned_to:    row.get(9)?,
      created_by:     row.get(10)?,
      status:         row.get(11)?,
      metadata:       row.get(12)?,
      custom_fields:  row.get(13)?,
      created_at:     row.get(14)?,
      updated_at:     row.get(15)?,
    })
  }

  pub fn into_lead(self) -> Result<Lead> {
    Ok(Lead {
      id:             decode_uuid(&self.id)?,
      org_id:         decode_uuid(&self.org_id)?,
      external_id:    self.external_id,
      name:           self.name,
      phone:          self.phone,
      email:          self.email,
      company:        self.company,
      source:         decode_enum(&self.source)?,
      integration_id: decode_opt_uuid(self.integration_id)?,
      assigned_to:    decode_opt_uuid(self.assigned_to)?,
      created_by:     decode_opt_uuid(self.created_by)?,
      status:         decode_enum(&self.status)?,
      metadata:       decode_json(&self.metadata)?,
      custom_fields:  decode_json(&self.custom_fields)?,
      created_at:     decode_dt(&self.created_at)?,
      updated_at:     decode_dt(&self.updated_at)?,
    })
  }
}

/// Raw values read directly from a `users` row.
pub struct RawUser {
  pub id:         String,
  pub org_id:     String,
  pub name:       String,
  pub role:       String,
  pub reports_to: Option<String>,
  pub is_active:  bool,
  pub created_at: String,
}

impl RawUser {
  pub fn read(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      id:         row.get(0)?,
      org_id:     row.get(1)?,
      name:       row.get(2)?,
      role:       row.get(3)?,
      reports_to: row.get(4)?,
      is_active:  row.get(5)?,
      created_at: row.get(6)?,
    })
  }

  pub fn into_user(self) -> Result<User> {
    Ok(User {
      id:         decode_uuid(&self.id)?,
      org_id:     decode_uuid(&self.org_id)?,
      name:       self.name,
      role:       decode_enum(&self.role)?,
      reports_to: decode_opt_uuid(self.reports_to)?,
      is_active:  self.is_active,
      created_at: decode_dt(&self.created_at)?,
    })
  }
}

/// Raw values read directly from an `integrations` row.
pub struct RawIntegration {
  pub id:            String,
  pub org_id:        String,
  pub platform:      String,
  pub credentials:   String,
  pub config:        String,
  pub is_active:     bool,
  pub sync_status:   String,
  pub last_sync_at:  Option<String>,
  pub error_message: Option<String>,
  pub created_by:    String,
  pub created_at:    String,
  pub updated_at:    String,
}

impl RawIntegration {
  pub fn read(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      id:            row.get(0)?,
      org_id:        row.get(1)?,
      platform:      row.get(2)?,
      credentials:   row.get(3)?,
      config:        row.get(4)?,
      is_active:     row.get(5)?,
      sync_status:   row.get(6)?,
      last_sync_at:  row.get(7)?,
      error_message: row.get(8)?,
      created_by:    row.get(9)?,
      created_at:    row.get(10)?,
      updated_at:    row.get(11)?,
    })
  }

  pub fn into_integration(self) -> Result<Integration> {
    Ok(Integration {
      id:          decode_uuid(&self.id)?,
      org_id:      decode_uuid(&self.org_id)?,
      platform:    decode_enum(&self.platform)?,
      credentials: decode_json(&self.credentials)?,
      config:      decode_json(&self.config)?,
      is_active:   self.is_active,
      sync:        SyncState {
        status:        decode_enum(&self.sync_status)?,
        last_sync_at:  decode_opt_dt(self.last_sync_at)?,
        error_message: self.error_message,
      },
      created_by:  decode_uuid(&self.created_by)?,
      created_at:  decode_dt(&self.created_at)?,
      updated_at:  decode_dt(&self.updated_at)?,
    })
  }
}

/// Raw values read directly from an `assignment_rules` row.
pub struct RawRule {
  pub id:             String,
  pub org_id:         String,
  pub integration_id: String,
  pub external_id:    String,
  pub assigned_to:    String,
  pub is_active:      bool,
  pub created_at:     String,
  pub updated_at:     String,
}

impl RawRule {
  pub fn read(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      id:             row.get(0)?,
      org_id:         row.get(1)?,
      integration_id: row.get(2)?,
      external_id:    row.get(3)?,
      assigned_to:    row.get(4)?,
      is_active:      row.get(5)?,
      created_at:     row.get(6)?,
      updated_at:     row.get(7)?,
    })
  }

  pub fn into_rule(self) -> Result<AssignmentRule> {
    Ok(AssignmentRule {
      id:             decode_uuid(&self.id)?,
      org_id:         decode_uuid(&self.org_id)?,
      integration_id: decode_uuid(&self.integration_id)?,
      external_id:    self.external_id,
      assigned_to:    decode_uuid(&self.assigned_to)?,
      is_active:      self.is_active,
      created_at:     decode_dt(&self.created_at)?,
      updated_at:     decode_dt(&self.updated_at)?,
    })
  }
}

/// Raw values read directly from a `sync_logs` row.
pub struct RawSyncLog {
  pub id:             String,
  pub integration_id: String,
  pub sync_type:      String,
  pub status:         String,
  pub leads_created:  u32,
  pub leads_updated:  u32,
  pub error_message:  Option<String>,
  pub errors:         String,
  pub created_at:     String,
}

impl RawSyncLog {
  pub fn read(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      id:             row.get(0)?,
      integration_id: row.get(1)?,
      sync_type:      row.get(2)?,
      status:         row.get(3)?,
      leads_created:  row.get(4)?,
      leads_updated:  row.get(5)?,
      error_message:  row.get(6)?,
      errors:         row.get(7)?,
      created_at:     row.get(8)?,
    })
  }

  pub fn into_sync_log(self) -> Result<SyncLog> {
    Ok(SyncLog {
      id:             decode_uuid(&self.id)?,
      integration_id: decode_uuid(&self.integration_id)?,
      sync_type:      decode_enum(&self.sync_type)?,
      status:         decode_enum(&self.status)?,
      leads_created:  self.leads_created,
      leads_updated:  self.leads_updated,
      error_message:  self.error_message,
      errors:         decode_json(&self.errors)?,
      created_at:     decode_dt(&self.created_at)?,
    })
  }
}

/// Raw values read directly from a `call_logs` row.
pub struct RawCallLog {
  pub id:            String,
  pub org_id:        String,
  pub user_id:       String,
  pub lead_id:       Option<String>,
  pub phone:         String,
  pub direction:     String,
  pub started_at:    String,
  pub duration_secs: u32,
  pub created_at:    String,
}

impl RawCallLog {
  pub fn read(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      id:            row.get(0)?,
      org_id:        row.get(1)?,
      user_id:       row.get(2)?,
      lead_id:       row.get(3)?,
      phone:         row.get(4)?,
      direction:     row.get(5)?,
      started_at:    row.get(6)?,
      duration_secs: row.get(7)?,
      created_at:    row.get(8)?,
    })
  }

  pub fn into_call_log(self) -> Result<CallLog> {
    Ok(CallLog {
      id:            decode_uuid(&self.id)?,
      org_id:        decode_uuid(&self.org_id)?,
      user_id:       decode_uuid(&self.user_id)?,
      lead_id:       decode_opt_uuid(self.lead_id)?,
      phone:         self.phone,
      direction:     decode_enum(&self.direction)?,
      started_at:    decode_dt(&self.started_at)?,
      duration_secs: self.duration_secs,
      created_at:    decode_dt(&self.created_at)?,
    })
  }
}
