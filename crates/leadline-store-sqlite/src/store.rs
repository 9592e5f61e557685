//! [`SqliteStore`], the SQLite implementation of [`LeadStore`].

use std::path::Path;

use chrono::{DateTime, Utc};
use rusqlite::{OptionalExtension as _, types::Value};
use uuid::Uuid;

use leadline_core::{
  call::{CallLog, NewCallLog},
  integration::{
    Credentials, Integration, NewIntegration, NewSyncLog, SyncCompletion,
    SyncLog, SyncState, SyncStatus,
  },
  lead::{Lead, NewLead},
  phone,
  routing::{AssignmentRule, NewAssignmentRule},
  store::{CallWindowQuery, LeadQuery, LeadStore, PhoneCandidateQuery},
  user::{NewUser, User},
};

use crate::{
  encode::{
    CALL_LOG_COLUMNS, INTEGRATION_COLUMNS, LEAD_COLUMNS, RULE_COLUMNS,
    RawCallLog, RawIntegration, RawLead, RawRule, RawSyncLog, RawUser,
    SYNC_LOG_COLUMNS, USER_COLUMNS, decode_uuid, encode_dt, encode_json,
    encode_uuid,
  },
  schema::SCHEMA,
  Error, Result,
};

/// Default page size for [`LeadStore::list_leads`].
const DEFAULT_LIST_LIMIT: usize = 100;

// ─── Store ───────────────────────────────────────────────────────────────────

/// A Leadline store backed by a single SQLite file.
///
/// Cloning is cheap; the inner connection is reference-counted.
#[derive(Clone)]
pub struct SqliteStore {
  conn: tokio_rusqlite::Connection,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an in-memory store for tests.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  async fn get_rule(&self, id: Uuid) -> Result<Option<AssignmentRule>> {
    let id_str = encode_uuid(id);

    let raw: Option<RawRule> = self
      .conn
      .call(move |conn| {
        Ok(conn
          .query_row(
            &format!("SELECT {RULE_COLUMNS} FROM assignment_rules WHERE id = ?1"),
            rusqlite::params![id_str],
            RawRule::read,
          )
          .optional()?)
      })
      .await?;

    raw.map(RawRule::into_rule).transpose()
  }
}

/// `?, ?, ...` with `n` placeholders.
fn placeholders(n: usize) -> String { vec!["?"; n].join(", ") }

// ─── LeadStore impl ──────────────────────────────────────────────────────────

impl LeadStore for SqliteStore {
  type Error = Error;

  // ── Leads ─────────────────────────────────────────────────────────────────

  async fn insert_lead(&self, input: NewLead) -> Result<Lead> {
    let now = Utc::now();
    let lead = Lead {
      id:             Uuid::new_v4(),
      org_id:         input.org_id,
      external_id:    input.external_id,
      name:           input.name,
      phone:          input.phone,
      email:          input.email,
      company:        input.company,
      source:         input.source,
      integration_id: input.integration_id,
      assigned_to:    input.assigned_to,
      created_by:     input.created_by,
      status:         input.status,
      metadata:       input.metadata,
      custom_fields:  input.custom_fields,
      created_at:     input.created_at,
      updated_at:     now,
    };

    let params: Vec<Value> = vec![
      Value::Text(encode_uuid(lead.id)),
      Value::Text(encode_uuid(lead.org_id)),
      lead.external_id.clone().map_or(Value::Null, Value::Text),
      Value::Text(lead.name.clone()),
      lead.phone.clone().map_or(Value::Null, Value::Text),
      lead
        .phone
        .as_deref()
        .map_or(Value::Null, |p| Value::Text(phone::digits_of(p))),
      lead.email.clone().map_or(Value::Null, Value::Text),
      lead.company.clone().map_or(Value::Null, Value::Text),
      Value::Text(lead.source.as_str().to_owned()),
      lead
        .integration_id
        .map_or(Value::Null, |id| Value::Text(encode_uuid(id))),
      lead
        .assigned_to
        .map_or(Value::Null, |id| Value::Text(encode_uuid(id))),
      lead
        .created_by
        .map_or(Value::Null, |id| Value::Text(encode_uuid(id))),
      Value::Text(lead.status.as_str().to_owned()),
      Value::Text(encode_json(&lead.metadata)?),
      Value::Text(encode_json(&lead.custom_fields)?),
      Value::Text(encode_dt(lead.created_at)),
      Value::Text(encode_dt(lead.updated_at)),
    ];

    let inserted = self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO leads (
             id, org_id, external_id, name, phone, phone_digits, email,
             company, source, integration_id, assigned_to, created_by, status,
             metadata, custom_fields, created_at, updated_at
           ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13,
                     ?14, ?15, ?16, ?17)",
          rusqlite::params_from_iter(params),
        )?;
        Ok(())
      })
      .await
      .map_err(Error::from);

    match inserted {
      Ok(()) => Ok(lead),
      Err(e) if e.is_unique_violation() => Err(Error::DuplicateExternalId {
        org_id:      lead.org_id,
        external_id: lead.external_id.unwrap_or_default(),
      }),
      Err(e) => Err(e),
    }
  }

  async fn find_lead_by_external_id(
    &self,
    org_id:      Uuid,
    external_id: &str,
  ) -> Result<Option<Lead>> {
    let org_str = encode_uuid(org_id);
    let ext = external_id.to_owned();

    let raw: Option<RawLead> = self
      .conn
      .call(move |conn| {
        Ok(conn
          .query_row(
            &format!(
              "SELECT {LEAD_COLUMNS} FROM leads
               WHERE org_id = ?1 AND external_id = ?2"
            ),
            rusqlite::params![org_str, ext],
            RawLead::read,
          )
          .optional()?)
      })
      .await?;

    raw.map(RawLead::into_lead).transpose()
  }

  async fn phone_candidates(&self, query: &PhoneCandidateQuery) -> Result<Vec<Lead>> {
    let org_str = encode_uuid(query.org_id);
    let pattern = query.digits_suffix.as_deref().map(|s| format!("%{s}"));
    let limit_val = query.limit as i64;
    let offset_val = query.offset as i64;

    let raws: Vec<RawLead> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {LEAD_COLUMNS} FROM leads
           WHERE org_id = ?1
             AND phone IS NOT NULL
             AND (?2 IS NULL OR phone_digits LIKE ?2)
           ORDER BY created_at DESC, rowid DESC
           LIMIT ?3 OFFSET ?4"
        ))?;
        let rows = stmt
          .query_map(
            rusqlite::params![org_str, pattern, limit_val, offset_val],
            RawLead::read,
          )?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawLead::into_lead).collect()
  }

  async fn get_leads(&self, org_id: Uuid, ids: &[Uuid]) -> Result<Vec<Lead>> {
    if ids.is_empty() {
      return Ok(Vec::new());
    }

    let mut params = vec![Value::Text(encode_uuid(org_id))];
    params.extend(ids.iter().map(|id| Value::Text(encode_uuid(*id))));
    let sql = format!(
      "SELECT {LEAD_COLUMNS} FROM leads WHERE org_id = ? AND id IN ({})",
      placeholders(ids.len())
    );

    let raws: Vec<RawLead> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
          .query_map(rusqlite::params_from_iter(params), RawLead::read)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawLead::into_lead).collect()
  }

  async fn list_leads(&self, query: &LeadQuery) -> Result<Vec<Lead>> {
    let mut sql = format!("SELECT {LEAD_COLUMNS} FROM leads WHERE org_id = ?");
    let mut params = vec![Value::Text(encode_uuid(query.org_id))];

    if let Some(user) = query.assigned_to {
      sql.push_str(" AND assigned_to = ?");
      params.push(Value::Text(encode_uuid(user)));
    }
    if let Some(user) = query.created_by {
      sql.push_str(" AND created_by = ?");
      params.push(Value::Text(encode_uuid(user)));
    }
    if let Some(users) = &query.visible_to {
      if users.is_empty() {
        return Ok(Vec::new());
      }
      let marks = placeholders(users.len());
      sql.push_str(&format!(
        " AND (assigned_to IN ({marks}) OR created_by IN ({marks}))"
      ));
      for _ in 0..2 {
        params.extend(users.iter().map(|id| Value::Text(encode_uuid(*id))));
      }
    }
    if query.unassigned_only {
      sql.push_str(" AND assigned_to IS NULL");
    }
    sql.push_str(" ORDER BY created_at DESC, rowid DESC LIMIT ? OFFSET ?");
    params.push(Value::Integer(query.limit.unwrap_or(DEFAULT_LIST_LIMIT) as i64));
    params.push(Value::Integer(query.offset.unwrap_or(0) as i64));

    let raws: Vec<RawLead> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
          .query_map(rusqlite::params_from_iter(params), RawLead::read)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawLead::into_lead).collect()
  }

  async fn assign_leads(
    &self,
    org_id:      Uuid,
    ids:         &[Uuid],
    assigned_to: Option<Uuid>,
  ) -> Result<u64> {
    if ids.is_empty() {
      return Ok(0);
    }

    let mut params = vec![
      assigned_to.map_or(Value::Null, |id| Value::Text(encode_uuid(id))),
      Value::Text(encode_dt(Utc::now())),
      Value::Text(encode_uuid(org_id)),
    ];
    params.extend(ids.iter().map(|id| Value::Text(encode_uuid(*id))));
    let sql = format!(
      "UPDATE leads SET assigned_to = ?, updated_at = ?
       WHERE org_id = ? AND id IN ({})",
      placeholders(ids.len())
    );

    let changed = self
      .conn
      .call(move |conn| Ok(conn.execute(&sql, rusqlite::params_from_iter(params))?))
      .await?;

    Ok(changed as u64)
  }

  // ── Users ─────────────────────────────────────────────────────────────────

  async fn add_user(&self, input: NewUser) -> Result<User> {
    let user = User {
      id:         Uuid::new_v4(),
      org_id:     input.org_id,
      name:       input.name,
      role:       input.role,
      reports_to: input.reports_to,
      is_active:  input.is_active,
      created_at: Utc::now(),
    };

    let id_str = encode_uuid(user.id);
    let org_str = encode_uuid(user.org_id);
    let name = user.name.clone();
    let role = user.role.as_str();
    let reports_str = user.reports_to.map(encode_uuid);
    let active = user.is_active;
    let at_str = encode_dt(user.created_at);

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO users (id, org_id, name, role, reports_to, is_active, created_at)
           VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
          rusqlite::params![id_str, org_str, name, role, reports_str, active, at_str],
        )?;
        Ok(())
      })
      .await?;

    Ok(user)
  }

  async fn get_user(&self, id: Uuid) -> Result<Option<User>> {
    let id_str = encode_uuid(id);

    let raw: Option<RawUser> = self
      .conn
      .call(move |conn| {
        Ok(conn
          .query_row(
            &format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?1"),
            rusqlite::params![id_str],
            RawUser::read,
          )
          .optional()?)
      })
      .await?;

    raw.map(RawUser::into_user).transpose()
  }

  async fn list_users(&self, org_id: Uuid) -> Result<Vec<User>> {
    let org_str = encode_uuid(org_id);

    let raws: Vec<RawUser> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {USER_COLUMNS} FROM users WHERE org_id = ?1 ORDER BY created_at"
        ))?;
        let rows = stmt
          .query_map(rusqlite::params![org_str], RawUser::read)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawUser::into_user).collect()
  }

  // ── Integrations & sync state ─────────────────────────────────────────────

  async fn add_integration(&self, input: NewIntegration) -> Result<Integration> {
    let now = Utc::now();
    let integration = Integration {
      id:          Uuid::new_v4(),
      org_id:      input.org_id,
      platform:    input.platform,
      credentials: input.credentials,
      config:      input.config,
      is_active:   true,
      sync:        SyncState::default(),
      created_by:  input.created_by,
      created_at:  now,
      updated_at:  now,
    };

    let id_str = encode_uuid(integration.id);
    let org_str = encode_uuid(integration.org_id);
    let platform = integration.platform.as_str();
    let credentials = encode_json(&integration.credentials)?;
    let config = encode_json(&integration.config)?;
    let status = integration.sync.status.as_str();
    let created_by = encode_uuid(integration.created_by);
    let at_str = encode_dt(now);

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO integrations (
             id, org_id, platform, credentials, config, is_active,
             sync_status, created_by, created_at, updated_at
           ) VALUES (?1, ?2, ?3, ?4, ?5, 1, ?6, ?7, ?8, ?8)",
          rusqlite::params![
            id_str,
            org_str,
            platform,
            credentials,
            config,
            status,
            created_by,
            at_str,
          ],
        )?;
        Ok(())
      })
      .await?;

    Ok(integration)
  }

  async fn get_integration(&self, id: Uuid) -> Result<Option<Integration>> {
    let id_str = encode_uuid(id);

    let raw: Option<RawIntegration> = self
      .conn
      .call(move |conn| {
        Ok(conn
          .query_row(
            &format!("SELECT {INTEGRATION_COLUMNS} FROM integrations WHERE id = ?1"),
            rusqlite::params![id_str],
            RawIntegration::read,
          )
          .optional()?)
      })
      .await?;

    raw.map(RawIntegration::into_integration).transpose()
  }

  async fn list_pollable_integrations(
    &self,
    stale_before: DateTime<Utc>,
  ) -> Result<Vec<Integration>> {
    let syncing = SyncStatus::Syncing.as_str();
    let stale_str = encode_dt(stale_before);

    let raws: Vec<RawIntegration> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {INTEGRATION_COLUMNS} FROM integrations
           WHERE is_active = 1 AND (sync_status != ?1 OR updated_at < ?2)
           ORDER BY created_at"
        ))?;
        let rows = stmt
          .query_map(rusqlite::params![syncing, stale_str], RawIntegration::read)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws
      .into_iter()
      .map(RawIntegration::into_integration)
      .collect()
  }

  async fn try_begin_sync(&self, id: Uuid, stale_before: DateTime<Utc>) -> Result<bool> {
    let id_str = encode_uuid(id);
    let syncing = SyncStatus::Syncing.as_str();
    let at_str = encode_dt(Utc::now());
    let stale_str = encode_dt(stale_before);

    // Single conditional UPDATE: the row-count is the lock result.
    let changed = self
      .conn
      .call(move |conn| {
        Ok(conn.execute(
          "UPDATE integrations SET sync_status = ?2, updated_at = ?3
           WHERE id = ?1 AND is_active = 1
             AND (sync_status != ?2 OR updated_at < ?4)",
          rusqlite::params![id_str, syncing, at_str, stale_str],
        )?)
      })
      .await?;

    Ok(changed == 1)
  }

  async fn finish_sync(&self, id: Uuid, completion: SyncCompletion) -> Result<()> {
    let id_str = encode_uuid(id);
    let status = completion.status.as_str();
    let message = completion.error_message;
    let watermark = completion.last_sync_at.map(encode_dt);
    let at_str = encode_dt(Utc::now());

    let changed = self
      .conn
      .call(move |conn| {
        Ok(conn.execute(
          "UPDATE integrations
           SET sync_status   = ?2,
               error_message = ?3,
               last_sync_at  = COALESCE(?4, last_sync_at),
               updated_at    = ?5
           WHERE id = ?1",
          rusqlite::params![id_str, status, message, watermark, at_str],
        )?)
      })
      .await?;

    if changed == 0 {
      return Err(Error::IntegrationNotFound(id));
    }
    Ok(())
  }

  async fn update_credentials(&self, id: Uuid, credentials: Credentials) -> Result<()> {
    let id_str = encode_uuid(id);
    let creds = encode_json(&credentials)?;
    let at_str = encode_dt(Utc::now());

    let changed = self
      .conn
      .call(move |conn| {
        Ok(conn.execute(
          "UPDATE integrations SET credentials = ?2, updated_at = ?3 WHERE id = ?1",
          rusqlite::params![id_str, creds, at_str],
        )?)
      })
      .await?;

    if changed == 0 {
      return Err(Error::IntegrationNotFound(id));
    }
    Ok(())
  }

  async fn delete_integration(&self, id: Uuid) -> Result<bool> {
    let id_str = encode_uuid(id);

    let changed = self
      .conn
      .call(move |conn| {
        Ok(conn.execute(
          "DELETE FROM integrations WHERE id = ?1",
          rusqlite::params![id_str],
        )?)
      })
      .await?;

    Ok(changed > 0)
  }

  // ── Assignment rules ──────────────────────────────────────────────────────

  async fn upsert_assignment_rule(
    &self,
    input: NewAssignmentRule,
  ) -> Result<AssignmentRule> {
    let new_id = encode_uuid(Uuid::new_v4());
    let org_str = encode_uuid(input.org_id);
    let integration_str = encode_uuid(input.integration_id);
    let ext = input.external_id;
    let assignee = encode_uuid(input.assigned_to);
    let active = input.is_active;
    let at_str = encode_dt(Utc::now());

    let id_str: String = self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO assignment_rules (
             id, org_id, integration_id, external_id, assigned_to, is_active,
             created_at, updated_at
           ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?7)
           ON CONFLICT (org_id, integration_id, external_id) DO UPDATE SET
             assigned_to = excluded.assigned_to,
             is_active   = excluded.is_active,
             updated_at  = excluded.updated_at",
          rusqlite::params![
            new_id,
            org_str,
            integration_str,
            ext,
            assignee,
            active,
            at_str,
          ],
        )?;
        Ok(conn.query_row(
          "SELECT id FROM assignment_rules
           WHERE org_id = ?1 AND integration_id = ?2 AND external_id = ?3",
          rusqlite::params![org_str, integration_str, ext],
          |r| r.get(0),
        )?)
      })
      .await?;

    let id = decode_uuid(&id_str)?;
    self
      .get_rule(id)
      .await?
      .ok_or(Error::IntegrationNotFound(input.integration_id))
  }

  async fn find_assignment_rule(
    &self,
    org_id:         Uuid,
    integration_id: Uuid,
    external_id:    &str,
  ) -> Result<Option<AssignmentRule>> {
    let org_str = encode_uuid(org_id);
    let integration_str = encode_uuid(integration_id);
    let ext = external_id.to_owned();

    let raw: Option<RawRule> = self
      .conn
      .call(move |conn| {
        Ok(conn
          .query_row(
            &format!(
              "SELECT {RULE_COLUMNS} FROM assignment_rules
               WHERE org_id = ?1 AND integration_id = ?2 AND external_id = ?3"
            ),
            rusqlite::params![org_str, integration_str, ext],
            RawRule::read,
          )
          .optional()?)
      })
      .await?;

    raw.map(RawRule::into_rule).transpose()
  }

  async fn list_assignment_rules(
    &self,
    integration_id: Uuid,
  ) -> Result<Vec<AssignmentRule>> {
    let integration_str = encode_uuid(integration_id);

    let raws: Vec<RawRule> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {RULE_COLUMNS} FROM assignment_rules
           WHERE integration_id = ?1 ORDER BY external_id"
        ))?;
        let rows = stmt
          .query_map(rusqlite::params![integration_str], RawRule::read)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawRule::into_rule).collect()
  }

  async fn delete_assignment_rule(&self, id: Uuid) -> Result<bool> {
    let id_str = encode_uuid(id);

    let changed = self
      .conn
      .call(move |conn| {
        Ok(conn.execute(
          "DELETE FROM assignment_rules WHERE id = ?1",
          rusqlite::params![id_str],
        )?)
      })
      .await?;

    Ok(changed > 0)
  }

  // ── Sync log ──────────────────────────────────────────────────────────────

  async fn append_sync_log(&self, input: NewSyncLog) -> Result<SyncLog> {
    let log = SyncLog {
      id:             Uuid::new_v4(),
      integration_id: input.integration_id,
      sync_type:      input.sync_type,
      status:         input.status,
      leads_created:  input.leads_created,
      leads_updated:  input.leads_updated,
      error_message:  input.error_message,
      errors:         input.errors,
      created_at:     Utc::now(),
    };

    let id_str = encode_uuid(log.id);
    let integration_str = encode_uuid(log.integration_id);
    let sync_type = log.sync_type.as_str();
    let status = log.status.as_str();
    let created = log.leads_created;
    let updated = log.leads_updated;
    let message = log.error_message.clone();
    let errors = encode_json(&log.errors)?;
    let at_str = encode_dt(log.created_at);

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO sync_logs (
             id, integration_id, sync_type, status, leads_created,
             leads_updated, error_message, errors, created_at
           ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
          rusqlite::params![
            id_str,
            integration_str,
            sync_type,
            status,
            created,
            updated,
            message,
            errors,
            at_str,
          ],
        )?;
        Ok(())
      })
      .await?;

    Ok(log)
  }

  async fn list_sync_logs(&self, integration_id: Uuid, limit: usize) -> Result<Vec<SyncLog>> {
    let integration_str = encode_uuid(integration_id);
    let limit_val = limit as i64;

    let raws: Vec<RawSyncLog> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {SYNC_LOG_COLUMNS} FROM sync_logs
           WHERE integration_id = ?1
           ORDER BY created_at DESC, rowid DESC
           LIMIT ?2"
        ))?;
        let rows = stmt
          .query_map(rusqlite::params![integration_str, limit_val], RawSyncLog::read)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawSyncLog::into_sync_log).collect()
  }

  // ── Call logs ─────────────────────────────────────────────────────────────

  async fn insert_call_log(&self, input: NewCallLog) -> Result<CallLog> {
    let log = CallLog {
      id:            Uuid::new_v4(),
      org_id:        input.org_id,
      user_id:       input.user_id,
      lead_id:       input.lead_id,
      phone:         input.phone,
      direction:     input.direction,
      started_at:    input.started_at,
      duration_secs: input.duration_secs,
      created_at:    Utc::now(),
    };

    let id_str = encode_uuid(log.id);
    let org_str = encode_uuid(log.org_id);
    let user_str = encode_uuid(log.user_id);
    let lead_str = log.lead_id.map(encode_uuid);
    let phone = log.phone.clone();
    let direction = log.direction.as_str();
    let started = encode_dt(log.started_at);
    let duration = log.duration_secs;
    let at_str = encode_dt(log.created_at);

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO call_logs (
             id, org_id, user_id, lead_id, phone, direction, started_at,
             duration_secs, created_at
           ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
          rusqlite::params![
            id_str, org_str, user_str, lead_str, phone, direction, started,
            duration, at_str,
          ],
        )?;
        Ok(())
      })
      .await?;

    Ok(log)
  }

  async fn call_logs_in_window(&self, query: &CallWindowQuery) -> Result<Vec<CallLog>> {
    let user_str = encode_uuid(query.user_id);
    let phone = query.phone.clone();
    let from = encode_dt(query.from);
    let to = encode_dt(query.to);

    let raws: Vec<RawCallLog> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {CALL_LOG_COLUMNS} FROM call_logs
           WHERE user_id = ?1 AND phone = ?2
             AND started_at >= ?3 AND started_at <= ?4
           ORDER BY started_at"
        ))?;
        let rows = stmt
          .query_map(rusqlite::params![user_str, phone, from, to], RawCallLog::read)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawCallLog::into_call_log).collect()
  }
}
