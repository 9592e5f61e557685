//! The `LeadStore` trait and supporting query types.
//!
//! The trait is implemented by storage backends (e.g. `leadline-store-sqlite`).
//! The ingestion pipeline and the HTTP layer depend on this abstraction, not
//! on any concrete backend.

use std::future::Future;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::{
  call::{CallLog, NewCallLog},
  integration::{Credentials, Integration, NewIntegration, NewSyncLog, SyncCompletion, SyncLog},
  lead::{Lead, NewLead},
  routing::{AssignmentRule, NewAssignmentRule},
  user::{NewUser, User},
};

// ─── Query types ─────────────────────────────────────────────────────────────

/// One page of phone-dedupe candidates for [`LeadStore::phone_candidates`].
///
/// Backends return leads of `org_id` with a non-null phone, newest first.
/// `digits_suffix` narrows the page to phones whose digits end with it; it
/// is a prefilter only and the caller re-checks every row.
#[derive(Debug, Clone)]
pub struct PhoneCandidateQuery {
  pub org_id:        Uuid,
  pub digits_suffix: Option<String>,
  pub limit:         usize,
  pub offset:        usize,
}

/// Parameters for [`LeadStore::list_leads`]. Filters combine with AND.
#[derive(Debug, Clone, Default)]
pub struct LeadQuery {
  pub org_id:          Uuid,
  pub assigned_to:     Option<Uuid>,
  pub created_by:      Option<Uuid>,
  /// Only leads assigned to or created by one of these users.
  pub visible_to:      Option<Vec<Uuid>>,
  pub unassigned_only: bool,
  pub limit:           Option<usize>,
  pub offset:          Option<usize>,
}

/// Call logs of one user and phone that started within `[from, to]`.
#[derive(Debug, Clone)]
pub struct CallWindowQuery {
  pub user_id: Uuid,
  pub phone:   String,
  pub from:    DateTime<Utc>,
  pub to:      DateTime<Utc>,
}

// ─── Trait ───────────────────────────────────────────────────────────────────

/// Abstraction over a Leadline storage backend.
///
/// Backends must enforce uniqueness of `(org_id, external_id)` on leads and
/// of `(org_id, integration_id, external_id)` on assignment rules at the
/// schema level. Deleting an integration cascades to its rules and logs.
///
/// All methods return `Send` futures so the trait can be used in multi-threaded
/// async runtimes (e.g. tokio with `axum`).
pub trait LeadStore: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  // ── Leads ─────────────────────────────────────────────────────────────

  /// Persist a lead. Fails if its `(org_id, external_id)` is taken.
  fn insert_lead(
    &self,
    input: NewLead,
  ) -> impl Future<Output = Result<Lead, Self::Error>> + Send + '_;

  fn find_lead_by_external_id<'a>(
    &'a self,
    org_id: Uuid,
    external_id: &'a str,
  ) -> impl Future<Output = Result<Option<Lead>, Self::Error>> + Send + 'a;

  fn phone_candidates<'a>(
    &'a self,
    query: &'a PhoneCandidateQuery,
  ) -> impl Future<Output = Result<Vec<Lead>, Self::Error>> + Send + 'a;

  /// Fetch the given leads of one org in a single read. Ids that do not
  /// exist (or belong to another org) are absent from the result.
  fn get_leads<'a>(
    &'a self,
    org_id: Uuid,
    ids: &'a [Uuid],
  ) -> impl Future<Output = Result<Vec<Lead>, Self::Error>> + Send + 'a;

  fn list_leads<'a>(
    &'a self,
    query: &'a LeadQuery,
  ) -> impl Future<Output = Result<Vec<Lead>, Self::Error>> + Send + 'a;

  /// Set `assigned_to` on every listed lead of `org_id`. Returns the number
  /// of rows changed.
  fn assign_leads<'a>(
    &'a self,
    org_id: Uuid,
    ids: &'a [Uuid],
    assigned_to: Option<Uuid>,
  ) -> impl Future<Output = Result<u64, Self::Error>> + Send + 'a;

  // ── Users ─────────────────────────────────────────────────────────────

  fn add_user(
    &self,
    input: NewUser,
  ) -> impl Future<Output = Result<User, Self::Error>> + Send + '_;

  fn get_user(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Option<User>, Self::Error>> + Send + '_;

  fn list_users(
    &self,
    org_id: Uuid,
  ) -> impl Future<Output = Result<Vec<User>, Self::Error>> + Send + '_;

  // ── Integrations & sync state ─────────────────────────────────────────

  fn add_integration(
    &self,
    input: NewIntegration,
  ) -> impl Future<Output = Result<Integration, Self::Error>> + Send + '_;

  fn get_integration(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Option<Integration>, Self::Error>> + Send + '_;

  /// Active integrations not currently syncing. A `syncing` row last
  /// touched before `stale_before` counts as abandoned and is included.
  fn list_pollable_integrations(
    &self,
    stale_before: DateTime<Utc>,
  ) -> impl Future<Output = Result<Vec<Integration>, Self::Error>> + Send + '_;

  /// Atomically move an active integration into `syncing`. Returns `false`
  /// if it was already syncing, inactive, or missing; exactly one of any
  /// number of concurrent callers can get `true`. A `syncing` row last
  /// touched before `stale_before` is taken over.
  fn try_begin_sync(
    &self,
    id: Uuid,
    stale_before: DateTime<Utc>,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + '_;

  /// Leave `syncing`, recording the outcome and optionally a new watermark.
  fn finish_sync(
    &self,
    id: Uuid,
    completion: SyncCompletion,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  fn update_credentials(
    &self,
    id: Uuid,
    credentials: Credentials,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  /// Returns `false` if no such integration existed.
  fn delete_integration(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + '_;

  // ── Assignment rules ──────────────────────────────────────────────────

  /// Insert or replace the rule for its natural key. Last write wins.
  fn upsert_assignment_rule(
    &self,
    input: NewAssignmentRule,
  ) -> impl Future<Output = Result<AssignmentRule, Self::Error>> + Send + '_;

  fn find_assignment_rule<'a>(
    &'a self,
    org_id: Uuid,
    integration_id: Uuid,
    external_id: &'a str,
  ) -> impl Future<Output = Result<Option<AssignmentRule>, Self::Error>> + Send + 'a;

  fn list_assignment_rules(
    &self,
    integration_id: Uuid,
  ) -> impl Future<Output = Result<Vec<AssignmentRule>, Self::Error>> + Send + '_;

  fn delete_assignment_rule(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + '_;

  // ── Sync log ──────────────────────────────────────────────────────────

  fn append_sync_log(
    &self,
    input: NewSyncLog,
  ) -> impl Future<Output = Result<SyncLog, Self::Error>> + Send + '_;

  /// Newest first.
  fn list_sync_logs(
    &self,
    integration_id: Uuid,
    limit: usize,
  ) -> impl Future<Output = Result<Vec<SyncLog>, Self::Error>> + Send + '_;

  // ── Call logs ─────────────────────────────────────────────────────────

  fn insert_call_log(
    &self,
    input: NewCallLog,
  ) -> impl Future<Output = Result<CallLog, Self::Error>> + Send + '_;

  fn call_logs_in_window<'a>(
    &'a self,
    query: &'a CallWindowQuery,
  ) -> impl Future<Output = Result<Vec<CallLog>, Self::Error>> + Send + 'a;
}
