//! The per-lead pipeline and batch aggregation.
//!
//! Each raw lead runs map → external-id dedupe → validate → phone dedupe →
//! assign → insert on its own. Leads run concurrently up to the configured
//! fan-out, and their outcomes are folded into an order-independent
//! [`BatchOutcome`]. No per-lead failure escapes the batch.

use std::{
  collections::HashMap,
  sync::{Arc, Mutex, PoisonError},
};

use futures::{StreamExt as _, stream};
use leadline_core::{
  integration::{Integration, SyncLogStatus},
  lead::{Lead, NewLead, RawLeadData},
  mapper::{LeadOrigin, PhonePolicy, ValidationIssue, map_lead, validate_mapped_lead},
  phone,
  store::LeadStore,
};
use serde::Serialize;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use uuid::Uuid;

use crate::{
  Ingestor,
  assign::resolve_assignment,
  dedupe::{find_by_external_id, find_duplicate},
};

// ─── Context ─────────────────────────────────────────────────────────────────

/// How a lead that lacks a phone is reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MissingPhone {
  /// As a validation error in `errors`.
  Error,
  /// Counted in `skipped_missing_phone`; used by the preview import, whose
  /// operators need the reason spelled out.
  Skip,
}

/// Everything the pipeline needs to know about where a batch came from.
#[derive(Debug, Clone, Copy)]
pub struct BatchContext<'a> {
  pub org_id:        Uuid,
  pub origin:        LeadOrigin,
  pub integration:   Option<&'a Integration>,
  /// Becomes `created_by` on every lead of the batch.
  pub accountable:   Uuid,
  pub phone_policy:  PhonePolicy,
  pub missing_phone: MissingPhone,
}

impl<'a> BatchContext<'a> {
  /// An automated run on behalf of `integration`.
  pub fn for_integration(integration: &'a Integration) -> Self {
    Self {
      org_id:        integration.org_id,
      origin:        LeadOrigin::integration(integration),
      integration:   Some(integration),
      accountable:   integration.created_by,
      phone_policy:  PhonePolicy::Required,
      missing_phone: MissingPhone::Error,
    }
  }
}

// ─── Outcomes ────────────────────────────────────────────────────────────────

/// What happened to one raw lead.
#[derive(Debug, Clone)]
pub enum LeadOutcome {
  Created(Lead),
  /// `existing` is the stored lead it matched, possibly one created earlier
  /// in the same batch.
  Duplicate { existing: Uuid },
  MissingPhone,
  /// `"<external id or #position>: <reason>"`.
  Failed(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchStatus {
  #[default]
  Completed,
  Partial,
  Failed,
}

impl BatchStatus {
  pub fn sync_log_status(self) -> SyncLogStatus {
    match self {
      Self::Completed => SyncLogStatus::Success,
      Self::Partial => SyncLogStatus::Partial,
      Self::Failed => SyncLogStatus::Error,
    }
  }
}

/// Aggregate result of one batch, as returned to operators.
#[derive(Debug, Clone, Default, Serialize)]
pub struct BatchOutcome {
  pub created:               u32,
  pub skipped_duplicates:    u32,
  pub skipped_missing_phone: u32,
  /// The first `max_logged_errors` error strings.
  pub errors:                Vec<String>,
  /// All errors, including those not kept in `errors`.
  pub error_count:           u32,
  pub status:                BatchStatus,
}

impl BatchOutcome {
  pub(crate) fn record(&mut self, outcome: LeadOutcome, cap: usize) {
    match outcome {
      LeadOutcome::Created(_) => self.created += 1,
      LeadOutcome::Duplicate { .. } => self.skipped_duplicates += 1,
      LeadOutcome::MissingPhone => self.skipped_missing_phone += 1,
      LeadOutcome::Failed(message) => {
        self.error_count += 1;
        if self.errors.len() < cap {
          self.errors.push(message);
        }
      }
    }
  }

  pub(crate) fn finish(mut self) -> Self {
    let settled = self.created + self.skipped_duplicates + self.skipped_missing_phone;
    self.status = match (self.error_count, settled) {
      (0, _) => BatchStatus::Completed,
      (_, 0) => BatchStatus::Failed,
      _ => BatchStatus::Partial,
    };
    self
  }

  /// One-line summary for an integration's `error_message`.
  pub fn error_summary(&self) -> Option<String> {
    match self.error_count {
      0 => None,
      1 => Some("1 lead failed to import".to_owned()),
      n => Some(format!("{n} leads failed to import")),
    }
  }
}

// ─── In-batch claims ─────────────────────────────────────────────────────────

/// Per-key locks shared by the leads of one batch. Two leads that share an
/// external id or subscriber number would otherwise both pass the store
/// lookup before either is inserted. The later one waits for the earlier
/// one to settle, then looks the key up again, so it sees the row if one
/// was written and proceeds normally if not.
#[derive(Debug, Default)]
struct Claims(Mutex<HashMap<String, Arc<AsyncMutex<()>>>>);

impl Claims {
  /// Hold `key` until the returned guard drops.
  async fn hold(&self, key: String) -> OwnedMutexGuard<()> {
    let lock = {
      let mut keys = self.0.lock().unwrap_or_else(PoisonError::into_inner);
      Arc::clone(keys.entry(key).or_default())
    };
    lock.lock_owned().await
  }
}

fn failed(label: &str, reason: impl std::fmt::Display) -> LeadOutcome {
  tracing::warn!(lead = %label, %reason, "lead not imported");
  LeadOutcome::Failed(format!("{label}: {reason}"))
}

// ─── Pipeline ────────────────────────────────────────────────────────────────

impl<S: LeadStore> Ingestor<S> {
  /// Run every raw lead through the pipeline with bounded concurrency.
  pub async fn ingest_batch(
    &self,
    raws: Vec<RawLeadData>,
    ctx: &BatchContext<'_>,
  ) -> BatchOutcome {
    let claims = Claims::default();
    let fan_out = self.settings.concurrency.max(1);

    let outcomes: Vec<LeadOutcome> = stream::iter(raws.into_iter().enumerate())
      .map(|(index, raw)| self.process_one(index, raw, ctx, &claims))
      .buffer_unordered(fan_out)
      .collect()
      .await;

    let mut batch = BatchOutcome::default();
    for outcome in outcomes {
      batch.record(outcome, self.settings.max_logged_errors);
    }
    batch.finish()
  }

  /// A single-lead batch, for manual entry.
  pub(crate) async fn ingest_one(
    &self,
    raw: RawLeadData,
    ctx: &BatchContext<'_>,
  ) -> LeadOutcome {
    self.process_one(0, raw, ctx, &Claims::default()).await
  }

  async fn process_one(
    &self,
    index: usize,
    raw: RawLeadData,
    ctx: &BatchContext<'_>,
    claims: &Claims,
  ) -> LeadOutcome {
    let store = self.store.as_ref();
    let candidate = map_lead(raw, ctx.org_id, ctx.origin);
    let label = candidate
      .external_id
      .clone()
      .unwrap_or_else(|| format!("#{}", index + 1));

    // Guards live until the lead settles; keys are always taken external id
    // first, then phone, so two leads never wait on each other.
    let mut held = Vec::with_capacity(2);

    // 1. Provider id: an exact hit is always a duplicate.
    if let Some(external_id) = candidate.external_id.as_deref() {
      held.push(claims.hold(format!("ext:{external_id}")).await);
      match find_by_external_id(store, ctx.org_id, external_id).await {
        Ok(Some(existing)) => {
          return LeadOutcome::Duplicate { existing: existing.id };
        }
        Ok(None) => {}
        Err(e) => return failed(&label, format_args!("duplicate check failed: {e}")),
      }
    }

    // 2. Validation.
    let report = validate_mapped_lead(&candidate, ctx.phone_policy);
    if !report.is_valid() {
      if ctx.missing_phone == MissingPhone::Skip
        && report.errors == [ValidationIssue::MissingPhone]
      {
        return LeadOutcome::MissingPhone;
      }
      return failed(&label, report.summary());
    }

    // 3. Phone: exact then last-ten-digit match.
    if let Some(raw_phone) = candidate.phone.as_deref() {
      let normalized = self.normalizer.normalize(raw_phone, None);
      if !normalized.is_empty() {
        let suffix = phone::subscriber_suffix(&normalized);
        held.push(claims.hold(format!("phone:{suffix}")).await);
        match find_duplicate(store, self.normalizer.as_ref(), ctx.org_id, raw_phone).await {
          Ok(Some(existing)) => {
            return LeadOutcome::Duplicate { existing: existing.id };
          }
          Ok(None) => {}
          Err(e) => return failed(&label, format_args!("duplicate check failed: {e}")),
        }
      }
    }

    // 4. Owner.
    let assignment =
      match resolve_assignment(store, &candidate, ctx.integration, ctx.accountable).await {
        Ok(assignment) => assignment,
        Err(e) => return failed(&label, format_args!("assignment lookup failed: {e}")),
      };

    // 5. Persist.
    match store.insert_lead(NewLead::from_candidate(candidate, &assignment)).await {
      Ok(lead) => {
        tracing::debug!(lead_id = %lead.id, reason = ?assignment.reason, "lead created");
        LeadOutcome::Created(lead)
      }
      Err(e) => failed(&label, e),
    }
  }
}
