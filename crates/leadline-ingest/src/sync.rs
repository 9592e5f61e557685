//! Integration runs: manual and scheduled polls, and webhook deliveries.
//!
//! A poll holds the integration's sync lock for its whole duration. The lock
//! is taken with [`LeadStore::try_begin_sync`], a single conditional update,
//! so two overlapping triggers can never both run against one watermark.

use std::{future::Future, time::Duration};

use chrono::Utc;
use leadline_core::{
  integration::{
    Integration, NewSyncLog, Platform, SyncCompletion, SyncLog, SyncLogStatus,
    SyncStatus, SyncType,
  },
  lead::RawLeadData,
  store::LeadStore,
  user::{AuthContext, Role},
};
use serde::Serialize;
use uuid::Uuid;

use crate::{
  BatchContext, BatchOutcome, BoxError, Error, Ingestor, Result,
  collaborator::{CredentialProvider, LeadFetcher},
};

/// Result of one completed integration run.
#[derive(Debug, Clone, Serialize)]
pub struct SyncReport {
  pub integration_id: Uuid,
  pub outcome:        BatchOutcome,
  pub log:            SyncLog,
}

/// One integration's result within [`Ingestor::poll_all`].
#[derive(Debug)]
pub struct PollResult {
  pub integration_id: Uuid,
  pub result:         Result<SyncReport>,
}

async fn bounded<T, F>(
  stage: &'static str,
  after: Duration,
  wrap: fn(BoxError) -> Error,
  fut: F,
) -> Result<T>
where
  F: Future<Output = std::result::Result<T, BoxError>>,
{
  match tokio::time::timeout(after, fut).await {
    Ok(result) => result.map_err(wrap),
    Err(_) => Err(Error::Timeout { stage, after }),
  }
}

impl<S: LeadStore> Ingestor<S> {
  async fn load_active(&self, integration_id: Uuid) -> Result<Integration> {
    let integration = self
      .store
      .get_integration(integration_id)
      .await
      .map_err(Error::store)?
      .ok_or(Error::IntegrationNotFound(integration_id))?;
    if !integration.is_active {
      return Err(Error::IntegrationInactive(integration_id));
    }
    Ok(integration)
  }

  /// Poll one integration now, on behalf of an admin.
  pub async fn sync_now<P>(
    &self,
    ctx: AuthContext,
    integration_id: Uuid,
    platform: &P,
  ) -> Result<SyncReport>
  where
    P: CredentialProvider + LeadFetcher,
  {
    if ctx.role != Role::Admin {
      return Err(Error::Forbidden("only admins can trigger a sync".into()));
    }
    let integration = self
      .store
      .get_integration(integration_id)
      .await
      .map_err(Error::store)?
      .filter(|i| i.org_id == ctx.org_id)
      .ok_or(Error::IntegrationNotFound(integration_id))?;
    self.run_integration(integration.id, SyncType::Manual, platform).await
  }

  /// Lock, fetch, ingest, release, log.
  ///
  /// Fails without side effects if the integration is missing, inactive, or
  /// already syncing. A credential or fetch failure marks the integration
  /// `error`, appends an error log, and is returned. Per-lead failures do
  /// not fail the run; they set the integration to `error` with a summary
  /// and appear in the returned outcome.
  ///
  /// Once the lock is held, releasing it and appending the log are both
  /// always attempted. If either fails the run ends with
  /// [`Error::Bookkeeping`], carrying the run's own error when there was one.
  pub async fn run_integration<P>(
    &self,
    integration_id: Uuid,
    sync_type: SyncType,
    platform: &P,
  ) -> Result<SyncReport>
  where
    P: CredentialProvider + LeadFetcher,
  {
    let integration = self.load_active(integration_id).await?;
    if !self
      .store
      .try_begin_sync(integration_id, self.settings.stale_cutoff())
      .await
      .map_err(Error::store)?
    {
      return Err(Error::SyncInProgress(integration_id));
    }

    // The next run looks back to when this one started, so anything created
    // at the source while we were fetching is re-read rather than missed.
    let started_at = Utc::now();
    tracing::info!(%integration_id, ?sync_type, "sync started");

    let raws = match self.fetch(&integration, platform).await {
      Ok(raws) => raws,
      Err(e) => {
        let message = e.to_string();
        tracing::warn!(%integration_id, error = %message, "sync aborted");
        let completion = SyncCompletion {
          status:        SyncStatus::Error,
          error_message: Some(message.clone()),
          last_sync_at:  None,
        };
        let log = NewSyncLog {
          integration_id,
          sync_type,
          status: SyncLogStatus::Error,
          leads_created: 0,
          leads_updated: 0,
          error_message: Some(message),
          errors: Vec::new(),
        };
        return Err(match self.settle(integration_id, completion, log).await {
          Ok(_) => e,
          Err(Error::Bookkeeping { failures, .. }) => {
            Error::Bookkeeping { failures, run: Some(Box::new(e)) }
          }
          Err(other) => other,
        });
      }
    };

    let outcome = self
      .ingest_batch(raws, &BatchContext::for_integration(&integration))
      .await;

    let status = if outcome.error_count > 0 { SyncStatus::Error } else { SyncStatus::Idle };
    let completion = SyncCompletion {
      status,
      error_message: outcome.error_summary(),
      last_sync_at: Some(started_at),
    };
    let log = self
      .settle(integration_id, completion, self.outcome_log(integration_id, sync_type, &outcome))
      .await?;
    tracing::info!(
      %integration_id,
      created = outcome.created,
      duplicates = outcome.skipped_duplicates,
      errors = outcome.error_count,
      "sync finished"
    );
    Ok(SyncReport { integration_id, outcome, log })
  }

  /// Release the sync lock and append the run's log. Both are attempted
  /// even if the other fails; any failure is reported.
  async fn settle(
    &self,
    integration_id: Uuid,
    completion: SyncCompletion,
    log: NewSyncLog,
  ) -> Result<SyncLog> {
    let released = self.store.finish_sync(integration_id, completion).await;
    let logged = self.store.append_sync_log(log).await;

    let mut failures = Vec::new();
    if let Err(e) = &released {
      tracing::error!(%integration_id, error = %e, "could not release sync lock");
      failures.push(format!("release sync lock: {e}"));
    }
    match logged {
      Ok(log) if failures.is_empty() => Ok(log),
      Ok(_) => Err(Error::Bookkeeping { failures, run: None }),
      Err(e) => {
        tracing::error!(%integration_id, error = %e, "could not write sync log");
        failures.push(format!("write sync log: {e}"));
        Err(Error::Bookkeeping { failures, run: None })
      }
    }
  }

  async fn fetch<P>(&self, integration: &Integration, platform: &P) -> Result<Vec<RawLeadData>>
  where
    P: CredentialProvider + LeadFetcher,
  {
    let after = self.settings.platform_timeout();

    let token = bounded(
      "credential refresh",
      after,
      Error::Credential,
      platform.access_token(integration),
    )
    .await?;

    if let Some(credentials) = token.refreshed.clone() {
      self
        .store
        .update_credentials(integration.id, credentials)
        .await
        .map_err(Error::store)?;
    }

    bounded(
      "lead fetch",
      after,
      Error::Platform,
      platform.fetch_leads(integration, &token, integration.sync.last_sync_at),
    )
    .await
  }

  fn outcome_log(
    &self,
    integration_id: Uuid,
    sync_type: SyncType,
    outcome: &BatchOutcome,
  ) -> NewSyncLog {
    NewSyncLog {
      integration_id,
      sync_type,
      status: outcome.status.sync_log_status(),
      leads_created: outcome.created,
      leads_updated: outcome.skipped_duplicates,
      error_message: outcome.error_summary(),
      errors: outcome.errors.clone(),
    }
  }

  pub(crate) async fn log_outcome(
    &self,
    integration_id: Uuid,
    sync_type: SyncType,
    outcome: &BatchOutcome,
  ) -> Result<SyncLog> {
    self
      .store
      .append_sync_log(self.outcome_log(integration_id, sync_type, outcome))
      .await
      .map_err(Error::store)
  }

  /// Scheduled poll of every eligible integration. Each one runs in
  /// isolation; a failure is reported in its [`PollResult`] and never
  /// stops the others.
  pub async fn poll_all<P>(&self, platform: &P) -> Result<Vec<PollResult>>
  where
    P: CredentialProvider + LeadFetcher,
  {
    let integrations = self
      .store
      .list_pollable_integrations(self.settings.stale_cutoff())
      .await
      .map_err(Error::store)?;

    let mut results = Vec::new();
    for integration in integrations {
      if integration.platform == Platform::Webhook {
        continue;
      }
      let result = self
        .run_integration(integration.id, SyncType::Scheduled, platform)
        .await;
      if let Err(e) = &result {
        tracing::warn!(integration_id = %integration.id, error = %e, "scheduled sync failed");
      }
      results.push(PollResult { integration_id: integration.id, result });
    }
    Ok(results)
  }

  /// Ingest a pushed delivery. Webhooks carry their own leads, so no lock
  /// is taken and the watermark is untouched; the run is still logged.
  pub async fn ingest_webhook(
    &self,
    integration_id: Uuid,
    raws: Vec<RawLeadData>,
  ) -> Result<SyncReport> {
    let integration = self.load_active(integration_id).await?;
    let outcome = self
      .ingest_batch(raws, &BatchContext::for_integration(&integration))
      .await;
    let log = self
      .log_outcome(integration_id, SyncType::Webhook, &outcome)
      .await?;
    Ok(SyncReport { integration_id, outcome, log })
  }
}
