//! Operator-driven entry paths: single manual entry and preview import.

use leadline_core::{
  integration::{Integration, SyncType},
  lead::RawLeadData,
  mapper::{LeadOrigin, PhonePolicy},
  store::LeadStore,
  user::{AuthContext, Role},
};
use serde::Serialize;
use uuid::Uuid;

use crate::{BatchContext, BatchOutcome, Error, Ingestor, LeadOutcome, MissingPhone, Result};

/// Result of a bulk import, with the sync log it produced if it targeted an
/// integration.
#[derive(Debug, Clone, Serialize)]
pub struct ImportReport {
  pub outcome:     BatchOutcome,
  pub sync_log_id: Option<Uuid>,
}

impl<S: LeadStore> Ingestor<S> {
  async fn org_integration(
    &self,
    ctx: &AuthContext,
    integration_id: Uuid,
  ) -> Result<Integration> {
    self
      .store
      .get_integration(integration_id)
      .await
      .map_err(Error::store)?
      .filter(|i| i.org_id == ctx.org_id)
      .ok_or(Error::IntegrationNotFound(integration_id))
  }

  /// Enter one lead by hand. The caller is accountable for it. Whether a
  /// phone is required follows `manual_entry_requires_phone`.
  pub async fn create_manual_lead(
    &self,
    ctx: AuthContext,
    raw: RawLeadData,
  ) -> LeadOutcome {
    let phone_policy = if self.settings.manual_entry_requires_phone {
      PhonePolicy::Required
    } else {
      PhonePolicy::Optional
    };
    let batch = BatchContext {
      org_id: ctx.org_id,
      origin: LeadOrigin::manual(),
      integration: None,
      accountable: ctx.user_id,
      phone_policy,
      missing_phone: MissingPhone::Error,
    };
    self.ingest_one(raw, &batch).await
  }

  /// Import leads an operator selected from a preview. Rows without a phone
  /// are counted in `skipped_missing_phone` rather than as errors. When
  /// `integration_id` is given the leads are attributed to it and a manual
  /// sync log is appended.
  pub async fn import_leads(
    &self,
    ctx: AuthContext,
    integration_id: Option<Uuid>,
    raws: Vec<RawLeadData>,
  ) -> Result<ImportReport> {
    if ctx.role == Role::Sales {
      return Err(Error::Forbidden("sales users cannot bulk import".into()));
    }

    let integration = match integration_id {
      Some(id) => Some(self.org_integration(&ctx, id).await?),
      None => None,
    };
    let origin = integration
      .as_ref()
      .map_or_else(LeadOrigin::manual, LeadOrigin::integration);
    let batch = BatchContext {
      org_id: ctx.org_id,
      origin,
      integration: integration.as_ref(),
      accountable: ctx.user_id,
      phone_policy: PhonePolicy::Required,
      missing_phone: MissingPhone::Skip,
    };

    let outcome = self.ingest_batch(raws, &batch).await;
    let sync_log_id = match &integration {
      Some(integration) => Some(
        self
          .log_outcome(integration.id, SyncType::Manual, &outcome)
          .await?
          .id,
      ),
      None => None,
    };
    Ok(ImportReport { outcome, sync_log_id })
  }
}
