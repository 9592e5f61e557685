//! The assignment resolver.
//!
//! Precedence, highest first:
//!
//! 1. an active rule for the lead's form id, then its campaign id;
//! 2. the spreadsheet integration's default assignee;
//! 3. unassigned, with `created_by` set to the accountable user.
//!
//! A rule or default naming a user who is inactive or outside the lead's
//! organization is skipped, never honoured.

use leadline_core::{
  integration::Integration,
  lead::CandidateLead,
  routing::{Assignment, AssignmentReason},
  store::LeadStore,
};
use uuid::Uuid;

/// Whether `user_id` may own leads of `org_id`.
pub async fn can_own<S: LeadStore>(
  store: &S,
  org_id: Uuid,
  user_id: Uuid,
) -> Result<bool, S::Error> {
  Ok(
    store
      .get_user(user_id)
      .await?
      .is_some_and(|u| u.org_id == org_id && u.is_active),
  )
}

/// Pick the owner for a validated candidate. `accountable` is recorded as
/// `created_by` in every outcome so an unassigned lead stays visible.
pub async fn resolve_assignment<S: LeadStore>(
  store: &S,
  candidate: &CandidateLead,
  integration: Option<&Integration>,
  accountable: Uuid,
) -> Result<Assignment, S::Error> {
  let org_id = candidate.org_id;

  if let Some(integration_id) = candidate.integration_id {
    for key in candidate.metadata.routing_keys() {
      let Some(rule) = store
        .find_assignment_rule(org_id, integration_id, key)
        .await?
      else {
        continue;
      };
      if !rule.is_active {
        continue;
      }
      if can_own(store, org_id, rule.assigned_to).await? {
        return Ok(Assignment::assigned(
          rule.assigned_to,
          accountable,
          AssignmentReason::Rule { external_id: rule.external_id },
        ));
      }
      tracing::warn!(
        rule_id = %rule.id,
        user_id = %rule.assigned_to,
        "assignment rule names a user who cannot own leads; skipping"
      );
    }
  }

  if let Some(owner) = integration.and_then(|i| i.config.sheet_default_assignee()) {
    if can_own(store, org_id, owner).await? {
      return Ok(Assignment::assigned(
        owner,
        accountable,
        AssignmentReason::SheetDefault,
      ));
    }
    tracing::warn!(
      user_id = %owner,
      "sheet default assignee cannot own leads; leaving unassigned"
    );
  }

  Ok(Assignment::unassigned(accountable))
}
