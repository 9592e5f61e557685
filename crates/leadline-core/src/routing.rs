//! Assignment rules and the resolver's output.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Routes every lead from one external form or campaign to one user.
///
/// Unique per `(org_id, integration_id, external_id)`; saving a rule for an
/// existing key replaces it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssignmentRule {
  pub id:             Uuid,
  pub org_id:         Uuid,
  pub integration_id: Uuid,
  /// The platform's form or campaign id.
  pub external_id:    String,
  pub assigned_to:    Uuid,
  pub is_active:      bool,
  pub created_at:     DateTime<Utc>,
  pub updated_at:     DateTime<Utc>,
}

/// Input to [`crate::store::LeadStore::upsert_assignment_rule`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewAssignmentRule {
  pub org_id:         Uuid,
  pub integration_id: Uuid,
  pub external_id:    String,
  pub assigned_to:    Uuid,
  #[serde(default = "default_active")]
  pub is_active:      bool,
}

fn default_active() -> bool { true }

/// Which precedence level produced an [`Assignment`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AssignmentReason {
  /// An active rule matched this form or campaign id.
  Rule { external_id: String },
  /// The spreadsheet integration's catch-all assignee.
  SheetDefault,
  /// Nobody owns the lead yet; `created_by` keeps it visible.
  Unassigned,
}

/// The owner chosen for a new lead.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Assignment {
  pub assigned_to: Option<Uuid>,
  pub created_by:  Option<Uuid>,
  pub reason:      AssignmentReason,
}

impl Assignment {
  pub fn assigned(user_id: Uuid, accountable: Uuid, reason: AssignmentReason) -> Self {
    Self {
      assigned_to: Some(user_id),
      created_by: Some(accountable),
      reason,
    }
  }

  pub fn unassigned(accountable: Uuid) -> Self {
    Self {
      assigned_to: None,
      created_by:  Some(accountable),
      reason:      AssignmentReason::Unassigned,
    }
  }
}
