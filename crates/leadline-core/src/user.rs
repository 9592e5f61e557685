//! Users and the resolved caller context.
//!
//! Users are managed by the account layer; the pipeline only reads them to
//! check org membership and to walk the reporting hierarchy.

use std::collections::{HashMap, HashSet, VecDeque};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
  Admin,
  Manager,
  Sales,
}

wire_enum!(Role, "role", {
  Admin => "admin",
  Manager => "manager",
  Sales => "sales",
});

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
  pub id:         Uuid,
  pub org_id:     Uuid,
  pub name:       String,
  pub role:       Role,
  /// The user's direct manager, if any.
  pub reports_to: Option<Uuid>,
  /// Unapproved or deactivated members cannot own leads.
  pub is_active:  bool,
  pub created_at: DateTime<Utc>,
}

/// Input to [`crate::store::LeadStore::add_user`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewUser {
  pub org_id:     Uuid,
  pub name:       String,
  pub role:       Role,
  pub reports_to: Option<Uuid>,
  #[serde(default = "default_active")]
  pub is_active:  bool,
}

fn default_active() -> bool { true }

/// The already-authenticated caller, as supplied by the auth layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthContext {
  pub user_id: Uuid,
  pub org_id:  Uuid,
  pub role:    Role,
}

/// Every user who reports to `manager_id`, directly or transitively.
///
/// `users` should be the full member list of one organization. The manager
/// is not included. Cycles in bad data terminate because each user is
/// visited once.
pub fn reportees(users: &[User], manager_id: Uuid) -> HashSet<Uuid> {
  let mut children: HashMap<Uuid, Vec<Uuid>> = HashMap::new();
  for user in users {
    if let Some(parent) = user.reports_to {
      children.entry(parent).or_default().push(user.id);
    }
  }

  let mut seen = HashSet::new();
  let mut queue = VecDeque::from([manager_id]);
  while let Some(current) = queue.pop_front() {
    for &child in children.get(&current).into_iter().flatten() {
      if child != manager_id && seen.insert(child) {
        queue.push_back(child);
      }
    }
  }
  seen
}
