//! Manual reassignment and its role-based guard.
//!
//! The whole candidate set is read once and checked before anything is
//! written. Either every lead passes and one update runs, or the request is
//! rejected and nothing changes.

use std::collections::HashSet;

use leadline_core::{
  lead::Lead,
  store::LeadStore,
  user::{AuthContext, Role, reportees},
};
use uuid::Uuid;

use crate::{Error, Ingestor, Result, assign::can_own};

/// Who a caller may hand leads to, and which leads they may touch.
enum Scope {
  Org,
  /// The manager and everyone below them.
  Subtree(HashSet<Uuid>),
  /// A sales user acting on their own unassigned leads.
  Own(Uuid),
}

impl Scope {
  fn may_target(&self, target: Option<Uuid>) -> bool {
    match (self, target) {
      (Self::Org, _) => true,
      (Self::Subtree(team), Some(user)) => team.contains(&user),
      (Self::Own(me), Some(user)) => *me == user,
      (Self::Subtree(_) | Self::Own(_), None) => false,
    }
  }

  fn may_touch(&self, lead: &Lead) -> bool {
    match self {
      Self::Org => true,
      Self::Subtree(team) => lead.assigned_to.is_none_or(|owner| team.contains(&owner)),
      Self::Own(me) => lead.assigned_to.is_none() && lead.created_by == Some(*me),
    }
  }
}

impl<S: LeadStore> Ingestor<S> {
  /// Assign (or, for admins, unassign) `lead_ids` to `target`. Returns the
  /// number of leads updated.
  pub async fn reassign_leads(
    &self,
    ctx: AuthContext,
    lead_ids: &[Uuid],
    target: Option<Uuid>,
  ) -> Result<u64> {
    let ids: Vec<Uuid> = {
      let mut seen = HashSet::new();
      lead_ids.iter().copied().filter(|id| seen.insert(*id)).collect()
    };
    if ids.is_empty() {
      return Ok(0);
    }

    let store = self.store.as_ref();

    if let Some(user) = target {
      if !can_own(store, ctx.org_id, user).await.map_err(Error::store)? {
        return Err(Error::InvalidAssignee(user));
      }
    }

    let scope = match ctx.role {
      Role::Admin => Scope::Org,
      Role::Manager => {
        let users = store.list_users(ctx.org_id).await.map_err(Error::store)?;
        let mut team = reportees(&users, ctx.user_id);
        team.insert(ctx.user_id);
        Scope::Subtree(team)
      }
      Role::Sales => Scope::Own(ctx.user_id),
    };

    if !scope.may_target(target) {
      return Err(Error::Forbidden(match target {
        Some(user) => format!("cannot assign leads to user {user}"),
        None => "cannot unassign leads".to_owned(),
      }));
    }

    let leads = store.get_leads(ctx.org_id, &ids).await.map_err(Error::store)?;
    if let Some(missing) = ids.iter().find(|id| !leads.iter().any(|l| l.id == **id)) {
      return Err(Error::LeadNotFound(*missing));
    }
    if let Some(denied) = leads.iter().find(|lead| !scope.may_touch(lead)) {
      return Err(Error::Forbidden(format!("lead {} is outside your scope", denied.id)));
    }

    let changed = store
      .assign_leads(ctx.org_id, &ids, target)
      .await
      .map_err(Error::store)?;
    tracing::info!(
      user_id = %ctx.user_id,
      count = changed,
      target = ?target,
      "leads reassigned"
    );
    Ok(changed)
  }
}
