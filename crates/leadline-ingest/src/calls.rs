//! Device call-log upload.
//!
//! Phones re-upload overlapping history, and clocks and duration counters
//! drift between uploads. A call is a duplicate of a stored one for the same
//! user and phone that started within ±10 s and lasted within 5 s of it.
//! Entries are processed in order so a repeat within one upload is caught
//! against its earlier twin.

use leadline_core::{
  call::{CallLog, NewCallLog, RawCallLog},
  store::{CallWindowQuery, LeadStore},
  user::AuthContext,
  window::find_tolerant,
};
use serde::Serialize;

use crate::{Ingestor, dedupe::find_duplicate};

#[derive(Debug, Clone, Default, Serialize)]
pub struct CallLogOutcome {
  pub inserted:   Vec<CallLog>,
  pub duplicates: u32,
  pub errors:     Vec<String>,
}

impl<S: LeadStore> Ingestor<S> {
  /// Store the caller's uploaded call history, skipping calls already on
  /// record and linking each new one to the lead with that phone, if any.
  pub async fn ingest_call_logs(
    &self,
    ctx: AuthContext,
    raws: Vec<RawCallLog>,
  ) -> CallLogOutcome {
    let store = self.store.as_ref();
    let mut outcome = CallLogOutcome::default();

    for (index, raw) in raws.into_iter().enumerate() {
      let label = format!("#{}", index + 1);
      let phone = self.normalizer.normalize(&raw.phone, None);
      if phone.is_empty() {
        outcome.errors.push(format!("{label}: missing phone number"));
        continue;
      }

      let mut call = NewCallLog {
        org_id: ctx.org_id,
        user_id: ctx.user_id,
        lead_id: None,
        phone,
        direction: raw.direction,
        started_at: raw.started_at,
        duration_secs: raw.duration_secs,
      };

      let window = call.window();
      let query = CallWindowQuery {
        user_id: call.user_id,
        phone:   call.phone.clone(),
        from:    window.start(),
        to:      window.end(),
      };
      let nearby = match store.call_logs_in_window(&query).await {
        Ok(nearby) => nearby,
        Err(e) => {
          outcome.errors.push(format!("{label}: duplicate check failed: {e}"));
          continue;
        }
      };
      if find_tolerant(nearby, |existing| call.judge(existing)).is_some() {
        outcome.duplicates += 1;
        continue;
      }

      call.lead_id = match find_duplicate(store, self.normalizer.as_ref(), ctx.org_id, &call.phone)
        .await
      {
        Ok(lead) => lead.map(|l| l.id),
        Err(e) => {
          tracing::warn!(error = %e, "call log lead lookup failed; storing unlinked");
          None
        }
      };

      match store.insert_call_log(call).await {
        Ok(log) => outcome.inserted.push(log),
        Err(e) => outcome.errors.push(format!("{label}: {e}")),
      }
    }

    outcome
  }
}
