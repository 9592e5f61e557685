//! Device call logs uploaded by the mobile client.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::window::{MatchKind, TimeWindow};

/// Two uploads of one call may disagree on start time by this much.
pub const START_TOLERANCE_SECS: i64 = 10;
/// ...and on duration by this much.
pub const DURATION_TOLERANCE_SECS: u32 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CallDirection {
  Incoming,
  Outgoing,
  Missed,
}

wire_enum!(CallDirection, "call direction", {
  Incoming => "incoming",
  Outgoing => "outgoing",
  Missed => "missed",
});

/// One entry as read from the device.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawCallLog {
  pub phone:         String,
  pub direction:     CallDirection,
  pub started_at:    DateTime<Utc>,
  #[serde(default)]
  pub duration_secs: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallLog {
  pub id:            Uuid,
  pub org_id:        Uuid,
  pub user_id:       Uuid,
  /// The lead this call was matched to by phone, if any.
  pub lead_id:       Option<Uuid>,
  /// Normalised.
  pub phone:         String,
  pub direction:     CallDirection,
  pub started_at:    DateTime<Utc>,
  pub duration_secs: u32,
  pub created_at:    DateTime<Utc>,
}

/// Input to [`crate::store::LeadStore::insert_call_log`].
#[derive(Debug, Clone)]
pub struct NewCallLog {
  pub org_id:        Uuid,
  pub user_id:       Uuid,
  pub lead_id:       Option<Uuid>,
  pub phone:         String,
  pub direction:     CallDirection,
  pub started_at:    DateTime<Utc>,
  pub duration_secs: u32,
}

impl NewCallLog {
  /// The start-time window in which an existing record may be this call.
  pub fn window(&self) -> TimeWindow {
    TimeWindow::around(self.started_at, Duration::seconds(START_TOLERANCE_SECS))
  }

  /// Whether `existing` records the same call. Identical start and duration
  /// is exact; anything inside both tolerances is fuzzy.
  pub fn judge(&self, existing: &CallLog) -> Option<MatchKind> {
    if existing.user_id != self.user_id || existing.phone != self.phone {
      return None;
    }
    if !self.window().contains(existing.started_at) {
      return None;
    }
    let drift = existing.duration_secs.abs_diff(self.duration_secs);
    if drift > DURATION_TOLERANCE_SECS {
      return None;
    }
    if drift == 0 && existing.started_at == self.started_at {
      Some(MatchKind::Exact)
    } else {
      Some(MatchKind::Fuzzy)
    }
  }
}
