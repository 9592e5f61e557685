//! End-to-end pipeline tests against an in-memory `SqliteStore`, with fake
//! platform collaborators.

use std::{
  collections::{BTreeMap, HashSet},
  sync::{
    Arc, Mutex,
    atomic::{AtomicBool, Ordering},
  },
  time::Duration,
};

use chrono::{DateTime, TimeZone, Utc};
use leadline_core::{
  call::{CallDirection, CallLog, NewCallLog, RawCallLog},
  integration::{
    Credentials, Integration, IntegrationConfig, NewIntegration, NewSyncLog,
    Platform, SheetColumns, SyncCompletion, SyncLog, SyncLogStatus, SyncStatus,
    SyncType,
  },
  lead::{Lead, LeadMetadata, LeadSource, NewLead, RawLeadData},
  phone::IndiaHeuristic,
  routing::{AssignmentReason, AssignmentRule, NewAssignmentRule},
  store::{CallWindowQuery, LeadQuery, LeadStore, PhoneCandidateQuery},
  user::{AuthContext, NewUser, Role, User},
};
use leadline_store_sqlite::SqliteStore;
use uuid::Uuid;

use crate::{
  AccessToken, BatchStatus, BoxError, CredentialProvider, Error, IngestSettings,
  Ingestor, LeadFetcher, LeadOutcome,
  assign::resolve_assignment,
  dedupe::{PAGE_SIZE, find_duplicate},
};

// ─── Fixtures ────────────────────────────────────────────────────────────────

struct Fixture {
  store:    Arc<SqliteStore>,
  ingestor: Ingestor<SqliteStore>,
  org:      Uuid,
  admin:    User,
}

impl Fixture {
  async fn new() -> Self { Self::with_settings(IngestSettings::default()).await }

  async fn with_settings(settings: IngestSettings) -> Self {
    let store = Arc::new(SqliteStore::open_in_memory().await.expect("in-memory store"));
    let org = Uuid::new_v4();
    let admin = store
      .add_user(NewUser {
        org_id:     org,
        name:       "Admin".into(),
        role:       Role::Admin,
        reports_to: None,
        is_active:  true,
      })
      .await
      .unwrap();
    let ingestor = Ingestor::new(Arc::clone(&store), settings);
    Self { store, ingestor, org, admin }
  }

  async fn user(&self, role: Role, reports_to: Option<Uuid>) -> User {
    self
      .store
      .add_user(NewUser {
        org_id: self.org,
        name: format!("{role}"),
        role,
        reports_to,
        is_active: true,
      })
      .await
      .unwrap()
  }

  async fn integration(&self, platform: Platform, config: IntegrationConfig) -> Integration {
    self
      .store
      .add_integration(NewIntegration {
        org_id: self.org,
        platform,
        credentials: Credentials::default(),
        config,
        created_by: self.admin.id,
      })
      .await
      .unwrap()
  }

  async fn meta(&self) -> Integration {
    self
      .integration(Platform::Facebook, IntegrationConfig::MetaLeadAds {
        page_id:        Some("page-1".into()),
        form_ids:       vec!["form-1".into()],
        ad_account_ids: vec![],
      })
      .await
  }

  async fn sheet(&self, default_assignee: Option<Uuid>) -> Integration {
    self
      .integration(Platform::GoogleSheets, IntegrationConfig::GoogleSheets {
        spreadsheet_id: "sheet-1".into(),
        range: "Leads!A1:Z".into(),
        columns: SheetColumns::default(),
        default_assignee,
      })
      .await
  }

  fn ctx(&self, user: &User) -> AuthContext {
    AuthContext { user_id: user.id, org_id: self.org, role: user.role }
  }

  async fn seed_lead(&self, external_id: Option<&str>, phone: &str) -> Lead {
    self
      .store
      .insert_lead(NewLead {
        org_id: self.org,
        external_id: external_id.map(str::to_owned),
        name: "Existing".into(),
        phone: Some(phone.into()),
        email: None,
        company: None,
        source: LeadSource::Manual,
        integration_id: None,
        assigned_to: None,
        created_by: Some(self.admin.id),
        status: Default::default(),
        metadata: LeadMetadata::Empty,
        custom_fields: BTreeMap::new(),
        created_at: Utc::now(),
      })
      .await
      .unwrap()
  }

  async fn all_leads(&self) -> Vec<Lead> {
    self
      .store
      .list_leads(&LeadQuery { org_id: self.org, ..Default::default() })
      .await
      .unwrap()
  }
}

fn raw(external_id: &str, phone: Option<&str>) -> RawLeadData {
  RawLeadData {
    external_id: Some(external_id.into()),
    name: Some(format!("Lead {external_id}")),
    phone: phone.map(str::to_owned),
    ..Default::default()
  }
}

fn with_form(mut lead: RawLeadData, form_id: &str) -> RawLeadData {
  lead.metadata = LeadMetadata::MetaLeadAd {
    form_id:     Some(form_id.into()),
    campaign_id: None,
    ad_id:       None,
    page_id:     None,
  };
  lead
}

/// Fake credential and lead-fetch collaborator.
#[derive(Default)]
struct FakePlatform {
  leads:      Vec<RawLeadData>,
  refuse:     HashSet<Uuid>,
  stall:      Option<Duration>,
  refreshed:  Option<Credentials>,
  seen_since: Mutex<Vec<Option<DateTime<Utc>>>>,
}

impl CredentialProvider for FakePlatform {
  async fn access_token(&self, integration: &Integration) -> Result<AccessToken, BoxError> {
    if self.refuse.contains(&integration.id) {
      return Err("refresh token revoked".into());
    }
    Ok(AccessToken { token: "token".into(), refreshed: self.refreshed.clone() })
  }
}

impl LeadFetcher for FakePlatform {
  async fn fetch_leads(
    &self,
    _integration: &Integration,
    _token: &AccessToken,
    since: Option<DateTime<Utc>>,
  ) -> Result<Vec<RawLeadData>, BoxError> {
    self.seen_since.lock().unwrap().push(since);
    if let Some(stall) = self.stall {
      tokio::time::sleep(stall).await;
    }
    Ok(self.leads.clone())
  }
}

// ─── Batch pipeline ──────────────────────────────────────────────────────────

#[tokio::test]
async fn one_invalid_lead_does_not_sink_the_batch() {
  let f = Fixture::new().await;
  let meta = f.meta().await;

  let leads = vec![
    raw("lead-1", Some("9000000001")),
    raw("lead-2", Some("9000000002")),
    raw("lead-3", None),
    raw("lead-4", Some("9000000004")),
    raw("lead-5", Some("9000000005")),
  ];
  let report = f.ingestor.ingest_webhook(meta.id, leads).await.unwrap();

  assert_eq!(report.outcome.created, 4);
  assert_eq!(report.outcome.errors.len(), 1);
  assert!(report.outcome.errors[0].starts_with("lead-3"));
  assert_eq!(report.outcome.status, BatchStatus::Partial);
  assert_eq!(report.log.status, SyncLogStatus::Partial);
  assert_eq!(report.log.leads_created, 4);
  assert_eq!(f.all_leads().await.len(), 4);
}

#[tokio::test]
async fn bare_ten_digit_phone_matches_existing_international_form() {
  let f = Fixture::new().await;
  f.seed_lead(None, "+919876543210").await;
  let meta = f.meta().await;

  let report = f
    .ingestor
    .ingest_webhook(meta.id, vec![raw("new", Some("9876543210"))])
    .await
    .unwrap();

  assert_eq!(report.outcome.created, 0);
  assert_eq!(report.outcome.skipped_duplicates, 1);
  assert_eq!(report.log.leads_updated, 1);
}

#[tokio::test]
async fn last_ten_digits_catch_oddly_formatted_duplicates() {
  let f = Fixture::new().await;
  // Leading junk digit: normalises to +9109876543210.
  f.seed_lead(None, "+91 0 98765 43210").await;
  let meta = f.meta().await;

  let report = f
    .ingestor
    .ingest_webhook(meta.id, vec![raw("new", Some("98765 43210"))])
    .await
    .unwrap();

  assert_eq!(report.outcome.skipped_duplicates, 1);
  assert_eq!(f.all_leads().await.len(), 1);
}

#[tokio::test]
async fn external_id_match_wins_even_with_a_different_phone() {
  let f = Fixture::new().await;
  f.seed_lead(Some("X"), "+919000000001").await;
  let meta = f.meta().await;

  let report = f
    .ingestor
    .ingest_webhook(meta.id, vec![raw("X", Some("8000000002"))])
    .await
    .unwrap();

  assert_eq!(report.outcome.skipped_duplicates, 1);
  assert_eq!(report.outcome.created, 0);
}

#[tokio::test]
async fn same_phone_twice_in_one_batch_creates_one_lead() {
  let f = Fixture::new().await;
  let meta = f.meta().await;

  let report = f
    .ingestor
    .ingest_webhook(meta.id, vec![
      raw("a", Some("9876543210")),
      raw("b", Some("+91 98765 43210")),
      raw("a", Some("98765-43210")),
    ])
    .await
    .unwrap();

  assert_eq!(report.outcome.created, 1);
  assert_eq!(report.outcome.skipped_duplicates, 2);
  assert_eq!(report.outcome.status, BatchStatus::Completed);
}

#[tokio::test]
async fn failed_lead_does_not_shadow_a_later_one_with_its_external_id() {
  for concurrency in [1, 8] {
    let f = Fixture::with_settings(IngestSettings { concurrency, ..Default::default() }).await;
    let meta = f.meta().await;

    let report = f
      .ingestor
      .ingest_webhook(meta.id, vec![raw("x", None), raw("x", Some("9000000001"))])
      .await
      .unwrap();

    assert_eq!(report.outcome.created, 1, "concurrency {concurrency}");
    assert_eq!(report.outcome.skipped_duplicates, 0);
    assert_eq!(report.outcome.errors, vec!["x: missing phone number"]);
    let stored = f.all_leads().await;
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].external_id.as_deref(), Some("x"));
  }
}

#[tokio::test]
async fn redelivered_webhook_is_idempotent() {
  let f = Fixture::new().await;
  let meta = f.meta().await;
  let leads = vec![raw("r1", Some("9000000001")), raw("r2", Some("9000000002"))];

  let first = f.ingestor.ingest_webhook(meta.id, leads.clone()).await.unwrap();
  let second = f.ingestor.ingest_webhook(meta.id, leads).await.unwrap();

  assert_eq!(first.outcome.created, 2);
  assert_eq!(second.outcome.created, 0);
  assert_eq!(second.outcome.skipped_duplicates, 2);
  assert_eq!(f.all_leads().await.len(), 2);
}

#[tokio::test]
async fn webhook_leaves_sync_state_alone() {
  let f = Fixture::new().await;
  let meta = f.meta().await;

  f.ingestor
    .ingest_webhook(meta.id, vec![raw("w", Some("9000000001"))])
    .await
    .unwrap();

  let reread = f.store.get_integration(meta.id).await.unwrap().unwrap();
  assert_eq!(reread.sync.status, SyncStatus::Idle);
  assert_eq!(reread.sync.last_sync_at, None);
  let logs = f.store.list_sync_logs(meta.id, 10).await.unwrap();
  assert_eq!(logs.len(), 1);
  assert_eq!(logs[0].sync_type, SyncType::Webhook);
}

// ─── Assignment ──────────────────────────────────────────────────────────────

#[tokio::test]
async fn form_rule_beats_sheet_default_beats_unassigned() {
  let f = Fixture::new().await;
  let rule_owner = f.user(Role::Sales, None).await;
  let sheet_owner = f.user(Role::Sales, None).await;
  let sheet = f.sheet(Some(sheet_owner.id)).await;

  f.store
    .upsert_assignment_rule(NewAssignmentRule {
      org_id:         f.org,
      integration_id: sheet.id,
      external_id:    "form-1".into(),
      assigned_to:    rule_owner.id,
      is_active:      true,
    })
    .await
    .unwrap();

  let report = f
    .ingestor
    .import_leads(f.ctx(&f.admin), Some(sheet.id), vec![
      with_form(raw("by-rule", Some("9000000001")), "form-1"),
      with_form(raw("by-default", Some("9000000002")), "form-unknown"),
    ])
    .await
    .unwrap();
  assert_eq!(report.outcome.created, 2);
  assert!(report.sync_log_id.is_some());

  let by_ext = |leads: &[Lead], ext: &str| {
    leads
      .iter()
      .find(|l| l.external_id.as_deref() == Some(ext))
      .cloned()
      .unwrap()
  };
  let leads = f.all_leads().await;
  assert_eq!(by_ext(&leads, "by-rule").assigned_to, Some(rule_owner.id));
  assert_eq!(by_ext(&leads, "by-default").assigned_to, Some(sheet_owner.id));
  assert_eq!(by_ext(&leads, "by-rule").source, LeadSource::GoogleSheets);

  // No rule and no default: unassigned, but the importer stays accountable.
  let meta = f.meta().await;
  f.ingestor
    .ingest_webhook(meta.id, vec![with_form(raw("nobody", Some("9000000003")), "form-1")])
    .await
    .unwrap();
  let leads = f.all_leads().await;
  let nobody = by_ext(&leads, "nobody");
  assert_eq!(nobody.assigned_to, None);
  assert_eq!(nobody.created_by, Some(f.admin.id));
}

#[tokio::test]
async fn unassigned_leads_always_have_a_creator() {
  let f = Fixture::new().await;
  let meta = f.meta().await;
  let importer = f.user(Role::Manager, None).await;

  f.ingestor
    .ingest_webhook(meta.id, vec![raw("w1", Some("9000000001"))])
    .await
    .unwrap();
  f.ingestor
    .import_leads(f.ctx(&importer), None, vec![raw("i1", Some("9000000002"))])
    .await
    .unwrap();
  let manual = f
    .ingestor
    .create_manual_lead(f.ctx(&importer), raw("m1", Some("9000000003")))
    .await;
  assert!(matches!(manual, LeadOutcome::Created(_)));

  let leads = f.all_leads().await;
  assert_eq!(leads.len(), 3);
  for lead in leads {
    assert!(lead.assigned_to.is_some() || lead.created_by.is_some());
  }
}

#[tokio::test]
async fn rule_for_inactive_user_falls_through() {
  let f = Fixture::new().await;
  let sheet_owner = f.user(Role::Sales, None).await;
  let gone = f
    .store
    .add_user(NewUser {
      org_id:     f.org,
      name:       "Former".into(),
      role:       Role::Sales,
      reports_to: None,
      is_active:  false,
    })
    .await
    .unwrap();
  let sheet = f.sheet(Some(sheet_owner.id)).await;
  f.store
    .upsert_assignment_rule(NewAssignmentRule {
      org_id:         f.org,
      integration_id: sheet.id,
      external_id:    "form-1".into(),
      assigned_to:    gone.id,
      is_active:      true,
    })
    .await
    .unwrap();

  let candidate = leadline_core::mapper::map_lead(
    with_form(raw("x", Some("9000000001")), "form-1"),
    f.org,
    leadline_core::mapper::LeadOrigin::integration(&sheet),
  );
  let assignment = resolve_assignment(f.store.as_ref(), &candidate, Some(&sheet), f.admin.id)
    .await
    .unwrap();
  assert_eq!(assignment.assigned_to, Some(sheet_owner.id));
  assert_eq!(assignment.reason, AssignmentReason::SheetDefault);
}

// ─── Entry paths ─────────────────────────────────────────────────────────────

#[tokio::test]
async fn preview_import_counts_missing_phone_separately() {
  let f = Fixture::new().await;

  let report = f
    .ingestor
    .import_leads(f.ctx(&f.admin), None, vec![
      raw("p1", Some("9000000001")),
      raw("p2", None),
      raw("p3", Some("n/a")),
    ])
    .await
    .unwrap();

  assert_eq!(report.outcome.created, 1);
  assert_eq!(report.outcome.skipped_missing_phone, 2);
  assert!(report.outcome.errors.is_empty());
  assert_eq!(report.outcome.status, BatchStatus::Completed);
  assert_eq!(report.sync_log_id, None);
}

#[tokio::test]
async fn sales_users_cannot_bulk_import() {
  let f = Fixture::new().await;
  let rep = f.user(Role::Sales, None).await;
  let err = f
    .ingestor
    .import_leads(f.ctx(&rep), None, vec![raw("p1", Some("9000000001"))])
    .await
    .unwrap_err();
  assert!(matches!(err, Error::Forbidden(_)));
  assert!(f.all_leads().await.is_empty());
}

#[tokio::test]
async fn manual_entry_phone_rule_is_configurable() {
  let strict = Fixture::new().await;
  let outcome = strict
    .ingestor
    .create_manual_lead(strict.ctx(&strict.admin), raw("m", None))
    .await;
  assert!(matches!(outcome, LeadOutcome::Failed(ref m) if m.contains("missing phone")));

  let lenient = Fixture::with_settings(IngestSettings {
    manual_entry_requires_phone: false,
    ..Default::default()
  })
  .await;
  let outcome = lenient
    .ingestor
    .create_manual_lead(lenient.ctx(&lenient.admin), raw("m", None))
    .await;
  let lead = match outcome {
    LeadOutcome::Created(lead) => lead,
    other => panic!("expected a created lead, got {other:?}"),
  };
  assert_eq!(lead.phone, None);
  assert_eq!(lead.source, LeadSource::Manual);
  assert_eq!(lead.created_by, Some(lenient.admin.id));
}

// ─── Integration runs ────────────────────────────────────────────────────────

#[tokio::test]
async fn run_refuses_to_overlap_a_sync_in_flight() {
  let f = Fixture::new().await;
  let meta = f.meta().await;
  let cutoff = Utc::now() - chrono::Duration::hours(1);
  assert!(f.store.try_begin_sync(meta.id, cutoff).await.unwrap());

  let platform = FakePlatform {
    leads: vec![raw("a", Some("9000000001"))],
    ..Default::default()
  };
  let err = f
    .ingestor
    .run_integration(meta.id, SyncType::Manual, &platform)
    .await
    .unwrap_err();

  assert!(matches!(err, Error::SyncInProgress(id) if id == meta.id));
  assert!(platform.seen_since.lock().unwrap().is_empty());
  assert!(f.store.list_sync_logs(meta.id, 10).await.unwrap().is_empty());
}

#[tokio::test]
async fn watermark_overlaps_rather_than_gaps() {
  let f = Fixture::new().await;
  let meta = f.meta().await;
  let platform = FakePlatform {
    leads: vec![raw("a", Some("9000000001"))],
    ..Default::default()
  };

  let before = Utc::now() - chrono::Duration::milliseconds(1);
  let first = f
    .ingestor
    .run_integration(meta.id, SyncType::Scheduled, &platform)
    .await
    .unwrap();
  let after = Utc::now();
  assert_eq!(first.outcome.created, 1);

  let state = f.store.get_integration(meta.id).await.unwrap().unwrap().sync;
  assert_eq!(state.status, SyncStatus::Idle);
  let mark = state.last_sync_at.unwrap();
  assert!(mark >= before && mark <= after);

  let second = f
    .ingestor
    .run_integration(meta.id, SyncType::Scheduled, &platform)
    .await
    .unwrap();
  assert_eq!(second.outcome.skipped_duplicates, 1);

  // The second run looked back to the first run's start, re-reading the
  // whole period the first run was busy.
  let seen = platform.seen_since.lock().unwrap().clone();
  assert_eq!(seen, vec![None, Some(mark)]);
  assert!(seen[1].unwrap() <= after);
}

#[tokio::test]
async fn credential_failure_marks_integration_and_isolates_others() {
  let f = Fixture::new().await;
  let broken = f.meta().await;
  let healthy = f.meta().await;
  let webhook_only = f.integration(Platform::Webhook, IntegrationConfig::Webhook).await;

  let platform = FakePlatform {
    leads: vec![raw("a", Some("9000000001"))],
    refuse: HashSet::from([broken.id]),
    ..Default::default()
  };
  let results = f.ingestor.poll_all(&platform).await.unwrap();

  assert_eq!(results.len(), 2);
  assert!(results.iter().all(|r| r.integration_id != webhook_only.id));
  for result in &results {
    if result.integration_id == broken.id {
      assert!(matches!(result.result, Err(Error::Credential(_))));
    } else {
      assert_eq!(result.result.as_ref().unwrap().outcome.created, 1);
    }
  }

  let state = f.store.get_integration(broken.id).await.unwrap().unwrap().sync;
  assert_eq!(state.status, SyncStatus::Error);
  assert!(state.error_message.unwrap().contains("refresh token revoked"));
  assert_eq!(state.last_sync_at, None);

  let logs = f.store.list_sync_logs(broken.id, 10).await.unwrap();
  assert_eq!(logs.len(), 1);
  assert_eq!(logs[0].status, SyncLogStatus::Error);
  assert_eq!(logs[0].sync_type, SyncType::Scheduled);

  let healthy_state = f.store.get_integration(healthy.id).await.unwrap().unwrap().sync;
  assert_eq!(healthy_state.status, SyncStatus::Idle);
}

#[tokio::test]
async fn stalled_platform_times_out_and_releases_the_lock() {
  let f = Fixture::with_settings(IngestSettings {
    platform_timeout_secs: 1,
    ..Default::default()
  })
  .await;
  let meta = f.meta().await;
  let platform = FakePlatform {
    stall: Some(Duration::from_secs(5)),
    ..Default::default()
  };

  let err = f
    .ingestor
    .run_integration(meta.id, SyncType::Manual, &platform)
    .await
    .unwrap_err();
  assert!(matches!(err, Error::Timeout { stage: "lead fetch", .. }));

  let state = f.store.get_integration(meta.id).await.unwrap().unwrap().sync;
  assert_eq!(state.status, SyncStatus::Error);
  assert!(state.is_eligible());
}

#[tokio::test]
async fn per_lead_errors_put_the_integration_in_error() {
  let f = Fixture::new().await;
  let meta = f.meta().await;
  let platform = FakePlatform {
    leads: vec![raw("ok", Some("9000000001")), raw("bad", None)],
    ..Default::default()
  };

  let report = f
    .ingestor
    .run_integration(meta.id, SyncType::Manual, &platform)
    .await
    .unwrap();
  assert_eq!(report.outcome.created, 1);
  assert_eq!(report.log.errors, vec!["bad: missing phone number"]);

  let state = f.store.get_integration(meta.id).await.unwrap().unwrap().sync;
  assert_eq!(state.status, SyncStatus::Error);
  assert_eq!(state.error_message.as_deref(), Some("1 lead failed to import"));
  assert!(state.last_sync_at.is_some());
}

#[tokio::test]
async fn refreshed_credentials_are_persisted() {
  let f = Fixture::new().await;
  let sheet = f.sheet(None).await;
  let rotated = Credentials {
    access_token:  Some("fresh".into()),
    refresh_token: Some("refresh".into()),
    expires_at:    Some(Utc.with_ymd_and_hms(2030, 1, 1, 0, 0, 0).unwrap()),
  };
  let platform = FakePlatform {
    refreshed: Some(rotated.clone()),
    ..Default::default()
  };

  f.ingestor
    .run_integration(sheet.id, SyncType::Manual, &platform)
    .await
    .unwrap();

  let reread = f.store.get_integration(sheet.id).await.unwrap().unwrap();
  assert_eq!(reread.credentials, rotated);
}

#[tokio::test]
async fn only_admins_trigger_a_sync() {
  let f = Fixture::new().await;
  let meta = f.meta().await;
  let manager = f.user(Role::Manager, None).await;

  let err = f
    .ingestor
    .sync_now(f.ctx(&manager), meta.id, &FakePlatform::default())
    .await
    .unwrap_err();
  assert!(matches!(err, Error::Forbidden(_)));

  let report = f
    .ingestor
    .sync_now(f.ctx(&f.admin), meta.id, &FakePlatform::default())
    .await
    .unwrap();
  assert_eq!(report.log.sync_type, SyncType::Manual);
}

// ─── Duplicate-check failure ─────────────────────────────────────────────────

#[derive(Debug, thiserror::Error)]
enum FlakyError {
  #[error(transparent)]
  Inner(#[from] leadline_store_sqlite::Error),
  #[error("store unavailable")]
  Injected,
}

/// Delegates to `SqliteStore` but can fail chosen calls, or serve phone
/// candidates from canned pages.
struct FlakyStore {
  inner:             SqliteStore,
  fail_phone_lookup: AtomicBool,
  fail_finish_sync:  AtomicBool,
  fail_sync_log:     AtomicBool,
  candidate_pages:   Option<Vec<Vec<Lead>>>,
  seen_offsets:      Mutex<Vec<usize>>,
}

impl FlakyStore {
  async fn new() -> Self {
    Self {
      inner:             SqliteStore::open_in_memory().await.unwrap(),
      fail_phone_lookup: AtomicBool::new(false),
      fail_finish_sync:  AtomicBool::new(false),
      fail_sync_log:     AtomicBool::new(false),
      candidate_pages:   None,
      seen_offsets:      Mutex::new(Vec::new()),
    }
  }
}

impl LeadStore for FlakyStore {
  type Error = FlakyError;

  async fn insert_lead(&self, input: NewLead) -> Result<Lead, FlakyError> {
    Ok(self.inner.insert_lead(input).await?)
  }

  async fn find_lead_by_external_id(
    &self,
    org_id: Uuid,
    external_id: &str,
  ) -> Result<Option<Lead>, FlakyError> {
    Ok(self.inner.find_lead_by_external_id(org_id, external_id).await?)
  }

  async fn phone_candidates(&self, query: &PhoneCandidateQuery) -> Result<Vec<Lead>, FlakyError> {
    if self.fail_phone_lookup.load(Ordering::SeqCst) {
      return Err(FlakyError::Injected);
    }
    if let Some(pages) = &self.candidate_pages {
      self.seen_offsets.lock().unwrap().push(query.offset);
      let page = pages.get(query.offset / query.limit).cloned().unwrap_or_default();
      return Ok(page);
    }
    Ok(self.inner.phone_candidates(query).await?)
  }

  async fn get_leads(&self, org_id: Uuid, ids: &[Uuid]) -> Result<Vec<Lead>, FlakyError> {
    Ok(self.inner.get_leads(org_id, ids).await?)
  }

  async fn list_leads(&self, query: &LeadQuery) -> Result<Vec<Lead>, FlakyError> {
    Ok(self.inner.list_leads(query).await?)
  }

  async fn assign_leads(
    &self,
    org_id: Uuid,
    ids: &[Uuid],
    assigned_to: Option<Uuid>,
  ) -> Result<u64, FlakyError> {
    Ok(self.inner.assign_leads(org_id, ids, assigned_to).await?)
  }

  async fn add_user(&self, input: NewUser) -> Result<User, FlakyError> {
    Ok(self.inner.add_user(input).await?)
  }

  async fn get_user(&self, id: Uuid) -> Result<Option<User>, FlakyError> {
    Ok(self.inner.get_user(id).await?)
  }

  async fn list_users(&self, org_id: Uuid) -> Result<Vec<User>, FlakyError> {
    Ok(self.inner.list_users(org_id).await?)
  }

  async fn add_integration(&self, input: NewIntegration) -> Result<Integration, FlakyError> {
    Ok(self.inner.add_integration(input).await?)
  }

  async fn get_integration(&self, id: Uuid) -> Result<Option<Integration>, FlakyError> {
    Ok(self.inner.get_integration(id).await?)
  }

  async fn list_pollable_integrations(
    &self,
    stale_before: DateTime<Utc>,
  ) -> Result<Vec<Integration>, FlakyError> {
    Ok(self.inner.list_pollable_integrations(stale_before).await?)
  }

  async fn try_begin_sync(&self, id: Uuid, stale_before: DateTime<Utc>) -> Result<bool, FlakyError> {
    Ok(self.inner.try_begin_sync(id, stale_before).await?)
  }

  async fn finish_sync(&self, id: Uuid, completion: SyncCompletion) -> Result<(), FlakyError> {
    if self.fail_finish_sync.load(Ordering::SeqCst) {
      return Err(FlakyError::Injected);
    }
    Ok(self.inner.finish_sync(id, completion).await?)
  }

  async fn update_credentials(&self, id: Uuid, credentials: Credentials) -> Result<(), FlakyError> {
    Ok(self.inner.update_credentials(id, credentials).await?)
  }

  async fn delete_integration(&self, id: Uuid) -> Result<bool, FlakyError> {
    Ok(self.inner.delete_integration(id).await?)
  }

  async fn upsert_assignment_rule(
    &self,
    input: NewAssignmentRule,
  ) -> Result<AssignmentRule, FlakyError> {
    Ok(self.inner.upsert_assignment_rule(input).await?)
  }

  async fn find_assignment_rule(
    &self,
    org_id: Uuid,
    integration_id: Uuid,
    external_id: &str,
  ) -> Result<Option<AssignmentRule>, FlakyError> {
    Ok(self.inner.find_assignment_rule(org_id, integration_id, external_id).await?)
  }

  async fn list_assignment_rules(
    &self,
    integration_id: Uuid,
  ) -> Result<Vec<AssignmentRule>, FlakyError> {
    Ok(self.inner.list_assignment_rules(integration_id).await?)
  }

  async fn delete_assignment_rule(&self, id: Uuid) -> Result<bool, FlakyError> {
    Ok(self.inner.delete_assignment_rule(id).await?)
  }

  async fn append_sync_log(&self, input: NewSyncLog) -> Result<SyncLog, FlakyError> {
    if self.fail_sync_log.load(Ordering::SeqCst) {
      return Err(FlakyError::Injected);
    }
    Ok(self.inner.append_sync_log(input).await?)
  }

  async fn list_sync_logs(&self, integration_id: Uuid, limit: usize) -> Result<Vec<SyncLog>, FlakyError> {
    Ok(self.inner.list_sync_logs(integration_id, limit).await?)
  }

  async fn insert_call_log(&self, input: NewCallLog) -> Result<CallLog, FlakyError> {
    Ok(self.inner.insert_call_log(input).await?)
  }

  async fn call_logs_in_window(&self, query: &CallWindowQuery) -> Result<Vec<CallLog>, FlakyError> {
    Ok(self.inner.call_logs_in_window(query).await?)
  }
}

#[tokio::test]
async fn failed_duplicate_check_is_a_per_lead_error() {
  let store = Arc::new(FlakyStore::new().await);
  store.fail_phone_lookup.store(true, Ordering::SeqCst);
  let org = Uuid::new_v4();
  let admin = store
    .add_user(NewUser {
      org_id:     org,
      name:       "Admin".into(),
      role:       Role::Admin,
      reports_to: None,
      is_active:  true,
    })
    .await
    .unwrap();
  let ingestor = Ingestor::new(Arc::clone(&store), IngestSettings::default());
  let ctx = AuthContext { user_id: admin.id, org_id: org, role: Role::Admin };

  let report = ingestor
    .import_leads(ctx, None, vec![raw("f1", Some("9000000001")), raw("f2", Some("9000000002"))])
    .await
    .unwrap();

  // Neither created nor silently skipped.
  assert_eq!(report.outcome.created, 0);
  assert_eq!(report.outcome.skipped_duplicates, 0);
  assert_eq!(report.outcome.error_count, 2);
  assert_eq!(report.outcome.status, BatchStatus::Failed);
  assert!(
    report
      .outcome
      .errors
      .iter()
      .all(|e| e.contains("duplicate check failed: store unavailable"))
  );

  store.fail_phone_lookup.store(false, Ordering::SeqCst);
  let retry = ingestor
    .import_leads(ctx, None, vec![raw("f1", Some("9000000001"))])
    .await
    .unwrap();
  assert_eq!(retry.outcome.created, 1);
}

async fn flaky_meta(store: &FlakyStore) -> Integration {
  store
    .add_integration(NewIntegration {
      org_id:      Uuid::new_v4(),
      platform:    Platform::Facebook,
      credentials: Credentials::default(),
      config:      IntegrationConfig::MetaLeadAds {
        page_id:        None,
        form_ids:       vec!["form-1".into()],
        ad_account_ids: vec![],
      },
      created_by:  Uuid::new_v4(),
    })
    .await
    .unwrap()
}

// ─── Sync bookkeeping ────────────────────────────────────────────────────────

#[tokio::test]
async fn lock_is_released_even_if_the_log_write_fails() {
  let store = Arc::new(FlakyStore::new().await);
  let meta = flaky_meta(&store).await;
  let ingestor = Ingestor::new(Arc::clone(&store), IngestSettings::default());
  let platform = FakePlatform {
    leads: vec![raw("a", Some("9000000001"))],
    ..Default::default()
  };

  store.fail_sync_log.store(true, Ordering::SeqCst);
  let err = ingestor
    .run_integration(meta.id, SyncType::Manual, &platform)
    .await
    .unwrap_err();

  let (failures, run) = match err {
    Error::Bookkeeping { failures, run } => (failures, run),
    other => panic!("expected a bookkeeping error, got {other:?}"),
  };
  assert_eq!(failures, vec!["write sync log: store unavailable"]);
  assert!(run.is_none());

  let state = store.get_integration(meta.id).await.unwrap().unwrap().sync;
  assert_eq!(state.status, SyncStatus::Idle);
  assert!(state.last_sync_at.is_some());
}

#[tokio::test]
async fn failed_release_still_logs_and_reports_both_errors() {
  let store = Arc::new(FlakyStore::new().await);
  let meta = flaky_meta(&store).await;
  let ingestor = Ingestor::new(Arc::clone(&store), IngestSettings::default());
  let platform = FakePlatform {
    refuse: HashSet::from([meta.id]),
    ..Default::default()
  };

  store.fail_finish_sync.store(true, Ordering::SeqCst);
  let err = ingestor
    .run_integration(meta.id, SyncType::Scheduled, &platform)
    .await
    .unwrap_err();

  let (failures, run) = match err {
    Error::Bookkeeping { failures, run } => (failures, run),
    other => panic!("expected a bookkeeping error, got {other:?}"),
  };
  assert_eq!(failures, vec!["release sync lock: store unavailable"]);
  assert!(matches!(run.as_deref(), Some(Error::Credential(_))));

  let logs = store.list_sync_logs(meta.id, 10).await.unwrap();
  assert_eq!(logs.len(), 1);
  assert_eq!(logs[0].status, SyncLogStatus::Error);
  assert!(logs[0].error_message.as_deref().unwrap().contains("refresh token revoked"));
}

#[tokio::test]
async fn abandoned_lock_is_taken_over_once_stale() {
  let store = Arc::new(FlakyStore::new().await);
  let meta = flaky_meta(&store).await;
  let cutoff = Utc::now() - chrono::Duration::hours(1);
  // A run that crashed while holding the lock.
  assert!(store.try_begin_sync(meta.id, cutoff).await.unwrap());

  let platform = FakePlatform {
    leads: vec![raw("a", Some("9000000001"))],
    ..Default::default()
  };

  let patient = Ingestor::new(Arc::clone(&store), IngestSettings::default());
  assert!(patient.poll_all(&platform).await.unwrap().is_empty());
  let err = patient
    .run_integration(meta.id, SyncType::Manual, &platform)
    .await
    .unwrap_err();
  assert!(matches!(err, Error::SyncInProgress(_)));

  let eager = Ingestor::new(Arc::clone(&store), IngestSettings {
    stale_sync_secs: 0,
    ..Default::default()
  });
  let results = eager.poll_all(&platform).await.unwrap();
  assert_eq!(results.len(), 1);
  assert_eq!(results[0].result.as_ref().unwrap().outcome.created, 1);

  let state = store.get_integration(meta.id).await.unwrap().unwrap().sync;
  assert_eq!(state.status, SyncStatus::Idle);
}

// ─── Paged phone dedupe ──────────────────────────────────────────────────────

fn candidate(phone: &str) -> Lead {
  Lead {
    id:             Uuid::new_v4(),
    org_id:         Uuid::nil(),
    external_id:    None,
    name:           "Candidate".into(),
    phone:          Some(phone.into()),
    email:          None,
    company:        None,
    source:         LeadSource::Manual,
    integration_id: None,
    assigned_to:    None,
    created_by:     None,
    status:         Default::default(),
    metadata:       LeadMetadata::Empty,
    custom_fields:  BTreeMap::new(),
    created_at:     Utc::now(),
    updated_at:     Utc::now(),
  }
}

/// `len` non-matching candidates, with `plant` placed at `at`.
fn candidate_page(len: usize, plant: Option<(usize, &str)>) -> Vec<Lead> {
  (0..len)
    .map(|i| match plant {
      Some((at, phone)) if at == i => candidate(phone),
      _ => candidate("+918000000001"),
    })
    .collect()
}

async fn paged_store(pages: Vec<Vec<Lead>>) -> FlakyStore {
  let mut store = FlakyStore::new().await;
  store.candidate_pages = Some(pages);
  store
}

#[tokio::test]
async fn exact_match_on_a_later_page_beats_an_earlier_fuzzy_one() {
  let exact = candidate("+919876543210");
  let mut second = candidate_page(PAGE_SIZE, None);
  second[10] = exact.clone();
  let store = paged_store(vec![
    candidate_page(PAGE_SIZE, Some((500, "+9109876543210"))),
    second,
    candidate_page(3, None),
  ])
  .await;

  let hit = find_duplicate(&store, &IndiaHeuristic, Uuid::nil(), "9876543210")
    .await
    .unwrap()
    .unwrap();

  assert_eq!(hit.id, exact.id);
  assert_eq!(*store.seen_offsets.lock().unwrap(), vec![0, PAGE_SIZE]);
}

#[tokio::test]
async fn first_fuzzy_match_wins_when_no_page_has_an_exact_one() {
  let first_fuzzy = candidate("+9109876543210");
  let mut first = candidate_page(PAGE_SIZE, None);
  first[500] = first_fuzzy.clone();
  let store = paged_store(vec![
    first,
    candidate_page(PAGE_SIZE, None),
    candidate_page(3, Some((1, "+91 0 98765 43210"))),
  ])
  .await;

  let hit = find_duplicate(&store, &IndiaHeuristic, Uuid::nil(), "9876543210")
    .await
    .unwrap()
    .unwrap();

  assert_eq!(hit.id, first_fuzzy.id);
  assert_eq!(*store.seen_offsets.lock().unwrap(), vec![0, PAGE_SIZE, 2 * PAGE_SIZE]);
}

#[tokio::test]
async fn scan_stops_after_an_empty_page_following_a_full_one() {
  let store = paged_store(vec![candidate_page(PAGE_SIZE, None)]).await;

  let hit = find_duplicate(&store, &IndiaHeuristic, Uuid::nil(), "9876543210")
    .await
    .unwrap();

  assert!(hit.is_none());
  assert_eq!(*store.seen_offsets.lock().unwrap(), vec![0, PAGE_SIZE]);
}

// ─── Reassignment ────────────────────────────────────────────────────────────

#[tokio::test]
async fn manager_cannot_touch_leads_outside_their_subtree() {
  let f = Fixture::new().await;
  let manager = f.user(Role::Manager, None).await;
  let report = f.user(Role::Sales, Some(manager.id)).await;
  let outsider = f.user(Role::Sales, None).await;

  let theirs = f.seed_lead(None, "9000000001").await;
  f.store
    .assign_leads(f.org, &[theirs.id], Some(outsider.id))
    .await
    .unwrap();
  let free = f.seed_lead(None, "9000000002").await;

  let err = f
    .ingestor
    .reassign_leads(f.ctx(&manager), &[free.id, theirs.id], Some(report.id))
    .await
    .unwrap_err();
  assert!(matches!(err, Error::Forbidden(_)));

  // Nothing moved, not even the lead that would have passed on its own.
  let leads = f.store.get_leads(f.org, &[theirs.id, free.id]).await.unwrap();
  for lead in leads {
    if lead.id == theirs.id {
      assert_eq!(lead.assigned_to, Some(outsider.id));
    } else {
      assert_eq!(lead.assigned_to, None);
    }
  }

  let changed = f
    .ingestor
    .reassign_leads(f.ctx(&manager), &[free.id], Some(report.id))
    .await
    .unwrap();
  assert_eq!(changed, 1);
}

#[tokio::test]
async fn manager_can_only_target_self_or_reportees() {
  let f = Fixture::new().await;
  let manager = f.user(Role::Manager, None).await;
  let direct = f.user(Role::Manager, Some(manager.id)).await;
  let indirect = f.user(Role::Sales, Some(direct.id)).await;
  let outsider = f.user(Role::Sales, None).await;
  let lead = f.seed_lead(None, "9000000001").await;

  let err = f
    .ingestor
    .reassign_leads(f.ctx(&manager), &[lead.id], Some(outsider.id))
    .await
    .unwrap_err();
  assert!(matches!(err, Error::Forbidden(_)));

  for target in [indirect.id, manager.id] {
    f.ingestor
      .reassign_leads(f.ctx(&manager), &[lead.id], Some(target))
      .await
      .unwrap();
  }
}

#[tokio::test]
async fn sales_claims_only_their_own_unassigned_leads() {
  let f = Fixture::new().await;
  let rep = f.user(Role::Sales, None).await;
  let other = f.user(Role::Sales, None).await;

  let LeadOutcome::Created(mine) = f
    .ingestor
    .create_manual_lead(f.ctx(&rep), raw("mine", Some("9000000001")))
    .await
  else {
    panic!("manual lead not created");
  };
  let not_mine = f.seed_lead(None, "9000000002").await;

  let err = f
    .ingestor
    .reassign_leads(f.ctx(&rep), &[mine.id], Some(other.id))
    .await
    .unwrap_err();
  assert!(matches!(err, Error::Forbidden(_)));

  let err = f
    .ingestor
    .reassign_leads(f.ctx(&rep), &[not_mine.id], Some(rep.id))
    .await
    .unwrap_err();
  assert!(matches!(err, Error::Forbidden(_)));

  let changed = f
    .ingestor
    .reassign_leads(f.ctx(&rep), &[mine.id], Some(rep.id))
    .await
    .unwrap();
  assert_eq!(changed, 1);
}

#[tokio::test]
async fn admin_reassigns_anything_but_only_to_members() {
  let f = Fixture::new().await;
  let rep = f.user(Role::Sales, None).await;
  let lead = f.seed_lead(None, "9000000001").await;

  let err = f
    .ingestor
    .reassign_leads(f.ctx(&f.admin), &[lead.id], Some(Uuid::new_v4()))
    .await
    .unwrap_err();
  assert!(matches!(err, Error::InvalidAssignee(_)));

  let err = f
    .ingestor
    .reassign_leads(f.ctx(&f.admin), &[Uuid::new_v4()], Some(rep.id))
    .await
    .unwrap_err();
  assert!(matches!(err, Error::LeadNotFound(_)));

  assert_eq!(
    f.ingestor
      .reassign_leads(f.ctx(&f.admin), &[lead.id, lead.id], Some(rep.id))
      .await
      .unwrap(),
    1
  );
  assert_eq!(
    f.ingestor
      .reassign_leads(f.ctx(&f.admin), &[lead.id], None)
      .await
      .unwrap(),
    1
  );
}

// ─── Call logs ───────────────────────────────────────────────────────────────

#[tokio::test]
async fn call_log_tolerance_window() {
  let f = Fixture::new().await;
  let rep = f.user(Role::Sales, None).await;
  let lead = f.seed_lead(None, "+919876543210").await;
  let t = Utc.with_ymd_and_hms(2024, 6, 1, 10, 0, 0).unwrap();

  let call = |offset_secs: i64, duration_secs: u32| RawCallLog {
    phone: "98765 43210".into(),
    direction: CallDirection::Outgoing,
    started_at: t + chrono::Duration::seconds(offset_secs),
    duration_secs,
  };

  let first = f
    .ingestor
    .ingest_call_logs(f.ctx(&rep), vec![call(0, 60), call(8, 63)])
    .await;
  assert_eq!(first.inserted.len(), 1);
  assert_eq!(first.duplicates, 1);
  assert_eq!(first.inserted[0].lead_id, Some(lead.id));
  assert_eq!(first.inserted[0].phone, "+919876543210");

  let second = f.ingestor.ingest_call_logs(f.ctx(&rep), vec![call(15, 60)]).await;
  assert_eq!(second.inserted.len(), 1);
  assert_eq!(second.duplicates, 0);

  let another_user = f.user(Role::Sales, None).await;
  let third = f
    .ingestor
    .ingest_call_logs(f.ctx(&another_user), vec![call(0, 60)])
    .await;
  assert_eq!(third.inserted.len(), 1);
}

#[tokio::test]
async fn call_log_without_phone_is_an_error() {
  let f = Fixture::new().await;
  let outcome = f
    .ingestor
    .ingest_call_logs(f.ctx(&f.admin), vec![RawCallLog {
      phone:         "private".into(),
      direction:     CallDirection::Missed,
      started_at:    Utc::now(),
      duration_secs: 0,
    }])
    .await;
  assert!(outcome.inserted.is_empty());
  assert_eq!(outcome.errors, vec!["#1: missing phone number"]);
}
