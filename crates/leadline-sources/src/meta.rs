//! Meta (Facebook / Instagram) lead-ads adapter.
//!
//! Leads are read per form from the Graph API edge `/{form_id}/leads`. Each
//! lead carries its answers as `field_data` name/value pairs; the well-known
//! ones become columns and the rest land in `custom_fields`.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use leadline_core::lead::{LeadMetadata, RawLeadData};
use serde::Deserialize;

use crate::{MetaSettings, Result, error};

const NAME_FIELDS: &[&str] = &["full_name", "name"];
const PHONE_FIELDS: &[&str] = &["phone_number", "phone", "mobile_number"];
const EMAIL_FIELDS: &[&str] = &["email", "email_address"];
const COMPANY_FIELDS: &[&str] = &["company_name", "company"];
const FIRST_NAME_FIELDS: &[&str] = &["first_name"];
const LAST_NAME_FIELDS: &[&str] = &["last_name"];

/// Graph timestamps look like `2024-05-01T12:00:00+0000`.
const GRAPH_TIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%z";

const LEAD_FIELDS: &str = "id,created_time,field_data,form_id,campaign_id,ad_id";

// ─── Wire types ──────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct FieldData {
  pub name:   String,
  #[serde(default)]
  pub values: Vec<String>,
}

/// One lead as returned by the Graph API.
#[derive(Debug, Deserialize)]
pub struct GraphLead {
  pub id:           String,
  pub created_time: Option<String>,
  #[serde(default)]
  pub field_data:   Vec<FieldData>,
  pub form_id:      Option<String>,
  pub campaign_id:  Option<String>,
  pub ad_id:        Option<String>,
}

#[derive(Debug, Deserialize)]
struct Paging {
  next: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Page<T> {
  #[serde(default = "Vec::new")]
  data:   Vec<T>,
  paging: Option<Paging>,
}

// ─── Decoding ────────────────────────────────────────────────────────────────

fn parse_graph_time(s: &str) -> Option<DateTime<Utc>> {
  DateTime::parse_from_str(s, GRAPH_TIME_FORMAT)
    .or_else(|_| DateTime::parse_from_rfc3339(s))
    .ok()
    .map(|dt| dt.with_timezone(&Utc))
}

/// Convert one Graph lead into the pipeline's raw shape. `form_id` fills in
/// for leads that omit their own.
pub fn decode_lead(lead: GraphLead, form_id: Option<&str>, page_id: Option<&str>) -> RawLeadData {
  let mut fields: BTreeMap<String, String> = lead
    .field_data
    .into_iter()
    .filter_map(|f| {
      let value = f.values.into_iter().find(|v| !v.trim().is_empty())?;
      Some((f.name.to_ascii_lowercase(), value))
    })
    .collect();

  let mut take = |names: &[&str]| names.iter().find_map(|n| fields.remove(*n));

  let name = take(NAME_FIELDS).or_else(|| {
    let first = take(FIRST_NAME_FIELDS);
    let last = take(LAST_NAME_FIELDS);
    match (first, last) {
      (Some(f), Some(l)) => Some(format!("{f} {l}")),
      (f, l) => f.or(l),
    }
  });
  let phone = take(PHONE_FIELDS);
  let email = take(EMAIL_FIELDS);
  let company = take(COMPANY_FIELDS);

  RawLeadData {
    external_id: Some(lead.id),
    name,
    phone,
    email,
    company,
    created_at: lead.created_time.as_deref().and_then(parse_graph_time),
    metadata: LeadMetadata::MetaLeadAd {
      form_id:     lead.form_id.or_else(|| form_id.map(str::to_owned)),
      campaign_id: lead.campaign_id,
      ad_id:       lead.ad_id,
      page_id:     page_id.map(str::to_owned),
    },
    custom_fields: fields,
  }
}

// ─── Fetching ────────────────────────────────────────────────────────────────

/// First page of `/{form_id}/leads`, filtered to leads created after `since`.
fn leads_url(
  settings: &MetaSettings,
  form_id: &str,
  since: Option<DateTime<Utc>>,
) -> Result<reqwest::Url> {
  let base = format!("{}/{form_id}/leads", settings.graph_base_url.trim_end_matches('/'));
  let mut url = error::parse_url(&base)?;
  {
    let mut query = url.query_pairs_mut();
    query
      .append_pair("fields", LEAD_FIELDS)
      .append_pair("limit", &settings.page_size.to_string());
    if let Some(since) = since {
      let filter = serde_json::json!([{
        "field": "time_created",
        "operator": "GREATER_THAN",
        "value": since.timestamp(),
      }]);
      query.append_pair("filtering", &filter.to_string());
    }
  }
  Ok(url)
}

/// Graph echoes the token into `paging.next`; it travels in the
/// `Authorization` header instead.
fn without_token(mut url: reqwest::Url) -> reqwest::Url {
  let kept: Vec<(String, String)> = url
    .query_pairs()
    .filter(|(key, _)| key != "access_token")
    .map(|(key, value)| (key.into_owned(), value.into_owned()))
    .collect();
  if kept.is_empty() {
    url.set_query(None);
  } else {
    url.query_pairs_mut().clear().extend_pairs(kept);
  }
  url
}

fn page_request(
  http: &reqwest::Client,
  url: reqwest::Url,
  token: &str,
) -> reqwest::RequestBuilder {
  http.get(url).bearer_auth(token)
}

/// All leads of `form_ids` created after `since`, following Graph paging.
pub(crate) async fn fetch_leads(
  http: &reqwest::Client,
  settings: &MetaSettings,
  token: &str,
  page_id: Option<&str>,
  form_ids: &[String],
  since: Option<DateTime<Utc>>,
) -> Result<Vec<RawLeadData>> {
  let mut leads = Vec::new();

  for form_id in form_ids {
    let mut next = Some(leads_url(settings, form_id, since)?);
    while let Some(url) = next.take() {
      let resp = error::check("meta", page_request(http, url, token).send().await?).await?;
      let page: Page<GraphLead> = resp.json().await?;
      tracing::debug!(%form_id, count = page.data.len(), "fetched meta lead page");
      leads.extend(
        page
          .data
          .into_iter()
          .map(|lead| decode_lead(lead, Some(form_id), page_id)),
      );
      next = page
        .paging
        .and_then(|p| p.next)
        .map(|link| error::parse_url(&link).map(without_token))
        .transpose()?;
    }
  }

  Ok(leads)
}
