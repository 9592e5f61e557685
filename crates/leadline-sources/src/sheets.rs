//! Google Sheets adapter.
//!
//! The first row of the configured range is the header. Columns are matched
//! to lead fields by header text (case-insensitive), every other non-empty
//! cell becomes a custom field, and the sheet row number forms the external
//! id so re-reading the sheet is idempotent.

use std::collections::BTreeMap;

use leadline_core::{
  integration::SheetColumns,
  lead::{LeadMetadata, RawLeadData},
};
use serde::Deserialize;

use crate::{
  GoogleSettings, Result,
  error::{self, Error},
};

/// Response of `GET /spreadsheets/{id}/values/{range}`.
#[derive(Debug, Default, Deserialize)]
pub struct ValueRange {
  #[serde(default)]
  pub values: Vec<Vec<String>>,
}

/// Sheet name and first row number of an A1 range such as `Leads!A2:F`.
/// A range without a sheet name starts on the first sheet.
pub fn range_origin(range: &str) -> (Option<String>, u32) {
  let (sheet, cells) = match range.rsplit_once('!') {
    Some((sheet, cells)) => (Some(sheet.trim_matches('\'').to_owned()), cells),
    None => (None, range),
  };
  let start = cells.split(':').next().unwrap_or_default();
  let row = start
    .trim_start_matches(|c: char| c.is_ascii_alphabetic() || c == '$')
    .parse()
    .unwrap_or(1);
  (sheet, row)
}

fn column_index(header: &[String], wanted: &str) -> Option<usize> {
  header
    .iter()
    .position(|h| h.trim().eq_ignore_ascii_case(wanted.trim()))
}

/// Decode the rows of `range` into raw leads. Blank rows are dropped.
pub fn decode_rows(
  spreadsheet_id: &str,
  range: &str,
  columns: &SheetColumns,
  table: ValueRange,
) -> Vec<RawLeadData> {
  let mut rows = table.values.into_iter();
  let Some(header) = rows.next() else {
    return Vec::new();
  };
  let (sheet_name, header_row) = range_origin(range);

  let name_at = column_index(&header, &columns.name);
  let phone_at = column_index(&header, &columns.phone);
  let email_at = column_index(&header, &columns.email);
  let company_at = column_index(&header, &columns.company);
  let known = [name_at, phone_at, email_at, company_at];

  rows
    .enumerate()
    .filter_map(|(offset, cells)| {
      if cells.iter().all(|c| c.trim().is_empty()) {
        return None;
      }
      let row = header_row + 1 + u32::try_from(offset).ok()?;
      let cell = |at: Option<usize>| {
        at.and_then(|i| cells.get(i))
          .map(|c| c.trim())
          .filter(|c| !c.is_empty())
          .map(str::to_owned)
      };

      let custom_fields: BTreeMap<String, String> = header
        .iter()
        .enumerate()
        .filter(|(i, h)| !known.contains(&Some(*i)) && !h.trim().is_empty())
        .filter_map(|(i, h)| {
          let value = cells.get(i)?.trim();
          (!value.is_empty()).then(|| (h.trim().to_owned(), value.to_owned()))
        })
        .collect();

      let sheet = sheet_name.as_deref().unwrap_or("Sheet1");
      Some(RawLeadData {
        external_id: Some(format!("{spreadsheet_id}:{sheet}:{row}")),
        name: cell(name_at),
        phone: cell(phone_at),
        email: cell(email_at),
        company: cell(company_at),
        created_at: None,
        metadata: LeadMetadata::SheetRow {
          spreadsheet_id: spreadsheet_id.to_owned(),
          sheet_name: sheet_name.clone(),
          row,
        },
        custom_fields,
      })
    })
    .collect()
}

pub(crate) async fn fetch_rows(
  http: &reqwest::Client,
  settings: &GoogleSettings,
  token: &str,
  spreadsheet_id: &str,
  range: &str,
  columns: &SheetColumns,
) -> Result<Vec<RawLeadData>> {
  let mut url = error::parse_url(settings.sheets_base_url.trim_end_matches('/'))?;
  url
    .path_segments_mut()
    .map_err(|()| Error::BaseUrl(settings.sheets_base_url.clone()))?
    .extend(["spreadsheets", spreadsheet_id, "values", range]);

  let resp = http.get(url).bearer_auth(token).send().await?;
  let table: ValueRange = error::check("google sheets", resp).await?.json().await?;
  tracing::debug!(%spreadsheet_id, rows = table.values.len(), "fetched sheet values");
  Ok(decode_rows(spreadsheet_id, range, columns, table))
}
