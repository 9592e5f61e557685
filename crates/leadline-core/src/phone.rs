//! Phone number canonicalisation and the equality used for dedupe.
//!
//! Normalisation is a narrow heuristic tuned for Indian mobile numbers, not
//! a numbering-plan library. Two phones are treated as the same subscriber
//! if their normalised forms are identical, or failing that, if their last
//! ten digits are. The suffix fallback accepts some false positives (two
//! different country codes sharing a local number) in exchange for fewer
//! missed duplicates.

/// Digits in a subscriber number, used for the suffix fallback.
pub const SUBSCRIBER_DIGITS: usize = 10;

/// Pluggable canonicalisation so other regions can be added without
/// touching dedupe.
pub trait PhoneNormalizer: Send + Sync {
  /// Canonicalise `raw`. Must be total; empty or digit-free input yields an
  /// empty string.
  fn normalize(&self, raw: &str, region_hint: Option<&str>) -> String;
}

/// The default normaliser: assumes India (`+91`) for bare 10-digit mobile
/// numbers.
#[derive(Debug, Clone, Copy, Default)]
pub struct IndiaHeuristic;

impl PhoneNormalizer for IndiaHeuristic {
  fn normalize(&self, raw: &str, region_hint: Option<&str>) -> String {
    let trimmed = raw.trim();
    let has_plus = trimmed.starts_with('+');
    let digits = digits_of(trimmed);

    if digits.is_empty() {
      return String::new();
    }
    if has_plus {
      return format!("+{digits}");
    }

    let domestic = region_hint.is_none_or(|r| r.eq_ignore_ascii_case("IN"));
    if domestic
      && digits.len() == 10
      && matches!(digits.as_bytes()[0], b'6'..=b'9')
    {
      return format!("+91{digits}");
    }
    if digits.len() == 12 && digits.starts_with("91") {
      return format!("+{digits}");
    }
    if digits.len() > 10 {
      return format!("+{digits}");
    }
    digits
  }
}

/// Normalise with the default heuristic and no region hint.
pub fn normalize(raw: &str) -> String { IndiaHeuristic.normalize(raw, None) }

/// The ASCII digits of `raw`, in order.
pub fn digits_of(raw: &str) -> String {
  raw.chars().filter(char::is_ascii_digit).collect()
}

/// The last ten digits of `raw`, or all of them if there are fewer.
pub fn subscriber_suffix(raw: &str) -> String {
  let digits = digits_of(raw);
  let start = digits.len().saturating_sub(SUBSCRIBER_DIGITS);
  digits[start..].to_string()
}

/// How two phones were judged equal, if at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PhoneMatch {
  Exact,
  Suffix,
}

/// Compare two already-normalised phones.
pub fn compare(a: &str, b: &str) -> Option<PhoneMatch> {
  if a.is_empty() || b.is_empty() {
    return None;
  }
  if a == b {
    return Some(PhoneMatch::Exact);
  }
  let suffix = subscriber_suffix(a);
  if !suffix.is_empty() && suffix == subscriber_suffix(b) {
    return Some(PhoneMatch::Suffix);
  }
  None
}
