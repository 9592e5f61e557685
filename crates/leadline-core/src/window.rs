//! Tolerant matching over a small candidate set.
//!
//! Both phone dedupe and call-log dedupe follow the same shape: ask the
//! store for a cheap superset of candidates, then decide in process. An
//! exact match anywhere wins; otherwise the first fuzzy match seen does.

use chrono::{DateTime, Duration, Utc};

/// Outcome of testing one candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchKind {
  Exact,
  Fuzzy,
}

/// Incremental exact-then-fuzzy scan across candidate pages.
#[derive(Debug)]
pub struct TolerantScan<T> {
  fallback: Option<T>,
}

impl<T> Default for TolerantScan<T> {
  fn default() -> Self { Self { fallback: None } }
}

impl<T> TolerantScan<T> {
  pub fn new() -> Self { Self::default() }

  /// Feed one page. Returns the first exact match as soon as it is seen;
  /// remembers the first fuzzy match for [`Self::finish`].
  pub fn feed<I, F>(&mut self, page: I, mut judge: F) -> Option<T>
  where
    I: IntoIterator<Item = T>,
    F: FnMut(&T) -> Option<MatchKind>,
  {
    for candidate in page {
      match judge(&candidate) {
        Some(MatchKind::Exact) => return Some(candidate),
        Some(MatchKind::Fuzzy) if self.fallback.is_none() => {
          self.fallback = Some(candidate);
        }
        Some(MatchKind::Fuzzy) | None => {}
      }
    }
    None
  }

  /// The fuzzy fallback, once every page has been fed.
  pub fn finish(self) -> Option<T> { self.fallback }
}

/// Single-page convenience over [`TolerantScan`].
pub fn find_tolerant<T, I, F>(candidates: I, judge: F) -> Option<T>
where
  I: IntoIterator<Item = T>,
  F: FnMut(&T) -> Option<MatchKind>,
{
  let mut scan = TolerantScan::new();
  scan.feed(candidates, judge).or_else(|| scan.finish())
}

/// A closed interval `center ± tolerance`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeWindow {
  pub center:    DateTime<Utc>,
  pub tolerance: Duration,
}

impl TimeWindow {
  pub fn around(center: DateTime<Utc>, tolerance: Duration) -> Self {
    Self { center, tolerance }
  }

  pub fn start(&self) -> DateTime<Utc> { self.center - self.tolerance }

  pub fn end(&self) -> DateTime<Utc> { self.center + self.tolerance }

  pub fn contains(&self, at: DateTime<Utc>) -> bool {
    at >= self.start() && at <= self.end()
  }
}
