//! Time window, day counting and week buckets.

use chrono::{DateTime, Datelike, Days, NaiveDate, Utc};
use serde::Serialize;

use crate::error::{MetricsError, MetricsResult};

const MILLIS_PER_DAY: f64 = 86_400_000.0;

/// Inclusive `[from, to]` range changelog entries must fall into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TimeWindow {
  pub from: DateTime<Utc>,
  pub to: DateTime<Utc>,
}

impl TimeWindow {
  pub fn new(from: DateTime<Utc>, to: DateTime<Utc>) -> MetricsResult<Self> {
    if from > to {
      return Err(MetricsError::InvalidWindow { from, to });
    }
    Ok(Self { from, to })
  }

  pub fn contains(&self, at: DateTime<Utc>) -> bool {
    self.from <= at && at <= self.to
  }

  /// Keys of every week that overlaps the window, ascending.
  pub fn week_keys(&self) -> Vec<String> {
    let last = week_start(self.to);
    let mut keys = Vec::new();
    let mut start = Some(week_start(self.from));

    while let Some(s) = start.filter(|s| *s <= last) {
      keys.push(format_week(s));
      start = s.checked_add_days(Days::new(7));
    }
    keys
  }
}

/// Whole days between two instants, counting both ends: the same day is 1.
pub fn inclusive_days(a: DateTime<Utc>, b: DateTime<Utc>) -> i64 {
  let millis = (b - a).num_milliseconds().abs() as f64;
  (millis / MILLIS_PER_DAY).ceil() as i64 + 1
}

/// Bucket key of the Sunday-started week containing `at`, e.g. `2024-03`.
///
/// The key is taken from the week's Sunday, so a week spanning New Year keeps
/// a single key.
pub fn week_key(at: DateTime<Utc>) -> String {
  format_week(week_start(at))
}

fn week_start(at: DateTime<Utc>) -> NaiveDate {
  let date = at.date_naive();
  let offset = u64::from(date.weekday().num_days_from_sunday());
  date.checked_sub_days(Days::new(offset)).unwrap_or(date)
}

fn format_week(sunday: NaiveDate) -> String {
  sunday.format("%Y-%U").to_string()
}
