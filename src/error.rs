//! Errors surfaced by the metrics engine.

use chrono::{DateTime, Utc};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum MetricsError {
  /// The pages put back together do not add up to the total the server reported
  /// on the first page. Never retried: the result set changed mid-pagination.
  #[error("ISSUES_TOTAL_FETCH_ERROR: there is a total of {expected_total} issues but only {actual_count} could be fetched")]
  IncompleteFetch {
    expected_total: u64,
    actual_count: u64,
  },

  /// A quantile was requested over zero rows.
  #[error("no data: nothing to compute a quantile over")]
  EmptyInput,

  #[error("percentile must be within 1..=100, got {0}")]
  InvalidPercentile(f64),

  #[error("invalid time window: {from} is after {to}")]
  InvalidWindow {
    from: DateTime<Utc>,
    to: DateTime<Utc>,
  },

  #[error("transport error: {0}")]
  Transport(String),

  #[error("cache error: {0}")]
  Cache(String),

  #[error("serialization error: {0}")]
  Serialization(#[from] serde_json::Error),
}

pub type MetricsResult<T> = Result<T, MetricsError>;
