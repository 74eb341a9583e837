//! Cycle time between entering a start status and entering an end status.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::MetricsResult;
use crate::jira::types::{FieldTransition, Issue};

use super::quantile::quantile;
use super::window::{inclusive_days, TimeWindow};

/// When a completed start/end pair produces a row.
#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum EmissionPolicy {
  /// Every status change that moves the start or end marker while the other
  /// one is set emits a row, so an issue can show up several times.
  #[default]
  EveryPair,
  /// At most one row per issue: the first completed pair.
  FirstPair,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CycleTimeParams {
  pub start_status: String,
  pub end_status: String,
  pub percentile: f64,
  pub emission: EmissionPolicy,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CycleTimeRow {
  pub issue_key: String,
  pub issue_type: String,
  pub start_status: String,
  pub end_status: String,
  pub end_timestamp: DateTime<Utc>,
  pub cycle_time_days: i64,
  /// Requested quantile over all rows, repeated on each row
  pub quantile: f64,
}

/// Completed pair of marker timestamps.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Pair {
  start: DateTime<Utc>,
  end: DateTime<Utc>,
}

/// Per-issue scan state: the latest time each status was entered.
#[derive(Debug, Clone, Copy, Default)]
struct PairScan {
  last_start: Option<DateTime<Utc>>,
  last_end: Option<DateTime<Utc>>,
  emitted: bool,
}

impl PairScan {
  fn step(
    self,
    at: DateTime<Utc>,
    transition: &FieldTransition,
    params: &CycleTimeParams,
  ) -> (Self, Option<Pair>) {
    let enters_start = transition.enters(&params.start_status);
    let enters_end = transition.enters(&params.end_status);
    if !enters_start && !enters_end {
      return (self, None);
    }

    let next = PairScan {
      last_start: if enters_start { Some(at) } else { self.last_start },
      last_end: if enters_end { Some(at) } else { self.last_end },
      emitted: self.emitted,
    };

    let blocked = params.emission == EmissionPolicy::FirstPair && self.emitted;
    match (next.last_start, next.last_end) {
      (Some(start), Some(end)) if !blocked => (
        PairScan {
          emitted: true,
          ..next
        },
        Some(Pair { start, end }),
      ),
      _ => (next, None),
    }
  }
}

/// Scan one issue's history inside `window`, returning every emitted pair.
fn scan_issue(issue: &Issue, window: &TimeWindow, params: &CycleTimeParams) -> Vec<Pair> {
  let mut state = PairScan::default();
  let mut pairs = Vec::new();

  for entry in issue.history.iter().filter(|e| window.contains(e.timestamp)) {
    for transition in &entry.transitions {
      let (next, emitted) = state.step(entry.timestamp, transition, params);
      state = next;
      pairs.extend(emitted);
    }
  }
  pairs
}

pub fn cycle_time(
  issues: &[Issue],
  window: &TimeWindow,
  params: &CycleTimeParams,
) -> MetricsResult<Vec<CycleTimeRow>> {
  let mut rows: Vec<CycleTimeRow> = issues
    .iter()
    .flat_map(|issue| {
      scan_issue(issue, window, params)
        .into_iter()
        .map(move |pair| CycleTimeRow {
          issue_key: issue.key.clone(),
          issue_type: issue.issue_type.clone(),
          start_status: params.start_status.clone(),
          end_status: params.end_status.clone(),
          end_timestamp: pair.end,
          cycle_time_days: inclusive_days(pair.start, pair.end),
          quantile: 0.0,
        })
    })
    .collect();

  let days: Vec<f64> = rows.iter().map(|r| r.cycle_time_days as f64).collect();
  let q = quantile(&days, params.percentile)?;
  for row in &mut rows {
    row.quantile = q;
  }

  Ok(rows)
}
