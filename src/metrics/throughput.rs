//! Weekly throughput: how often issues entered the end status.

use serde::Serialize;
use std::collections::BTreeMap;

use crate::jira::types::Issue;

use super::window::{week_key, TimeWindow};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ThroughputRow {
  pub week: String,
  pub count: u64,
}

/// Count transitions into `end_status` per week. Every week overlapping the
/// window is present, zero or not. An issue entering the end status twice
/// counts twice.
pub fn throughput(issues: &[Issue], window: &TimeWindow, end_status: &str) -> Vec<ThroughputRow> {
  let mut buckets: BTreeMap<String, u64> =
    window.week_keys().into_iter().map(|week| (week, 0)).collect();

  let arrivals = issues
    .iter()
    .flat_map(|issue| issue.history.iter())
    .filter(|entry| window.contains(entry.timestamp))
    .flat_map(|entry| {
      entry
        .transitions
        .iter()
        .filter(|t| t.enters(end_status))
        .map(move |_| entry.timestamp)
    });

  for at in arrivals {
    *buckets.entry(week_key(at)).or_insert(0) += 1;
  }

  buckets
    .into_iter()
    .map(|(week, count)| ThroughputRow { week, count })
    .collect()
}
