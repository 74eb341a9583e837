//! Age of work items sitting in a status.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::error::MetricsResult;
use crate::jira::types::Issue;

use super::quantile::quantile;
use super::window::{inclusive_days, TimeWindow};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WorkItemAgeRow {
  pub issue_key: String,
  pub issue_type: String,
  pub status: String,
  pub last_transition: DateTime<Utc>,
  pub age_days: i64,
  pub quantile: f64,
}

/// Age, as of `now`, of every issue currently in `status`.
///
/// Age runs from the latest in-window transition into `status`; issues with
/// no such transition are left out.
pub fn work_item_age(
  issues: &[Issue],
  window: &TimeWindow,
  status: &str,
  percentile: f64,
  now: DateTime<Utc>,
) -> MetricsResult<Vec<WorkItemAgeRow>> {
  let mut rows: Vec<WorkItemAgeRow> = issues
    .iter()
    .filter(|issue| issue.current_status == status)
    .filter_map(|issue| {
      let last_transition = issue
        .history
        .iter()
        .filter(|entry| window.contains(entry.timestamp))
        .filter(|entry| entry.transitions.iter().any(|t| t.enters(status)))
        .map(|entry| entry.timestamp)
        .max()?;

      Some(WorkItemAgeRow {
        issue_key: issue.key.clone(),
        issue_type: issue.issue_type.clone(),
        status: status.to_string(),
        last_transition,
        age_days: inclusive_days(last_transition, now),
        quantile: 0.0,
      })
    })
    .collect();

  let ages: Vec<f64> = rows.iter().map(|r| r.age_days as f64).collect();
  let q = quantile(&ages, percentile)?;
  for row in &mut rows {
    row.quantile = q;
  }

  Ok(rows)
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::error::MetricsError;
  use crate::testing::{issue, ts};

  fn window() -> TimeWindow {
    TimeWindow::new(ts(2024, 1, 1, 0), ts(2024, 6, 30, 0)).unwrap()
  }

  #[test]
  fn test_age_from_latest_entry_into_status() {
    let now = ts(2024, 3, 10, 0);
    let issues = vec![issue(
      "FLOW-1",
      "In Progress",
      &[
        (ts(2024, 3, 1, 0), "In Progress"),
        (ts(2024, 3, 2, 0), "Blocked"),
        (ts(2024, 3, 5, 0), "In Progress"),
      ],
    )];

    let rows = work_item_age(&issues, &window(), "In Progress", 85.0, now).unwrap();

    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].last_transition, ts(2024, 3, 5, 0));
    assert_eq!(rows[0].age_days, 6);
    assert_eq!(rows[0].quantile, 6.0);
  }

  #[test]
  fn test_only_issues_currently_in_status() {
    let now = ts(2024, 3, 10, 0);
    let issues = vec![
      issue("FLOW-1", "Done", &[(ts(2024, 3, 1, 0), "In Progress"), (ts(2024, 3, 2, 0), "Done")]),
      issue("FLOW-2", "In Progress", &[(ts(2024, 3, 9, 0), "In Progress")]),
    ];

    let rows = work_item_age(&issues, &window(), "In Progress", 85.0, now).unwrap();

    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].issue_key, "FLOW-2");
    assert_eq!(rows[0].age_days, 2);
  }

  #[test]
  fn test_issue_without_in_window_transition_is_excluded() {
    let now = ts(2024, 3, 10, 0);
    let issues = vec![
      issue("FLOW-1", "In Progress", &[(ts(2023, 12, 1, 0), "In Progress")]),
      issue("FLOW-2", "In Progress", &[(ts(2024, 3, 1, 0), "In Progress")]),
    ];

    let rows = work_item_age(&issues, &window(), "In Progress", 50.0, now).unwrap();

    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].issue_key, "FLOW-2");
  }

  #[test]
  fn test_nothing_in_status_is_empty_input() {
    let issues = vec![issue("FLOW-1", "Done", &[(ts(2024, 3, 1, 0), "Done")])];

    let result = work_item_age(&issues, &window(), "In Progress", 85.0, ts(2024, 3, 10, 0));

    assert!(matches!(result, Err(MetricsError::EmptyInput)));
  }
}
