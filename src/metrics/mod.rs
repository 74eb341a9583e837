//! Metrics derived from issue changelogs.
//!
//! Every metric scans the same issue set and differs only in how it walks and
//! aggregates each history. Quantile-bearing metrics fail with
//! [`MetricsError::EmptyInput`](crate::error::MetricsError::EmptyInput) when
//! nothing qualifies.

mod age;
mod changelog;
mod cycle_time;
mod quantile;
mod throughput;
mod window;

pub use age::{work_item_age, WorkItemAgeRow};
pub use changelog::{changelog_rows, status_values, ChangelogRow, StatusSide};
pub use cycle_time::{cycle_time, CycleTimeParams, CycleTimeRow, EmissionPolicy};
pub use quantile::quantile;
pub use throughput::{throughput, ThroughputRow};
pub use window::{inclusive_days, week_key, TimeWindow};

use serde::Serialize;
use std::sync::Arc;

use crate::cache::{Clock, SystemClock};
use crate::error::MetricsResult;
use crate::jira::types::IssueSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricKind {
  CycleTime,
  Throughput,
  WorkItemAge,
  ChangelogRaw,
}

impl MetricKind {
  pub const ALL: [MetricKind; 4] = [
    MetricKind::CycleTime,
    MetricKind::Throughput,
    MetricKind::WorkItemAge,
    MetricKind::ChangelogRaw,
  ];

  pub fn id(&self) -> &'static str {
    match self {
      MetricKind::CycleTime => "cycle_time",
      MetricKind::Throughput => "throughput",
      MetricKind::WorkItemAge => "work_item_age",
      MetricKind::ChangelogRaw => "changelog_raw",
    }
  }

  pub fn label(&self) -> &'static str {
    match self {
      MetricKind::CycleTime => "cycle time",
      MetricKind::Throughput => "throughput",
      MetricKind::WorkItemAge => "work item age",
      MetricKind::ChangelogRaw => "change log - raw data",
    }
  }
}

/// Catalogue entry for a metric kind
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MetricKindInfo {
  pub id: &'static str,
  pub label: &'static str,
}

impl From<MetricKind> for MetricKindInfo {
  fn from(kind: MetricKind) -> Self {
    Self {
      id: kind.id(),
      label: kind.label(),
    }
  }
}

/// A metric to compute, with its parameters.
#[derive(Debug, Clone, PartialEq)]
pub enum MetricSpec {
  CycleTime {
    start_status: String,
    end_status: String,
    percentile: f64,
  },
  Throughput {
    end_status: String,
  },
  WorkItemAge {
    status: String,
    percentile: f64,
  },
  ChangelogRaw,
}

impl MetricSpec {
  pub fn kind(&self) -> MetricKind {
    match self {
      MetricSpec::CycleTime { .. } => MetricKind::CycleTime,
      MetricSpec::Throughput { .. } => MetricKind::Throughput,
      MetricSpec::WorkItemAge { .. } => MetricKind::WorkItemAge,
      MetricSpec::ChangelogRaw => MetricKind::ChangelogRaw,
    }
  }
}

/// Rows produced by one metric.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "metric", content = "rows", rename_all = "snake_case")]
pub enum MetricTable {
  CycleTime(Vec<CycleTimeRow>),
  Throughput(Vec<ThroughputRow>),
  WorkItemAge(Vec<WorkItemAgeRow>),
  ChangelogRaw(Vec<ChangelogRow>),
}

impl MetricTable {
  pub fn len(&self) -> usize {
    match self {
      MetricTable::CycleTime(rows) => rows.len(),
      MetricTable::Throughput(rows) => rows.len(),
      MetricTable::WorkItemAge(rows) => rows.len(),
      MetricTable::ChangelogRaw(rows) => rows.len(),
    }
  }

  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricOutput {
  #[serde(flatten)]
  pub table: MetricTable,
  /// History entries whose timestamp couldn't be parsed
  pub malformed_entries: usize,
}

/// Runs metric scans over an already fetched issue set.
#[derive(Clone)]
pub struct MetricsEngine {
  emission: EmissionPolicy,
  clock: Arc<dyn Clock>,
}

impl Default for MetricsEngine {
  fn default() -> Self {
    Self::new()
  }
}

impl MetricsEngine {
  pub fn new() -> Self {
    Self {
      emission: EmissionPolicy::default(),
      clock: Arc::new(SystemClock),
    }
  }

  pub fn with_emission(mut self, emission: EmissionPolicy) -> Self {
    self.emission = emission;
    self
  }

  /// Clock used as "now" for work item age.
  pub fn with_clock(mut self, clock: impl Clock + 'static) -> Self {
    self.clock = Arc::new(clock);
    self
  }

  /// Compute `spec` over `issues`. `window` is ignored by the raw changelog.
  pub fn compute(
    &self,
    spec: &MetricSpec,
    issues: &IssueSet,
    window: &TimeWindow,
  ) -> MetricsResult<MetricOutput> {
    let table = match spec {
      MetricSpec::CycleTime {
        start_status,
        end_status,
        percentile,
      } => {
        let params = CycleTimeParams {
          start_status: start_status.clone(),
          end_status: end_status.clone(),
          percentile: *percentile,
          emission: self.emission,
        };
        MetricTable::CycleTime(cycle_time(&issues.issues, window, &params)?)
      }
      MetricSpec::Throughput { end_status } => {
        MetricTable::Throughput(throughput(&issues.issues, window, end_status))
      }
      MetricSpec::WorkItemAge { status, percentile } => MetricTable::WorkItemAge(work_item_age(
        &issues.issues,
        window,
        status,
        *percentile,
        self.clock.now(),
      )?),
      MetricSpec::ChangelogRaw => MetricTable::ChangelogRaw(changelog_rows(&issues.issues)),
    };

    tracing::debug!(
      metric = spec.kind().id(),
      rows = table.len(),
      malformed = issues.malformed_entries,
      "computed metric"
    );

    Ok(MetricOutput {
      table,
      malformed_entries: issues.malformed_entries,
    })
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::cache::ManualClock;
  use crate::testing::{issue, ts};

  fn issue_set() -> IssueSet {
    IssueSet {
      issues: vec![
        issue(
          "FLOW-1",
          "Done",
          &[(ts(2024, 1, 8, 0), "In Progress"), (ts(2024, 1, 10, 0), "Done")],
        ),
        issue("FLOW-2", "In Progress", &[(ts(2024, 1, 15, 0), "In Progress")]),
      ],
      malformed_entries: 2,
    }
  }

  fn window() -> TimeWindow {
    TimeWindow::new(ts(2024, 1, 7, 0), ts(2024, 1, 20, 23)).unwrap()
  }

  #[test]
  fn test_catalogue() {
    let ids: Vec<&str> = MetricKind::ALL.iter().map(|k| k.id()).collect();
    assert_eq!(ids, vec!["cycle_time", "throughput", "work_item_age", "changelog_raw"]);
    assert_eq!(MetricKindInfo::from(MetricKind::ChangelogRaw).label, "change log - raw data");
  }

  #[test]
  fn test_dispatch_by_spec() {
    let engine = MetricsEngine::new().with_clock(ManualClock::new(ts(2024, 1, 20, 0)));
    let issues = issue_set();

    let cycle = engine
      .compute(
        &MetricSpec::CycleTime {
          start_status: "In Progress".into(),
          end_status: "Done".into(),
          percentile: 85.0,
        },
        &issues,
        &window(),
      )
      .unwrap();
    assert!(matches!(&cycle.table, MetricTable::CycleTime(rows) if rows.len() == 1));
    assert_eq!(cycle.malformed_entries, 2);

    let weekly = engine
      .compute(&MetricSpec::Throughput { end_status: "Done".into() }, &issues, &window())
      .unwrap();
    assert!(matches!(&weekly.table, MetricTable::Throughput(rows) if rows.len() == 2));

    let age = engine
      .compute(
        &MetricSpec::WorkItemAge {
          status: "In Progress".into(),
          percentile: 85.0,
        },
        &issues,
        &window(),
      )
      .unwrap();
    match &age.table {
      MetricTable::WorkItemAge(rows) => assert_eq!(rows[0].age_days, 6),
      other => panic!("unexpected table {:?}", other),
    }

    let raw = engine.compute(&MetricSpec::ChangelogRaw, &issues, &window()).unwrap();
    assert_eq!(raw.table.len(), 3);
  }

  #[test]
  fn test_emission_policy_is_applied() {
    let issues = IssueSet {
      issues: vec![issue(
        "FLOW-1",
        "Done",
        &[
          (ts(2024, 1, 8, 0), "In Progress"),
          (ts(2024, 1, 9, 0), "Done"),
          (ts(2024, 1, 10, 0), "In Progress"),
          (ts(2024, 1, 11, 0), "Done"),
        ],
      )],
      malformed_entries: 0,
    };
    let spec = MetricSpec::CycleTime {
      start_status: "In Progress".into(),
      end_status: "Done".into(),
      percentile: 50.0,
    };

    let every = MetricsEngine::new().compute(&spec, &issues, &window()).unwrap();
    let first = MetricsEngine::new()
      .with_emission(EmissionPolicy::FirstPair)
      .compute(&spec, &issues, &window())
      .unwrap();

    assert_eq!(every.table.len(), 3);
    assert_eq!(first.table.len(), 1);
  }

  #[test]
  fn test_output_serializes_with_metric_tag() {
    let engine = MetricsEngine::new();
    let output = engine
      .compute(&MetricSpec::Throughput { end_status: "Done".into() }, &issue_set(), &window())
      .unwrap();

    let json = serde_json::to_value(&output).unwrap();
    assert_eq!(json["metric"], "throughput");
    assert_eq!(json["rows"][0]["week"], "2024-01");
    assert_eq!(json["rows"][0]["count"], 1);
    assert_eq!(json["malformed_entries"], 2);
  }
}
