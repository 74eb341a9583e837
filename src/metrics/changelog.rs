//! Flat projection of every changelog item.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::jira::types::Issue;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChangelogRow {
  pub issue_key: String,
  pub issue_type: String,
  pub timestamp: DateTime<Utc>,
  pub field: String,
  pub from_value: Option<String>,
  pub to_value: Option<String>,
}

/// Which side of a status change to collect values from.
#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StatusSide {
  From,
  #[default]
  To,
}

/// One row per (issue, history entry, field change), any field, no window.
pub fn changelog_rows(issues: &[Issue]) -> Vec<ChangelogRow> {
  issues
    .iter()
    .flat_map(|issue| {
      issue.history.iter().flat_map(move |entry| {
        entry.transitions.iter().map(move |t| ChangelogRow {
          issue_key: issue.key.clone(),
          issue_type: issue.issue_type.clone(),
          timestamp: entry.timestamp,
          field: t.field.clone(),
          from_value: t.from_value.clone(),
          to_value: t.to_value.clone(),
        })
      })
    })
    .collect()
}

/// Distinct status names seen on `side` of status changes, sorted.
pub fn status_values(rows: &[ChangelogRow], side: StatusSide) -> Vec<String> {
  rows
    .iter()
    .filter(|row| row.field == "status")
    .filter_map(|row| match side {
      StatusSide::From => row.from_value.clone(),
      StatusSide::To => row.to_value.clone(),
    })
    .collect::<BTreeSet<_>>()
    .into_iter()
    .collect()
}
