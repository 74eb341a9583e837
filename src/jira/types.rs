use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// A search to run against the tracker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchQuery {
  /// JQL filter expression
  pub jql: String,
  /// Fields requested on top of the defaults (changelog shape only)
  pub extra_fields: BTreeSet<String>,
}

impl SearchQuery {
  pub fn new(jql: impl Into<String>) -> Self {
    Self {
      jql: jql.into(),
      extra_fields: BTreeSet::new(),
    }
  }

  pub fn with_extra_fields<I, F>(mut self, fields: I) -> Self
  where
    I: IntoIterator<Item = F>,
    F: Into<String>,
  {
    self.extra_fields.extend(fields.into_iter().map(Into::into));
    self
  }
}

/// Which fields a search asks the tracker for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchShape {
  /// Key, type and current status only
  Lean,
  /// Everything in `Lean` plus the expanded changelog and any extra fields
  Changelog,
}

/// Summary of an issue for list output
#[derive(Debug, Clone, Serialize)]
pub struct IssueSummary {
  pub key: String,
  pub issue_type: String,
  pub status: String,
}

/// An issue with its status history, as the metrics see it
#[derive(Debug, Clone)]
pub struct Issue {
  pub key: String,
  pub issue_type: String,
  pub current_status: String,
  /// Changelog events in the order the tracker delivered them (chronological)
  pub history: Vec<HistoryEntry>,
}

/// One changelog event; may change several fields at once
#[derive(Debug, Clone)]
pub struct HistoryEntry {
  pub timestamp: DateTime<Utc>,
  pub transitions: Vec<FieldTransition>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldTransition {
  pub field: String,
  pub from_value: Option<String>,
  pub to_value: Option<String>,
}

impl FieldTransition {
  pub fn is_status(&self) -> bool {
    self.field == "status"
  }

  /// True for a status change into `status`.
  pub fn enters(&self, status: &str) -> bool {
    self.is_status() && self.to_value.as_deref() == Some(status)
  }
}

/// What to do with a changelog entry whose timestamp can't be parsed.
#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MalformedTimestampPolicy {
  /// Keep the entry, dated at the earliest representable instant
  #[default]
  Earliest,
  /// Drop the entry
  Skip,
}

/// Issues converted for metric computation, plus how many history entries had
/// an unparsable timestamp.
#[derive(Debug, Clone, Default)]
pub struct IssueSet {
  pub issues: Vec<Issue>,
  pub malformed_entries: usize,
}

/// Parse a changelog timestamp.
///
/// Jira sends `2024-01-10T09:15:00.000+0100`; RFC 3339 is accepted too.
pub fn parse_jira_timestamp(raw: &str) -> Option<DateTime<Utc>> {
  DateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f%z")
    .or_else(|_| DateTime::parse_from_rfc3339(raw))
    .map(|dt| dt.with_timezone(&Utc))
    .ok()
}

#[cfg(test)]
mod tests {
  use super::*;
  use chrono::TimeZone;

  #[test]
  fn test_parse_jira_timestamp_with_offset() {
    let parsed = parse_jira_timestamp("2024-01-10T09:15:00.000+0100").unwrap();
    assert_eq!(parsed, Utc.with_ymd_and_hms(2024, 1, 10, 8, 15, 0).unwrap());
  }

  #[test]
  fn test_parse_rfc3339_fallback() {
    let parsed = parse_jira_timestamp("2024-01-10T09:15:00Z").unwrap();
    assert_eq!(parsed, Utc.with_ymd_and_hms(2024, 1, 10, 9, 15, 0).unwrap());
  }

  #[test]
  fn test_parse_garbage() {
    assert!(parse_jira_timestamp("").is_none());
    assert!(parse_jira_timestamp("yesterday").is_none());
  }

  #[test]
  fn test_enters_only_matches_status_field() {
    let t = FieldTransition {
      field: "resolution".into(),
      from_value: None,
      to_value: Some("Done".into()),
    };
    assert!(!t.enters("Done"));

    let t = FieldTransition {
      field: "status".into(),
      ..t
    };
    assert!(t.enters("Done"));
    assert!(!t.enters("done"));
  }
}
