//! Serde types matching the Jira search endpoint.
//!
//! These types are separate from domain types so the cache can store pages
//! exactly as they came off the wire, while the metrics work on the narrower
//! domain model.

use chrono::DateTime;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use super::types::{
  parse_jira_timestamp, FieldTransition, HistoryEntry, Issue, IssueSummary,
  MalformedTimestampPolicy,
};

// ============================================================================
// Common nested field types
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiStatus {
  #[serde(default)]
  pub id: String,
  pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiIssueType {
  pub name: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ApiIssueFields {
  pub status: Option<ApiStatus>,
  #[serde(rename = "issuetype")]
  pub issue_type: Option<ApiIssueType>,
  // Extra fields requested by the caller
  #[serde(flatten)]
  pub extra: HashMap<String, serde_json::Value>,
}

// ============================================================================
// Changelog (expand=changelog)
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiHistoryItem {
  pub field: String,
  #[serde(rename = "fromString", default)]
  pub from_value: Option<String>,
  #[serde(rename = "toString", default)]
  pub to_value: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiHistory {
  #[serde(default)]
  pub created: Option<String>,
  #[serde(default)]
  pub items: Vec<ApiHistoryItem>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ApiChangelog {
  #[serde(default)]
  pub histories: Vec<ApiHistory>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiIssue {
  pub key: String,
  #[serde(default)]
  pub fields: ApiIssueFields,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub changelog: Option<ApiChangelog>,
}

// ============================================================================
// Search endpoint response
// ============================================================================

/// One page of `/search` results.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiSearchPage {
  #[serde(rename = "startAt", default)]
  pub start_at: u64,
  #[serde(rename = "maxResults", default)]
  pub max_results: u64,
  #[serde(default)]
  pub total: u64,
  #[serde(default)]
  pub issues: Vec<ApiIssue>,
}

// ============================================================================
// Conversions to domain types
// ============================================================================

impl ApiIssue {
  fn status_name(&self) -> String {
    self
      .fields
      .status
      .as_ref()
      .map(|s| s.name.clone())
      .unwrap_or_default()
  }

  fn type_name(&self) -> String {
    self
      .fields
      .issue_type
      .as_ref()
      .map(|t| t.name.clone())
      .unwrap_or_default()
  }

  pub fn into_summary(self) -> IssueSummary {
    IssueSummary {
      status: self.status_name(),
      issue_type: self.type_name(),
      key: self.key,
    }
  }

  /// Convert into a domain issue. Also returns how many history entries had
  /// a missing or unparsable timestamp.
  pub fn into_issue(self, policy: MalformedTimestampPolicy) -> (Issue, usize) {
    let current_status = self.status_name();
    let issue_type = self.type_name();
    let mut malformed = 0;

    let history = self
      .changelog
      .map(|c| c.histories)
      .unwrap_or_default()
      .into_iter()
      .filter_map(|h| {
        let timestamp = match h.created.as_deref().and_then(parse_jira_timestamp) {
          Some(ts) => ts,
          None => {
            malformed += 1;
            match policy {
              MalformedTimestampPolicy::Earliest => DateTime::<chrono::Utc>::MIN_UTC,
              MalformedTimestampPolicy::Skip => return None,
            }
          }
        };
        Some(HistoryEntry {
          timestamp,
          transitions: h.items.into_iter().map(FieldTransition::from).collect(),
        })
      })
      .collect();

    (
      Issue {
        key: self.key,
        issue_type,
        current_status,
        history,
      },
      malformed,
    )
  }
}

impl From<ApiHistoryItem> for FieldTransition {
  fn from(item: ApiHistoryItem) -> Self {
    FieldTransition {
      field: item.field,
      from_value: item.from_value,
      to_value: item.to_value,
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use chrono::{TimeZone, Utc};

  fn sample_issue() -> ApiIssue {
    serde_json::from_value(serde_json::json!({
      "key": "FLOW-1",
      "fields": {
        "status": { "id": "3", "name": "In Progress" },
        "issuetype": { "name": "Story" },
        "customfield_10016": 5
      },
      "changelog": {
        "histories": [
          {
            "created": "2024-01-10T09:15:00.000+0000",
            "items": [
              { "field": "status", "fromString": "To Do", "toString": "In Progress" },
              { "field": "assignee", "fromString": null, "toString": "Ada" }
            ]
          },
          { "created": "not a date", "items": [] }
        ]
      }
    }))
    .unwrap()
  }

  #[test]
  fn test_page_deserializes_from_search_response() {
    let page: ApiSearchPage = serde_json::from_value(serde_json::json!({
      "startAt": 50,
      "maxResults": 50,
      "total": 51,
      "issues": [{ "key": "FLOW-51", "fields": {} }]
    }))
    .unwrap();

    assert_eq!(page.start_at, 50);
    assert_eq!(page.max_results, 50);
    assert_eq!(page.total, 51);
    assert_eq!(page.issues[0].key, "FLOW-51");
    assert!(page.issues[0].changelog.is_none());
  }

  #[test]
  fn test_extra_fields_survive_cache_round_trip() {
    let issue = sample_issue();
    let back: ApiIssue = serde_json::from_slice(&serde_json::to_vec(&issue).unwrap()).unwrap();
    assert_eq!(back.fields.extra.get("customfield_10016"), Some(&serde_json::json!(5)));
    assert_eq!(back.changelog.unwrap().histories.len(), 2);
  }

  #[test]
  fn test_into_issue_keeps_malformed_entry_as_earliest() {
    let (issue, malformed) = sample_issue().into_issue(MalformedTimestampPolicy::Earliest);

    assert_eq!(issue.key, "FLOW-1");
    assert_eq!(issue.issue_type, "Story");
    assert_eq!(issue.current_status, "In Progress");
    assert_eq!(malformed, 1);
    assert_eq!(issue.history.len(), 2);
    assert_eq!(
      issue.history[0].timestamp,
      Utc.with_ymd_and_hms(2024, 1, 10, 9, 15, 0).unwrap()
    );
    assert_eq!(issue.history[0].transitions.len(), 2);
    assert_eq!(issue.history[1].timestamp, DateTime::<Utc>::MIN_UTC);
  }

  #[test]
  fn test_into_issue_skips_malformed_entry() {
    let (issue, malformed) = sample_issue().into_issue(MalformedTimestampPolicy::Skip);
    assert_eq!(malformed, 1);
    assert_eq!(issue.history.len(), 1);
  }

  #[test]
  fn test_into_summary() {
    let summary = sample_issue().into_summary();
    assert_eq!(summary.key, "FLOW-1");
    assert_eq!(summary.issue_type, "Story");
    assert_eq!(summary.status, "In Progress");
  }
}
