//! Fixtures shared by unit tests.

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use crate::error::{MetricsError, MetricsResult};
use crate::jira::api_types::{ApiIssue, ApiSearchPage};
use crate::jira::cache::SearchRequest;
use crate::jira::client::SearchTransport;
use crate::jira::types::{FieldTransition, HistoryEntry, Issue};

pub const FAKE_BASE_URL: &str = "https://fake.example.com";

/// In-process search endpoint serving a fixed issue list in pages.
pub struct FakeTransport {
  issues: Vec<ApiIssue>,
  page_size: u64,
  reported_total: Option<u64>,
  fail_at: Option<u64>,
  delay: Duration,
  calls: AtomicUsize,
  in_flight: AtomicUsize,
  max_in_flight: AtomicUsize,
}

impl FakeTransport {
  pub fn new(issues: Vec<ApiIssue>, page_size: u64) -> Self {
    Self {
      issues,
      page_size,
      reported_total: None,
      fail_at: None,
      delay: Duration::ZERO,
      calls: AtomicUsize::new(0),
      in_flight: AtomicUsize::new(0),
      max_in_flight: AtomicUsize::new(0),
    }
  }

  /// Serve `n` generated issues (`FLOW-0`, `FLOW-1`, ...).
  pub fn with_generated(n: usize, page_size: u64) -> Self {
    Self::new((0..n).map(|i| api_issue(&format!("FLOW-{}", i))).collect(), page_size)
  }

  /// Report this total on every page instead of the real count.
  pub fn reporting_total(mut self, total: u64) -> Self {
    self.reported_total = Some(total);
    self
  }

  pub fn failing_at(mut self, start_at: u64) -> Self {
    self.fail_at = Some(start_at);
    self
  }

  pub fn with_delay(mut self, delay: Duration) -> Self {
    self.delay = delay;
    self
  }

  pub fn calls(&self) -> usize {
    self.calls.load(Ordering::SeqCst)
  }

  pub fn max_in_flight(&self) -> usize {
    self.max_in_flight.load(Ordering::SeqCst)
  }
}

#[async_trait]
impl SearchTransport for FakeTransport {
  fn base_url(&self) -> &str {
    FAKE_BASE_URL
  }

  async fn search_page(&self, request: &SearchRequest) -> MetricsResult<ApiSearchPage> {
    self.calls.fetch_add(1, Ordering::SeqCst);
    let now_in_flight = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
    self.max_in_flight.fetch_max(now_in_flight, Ordering::SeqCst);

    if !self.delay.is_zero() {
      tokio::time::sleep(self.delay).await;
    }
    self.in_flight.fetch_sub(1, Ordering::SeqCst);

    let start_at = request.start_at();
    if self.fail_at == Some(start_at) {
      return Err(MetricsError::Transport(format!("page {} unavailable", start_at)));
    }

    let len = self.issues.len();
    let start = (start_at as usize).min(len);
    let end = (start + self.page_size as usize).min(len);

    Ok(ApiSearchPage {
      start_at,
      max_results: self.page_size,
      total: self.reported_total.unwrap_or(len as u64),
      issues: self.issues[start..end].to_vec(),
    })
  }

  async fn health_check(&self) -> MetricsResult<()> {
    Ok(())
  }
}

pub fn api_issue(key: &str) -> ApiIssue {
  serde_json::from_value(serde_json::json!({
    "key": key,
    "fields": { "status": { "id": "1", "name": "Done" }, "issuetype": { "name": "Story" } }
  }))
  .unwrap()
}

/// `ApiIssue` with a changelog of status changes `(created, from, to)`.
pub fn api_issue_with_changelog(
  key: &str,
  current_status: &str,
  changes: &[(&str, Option<&str>, &str)],
) -> ApiIssue {
  let histories: Vec<_> = changes
    .iter()
    .map(|(created, from, to)| {
      serde_json::json!({
        "created": created,
        "items": [{ "field": "status", "fromString": from, "toString": to }]
      })
    })
    .collect();

  serde_json::from_value(serde_json::json!({
    "key": key,
    "fields": { "status": { "id": "1", "name": current_status }, "issuetype": { "name": "Story" } },
    "changelog": { "histories": histories }
  }))
  .unwrap()
}

pub fn ts(y: i32, m: u32, d: u32, h: u32) -> DateTime<Utc> {
  Utc.with_ymd_and_hms(y, m, d, h, 0, 0).unwrap()
}

/// Domain issue whose history is one status change per entry.
pub fn issue(key: &str, current_status: &str, status_changes: &[(DateTime<Utc>, &str)]) -> Issue {
  Issue {
    key: key.to_string(),
    issue_type: "Story".to_string(),
    current_status: current_status.to_string(),
    history: status_changes
      .iter()
      .map(|(at, to)| HistoryEntry {
        timestamp: *at,
        transitions: vec![status_change(to)],
      })
      .collect(),
  }
}

pub fn status_change(to: &str) -> FieldTransition {
  FieldTransition {
    field: "status".to_string(),
    from_value: None,
    to_value: Some(to.to_string()),
  }
}
