//! Caller-facing operations: fetch, convert, compute.

use crate::cache::CacheStorage;
use crate::error::MetricsResult;
use crate::jira::client::SearchTransport;
use crate::jira::search::PaginatedSearchClient;
use crate::jira::types::{IssueSet, IssueSummary, MalformedTimestampPolicy, SearchQuery, SearchShape};
use crate::metrics::{
  changelog_rows, status_values, MetricKind, MetricKindInfo, MetricOutput, MetricSpec,
  MetricsEngine, StatusSide, TimeWindow,
};

/// Metrics over a tracker search, with every page request cached.
pub struct MetricsService<T: SearchTransport, S: CacheStorage> {
  search: PaginatedSearchClient<T, S>,
  engine: MetricsEngine,
  malformed_timestamps: MalformedTimestampPolicy,
}

impl<T: SearchTransport, S: CacheStorage> MetricsService<T, S> {
  pub fn new(search: PaginatedSearchClient<T, S>, engine: MetricsEngine) -> Self {
    Self {
      search,
      engine,
      malformed_timestamps: MalformedTimestampPolicy::default(),
    }
  }

  pub fn with_malformed_timestamps(mut self, policy: MalformedTimestampPolicy) -> Self {
    self.malformed_timestamps = policy;
    self
  }

  pub fn search(&self) -> &PaginatedSearchClient<T, S> {
    &self.search
  }

  pub fn list_metric_kinds(&self) -> Vec<MetricKindInfo> {
    MetricKind::ALL.into_iter().map(MetricKindInfo::from).collect()
  }

  /// Key, type and status of every matching issue (no changelog).
  pub async fn search_issues(&self, query: &SearchQuery) -> MetricsResult<Vec<IssueSummary>> {
    let issues = self.search.fetch_all(query, SearchShape::Lean).await?;
    Ok(issues.into_iter().map(|i| i.into_summary()).collect())
  }

  /// Every matching issue with its changelog, ready for metric scans.
  pub async fn fetch_issues(&self, query: &SearchQuery) -> MetricsResult<IssueSet> {
    let raw = self.search.fetch_all(query, SearchShape::Changelog).await?;

    let mut set = IssueSet::default();
    for api_issue in raw {
      let (issue, malformed) = api_issue.into_issue(self.malformed_timestamps);
      set.malformed_entries += malformed;
      set.issues.push(issue);
    }

    if set.malformed_entries > 0 {
      tracing::debug!(
        malformed = set.malformed_entries,
        policy = ?self.malformed_timestamps,
        "history entries with unparsable timestamps"
      );
    }
    Ok(set)
  }

  /// Status names observed in the changelog, for populating status choices.
  pub async fn list_status_values(
    &self,
    query: &SearchQuery,
    side: StatusSide,
  ) -> MetricsResult<Vec<String>> {
    let issues = self.fetch_issues(query).await?;
    Ok(status_values(&changelog_rows(&issues.issues), side))
  }

  pub async fn compute_metric(
    &self,
    spec: &MetricSpec,
    query: &SearchQuery,
    window: &TimeWindow,
  ) -> MetricsResult<MetricOutput> {
    let issues = self.fetch_issues(query).await?;
    self.engine.compute(spec, &issues, window)
  }

  pub async fn health_check(&self) -> MetricsResult<()> {
    self.search.transport().health_check().await
  }

  /// Drop every cached response.
  pub fn clear_cache(&self) -> MetricsResult<()> {
    self.search.cache().clear()
  }
}
