//! Paginated search that puts a complete result set back together.

use futures::future::try_join_all;
use futures::stream::{self, StreamExt, TryStreamExt};
use std::sync::Arc;

use crate::cache::{CacheStorage, ResponseCache};
use crate::error::{MetricsError, MetricsResult};

use super::api_types::{ApiIssue, ApiSearchPage};
use super::cache::SearchRequest;
use super::client::SearchTransport;
use super::types::{SearchQuery, SearchShape};

/// Fetches every page of a search, each page going through the response cache.
///
/// The first page is fetched on its own since it tells us the page size and
/// total. All remaining pages are then requested concurrently (optionally
/// capped by `max_concurrent_pages`) and concatenated in page order.
pub struct PaginatedSearchClient<T: SearchTransport, S: CacheStorage> {
  transport: Arc<T>,
  cache: ResponseCache<S>,
  max_concurrent_pages: Option<usize>,
}

impl<T: SearchTransport, S: CacheStorage> PaginatedSearchClient<T, S> {
  pub fn new(transport: T, cache: ResponseCache<S>) -> Self {
    Self {
      transport: Arc::new(transport),
      cache,
      max_concurrent_pages: None,
    }
  }

  /// Cap the number of page requests in flight at once. `None` is unbounded.
  pub fn with_max_concurrent_pages(mut self, limit: Option<usize>) -> Self {
    self.max_concurrent_pages = limit.map(|n| n.max(1));
    self
  }

  pub fn transport(&self) -> &T {
    &self.transport
  }

  pub fn cache(&self) -> &ResponseCache<S> {
    &self.cache
  }

  /// Fetch the full result set for `query`.
  ///
  /// Fails with [`MetricsError::IncompleteFetch`] when the issues collected
  /// across all pages don't add up to the total reported by the first page,
  /// e.g. because issues were created or deleted while paging.
  pub async fn fetch_all(
    &self,
    query: &SearchQuery,
    shape: SearchShape,
  ) -> MetricsResult<Vec<ApiIssue>> {
    let first = self.fetch_page(query, shape, 0).await?;
    let total = first.total;
    let page_size = first.max_results;

    let offsets: Vec<u64> = (1..page_count(total, page_size))
      .map(|i| i * page_size)
      .collect();

    tracing::debug!(
      total,
      page_size,
      remaining_pages = offsets.len(),
      "fetched first search page"
    );

    let pending = offsets
      .iter()
      .map(|&start_at| self.fetch_page(query, shape, start_at));

    let rest: Vec<ApiSearchPage> = match self.max_concurrent_pages {
      None => try_join_all(pending).await?,
      Some(limit) => stream::iter(pending).buffered(limit).try_collect().await?,
    };

    let mut issues = first.issues;
    for page in rest {
      issues.extend(page.issues);
    }

    let fetched = issues.len() as u64;
    if fetched != total {
      return Err(MetricsError::IncompleteFetch {
        expected_total: total,
        actual_count: fetched,
      });
    }

    Ok(issues)
  }

  async fn fetch_page(
    &self,
    query: &SearchQuery,
    shape: SearchShape,
    start_at: u64,
  ) -> MetricsResult<ApiSearchPage> {
    let request = SearchRequest::page(query, shape, start_at);
    let key = request.fingerprint(self.transport.base_url());

    let result = self
      .cache
      .get_or_fetch(&key, || self.transport.search_page(&request))
      .await?;

    Ok(result.data)
  }
}

/// Number of pages needed for `total` results, always at least one.
fn page_count(total: u64, page_size: u64) -> u64 {
  if page_size == 0 {
    return 1;
  }
  total.div_ceil(page_size).max(1)
}
