//! Flow metrics from Jira issue changelogs.
//!
//! A [`PaginatedSearchClient`](jira::search::PaginatedSearchClient) pulls the
//! complete result set of a JQL search, page by page, through a
//! [`ResponseCache`](cache::ResponseCache). The [`metrics`] module replays each
//! issue's status history to produce cycle time, weekly throughput and work
//! item age. [`service::MetricsService`] ties the two together for callers.

pub mod cache;
pub mod config;
pub mod error;
pub mod jira;
pub mod metrics;
pub mod service;

#[cfg(test)]
mod testing;

pub use error::{MetricsError, MetricsResult};
