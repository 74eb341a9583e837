use async_trait::async_trait;
use color_eyre::{eyre::eyre, Result};
use serde_json::Value;

use crate::config::{AuthType, Config};
use crate::error::{MetricsError, MetricsResult};
use crate::jira::api_types::ApiSearchPage;
use crate::jira::cache::SearchRequest;

/// Something that can execute a single search page request.
///
/// The transport is assumed to be authenticated already; timeouts and
/// cancellation are its business too.
#[async_trait]
pub trait SearchTransport: Send + Sync {
  /// Root the transport talks to; part of every cache fingerprint.
  fn base_url(&self) -> &str;

  async fn search_page(&self, request: &SearchRequest) -> MetricsResult<ApiSearchPage>;

  async fn health_check(&self) -> MetricsResult<()>;
}

/// Jira API client wrapper
#[derive(Clone)]
pub struct JiraTransport {
  client: gouqi::r#async::Jira,
  base_url: String,
}

impl JiraTransport {
  pub fn new(url: &str, credentials: gouqi::Credentials) -> Result<Self> {
    let client = gouqi::r#async::Jira::new(url, credentials)
      .map_err(|e| eyre!("Failed to create Jira client: {}", e))?;

    Ok(Self {
      client,
      base_url: url.trim_end_matches('/').to_string(),
    })
  }

  /// Build a transport from config, reading the token from the environment.
  pub fn from_config(config: &Config) -> Result<Self> {
    let token = Config::get_api_token()?;

    let credentials = match config.jira.effective_auth_type() {
      AuthType::Onpremise => gouqi::Credentials::Bearer(token),
      _ => gouqi::Credentials::Basic(config.jira.email.clone(), token),
    };

    Self::new(&config.jira.url, credentials)
  }
}

#[async_trait]
impl SearchTransport for JiraTransport {
  fn base_url(&self) -> &str {
    &self.base_url
  }

  async fn search_page(&self, request: &SearchRequest) -> MetricsResult<ApiSearchPage> {
    let endpoint = request.endpoint();

    self
      .client
      .get::<ApiSearchPage>("api", &endpoint)
      .await
      .map_err(|e| {
        MetricsError::Transport(format!(
          "Failed to search issues (startAt={}): {}",
          request.start_at(),
          e
        ))
      })
  }

  async fn health_check(&self) -> MetricsResult<()> {
    self
      .client
      .get::<Value>("api", "/myself")
      .await
      .map_err(|e| MetricsError::Transport(format!("Health check failed: {}", e)))?;

    Ok(())
  }
}
