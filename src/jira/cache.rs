//! Search requests and their cache fingerprints.

use sha2::{Digest, Sha256};
use std::collections::BTreeMap;

use super::types::{SearchQuery, SearchShape};

/// Path of the issue search endpoint, relative to the REST API root.
pub const SEARCH_PATH: &str = "/search";

/// Fields every search asks for.
const LEAN_FIELDS: &str = "key,issuetype,status";

/// A single page request against the search endpoint.
///
/// Parameters are kept sorted so the same request always serializes, and so
/// fingerprints, the same way no matter how it was built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchRequest {
  path: String,
  params: BTreeMap<String, String>,
}

impl SearchRequest {
  pub fn page(query: &SearchQuery, shape: SearchShape, start_at: u64) -> Self {
    let mut params = BTreeMap::new();
    params.insert("jql".to_string(), query.jql.trim().to_string());
    params.insert("startAt".to_string(), start_at.to_string());

    match shape {
      SearchShape::Lean => {
        params.insert("fields".to_string(), LEAN_FIELDS.to_string());
      }
      SearchShape::Changelog => {
        let mut fields = format!("{},changelog", LEAN_FIELDS);
        for extra in &query.extra_fields {
          fields.push(',');
          fields.push_str(extra);
        }
        params.insert("expand".to_string(), "changelog".to_string());
        params.insert("fields".to_string(), fields);
      }
    }

    Self {
      path: SEARCH_PATH.to_string(),
      params,
    }
  }

  pub fn path(&self) -> &str {
    &self.path
  }

  pub fn param(&self, name: &str) -> Option<&str> {
    self.params.get(name).map(String::as_str)
  }

  pub fn start_at(&self) -> u64 {
    self
      .param("startAt")
      .and_then(|s| s.parse().ok())
      .unwrap_or_default()
  }

  /// URL-encoded query string, parameters in sorted order.
  pub fn query_string(&self) -> String {
    url::form_urlencoded::Serializer::new(String::new())
      .extend_pairs(self.params.iter())
      .finish()
  }

  /// Path plus query string, ready to append to the API root.
  pub fn endpoint(&self) -> String {
    format!("{}?{}", self.path, self.query_string())
  }

  /// Cache key for this request against `base_url`.
  pub fn fingerprint(&self, base_url: &str) -> String {
    let input = format!("{}{}", base_url.trim_end_matches('/'), self.endpoint());

    // SHA256 hash for stable, fixed-length keys
    let mut hasher = Sha256::new();
    hasher.update(input.as_bytes());
    hex::encode(hasher.finalize())
  }
}
