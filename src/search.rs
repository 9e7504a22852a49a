//! Search invocation.
//!
//! Sends one request per (query, engine) to the web search endpoint and
//! normalizes whatever shape comes back into a [`SearchResponse`].

use crate::config::{ApiConfig, SearchOptions};
use crate::error::{EvalError, Result};
use crate::model::{SearchResponse, SearchResultItem};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

/// Request body for the web search endpoint.
#[derive(Debug, Serialize)]
struct SearchRequest<'a> {
    search_query: &'a str,
    search_engine: &'a str,
    search_intent: bool,
    count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    search_domain_filter: Option<&'a str>,
    search_recency_filter: &'a str,
    content_size: &'a str,
    request_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    user_id: Option<&'a str>,
}

/// Already-normalized payload, as returned by a proxy that shapes results.
#[derive(Debug, Deserialize)]
struct ShapedResponse {
    results: Vec<SearchResultItem>,
    #[serde(default)]
    total_count: Option<usize>,
    #[serde(default)]
    request_id: Option<String>,
}

/// Item of the raw `search_result` array.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawResult {
    title: Option<String>,
    url: Option<String>,
    link: Option<String>,
    snippet: Option<String>,
    content: Option<String>,
}

/// Map a search API payload onto the uniform result shape.
///
/// Accepts either `{results: [...]}` or the raw `{search_result: [...]}`
/// form; in the latter, ranks are assigned from list position.
pub fn normalize_response(body: &Value) -> Result<SearchResponse> {
    if body.get("results").is_some_and(Value::is_array) {
        let shaped: ShapedResponse = serde_json::from_value(body.clone())?;
        let total_count = shaped.total_count.unwrap_or(shaped.results.len());
        return Ok(SearchResponse {
            results: shaped.results,
            total_count,
            request_id: shaped.request_id,
        });
    }

    let raw_items = body
        .get("search_result")
        .and_then(Value::as_array)
        .ok_or_else(|| {
            EvalError::Parse("search response has neither 'results' nor 'search_result'".to_string())
        })?;

    let results: Vec<SearchResultItem> = raw_items
        .iter()
        .enumerate()
        .map(|(idx, item)| {
            let raw: RawResult = serde_json::from_value(item.clone()).unwrap_or_default();
            SearchResultItem {
                title: raw.title.unwrap_or_default(),
                url: raw.url.or(raw.link).unwrap_or_default(),
                snippet: raw.snippet.or(raw.content).unwrap_or_default(),
                rank: idx + 1,
            }
        })
        .collect();

    Ok(SearchResponse {
        total_count: results.len(),
        results,
        request_id: body
            .get("request_id")
            .and_then(Value::as_str)
            .map(str::to_string),
    })
}

/// Client for the web search endpoint.
#[derive(Clone)]
pub struct SearchClient {
    client: Client,
    endpoint: String,
    api_key: String,
    options: SearchOptions,
}

impl SearchClient {
    /// Create a new search client.
    pub fn new(api: &ApiConfig, options: SearchOptions) -> Self {
        Self {
            client: Client::new(),
            endpoint: api.search_endpoint.clone(),
            api_key: api.api_key.clone(),
            options,
        }
    }

    /// Search `query` on the engine identified by `engine_code`.
    pub async fn search(
        &self,
        query: &str,
        engine_code: &str,
        count: usize,
    ) -> Result<SearchResponse> {
        let request = SearchRequest {
            search_query: query,
            search_engine: engine_code,
            search_intent: self.options.search_intent,
            count,
            search_domain_filter: self.options.domain_filter.as_deref(),
            search_recency_filter: &self.options.recency_filter,
            content_size: &self.options.content_size,
            request_id: self
                .options
                .request_id
                .clone()
                .unwrap_or_else(|| uuid::Uuid::new_v4().to_string()),
            user_id: self.options.user_id.as_deref(),
        };

        debug!(engine = engine_code, request_id = %request.request_id, "Sending search request");

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(EvalError::http(status));
        }

        let body: Value = response.json().await?;
        normalize_response(&body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_normalize_raw_payload() {
        let body = json!({
            "search_result": [{"title": "A", "url": "u1", "content": "c1"}],
            "request_id": "r1"
        });
        let response = normalize_response(&body).unwrap();
        assert_eq!(
            response,
            SearchResponse {
                results: vec![SearchResultItem {
                    title: "A".to_string(),
                    url: "u1".to_string(),
                    snippet: "c1".to_string(),
                    rank: 1,
                }],
                total_count: 1,
                request_id: Some("r1".to_string()),
            }
        );
    }

    #[test]
    fn test_normalize_prefers_snippet_and_link_fallback() {
        let body = json!({
            "search_result": [
                {"title": "A", "link": "https://a", "snippet": "s", "content": "ignored"},
                {"title": "B", "url": "https://b"}
            ]
        });
        let response = normalize_response(&body).unwrap();
        assert_eq!(response.total_count, 2);
        assert_eq!(response.results[0].url, "https://a");
        assert_eq!(response.results[0].snippet, "s");
        assert_eq!(response.results[1].rank, 2);
        assert_eq!(response.results[1].snippet, "");
        assert!(response.request_id.is_none());
    }

    #[test]
    fn test_normalize_shaped_payload() {
        let body = json!({
            "results": [{"title": "A", "url": "u", "snippet": "s", "rank": 1}],
            "request_id": "r2"
        });
        let response = normalize_response(&body).unwrap();
        assert_eq!(response.total_count, 1);
        assert_eq!(response.request_id.as_deref(), Some("r2"));
    }

    #[test]
    fn test_normalize_rejects_unknown_shape() {
        let err = normalize_response(&json!({"data": []})).unwrap_err();
        assert!(matches!(err, EvalError::Parse(_)));
    }

    #[test]
    fn test_request_body_omits_unset_filters() {
        let request = SearchRequest {
            search_query: "q",
            search_engine: "search_std",
            search_intent: false,
            count: 5,
            search_domain_filter: None,
            search_recency_filter: "noLimit",
            content_size: "medium",
            request_id: "id".to_string(),
            user_id: None,
        };
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value["search_engine"], "search_std");
        assert_eq!(value["count"], 5);
        assert!(value.get("search_domain_filter").is_none());
        assert!(value.get("user_id").is_none());
    }
}
