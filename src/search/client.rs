//! HTTP client for the upstream search API
//!
//! Covers the three surfaces reconciliation needs: the stream-rules
//! endpoint, the recent-search endpoint and the filtered stream
//! itself. Non-2xx responses are turned into [`AppError::SearchApi`]
//! with the rate-limit reset instant attached when the service sent
//! one.

use chrono::{DateTime, Utc};
use serde_json::json;

use super::types::*;
use crate::config::SearchConfig;
use crate::error::{AppError, Result};

/// Expansion parameters requested with every post-bearing response
const EXPANSION_PARAMS: &str = "expansions=author_id,attachments.media_keys\
    &user.fields=profile_image_url,username\
    &tweet.fields=created_at,referenced_tweets\
    &media.fields=media_key,url,type";

/// Header carrying the unix-seconds instant the rate limit resets at
const RATE_LIMIT_RESET_HEADER: &str = "x-rate-limit-reset";

pub struct SearchClient {
    http: reqwest::Client,
    base_url: String,
    bearer_token: String,
}

impl SearchClient {
    /// Build a client from configuration
    ///
    /// No overall request timeout is set because the stream endpoint
    /// holds its response open indefinitely.
    pub fn new(config: &SearchConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .connect_timeout(std::time::Duration::from_secs(10))
            .build()?;

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            bearer_token: config.bearer_token.clone(),
        })
    }

    /// List the filter rules currently registered
    pub async fn list_rules(&self) -> Result<Vec<ApiRule>> {
        let url = format!("{}/tweets/search/stream/rules", self.base_url);
        let response = self
            .http
            .get(&url)
            .bearer_auth(&self.bearer_token)
            .send()
            .await?;

        let response = check_response(response).await?;
        let rules: RulesResponse = response.json().await?;
        Ok(rules.data)
    }

    /// Register new filter rules and return them with assigned ids
    pub async fn create_rules(&self, rules: Vec<NewRule>) -> Result<Vec<ApiRule>> {
        let url = format!("{}/tweets/search/stream/rules", self.base_url);
        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.bearer_token)
            .json(&json!({ "add": rules }))
            .send()
            .await?;

        let response = check_response(response).await?;
        let created: RulesResponse = response.json().await?;
        Ok(created.data)
    }

    /// Delete filter rules by id
    pub async fn delete_rules(&self, ids: Vec<String>) -> Result<()> {
        let url = format!("{}/tweets/search/stream/rules", self.base_url);
        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.bearer_token)
            .json(&json!({ "delete": { "ids": ids } }))
            .send()
            .await?;

        check_response(response).await?;
        Ok(())
    }

    /// Search recent posts matching `query`
    pub async fn search_recent(&self, query: &str, max_results: u32) -> Result<SearchResponse> {
        let url = format!(
            "{}/tweets/search/recent?query={}&max_results={}&{}",
            self.base_url,
            urlencoding::encode(query),
            max_results,
            EXPANSION_PARAMS
        );
        let response = self
            .http
            .get(&url)
            .bearer_auth(&self.bearer_token)
            .send()
            .await?;

        let response = check_response(response).await?;
        Ok(response.json().await?)
    }

    /// Open the filtered stream
    ///
    /// Returns the raw response; the caller reads the body as a byte
    /// stream and frames it into newline-delimited messages.
    pub async fn open_stream(&self) -> Result<reqwest::Response> {
        let url = format!(
            "{}/tweets/search/stream?{}",
            self.base_url, EXPANSION_PARAMS
        );
        let response = self
            .http
            .get(&url)
            .bearer_auth(&self.bearer_token)
            .send()
            .await?;

        check_response(response).await
    }
}

/// Map a non-2xx response into [`AppError::SearchApi`]
async fn check_response(response: reqwest::Response) -> Result<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let rate_limit_reset = parse_rate_limit_reset(&response);
    if status == http::StatusCode::TOO_MANY_REQUESTS {
        tracing::warn!(reset = ?rate_limit_reset, "Search API rate limited");
    }
    let body = response.text().await.unwrap_or_default();
    let message = extract_error_detail(&body)
        .unwrap_or_else(|| format!("request failed with status {status}"));

    Err(AppError::SearchApi {
        message,
        rate_limit_reset,
    })
}

fn parse_rate_limit_reset(response: &reqwest::Response) -> Option<DateTime<Utc>> {
    let seconds = response
        .headers()
        .get(RATE_LIMIT_RESET_HEADER)?
        .to_str()
        .ok()?
        .parse::<i64>()
        .ok()?;

    DateTime::<Utc>::from_timestamp(seconds, 0)
}

/// Pull a human-readable message out of an error payload
///
/// The service reports either `errors[].message` or a top-level
/// `detail` depending on the failure class.
fn extract_error_detail(body: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(body).ok()?;

    if let Some(message) = value
        .get("errors")
        .and_then(|errors| errors.get(0))
        .and_then(|first| first.get("message"))
        .and_then(|message| message.as_str())
    {
        return Some(message.to_string());
    }

    value
        .get("detail")
        .and_then(|detail| detail.as_str())
        .map(|detail| detail.to_string())
}
