//! Web search collaborator (Google Programmable Search).
//!
//! Missing credentials yield an empty result list, not an error — web
//! grounding is optional. An actual API failure is an upstream error and
//! is surfaced to the caller like any other.

use std::time::Duration;

use crate::config::WebSearchConfig;
use crate::error::{Error, Result};
use crate::models::WebResult;

pub struct WebSearcher {
    endpoint: String,
    key_env: String,
    engine_id_env: String,
    pub max_results: usize,
    client: reqwest::Client,
}

impl WebSearcher {
    pub fn new(config: &WebSearchConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| Error::upstream("websearch", None, e.to_string()))?;
        Ok(Self {
            endpoint: config.endpoint.clone(),
            key_env: config.key_env.clone(),
            engine_id_env: config.engine_id_env.clone(),
            max_results: config.max_results,
            client,
        })
    }

    /// Search the web. Returns an empty list when credentials are not
    /// configured.
    pub async fn search(&self, query: &str, max_results: usize) -> Result<Vec<WebResult>> {
        let api_key = match std::env::var(&self.key_env) {
            Ok(key) if !key.is_empty() => key,
            _ => return Ok(Vec::new()),
        };
        let engine_id = match std::env::var(&self.engine_id_env)
            .ok()
            .and_then(|raw| normalize_engine_id(&raw))
        {
            Some(id) => id,
            None => return Ok(Vec::new()),
        };

        let response = self
            .client
            .get(&self.endpoint)
            .query(&[
                ("key", api_key.as_str()),
                ("cx", engine_id.as_str()),
                ("q", query),
                ("num", &max_results.to_string()),
            ])
            .send()
            .await
            .map_err(|e| Error::upstream("websearch", None, e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::upstream("websearch", Some(status.as_u16()), body));
        }

        let json: serde_json::Value = response
            .json()
            .await
            .map_err(|e| Error::upstream("websearch", None, e.to_string()))?;
        Ok(parse_search_response(&json))
    }
}

/// Accepts either a raw engine id or a pasted control-panel URL / query
/// string containing `cx=<id>`, and extracts the id.
pub fn normalize_engine_id(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    if let Some(pos) = trimmed.find("cx=") {
        let id = &trimmed[pos + 3..];
        let id = id.split('&').next().unwrap_or(id);
        if !id.is_empty() {
            return Some(id.to_string());
        }
    }
    if trimmed.starts_with("http") {
        // URL without a cx parameter carries no usable id.
        return None;
    }
    Some(trimmed.to_string())
}

fn parse_search_response(json: &serde_json::Value) -> Vec<WebResult> {
    json.get("items")
        .and_then(|items| items.as_array())
        .map(|items| {
            items
                .iter()
                .map(|item| WebResult {
                    title: item
                        .get("title")
                        .and_then(|t| t.as_str())
                        .unwrap_or("Result")
                        .to_string(),
                    url: item
                        .get("link")
                        .and_then(|l| l.as_str())
                        .unwrap_or_default()
                        .to_string(),
                    snippet: item
                        .get("snippet")
                        .and_then(|s| s.as_str())
                        .unwrap_or_default()
                        .to_string(),
                })
                .collect()
        })
        .unwrap_or_default()
}
