//! LLM provider gateway.
//!
//! Normalizes three wire protocols behind the [`ChatProvider`] trait —
//! chat-completions (OpenAI style), messages (Anthropic style), and
//! generate-content (Gemini style) — so callers see one "send prompt,
//! get text" contract. Providers are built from configuration by
//! [`ProviderRegistry`]; adding a provider of an existing shape is a
//! config entry, not code.
//!
//! Failure semantics: a missing API key is a precondition failure raised
//! before any network call; non-2xx responses and transport errors are
//! surfaced verbatim as upstream errors with status and body. The
//! gateway never retries and never falls back to another provider.

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::time::Duration;

use crate::config::{Config, ProviderConfig, ProviderKind};
use crate::error::{Error, Result};

/// Returned by generate-content providers when the response carries no
/// candidates or text parts.
pub const EMPTY_RESPONSE_SENTINEL: &str = "No response returned from the model.";

/// One normalized LLM provider.
#[async_trait]
pub trait ChatProvider: Send + Sync {
    /// Registry id (e.g. `"groq"`).
    fn id(&self) -> &str;

    /// Human-readable label (e.g. `"xAI Grok"`).
    fn label(&self) -> &str;

    /// Environment variable holding the API key.
    fn key_env(&self) -> &str;

    /// Send a composed prompt and return the response text.
    async fn send(&self, api_key: &str, model: &str, system_prompt: &str, prompt: &str)
        -> Result<String>;

    /// List the model names the provider currently offers.
    async fn list_models(&self, api_key: &str) -> Result<Vec<String>>;
}

/// Shared request plumbing for the concrete providers.
struct ProviderBase {
    id: String,
    label: String,
    base_url: String,
    key_env: String,
    client: reqwest::Client,
}

impl ProviderBase {
    fn new(id: &str, config: &ProviderConfig, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::upstream(id, None, e.to_string()))?;
        Ok(Self {
            id: id.to_string(),
            label: config.label.clone(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            key_env: config.key_env.clone(),
            client,
        })
    }

    /// Execute a prepared request, mapping transport errors and non-2xx
    /// responses to upstream errors and parsing the JSON body otherwise.
    async fn execute(&self, request: reqwest::RequestBuilder) -> Result<serde_json::Value> {
        let response = request
            .send()
            .await
            .map_err(|e| Error::upstream(&self.id, None, e.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::upstream(&self.id, Some(status.as_u16()), body));
        }
        response
            .json()
            .await
            .map_err(|e| Error::upstream(&self.id, None, e.to_string()))
    }
}

// ============ Chat-completions shape (OpenAI style) ============

/// `POST {base}/chat/completions` with system + user messages.
pub struct ChatCompletionsProvider {
    base: ProviderBase,
}

#[async_trait]
impl ChatProvider for ChatCompletionsProvider {
    fn id(&self) -> &str {
        &self.base.id
    }

    fn label(&self) -> &str {
        &self.base.label
    }

    fn key_env(&self) -> &str {
        &self.base.key_env
    }

    async fn send(
        &self,
        api_key: &str,
        model: &str,
        system_prompt: &str,
        prompt: &str,
    ) -> Result<String> {
        let body = serde_json::json!({
            "model": model,
            "messages": [
                { "role": "system", "content": system_prompt },
                { "role": "user", "content": prompt },
            ],
            "temperature": 0.7,
        });
        let request = self
            .base
            .client
            .post(format!("{}/chat/completions", self.base.base_url))
            .bearer_auth(api_key)
            .json(&body);
        let json = self.base.execute(request).await?;
        parse_chat_completion(&self.base.id, &json)
    }

    async fn list_models(&self, api_key: &str) -> Result<Vec<String>> {
        let request = self
            .base
            .client
            .get(format!("{}/models", self.base.base_url))
            .bearer_auth(api_key);
        let json = self.base.execute(request).await?;
        Ok(parse_model_ids(&json))
    }
}

/// Response text = first choice's message content.
fn parse_chat_completion(provider: &str, json: &serde_json::Value) -> Result<String> {
    json.pointer("/choices/0/message/content")
        .and_then(|c| c.as_str())
        .map(|s| s.to_string())
        .ok_or_else(|| Error::upstream(provider, None, "no message content in response"))
}

// ============ Messages shape (Anthropic style) ============

/// `POST {base}/messages` with a top-level `system` field and a single
/// user message.
pub struct MessagesProvider {
    base: ProviderBase,
}

const ANTHROPIC_VERSION: &str = "2023-06-01";

#[async_trait]
impl ChatProvider for MessagesProvider {
    fn id(&self) -> &str {
        &self.base.id
    }

    fn label(&self) -> &str {
        &self.base.label
    }

    fn key_env(&self) -> &str {
        &self.base.key_env
    }

    async fn send(
        &self,
        api_key: &str,
        model: &str,
        system_prompt: &str,
        prompt: &str,
    ) -> Result<String> {
        let body = serde_json::json!({
            "model": model,
            "max_tokens": 1024,
            "system": system_prompt,
            "messages": [
                { "role": "user", "content": prompt },
            ],
        });
        let request = self
            .base
            .client
            .post(format!("{}/messages", self.base.base_url))
            .header("x-api-key", api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&body);
        let json = self.base.execute(request).await?;
        parse_message(&self.base.id, &json)
    }

    async fn list_models(&self, api_key: &str) -> Result<Vec<String>> {
        let request = self
            .base
            .client
            .get(format!("{}/models", self.base.base_url))
            .header("x-api-key", api_key)
            .header("anthropic-version", ANTHROPIC_VERSION);
        let json = self.base.execute(request).await?;
        Ok(parse_model_ids(&json))
    }
}

/// Response text = first content block's text.
fn parse_message(provider: &str, json: &serde_json::Value) -> Result<String> {
    json.pointer("/content/0/text")
        .and_then(|t| t.as_str())
        .map(|s| s.to_string())
        .ok_or_else(|| Error::upstream(provider, None, "no content block in response"))
}

// ============ Generate-content shape (Gemini style) ============

/// `POST {base}/models/{model}:generateContent` with the key as a query
/// parameter. The shape has no separate system field — callers fold the
/// system prompt into the composed prompt.
pub struct GenerateContentProvider {
    base: ProviderBase,
}

#[async_trait]
impl ChatProvider for GenerateContentProvider {
    fn id(&self) -> &str {
        &self.base.id
    }

    fn label(&self) -> &str {
        &self.base.label
    }

    fn key_env(&self) -> &str {
        &self.base.key_env
    }

    async fn send(
        &self,
        api_key: &str,
        model: &str,
        _system_prompt: &str,
        prompt: &str,
    ) -> Result<String> {
        let body = serde_json::json!({
            "contents": [
                { "role": "user", "parts": [{ "text": prompt }] },
            ]
        });
        let request = self
            .base
            .client
            .post(format!(
                "{}/models/{}:generateContent",
                self.base.base_url, model
            ))
            .query(&[("key", api_key)])
            .json(&body);
        let json = self.base.execute(request).await?;
        Ok(parse_generation(&json))
    }

    async fn list_models(&self, api_key: &str) -> Result<Vec<String>> {
        let request = self
            .base
            .client
            .get(format!("{}/models", self.base.base_url))
            .query(&[("key", api_key)]);
        let json = self.base.execute(request).await?;
        let mut models: Vec<String> = json
            .get("models")
            .and_then(|m| m.as_array())
            .map(|models| {
                models
                    .iter()
                    .filter_map(|m| m.get("name").and_then(|n| n.as_str()))
                    .map(|n| n.trim_start_matches("models/").to_string())
                    .filter(|n| !n.is_empty())
                    .collect()
            })
            .unwrap_or_default();
        models.sort();
        models.dedup();
        Ok(models)
    }
}

/// Response text = concatenation of all text parts of the first
/// candidate; an empty response yields [`EMPTY_RESPONSE_SENTINEL`]
/// instead of failing.
fn parse_generation(json: &serde_json::Value) -> String {
    let parts = match json.pointer("/candidates/0/content/parts").and_then(|p| p.as_array()) {
        Some(parts) if !parts.is_empty() => parts,
        _ => return EMPTY_RESPONSE_SENTINEL.to_string(),
    };
    parts
        .iter()
        .filter_map(|p| p.get("text").and_then(|t| t.as_str()))
        .collect()
}

/// `data[].id` model listing used by chat-completions and messages APIs,
/// sorted and deduplicated.
fn parse_model_ids(json: &serde_json::Value) -> Vec<String> {
    let mut models: Vec<String> = json
        .get("data")
        .and_then(|d| d.as_array())
        .map(|items| {
            items
                .iter()
                .filter_map(|m| m.get("id").and_then(|id| id.as_str()))
                .map(|id| id.to_string())
                .collect()
        })
        .unwrap_or_default();
    models.sort();
    models.dedup();
    models
}

// ============ Registry ============

/// Provider set built from configuration. One instance per process,
/// constructed at startup and injected where needed.
pub struct ProviderRegistry {
    providers: BTreeMap<String, Box<dyn ChatProvider>>,
}

impl ProviderRegistry {
    pub fn from_config(config: &Config) -> Result<Self> {
        let timeout = Duration::from_secs(config.chat.request_timeout_secs);
        let mut providers: BTreeMap<String, Box<dyn ChatProvider>> = BTreeMap::new();
        for (id, entry) in &config.providers {
            let base = ProviderBase::new(id, entry, timeout)?;
            let provider: Box<dyn ChatProvider> = match entry.kind {
                ProviderKind::ChatCompletions => Box::new(ChatCompletionsProvider { base }),
                ProviderKind::Messages => Box::new(MessagesProvider { base }),
                ProviderKind::GenerateContent => Box::new(GenerateContentProvider { base }),
            };
            providers.insert(id.clone(), provider);
        }
        Ok(Self { providers })
    }

    /// Register a provider under its own id, replacing any existing
    /// entry. Used to plug in providers not expressible as config.
    pub fn register(&mut self, provider: Box<dyn ChatProvider>) {
        self.providers.insert(provider.id().to_string(), provider);
    }

    pub fn get(&self, id: &str) -> Option<&dyn ChatProvider> {
        self.providers.get(id).map(|p| p.as_ref())
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.providers.keys().map(|k| k.as_str())
    }

    /// Resolve the provider's API key from the environment. Checked
    /// before any network call is made.
    pub fn resolve_key(&self, provider: &dyn ChatProvider) -> Result<String> {
        std::env::var(provider.key_env())
            .map_err(|_| Error::precondition(format!("Missing {}", provider.key_env())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config;

    #[test]
    fn parses_chat_completion_response() {
        let json = serde_json::json!({
            "choices": [
                { "message": { "role": "assistant", "content": "hello there" } }
            ]
        });
        assert_eq!(parse_chat_completion("groq", &json).unwrap(), "hello there");
    }

    #[test]
    fn chat_completion_without_choices_is_upstream_error() {
        let err = parse_chat_completion("groq", &serde_json::json!({})).unwrap_err();
        assert!(matches!(err, Error::Upstream { .. }));
    }

    #[test]
    fn parses_message_response() {
        let json = serde_json::json!({
            "content": [ { "type": "text", "text": "claude says hi" } ]
        });
        assert_eq!(parse_message("anthropic", &json).unwrap(), "claude says hi");
    }

    #[test]
    fn parses_generation_response_concatenating_parts() {
        let json = serde_json::json!({
            "candidates": [
                { "content": { "parts": [ { "text": "part one " }, { "text": "part two" } ] } }
            ]
        });
        assert_eq!(parse_generation(&json), "part one part two");
    }

    #[test]
    fn empty_generation_yields_sentinel() {
        assert_eq!(parse_generation(&serde_json::json!({})), EMPTY_RESPONSE_SENTINEL);
        let no_parts = serde_json::json!({ "candidates": [ { "content": { "parts": [] } } ] });
        assert_eq!(parse_generation(&no_parts), EMPTY_RESPONSE_SENTINEL);
    }

    #[test]
    fn parses_model_ids_sorted_deduped() {
        let json = serde_json::json!({
            "data": [ { "id": "m-b" }, { "id": "m-a" }, { "id": "m-b" } ]
        });
        assert_eq!(parse_model_ids(&json), vec!["m-a", "m-b"]);
    }

    #[test]
    fn registry_builds_default_roster() {
        let registry = ProviderRegistry::from_config(&config::Config::default()).unwrap();
        let groq = registry.get("groq").unwrap();
        assert_eq!(groq.label(), "Groq");
        assert_eq!(groq.key_env(), "GROQ_API_KEY");
        assert!(registry.get("anthropic").is_some());
        assert!(registry.get("gemini").is_some());
        assert!(registry.get("nope").is_none());
    }
}
