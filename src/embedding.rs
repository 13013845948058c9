//! Embedding backend abstraction.
//!
//! The [`Embedder`] trait turns text into fixed-dimension vectors;
//! [`RemoteEmbedder`] calls an OpenAI-compatible `/embeddings` endpoint
//! with batching and a bounded timeout. Backend failure is fatal to the
//! calling ingest or query — there is no silent fallback and no retry
//! (retry policy belongs to the caller).

use async_trait::async_trait;
use std::time::Duration;

use crate::config::EmbeddingConfig;
use crate::error::{Error, Result};

/// Turns text into fixed-length numeric vectors. Implementations must be
/// deterministic for identical input so re-ingestion of identical content
/// is idempotent at the chunk level.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Model identifier (e.g. `"text-embedding-3-small"`).
    fn model_name(&self) -> &str;

    /// Vector dimensionality produced by this backend.
    fn dims(&self) -> usize;

    /// Embed a batch of texts, returning one vector per input in order.
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    /// Embed a single query text.
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let mut vectors = self.embed_batch(&[text.to_string()]).await?;
        if vectors.is_empty() {
            return Err(Error::upstream(
                self.model_name().to_string(),
                None,
                "empty embedding response",
            ));
        }
        Ok(vectors.remove(0))
    }
}

/// Embedder backed by an OpenAI-compatible embeddings API.
pub struct RemoteEmbedder {
    model: String,
    dims: usize,
    base_url: String,
    key_env: String,
    batch_size: usize,
    client: reqwest::Client,
}

impl RemoteEmbedder {
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| Error::upstream("embeddings", None, e.to_string()))?;
        Ok(Self {
            model: config.model.clone(),
            dims: config.dims,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            key_env: config.key_env.clone(),
            batch_size: config.batch_size.max(1),
            client,
        })
    }

    fn api_key(&self) -> Result<String> {
        std::env::var(&self.key_env)
            .map_err(|_| Error::precondition(format!("Missing {}", self.key_env)))
    }

    async fn embed_request(&self, api_key: &str, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let body = serde_json::json!({
            "model": self.model,
            "input": texts,
        });

        let response = self
            .client
            .post(format!("{}/embeddings", self.base_url))
            .bearer_auth(api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| Error::upstream("embeddings", None, e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(Error::upstream("embeddings", Some(status.as_u16()), text));
        }

        let json: serde_json::Value = response
            .json()
            .await
            .map_err(|e| Error::upstream("embeddings", None, e.to_string()))?;
        parse_embedding_response(&json)
    }
}

#[async_trait]
impl Embedder for RemoteEmbedder {
    fn model_name(&self) -> &str {
        &self.model
    }

    fn dims(&self) -> usize {
        self.dims
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        // Credentials are a precondition, checked before any network call.
        let api_key = self.api_key()?;

        let mut vectors = Vec::with_capacity(texts.len());
        for batch in texts.chunks(self.batch_size) {
            vectors.extend(self.embed_request(&api_key, batch).await?);
        }
        if vectors.len() != texts.len() {
            return Err(Error::upstream(
                "embeddings",
                None,
                format!("expected {} vectors, got {}", texts.len(), vectors.len()),
            ));
        }
        Ok(vectors)
    }
}

/// Parse an OpenAI-style embeddings response, returning `data[].embedding`
/// arrays in input order.
fn parse_embedding_response(json: &serde_json::Value) -> Result<Vec<Vec<f32>>> {
    let data = json
        .get("data")
        .and_then(|d| d.as_array())
        .ok_or_else(|| Error::upstream("embeddings", None, "missing data array in response"))?;

    let mut embeddings = Vec::with_capacity(data.len());
    for item in data {
        let embedding = item
            .get("embedding")
            .and_then(|e| e.as_array())
            .ok_or_else(|| Error::upstream("embeddings", None, "missing embedding in response"))?;
        let vector: Vec<f32> = embedding
            .iter()
            .map(|v| v.as_f64().unwrap_or(0.0) as f32)
            .collect();
        embeddings.push(vector);
    }
    Ok(embeddings)
}

/// Create the configured [`Embedder`].
pub fn create_embedder(config: &EmbeddingConfig) -> Result<Box<dyn Embedder>> {
    match config.provider.as_str() {
        "openai" => Ok(Box::new(RemoteEmbedder::new(config)?)),
        other => Err(Error::precondition(format!(
            "Unknown embedding provider: {other}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_embedding_response() {
        let json = serde_json::json!({
            "data": [
                { "index": 0, "embedding": [0.1, 0.2] },
                { "index": 1, "embedding": [0.3, 0.4] },
            ]
        });
        let vectors = parse_embedding_response(&json).unwrap();
        assert_eq!(vectors.len(), 2);
        assert_eq!(vectors[1], vec![0.3, 0.4]);
    }

    #[test]
    fn missing_data_is_upstream_error() {
        let err = parse_embedding_response(&serde_json::json!({})).unwrap_err();
        assert!(matches!(err, Error::Upstream { .. }));
    }

    #[test]
    fn unknown_provider_rejected() {
        let config = EmbeddingConfig {
            provider: "mystery".to_string(),
            ..EmbeddingConfig::default()
        };
        assert!(matches!(
            create_embedder(&config),
            Err(Error::Precondition(_))
        ));
    }
}
