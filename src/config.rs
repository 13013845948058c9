use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct Config {
    pub store: StoreConfig,
    pub chunking: ChunkingConfig,
    pub retrieval: RetrievalConfig,
    pub embedding: EmbeddingConfig,
    pub chat: ChatConfig,
    pub websearch: WebSearchConfig,
    /// Provider registry entries keyed by provider id. When empty, the
    /// built-in roster from [`default_providers`] is used.
    pub providers: BTreeMap<String, ProviderConfig>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            store: StoreConfig::default(),
            chunking: ChunkingConfig::default(),
            retrieval: RetrievalConfig::default(),
            embedding: EmbeddingConfig::default(),
            chat: ChatConfig::default(),
            websearch: WebSearchConfig::default(),
            providers: default_providers(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct StoreConfig {
    /// Root directory for per-scope index and metadata snapshots.
    pub dir: PathBuf,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from(".rag_store"),
        }
    }
}

#[derive(Debug, Deserialize, Clone, Copy)]
#[serde(default)]
pub struct ChunkingConfig {
    /// Target chunk size in characters.
    pub chunk_size: usize,
    /// Characters shared between consecutive chunks.
    pub overlap: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: 1000,
            overlap: 200,
        }
    }
}

#[derive(Debug, Deserialize, Clone, Copy)]
#[serde(default)]
pub struct RetrievalConfig {
    /// Passages returned per query.
    pub top_k: usize,
    /// Upper bound on in-memory scope states before LRU eviction.
    pub cached_scopes: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: 4,
            cached_scopes: 128,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct EmbeddingConfig {
    /// Backend name; currently only `"openai"` (OpenAI-compatible API).
    pub provider: String,
    pub base_url: String,
    pub model: String,
    /// Vector dimensionality produced by `model`.
    pub dims: usize,
    pub key_env: String,
    /// Texts per embedding request.
    pub batch_size: usize,
    pub timeout_secs: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: "openai".to_string(),
            base_url: "https://api.openai.com/v1".to_string(),
            model: "text-embedding-3-small".to_string(),
            dims: 1536,
            key_env: "OPENAI_API_KEY".to_string(),
            batch_size: 64,
            timeout_secs: 30,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ChatConfig {
    pub default_provider: String,
    pub default_model: String,
    pub system_prompt: String,
    /// History turns included in the prompt; `None` means unlimited.
    pub max_history: Option<usize>,
    pub max_message_len: usize,
    pub request_timeout_secs: u64,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            default_provider: "groq".to_string(),
            default_model: "llama-3.3-70b-versatile".to_string(),
            system_prompt: "You are a precise, fast assistant. Use the provided context when \
                            relevant, cite sources, and keep answers clear and actionable."
                .to_string(),
            max_history: Some(12),
            max_message_len: 8000,
            request_timeout_secs: 60,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct WebSearchConfig {
    pub endpoint: String,
    pub key_env: String,
    pub engine_id_env: String,
    pub max_results: usize,
    pub timeout_secs: u64,
}

impl Default for WebSearchConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://www.googleapis.com/customsearch/v1".to_string(),
            key_env: "GOOGLE_API_KEY".to_string(),
            engine_id_env: "GOOGLE_CSE_ID".to_string(),
            max_results: 5,
            timeout_secs: 30,
        }
    }
}

/// One entry in the provider registry.
#[derive(Debug, Deserialize, Clone)]
pub struct ProviderConfig {
    pub label: String,
    /// Wire shape: `"chat-completions"`, `"messages"`, or `"generate-content"`.
    pub kind: ProviderKind,
    pub base_url: String,
    pub key_env: String,
}

/// The three normalized LLM wire-protocol shapes.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum ProviderKind {
    ChatCompletions,
    Messages,
    GenerateContent,
}

/// Built-in provider roster used when the config file defines none.
pub fn default_providers() -> BTreeMap<String, ProviderConfig> {
    let mut providers = BTreeMap::new();
    let mut chat = |id: &str, label: &str, base_url: &str, key_env: &str| {
        providers.insert(
            id.to_string(),
            ProviderConfig {
                label: label.to_string(),
                kind: ProviderKind::ChatCompletions,
                base_url: base_url.to_string(),
                key_env: key_env.to_string(),
            },
        );
    };
    chat("groq", "Groq", "https://api.groq.com/openai/v1", "GROQ_API_KEY");
    chat("openai", "OpenAI", "https://api.openai.com/v1", "OPENAI_API_KEY");
    chat("deepseek", "DeepSeek", "https://api.deepseek.com", "DEEPSEEK_API_KEY");
    chat("grok", "xAI Grok", "https://api.x.ai/v1", "XAI_API_KEY");
    chat("mistral", "Mistral", "https://api.mistral.ai/v1", "MISTRAL_API_KEY");
    providers.insert(
        "anthropic".to_string(),
        ProviderConfig {
            label: "Anthropic".to_string(),
            kind: ProviderKind::Messages,
            base_url: "https://api.anthropic.com/v1".to_string(),
            key_env: "ANTHROPIC_API_KEY".to_string(),
        },
    );
    providers.insert(
        "gemini".to_string(),
        ProviderConfig {
            label: "Gemini".to_string(),
            kind: ProviderKind::GenerateContent,
            base_url: "https://generativelanguage.googleapis.com/v1beta".to_string(),
            key_env: "GEMINI_API_KEY".to_string(),
        },
    );
    providers
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let mut config: Config =
        toml::from_str(&content).with_context(|| "Failed to parse config file")?;

    if config.providers.is_empty() {
        config.providers = default_providers();
    }

    validate(&config)?;
    Ok(config)
}

fn validate(config: &Config) -> Result<()> {
    if config.chunking.chunk_size == 0 {
        anyhow::bail!("chunking.chunk_size must be > 0");
    }
    if config.chunking.overlap >= config.chunking.chunk_size {
        anyhow::bail!("chunking.overlap must be < chunking.chunk_size");
    }
    if config.retrieval.top_k == 0 {
        anyhow::bail!("retrieval.top_k must be >= 1");
    }
    if config.retrieval.cached_scopes == 0 {
        anyhow::bail!("retrieval.cached_scopes must be >= 1");
    }
    if config.embedding.dims == 0 {
        anyhow::bail!("embedding.dims must be > 0");
    }
    match config.embedding.provider.as_str() {
        "openai" => {}
        other => anyhow::bail!("Unknown embedding provider: '{}'. Must be openai.", other),
    }
    if !config.providers.contains_key(&config.chat.default_provider) {
        anyhow::bail!(
            "chat.default_provider '{}' has no [providers.{}] entry",
            config.chat.default_provider,
            config.chat.default_provider
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = Config::default();
        validate(&config).unwrap();
        assert_eq!(config.chunking.chunk_size, 1000);
        assert_eq!(config.chunking.overlap, 200);
        assert_eq!(config.retrieval.top_k, 4);
        assert!(config.providers.contains_key("gemini"));
    }

    #[test]
    fn parses_partial_toml_with_defaults() {
        let config: Config = toml::from_str(
            r#"
            [chunking]
            chunk_size = 500

            [providers.local]
            label = "Local"
            kind = "chat-completions"
            base_url = "http://localhost:8080/v1"
            key_env = "LOCAL_API_KEY"
            "#,
        )
        .unwrap();
        assert_eq!(config.chunking.chunk_size, 500);
        assert_eq!(config.chunking.overlap, 200);
        assert_eq!(config.providers["local"].kind, ProviderKind::ChatCompletions);
    }

    #[test]
    fn rejects_overlap_at_or_above_chunk_size() {
        let mut config = Config::default();
        config.chunking.overlap = config.chunking.chunk_size;
        assert!(validate(&config).is_err());
    }

    #[test]
    fn provider_kind_kebab_case() {
        let kind: ProviderKind = serde_json::from_str("\"generate-content\"").unwrap();
        assert_eq!(kind, ProviderKind::GenerateContent);
    }
}
