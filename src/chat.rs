//! Chat orchestration.
//!
//! Ties the collaborators together for one request: validate the
//! message, record the user turn, retrieve document context, optionally
//! search the web, compose the prompt, dispatch to the selected
//! provider, and record the assistant turn. History is written before
//! retrieval so the user turn survives even when a downstream step
//! fails; the prompt composer receives history with the just-appended
//! user turn dropped to avoid repeating the active message.

use std::sync::Arc;

use tracing::{debug, info};
use uuid::Uuid;

use crate::config::{ChatConfig, Config};
use crate::engine::RetrievalEngine;
use crate::error::{Error, Result};
use crate::history::HistoryStore;
use crate::models::{Citation, Role, WebResult};
use crate::prompt::compose;
use crate::provider::ProviderRegistry;
use crate::websearch::WebSearcher;

/// One chat request. `scope` absent means "start a new conversation";
/// provider, model, and system prompt fall back to configured defaults.
#[derive(Debug, Clone, Default)]
pub struct ChatRequest {
    pub scope: Option<String>,
    pub message: String,
    pub provider: Option<String>,
    pub model: Option<String>,
    pub system_prompt: Option<String>,
    pub use_web: bool,
}

#[derive(Debug, Clone)]
pub struct ChatResponse {
    /// The scope the exchange was recorded under; minted when the
    /// request carried none.
    pub scope: String,
    pub message: String,
    pub provider: String,
    pub model: String,
    pub citations: Vec<Citation>,
    pub context_files: Vec<String>,
    pub web_results: Vec<WebResult>,
}

pub struct ChatService {
    engine: Arc<RetrievalEngine>,
    providers: ProviderRegistry,
    history: Arc<dyn HistoryStore>,
    web: WebSearcher,
    chat: ChatConfig,
    top_k: usize,
}

impl ChatService {
    pub fn new(
        engine: Arc<RetrievalEngine>,
        providers: ProviderRegistry,
        history: Arc<dyn HistoryStore>,
        web: WebSearcher,
        config: &Config,
    ) -> Self {
        Self {
            engine,
            providers,
            history,
            web,
            chat: config.chat.clone(),
            top_k: config.retrieval.top_k,
        }
    }

    /// Run one chat exchange end to end.
    pub async fn chat(&self, request: ChatRequest) -> Result<ChatResponse> {
        let message = request.message.trim();
        if message.is_empty() {
            return Err(Error::precondition("Empty message"));
        }
        if message.len() > self.chat.max_message_len {
            return Err(Error::precondition(format!(
                "Message too long ({} > {} characters)",
                message.len(),
                self.chat.max_message_len
            )));
        }

        let scope = request
            .scope
            .clone()
            .unwrap_or_else(|| Uuid::new_v4().to_string());

        self.history.append(&scope, Role::User, message).await?;

        let retrieval = self.engine.retrieve(message, &scope, self.top_k).await?;

        let web_results = if request.use_web {
            self.web.search(message, self.web.max_results).await?
        } else {
            Vec::new()
        };

        let mut history = match self.chat.max_history {
            Some(limit) => self.history.recent(&scope, limit).await?,
            None => self.history.list(&scope).await?,
        };
        // The active message was just appended; keep it out of the
        // conversation section.
        if history
            .last()
            .is_some_and(|turn| turn.role == Role::User && turn.content == message)
        {
            history.pop();
        }

        let system_prompt = request
            .system_prompt
            .as_deref()
            .unwrap_or(&self.chat.system_prompt);
        let prompt = compose(
            system_prompt,
            message,
            &retrieval.passages,
            &web_results,
            &history,
        );

        let provider_id = request
            .provider
            .as_deref()
            .unwrap_or(&self.chat.default_provider);
        let provider = self
            .providers
            .get(provider_id)
            .ok_or_else(|| Error::precondition(format!("Unknown provider: {provider_id}")))?;
        let api_key = self.providers.resolve_key(provider)?;
        let model = request
            .model
            .as_deref()
            .unwrap_or(&self.chat.default_model);

        debug!(
            scope,
            provider = provider_id,
            model,
            passages = retrieval.passages.len(),
            web = web_results.len(),
            "dispatching prompt"
        );
        let reply = provider.send(&api_key, model, system_prompt, &prompt).await?;

        self.history.append(&scope, Role::Assistant, &reply).await?;
        info!(scope, provider = provider_id, model, "chat exchange completed");

        Ok(ChatResponse {
            scope,
            message: reply,
            provider: provider_id.to_string(),
            model: model.to_string(),
            citations: retrieval.citations,
            context_files: retrieval.files,
            web_results,
        })
    }

    /// List model names offered by a configured provider.
    pub async fn list_models(&self, provider_id: &str) -> Result<Vec<String>> {
        let provider = self
            .providers
            .get(provider_id)
            .ok_or_else(|| Error::precondition(format!("Unknown provider: {provider_id}")))?;
        let api_key = self.providers.resolve_key(provider)?;
        provider.list_models(&api_key).await
    }

    /// Configured provider ids, for discovery surfaces.
    pub fn provider_ids(&self) -> Vec<String> {
        self.providers.ids().map(|id| id.to_string()).collect()
    }
}
