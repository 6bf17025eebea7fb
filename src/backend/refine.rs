//! LLM-backed text correction.

use super::{chat_with_retry, resolve_provider, Corrector, ResolvedProvider, RetryPolicy};
use crate::config::{BackendKind, BatchConfig};
use crate::error::{BackendError, BatchError};
use crate::pipeline::postprocess::clean_text;
use crate::prompts::DEFAULT_CORRECTION_PROMPT;
use async_trait::async_trait;
use edgequake_llm::{ChatMessage, CompletionOptions};

/// Sends stitched text to an LLM with a proofreading prompt.
pub struct LlmCorrector {
    provider: ResolvedProvider,
    prompt: String,
    options: CompletionOptions,
    policy: RetryPolicy,
}

impl LlmCorrector {
    pub fn new(provider: ResolvedProvider, config: &BatchConfig) -> Self {
        Self {
            provider,
            prompt: config
                .correction
                .prompt
                .clone()
                .unwrap_or_else(|| DEFAULT_CORRECTION_PROMPT.to_string()),
            options: super::vision::build_options(config),
            policy: RetryPolicy {
                max_retries: config.max_retries,
                backoff_ms: config.retry_backoff_ms,
            },
        }
    }

    /// Resolve a provider for correction.
    ///
    /// Uses the vision provider name when the recognition backend is a
    /// vision LLM, and `correction.model` over the recognition model.
    pub fn from_config(config: &BatchConfig) -> Result<Self, BatchError> {
        let (provider_name, model) = match &config.backend {
            BackendKind::Vision { provider, model } => (provider.as_deref(), model.as_deref()),
            BackendKind::Tesseract { .. } => (None, None),
        };
        let model = config.correction.model.as_deref().or(model);
        let resolved = match (&config.provider, &config.correction.model) {
            // A caller-supplied provider only wins if no separate model was asked for.
            (Some(p), None) => resolve_provider(Some(p), None, None)?,
            _ => resolve_provider(None, provider_name, model)?,
        };
        Ok(Self::new(resolved, config))
    }
}

#[async_trait]
impl Corrector for LlmCorrector {
    async fn complete(&self, text: &str) -> Result<String, BackendError> {
        let messages = vec![ChatMessage::system(self.prompt.clone()), ChatMessage::user(text)];
        let reply = chat_with_retry(
            &self.provider,
            &messages,
            &self.options,
            self.policy,
            "correction",
        )
        .await?;
        Ok(clean_text(&reply.content))
    }
}
