//! Vision-LLM recognition via edgequake-llm.
//!
//! Each unit becomes one chat request: a system prompt plus a user message
//! carrying the page image (or the whole PDF when the provider reads
//! documents natively). Transient API failures are retried with exponential
//! backoff; the reply is normalised with [`clean_text`].

use super::{chat_with_retry, Recognizer, ResolvedProvider, RetryPolicy};
use crate::config::BatchConfig;
use crate::error::BackendError;
use crate::model::{Payload, Recognition, Unit};
use crate::pipeline::encode::encode_payload;
use crate::pipeline::postprocess::clean_text;
use crate::prompts::recognition_prompt;
use async_trait::async_trait;
use edgequake_llm::{ChatMessage, CompletionOptions};

/// Providers whose vision endpoint accepts `application/pdf` attachments.
const NATIVE_PDF_PROVIDERS: &[&str] = &["gemini", "vertexai"];

pub struct VisionRecognizer {
    provider: ResolvedProvider,
    system_prompt: Option<String>,
    options: CompletionOptions,
    policy: RetryPolicy,
}

impl VisionRecognizer {
    pub fn new(provider: ResolvedProvider, config: &BatchConfig) -> Self {
        Self {
            provider,
            system_prompt: config.system_prompt.clone(),
            options: build_options(config),
            policy: RetryPolicy {
                max_retries: config.max_retries,
                backoff_ms: config.retry_backoff_ms,
            },
        }
    }

    fn build_messages(&self, unit: &Unit) -> Result<Vec<ChatMessage>, BackendError> {
        let whole_document = matches!(unit.payload, Payload::Pdf(_));
        let prompt = recognition_prompt(self.system_prompt.as_deref(), whole_document);
        let attachment =
            encode_payload(&unit.payload).map_err(|e| BackendError::Encode(e.to_string()))?;
        Ok(vec![
            ChatMessage::system(prompt),
            ChatMessage::user_with_images("", vec![attachment]),
        ])
    }
}

#[async_trait]
impl Recognizer for VisionRecognizer {
    fn name(&self) -> &str {
        &self.provider.name
    }

    fn supports_native_multi_page(&self) -> bool {
        native_pdf_provider(&self.provider.name)
    }

    async fn recognize(&self, unit: &Unit) -> Result<Recognition, BackendError> {
        let messages = self.build_messages(unit)?;
        let label = unit.id.to_string();
        let reply = chat_with_retry(
            &self.provider,
            &messages,
            &self.options,
            self.policy,
            &label,
        )
        .await?;

        Ok(Recognition::text(clean_text(&reply.content))
            .with_metadata("backend", self.provider.name.clone())
            .with_metadata("model", self.provider.provider.model().to_string())
            .with_metadata("input_tokens", reply.input_tokens.to_string())
            .with_metadata("output_tokens", reply.output_tokens.to_string())
            .with_metadata("retries", reply.retries.to_string()))
    }
}

fn native_pdf_provider(name: &str) -> bool {
    NATIVE_PDF_PROVIDERS
        .iter()
        .any(|p| name.eq_ignore_ascii_case(p))
}

/// Build `CompletionOptions` from the batch config.
pub(crate) fn build_options(config: &BatchConfig) -> CompletionOptions {
    CompletionOptions {
        temperature: Some(config.temperature),
        max_tokens: Some(config.max_tokens),
        ..Default::default()
    }
}
