//! Recognition and correction capabilities.
//!
//! The pipeline only sees two traits:
//!
//! * [`Recognizer`] — `unit → text + metadata`, plus whether whole PDFs can
//!   be handed over unrendered;
//! * [`Corrector`] — `text → refined text`.
//!
//! Concrete backends form a closed set, [`Backend`], chosen once from
//! [`BackendKind`] at startup. An unknown backend is therefore a config
//! parse error, never a lookup failure deep inside a running batch.
//!
//! Neither trait takes a cancellation token: the executor and the correction
//! pass race every call against the shared token and drop the future on
//! cancellation (the tesseract child process is killed on drop).

pub mod refine;
pub mod tesseract;
pub mod vision;

pub use refine::LlmCorrector;
pub use tesseract::TesseractRecognizer;
pub use vision::VisionRecognizer;

use crate::config::{BackendKind, BatchConfig};
use crate::error::{BackendError, BatchError};
use crate::model::{Recognition, Unit};
use async_trait::async_trait;
use edgequake_llm::{ChatMessage, CompletionOptions, LLMProvider, ProviderFactory};
use std::sync::Arc;
use tokio::time::{sleep, Duration};
use tracing::{debug, warn};

/// Turns one unit into text.
#[async_trait]
pub trait Recognizer: Send + Sync {
    /// Short name for logs and metadata.
    fn name(&self) -> &str;

    /// Whether whole multi-page documents can be recognised without rendering.
    fn supports_native_multi_page(&self) -> bool {
        false
    }

    async fn recognize(&self, unit: &Unit) -> Result<Recognition, BackendError>;
}

/// Refines already-recognised text.
#[async_trait]
pub trait Corrector: Send + Sync {
    async fn complete(&self, text: &str) -> Result<String, BackendError>;
}

/// The closed set of recognition backends.
pub enum Backend {
    Vision(VisionRecognizer),
    Tesseract(TesseractRecognizer),
}

impl Backend {
    /// Construct the backend named by `config.backend`.
    pub fn from_config(config: &BatchConfig) -> Result<Self, BatchError> {
        match &config.backend {
            BackendKind::Vision { provider, model } => {
                let resolved = resolve_provider(
                    config.provider.as_ref(),
                    provider.as_deref(),
                    model.as_deref(),
                )?;
                Ok(Backend::Vision(VisionRecognizer::new(resolved, config)))
            }
            BackendKind::Tesseract { binary, language } => Ok(Backend::Tesseract(
                TesseractRecognizer::new(binary.clone(), language.clone()),
            )),
        }
    }
}

#[async_trait]
impl Recognizer for Backend {
    fn name(&self) -> &str {
        match self {
            Backend::Vision(v) => v.name(),
            Backend::Tesseract(t) => t.name(),
        }
    }

    fn supports_native_multi_page(&self) -> bool {
        match self {
            Backend::Vision(v) => v.supports_native_multi_page(),
            Backend::Tesseract(t) => t.supports_native_multi_page(),
        }
    }

    async fn recognize(&self, unit: &Unit) -> Result<Recognition, BackendError> {
        match self {
            Backend::Vision(v) => v.recognize(unit).await,
            Backend::Tesseract(t) => t.recognize(unit).await,
        }
    }
}

// ── Provider resolution ──────────────────────────────────────────────────

/// A provider plus the name it was resolved under.
#[derive(Clone)]
pub struct ResolvedProvider {
    pub provider: Arc<dyn LLMProvider>,
    pub name: String,
}

/// Resolve the LLM provider, from most-specific to least-specific:
///
/// 1. pre-built provider (`config.provider`), used as-is;
/// 2. named provider + model, API key read from the environment;
/// 3. `EDGEQUAKE_LLM_PROVIDER` + `EDGEQUAKE_MODEL`, when both set;
/// 4. `OPENAI_API_KEY` present → OpenAI;
/// 5. full auto-detection via [`ProviderFactory::from_env`].
pub fn resolve_provider(
    explicit: Option<&Arc<dyn LLMProvider>>,
    provider_name: Option<&str>,
    model: Option<&str>,
) -> Result<ResolvedProvider, BatchError> {
    if let Some(provider) = explicit {
        return Ok(ResolvedProvider {
            name: provider.name().to_string(),
            provider: Arc::clone(provider),
        });
    }

    if let Some(name) = provider_name {
        let model = model.unwrap_or("gpt-4.1-nano");
        return create_provider(name, model);
    }

    if let (Ok(prov), Ok(env_model)) = (
        std::env::var("EDGEQUAKE_LLM_PROVIDER"),
        std::env::var("EDGEQUAKE_MODEL"),
    ) {
        if !prov.is_empty() && !env_model.is_empty() {
            return create_provider(&prov, model.unwrap_or(&env_model));
        }
    }

    if let Ok(openai_key) = std::env::var("OPENAI_API_KEY") {
        if !openai_key.is_empty() {
            return create_provider("openai", model.unwrap_or("gpt-4.1-nano"));
        }
    }

    let (provider, _embedding) =
        ProviderFactory::from_env().map_err(|e| BatchError::ProviderNotConfigured {
            provider: "auto".to_string(),
            hint: format!(
                "No LLM provider could be auto-detected from environment.\n\
                Set OPENAI_API_KEY, ANTHROPIC_API_KEY, GEMINI_API_KEY, or use --backend tesseract.\n\
                Error: {}",
                e
            ),
        })?;

    Ok(ResolvedProvider {
        name: provider.name().to_string(),
        provider,
    })
}

fn create_provider(name: &str, model: &str) -> Result<ResolvedProvider, BatchError> {
    let provider = ProviderFactory::create_llm_provider(name, model).map_err(|e| {
        BatchError::ProviderNotConfigured {
            provider: name.to_string(),
            hint: format!("{e}"),
        }
    })?;
    Ok(ResolvedProvider {
        provider,
        name: name.to_string(),
    })
}

// ── Shared chat-with-retry loop ──────────────────────────────────────────

/// Retry policy for provider calls.
#[derive(Debug, Clone, Copy)]
pub(crate) struct RetryPolicy {
    pub max_retries: u32,
    pub backoff_ms: u64,
}

impl RetryPolicy {
    /// Delay before attempt `attempt` (1-based): `backoff_ms * 2^(attempt-1)`.
    pub fn delay(&self, attempt: u32) -> Duration {
        let factor = 2u64.saturating_pow(attempt.saturating_sub(1));
        Duration::from_millis(self.backoff_ms.saturating_mul(factor))
    }
}

/// The parts of a provider response the pipeline keeps.
#[derive(Debug, Clone)]
pub(crate) struct ChatReply {
    pub content: String,
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub retries: u32,
}

/// Send `messages`, retrying transient failures with exponential backoff.
///
/// HTTP 429 / 503 errors are frequent under concurrent load; backing off
/// exponentially avoids N workers hammering a recovering endpoint in lockstep.
pub(crate) async fn chat_with_retry(
    provider: &ResolvedProvider,
    messages: &[ChatMessage],
    options: &CompletionOptions,
    policy: RetryPolicy,
    label: &str,
) -> Result<ChatReply, BackendError> {
    let mut last_err: Option<String> = None;

    for attempt in 0..=policy.max_retries {
        if attempt > 0 {
            let backoff = policy.delay(attempt);
            warn!(
                "{}: retry {}/{} after {:?}",
                label, attempt, policy.max_retries, backoff
            );
            sleep(backoff).await;
        }

        match provider.provider.chat(messages, Some(options)).await {
            Ok(response) => {
                debug!(
                    "{}: {} input tokens, {} output tokens",
                    label, response.prompt_tokens, response.completion_tokens
                );
                return Ok(ChatReply {
                    content: response.content,
                    input_tokens: response.prompt_tokens as u64,
                    output_tokens: response.completion_tokens as u64,
                    retries: attempt,
                });
            }
            Err(e) => {
                let err_msg = format!("{}", e);
                warn!("{}: attempt {} failed — {}", label, attempt + 1, err_msg);
                last_err = Some(err_msg);
            }
        }
    }

    Err(BackendError::Provider {
        provider: provider.name.clone(),
        retries: policy.max_retries,
        detail: last_err.unwrap_or_else(|| "Unknown error".to_string()),
    })
}
