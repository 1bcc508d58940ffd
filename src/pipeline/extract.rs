//! Text extraction: send one normalised image to a vision service.
//!
//! The instruction lives in [`crate::prompts`] and the provider plumbing in
//! `edgequake-llm`. This module adds failure classification: every outcome is either text or a
//! [`PageError`] whose kind tells the user whether waiting (rate limit),
//! resubmitting (transient), or fixing the key (not configured) will help.

use crate::error::PageError;
use crate::pipeline::normalize::NormalizedImage;
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use edgequake_llm::{ChatMessage, CompletionOptions, ImageData, LLMProvider, LlmError};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// An external capability that turns an image into text.
#[async_trait]
pub trait TextExtractionService: Send + Sync {
    /// Identifier used in logs, e.g. `gemini/gemini-2.0-flash`.
    fn name(&self) -> &str;

    /// Send `instruction` plus `image`; return the service's text verbatim.
    async fn extract_text(
        &self,
        instruction: &str,
        image: &NormalizedImage,
    ) -> Result<String, PageError>;
}

/// Drives one [`TextExtractionService`] call per image.
///
/// Holds no service when no credential was available; every call then fails
/// with [`PageError::ServiceNotConfigured`] without touching the network.
#[derive(Clone)]
pub struct PageExtractor {
    service: Option<Arc<dyn TextExtractionService>>,
    instruction: String,
    timeout: Duration,
    unconfigured_reason: Option<String>,
}

impl PageExtractor {
    pub fn new(
        service: Arc<dyn TextExtractionService>,
        instruction: impl Into<String>,
        timeout: Duration,
    ) -> Self {
        Self {
            service: Some(service),
            instruction: instruction.into(),
            timeout,
            unconfigured_reason: None,
        }
    }

    /// An extractor with no service behind it; `reason` tells the user what
    /// to fix.
    pub fn unconfigured(reason: impl Into<String>) -> Self {
        Self {
            service: None,
            instruction: crate::prompts::HANDWRITING_INSTRUCTION.to_string(),
            timeout: Duration::from_secs(60),
            unconfigured_reason: Some(reason.into()),
        }
    }

    pub fn is_configured(&self) -> bool {
        self.service.is_some()
    }

    /// Why there is no service, if there is none.
    pub fn unconfigured_reason(&self) -> Option<&str> {
        match self.service {
            Some(_) => None,
            None => Some(
                self.unconfigured_reason
                    .as_deref()
                    .unwrap_or("no API key has been provided"),
            ),
        }
    }

    pub fn instruction(&self) -> &str {
        &self.instruction
    }

    /// Extract text from one image.
    pub async fn extract(&self, image: &NormalizedImage) -> Result<String, PageError> {
        let service = self
            .service
            .as_ref()
            .ok_or_else(|| PageError::ServiceNotConfigured {
                detail: self.unconfigured_reason().unwrap_or_default().to_string(),
            })?;

        let start = Instant::now();
        let result = tokio::time::timeout(
            self.timeout,
            service.extract_text(&self.instruction, image),
        )
        .await
        .unwrap_or_else(|_| {
            Err(PageError::TransientService {
                detail: format!("call timed out after {}s", self.timeout.as_secs()),
            })
        });

        match &result {
            Ok(text) => debug!(
                "{}: {} chars in {:?}",
                service.name(),
                text.len(),
                start.elapsed()
            ),
            Err(e) => warn!("{}: extraction failed: {}", service.name(), e),
        }
        result
    }
}

impl std::fmt::Debug for PageExtractor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PageExtractor")
            .field("service", &self.service.as_ref().map(|s| s.name().to_string()))
            .field("instruction", &self.instruction)
            .field("timeout", &self.timeout)
            .finish()
    }
}

/// [`TextExtractionService`] backed by an `edgequake-llm` vision provider.
pub struct VisionLlmService {
    provider: Arc<dyn LLMProvider>,
    label: String,
    options: CompletionOptions,
}

impl VisionLlmService {
    pub fn new(provider: Arc<dyn LLMProvider>, label: impl Into<String>) -> Self {
        Self {
            provider,
            label: label.into(),
            options: CompletionOptions::default(),
        }
    }

    /// Set sampling temperature and output-token cap.
    pub fn with_options(mut self, temperature: f32, max_tokens: usize) -> Self {
        self.options = CompletionOptions {
            temperature: Some(temperature),
            max_tokens: Some(max_tokens),
            ..Default::default()
        };
        self
    }
}

#[async_trait]
impl TextExtractionService for VisionLlmService {
    fn name(&self) -> &str {
        &self.label
    }

    async fn extract_text(
        &self,
        instruction: &str,
        image: &NormalizedImage,
    ) -> Result<String, PageError> {
        let b64 = STANDARD.encode(&image.bytes);
        let data = ImageData::new(b64, image.media_type).with_detail("high");
        let messages = vec![ChatMessage::user_with_images(instruction, vec![data])];

        let response = self
            .provider
            .chat(&messages, Some(&self.options))
            .await
            .map_err(|e| classify_provider_error(&e))?;

        Ok(response.content)
    }
}

/// Map a provider error onto a [`PageError`] kind.
///
/// The typed variant decides. Only the catch-all variants (`ApiError`,
/// `ProviderError`, `Unknown`) fall back to [`classify_message`], because
/// some providers report quota or auth failures there with the HTTP status in
/// the text.
pub fn classify_provider_error(err: &LlmError) -> PageError {
    let detail = err.to_string();
    match err {
        LlmError::RateLimited(_) => PageError::RateLimited { detail },
        LlmError::AuthError(_) | LlmError::ConfigError(_) => {
            PageError::ServiceNotConfigured { detail }
        }
        LlmError::NetworkError(_) | LlmError::Timeout => PageError::TransientService { detail },
        LlmError::ApiError(msg) | LlmError::ProviderError(msg) | LlmError::Unknown(msg) => {
            match classify_message(msg) {
                Some(kind) => kind.with_detail(detail),
                None => PageError::Other { detail },
            }
        }
        // InvalidRequest, TokenLimitExceeded, ModelNotFound, SerializationError,
        // NotSupported: resubmitting the same page will fail the same way.
        _ => PageError::Other { detail },
    }
}

/// Kind suggested by an untyped provider message, if any.
///
/// HTTP statuses only count as whole tokens, so a byte count such as
/// `4291872` never reads as a 429.
fn classify_message(message: &str) -> Option<MessageKind> {
    let lower = message.to_lowercase();
    let tokens: Vec<&str> = lower
        .split(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
        .filter(|t| !t.is_empty())
        .collect();
    let has_token = |wanted: &[&str]| tokens.iter().any(|t| wanted.contains(t));
    let has_phrase = |wanted: &[&str]| wanted.iter().any(|p| lower.contains(p));

    if has_token(&["429", "resource_exhausted", "rate_limit_exceeded"])
        || has_phrase(&[
            "rate limit",
            "too many requests",
            "quota exceeded",
            "exceeded your current quota",
        ])
    {
        Some(MessageKind::RateLimited)
    } else if has_token(&["401", "403", "unauthenticated", "permission_denied", "invalid_api_key"])
        || has_phrase(&["api key not valid", "invalid api key"])
    {
        Some(MessageKind::NotConfigured)
    } else if has_token(&[
        "500",
        "502",
        "503",
        "504",
        "unavailable",
        "overloaded",
        "deadline_exceeded",
    ]) {
        Some(MessageKind::Transient)
    } else {
        None
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MessageKind {
    RateLimited,
    NotConfigured,
    Transient,
}

impl MessageKind {
    fn with_detail(self, detail: String) -> PageError {
        match self {
            MessageKind::RateLimited => PageError::RateLimited { detail },
            MessageKind::NotConfigured => PageError::ServiceNotConfigured { detail },
            MessageKind::Transient => PageError::TransientService { detail },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct SlowService;

    #[async_trait]
    impl TextExtractionService for SlowService {
        fn name(&self) -> &str {
            "slow"
        }
        async fn extract_text(&self, _: &str, _: &NormalizedImage) -> Result<String, PageError> {
            tokio::time::sleep(Duration::from_secs(30)).await;
            Ok("late".into())
        }
    }

    struct EchoService {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl TextExtractionService for EchoService {
        fn name(&self) -> &str {
            "echo"
        }
        async fn extract_text(&self, instruction: &str, image: &NormalizedImage) -> Result<String, PageError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(format!("{instruction} [{}]", image.media_type))
        }
    }

    fn tiny_image() -> NormalizedImage {
        NormalizedImage {
            bytes: vec![0xFF, 0xD8, 0xFF],
            media_type: "image/jpeg",
            width: 1,
            height: 1,
        }
    }

    fn kind_of(err: LlmError) -> ErrorKind {
        classify_provider_error(&err).kind()
    }

    #[test]
    fn typed_variants_map_directly() {
        assert_eq!(kind_of(LlmError::RateLimited("slow down".into())), ErrorKind::RateLimited);
        assert_eq!(kind_of(LlmError::AuthError("bad key".into())), ErrorKind::ServiceNotConfigured);
        assert_eq!(
            kind_of(LlmError::ConfigError("GEMINI_API_KEY required".into())),
            ErrorKind::ServiceNotConfigured
        );
        assert_eq!(kind_of(LlmError::NetworkError("reset".into())), ErrorKind::TransientService);
        assert_eq!(kind_of(LlmError::Timeout), ErrorKind::TransientService);
    }

    #[test]
    fn permanent_variants_are_other() {
        assert_eq!(
            kind_of(LlmError::TokenLimitExceeded { max: 4096, got: 5000 }),
            ErrorKind::Other
        );
        assert_eq!(kind_of(LlmError::InvalidRequest("bad image".into())), ErrorKind::Other);
        assert_eq!(kind_of(LlmError::ModelNotFound("gemini-9".into())), ErrorKind::Other);
        assert_eq!(kind_of(LlmError::NotSupported("vision".into())), ErrorKind::Other);
        let bad_json = serde_json::from_str::<u8>("x").unwrap_err();
        assert_eq!(kind_of(LlmError::SerializationError(bad_json)), ErrorKind::Other);
    }

    #[test]
    fn status_digits_inside_numbers_do_not_match() {
        let err = LlmError::ApiError(
            "400 INVALID_ARGUMENT: request payload size 4291872 bytes exceeds limit".into(),
        );
        assert_eq!(kind_of(err), ErrorKind::Other);
        let err = LlmError::ProviderError("took 5003ms to fail validation".into());
        assert_eq!(kind_of(err), ErrorKind::Other);
    }

    #[test]
    fn untyped_messages_fall_back_to_status_tokens() {
        assert_eq!(
            kind_of(LlmError::ApiError("429 RESOURCE_EXHAUSTED: Quota exceeded".into())),
            ErrorKind::RateLimited
        );
        assert_eq!(
            kind_of(LlmError::ApiError("HTTP 503 Service Unavailable".into())),
            ErrorKind::TransientService
        );
        assert_eq!(
            kind_of(LlmError::ProviderError("401: API key not valid".into())),
            ErrorKind::ServiceNotConfigured
        );
        assert_eq!(
            kind_of(LlmError::Unknown("content blocked by safety filter".into())),
            ErrorKind::Other
        );
    }

    #[test]
    fn detail_keeps_provider_message() {
        let e = classify_provider_error(&LlmError::ApiError("content blocked".into()));
        assert_eq!(e.detail(), "API error: content blocked");
    }

    #[tokio::test]
    async fn unconfigured_fails_immediately() {
        let ex = PageExtractor::unconfigured("GEMINI_API_KEY is not set");
        assert!(!ex.is_configured());
        assert_eq!(ex.unconfigured_reason(), Some("GEMINI_API_KEY is not set"));
        let err = ex.extract(&tiny_image()).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ServiceNotConfigured);
    }

    #[tokio::test]
    async fn configured_passes_instruction_and_returns_verbatim() {
        let svc = Arc::new(EchoService {
            calls: AtomicUsize::new(0),
        });
        let ex = PageExtractor::new(svc.clone(), "Read it", Duration::from_secs(5));
        let text = ex.extract(&tiny_image()).await.unwrap();
        assert_eq!(text, "Read it [image/jpeg]");
        assert_eq!(svc.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn timeout_is_transient() {
        let ex = PageExtractor::new(Arc::new(SlowService), "x", Duration::from_secs(1));
        let err = ex.extract(&tiny_image()).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::TransientService);
        assert!(err.detail().contains("timed out"));
    }
}
