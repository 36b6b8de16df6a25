//! The text-generation capability used by the `gpt` mode.
//!
//! A [`Generator`] turns a prompt into text and never fails: backend
//! unavailability and backend errors come back as clearly marked strings, so
//! the protocol layer reports them as ordinary successful results.

use async_trait::async_trait;
use calcwire_core::config::LlmConfig;
use tracing::{debug, warn};

use crate::client::LlmClient;
use crate::types::LlmRequest;

/// Marker prefix of stub output.
pub const STUB_MARKER: &str = "[GPT-STUB]";
/// Marker prefix of backend error output.
pub const ERROR_MARKER: &str = "[GPT-ERROR]";

/// Capability: `generate(prompt) -> text`.
#[async_trait]
pub trait Generator: Send + Sync {
    /// Produce text for `prompt`. Must not panic and has no error path.
    async fn generate(&self, prompt: &str) -> String;
}

/// Deterministic placeholder derived only from the prompt's length in
/// characters.
#[must_use]
pub fn stub_text(prompt: &str) -> String {
    format!(
        "{STUB_MARKER} Received a prompt of length {} chars. (API inactive)",
        prompt.chars().count()
    )
}

/// A generator that never contacts a backend.
#[derive(Debug, Clone, Copy, Default)]
pub struct StubGenerator;

#[async_trait]
impl Generator for StubGenerator {
    async fn generate(&self, prompt: &str) -> String {
        stub_text(prompt)
    }
}

/// A generator backed by an [`LlmClient`].
#[derive(Debug)]
pub struct LlmGenerator {
    client: LlmClient,
    system_prompt: String,
    max_tokens: u32,
    temperature: f32,
    timeout_ms: u64,
}

impl LlmGenerator {
    /// Wrap `client` with default sampling settings.
    #[must_use]
    pub fn new(client: LlmClient) -> Self {
        let defaults = LlmConfig::default();
        Self {
            client,
            system_prompt: defaults.system_prompt,
            max_tokens: defaults.max_tokens,
            temperature: defaults.temperature,
            timeout_ms: defaults.timeout_ms,
        }
    }

    /// Wrap `client` using the sampling settings from `config`.
    #[must_use]
    pub fn with_config(client: LlmClient, config: &LlmConfig) -> Self {
        Self {
            client,
            system_prompt: config.system_prompt.clone(),
            max_tokens: config.max_tokens,
            temperature: config.temperature,
            timeout_ms: config.timeout_ms,
        }
    }

    /// Whether a real backend is configured.
    #[must_use]
    pub fn is_live(&self) -> bool {
        self.client.is_available()
    }
}

#[async_trait]
impl Generator for LlmGenerator {
    async fn generate(&self, prompt: &str) -> String {
        if !self.client.is_available() {
            return stub_text(prompt);
        }

        let request = LlmRequest::new(self.system_prompt.as_str(), prompt)
            .with_max_tokens(self.max_tokens)
            .with_temperature(self.temperature)
            .with_timeout(self.timeout_ms);

        match self.client.generate(&request).await {
            Ok(response) => {
                debug!(
                    model = %response.model,
                    tokens = response.tokens_generated,
                    latency_ms = response.latency_ms,
                    "generation complete"
                );
                response.text
            }
            Err(e) => {
                warn!(error = %e, "generation failed");
                format!("{ERROR_MARKER} Failed to get response from API: {e}")
            }
        }
    }
}
