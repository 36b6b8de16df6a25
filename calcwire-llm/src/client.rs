//! LLM Client: unified interface for OpenAI-compatible and Ollama backends.

use std::time::{Duration, Instant};

use calcwire_core::config::LlmConfig;
use reqwest::{Client, RequestBuilder};
use serde_json::{Value, json};
use tracing::{debug, info, warn};

use crate::error::LlmError;
use crate::types::{LlmRequest, LlmResponse};

/// Provider backend for LLM inference.
#[derive(Debug, Clone)]
pub enum LlmProvider {
    /// OpenAI-compatible chat completions API.
    OpenAiCompatible { base_url: String, api_key: String },
    /// Ollama running locally.
    Ollama { base_url: String },
    /// No LLM available; callers fall back to stub output.
    None,
}

/// The main LLM client that routes requests to the configured backend.
pub struct LlmClient {
    provider: LlmProvider,
    http: Client,
    model: String,
    max_retries: u32,
}

impl std::fmt::Debug for LlmClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // The provider holds the API key; only its kind is printed.
        let provider = match self.provider {
            LlmProvider::OpenAiCompatible { .. } => "openai",
            LlmProvider::Ollama { .. } => "ollama",
            LlmProvider::None => "none",
        };
        f.debug_struct("LlmClient")
            .field("provider", &provider)
            .field("model", &self.model)
            .field("max_retries", &self.max_retries)
            .finish_non_exhaustive()
    }
}

impl LlmClient {
    /// Create a new LLM client.
    #[must_use]
    pub fn new(provider: LlmProvider, model: impl Into<String>, max_retries: u32) -> Self {
        Self {
            provider,
            http: Client::new(),
            model: model.into(),
            max_retries,
        }
    }

    /// Create a client with no LLM backend (all calls fail → stub fallback).
    #[must_use]
    pub fn none() -> Self {
        Self::new(LlmProvider::None, String::new(), 0)
    }

    /// Build a client from configuration.
    ///
    /// The OpenAI-compatible provider reads its key from the environment
    /// variable named by `api_key_env`; a missing or empty key disables the
    /// backend instead of failing.
    ///
    /// # Errors
    /// Returns [`LlmError::Config`] for an unknown provider name or when
    /// the HTTP client cannot be constructed.
    pub fn from_config(config: &LlmConfig) -> Result<Self, LlmError> {
        let provider = match config.provider.as_str() {
            "none" => LlmProvider::None,
            "ollama" => LlmProvider::Ollama { base_url: config.base_url.clone() },
            "openai" => match std::env::var(&config.api_key_env) {
                Ok(api_key) if !api_key.is_empty() => LlmProvider::OpenAiCompatible {
                    base_url: config.base_url.clone(),
                    api_key,
                },
                _ => {
                    warn!(env = %config.api_key_env, "API key not set, text generation will use the stub");
                    LlmProvider::None
                }
            },
            other => return Err(LlmError::Config(format!("unknown provider '{other}'"))),
        };

        let http = Client::builder()
            .build()
            .map_err(|e| LlmError::Config(format!("http client: {e}")))?;
        info!(provider = %config.provider, model = %config.model, "LLM client ready");
        Ok(Self {
            provider,
            http,
            model: config.model.clone(),
            max_retries: config.max_retries,
        })
    }

    /// Generate a response from the LLM.
    ///
    /// Returns `Err` if the LLM is unavailable or all retries fail.
    pub async fn generate(&self, request: &LlmRequest) -> Result<LlmResponse, LlmError> {
        match &self.provider {
            LlmProvider::None => Err(LlmError::NoBackend),
            LlmProvider::OpenAiCompatible { base_url, api_key } => {
                let url = format!("{}/v1/chat/completions", base_url.trim_end_matches('/'));
                let body = json!({
                    "model": self.model,
                    "messages": [
                        { "role": "system", "content": request.system },
                        { "role": "user", "content": request.user },
                    ],
                    "max_tokens": request.max_tokens,
                    "temperature": request.temperature,
                });
                self.send_with_retries(
                    "OpenAI",
                    request,
                    || {
                        self.http
                            .post(&url)
                            .header("Authorization", format!("Bearer {api_key}"))
                            .json(&body)
                    },
                    |json| {
                        let text = json["choices"][0]["message"]["content"].as_str()?.to_string();
                        let tokens = json["usage"]["completion_tokens"].as_u64().unwrap_or(0);
                        Some((text, tokens))
                    },
                )
                .await
            }
            LlmProvider::Ollama { base_url } => {
                let url = format!("{}/api/generate", base_url.trim_end_matches('/'));
                let body = json!({
                    "model": self.model,
                    "prompt": format!("{}\n\n{}", request.system, request.user),
                    "stream": false,
                    "options": {
                        "temperature": request.temperature,
                        "num_predict": request.max_tokens,
                    }
                });
                self.send_with_retries(
                    "Ollama",
                    request,
                    || self.http.post(&url).json(&body),
                    |json| {
                        let text = json["response"].as_str()?.to_string();
                        let tokens = json["eval_count"].as_u64().unwrap_or(0);
                        Some((text, tokens))
                    },
                )
                .await
            }
        }
    }

    /// Send a request up to `max_retries + 1` times, extracting the generated
    /// text and token count from the first successful reply.
    async fn send_with_retries<B, X>(
        &self,
        backend: &'static str,
        request: &LlmRequest,
        build: B,
        extract: X,
    ) -> Result<LlmResponse, LlmError>
    where
        B: Fn() -> RequestBuilder,
        X: Fn(&Value) -> Option<(String, u64)>,
    {
        let mut last_error = String::new();
        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                debug!("Retrying {} call (attempt {}/{})", backend, attempt + 1, self.max_retries + 1);
            }

            let start = Instant::now();
            let result = build()
                .timeout(Duration::from_millis(request.timeout_ms))
                .send()
                .await;
            let latency_ms = u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX);

            match result {
                Ok(resp) if resp.status().is_success() => {
                    let json: Value = resp
                        .json()
                        .await
                        .map_err(|e| LlmError::BadReply { backend, detail: e.to_string() })?;
                    let (text, tokens) = extract(&json).ok_or_else(|| {
                        LlmError::BadReply { backend, detail: "no generated text".into() }
                    })?;
                    return Ok(LlmResponse {
                        text,
                        tokens_generated: u32::try_from(tokens).unwrap_or(u32::MAX),
                        latency_ms,
                        model: self.model.clone(),
                    });
                }
                Ok(resp) => {
                    last_error = format!("HTTP {}", resp.status());
                    warn!("{} returned error: {}", backend, last_error);
                }
                Err(e) => {
                    last_error = e.to_string();
                    if e.is_timeout() {
                        warn!("{} request timed out after {}ms", backend, request.timeout_ms);
                    } else {
                        warn!("{} request failed: {}", backend, last_error);
                    }
                }
            }
        }

        Err(LlmError::AttemptsExhausted {
            backend,
            attempts: self.max_retries + 1,
            last_error,
        })
    }

    /// Check if the LLM client has a backend configured.
    #[must_use]
    pub fn is_available(&self) -> bool {
        !matches!(self.provider, LlmProvider::None)
    }
}
