//! Errors of the text-generation backend.

use thiserror::Error;

/// Why a generation request produced no text.
///
/// None of these reach the wire as a failure: the
/// [`Generator`](crate::Generator) boundary folds them into `[GPT-ERROR]`
/// result text.
#[derive(Debug, Error)]
pub enum LlmError {
    /// No provider is configured, or the API key is missing.
    #[error("no text-generation backend configured")]
    NoBackend,

    /// The provider answered 2xx but the body was not JSON or carried no
    /// generated text where that provider puts it.
    #[error("unreadable {backend} reply: {detail}")]
    BadReply {
        /// Provider name.
        backend: &'static str,
        /// What was wrong with the body.
        detail: String,
    },

    /// Every attempt failed at the transport or HTTP status level. A timed
    /// out attempt lands here too, with reqwest's message as `last_error`.
    #[error("{backend} gave no reply after {attempts} attempt(s): {last_error}")]
    AttemptsExhausted {
        /// Provider name.
        backend: &'static str,
        /// Attempts made, the first one included.
        attempts: u32,
        /// Failure of the final attempt.
        last_error: String,
    },

    /// Unknown provider name, or the HTTP client could not be built.
    #[error("invalid text-generation config: {0}")]
    Config(String),
}
