/// Text generation collaborator and the request gate in front of it
///
/// Every AI feature goes through [`AiGate::request`], which never fails: an
/// unconfigured key, a transport error and an empty completion each resolve
/// to a fixed sentence that callers can render as-is.
use std::sync::Arc;

use crate::error::AppResult;

pub mod gemini;
pub mod quiz;

pub use gemini::GeminiGenerator;

/// Returned when no API key is configured
pub const UNAVAILABLE_REPLY: &str = "AI Unavailable: API Key not configured.";
/// Returned when the service call fails for any reason
pub const FAILURE_REPLY: &str = "Error contacting AI service. Please try again later.";
/// Returned when the service answers with no text
pub const EMPTY_REPLY: &str = "No response generated.";

/// Single-shot text completion service; no conversation state is kept remotely
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(&self, model: &str, prompt: &str) -> AppResult<String>;

    /// Generator name for logging and debugging
    fn name(&self) -> &'static str;
}

#[derive(Clone)]
pub struct AiGate {
    generator: Option<Arc<dyn TextGenerator>>,
    model: String,
}

impl AiGate {
    pub fn new(generator: Arc<dyn TextGenerator>, model: impl Into<String>) -> Self {
        Self {
            generator: Some(generator),
            model: model.into(),
        }
    }

    /// A gate with no generator: every request returns [`UNAVAILABLE_REPLY`]
    pub fn unconfigured() -> Self {
        Self {
            generator: None,
            model: String::new(),
        }
    }

    pub fn is_configured(&self) -> bool {
        self.generator.is_some()
    }

    /// Generates text for `prompt`, collapsing every failure into a sentinel reply
    pub async fn request(&self, prompt: &str) -> String {
        let Some(generator) = &self.generator else {
            return UNAVAILABLE_REPLY.to_string();
        };

        match generator.generate(&self.model, prompt).await {
            Ok(text) if text.trim().is_empty() => EMPTY_REPLY.to_string(),
            Ok(text) => text,
            Err(e) => {
                tracing::error!(
                    error = %e,
                    generator = generator.name(),
                    model = %self.model,
                    "Text generation failed"
                );
                FAILURE_REPLY.to_string()
            }
        }
    }
}
