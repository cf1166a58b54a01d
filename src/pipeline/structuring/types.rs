use serde::Serialize;

use super::StructuringError;

/// Per-call generation settings.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GenerateOptions {
    pub max_tokens: u32,
    pub temperature: f32,
}

impl Default for GenerateOptions {
    fn default() -> Self {
        Self {
            max_tokens: 1500,
            temperature: 0.0,
        }
    }
}

/// Raw text plus what the service reported about it.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Generation {
    pub text: String,
    pub model: String,
    /// Set when the service stopped at the token limit.
    pub truncated: bool,
    /// Token accounting as reported by the service, passed through untouched.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub usage: Option<serde_json::Value>,
}

/// Text-generation client abstraction (allows mocking).
pub trait LlmClient {
    fn generate(
        &self,
        system: &str,
        prompt: &str,
        options: GenerateOptions,
    ) -> Result<Generation, StructuringError>;

    fn model(&self) -> &str;
}
