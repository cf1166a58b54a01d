use std::sync::Mutex;

use serde::{Deserialize, Serialize};

use super::types::{GenerateOptions, Generation, LlmClient};
use super::StructuringError;

pub const DEFAULT_BASE_URL: &str = "https://api.anthropic.com";
pub const DEFAULT_MODEL: &str = "claude-sonnet-4-5-20250929";
const API_VERSION: &str = "2023-06-01";

/// Anthropic Messages API client.
pub struct AnthropicClient {
    base_url: String,
    api_key: String,
    model: String,
    client: reqwest::blocking::Client,
    timeout_secs: u64,
}

impl AnthropicClient {
    pub fn new(
        base_url: &str,
        api_key: &str,
        model: &str,
        timeout_secs: u64,
    ) -> Result<Self, StructuringError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(std::time::Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| StructuringError::HttpClient(e.to_string()))?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            model: model.to_string(),
            client,
            timeout_secs,
        })
    }
}

/// Request body for /v1/messages
#[derive(Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    temperature: f32,
    system: Vec<SystemBlock<'a>>,
    messages: Vec<Message<'a>>,
}

/// System prompt block, marked cacheable: it is identical across requests.
#[derive(Serialize)]
struct SystemBlock<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    text: &'a str,
    cache_control: CacheControl,
}

#[derive(Serialize)]
struct CacheControl {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Serialize)]
struct Message<'a> {
    role: &'static str,
    content: &'a str,
}

/// Response body from /v1/messages
#[derive(Deserialize)]
struct MessagesResponse {
    content: Vec<ContentBlock>,
    #[serde(default)]
    model: Option<String>,
    #[serde(default)]
    stop_reason: Option<String>,
    #[serde(default)]
    usage: Option<serde_json::Value>,
}

impl MessagesResponse {
    /// Joined text blocks; `default_model` fills in when the body omits one.
    fn into_generation(self, default_model: &str) -> Generation {
        let text = self
            .content
            .iter()
            .filter(|block| block.kind == "text")
            .filter_map(|block| block.text.as_deref())
            .collect::<Vec<_>>()
            .join("");

        Generation {
            text,
            model: self.model.unwrap_or_else(|| default_model.to_string()),
            truncated: self.stop_reason.as_deref() == Some("max_tokens"),
            usage: self.usage,
        }
    }
}

#[derive(Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: Option<String>,
}

impl LlmClient for AnthropicClient {
    fn generate(
        &self,
        system: &str,
        prompt: &str,
        options: GenerateOptions,
    ) -> Result<Generation, StructuringError> {
        let url = format!("{}/v1/messages", self.base_url);
        let body = MessagesRequest {
            model: &self.model,
            max_tokens: options.max_tokens,
            temperature: options.temperature,
            system: vec![SystemBlock {
                kind: "text",
                text: system,
                cache_control: CacheControl { kind: "ephemeral" },
            }],
            messages: vec![Message {
                role: "user",
                content: prompt,
            }],
        };

        let response = self
            .client
            .post(&url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", API_VERSION)
            .json(&body)
            .send()
            .map_err(|e| {
                if e.is_timeout() {
                    StructuringError::HttpClient(format!(
                        "Request timed out after {}s",
                        self.timeout_secs
                    ))
                } else {
                    StructuringError::HttpClient(e.to_string())
                }
            })?;

        let status = response.status();
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(StructuringError::RateLimited {
                retry_after: retry_after_secs(response.headers()),
            });
        }
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(StructuringError::UpstreamStatus {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: MessagesResponse = response
            .json()
            .map_err(|e| StructuringError::ResponseParsing(e.to_string()))?;

        if let Some(usage) = &parsed.usage {
            tracing::info!(usage = %usage, "Text generation usage");
        }

        Ok(parsed.into_generation(&self.model))
    }

    fn model(&self) -> &str {
        &self.model
    }
}

/// `Retry-After` in seconds, when given as an integer.
pub fn retry_after_secs(headers: &reqwest::header::HeaderMap) -> Option<u64> {
    headers
        .get(reqwest::header::RETRY_AFTER)?
        .to_str()
        .ok()?
        .trim()
        .parse()
        .ok()
}

// ═══════════════════════════════════════════════════════════
// Mock
// ═══════════════════════════════════════════════════════════

#[derive(Debug, Clone, Copy)]
enum MockFailure {
    RateLimited(Option<u64>),
    Status(u16),
}

/// Mock LLM client for testing — returns a configurable response and
/// records every prompt it receives.
pub struct MockLlmClient {
    response: Result<String, MockFailure>,
    truncated: bool,
    usage: Option<serde_json::Value>,
    prompts: Mutex<Vec<String>>,
}

impl MockLlmClient {
    pub fn new(response: &str) -> Self {
        Self {
            response: Ok(response.to_string()),
            truncated: false,
            usage: None,
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn rate_limited(retry_after: Option<u64>) -> Self {
        Self {
            response: Err(MockFailure::RateLimited(retry_after)),
            truncated: false,
            usage: None,
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn failing(status: u16) -> Self {
        Self {
            response: Err(MockFailure::Status(status)),
            truncated: false,
            usage: None,
            prompts: Mutex::new(Vec::new()),
        }
    }

    /// Report the response as cut off at the token limit.
    pub fn truncated(mut self) -> Self {
        self.truncated = true;
        self
    }

    /// Attach a token-usage object to every successful generation.
    pub fn with_usage(mut self, usage: serde_json::Value) -> Self {
        self.usage = Some(usage);
        self
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().map(|p| p.clone()).unwrap_or_default()
    }
}

impl LlmClient for MockLlmClient {
    fn generate(
        &self,
        _system: &str,
        prompt: &str,
        _options: GenerateOptions,
    ) -> Result<Generation, StructuringError> {
        if let Ok(mut prompts) = self.prompts.lock() {
            prompts.push(prompt.to_string());
        }
        match &self.response {
            Ok(text) => Ok(Generation {
                text: text.clone(),
                model: "mock".into(),
                truncated: self.truncated,
                usage: self.usage.clone(),
            }),
            Err(MockFailure::RateLimited(retry_after)) => Err(StructuringError::RateLimited {
                retry_after: *retry_after,
            }),
            Err(MockFailure::Status(status)) => Err(StructuringError::UpstreamStatus {
                status: *status,
                body: "mock failure".into(),
            }),
        }
    }

    fn model(&self) -> &str {
        "mock"
    }
}
