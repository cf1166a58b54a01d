use std::sync::Mutex;

use serde::{Deserialize, Serialize};

use super::types::{ImagePayload, OcrClient};
use super::ExtractionError;
use crate::pipeline::structuring::retry_after_secs;

pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";
pub const DEFAULT_MODEL: &str = "gemini-2.5-flash";
const MAX_OUTPUT_TOKENS: u32 = 1000;

/// Gemini `generateContent` client for reading lab printouts.
pub struct GeminiClient {
    base_url: String,
    api_key: String,
    model: String,
    client: reqwest::blocking::Client,
    timeout_secs: u64,
}

impl GeminiClient {
    pub fn new(
        base_url: &str,
        api_key: &str,
        model: &str,
        timeout_secs: u64,
    ) -> Result<Self, ExtractionError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(std::time::Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| ExtractionError::HttpClient(e.to_string()))?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            model: model.to_string(),
            client,
            timeout_secs,
        })
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/v1beta/models/{}:generateContent",
            self.base_url, self.model
        )
    }
}

/// Request body for generateContent
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest<'a> {
    contents: Vec<Content<'a>>,
    generation_config: GenerationConfig,
}

#[derive(Serialize)]
struct Content<'a> {
    parts: Vec<Part<'a>>,
}

#[derive(Serialize)]
#[serde(untagged)]
enum Part<'a> {
    Text { text: &'a str },
    Image { inline_data: InlineData<'a> },
}

#[derive(Serialize)]
struct InlineData<'a> {
    mime_type: &'a str,
    data: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f32,
    max_output_tokens: u32,
    top_k: u32,
    top_p: f32,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            temperature: 0.1,
            max_output_tokens: MAX_OUTPUT_TOKENS,
            top_k: 1,
            top_p: 0.1,
        }
    }
}

/// Response body from generateContent
#[derive(Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    #[serde(default)]
    content: Option<CandidateContent>,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Deserialize)]
struct ResponsePart {
    #[serde(default)]
    text: Option<String>,
}

impl GenerateContentResponse {
    /// Text of the first candidate, parts concatenated.
    fn text(&self) -> Option<String> {
        let parts = &self.candidates.first()?.content.as_ref()?.parts;
        let text: String = parts.iter().filter_map(|p| p.text.as_deref()).collect();
        (!text.is_empty()).then_some(text)
    }
}

impl OcrClient for GeminiClient {
    fn extract_text(
        &self,
        image: &ImagePayload,
        instruction: &str,
    ) -> Result<String, ExtractionError> {
        let body = GenerateContentRequest {
            contents: vec![Content {
                parts: vec![
                    Part::Text { text: instruction },
                    Part::Image {
                        inline_data: InlineData {
                            mime_type: &image.mime_type,
                            data: &image.data,
                        },
                    },
                ],
            }],
            generation_config: GenerationConfig::default(),
        };

        let response = self
            .client
            .post(self.endpoint())
            .query(&[("key", self.api_key.as_str())])
            .json(&body)
            .send()
            .map_err(|e| {
                if e.is_timeout() {
                    ExtractionError::HttpClient(format!(
                        "Request timed out after {}s",
                        self.timeout_secs
                    ))
                } else {
                    // Without the URL: it carries the key.
                    ExtractionError::HttpClient(e.without_url().to_string())
                }
            })?;

        let status = response.status();
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(ExtractionError::RateLimited {
                retry_after: retry_after_secs(response.headers()),
            });
        }
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(ExtractionError::UpstreamStatus {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: GenerateContentResponse = response
            .json()
            .map_err(|e| ExtractionError::ResponseParsing(e.without_url().to_string()))?;

        parsed
            .text()
            .ok_or_else(|| ExtractionError::ResponseParsing("No text in OCR response".into()))
    }

    fn model(&self) -> &str {
        &self.model
    }
}

// ═══════════════════════════════════════════════════════════
// Mock
// ═══════════════════════════════════════════════════════════

/// Mock OCR client for testing — returns configurable text and records
/// the mime type of every image it receives.
pub struct MockOcrClient {
    response: Result<String, u16>,
    seen: Mutex<Vec<String>>,
}

impl MockOcrClient {
    pub fn new(text: &str) -> Self {
        Self {
            response: Ok(text.to_string()),
            seen: Mutex::new(Vec::new()),
        }
    }

    /// Fails every call with the given upstream status (429 → rate limited).
    pub fn failing(status: u16) -> Self {
        Self {
            response: Err(status),
            seen: Mutex::new(Vec::new()),
        }
    }

    pub fn seen_mime_types(&self) -> Vec<String> {
        self.seen.lock().map(|s| s.clone()).unwrap_or_default()
    }
}

impl OcrClient for MockOcrClient {
    fn extract_text(
        &self,
        image: &ImagePayload,
        _instruction: &str,
    ) -> Result<String, ExtractionError> {
        if let Ok(mut seen) = self.seen.lock() {
            seen.push(image.mime_type.clone());
        }
        match &self.response {
            Ok(text) => Ok(text.clone()),
            Err(429) => Err(ExtractionError::RateLimited { retry_after: None }),
            Err(status) => Err(ExtractionError::UpstreamStatus {
                status: *status,
                body: "mock failure".into(),
            }),
        }
    }

    fn model(&self) -> &str {
        "mock-ocr"
    }
}
