//! Shared types for the API layer.

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use crate::api::error::ApiError;
use crate::config::ServiceConfig;
use crate::jobs::JobStore;
use crate::pipeline::clinical::ReferenceRanges;
use crate::pipeline::extraction::{GeminiClient, OcrClient};
use crate::pipeline::structuring::{AnalysisOrchestrator, AnthropicClient, LlmClient};

pub type SharedLlm = Arc<dyn LlmClient + Send + Sync>;
pub type SharedOcr = Arc<dyn OcrClient + Send + Sync>;

// ═══════════════════════════════════════════════════════════
// API context — shared state for the router
// ═══════════════════════════════════════════════════════════

/// Shared context for all API routes and middleware.
///
/// Upstream clients are optional: a missing credential is reported per
/// request as NOT_CONFIGURED rather than failing startup.
#[derive(Clone)]
pub struct ApiContext {
    pub llm: Option<SharedLlm>,
    pub ocr: Option<SharedOcr>,
    pub ranges: Arc<ReferenceRanges>,
    pub jobs: Arc<Mutex<JobStore>>,
}

impl ApiContext {
    pub fn new(
        llm: Option<SharedLlm>,
        ocr: Option<SharedOcr>,
        ranges: ReferenceRanges,
        jobs: JobStore,
    ) -> Self {
        Self {
            llm,
            ocr,
            ranges: Arc::new(ranges),
            jobs: Arc::new(Mutex::new(jobs)),
        }
    }

    /// Build production clients from configuration.
    pub fn from_config(config: &ServiceConfig, ranges: ReferenceRanges) -> Result<Self, ApiError> {
        let llm: Option<SharedLlm> = match &config.anthropic_api_key {
            Some(key) => Some(Arc::new(
                AnthropicClient::new(
                    &config.anthropic_base_url,
                    key,
                    &config.anthropic_model,
                    config.upstream_timeout_secs,
                )
                .map_err(|e| ApiError::Internal(e.to_string()))?,
            )),
            None => {
                tracing::warn!("ANTHROPIC_API_KEY not set, analysis endpoints disabled");
                None
            }
        };
        let ocr: Option<SharedOcr> = match &config.gemini_api_key {
            Some(key) => Some(Arc::new(
                GeminiClient::new(
                    &config.gemini_base_url,
                    key,
                    &config.gemini_model,
                    config.upstream_timeout_secs,
                )
                .map_err(|e| ApiError::Internal(e.to_string()))?,
            )),
            None => {
                tracing::warn!("GEMINI_API_KEY not set, OCR endpoint disabled");
                None
            }
        };

        let jobs = JobStore::new(config.job_capacity, Duration::from_secs(config.job_ttl_secs))
            .with_eviction_callback(|id, reason| {
                tracing::info!(job_id = %id, reason = ?reason, "Background job evicted");
            });

        Ok(Self::new(llm, ocr, ranges, jobs))
    }

    pub fn orchestrator(&self) -> Result<AnalysisOrchestrator, ApiError> {
        let llm = self
            .llm
            .clone()
            .ok_or(ApiError::NotConfigured("Text generation"))?;
        Ok(AnalysisOrchestrator::new(llm, self.ranges.clone()))
    }

    pub fn ocr_client(&self) -> Result<SharedOcr, ApiError> {
        self.ocr.clone().ok_or(ApiError::NotConfigured("OCR"))
    }

    pub fn lock_jobs(&self) -> Result<MutexGuard<'_, JobStore>, ApiError> {
        self.jobs
            .lock()
            .map_err(|_| ApiError::Internal("job store lock poisoned".into()))
    }
}
