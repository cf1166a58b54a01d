//! Analysis endpoints: synchronous, background submission, and polling.

use axum::extract::rejection::JsonRejection;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::Instrument;
use uuid::Uuid;

use crate::api::error::ApiError;
use crate::api::types::ApiContext;
use crate::jobs::{JobOutcome, JobStatus};
use crate::models::{AnalysisMode, BloodGasPanel, InputError};
use crate::pipeline::structuring::{AnalysisOrchestrator, Interpretation};

#[derive(Serialize)]
pub struct AnalysisResponse {
    pub success: bool,
    #[serde(flatten)]
    pub interpretation: Interpretation,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmittedResponse {
    pub job_id: String,
}

#[derive(Deserialize)]
pub struct PollQuery {
    #[serde(rename = "jobId")]
    pub job_id: Option<String>,
}

/// Mode from the top-level body, then the panel object; comprehensive by default.
fn parse_mode(body: &Value) -> Result<AnalysisMode, InputError> {
    let raw = body
        .get("mode")
        .or_else(|| body.get("bloodGasData").and_then(|d| d.get("mode")))
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|m| !m.is_empty());
    match raw {
        Some(mode) => mode.to_ascii_lowercase().parse(),
        None => Ok(AnalysisMode::default()),
    }
}

fn parse_request(
    body: Result<Json<Value>, JsonRejection>,
) -> Result<(BloodGasPanel, AnalysisMode), ApiError> {
    let Json(body) = body.map_err(|e| ApiError::InvalidInput(e.body_text()))?;
    let mode = parse_mode(&body)?;
    let panel = BloodGasPanel::from_request(&body)?;
    Ok((panel, mode))
}

async fn run_analysis(
    orchestrator: AnalysisOrchestrator,
    panel: BloodGasPanel,
    mode: AnalysisMode,
) -> Result<AnalysisResponse, ApiError> {
    let interpretation = tokio::task::spawn_blocking(move || orchestrator.analyze(&panel, mode))
        .await
        .map_err(|e| ApiError::Internal(format!("analysis task failed: {e}")))??;
    Ok(AnalysisResponse {
        success: true,
        interpretation,
    })
}

/// `POST /api/analyze`
pub async fn analyze(
    State(ctx): State<ApiContext>,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<Json<AnalysisResponse>, ApiError> {
    let (panel, mode) = parse_request(body)?;
    let orchestrator = ctx.orchestrator()?;

    let span = tracing::info_span!("analysis", mode = %mode);
    let response = run_analysis(orchestrator, panel, mode)
        .instrument(span)
        .await?;
    Ok(Json(response))
}

/// `POST /api/analyze/background` — validates, registers a pending job,
/// and returns its id before any upstream work starts.
pub async fn submit(
    State(ctx): State<ApiContext>,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<(StatusCode, Json<SubmittedResponse>), ApiError> {
    let (panel, mode) = parse_request(body)?;
    let orchestrator = ctx.orchestrator()?;
    let job_id = ctx.lock_jobs()?.submit()?;

    let span = tracing::info_span!("analysis", mode = %mode, job_id = %job_id);
    let jobs = ctx.jobs.clone();
    tokio::spawn(
        async move {
            let outcome = match run_analysis(orchestrator, panel, mode).await {
                Ok(response) => match serde_json::to_value(&response) {
                    Ok(value) => JobOutcome::Succeeded(value),
                    Err(e) => JobOutcome::Failed(ApiError::Internal(e.to_string()).to_failure()),
                },
                Err(err) => {
                    tracing::warn!(error = %err, "Background analysis failed");
                    JobOutcome::Failed(err.to_failure())
                }
            };
            match jobs.lock() {
                Ok(mut store) => {
                    store.complete(job_id, outcome);
                }
                Err(_) => tracing::error!("Job store lock poisoned, result dropped"),
            }
        }
        .instrument(span),
    );

    tracing::info!(job_id = %job_id, mode = %mode, "Background analysis submitted");
    Ok((
        StatusCode::ACCEPTED,
        Json(SubmittedResponse {
            job_id: job_id.to_string(),
        }),
    ))
}

/// `GET /api/analysis?jobId=…`
pub async fn poll(
    State(ctx): State<ApiContext>,
    Query(query): Query<PollQuery>,
) -> Result<Json<JobStatus>, ApiError> {
    let raw = query
        .job_id
        .as_deref()
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .ok_or_else(|| ApiError::InvalidInput("jobId is required".into()))?;

    let unknown = || ApiError::NotFound(format!("No analysis job {raw}"));
    let id = Uuid::parse_str(raw).map_err(|_| unknown())?;
    let status = ctx.lock_jobs()?.status(id).ok_or_else(unknown)?;
    Ok(Json(status))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn mode_defaults_to_comprehensive() {
        assert_eq!(parse_mode(&json!({})).unwrap(), AnalysisMode::Comprehensive);
        assert_eq!(parse_mode(&json!({"mode": ""})).unwrap(), AnalysisMode::Comprehensive);
    }

    #[test]
    fn mode_read_from_body_or_panel() {
        assert_eq!(parse_mode(&json!({"mode": "Brief"})).unwrap(), AnalysisMode::Brief);
        assert_eq!(
            parse_mode(&json!({"bloodGasData": {"mode": "brief"}})).unwrap(),
            AnalysisMode::Brief
        );
        assert!(parse_mode(&json!({"mode": "verbose"})).is_err());
    }
}
