//! Lab printout OCR endpoint.

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::api::error::ApiError;
use crate::api::types::ApiContext;
use crate::pipeline::extraction::{read_panel_image, ImagePayload};

#[derive(Deserialize)]
pub struct OcrRequest {
    #[serde(default)]
    pub image: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OcrResponse {
    pub success: bool,
    pub values: Value,
    pub extracted_text: String,
}

/// `POST /api/ocr` — `{image}` as a data URL or bare base64.
pub async fn extract(
    State(ctx): State<ApiContext>,
    body: Result<Json<OcrRequest>, JsonRejection>,
) -> Result<Json<OcrResponse>, ApiError> {
    let Json(request) = body.map_err(|e| ApiError::InvalidInput(e.body_text()))?;
    let image = ImagePayload::parse(request.image.as_deref().unwrap_or_default())?;
    let client = ctx.ocr_client()?;

    let result = tokio::task::spawn_blocking(move || read_panel_image(client.as_ref(), &image))
        .await
        .map_err(|e| ApiError::Internal(format!("OCR task failed: {e}")))??;

    Ok(Json(OcrResponse {
        success: true,
        values: result.values_json(),
        extracted_text: result.extracted_text,
    }))
}
