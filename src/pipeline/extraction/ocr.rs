//! Blood-gas printout → panel values.
//!
//! The vision service is asked for a single JSON object keyed by field.
//! Its text goes through the same extractor as analysis responses, then
//! lenient input construction: anything unreadable is simply absent.

use std::sync::LazyLock;

use super::types::{ImagePayload, OcrClient, OcrResult};
use super::ExtractionError;
use crate::models::{ClinicalInputs, Field};
use crate::pipeline::structuring::extract_json;

static OCR_INSTRUCTION: LazyLock<String> = LazyLock::new(build_instruction);

fn build_instruction() -> String {
    let keys: Vec<String> = Field::ALL
        .iter()
        .map(|f| match f.unit() {
            "" => format!("  \"{}\": number or null ({})", f.key(), f.label()),
            unit => format!("  \"{}\": number or null ({}, {unit})", f.key(), f.label()),
        })
        .collect();

    format!(
        "Read the blood gas analyser printout in this image and extract the values.\n\n\
         Respond with a single JSON object and nothing else:\n{{\n{}\n}}\n\n\
         RULES:\n\
         1. Use null for any value that is not visible. Never guess.\n\
         2. Partial pressures must be in kPa: divide mmHg values by 7.5.\n\
         3. Glucose must be in mmol/L: divide mg/dL values by 18.\n\
         4. Haemoglobin must be in g/L: multiply g/dL values by 10.\n\
         5. Calcium is the ionised value.",
        keys.join(",\n")
    )
}

/// The instruction sent with every image.
pub fn ocr_instruction() -> &'static str {
    &OCR_INSTRUCTION
}

/// Read panel values from an image. Upstream failures are returned;
/// unparseable text yields an all-absent panel.
pub fn read_panel_image(
    client: &dyn OcrClient,
    image: &ImagePayload,
) -> Result<OcrResult, ExtractionError> {
    let start = std::time::Instant::now();
    let text = client.extract_text(image, ocr_instruction())?;
    tracing::info!(
        model = %client.model(),
        mime_type = %image.mime_type,
        elapsed_ms = %start.elapsed().as_millis(),
        text_len = text.len(),
        "OCR complete"
    );

    Ok(values_from_text(text))
}

/// Lenient read of OCR text into panel values.
pub fn values_from_text(text: String) -> OcrResult {
    match extract_json(&text) {
        Ok(json) => {
            let values = ClinicalInputs::from_json_lenient(&json);
            tracing::debug!(fields = values.present().count(), "OCR values read");
            OcrResult {
                values,
                extracted_text: text,
                parsed: true,
            }
        }
        Err(e) => {
            tracing::warn!(error = %e, "OCR text contained no usable JSON");
            OcrResult {
                values: ClinicalInputs::default(),
                extracted_text: text,
                parsed: false,
            }
        }
    }
}
