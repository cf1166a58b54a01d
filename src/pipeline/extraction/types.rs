use base64::Engine as _;
use serde::Serialize;
use serde_json::Value;

use super::ExtractionError;
use crate::models::ClinicalInputs;

/// Used when the upload is bare base64 with no data-URL header.
pub const DEFAULT_MIME_TYPE: &str = "image/jpeg";

/// Decoded images above this size are rejected before any upstream call.
pub const MAX_IMAGE_BYTES: usize = 10 * 1024 * 1024;

/// Base64 image ready to be sent inline to a vision service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImagePayload {
    pub mime_type: String,
    /// Base64 text with whitespace removed.
    pub data: String,
}

impl ImagePayload {
    /// Accepts `data:<mime>;base64,<data>` or bare base64.
    pub fn parse(input: &str) -> Result<Self, ExtractionError> {
        let input = input.trim();
        if input.is_empty() {
            return Err(ExtractionError::InvalidImage("Image data required".into()));
        }

        let (mime_type, data) = match input.strip_prefix("data:") {
            Some(rest) => {
                let (header, data) = rest.split_once(',').ok_or_else(|| {
                    ExtractionError::InvalidImage("Malformed data URL".into())
                })?;
                let mime = header.strip_suffix(";base64").ok_or_else(|| {
                    ExtractionError::InvalidImage("Data URL must be base64 encoded".into())
                })?;
                (mime.trim().to_ascii_lowercase(), data)
            }
            None => (DEFAULT_MIME_TYPE.to_string(), input),
        };

        if !mime_type.starts_with("image/") {
            return Err(ExtractionError::InvalidImage(format!(
                "Unsupported content type: {mime_type}"
            )));
        }

        let data: String = data.chars().filter(|c| !c.is_whitespace()).collect();
        if data.is_empty() {
            return Err(ExtractionError::InvalidImage("Image data required".into()));
        }
        let decoded = base64::engine::general_purpose::STANDARD
            .decode(&data)
            .map_err(|_| ExtractionError::InvalidImage("Image data is not valid base64".into()))?;
        if decoded.len() > MAX_IMAGE_BYTES {
            return Err(ExtractionError::InvalidImage(format!(
                "Image too large ({} bytes, limit {MAX_IMAGE_BYTES})",
                decoded.len()
            )));
        }

        Ok(Self { mime_type, data })
    }
}

/// Vision OCR client abstraction (allows mocking).
pub trait OcrClient {
    /// Send one image with an instruction, return the model's text.
    fn extract_text(&self, image: &ImagePayload, instruction: &str)
        -> Result<String, ExtractionError>;

    fn model(&self) -> &str;
}

/// Panel values read from an image.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OcrResult {
    /// Every field key, `null` when not read.
    pub values: ClinicalInputs,
    pub extracted_text: String,
    /// Whether the text contained a usable JSON object.
    #[serde(skip)]
    pub parsed: bool,
}

impl OcrResult {
    pub fn values_json(&self) -> Value {
        serde_json::to_value(self.values).unwrap_or(Value::Null)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // "hello" in base64
    const HELLO: &str = "aGVsbG8=";

    #[test]
    fn data_url_carries_mime_type() {
        let image = ImagePayload::parse(&format!("data:image/png;base64,{HELLO}")).unwrap();
        assert_eq!(image.mime_type, "image/png");
        assert_eq!(image.data, HELLO);
    }

    #[test]
    fn bare_base64_defaults_to_jpeg() {
        let image = ImagePayload::parse(&format!("  {HELLO}\n")).unwrap();
        assert_eq!(image.mime_type, DEFAULT_MIME_TYPE);
        assert_eq!(image.data, HELLO);
    }

    #[test]
    fn whitespace_inside_data_is_removed() {
        let image = ImagePayload::parse("aGVs\nbG8=").unwrap();
        assert_eq!(image.data, HELLO);
    }

    #[test]
    fn rejects_bad_input() {
        for input in [
            "",
            "   ",
            "data:image/png;base64,",
            "data:image/png,aGVsbG8=",
            "data:text/plain;base64,aGVsbG8=",
            "data:image/png;base64",
            "not base64 at all!",
        ] {
            assert!(
                matches!(ImagePayload::parse(input), Err(ExtractionError::InvalidImage(_))),
                "{input:?}"
            );
        }
    }

    #[test]
    fn ocr_result_serializes_all_keys() {
        let result = OcrResult {
            values: ClinicalInputs::default(),
            extracted_text: "nothing".into(),
            parsed: false,
        };
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["extractedText"], "nothing");
        assert!(json["values"]["ph"].is_null());
        assert!(json["values"]["hb"].is_null());
        assert!(json.get("parsed").is_none());
    }
}
