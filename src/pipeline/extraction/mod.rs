pub mod types;
pub mod gemini;
pub mod ocr;

pub use types::*;
pub use gemini::*;
pub use ocr::*;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ExtractionError {
    #[error("Invalid image: {0}")]
    InvalidImage(String),

    #[error("OCR service is rate limited")]
    RateLimited { retry_after: Option<u64> },

    #[error("OCR service returned error (status {status}): {body}")]
    UpstreamStatus { status: u16, body: String },

    #[error("HTTP client error: {0}")]
    HttpClient(String),

    #[error("Response parsing error: {0}")]
    ResponseParsing(String),
}
