pub mod types;
pub mod schema;
pub mod prompt;
pub mod parser;
pub mod sections;
pub mod fallback;
pub mod validation;
pub mod anthropic;
pub mod orchestrator;

pub use types::*;
pub use schema::*;
pub use prompt::*;
pub use parser::*;
pub use sections::*;
pub use fallback::*;
pub use validation::*;
pub use anthropic::*;
pub use orchestrator::*;

use thiserror::Error;

/// Failures talking to the text-generation service. Malformed output is
/// not an error at this layer: it is recovered by the fallback path.
#[derive(Error, Debug)]
pub enum StructuringError {
    #[error("Text generation service is rate limited")]
    RateLimited { retry_after: Option<u64> },

    #[error("Text generation service returned error (status {status}): {body}")]
    UpstreamStatus { status: u16, body: String },

    #[error("HTTP client error: {0}")]
    HttpClient(String),

    #[error("Response parsing error: {0}")]
    ResponseParsing(String),
}
