pub mod aid;
pub mod ollama;
pub mod prompt;
pub mod reconcile;
pub mod services;

pub use aid::*;
pub use ollama::*;
pub use prompt::*;
pub use reconcile::*;
pub use services::*;

use thiserror::Error;

/// Failures talking to a query service.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ServiceError {
    #[error("Ollama is not running at {0}")]
    OllamaConnection(String),

    #[error("Ollama returned error (status {status}): {body}")]
    OllamaError { status: u16, body: String },

    #[error("HTTP client error: {0}")]
    HttpClient(String),

    #[error("Response parsing error: {0}")]
    ResponseParsing(String),

    #[error("Request rejected: {0}")]
    Rejected(String),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AidValidationError {
    #[error("Malformed aid response: {0}")]
    MalformedAidResponse(String),
}
