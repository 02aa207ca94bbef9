pub mod orchestrator;
pub mod steps;
pub mod tickets;

pub use orchestrator::*;
pub use steps::*;
pub use tickets::*;

use thiserror::Error;

use crate::db::DatabaseError;
use crate::monitoring::MonitoringError;
use crate::pipeline::{AidValidationError, ServiceError};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WorkflowError {
    #[error("Invalid transition from {from} on {action}")]
    InvalidTransition { from: String, action: String },

    #[error("Not available on the {actual} screen (expected {expected})")]
    WrongStep { expected: String, actual: String },
}

/// Everything an orchestrator operation can report. None of these escape as
/// panics; each is also kept as the session's inline message.
#[derive(Error, Debug)]
pub enum CompanionError {
    #[error("{0}")]
    InputValidation(String),

    #[error("Upstream query failed: {0}")]
    UpstreamQueryFailure(#[from] ServiceError),

    #[error("Location unavailable: {0}")]
    LocationUnavailable(String),

    #[error("Malformed aid response: {0}")]
    MalformedAidResponse(String),

    #[error("Workflow error: {0}")]
    Workflow(#[from] WorkflowError),

    #[error("Monitoring error: {0}")]
    Monitoring(MonitoringError),

    #[error("Storage error: {0}")]
    Store(#[from] DatabaseError),

    #[error("Startup error: {0}")]
    Startup(String),
}

impl From<MonitoringError> for CompanionError {
    fn from(err: MonitoringError) -> Self {
        match err {
            MonitoringError::LocationUnavailable(reason) => Self::LocationUnavailable(reason),
            other => Self::Monitoring(other),
        }
    }
}

impl From<AidValidationError> for CompanionError {
    fn from(err: AidValidationError) -> Self {
        match err {
            AidValidationError::MalformedAidResponse(reason) => Self::MalformedAidResponse(reason),
        }
    }
}

impl CompanionError {
    /// Text shown inline on the affected screen.
    pub fn user_message(&self) -> String {
        match self {
            Self::UpstreamQueryFailure(_) => {
                "The assistant could not be reached. Please try again.".to_string()
            }
            Self::MalformedAidResponse(_) => {
                "The assistant returned an unreadable list of schemes. Please try again."
                    .to_string()
            }
            Self::LocationUnavailable(_) => {
                "Your location is unavailable. Check location permissions and try again."
                    .to_string()
            }
            other => other.to_string(),
        }
    }

    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::UpstreamQueryFailure(_) | Self::MalformedAidResponse(_) | Self::LocationUnavailable(_)
        )
    }
}
