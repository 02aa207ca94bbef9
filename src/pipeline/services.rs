use std::sync::Mutex;

use serde_json::Value;

use super::prompt::PromptContext;
use super::ServiceError;
use crate::models::{Coordinate, GroundedResponse};

/// Free-text completion (symptom analysis, chat).
pub trait NarrativeQueryService: Send + Sync {
    fn ask(&self, context: &PromptContext) -> Result<String, ServiceError>;
}

/// Search-augmented completion returning narrative plus grounding hits.
pub trait GroundedSearchService: Send + Sync {
    fn search(
        &self,
        context: &PromptContext,
        location: Coordinate,
    ) -> Result<GroundedResponse, ServiceError>;
}

/// Completion constrained to a JSON schema. The result is untrusted.
pub trait StructuredQueryService: Send + Sync {
    fn ask_structured(&self, context: &PromptContext, schema: &Value)
        -> Result<Value, ServiceError>;
}

/// Mock query service for testing. Returns configurable responses and
/// records every prompt it was given.
pub struct MockQueryService {
    narrative: Result<String, ServiceError>,
    grounded: Result<GroundedResponse, ServiceError>,
    structured: Result<Value, ServiceError>,
    prompts: Mutex<Vec<PromptContext>>,
}

impl Default for MockQueryService {
    fn default() -> Self {
        Self {
            narrative: Ok(String::new()),
            grounded: Ok(GroundedResponse::default()),
            structured: Ok(Value::Array(Vec::new())),
            prompts: Mutex::new(Vec::new()),
        }
    }
}

impl MockQueryService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_narrative(mut self, response: &str) -> Self {
        self.narrative = Ok(response.to_string());
        self
    }

    pub fn with_grounded(mut self, response: GroundedResponse) -> Self {
        self.grounded = Ok(response);
        self
    }

    pub fn with_structured(mut self, response: Value) -> Self {
        self.structured = Ok(response);
        self
    }

    /// Every call fails with `error`.
    pub fn failing(error: ServiceError) -> Self {
        Self {
            narrative: Err(error.clone()),
            grounded: Err(error.clone()),
            structured: Err(error),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn prompts(&self) -> Vec<PromptContext> {
        self.prompts.lock().map(|p| p.clone()).unwrap_or_default()
    }

    fn record(&self, context: &PromptContext) {
        if let Ok(mut prompts) = self.prompts.lock() {
            prompts.push(context.clone());
        }
    }
}

impl NarrativeQueryService for MockQueryService {
    fn ask(&self, context: &PromptContext) -> Result<String, ServiceError> {
        self.record(context);
        self.narrative.clone()
    }
}

impl GroundedSearchService for MockQueryService {
    fn search(
        &self,
        context: &PromptContext,
        _location: Coordinate,
    ) -> Result<GroundedResponse, ServiceError> {
        self.record(context);
        self.grounded.clone()
    }
}

impl StructuredQueryService for MockQueryService {
    fn ask_structured(&self, context: &PromptContext, _schema: &Value) -> Result<Value, ServiceError> {
        self.record(context);
        self.structured.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SearchHit;

    fn ctx() -> PromptContext {
        PromptContext {
            system: "s".into(),
            prompt: "p".into(),
        }
    }

    #[test]
    fn mock_returns_configured_responses() {
        let grounded = GroundedResponse {
            narrative: "n".into(),
            hits: vec![SearchHit::new("A", "u")],
        };
        let mock = MockQueryService::new()
            .with_narrative("analysis")
            .with_grounded(grounded.clone())
            .with_structured(serde_json::json!([1]));
        let here = Coordinate::new(0.0, 0.0).unwrap();

        assert_eq!(mock.ask(&ctx()).unwrap(), "analysis");
        assert_eq!(mock.search(&ctx(), here).unwrap(), grounded);
        assert_eq!(mock.ask_structured(&ctx(), &Value::Null).unwrap(), serde_json::json!([1]));
        assert_eq!(mock.prompts().len(), 3);
    }

    #[test]
    fn failing_mock_fails_everything() {
        let mock = MockQueryService::failing(ServiceError::Rejected("quota".into()));
        let here = Coordinate::new(0.0, 0.0).unwrap();
        assert!(mock.ask(&ctx()).is_err());
        assert!(mock.search(&ctx(), here).is_err());
        assert!(mock.ask_structured(&ctx(), &Value::Null).is_err());
    }
}
