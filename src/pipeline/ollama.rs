use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::prompt::PromptContext;
use super::reconcile::hospital_names;
use super::services::{GroundedSearchService, NarrativeQueryService, StructuredQueryService};
use super::ServiceError;
use crate::models::{Coordinate, GroundedResponse, SearchHit};

const MAPS_SEARCH_URL: &str = "https://www.google.com/maps/search/";

/// Ollama HTTP client for local LLM inference.
///
/// Uses the blocking reqwest client: call it from a plain thread or
/// `spawn_blocking`, never directly inside an async task.
pub struct OllamaClient {
    base_url: String,
    model: String,
    client: reqwest::blocking::Client,
    timeout_secs: u64,
}

impl OllamaClient {
    /// Create a new OllamaClient pointing at an Ollama instance.
    pub fn new(base_url: &str, model: &str, timeout_secs: u64) -> Result<Self, ServiceError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(std::time::Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| ServiceError::HttpClient(e.to_string()))?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
            client,
            timeout_secs,
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn generate(&self, context: &PromptContext, format: Option<&Value>) -> Result<String, ServiceError> {
        let url = format!("{}/api/generate", self.base_url);
        let body = OllamaGenerateRequest {
            model: &self.model,
            prompt: &context.prompt,
            system: &context.system,
            stream: false,
            format,
        };

        tracing::debug!(model = %self.model, structured = format.is_some(), "Ollama generate");

        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .map_err(|e| {
                if e.is_connect() {
                    ServiceError::OllamaConnection(self.base_url.clone())
                } else if e.is_timeout() {
                    ServiceError::HttpClient(format!(
                        "Request timed out after {}s",
                        self.timeout_secs
                    ))
                } else {
                    ServiceError::HttpClient(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(ServiceError::OllamaError {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: OllamaGenerateResponse = response
            .json()
            .map_err(|e| ServiceError::ResponseParsing(e.to_string()))?;

        Ok(parsed.response)
    }
}

/// Request body for Ollama /api/generate
#[derive(Serialize)]
struct OllamaGenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    system: &'a str,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    format: Option<&'a Value>,
}

/// Response body from Ollama /api/generate
#[derive(Deserialize)]
struct OllamaGenerateResponse {
    response: String,
}

/// Map search link for a named place near `location`.
pub fn maps_search_uri(name: &str, location: Coordinate) -> Result<String, ServiceError> {
    let query = format!("{name} near {}", location.as_query());
    reqwest::Url::parse_with_params(MAPS_SEARCH_URL, &[("api", "1"), ("query", query.as_str())])
        .map(|url| url.to_string())
        .map_err(|e| ServiceError::ResponseParsing(e.to_string()))
}

/// Hits for every hospital the narrative names, in narrative order.
pub fn hits_from_narrative(
    narrative: &str,
    location: Coordinate,
) -> Result<Vec<SearchHit>, ServiceError> {
    hospital_names(narrative)
        .into_iter()
        .map(|name| {
            let uri = maps_search_uri(&name, location)?;
            Ok(SearchHit::new(name, uri))
        })
        .collect()
}

impl NarrativeQueryService for OllamaClient {
    fn ask(&self, context: &PromptContext) -> Result<String, ServiceError> {
        self.generate(context, None)
    }
}

impl GroundedSearchService for OllamaClient {
    /// A local model has no search grounding of its own, so hits are the
    /// hospitals its narrative names, each linked to a map search.
    fn search(
        &self,
        context: &PromptContext,
        location: Coordinate,
    ) -> Result<GroundedResponse, ServiceError> {
        let narrative = self.generate(context, None)?;
        let hits = hits_from_narrative(&narrative, location)?;
        Ok(GroundedResponse { narrative, hits })
    }
}

impl StructuredQueryService for OllamaClient {
    /// Text that is not JSON is passed through as a string for the caller
    /// to reject.
    fn ask_structured(&self, context: &PromptContext, schema: &Value) -> Result<Value, ServiceError> {
        let raw = self.generate(context, Some(schema))?;
        Ok(serde_json::from_str(&raw).unwrap_or(Value::String(raw)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ollama_client_constructor() {
        let client = OllamaClient::new("http://localhost:11434", "medgemma:latest", 120).unwrap();
        assert_eq!(client.base_url, "http://localhost:11434");
        assert_eq!(client.timeout_secs, 120);
        assert_eq!(client.model(), "medgemma:latest");
    }

    #[test]
    fn ollama_client_trims_trailing_slash() {
        let client = OllamaClient::new("http://localhost:11434/", "m", 60).unwrap();
        assert_eq!(client.base_url, "http://localhost:11434");
    }

    #[test]
    fn request_omits_absent_format() {
        let body = OllamaGenerateRequest {
            model: "m",
            prompt: "p",
            system: "s",
            stream: false,
            format: None,
        };
        let json = serde_json::to_value(&body).unwrap();
        assert!(json.get("format").is_none());
        assert_eq!(json["stream"], Value::Bool(false));
    }

    #[test]
    fn maps_uri_is_encoded() {
        let here = Coordinate::new(12.5, 77.25).unwrap();
        let uri = maps_search_uri("St. Mary's & Co", here).unwrap();
        assert!(uri.starts_with("https://www.google.com/maps/search/?api=1&query="));
        assert!(uri.contains("St.+Mary%27s+%26+Co"));
        assert!(!uri.contains(' '));
    }

    #[test]
    fn hits_follow_narrative_headers() {
        let here = Coordinate::new(0.0, 0.0).unwrap();
        let narrative = "HOSPITAL: Alpha\nCONTACT: 1\n---\nHOSPITAL: Beta\n---\nHOSPITAL: Alpha\n---";
        let hits = hits_from_narrative(narrative, here).unwrap();
        let names: Vec<&str> = hits.iter().map(|h| h.display_name.as_str()).collect();
        assert_eq!(names, vec!["Alpha", "Beta"]);
        assert!(hits[0].resource_uri.contains("Alpha"));
    }
}
