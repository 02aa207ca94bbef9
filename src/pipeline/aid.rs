// Validation for financial-aid scheme lists returned by a structured query.
// The payload is untrusted: it must be a list (optionally wrapped in an
// object under a known key) or the whole response is rejected. Individual
// records missing any required field are dropped with a warning.

use serde_json::{Map, Value};

use super::AidValidationError;
use crate::models::AidRecord;

/// Maximum plausible schemes from a single query.
const MAX_AID_RECORDS: usize = 25;

/// Wrapper keys a model may nest the list under.
const LIST_KEYS: &[&str] = &["schemes", "records", "results", "items", "data"];

const SCHEME_NAME_KEYS: &[&str] = &["schemeName", "scheme_name", "name"];
const DESCRIPTION_KEYS: &[&str] = &["description"];
const ACCESS_KEYS: &[&str] = &[
    "howToAccess",
    "accessInstructions",
    "how_to_access",
    "access_instructions",
];
const WEBSITE_KEYS: &[&str] = &["websiteLink", "websiteUrl", "website_link", "website_url"];

/// Accepted records plus one warning per dropped or capped record.
#[derive(Debug, Clone, Default)]
pub struct AidValidation {
    pub records: Vec<AidRecord>,
    pub warnings: Vec<String>,
}

/// JSON schema sent with the structured query.
pub fn aid_response_schema() -> Value {
    serde_json::json!({
        "type": "array",
        "items": {
            "type": "object",
            "properties": {
                "schemeName": { "type": "string" },
                "description": { "type": "string" },
                "howToAccess": { "type": "string" },
                "websiteLink": { "type": "string" }
            },
            "required": ["schemeName", "description", "howToAccess", "websiteLink"]
        }
    })
}

/// Validate a payload already decoded as JSON.
///
/// A JSON string payload is treated as raw model text and parsed first.
pub fn validate_aid_payload(payload: &Value) -> Result<AidValidation, AidValidationError> {
    if let Value::String(raw) = payload {
        return parse_aid_response(raw);
    }

    let items = list_items(payload).ok_or_else(|| {
        AidValidationError::MalformedAidResponse(format!(
            "expected a list of schemes, got {}",
            kind_of(payload)
        ))
    })?;

    let mut validation = AidValidation::default();
    for (index, item) in items.iter().enumerate() {
        match validate_record(item) {
            Ok(record) => validation.records.push(record),
            Err(reason) => validation
                .warnings
                .push(format!("Aid record {index} dropped: {reason}")),
        }
    }

    if validation.records.len() > MAX_AID_RECORDS {
        validation.warnings.push(format!(
            "Excessive aid records ({}) capped to {MAX_AID_RECORDS}",
            validation.records.len()
        ));
        validation.records.truncate(MAX_AID_RECORDS);
    }

    if !validation.warnings.is_empty() {
        tracing::warn!(
            accepted = validation.records.len(),
            warning_count = validation.warnings.len(),
            "Aid response validation warnings"
        );
    }

    Ok(validation)
}

/// Parse raw model text (optionally inside a ```json fence) and validate it.
pub fn parse_aid_response(raw: &str) -> Result<AidValidation, AidValidationError> {
    let json_str = strip_code_fence(raw);
    let value: Value = serde_json::from_str(json_str)
        .map_err(|e| AidValidationError::MalformedAidResponse(format!("invalid JSON: {e}")))?;
    if value.is_string() {
        return Err(AidValidationError::MalformedAidResponse(
            "expected a list of schemes, got string".into(),
        ));
    }
    validate_aid_payload(&value)
}

fn strip_code_fence(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(start) = trimmed.find("```") else {
        return trimmed;
    };
    let after_open = &trimmed[start + 3..];
    // Skip the language tag on the opening fence line.
    let body_start = after_open.find('\n').map(|i| i + 1).unwrap_or(0);
    let body = &after_open[body_start..];
    match body.find("```") {
        Some(end) => body[..end].trim(),
        None => body.trim(),
    }
}

fn list_items(payload: &Value) -> Option<&Vec<Value>> {
    match payload {
        Value::Array(items) => Some(items),
        Value::Object(map) => LIST_KEYS
            .iter()
            .find_map(|key| map.get(*key).and_then(Value::as_array)),
        _ => None,
    }
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn required_field(map: &Map<String, Value>, keys: &[&str]) -> Result<String, String> {
    let value = keys
        .iter()
        .find_map(|key| map.get(*key))
        .ok_or_else(|| format!("missing {}", keys[0]))?;
    let text = value
        .as_str()
        .ok_or_else(|| format!("{} is not a string", keys[0]))?
        .trim();
    if text.is_empty() {
        return Err(format!("empty {}", keys[0]));
    }
    Ok(text.to_string())
}

fn validate_record(item: &Value) -> Result<AidRecord, String> {
    let map = item
        .as_object()
        .ok_or_else(|| format!("expected object, got {}", kind_of(item)))?;
    Ok(AidRecord {
        scheme_name: required_field(map, SCHEME_NAME_KEYS)?,
        description: required_field(map, DESCRIPTION_KEYS)?,
        access_instructions: required_field(map, ACCESS_KEYS)?,
        website_url: required_field(map, WEBSITE_KEYS)?,
    })
}
