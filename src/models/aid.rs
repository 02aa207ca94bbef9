use serde::{Deserialize, Serialize};

/// A financial-aid scheme. Every field is required and non-empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AidRecord {
    pub scheme_name: String,
    pub description: String,
    pub access_instructions: String,
    pub website_url: String,
}
