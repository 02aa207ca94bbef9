use serde::{Deserialize, Serialize};

/// A grounded search result: a named place and where to find it.
///
/// `display_name` is unique within one result set and is the key used to
/// locate the matching narrative block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchHit {
    pub display_name: String,
    pub resource_uri: String,
}

impl SearchHit {
    pub fn new(display_name: impl Into<String>, resource_uri: impl Into<String>) -> Self {
        Self {
            display_name: display_name.into(),
            resource_uri: resource_uri.into(),
        }
    }
}

/// A search hit with the structured fields recovered from the narrative.
/// All three fields are non-empty once reconciliation has run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnrichedHit {
    pub hit: SearchHit,
    pub contact_number: String,
    pub specialist_name: String,
    pub rating_label: String,
}

/// Narrative text plus the hits grounding it, as returned by a search.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroundedResponse {
    pub narrative: String,
    pub hits: Vec<SearchHit>,
}
