use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::enums::ChatRole;

/// One completed symptom analysis, kept in the persisted history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub id: Uuid,
    pub symptoms: String,
    pub analysis: String,
    pub recorded_at: NaiveDateTime,
}

impl HistoryEntry {
    pub fn new(symptoms: &str, analysis: &str) -> Self {
        Self {
            id: Uuid::new_v4(),
            symptoms: symptoms.to_string(),
            analysis: analysis.to_string(),
            recorded_at: chrono::Local::now().naive_local(),
        }
    }
}

/// A single chat turn.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub text: String,
}

impl ChatMessage {
    pub fn user(text: &str) -> Self {
        Self {
            role: ChatRole::User,
            text: text.to_string(),
        }
    }

    pub fn assistant(text: &str) -> Self {
        Self {
            role: ChatRole::Assistant,
            text: text.to_string(),
        }
    }
}
