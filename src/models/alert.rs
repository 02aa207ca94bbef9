use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::enums::AlertKind;

/// A notification addressed to the emergency contact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertNotification {
    pub id: Uuid,
    pub kind: AlertKind,
    pub contact: String,
    pub message: String,
    pub raised_at: NaiveDateTime,
}
