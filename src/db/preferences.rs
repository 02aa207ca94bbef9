//! Typed accessors over a [`PersistenceStore`] for the keys the companion keeps:
//! analysis history, theme, and the emergency contact.

use std::str::FromStr;

use super::{DatabaseError, PersistenceStore};
use crate::config::HISTORY_LIMIT;
use crate::models::{HistoryEntry, Theme};

pub const HISTORY_KEY: &str = "history";
pub const THEME_KEY: &str = "theme";
pub const EMERGENCY_CONTACT_KEY: &str = "emergency_contact";

/// Load the saved history, newest first. A corrupt value is logged and treated as empty.
pub fn load_history(store: &dyn PersistenceStore) -> Result<Vec<HistoryEntry>, DatabaseError> {
    let Some(raw) = store.get(HISTORY_KEY)? else {
        return Ok(Vec::new());
    };
    match serde_json::from_str::<Vec<HistoryEntry>>(&raw) {
        Ok(entries) => Ok(entries),
        Err(e) => {
            tracing::warn!(error = %e, "Discarding unreadable history");
            Ok(Vec::new())
        }
    }
}

/// Prepend an entry and persist, keeping at most `HISTORY_LIMIT` entries.
pub fn append_history(
    store: &dyn PersistenceStore,
    entry: HistoryEntry,
) -> Result<Vec<HistoryEntry>, DatabaseError> {
    let mut entries = load_history(store)?;
    entries.insert(0, entry);
    entries.truncate(HISTORY_LIMIT);
    store.set(HISTORY_KEY, &serde_json::to_string(&entries)?)?;
    Ok(entries)
}

pub fn clear_history(store: &dyn PersistenceStore) -> Result<(), DatabaseError> {
    store.remove(HISTORY_KEY)
}

/// Stored theme, falling back to the default for missing or unknown values.
pub fn load_theme(store: &dyn PersistenceStore) -> Result<Theme, DatabaseError> {
    Ok(store
        .get(THEME_KEY)?
        .and_then(|raw| Theme::from_str(&raw).ok())
        .unwrap_or_default())
}

pub fn save_theme(store: &dyn PersistenceStore, theme: Theme) -> Result<(), DatabaseError> {
    store.set(THEME_KEY, theme.as_str())
}

pub fn load_emergency_contact(
    store: &dyn PersistenceStore,
) -> Result<Option<String>, DatabaseError> {
    Ok(store
        .get(EMERGENCY_CONTACT_KEY)?
        .map(|c| c.trim().to_string())
        .filter(|c| !c.is_empty()))
}

/// Save the contact; a blank value clears it.
pub fn save_emergency_contact(
    store: &dyn PersistenceStore,
    contact: &str,
) -> Result<(), DatabaseError> {
    let contact = contact.trim();
    if contact.is_empty() {
        store.remove(EMERGENCY_CONTACT_KEY)
    } else {
        store.set(EMERGENCY_CONTACT_KEY, contact)
    }
}
