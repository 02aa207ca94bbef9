use std::path::PathBuf;
use std::time::Duration;

use crate::models::Coordinate;

/// Application-level constants
pub const APP_NAME: &str = "Careline";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Radius of the geofence around the home reference, in kilometres.
pub const GEOFENCE_RADIUS_KM: f64 = 5.0;

/// Mean Earth radius used by the haversine distance.
pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// Cadence of simulated vitals readings.
pub const VITALS_TICK_INTERVAL: Duration = Duration::from_secs(2);

/// Newest-first cap on persisted analysis history.
pub const HISTORY_LIMIT: usize = 20;

/// Chat turns sent back to the model as context.
pub const CHAT_CONTEXT_TURNS: usize = 10;

const DEFAULT_OLLAMA_URL: &str = "http://localhost:11434";
const DEFAULT_MODEL: &str = "medgemma:latest";
const DEFAULT_TIMEOUT_SECS: u64 = 120;

/// Where the simulated position feed starts when none is configured.
const DEFAULT_ORIGIN: (f64, f64) = (12.9716, 77.5946);

/// Log filter used when `RUST_LOG` is not set.
pub fn default_log_filter() -> &'static str {
    "careline=info,careline_lib=info"
}

/// Get the application data directory
/// ~/Careline/ on all platforms, or the working directory when no home exists.
pub fn app_data_dir() -> PathBuf {
    match dirs::home_dir() {
        Some(home) => home.join(APP_NAME),
        None => PathBuf::from(".").join(APP_NAME),
    }
}

/// Get the key/value store path inside a data directory.
pub fn database_path(data_dir: &std::path::Path) -> PathBuf {
    data_dir.join("careline.db")
}

/// Runtime settings, read from the environment (and `.env` via dotenvy).
#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    pub ollama_url: String,
    pub model: String,
    pub timeout_secs: u64,
    /// Overrides the stored emergency contact when set.
    pub emergency_contact: Option<String>,
    pub data_dir: PathBuf,
    /// Start of the simulated position feed.
    pub origin: Coordinate,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            ollama_url: DEFAULT_OLLAMA_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            emergency_contact: None,
            data_dir: app_data_dir(),
            origin: Coordinate {
                latitude: DEFAULT_ORIGIN.0,
                longitude: DEFAULT_ORIGIN.1,
            },
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup. Unparseable or blank values keep defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let timeout_secs = match get("CARELINE_TIMEOUT_SECS") {
            Some(raw) => raw.parse().unwrap_or_else(|_| {
                tracing::warn!(value = %raw, "Ignoring invalid CARELINE_TIMEOUT_SECS");
                defaults.timeout_secs
            }),
            None => defaults.timeout_secs,
        };

        Self {
            ollama_url: get("CARELINE_OLLAMA_URL").unwrap_or(defaults.ollama_url),
            model: get("CARELINE_MODEL").unwrap_or(defaults.model),
            timeout_secs,
            emergency_contact: get("CARELINE_EMERGENCY_CONTACT"),
            data_dir: get("CARELINE_DATA_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.data_dir),
            origin: match get("CARELINE_ORIGIN") {
                Some(raw) => parse_origin(&raw).unwrap_or_else(|| {
                    tracing::warn!(value = %raw, "Ignoring invalid CARELINE_ORIGIN");
                    defaults.origin
                }),
                None => defaults.origin,
            },
        }
    }
}

/// Parse `"lat,lon"` in decimal degrees.
fn parse_origin(raw: &str) -> Option<Coordinate> {
    let (lat, lon) = raw.split_once(',')?;
    Coordinate::new(lat.trim().parse().ok()?, lon.trim().parse().ok()?)
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn app_data_dir_ends_with_app_name() {
        assert!(app_data_dir().ends_with("Careline"));
    }

    #[test]
    fn database_lives_in_data_dir() {
        let dir = PathBuf::from("/tmp/careline-test");
        assert_eq!(database_path(&dir), dir.join("careline.db"));
    }

    #[test]
    fn empty_environment_gives_defaults() {
        let config = AppConfig::from_lookup(|_| None);
        assert_eq!(config, AppConfig::default());
        assert_eq!(config.ollama_url, "http://localhost:11434");
    }

    #[test]
    fn environment_overrides_apply() {
        let config = AppConfig::from_lookup(lookup_from(&[
            ("CARELINE_OLLAMA_URL", "http://gpu-box:11434"),
            ("CARELINE_MODEL", "llama3:8b"),
            ("CARELINE_TIMEOUT_SECS", "30"),
            ("CARELINE_EMERGENCY_CONTACT", " +1 555 0100 "),
            ("CARELINE_DATA_DIR", "/var/lib/careline"),
        ]));
        assert_eq!(config.ollama_url, "http://gpu-box:11434");
        assert_eq!(config.model, "llama3:8b");
        assert_eq!(config.timeout_secs, 30);
        assert_eq!(config.emergency_contact.as_deref(), Some("+1 555 0100"));
        assert_eq!(config.data_dir, PathBuf::from("/var/lib/careline"));
    }

    #[test]
    fn invalid_timeout_keeps_default() {
        let config = AppConfig::from_lookup(lookup_from(&[("CARELINE_TIMEOUT_SECS", "soon")]));
        assert_eq!(config.timeout_secs, 120);
    }

    #[test]
    fn blank_contact_is_none() {
        let config = AppConfig::from_lookup(lookup_from(&[("CARELINE_EMERGENCY_CONTACT", "  ")]));
        assert!(config.emergency_contact.is_none());
    }

    #[test]
    fn origin_parses_lat_lon() {
        let config = AppConfig::from_lookup(lookup_from(&[("CARELINE_ORIGIN", "51.5, -0.12")]));
        assert_eq!(config.origin, Coordinate::new(51.5, -0.12).unwrap());
    }

    #[test]
    fn out_of_range_origin_keeps_default() {
        let config = AppConfig::from_lookup(lookup_from(&[("CARELINE_ORIGIN", "95,10")]));
        assert_eq!(config.origin, AppConfig::default().origin);
        assert!(parse_origin("nonsense").is_none());
    }

    #[test]
    fn geofence_radius_is_five_km() {
        assert_eq!(GEOFENCE_RADIUS_KM, 5.0);
        assert_eq!(VITALS_TICK_INTERVAL, Duration::from_secs(2));
    }
}
