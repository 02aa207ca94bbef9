//! Vitals and geofence watchdog.
//!
//! Pure pieces (`distance`, `geofence`, `simulator`, `debounce`, `watchdog`)
//! hold only their own state. `position` and `session` wrap them in a
//! cancellable async loop driven by a position stream and a vitals timer.

pub mod debounce;
pub mod distance;
pub mod geofence;
pub mod position;
pub mod session;
pub mod simulator;
pub mod watchdog;

pub use debounce::*;
pub use distance::*;
pub use geofence::*;
pub use position::*;
pub use session::*;
pub use simulator::*;
pub use watchdog::*;

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MonitoringError {
    #[error("Location unavailable: {0}")]
    LocationUnavailable(String),

    #[error("Monitoring is already running")]
    AlreadyRunning,

    #[error("Monitoring is not running")]
    NotRunning,
}
