use serde::Serialize;

use super::distance::distance_km;
use crate::config::GEOFENCE_RADIUS_KM;
use crate::models::{BoundaryState, Coordinate};

/// Result of feeding one position into the monitor.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BoundaryUpdate {
    pub position: Coordinate,
    pub home: Coordinate,
    pub distance_km: f64,
    pub state: BoundaryState,
    /// The state differs from the previous reading's state.
    pub transition: bool,
    /// This reading established the home reference.
    pub home_established: bool,
}

/// Tracks distance from a home reference fixed by the first reading.
///
/// Home is wherever the user was when monitoring began, not a configured
/// address; `reset` clears it so the next reading re-homes.
#[derive(Debug, Clone)]
pub struct GeofenceMonitor {
    home: Option<Coordinate>,
    last_state: BoundaryState,
    radius_km: f64,
}

impl Default for GeofenceMonitor {
    fn default() -> Self {
        Self::new()
    }
}

impl GeofenceMonitor {
    pub fn new() -> Self {
        Self::with_radius(GEOFENCE_RADIUS_KM)
    }

    pub fn with_radius(radius_km: f64) -> Self {
        Self {
            home: None,
            last_state: BoundaryState::InBounds,
            radius_km,
        }
    }

    pub fn home(&self) -> Option<Coordinate> {
        self.home
    }

    pub fn last_state(&self) -> BoundaryState {
        self.last_state
    }

    pub fn radius_km(&self) -> f64 {
        self.radius_km
    }

    pub fn on_position_update(&mut self, position: Coordinate) -> BoundaryUpdate {
        let home_established = self.home.is_none();
        let home = *self.home.get_or_insert(position);

        let distance = distance_km(home, position);
        let state = if distance > self.radius_km {
            BoundaryState::OutOfBounds
        } else {
            BoundaryState::InBounds
        };
        let transition = state != self.last_state;
        self.last_state = state;

        if home_established {
            tracing::info!(home = %home, "Home reference established");
        }
        if transition {
            tracing::info!(
                state = %state,
                distance_km = distance,
                "Geofence boundary transition"
            );
        }

        BoundaryUpdate {
            position,
            home,
            distance_km: distance,
            state,
            transition,
            home_established,
        }
    }

    /// Forget home and boundary history.
    pub fn reset(&mut self) {
        self.home = None;
        self.last_state = BoundaryState::InBounds;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::monitoring::distance::{distance_km, offset_north};

    fn origin() -> Coordinate {
        Coordinate::new(0.0, 0.0).unwrap()
    }

    #[test]
    fn first_reading_defines_home() {
        let mut monitor = GeofenceMonitor::new();
        let start = Coordinate::new(12.97, 77.59).unwrap();
        let update = monitor.on_position_update(start);
        assert!(update.home_established);
        assert_eq!(update.home, start);
        assert_eq!(update.distance_km, 0.0);
        assert_eq!(update.state, BoundaryState::InBounds);
        assert!(!update.transition);
        assert_eq!(monitor.home(), Some(start));
    }

    #[test]
    fn six_km_is_out_of_bounds() {
        let mut monitor = GeofenceMonitor::new();
        monitor.on_position_update(origin());
        let update = monitor.on_position_update(offset_north(origin(), 6.0));
        assert_eq!(update.state, BoundaryState::OutOfBounds);
        assert!(update.transition);
        assert!(!update.home_established);
    }

    #[test]
    fn four_km_is_in_bounds() {
        let mut monitor = GeofenceMonitor::new();
        monitor.on_position_update(origin());
        let update = monitor.on_position_update(offset_north(origin(), 4.0));
        assert_eq!(update.state, BoundaryState::InBounds);
        assert!(!update.transition);
    }

    #[test]
    fn exactly_at_radius_is_in_bounds() {
        let at_edge = offset_north(origin(), 4.0);
        let mut monitor = GeofenceMonitor::with_radius(distance_km(origin(), at_edge));
        monitor.on_position_update(origin());
        assert_eq!(monitor.on_position_update(at_edge).state, BoundaryState::InBounds);
    }

    #[test]
    fn transitions_reported_once_per_change() {
        let mut monitor = GeofenceMonitor::new();
        monitor.on_position_update(origin());
        let far = offset_north(origin(), 7.0);
        assert!(monitor.on_position_update(far).transition);
        assert!(!monitor.on_position_update(far).transition);
        assert!(monitor.on_position_update(origin()).transition);
        assert_eq!(monitor.last_state(), BoundaryState::InBounds);
    }

    #[test]
    fn reset_rehomes_on_next_reading() {
        let mut monitor = GeofenceMonitor::new();
        monitor.on_position_update(origin());
        let far = offset_north(origin(), 20.0);
        assert_eq!(monitor.on_position_update(far).state, BoundaryState::OutOfBounds);

        monitor.reset();
        assert!(monitor.home().is_none());
        let update = monitor.on_position_update(far);
        assert!(update.home_established);
        assert_eq!(update.home, far);
        assert_eq!(update.state, BoundaryState::InBounds);
        assert!(!update.transition);
    }
}
