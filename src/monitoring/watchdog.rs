use std::sync::Mutex;

use uuid::Uuid;

use super::debounce::AlertDebouncer;
use super::geofence::{BoundaryUpdate, GeofenceMonitor};
use crate::models::{AlertKind, AlertNotification, BoundaryState, Coordinate, VitalsReading};

// ═══════════════════════════════════════════════════════════
// Alert delivery
// ═══════════════════════════════════════════════════════════

/// Where fired alerts go (SMS gateway, push, log...).
pub trait AlertSink: Send + Sync {
    fn deliver(&self, alert: &AlertNotification);
}

/// Writes alerts to the log. Default sink for the desktop client.
pub struct TracingAlertSink;

impl AlertSink for TracingAlertSink {
    fn deliver(&self, alert: &AlertNotification) {
        tracing::warn!(
            kind = %alert.kind,
            contact = %alert.contact,
            message = %alert.message,
            "Emergency alert dispatched"
        );
    }
}

/// Collects delivered alerts in memory.
#[derive(Default)]
pub struct RecordingAlertSink {
    delivered: Mutex<Vec<AlertNotification>>,
}

impl RecordingAlertSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn delivered(&self) -> Vec<AlertNotification> {
        self.delivered
            .lock()
            .map(|guard| guard.clone())
            .unwrap_or_default()
    }
}

impl AlertSink for RecordingAlertSink {
    fn deliver(&self, alert: &AlertNotification) {
        if let Ok(mut guard) = self.delivered.lock() {
            guard.push(alert.clone());
        }
    }
}

// ═══════════════════════════════════════════════════════════
// Watchdog
// ═══════════════════════════════════════════════════════════

/// Geofence and vitals alerting for one monitoring session.
///
/// Each condition has its own debouncer. An empty contact suppresses
/// delivery without touching either debouncer.
#[derive(Debug, Clone)]
pub struct Watchdog {
    geofence: GeofenceMonitor,
    vitals_gate: AlertDebouncer,
    geofence_gate: AlertDebouncer,
    contact: String,
}

impl Watchdog {
    pub fn new(geofence: GeofenceMonitor, contact: &str) -> Self {
        Self {
            geofence,
            vitals_gate: AlertDebouncer::new(),
            geofence_gate: AlertDebouncer::new(),
            contact: contact.trim().to_string(),
        }
    }

    pub fn contact(&self) -> &str {
        &self.contact
    }

    pub fn set_contact(&mut self, contact: &str) {
        self.contact = contact.trim().to_string();
    }

    pub fn observe_position(
        &mut self,
        position: Coordinate,
    ) -> (BoundaryUpdate, Option<AlertNotification>) {
        let update = self.geofence.on_position_update(position);
        let outside = update.state == BoundaryState::OutOfBounds;
        let alert = if self.geofence_gate.evaluate(outside) {
            self.compose(
                AlertKind::Geofence,
                format!(
                    "Left the safe zone: {:.2} km from home (limit {:.1} km). Last position {}.",
                    update.distance_km,
                    self.geofence.radius_km(),
                    update.position
                ),
            )
        } else {
            None
        };
        (update, alert)
    }

    pub fn observe_vitals(&mut self, reading: VitalsReading) -> Option<AlertNotification> {
        if !self.vitals_gate.evaluate(reading.is_abnormal()) {
            return None;
        }
        self.compose(
            AlertKind::Vitals,
            format!(
                "Abnormal vitals: heart rate {} bpm, oxygen saturation {}%.",
                reading.heart_rate, reading.oxygen_saturation
            ),
        )
    }

    fn compose(&self, kind: AlertKind, message: String) -> Option<AlertNotification> {
        if self.contact.is_empty() {
            tracing::info!(kind = %kind, "Alert suppressed: no emergency contact configured");
            return None;
        }
        Some(AlertNotification {
            id: Uuid::new_v4(),
            kind,
            contact: self.contact.clone(),
            message,
            raised_at: chrono::Local::now().naive_local(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::monitoring::distance::offset_north;

    fn home() -> Coordinate {
        Coordinate::new(0.0, 0.0).unwrap()
    }

    fn reading(hr: i32, o2: i32) -> VitalsReading {
        VitalsReading {
            heart_rate: hr,
            oxygen_saturation: o2,
        }
    }

    #[test]
    fn vitals_alert_once_per_episode() {
        let mut dog = Watchdog::new(GeofenceMonitor::new(), "+1 555 0100");
        assert!(dog.observe_vitals(reading(80, 98)).is_none());
        let alert = dog.observe_vitals(reading(110, 98)).unwrap();
        assert_eq!(alert.kind, AlertKind::Vitals);
        assert_eq!(alert.contact, "+1 555 0100");
        assert!(alert.message.contains("110 bpm"));
        assert!(dog.observe_vitals(reading(115, 93)).is_none());
        assert!(dog.observe_vitals(reading(90, 97)).is_none());
        assert!(dog.observe_vitals(reading(55, 97)).is_some());
    }

    #[test]
    fn geofence_alert_once_while_outside() {
        let mut dog = Watchdog::new(GeofenceMonitor::new(), "carer@example.com");
        let (update, alert) = dog.observe_position(home());
        assert!(update.home_established);
        assert!(alert.is_none());

        let far = offset_north(home(), 6.0);
        let (_, alert) = dog.observe_position(far);
        let alert = alert.unwrap();
        assert_eq!(alert.kind, AlertKind::Geofence);
        assert!(alert.message.contains("6.00 km"));

        assert!(dog.observe_position(offset_north(home(), 8.0)).1.is_none());
        assert!(dog.observe_position(home()).1.is_none());
        assert!(dog.observe_position(far).1.is_some());
    }

    #[test]
    fn empty_contact_suppresses_without_rearming() {
        let mut dog = Watchdog::new(GeofenceMonitor::new(), "   ");
        assert!(dog.observe_vitals(reading(120, 98)).is_none());

        // Contact added mid-episode: the episode already consumed its fire.
        dog.set_contact("+1 555 0100");
        assert!(dog.observe_vitals(reading(121, 98)).is_none());

        assert!(dog.observe_vitals(reading(80, 98)).is_none());
        assert!(dog.observe_vitals(reading(121, 98)).is_some());
    }

    #[test]
    fn vitals_and_geofence_are_independent() {
        let mut dog = Watchdog::new(GeofenceMonitor::new(), "+1 555 0100");
        dog.observe_position(home());
        assert!(dog.observe_vitals(reading(130, 90)).is_some());
        assert!(dog.observe_position(offset_north(home(), 10.0)).1.is_some());
    }

    #[test]
    fn recording_sink_keeps_order() {
        let sink = RecordingAlertSink::new();
        let mut dog = Watchdog::new(GeofenceMonitor::new(), "x");
        let a = dog.observe_vitals(reading(130, 98)).unwrap();
        dog.observe_position(home());
        let b = dog.observe_position(offset_north(home(), 9.0)).1.unwrap();
        sink.deliver(&a);
        sink.deliver(&b);
        let kinds: Vec<_> = sink.delivered().iter().map(|a| a.kind).collect();
        assert_eq!(kinds, vec![AlertKind::Vitals, AlertKind::Geofence]);
    }
}
