//! The live monitoring loop.
//!
//! One tokio task owns the `Watchdog`, the position subscription and the
//! vitals timer. Positions are processed in delivery order, vitals ticks in
//! generation order, and everything the loop observes is reported as a
//! `MonitorEvent` on an unbounded channel.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;

use super::geofence::{BoundaryUpdate, GeofenceMonitor};
use super::position::{PositionSource, PositionSubscription};
use super::simulator::VitalsSimulator;
use super::watchdog::{AlertSink, Watchdog};
use super::MonitoringError;
use crate::config::{GEOFENCE_RADIUS_KM, VITALS_TICK_INTERVAL};
use crate::models::{AlertNotification, VitalsReading};

/// Settings for one monitoring session.
#[derive(Debug, Clone)]
pub struct MonitorConfig {
    pub tick_interval: Duration,
    pub radius_km: f64,
    pub contact: String,
    /// Fixed seed for the vitals simulator; entropy when `None`.
    pub seed: Option<u64>,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            tick_interval: VITALS_TICK_INTERVAL,
            radius_km: GEOFENCE_RADIUS_KM,
            contact: String::new(),
            seed: None,
        }
    }
}

/// Everything the loop reports, in the order it happened.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MonitorEvent {
    Position(BoundaryUpdate),
    PositionError { message: String },
    Vitals(VitalsReading),
    Alert(AlertNotification),
    Stopped,
}

/// Handle to a running monitoring task.
///
/// Dropping the handle stops the task.
pub struct MonitorHandle {
    stop_tx: Option<oneshot::Sender<()>>,
    contact_tx: watch::Sender<String>,
    events: mpsc::UnboundedReceiver<MonitorEvent>,
    task: Option<JoinHandle<()>>,
}

impl MonitorHandle {
    /// Request shutdown. Safe to call more than once.
    pub fn stop(&mut self) {
        if let Some(tx) = self.stop_tx.take() {
            let _ = tx.send(());
            tracing::info!("Monitoring stop requested");
        }
    }

    pub fn is_stopping(&self) -> bool {
        self.stop_tx.is_none()
    }

    /// Change the emergency contact used by the running session.
    pub fn set_contact(&self, contact: &str) {
        self.contact_tx.send_replace(contact.trim().to_string());
    }

    /// Events produced since the last drain, without waiting.
    pub fn drain_events(&mut self) -> Vec<MonitorEvent> {
        let mut drained = Vec::new();
        while let Ok(event) = self.events.try_recv() {
            drained.push(event);
        }
        drained
    }

    /// Wait for the next event; `None` once the task has finished.
    pub async fn next_event(&mut self) -> Option<MonitorEvent> {
        self.events.recv().await
    }

    /// Stop and wait for the task to exit.
    pub async fn shutdown(mut self) -> Vec<MonitorEvent> {
        self.stop();
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                tracing::error!(error = %e, "Monitoring task ended abnormally");
            }
        }
        self.drain_events()
    }
}

impl Drop for MonitorHandle {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Subscribe to `source` and spawn the monitoring loop.
///
/// Fails with `LocationUnavailable` when the subscription is refused, in
/// which case nothing is spawned.
pub fn start_monitoring<S>(
    source: &S,
    config: MonitorConfig,
    sink: Arc<dyn AlertSink>,
) -> Result<MonitorHandle, MonitoringError>
where
    S: PositionSource + ?Sized,
{
    let subscription = source.subscribe()?;

    let (stop_tx, stop_rx) = oneshot::channel();
    let (contact_tx, contact_rx) = watch::channel(config.contact.trim().to_string());
    let (events_tx, events_rx) = mpsc::unbounded_channel();

    let watchdog = Watchdog::new(GeofenceMonitor::with_radius(config.radius_km), &config.contact);
    let simulator = match config.seed {
        Some(seed) => VitalsSimulator::seeded(seed),
        None => VitalsSimulator::from_entropy(),
    };

    tracing::info!(
        tick_ms = config.tick_interval.as_millis() as u64,
        radius_km = config.radius_km,
        has_contact = !watchdog.contact().is_empty(),
        "Monitoring started"
    );

    let task = tokio::spawn(monitor_loop(MonitorLoop {
        watchdog,
        simulator,
        subscription,
        tick_interval: config.tick_interval,
        stop_rx,
        contact_rx,
        events_tx,
        sink,
    }));

    Ok(MonitorHandle {
        stop_tx: Some(stop_tx),
        contact_tx,
        events: events_rx,
        task: Some(task),
    })
}

struct MonitorLoop {
    watchdog: Watchdog,
    simulator: VitalsSimulator,
    subscription: PositionSubscription,
    tick_interval: Duration,
    stop_rx: oneshot::Receiver<()>,
    contact_rx: watch::Receiver<String>,
    events_tx: mpsc::UnboundedSender<MonitorEvent>,
    sink: Arc<dyn AlertSink>,
}

impl MonitorLoop {
    fn emit(&self, event: MonitorEvent) {
        // The handle may already be gone; the loop stops on the next select.
        let _ = self.events_tx.send(event);
    }

    fn refresh_contact(&mut self) {
        if self.contact_rx.has_changed().unwrap_or(false) {
            let contact = self.contact_rx.borrow_and_update().clone();
            self.watchdog.set_contact(&contact);
        }
    }

    fn raise(&self, alert: Option<AlertNotification>) {
        if let Some(alert) = alert {
            self.sink.deliver(&alert);
            self.emit(MonitorEvent::Alert(alert));
        }
    }

    fn on_vitals(&mut self, reading: VitalsReading) {
        self.refresh_contact();
        tracing::debug!(
            heart_rate = reading.heart_rate,
            oxygen = reading.oxygen_saturation,
            "Vitals tick"
        );
        self.emit(MonitorEvent::Vitals(reading));
        let alert = self.watchdog.observe_vitals(reading);
        self.raise(alert);
    }
}

async fn monitor_loop(mut state: MonitorLoop) {
    let mut vitals = state.simulator.initial();
    state.on_vitals(vitals);

    let mut ticker = tokio::time::interval_at(
        tokio::time::Instant::now() + state.tick_interval,
        state.tick_interval,
    );
    let mut positions_open = true;

    loop {
        tokio::select! {
            biased;
            _ = &mut state.stop_rx => break,
            reading = state.subscription.next(), if positions_open => match reading {
                Some(Ok(position)) if position.is_valid() => {
                    state.refresh_contact();
                    let (update, alert) = state.watchdog.observe_position(position);
                    state.emit(MonitorEvent::Position(update));
                    state.raise(alert);
                }
                Some(Ok(position)) => {
                    tracing::warn!(position = ?position, "Discarding invalid position reading");
                    state.emit(MonitorEvent::PositionError {
                        message: format!("invalid position {position:?}"),
                    });
                }
                Some(Err(e)) => {
                    tracing::warn!(error = %e, "Position stream error");
                    state.emit(MonitorEvent::PositionError { message: e.to_string() });
                }
                None => {
                    tracing::info!("Position stream ended");
                    positions_open = false;
                }
            },
            _ = ticker.tick() => {
                vitals = state.simulator.tick(vitals);
                state.on_vitals(vitals);
            }
        }
    }

    state.subscription.unsubscribe();
    state.emit(MonitorEvent::Stopped);
    tracing::info!("Monitoring stopped");
}
