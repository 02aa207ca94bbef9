//! Position streams.
//!
//! A `PositionSource` hands out `PositionSubscription`s: an ordered stream
//! of readings plus a cancel signal. Dropping or unsubscribing stops the
//! producer.

use std::time::Duration;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tokio::sync::{mpsc, oneshot};

use super::MonitoringError;
use crate::models::Coordinate;

/// Buffered readings per subscription before the producer waits.
const SUBSCRIPTION_BUFFER: usize = 32;

pub type PositionResult = Result<Coordinate, MonitoringError>;

/// Device geolocation.
pub trait PositionSource: Send + Sync {
    /// Start a live stream. Must be called from within a tokio runtime.
    fn subscribe(&self) -> Result<PositionSubscription, MonitoringError>;

    /// One-shot position query.
    fn get_once(&self) -> PositionResult;
}

// ═══════════════════════════════════════════════════════════
// Subscription
// ═══════════════════════════════════════════════════════════

/// Live position stream with explicit unsubscribe.
pub struct PositionSubscription {
    receiver: mpsc::Receiver<PositionResult>,
    cancel: Option<oneshot::Sender<()>>,
}

impl PositionSubscription {
    /// Create a linked subscription / producer pair.
    pub fn channel() -> (Self, PositionFeed) {
        let (tx, rx) = mpsc::channel(SUBSCRIPTION_BUFFER);
        let (cancel_tx, cancel_rx) = oneshot::channel();
        (
            Self {
                receiver: rx,
                cancel: Some(cancel_tx),
            },
            PositionFeed {
                sender: tx,
                cancelled: cancel_rx,
            },
        )
    }

    /// Next reading in delivery order; `None` once the stream has ended.
    pub async fn next(&mut self) -> Option<PositionResult> {
        self.receiver.recv().await
    }

    pub fn is_active(&self) -> bool {
        self.cancel.is_some()
    }

    pub fn unsubscribe(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            let _ = cancel.send(());
            self.receiver.close();
            tracing::debug!("Position subscription cancelled");
        }
    }
}

impl Drop for PositionSubscription {
    fn drop(&mut self) {
        self.unsubscribe();
    }
}

/// Producer half of a subscription.
pub struct PositionFeed {
    sender: mpsc::Sender<PositionResult>,
    cancelled: oneshot::Receiver<()>,
}

impl PositionFeed {
    /// Deliver a reading. Returns `false` once the subscriber is gone.
    pub async fn push(&mut self, reading: PositionResult) -> bool {
        if self.is_cancelled() {
            return false;
        }
        self.sender.send(reading).await.is_ok()
    }

    pub fn is_cancelled(&mut self) -> bool {
        !matches!(
            self.cancelled.try_recv(),
            Err(oneshot::error::TryRecvError::Empty)
        )
    }

    /// Wait until the subscriber unsubscribes or drops.
    pub async fn closed(&mut self) {
        let _ = (&mut self.cancelled).await;
    }
}

// ═══════════════════════════════════════════════════════════
// Sources
// ═══════════════════════════════════════════════════════════

/// Replays a fixed sequence of readings, then idles until cancelled.
#[derive(Debug, Clone)]
pub struct ScriptedPositionSource {
    readings: Vec<PositionResult>,
    interval: Duration,
    denied: Option<String>,
}

impl ScriptedPositionSource {
    pub fn new(readings: Vec<Coordinate>, interval: Duration) -> Self {
        Self {
            readings: readings.into_iter().map(Ok).collect(),
            interval,
            denied: None,
        }
    }

    /// Include stream errors in the replay.
    pub fn with_results(readings: Vec<PositionResult>, interval: Duration) -> Self {
        Self {
            readings,
            interval,
            denied: None,
        }
    }

    /// A source whose permission is refused.
    pub fn denied(reason: &str) -> Self {
        Self {
            readings: Vec::new(),
            interval: Duration::ZERO,
            denied: Some(reason.to_string()),
        }
    }
}

impl PositionSource for ScriptedPositionSource {
    fn subscribe(&self) -> Result<PositionSubscription, MonitoringError> {
        if let Some(reason) = &self.denied {
            return Err(MonitoringError::LocationUnavailable(reason.clone()));
        }
        let (subscription, mut feed) = PositionSubscription::channel();
        let readings = self.readings.clone();
        let interval = self.interval;
        tokio::spawn(async move {
            for reading in readings {
                if !interval.is_zero() {
                    tokio::time::sleep(interval).await;
                }
                if !feed.push(reading).await {
                    return;
                }
            }
            feed.closed().await;
        });
        Ok(subscription)
    }

    fn get_once(&self) -> PositionResult {
        if let Some(reason) = &self.denied {
            return Err(MonitoringError::LocationUnavailable(reason.clone()));
        }
        self.readings
            .iter()
            .find_map(|r| r.as_ref().ok().copied())
            .ok_or_else(|| MonitoringError::LocationUnavailable("no position fix".into()))
    }
}

/// Random walk around a starting point, for demos without a GPS.
#[derive(Debug, Clone)]
pub struct SimulatedPositionSource {
    origin: Coordinate,
    /// Largest per-reading jitter in degrees on each axis.
    max_step_deg: f64,
    interval: Duration,
    seed: Option<u64>,
}

impl SimulatedPositionSource {
    pub fn new(origin: Coordinate, max_step_deg: f64, interval: Duration) -> Self {
        Self {
            origin,
            max_step_deg: max_step_deg.abs(),
            interval,
            seed: None,
        }
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }
}

fn step(current: Coordinate, rng: &mut impl Rng, max_step: f64) -> Coordinate {
    if max_step == 0.0 {
        return current;
    }
    Coordinate {
        latitude: (current.latitude + rng.gen_range(-max_step..=max_step)).clamp(-90.0, 90.0),
        longitude: (current.longitude + rng.gen_range(-max_step..=max_step)).clamp(-180.0, 180.0),
    }
}

impl PositionSource for SimulatedPositionSource {
    fn subscribe(&self) -> Result<PositionSubscription, MonitoringError> {
        let (subscription, mut feed) = PositionSubscription::channel();
        let mut rng = match self.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let max_step = self.max_step_deg;
        let interval = self.interval;
        let mut current = self.origin;
        tokio::spawn(async move {
            loop {
                if !feed.push(Ok(current)).await {
                    tracing::debug!("Simulated position feed stopped");
                    return;
                }
                tokio::select! {
                    () = tokio::time::sleep(interval) => {}
                    () = feed.closed() => return,
                }
                current = step(current, &mut rng, max_step);
            }
        });
        Ok(subscription)
    }

    fn get_once(&self) -> PositionResult {
        Ok(self.origin)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn coord(lat: f64, lon: f64) -> Coordinate {
        Coordinate::new(lat, lon).unwrap()
    }

    #[tokio::test]
    async fn scripted_source_delivers_in_order() {
        let source = ScriptedPositionSource::new(
            vec![coord(1.0, 1.0), coord(2.0, 2.0), coord(3.0, 3.0)],
            Duration::ZERO,
        );
        let mut sub = source.subscribe().unwrap();
        for expected in [1.0, 2.0, 3.0] {
            let got = sub.next().await.unwrap().unwrap();
            assert_eq!(got.latitude, expected);
        }
    }

    #[tokio::test]
    async fn scripted_source_forwards_errors() {
        let source = ScriptedPositionSource::with_results(
            vec![
                Ok(coord(1.0, 1.0)),
                Err(MonitoringError::LocationUnavailable("signal lost".into())),
            ],
            Duration::ZERO,
        );
        let mut sub = source.subscribe().unwrap();
        assert!(sub.next().await.unwrap().is_ok());
        assert!(matches!(
            sub.next().await.unwrap(),
            Err(MonitoringError::LocationUnavailable(_))
        ));
    }

    #[test]
    fn denied_source_refuses_everything() {
        let source = ScriptedPositionSource::denied("permission denied");
        assert!(matches!(
            source.get_once(),
            Err(MonitoringError::LocationUnavailable(_))
        ));
    }

    #[tokio::test]
    async fn denied_source_refuses_subscription() {
        let source = ScriptedPositionSource::denied("permission denied");
        assert!(source.subscribe().is_err());
    }

    #[tokio::test]
    async fn unsubscribe_ends_stream() {
        let source = SimulatedPositionSource::new(coord(0.0, 0.0), 0.001, Duration::from_millis(1))
            .with_seed(1);
        let mut sub = source.subscribe().unwrap();
        assert!(sub.next().await.is_some());
        sub.unsubscribe();
        assert!(!sub.is_active());
        // Closed receiver drains whatever was buffered, then ends.
        let mut remaining = 0;
        while sub.next().await.is_some() {
            remaining += 1;
            assert!(remaining <= SUBSCRIPTION_BUFFER);
        }
    }

    #[tokio::test]
    async fn simulated_source_stays_near_origin() {
        let origin = coord(12.97, 77.59);
        let source =
            SimulatedPositionSource::new(origin, 0.0005, Duration::from_millis(1)).with_seed(5);
        let mut sub = source.subscribe().unwrap();
        for i in 0..10 {
            let p = sub.next().await.unwrap().unwrap();
            assert!(p.is_valid());
            assert!((p.latitude - origin.latitude).abs() <= 0.0005 * (i as f64 + 1.0));
        }
    }

    #[test]
    fn step_with_zero_jitter_is_identity() {
        let mut rng = StdRng::seed_from_u64(0);
        let c = coord(5.0, 5.0);
        assert_eq!(step(c, &mut rng, 0.0), c);
    }
}
