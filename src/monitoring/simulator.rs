use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::models::VitalsReading;

/// Probability that oxygen saturation moves by one point on a tick.
const OXYGEN_DRIFT_PROBABILITY: f64 = 0.2;

/// Synthetic heart-rate / oxygen stream with a bounded random walk.
pub struct VitalsSimulator<R: Rng = StdRng> {
    rng: R,
}

impl VitalsSimulator<StdRng> {
    pub fn from_entropy() -> Self {
        Self::with_rng(StdRng::from_entropy())
    }

    pub fn seeded(seed: u64) -> Self {
        Self::with_rng(StdRng::seed_from_u64(seed))
    }
}

impl<R: Rng> VitalsSimulator<R> {
    pub fn with_rng(rng: R) -> Self {
        Self { rng }
    }

    /// Resting start: heart rate 70–95 bpm, oxygen 96–100 %.
    pub fn initial(&mut self) -> VitalsReading {
        VitalsReading {
            heart_rate: self.rng.gen_range(70..=95),
            oxygen_saturation: self.rng.gen_range(96..=100),
        }
    }

    /// One step of the walk: heart rate ±2, oxygen ±1 one time in five.
    pub fn tick(&mut self, prev: VitalsReading) -> VitalsReading {
        let heart_delta = self.rng.gen_range(-2..=2);
        let oxygen_delta = if self.rng.gen_bool(OXYGEN_DRIFT_PROBABILITY) {
            if self.rng.gen_bool(0.5) {
                1
            } else {
                -1
            }
        } else {
            0
        };

        VitalsReading::clamped(
            prev.heart_rate + heart_delta,
            prev.oxygen_saturation + oxygen_delta,
        )
    }
}
