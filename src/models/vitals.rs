use serde::{Deserialize, Serialize};

/// Heart rate bounds enforced on every simulated reading (bpm).
pub const HEART_RATE_FLOOR: i32 = 50;
pub const HEART_RATE_CEILING: i32 = 130;

/// Oxygen saturation bounds enforced on every simulated reading (%).
pub const OXYGEN_FLOOR: i32 = 90;
pub const OXYGEN_CEILING: i32 = 100;

/// Normal resting heart rate band; outside it the reading is abnormal.
pub const NORMAL_HEART_RATE_MIN: i32 = 60;
pub const NORMAL_HEART_RATE_MAX: i32 = 100;

/// Saturation below this is abnormal.
pub const NORMAL_OXYGEN_MIN: i32 = 95;

/// One heart-rate / oxygen sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VitalsReading {
    pub heart_rate: i32,
    pub oxygen_saturation: i32,
}

impl VitalsReading {
    /// Construct a reading with both values clamped into their simulation bounds.
    pub fn clamped(heart_rate: i32, oxygen_saturation: i32) -> Self {
        Self {
            heart_rate: heart_rate.clamp(HEART_RATE_FLOOR, HEART_RATE_CEILING),
            oxygen_saturation: oxygen_saturation.clamp(OXYGEN_FLOOR, OXYGEN_CEILING),
        }
    }

    pub fn is_abnormal(&self) -> bool {
        self.heart_rate < NORMAL_HEART_RATE_MIN
            || self.heart_rate > NORMAL_HEART_RATE_MAX
            || self.oxygen_saturation < NORMAL_OXYGEN_MIN
    }

    pub fn within_bounds(&self) -> bool {
        (HEART_RATE_FLOOR..=HEART_RATE_CEILING).contains(&self.heart_rate)
            && (OXYGEN_FLOOR..=OXYGEN_CEILING).contains(&self.oxygen_saturation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clamped_respects_bounds() {
        let r = VitalsReading::clamped(200, 50);
        assert_eq!(r.heart_rate, 130);
        assert_eq!(r.oxygen_saturation, 90);
        assert!(r.within_bounds());
    }

    #[test]
    fn abnormality_edges() {
        assert!(!VitalsReading::clamped(60, 95).is_abnormal());
        assert!(!VitalsReading::clamped(100, 100).is_abnormal());
        assert!(VitalsReading::clamped(59, 98).is_abnormal());
        assert!(VitalsReading::clamped(101, 98).is_abnormal());
        assert!(VitalsReading::clamped(80, 94).is_abnormal());
    }
}
