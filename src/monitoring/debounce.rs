/// Fire-once-per-episode latch.
///
/// An episode is a contiguous run of active samples. The latch fires on the
/// first active sample and re-arms on the first inactive one, with no
/// cool-down.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlertDebouncer {
    armed: bool,
}

impl Default for AlertDebouncer {
    fn default() -> Self {
        Self::new()
    }
}

impl AlertDebouncer {
    pub fn new() -> Self {
        Self { armed: true }
    }

    pub fn is_armed(&self) -> bool {
        self.armed
    }

    /// Returns `true` when a notification should fire for this sample.
    pub fn evaluate(&mut self, condition_active: bool) -> bool {
        if !condition_active {
            self.armed = true;
            return false;
        }
        let fire = self.armed;
        self.armed = false;
        fire
    }

    pub fn reset(&mut self) {
        self.armed = true;
    }
}
