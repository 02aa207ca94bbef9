use std::collections::HashMap;

use crate::models::RequestKind;

/// Generation token for one issued request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RequestTicket {
    pub kind: RequestKind,
    pub seq: u64,
}

/// Latest issued sequence number per request kind. A completion is applied
/// only if its ticket is still the latest for its kind.
#[derive(Debug, Default)]
pub struct RequestTracker {
    latest: HashMap<RequestKind, u64>,
}

impl RequestTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn issue(&mut self, kind: RequestKind) -> RequestTicket {
        let seq = self.latest.entry(kind).or_insert(0);
        *seq += 1;
        RequestTicket { kind, seq: *seq }
    }

    pub fn is_current(&self, ticket: &RequestTicket) -> bool {
        self.latest.get(&ticket.kind) == Some(&ticket.seq)
    }

    /// Make any in-flight request of `kind` stale.
    pub fn invalidate(&mut self, kind: RequestKind) {
        *self.latest.entry(kind).or_insert(0) += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn newest_ticket_wins() {
        let mut tracker = RequestTracker::new();
        let first = tracker.issue(RequestKind::HospitalSearch);
        let second = tracker.issue(RequestKind::HospitalSearch);
        assert!(!tracker.is_current(&first));
        assert!(tracker.is_current(&second));
    }

    #[test]
    fn kinds_are_independent() {
        let mut tracker = RequestTracker::new();
        let search = tracker.issue(RequestKind::HospitalSearch);
        let aid = tracker.issue(RequestKind::FinancialAid);
        assert!(tracker.is_current(&search));
        assert!(tracker.is_current(&aid));
    }

    #[test]
    fn invalidate_stales_pending() {
        let mut tracker = RequestTracker::new();
        let ticket = tracker.issue(RequestKind::Analysis);
        tracker.invalidate(RequestKind::Analysis);
        assert!(!tracker.is_current(&ticket));
        let next = tracker.issue(RequestKind::Analysis);
        assert!(tracker.is_current(&next));
    }

    #[test]
    fn unissued_ticket_is_not_current() {
        let tracker = RequestTracker::new();
        let forged = RequestTicket {
            kind: RequestKind::Chat,
            seq: 1,
        };
        assert!(!tracker.is_current(&forged));
    }
}
