use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct RequestStamp(u64);

/// Monotonic request counter: only the most recently issued stamp is current.
#[derive(Debug, Default)]
pub struct RequestSequence {
    latest: AtomicU64,
}

impl RequestSequence {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn issue(&self) -> RequestStamp {
        RequestStamp(self.latest.fetch_add(1, Ordering::SeqCst) + 1)
    }

    pub fn current(&self) -> RequestStamp {
        RequestStamp(self.latest.load(Ordering::SeqCst))
    }

    pub fn is_current(&self, stamp: RequestStamp) -> bool {
        self.current() == stamp
    }

    /// Makes every stamp issued so far stale.
    pub fn invalidate(&self) {
        self.latest.fetch_add(1, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_the_latest_stamp_is_current() {
        let sequence = RequestSequence::new();
        let first = sequence.issue();
        let second = sequence.issue();

        assert!(first < second);
        assert!(!sequence.is_current(first));
        assert!(sequence.is_current(second));
    }

    #[test]
    fn invalidate_stales_in_flight_stamps() {
        let sequence = RequestSequence::new();
        let stamp = sequence.issue();
        sequence.invalidate();

        assert!(!sequence.is_current(stamp));
        assert!(sequence.is_current(sequence.issue()));
    }
}
