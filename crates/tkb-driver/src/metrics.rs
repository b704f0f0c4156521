//! Board counters.
//!
//! Plain atomic counters, readable from any thread without locking. Updated by
//! the board loop and by [`InterruptHandle`](crate::InterruptHandle) producers.

use std::sync::atomic::{AtomicU64, Ordering};

/// Live counters.
///
/// ```rust
/// use tkb_driver::BoardMetrics;
/// use std::sync::atomic::Ordering;
///
/// let metrics = BoardMetrics::new();
/// metrics.rx_frames_total.fetch_add(1, Ordering::Relaxed);
/// assert_eq!(metrics.snapshot().rx_frames_total, 1);
/// ```
#[derive(Debug, Default)]
pub struct BoardMetrics {
    /// Frames handed to the board, before filtering
    pub rx_frames_total: AtomicU64,
    /// Frames rejected by the acceptance filter
    pub rx_frames_filtered: AtomicU64,
    /// Kill and thrust commands accepted
    pub commands_accepted: AtomicU64,
    /// Frames in the command group with an unknown payload
    pub commands_unrecognized: AtomicU64,
    pub tx_frames_total: AtomicU64,
    pub tx_failures: AtomicU64,
    pub watchdog_timeouts: AtomicU64,
    /// Committed state changes
    pub transitions: AtomicU64,
    pub thrust_applied: AtomicU64,
    /// Non-safety events lost to a full queue
    pub events_dropped: AtomicU64,
    pub hall_edges: AtomicU64,
}

impl BoardMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn incr(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            rx_frames_total: self.rx_frames_total.load(Ordering::Relaxed),
            rx_frames_filtered: self.rx_frames_filtered.load(Ordering::Relaxed),
            commands_accepted: self.commands_accepted.load(Ordering::Relaxed),
            commands_unrecognized: self.commands_unrecognized.load(Ordering::Relaxed),
            tx_frames_total: self.tx_frames_total.load(Ordering::Relaxed),
            tx_failures: self.tx_failures.load(Ordering::Relaxed),
            watchdog_timeouts: self.watchdog_timeouts.load(Ordering::Relaxed),
            transitions: self.transitions.load(Ordering::Relaxed),
            thrust_applied: self.thrust_applied.load(Ordering::Relaxed),
            events_dropped: self.events_dropped.load(Ordering::Relaxed),
            hall_edges: self.hall_edges.load(Ordering::Relaxed),
        }
    }

    pub fn reset(&self) {
        for counter in [
            &self.rx_frames_total,
            &self.rx_frames_filtered,
            &self.commands_accepted,
            &self.commands_unrecognized,
            &self.tx_frames_total,
            &self.tx_failures,
            &self.watchdog_timeouts,
            &self.transitions,
            &self.thrust_applied,
            &self.events_dropped,
            &self.hall_edges,
        ] {
            counter.store(0, Ordering::Relaxed);
        }
    }
}

/// Point-in-time copy of [`BoardMetrics`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MetricsSnapshot {
    pub rx_frames_total: u64,
    pub rx_frames_filtered: u64,
    pub commands_accepted: u64,
    pub commands_unrecognized: u64,
    pub tx_frames_total: u64,
    pub tx_failures: u64,
    pub watchdog_timeouts: u64,
    pub transitions: u64,
    pub thrust_applied: u64,
    pub events_dropped: u64,
    pub hall_edges: u64,
}

impl MetricsSnapshot {
    /// Failed share of status transmits, in percent. 0.0 when nothing was sent.
    pub fn tx_failure_rate(&self) -> f64 {
        if self.tx_frames_total == 0 {
            return 0.0;
        }
        (self.tx_failures as f64 / self.tx_frames_total as f64) * 100.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_snapshot_and_reset() {
        let metrics = BoardMetrics::new();
        metrics.rx_frames_total.fetch_add(10, Ordering::Relaxed);
        BoardMetrics::incr(&metrics.transitions);
        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.rx_frames_total, 10);
        assert_eq!(snapshot.transitions, 1);

        metrics.reset();
        assert_eq!(metrics.snapshot(), MetricsSnapshot::default());
    }

    #[test]
    fn test_concurrent_updates() {
        let metrics = Arc::new(BoardMetrics::new());
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let m = metrics.clone();
                thread::spawn(move || {
                    for _ in 0..250 {
                        BoardMetrics::incr(&m.hall_edges);
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(metrics.snapshot().hall_edges, 1000);
    }

    #[test]
    fn test_tx_failure_rate() {
        let snapshot = MetricsSnapshot {
            tx_frames_total: 20,
            tx_failures: 5,
            ..Default::default()
        };
        assert_eq!(snapshot.tx_failure_rate(), 25.0);
        assert_eq!(MetricsSnapshot::default().tx_failure_rate(), 0.0);
    }
}
