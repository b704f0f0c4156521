//! Command freshness watchdog.
//!
//! Tracks when the last accepted command (kill or thrust) arrived. On every
//! periodic tick the board asks whether the stream has gone stale; a stale
//! check produces a `CommandTimeout` event.
//!
//! Times are monotonic durations since boot, supplied by the caller's clock.

use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchdogStatus {
    Fresh,
    Expired { elapsed: Duration },
}

#[derive(Debug, Clone)]
pub struct CommandWatchdog {
    last_update: Duration,
    timeout: Duration,
    ever_fed: bool,
}

impl CommandWatchdog {
    /// Start counting from `now` (boot counts as the first update).
    pub fn new(timeout: Duration, now: Duration) -> Self {
        Self {
            last_update: now,
            timeout,
            ever_fed: false,
        }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Record an accepted command.
    pub fn record(&mut self, now: Duration) {
        self.last_update = self.last_update.max(now);
        self.ever_fed = true;
    }

    pub fn elapsed(&self, now: Duration) -> Duration {
        now.saturating_sub(self.last_update)
    }

    /// Stale when strictly more than `timeout` has passed since the last update.
    pub fn check(&self, now: Duration) -> WatchdogStatus {
        let elapsed = self.elapsed(now);
        if elapsed > self.timeout {
            WatchdogStatus::Expired { elapsed }
        } else {
            WatchdogStatus::Fresh
        }
    }

    /// Age of the last command, `None` until one was recorded.
    pub fn last_command_age(&self, now: Duration) -> Option<Duration> {
        self.ever_fed.then(|| self.elapsed(now))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MS: Duration = Duration::from_millis(1);

    #[test]
    fn test_fresh_until_timeout_exceeded() {
        let watchdog = CommandWatchdog::new(1000 * MS, Duration::ZERO);
        assert_eq!(watchdog.check(999 * MS), WatchdogStatus::Fresh);
        assert_eq!(watchdog.check(1000 * MS), WatchdogStatus::Fresh);
        assert_eq!(
            watchdog.check(1001 * MS),
            WatchdogStatus::Expired { elapsed: 1001 * MS }
        );
    }

    #[test]
    fn test_record_resets_timer() {
        let mut watchdog = CommandWatchdog::new(100 * MS, Duration::ZERO);
        watchdog.record(80 * MS);
        assert_eq!(watchdog.check(150 * MS), WatchdogStatus::Fresh);
        assert!(matches!(watchdog.check(181 * MS), WatchdogStatus::Expired { .. }));
    }

    #[test]
    fn test_stays_expired_on_every_tick() {
        let watchdog = CommandWatchdog::new(100 * MS, Duration::ZERO);
        for tick in 2..6u32 {
            assert!(matches!(
                watchdog.check(tick * 100 * MS),
                WatchdogStatus::Expired { .. }
            ));
        }
    }

    #[test]
    fn test_time_never_runs_backwards() {
        let mut watchdog = CommandWatchdog::new(100 * MS, 50 * MS);
        watchdog.record(10 * MS);
        assert_eq!(watchdog.elapsed(60 * MS), 10 * MS);
        assert_eq!(watchdog.elapsed(Duration::ZERO), Duration::ZERO);
    }

    #[test]
    fn test_last_command_age() {
        let mut watchdog = CommandWatchdog::new(100 * MS, Duration::ZERO);
        assert_eq!(watchdog.last_command_age(40 * MS), None);
        watchdog.record(40 * MS);
        assert_eq!(watchdog.last_command_age(70 * MS), Some(30 * MS));
    }
}
