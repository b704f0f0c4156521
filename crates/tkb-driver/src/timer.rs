//! Periodic tick sources.
//!
//! A host stand-in for the board's hardware timers: each [`PeriodicTimer`] runs
//! a thread that invokes its callback once per period. Callbacks are expected to
//! do nothing but post to an [`InterruptHandle`].

use crate::config::TimingConfig;
use crate::events::InterruptHandle;
use std::io;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::trace;

/// Longest single sleep, bounds the time `stop` waits for the thread.
const MAX_SLEEP_SLICE: Duration = Duration::from_millis(10);

pub struct PeriodicTimer {
    name: String,
    period: Duration,
    running: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl PeriodicTimer {
    /// Spawn a timer thread. The first tick fires one `period` after start.
    pub fn start<F>(name: &str, period: Duration, mut tick: F) -> io::Result<Self>
    where
        F: FnMut() + Send + 'static,
    {
        let period = period.max(Duration::from_millis(1));
        let running = Arc::new(AtomicBool::new(true));
        let flag = running.clone();

        let handle = thread::Builder::new()
            .name(format!("tkb-{}", name))
            .spawn(move || {
                let mut deadline = Instant::now() + period;
                while flag.load(Ordering::Acquire) {
                    let now = Instant::now();
                    if now >= deadline {
                        tick();
                        deadline += period;
                        // fell behind by more than a period: skip missed ticks
                        if deadline < now {
                            deadline = now + period;
                        }
                        continue;
                    }
                    spin_sleep::sleep((deadline - now).min(MAX_SLEEP_SLICE));
                }
            })?;

        trace!("Timer {} started ({:?})", name, period);
        Ok(Self {
            name: name.to_string(),
            period,
            running,
            handle: Some(handle),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Stop and join the thread. Idempotent.
    pub fn stop(&mut self) {
        self.running.store(false, Ordering::Release);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
            trace!("Timer {} stopped", self.name);
        }
    }
}

impl Drop for PeriodicTimer {
    fn drop(&mut self) {
        self.stop();
    }
}

/// The board's two periodic sources: watchdog check and status refresh.
pub struct BoardTimers {
    pub watchdog: PeriodicTimer,
    pub status: PeriodicTimer,
}

impl BoardTimers {
    pub fn start(handle: &InterruptHandle, timing: &TimingConfig) -> io::Result<Self> {
        let watchdog_handle = handle.clone();
        let watchdog = PeriodicTimer::start("watchdog", timing.watchdog_period(), move || {
            watchdog_handle.watchdog_tick();
        })?;
        let status_handle = handle.clone();
        let status = PeriodicTimer::start("status", timing.status_period(), move || {
            status_handle.status_tick();
        })?;
        Ok(Self { watchdog, status })
    }

    pub fn stop(&mut self) {
        self.watchdog.stop();
        self.status.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{BoardEvent, event_queue};
    use crate::metrics::BoardMetrics;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn test_timer_ticks_until_stopped() {
        let count = Arc::new(AtomicUsize::new(0));
        let counter = count.clone();
        let mut timer = PeriodicTimer::start("test", Duration::from_millis(5), move || {
            counter.fetch_add(1, Ordering::Relaxed);
        })
        .unwrap();
        thread::sleep(Duration::from_millis(60));
        timer.stop();
        assert!(!timer.is_running());

        let ticks = count.load(Ordering::Relaxed);
        assert!(ticks >= 3, "expected several ticks, got {}", ticks);
        thread::sleep(Duration::from_millis(20));
        assert_eq!(count.load(Ordering::Relaxed), ticks);
    }

    #[test]
    fn test_board_timers_post_ticks() {
        let (handle, queue) = event_queue(64, Arc::new(BoardMetrics::new()));
        let timing = TimingConfig {
            watchdog_period_ms: 5,
            status_period_ms: 5,
            ..TimingConfig::default()
        };
        let mut timers = BoardTimers::start(&handle, &timing).unwrap();
        thread::sleep(Duration::from_millis(40));
        timers.stop();

        let mut events = Vec::new();
        while let Some(event) = queue.try_next().unwrap() {
            events.push(event);
        }
        assert!(events.contains(&BoardEvent::WatchdogTick));
        assert!(events.contains(&BoardEvent::StatusTick));
    }
}
