//! Interrupt-to-loop event queue.
//!
//! Interrupt sources (timers, hall edges, the CAN receive path) only enqueue
//! [`BoardEvent`]s through an [`InterruptHandle`]; they never touch board state.
//! The board loop is the only consumer and sees events in arrival order.
//!
//! Producers never block. Safety events (kill and soft-kill frames, hall
//! edges, watchdog ticks) are always accepted. Everything else shares a budget
//! of `capacity` pending events; past it the new event is dropped and counted.

use crate::error::DriverError;
use crate::metrics::BoardMetrics;
use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, TryRecvError, unbounded};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tkb_protocol::{KillCommand, TkbFrame};
use tracing::trace;

#[derive(Debug, Clone, PartialEq)]
pub enum BoardEvent {
    /// Periodic command watchdog check
    WatchdogTick,
    /// Periodic status broadcast
    StatusTick,
    /// A hall input changed level
    HallEdge,
    /// A frame arrived from the bus
    CanFrame(TkbFrame),
}

impl BoardEvent {
    /// Events that can only move the board toward a safe state. They bypass
    /// the queue budget.
    pub fn is_safety(&self) -> bool {
        match self {
            BoardEvent::WatchdogTick | BoardEvent::HallEdge => true,
            BoardEvent::StatusTick => false,
            BoardEvent::CanFrame(frame) => {
                !frame.is_extended
                    && matches!(
                        KillCommand::from_payload(frame.data_slice()),
                        Ok(KillCommand::HardKill | KillCommand::SoftKill)
                    )
            },
        }
    }
}

/// Producer side, cloneable into every interrupt context.
#[derive(Debug, Clone)]
pub struct InterruptHandle {
    tx: Sender<BoardEvent>,
    /// Non-safety events sent but not yet received
    pending: Arc<AtomicUsize>,
    capacity: usize,
    metrics: Arc<BoardMetrics>,
}

impl InterruptHandle {
    /// Enqueue without blocking. Returns `false` if the event was dropped.
    pub fn post(&self, event: BoardEvent) -> bool {
        let budgeted = !event.is_safety();
        if budgeted && self.pending.fetch_add(1, Ordering::AcqRel) >= self.capacity {
            self.pending.fetch_sub(1, Ordering::AcqRel);
            BoardMetrics::incr(&self.metrics.events_dropped);
            trace!("Event queue full, dropped {:?}", event);
            return false;
        }
        if self.tx.send(event).is_err() {
            if budgeted {
                self.pending.fetch_sub(1, Ordering::AcqRel);
            }
            return false;
        }
        true
    }

    pub fn watchdog_tick(&self) -> bool {
        self.post(BoardEvent::WatchdogTick)
    }

    pub fn status_tick(&self) -> bool {
        self.post(BoardEvent::StatusTick)
    }

    pub fn hall_edge(&self) -> bool {
        self.post(BoardEvent::HallEdge)
    }

    pub fn can_frame(&self, frame: TkbFrame) -> bool {
        BoardMetrics::incr(&self.metrics.rx_frames_total);
        self.post(BoardEvent::CanFrame(frame))
    }
}

/// Consumer side, owned by the board loop.
#[derive(Debug)]
pub struct EventQueue {
    rx: Receiver<BoardEvent>,
    pending: Arc<AtomicUsize>,
}

impl EventQueue {
    fn received(&self, event: BoardEvent) -> BoardEvent {
        if !event.is_safety() {
            self.pending.fetch_sub(1, Ordering::AcqRel);
        }
        event
    }

    /// Next pending event, `Ok(None)` if the queue is empty.
    pub fn try_next(&self) -> Result<Option<BoardEvent>, DriverError> {
        match self.rx.try_recv() {
            Ok(event) => Ok(Some(self.received(event))),
            Err(TryRecvError::Empty) => Ok(None),
            Err(TryRecvError::Disconnected) => Err(DriverError::ChannelClosed),
        }
    }

    /// Block up to `timeout` for the next event.
    pub fn wait(&self, timeout: Duration) -> Result<Option<BoardEvent>, DriverError> {
        if timeout.is_zero() {
            return self.try_next();
        }
        match self.rx.recv_timeout(timeout) {
            Ok(event) => Ok(Some(self.received(event))),
            Err(RecvTimeoutError::Timeout) => Ok(None),
            Err(RecvTimeoutError::Disconnected) => Err(DriverError::ChannelClosed),
        }
    }

    pub fn len(&self) -> usize {
        self.rx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }
}

/// Queue holding at most `capacity` (at least one) non-safety events.
pub fn event_queue(capacity: usize, metrics: Arc<BoardMetrics>) -> (InterruptHandle, EventQueue) {
    let (tx, rx) = unbounded();
    let pending = Arc::new(AtomicUsize::new(0));
    let handle = InterruptHandle {
        tx,
        pending: pending.clone(),
        capacity: capacity.max(1),
        metrics,
    };
    (handle, EventQueue { rx, pending })
}
