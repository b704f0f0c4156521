//! In-memory CAN adapter for tests and the bench simulator.
//!
//! Clones share the same bus: one clone can be handed to the board as its
//! transmit side while the test keeps another to inject frames and inspect
//! what was sent.

use crate::{CanAdapter, CanError, TkbFrame};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Default)]
struct MockBus {
    /// Frames waiting to be received
    rx_queue: VecDeque<TkbFrame>,
    /// Every frame successfully sent, in order
    sent: Vec<TkbFrame>,
    /// Number of upcoming sends that fail with `BusOff`
    failing_sends: usize,
    /// All sends fail while set
    offline: bool,
    failed_send_count: u64,
}

#[derive(Debug, Clone, Default)]
pub struct MockCanAdapter {
    bus: Arc<Mutex<MockBus>>,
    receive_timeout: Duration,
}

impl MockCanAdapter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a frame for the next `receive`.
    pub fn inject(&self, frame: TkbFrame) {
        self.bus.lock().rx_queue.push_back(frame);
    }

    /// Snapshot of every frame sent so far.
    pub fn sent_frames(&self) -> Vec<TkbFrame> {
        self.bus.lock().sent.clone()
    }

    /// Drain and return the frames sent so far.
    pub fn take_sent(&self) -> Vec<TkbFrame> {
        std::mem::take(&mut self.bus.lock().sent)
    }

    /// Payloads of the frames sent so far.
    pub fn sent_payloads(&self) -> Vec<Vec<u8>> {
        self.bus.lock().sent.iter().map(|f| f.data_slice().to_vec()).collect()
    }

    /// Make the next `count` sends fail.
    pub fn fail_next_sends(&self, count: usize) {
        self.bus.lock().failing_sends = count;
    }

    /// Fail every send until cleared.
    pub fn set_offline(&self, offline: bool) {
        self.bus.lock().offline = offline;
    }

    pub fn failed_send_count(&self) -> u64 {
        self.bus.lock().failed_send_count
    }

    pub fn pending_rx(&self) -> usize {
        self.bus.lock().rx_queue.len()
    }
}

impl CanAdapter for MockCanAdapter {
    fn send(&mut self, frame: TkbFrame) -> Result<(), CanError> {
        let mut bus = self.bus.lock();
        if bus.offline {
            bus.failed_send_count += 1;
            return Err(CanError::BusOff);
        }
        if bus.failing_sends > 0 {
            bus.failing_sends -= 1;
            bus.failed_send_count += 1;
            return Err(CanError::BusOff);
        }
        bus.sent.push(frame);
        Ok(())
    }

    fn receive(&mut self) -> Result<TkbFrame, CanError> {
        match self.bus.lock().rx_queue.pop_front() {
            Some(frame) => Ok(frame),
            None => {
                // Keep a blocking reader thread from spinning
                if !self.receive_timeout.is_zero() {
                    std::thread::sleep(self.receive_timeout);
                }
                Err(CanError::Timeout)
            },
        }
    }

    fn set_receive_timeout(&mut self, timeout: Duration) {
        self.receive_timeout = timeout;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clones_share_the_bus() {
        let mut board_side = MockCanAdapter::new();
        let bench_side = board_side.clone();

        CanAdapter::send(&mut board_side, TkbFrame::new_standard(0x110, b"KRHA\0")).unwrap();
        assert_eq!(bench_side.sent_payloads(), vec![b"KRHA\0".to_vec()]);

        bench_side.inject(TkbFrame::new_standard(0x100, b"KCHU\0"));
        let frame = CanAdapter::receive(&mut board_side).unwrap();
        assert_eq!(frame.data_slice(), b"KCHU\0");
    }

    #[test]
    fn test_receive_empty_times_out() {
        let mut adapter = MockCanAdapter::new();
        assert!(matches!(CanAdapter::receive(&mut adapter), Err(CanError::Timeout)));
        assert!(matches!(adapter.try_receive(), Ok(None)));
    }

    #[test]
    fn test_fail_next_sends() {
        let mut adapter = MockCanAdapter::new();
        adapter.fail_next_sends(1);
        let frame = TkbFrame::new_standard(0x110, b"GA\0");
        assert!(matches!(CanAdapter::send(&mut adapter, frame), Err(CanError::BusOff)));
        assert!(CanAdapter::send(&mut adapter, frame).is_ok());
        assert_eq!(adapter.failed_send_count(), 1);
        assert_eq!(adapter.take_sent().len(), 1);
        assert!(adapter.sent_frames().is_empty());
    }

    #[test]
    fn test_offline_drops_everything() {
        let mut adapter = MockCanAdapter::new();
        adapter.set_offline(true);
        for _ in 0..3 {
            assert!(CanAdapter::send(&mut adapter, TkbFrame::new_standard(0x110, b"GU\0")).is_err());
        }
        adapter.set_offline(false);
        assert!(CanAdapter::send(&mut adapter, TkbFrame::new_standard(0x110, b"GU\0")).is_ok());
        assert_eq!(adapter.failed_send_count(), 3);
    }
}
