//! # TKB CAN Adapter Layer
//!
//! Hardware abstraction over the CAN bus. The board core only needs to send
//! frames ([`TxAdapter`]); the receive side ([`RxAdapter`]) feeds the board's
//! event queue from an interrupt or a reader thread.

use std::time::Duration;
use thiserror::Error;

pub use tkb_protocol::TkbFrame;

#[cfg(target_os = "linux")]
pub mod socketcan;

#[cfg(target_os = "linux")]
pub use socketcan::SocketCanAdapter;

#[cfg(any(test, feature = "mock"))]
pub mod mock;

#[cfg(any(test, feature = "mock"))]
pub use mock::MockCanAdapter;

/// Errors of the CAN adapter layer.
#[derive(Error, Debug)]
pub enum CanError {
    #[error("IO Error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Device Error: {0}")]
    Device(#[from] CanDeviceError),
    #[error("Read timeout")]
    Timeout,
    #[error("Bus off")]
    BusOff,
}

/// Structured classification of device/backend errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CanDeviceErrorKind {
    Unknown,
    NotFound,
    AccessDenied,
    InvalidFrame,
    Backend,
}

#[derive(Error, Debug, Clone)]
#[error("{kind:?}: {message}")]
pub struct CanDeviceError {
    pub kind: CanDeviceErrorKind,
    pub message: String,
}

impl CanDeviceError {
    pub fn new(kind: CanDeviceErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// Errors after which retrying on the same interface is pointless.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self.kind,
            CanDeviceErrorKind::NotFound | CanDeviceErrorKind::AccessDenied
        )
    }
}

impl From<String> for CanDeviceError {
    fn from(message: String) -> Self {
        Self::new(CanDeviceErrorKind::Unknown, message)
    }
}

impl From<&str> for CanDeviceError {
    fn from(message: &str) -> Self {
        Self::new(CanDeviceErrorKind::Unknown, message)
    }
}

/// Bidirectional CAN adapter.
pub trait CanAdapter {
    fn send(&mut self, frame: TkbFrame) -> Result<(), CanError>;

    /// Block until a data frame arrives or the receive timeout elapses
    /// (`CanError::Timeout`).
    fn receive(&mut self) -> Result<TkbFrame, CanError>;

    fn set_receive_timeout(&mut self, _timeout: Duration) {}

    fn receive_timeout(&mut self, timeout: Duration) -> Result<TkbFrame, CanError> {
        self.set_receive_timeout(timeout);
        self.receive()
    }

    /// Non-blocking receive: `Ok(None)` when nothing is pending.
    fn try_receive(&mut self) -> Result<Option<TkbFrame>, CanError> {
        match self.receive_timeout(Duration::ZERO) {
            Ok(frame) => Ok(Some(frame)),
            Err(CanError::Timeout) => Ok(None),
            Err(e) => Err(e),
        }
    }
}

/// Receive half, owned by whatever feeds the board's event queue.
pub trait RxAdapter {
    fn receive(&mut self) -> Result<TkbFrame, CanError>;
}

/// Transmit half, owned by the board main loop.
pub trait TxAdapter {
    fn send(&mut self, frame: TkbFrame) -> Result<(), CanError>;
}

impl<T: CanAdapter> RxAdapter for T {
    fn receive(&mut self) -> Result<TkbFrame, CanError> {
        CanAdapter::receive(self)
    }
}

impl<T: CanAdapter> TxAdapter for T {
    fn send(&mut self, frame: TkbFrame) -> Result<(), CanError> {
        CanAdapter::send(self, frame)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;

    struct LoopbackAdapter {
        queue: VecDeque<TkbFrame>,
        timeout: Duration,
    }

    impl CanAdapter for LoopbackAdapter {
        fn send(&mut self, frame: TkbFrame) -> Result<(), CanError> {
            self.queue.push_back(frame);
            Ok(())
        }

        fn receive(&mut self) -> Result<TkbFrame, CanError> {
            self.queue.pop_front().ok_or(CanError::Timeout)
        }

        fn set_receive_timeout(&mut self, timeout: Duration) {
            self.timeout = timeout;
        }
    }

    fn loopback() -> LoopbackAdapter {
        LoopbackAdapter {
            queue: VecDeque::new(),
            timeout: Duration::from_millis(2),
        }
    }

    #[test]
    fn test_try_receive_maps_timeout_to_none() {
        let mut adapter = loopback();
        assert!(matches!(adapter.try_receive(), Ok(None)));
        assert_eq!(adapter.timeout, Duration::ZERO);
    }

    #[test]
    fn test_split_traits_forward_to_adapter() {
        let mut adapter = loopback();
        let frame = TkbFrame::new_standard(0x110, b"GA\0");
        TxAdapter::send(&mut adapter, frame).unwrap();
        let received = RxAdapter::receive(&mut adapter).unwrap();
        assert_eq!(received, frame);
    }

    #[test]
    fn test_tx_adapter_is_object_safe() {
        let mut adapter = loopback();
        let tx: &mut dyn TxAdapter = &mut adapter;
        tx.send(TkbFrame::new_standard(0x110, b"KRSA\0")).unwrap();
        assert_eq!(adapter.queue.len(), 1);
    }

    #[test]
    fn test_device_error_display_and_fatal() {
        let err = CanDeviceError::new(CanDeviceErrorKind::NotFound, "no such interface");
        assert!(err.is_fatal());
        assert_eq!(err.to_string(), "NotFound: no such interface");
        for kind in [CanDeviceErrorKind::InvalidFrame, CanDeviceErrorKind::Backend] {
            assert!(!CanDeviceError::new(kind, "retry").is_fatal());
        }
        let err: CanDeviceError = "boom".into();
        assert!(!err.is_fatal());
        let can_err: CanError = err.into();
        assert_eq!(can_err.to_string(), "Device Error: Unknown: boom");
    }
}
