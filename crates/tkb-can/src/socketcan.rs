//! SocketCAN adapter (Linux only).
//!
//! Used by the bench tooling to talk to a real or virtual (`vcan0`) bus. Error
//! frames are filtered out of the receive path; bus-off is surfaced as
//! `CanError::BusOff`.

use crate::{CanAdapter, CanDeviceError, CanDeviceErrorKind, CanError, TkbFrame};
use socketcan::{
    BlockingCan, CanError as SocketCanError, CanErrorFrame, CanFrame, CanSocket, EmbeddedFrame,
    ExtendedId, Frame, Socket, StandardId,
};
use std::convert::TryFrom;
use std::io::ErrorKind;
use std::time::Duration;
use tracing::{error, trace, warn};

/// Default receive timeout, short enough for reader threads to notice shutdown.
const DEFAULT_READ_TIMEOUT: Duration = Duration::from_millis(2);

pub struct SocketCanAdapter {
    socket: CanSocket,
    interface: String,
    read_timeout: Duration,
}

impl SocketCanAdapter {
    /// Open a SocketCAN interface (`can0`, `vcan0`, ...). The interface must
    /// already be up.
    ///
    /// ```no_run
    /// use tkb_can::SocketCanAdapter;
    ///
    /// let adapter = SocketCanAdapter::new("vcan0").unwrap();
    /// ```
    pub fn new(interface: impl Into<String>) -> Result<Self, CanError> {
        let interface = interface.into();

        let socket = CanSocket::open(&interface).map_err(|e| {
            let kind = match e.kind() {
                ErrorKind::NotFound => CanDeviceErrorKind::NotFound,
                ErrorKind::PermissionDenied => CanDeviceErrorKind::AccessDenied,
                _ => CanDeviceErrorKind::Backend,
            };
            CanError::Device(CanDeviceError::new(
                kind,
                format!("Failed to open CAN interface '{}': {}", interface, e),
            ))
        })?;

        socket.set_read_timeout(DEFAULT_READ_TIMEOUT).map_err(CanError::Io)?;
        trace!("SocketCAN interface '{}' opened", interface);

        Ok(Self {
            socket,
            interface,
            read_timeout: DEFAULT_READ_TIMEOUT,
        })
    }

    pub fn interface(&self) -> &str {
        &self.interface
    }

    pub fn read_timeout(&self) -> Duration {
        self.read_timeout
    }

    pub fn set_read_timeout(&mut self, timeout: Duration) -> Result<(), CanError> {
        // A zero SO_RCVTIMEO means "block forever"; use the smallest real timeout instead
        let effective = timeout.max(Duration::from_micros(1));
        self.socket.set_read_timeout(effective).map_err(CanError::Io)?;
        self.read_timeout = timeout;
        Ok(())
    }

    /// Read until a data frame arrives. Error and remote frames are skipped,
    /// bus-off aborts.
    fn read_data_frame(&mut self) -> Result<CanFrame, CanError> {
        loop {
            let can_frame = self.socket.read_frame().map_err(|e| match e.kind() {
                ErrorKind::WouldBlock | ErrorKind::TimedOut => CanError::Timeout,
                _ => CanError::Io(e),
            })?;

            if can_frame.is_error_frame() {
                match CanErrorFrame::try_from(can_frame) {
                    Ok(error_frame) => match SocketCanError::from(error_frame) {
                        SocketCanError::BusOff => {
                            error!("CAN Bus Off error detected on '{}'", self.interface);
                            return Err(CanError::BusOff);
                        },
                        other => warn!("CAN Error Frame received: {}, ignoring", other),
                    },
                    Err(_) => warn!("Received CAN error frame but failed to parse, ignoring"),
                }
                continue;
            }

            if can_frame.is_remote_frame() {
                trace!("Ignoring remote frame ID=0x{:X}", can_frame.raw_id());
                continue;
            }

            return Ok(can_frame);
        }
    }
}

fn to_tkb_frame(can_frame: &CanFrame) -> TkbFrame {
    let mut data = [0u8; 8];
    let frame_data = can_frame.data();
    let len = frame_data.len().min(8);
    data[..len].copy_from_slice(&frame_data[..len]);

    TkbFrame {
        id: can_frame.raw_id(),
        data,
        len: len as u8,
        is_extended: can_frame.is_extended(),
        timestamp_us: 0,
    }
}

impl CanAdapter for SocketCanAdapter {
    fn send(&mut self, frame: TkbFrame) -> Result<(), CanError> {
        let payload = frame.data_slice();
        let can_frame = if frame.is_extended {
            ExtendedId::new(frame.id).and_then(|id| CanFrame::new(id, payload))
        } else {
            StandardId::new(frame.id as u16).and_then(|id| CanFrame::new(id, payload))
        }
        .ok_or_else(|| {
            CanError::Device(CanDeviceError::new(
                CanDeviceErrorKind::InvalidFrame,
                format!("Failed to create frame with ID 0x{:X}", frame.id),
            ))
        })?;

        self.socket.transmit(&can_frame).map_err(|e| {
            CanError::Io(std::io::Error::other(format!(
                "SocketCAN transmit error: {}",
                e
            )))
        })?;

        trace!("Sent CAN frame: ID=0x{:X}, len={}", frame.id, frame.len);
        Ok(())
    }

    fn receive(&mut self) -> Result<TkbFrame, CanError> {
        let can_frame = self.read_data_frame()?;
        let frame = to_tkb_frame(&can_frame);
        trace!("Received CAN frame: ID=0x{:X}, len={}", frame.id, frame.len);
        Ok(frame)
    }

    fn set_receive_timeout(&mut self, timeout: Duration) {
        if let Err(e) = self.set_read_timeout(timeout) {
            warn!("Failed to set receive timeout: {}", e);
        }
    }

    fn receive_timeout(&mut self, timeout: Duration) -> Result<TkbFrame, CanError> {
        let old_timeout = self.read_timeout;
        self.set_read_timeout(timeout)?;
        let result = CanAdapter::receive(self);
        let _ = self.set_read_timeout(old_timeout);
        result
    }

    fn try_receive(&mut self) -> Result<Option<TkbFrame>, CanError> {
        self.socket.set_nonblocking(true).map_err(CanError::Io)?;
        let result = CanAdapter::receive(self);
        if let Err(e) = self.socket.set_nonblocking(false) {
            warn!("Failed to restore blocking mode on '{}': {}", self.interface, e);
        }
        match result {
            Ok(frame) => Ok(Some(frame)),
            Err(CanError::Timeout) => Ok(None),
            Err(e) => Err(e),
        }
    }
}
