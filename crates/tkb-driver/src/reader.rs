//! CAN receive pump.
//!
//! Stands in for the CAN receive interrupt: a thread blocks on the adapter and
//! posts every data frame to the board's event queue.

use crate::events::InterruptHandle;
use std::io;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tkb_can::{CanAdapter, CanError};
use tracing::{error, trace, warn};

/// Back-off after a bus error before reading again.
const ERROR_BACKOFF: Duration = Duration::from_millis(100);

pub struct CanReader {
    running: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl CanReader {
    /// Start reading. `receive_timeout` bounds how long `stop` may wait.
    pub fn start<A>(mut adapter: A, events: InterruptHandle, receive_timeout: Duration) -> io::Result<Self>
    where
        A: CanAdapter + Send + 'static,
    {
        let running = Arc::new(AtomicBool::new(true));
        let flag = running.clone();
        adapter.set_receive_timeout(receive_timeout);

        let handle = thread::Builder::new()
            .name("tkb-can-rx".to_string())
            .spawn(move || {
                while flag.load(Ordering::Acquire) {
                    match adapter.receive() {
                        Ok(frame) => {
                            trace!("RX 0x{:03X} {:02X?}", frame.id, frame.data_slice());
                            events.can_frame(frame);
                        },
                        Err(CanError::Timeout) => continue,
                        Err(CanError::Device(e)) if e.is_fatal() => {
                            error!("CAN receive stopped: {}", e);
                            flag.store(false, Ordering::Release);
                        },
                        Err(e) => {
                            warn!("CAN receive error: {}", e);
                            thread::sleep(ERROR_BACKOFF);
                        },
                    }
                }
            })?;

        Ok(Self {
            running,
            handle: Some(handle),
        })
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    pub fn stop(&mut self) {
        self.running.store(false, Ordering::Release);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for CanReader {
    fn drop(&mut self) {
        self.stop();
    }
}
