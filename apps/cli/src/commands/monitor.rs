//! Watch TKB traffic on a SocketCAN interface

use anyhow::Result;
use clap::Args;
use tkb_protocol::{FrameGroup, TkbFrame};

#[derive(Args, Debug)]
pub struct MonitorCommand {
    /// SocketCAN interface
    #[arg(short, long, default_value = "can0")]
    pub interface: String,

    /// Stop after this many seconds
    #[arg(short, long)]
    pub duration: Option<u64>,

    /// Only print frames from the board's status id
    #[arg(long)]
    pub status_only: bool,
}

impl MonitorCommand {
    fn wants(&self, frame: &TkbFrame) -> bool {
        if frame.is_extended {
            return false;
        }
        match FrameGroup::from_id(frame.id) {
            FrameGroup::Status => true,
            FrameGroup::Command => !self.status_only,
            FrameGroup::Unknown => false,
        }
    }

    #[cfg(target_os = "linux")]
    pub fn execute(&self) -> Result<()> {
        use super::decode::describe;
        use anyhow::Context;
        use std::sync::Arc;
        use std::sync::atomic::{AtomicBool, Ordering};
        use std::time::{Duration, Instant};
        use tkb_can::{CanAdapter, CanError, SocketCanAdapter};

        let running = Arc::new(AtomicBool::new(true));
        let r = running.clone();
        ctrlc::set_handler(move || {
            r.store(false, Ordering::SeqCst);
        })
        .context("installing Ctrl-C handler")?;

        let mut adapter = SocketCanAdapter::new(self.interface.as_str())
            .with_context(|| format!("opening {}", self.interface))?;
        let deadline = self.duration.map(|s| Instant::now() + Duration::from_secs(s));
        let started = Instant::now();
        let mut seen = 0u64;

        tracing::info!("monitoring {} (Ctrl-C to stop)", self.interface);
        while running.load(Ordering::SeqCst) {
            if deadline.is_some_and(|d| Instant::now() >= d) {
                break;
            }
            match adapter.receive_timeout(Duration::from_millis(200)) {
                Ok(frame) => {
                    if self.wants(&frame) {
                        seen += 1;
                        println!("{:>10.3} {}", started.elapsed().as_secs_f64(), describe(&frame));
                    }
                },
                Err(CanError::Timeout) => continue,
                Err(CanError::Device(e)) if e.is_fatal() => {
                    return Err(CanError::Device(e)).context("receive failed");
                },
                Err(e) => {
                    tracing::warn!("receive error: {}", e);
                },
            }
        }

        tracing::info!("{} frames", seen);
        Ok(())
    }

    #[cfg(not(target_os = "linux"))]
    pub fn execute(&self) -> Result<()> {
        anyhow::bail!("SocketCAN is only available on Linux")
    }
}
