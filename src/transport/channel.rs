//! Channel-backed transport.
//!
//! `send` copies the frame into a bounded outbox channel; the transport
//! task owning the physical link drains it. A full outbox means the link
//! is still busy with earlier frames and is reported as
//! [`SendError::Busy`], never waited on.

use core::sync::atomic::{AtomicBool, Ordering};

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::{Channel, TrySendError};

use super::Transport;
use crate::config::OUTBOX_DEPTH;
use crate::error::SendError;
use crate::msg::{self, Message};

/// Outbound queue of one port.
pub type Outbox = Channel<CriticalSectionRawMutex, Message, OUTBOX_DEPTH>;

pub struct ChannelTransport<'a> {
    outbox: &'a Outbox,
    connected: AtomicBool,
}

impl<'a> ChannelTransport<'a> {
    /// Create a transport over `outbox`, initially disconnected.
    pub const fn new(outbox: &'a Outbox) -> Self {
        Self {
            outbox,
            connected: AtomicBool::new(false),
        }
    }

    /// Update link state. Called by the transport task on
    /// connect/disconnect (USB configured, BLE link up/down).
    pub fn set_connected(&self, connected: bool) {
        let was = self.connected.swap(connected, Ordering::AcqRel);
        if was != connected {
            info!("transport connected={}", connected);
        }
        if !connected {
            // Frames queued for a dead link would be delivered to the next peer.
            self.outbox.clear();
        }
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Acquire)
    }
}

impl Transport for ChannelTransport<'_> {
    fn send(&self, data: &[u8]) -> Result<(), SendError> {
        if !self.is_connected() {
            return Err(SendError::NotConnected);
        }

        let frame: Message = msg::copy_from(data).map_err(|_| SendError::PayloadTooLarge)?;

        match self.outbox.try_send(frame) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(_)) => {
                debug!("outbox full, dropping {} byte frame", data.len());
                Err(SendError::Busy)
            }
        }
    }

    fn is_ready(&self) -> bool {
        self.is_connected() && !self.outbox.is_full()
    }
}
