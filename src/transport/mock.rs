//! Mock transport for unit tests and host simulation.
//!
//! Records every accepted frame (the last `MOCK_LOG_DEPTH` are kept),
//! counts traffic, and can be told to fail the next `send`. In loopback
//! mode each accepted frame is also echoed into a bound [`Inbox`] as if the
//! peer had sent it back.

use core::cell::RefCell;

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::blocking_mutex::Mutex;
use heapless::Vec;

use super::Transport;
use crate::bridge::{FrameKind, Inbound, Inbox};
use crate::config::MOCK_LOG_DEPTH;
use crate::error::SendError;
use crate::msg::{self, Message};

/// Traffic counters.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct MockStats {
    /// Frames accepted.
    pub tx_frames: u32,
    /// Bytes accepted.
    pub tx_bytes: u32,
    /// Frames echoed back in loopback mode.
    pub rx_frames: u32,
    pub rx_bytes: u32,
    /// Sends that returned an error.
    pub failures: u32,
    /// Connected/disconnected transitions.
    pub connection_changes: u32,
}

struct MockState {
    connected: bool,
    loopback: bool,
    inject: Option<SendError>,
    sent: Vec<Message, MOCK_LOG_DEPTH>,
    stats: MockStats,
}

impl MockState {
    const fn new() -> Self {
        Self {
            connected: true,
            loopback: false,
            inject: None,
            sent: Vec::new(),
            stats: MockStats {
                tx_frames: 0,
                tx_bytes: 0,
                rx_frames: 0,
                rx_bytes: 0,
                failures: 0,
                connection_changes: 0,
            },
        }
    }
}

/// In-memory [`Transport`] with a send log and failure injection.
pub struct MockTransport<'a> {
    state: Mutex<CriticalSectionRawMutex, RefCell<MockState>>,
    loopback_inbox: Option<&'a Inbox>,
}

impl<'a> MockTransport<'a> {
    /// A connected mock with an empty log.
    pub const fn new() -> Self {
        Self {
            state: Mutex::new(RefCell::new(MockState::new())),
            loopback_inbox: None,
        }
    }

    /// A connected mock that can echo frames into `inbox` once
    /// [`set_loopback`](Self::set_loopback) turns loopback on.
    pub const fn with_loopback(inbox: &'a Inbox) -> Self {
        Self {
            state: Mutex::new(RefCell::new(MockState::new())),
            loopback_inbox: Some(inbox),
        }
    }

    /// Simulate connect/disconnect. A disconnected mock fails every send
    /// with [`SendError::NotConnected`].
    pub fn set_connected(&self, connected: bool) {
        self.state.lock(|s| {
            let mut s = s.borrow_mut();
            if s.connected != connected {
                s.connected = connected;
                s.stats.connection_changes += 1;
            }
        });
    }

    /// Echo accepted frames back as `Unclassified` inbound frames. Has no
    /// effect on a mock built without an inbox.
    pub fn set_loopback(&self, enabled: bool) {
        self.state.lock(|s| s.borrow_mut().loopback = enabled);
    }

    /// Make the next `send` fail with `error`.
    pub fn inject_failure(&self, error: SendError) {
        self.state.lock(|s| s.borrow_mut().inject = Some(error));
    }

    /// Forget recorded frames and counters. Connection and loopback
    /// settings are kept.
    pub fn reset(&self) {
        self.state.lock(|s| {
            let mut s = s.borrow_mut();
            s.inject = None;
            s.sent.clear();
            s.stats = MockStats::default();
        });
    }

    /// Most recently accepted frame.
    pub fn last_sent(&self) -> Option<Message> {
        self.state.lock(|s| s.borrow().sent.last().cloned())
    }

    /// Recorded frames, oldest first.
    pub fn sent(&self) -> Vec<Message, MOCK_LOG_DEPTH> {
        self.state.lock(|s| s.borrow().sent.clone())
    }

    /// Number of frames accepted since the last reset.
    pub fn send_count(&self) -> u32 {
        self.stats().tx_frames
    }

    pub fn stats(&self) -> MockStats {
        self.state.lock(|s| s.borrow().stats)
    }

    fn echo_back(&self, frame: Message) {
        let Some(inbox) = self.loopback_inbox else {
            return;
        };
        let len = frame.len() as u32;
        let inbound = Inbound {
            kind: FrameKind::Unclassified,
            data: frame,
        };
        if inbox.try_send(inbound).is_ok() {
            self.state.lock(|s| {
                let mut s = s.borrow_mut();
                s.stats.rx_frames += 1;
                s.stats.rx_bytes += len;
            });
        } else {
            warn!("mock loopback inbox full, echo dropped");
        }
    }
}

impl Default for MockTransport<'_> {
    fn default() -> Self {
        Self::new()
    }
}

impl Transport for MockTransport<'_> {
    fn send(&self, data: &[u8]) -> Result<(), SendError> {
        let echo = self.state.lock(|s| {
            let mut s = s.borrow_mut();

            let result = if let Some(error) = s.inject.take() {
                Err(error)
            } else if !s.connected {
                Err(SendError::NotConnected)
            } else {
                msg::copy_from(data).map_err(|_| SendError::PayloadTooLarge)
            };

            match result {
                Ok(frame) => {
                    if s.sent.is_full() {
                        s.sent.remove(0);
                    }
                    let echo = s.loopback.then(|| frame.clone());
                    let _ = s.sent.push(frame);
                    s.stats.tx_frames += 1;
                    s.stats.tx_bytes += data.len() as u32;
                    Ok(echo)
                }
                Err(error) => {
                    s.stats.failures += 1;
                    Err(error)
                }
            }
        })?;

        // Outside the state lock: the inbox has its own.
        if let Some(frame) = echo {
            self.echo_back(frame);
        }
        Ok(())
    }

    fn is_ready(&self) -> bool {
        self.state.lock(|s| s.borrow().connected)
    }
}
