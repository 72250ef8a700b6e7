//! Unified error types for dongle-bridge.
//!
//! We avoid `alloc` - all error variants carry only fixed-size data.
//! Implements `defmt::Format` (with the `defmt` feature) for efficient
//! on-target logging.

use crate::port::Port;

/// Top-level error type returned by the router.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error {
    /// Payload longer than `MSG_MAX_LEN`; rejected before any state change.
    PayloadTooLarge {
        /// Length of the offending buffer.
        len: usize,
    },

    /// The transport bound to `port` refused or failed the send.
    Send { port: Port, error: SendError },
}

/// Errors reported by a transport adapter's `send`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SendError {
    /// Link not connected or not configured by the peer/host.
    NotConnected,
    /// A previous transmission is still in progress.
    Busy,
    /// Payload exceeds `MSG_MAX_LEN`.
    PayloadTooLarge,
    /// Generic I/O failure in the underlying stack.
    Io,
}

impl core::fmt::Display for SendError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            SendError::NotConnected => f.write_str("not connected"),
            SendError::Busy => f.write_str("transmission already in progress"),
            SendError::PayloadTooLarge => f.write_str("payload too large"),
            SendError::Io => f.write_str("i/o failure"),
        }
    }
}

impl core::fmt::Display for Error {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Error::PayloadTooLarge { len } => write!(
                f,
                "payload of {} bytes exceeds {}",
                len,
                crate::config::MSG_MAX_LEN
            ),
            Error::Send { port, error } => write!(f, "send to {:?} failed: {}", port, error),
        }
    }
}

impl core::error::Error for SendError {}
impl core::error::Error for Error {}
