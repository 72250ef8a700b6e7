//! Transport adapters - the uniform "send bytes on this port" capability.
//!
//! The router never sees a concrete adapter type, only [`Transport`].
//! Adapters bundled with the crate:
//!
//! - **Channel** - hands frames to a transport task (USB CDC, BLE link)
//!   over a bounded Embassy channel.
//! - **Mock** - records frames, injects failures and can loop frames back
//!   into an inbox, for tests and host-side simulation.

pub mod channel;
pub mod mock;

pub use channel::{ChannelTransport, Outbox};
pub use mock::{MockStats, MockTransport};

use crate::error::SendError;

/// Send side of a transport adapter.
///
/// `send` must not block on the remote peer: it either accepts the frame
/// or reports why it could not. Implementations are shared between
/// execution contexts, hence `Sync`.
pub trait Transport: Sync {
    /// Accept `data` for transmission.
    fn send(&self, data: &[u8]) -> Result<(), SendError>;

    /// Whether a `send` issued now is expected to succeed.
    fn is_ready(&self) -> bool {
        true
    }
}
