//! USB ↔ BLE request/response bridge.
//!
//! Relays request/response exchanges between two fixed ports, allowing
//! exactly one transaction in flight per direction:
//!
//! - **Router** (`router`) - per-direction transaction slots; forwards,
//!   correlates, or rejects each inbound frame.
//! - **Ports** (`port`) - the closed set of ports and the registry binding
//!   each one to a transport.
//! - **Transports** (`transport`) - the send capability the router talks
//!   to (channel-backed for real links, mock for tests).
//! - **Bridge** (`bridge`) - the single task that drains adapter inboxes
//!   and the periodic tick into the router.
//!
//! Everything here is `no_std` and allocation-free, and runs unchanged on
//! the host for testing: `cargo test`.

#![cfg_attr(not(test), no_std)]

// This mod MUST go first, so that the others see its macros.
pub(crate) mod fmt;

pub mod bridge;
pub mod config;
pub mod error;
pub mod msg;
pub mod port;
pub mod router;
pub mod transport;

pub use bridge::{Bridge, BridgeEvent, FrameKind, Inbound, Inbox, TickSignal};
pub use error::{Error, SendError};
pub use msg::Message;
pub use port::{Direction, Port, PortRegistry};
pub use router::{ResponseOutcome, Routed, Router, RouterStats, RxOutcome, Transaction};
pub use transport::{ChannelTransport, MockTransport, Outbox, Transport};
