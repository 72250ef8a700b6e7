//! Logical ports, directions and the port registry.
//!
//! The set of ports is closed and known at compile time. Every port is
//! bound to exactly one [`Transport`] when the registry is built; the
//! binding never changes afterwards.

use crate::error::SendError;
use crate::transport::Transport;

/// Number of logical ports.
pub const PORT_COUNT: usize = 2;

/// Number of directed (initiator, responder) pairs.
pub const DIRECTION_COUNT: usize = PORT_COUNT;

/// A logical port of the bridge.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Port {
    /// Upstream port (USB CDC link to the host).
    Usb,
    /// Downstream port (BLE link to the peripheral).
    Ble,
}

impl Port {
    /// All ports, in index order.
    pub const ALL: [Port; PORT_COUNT] = [Port::Usb, Port::Ble];

    /// Dense index used to address per-port tables.
    pub const fn index(self) -> usize {
        match self {
            Port::Usb => 0,
            Port::Ble => 1,
        }
    }

    /// The other port of the fixed pair.
    pub const fn peer(self) -> Port {
        match self {
            Port::Usb => Port::Ble,
            Port::Ble => Port::Usb,
        }
    }
}

/// An ordered (initiator, responder) pair - the unit of mutual exclusion.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Direction {
    pub initiator: Port,
    pub responder: Port,
}

impl Direction {
    pub const USB_TO_BLE: Direction = Direction::of_request(Port::Usb);
    pub const BLE_TO_USB: Direction = Direction::of_request(Port::Ble);

    /// All directions, in slot order.
    pub const ALL: [Direction; DIRECTION_COUNT] = [Direction::USB_TO_BLE, Direction::BLE_TO_USB];

    /// Direction opened by a request arriving at `from`.
    pub const fn of_request(from: Port) -> Self {
        Self {
            initiator: from,
            responder: from.peer(),
        }
    }

    /// Direction closed by a response arriving at `from`.
    ///
    /// Responses travel opposite to their request, so `from` is the
    /// responder.
    pub const fn closed_by_response(from: Port) -> Self {
        Self {
            initiator: from.peer(),
            responder: from,
        }
    }

    /// Slot index. With two ports the initiator alone identifies the
    /// direction.
    pub const fn index(self) -> usize {
        self.initiator.index()
    }
}

/// Maps each port to the transport that delivers frames on it.
///
/// Read-only after construction, so it can be shared by reference
/// between execution contexts.
pub struct PortRegistry<'a> {
    transports: [&'a dyn Transport; PORT_COUNT],
}

impl<'a> PortRegistry<'a> {
    /// Bind the USB and BLE transports.
    pub fn new(usb: &'a dyn Transport, ble: &'a dyn Transport) -> Self {
        Self {
            transports: [usb, ble],
        }
    }

    /// Deliver `data` on `port`. Whatever the transport reports is
    /// returned as-is; nothing is retried.
    pub fn send(&self, port: Port, data: &[u8]) -> Result<(), SendError> {
        self.transports[port.index()].send(data)
    }

    /// Whether the transport on `port` currently reports ready.
    pub fn is_ready(&self, port: Port) -> bool {
        self.transports[port.index()].is_ready()
    }
}
