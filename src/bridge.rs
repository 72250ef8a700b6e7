//! Bridge task - funnels every adapter's inbound frames into the router.
//!
//! Each adapter owns a bounded [`Inbox`] and pushes frames into it from
//! whatever context it runs in (interrupt, USB task, BLE task). A single
//! task drains the inboxes and the periodic tick signal, so the router
//! sees calls in arrival order per port and never re-enters itself.
//!
//! Sources take turns: each step starts looking at the source after the one
//! that started the previous step, so a flooded inbox cannot starve the
//! other inbox or the tick.
//!
//! ```text
//!   USB task ──► usb Inbox ──┐
//!                            ├──► Bridge::step ──► Router ──► PortRegistry
//!   BLE task ──► ble Inbox ──┤
//!   Ticker   ──► TickSignal ─┘
//! ```

use core::cell::Cell;

use embassy_futures::select::{select3, Either3};
use embassy_sync::blocking_mutex::raw::{CriticalSectionRawMutex, RawMutex};
use embassy_sync::channel::Channel;
use embassy_sync::signal::Signal;

use crate::config::INBOX_DEPTH;
use crate::error::Error;
use crate::msg::{self, Message};
use crate::port::Port;
use crate::router::{Routed, Router};

/// How the adapter classified a frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum FrameKind {
    /// A new request from the peer on this port.
    Request,
    /// A response to a request previously forwarded to this port.
    Response,
    /// The transport carries no request/response marker; the router
    /// classifies it from transaction state.
    Unclassified,
}

/// One frame waiting in an adapter's inbox.
#[derive(Clone, Debug)]
pub struct Inbound {
    pub kind: FrameKind,
    pub data: Message,
}

impl Inbound {
    /// Copy `data` into an inbound frame. Oversize frames are refused here,
    /// before they reach the router.
    pub fn new(kind: FrameKind, data: &[u8]) -> Result<Self, Error> {
        Ok(Self {
            kind,
            data: msg::copy_from(data)?,
        })
    }

    pub fn request(data: &[u8]) -> Result<Self, Error> {
        Self::new(FrameKind::Request, data)
    }

    pub fn response(data: &[u8]) -> Result<Self, Error> {
        Self::new(FrameKind::Response, data)
    }
}

/// Inbound queue of one adapter.
pub type Inbox = Channel<CriticalSectionRawMutex, Inbound, INBOX_DEPTH>;

/// Raised by the timer owner every `TICK_INTERVAL_MS`.
pub type TickSignal = Signal<CriticalSectionRawMutex, ()>;

/// What one [`Bridge::step`] did.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum BridgeEvent {
    /// A frame from `port` was routed.
    Routed { port: Port, routed: Routed },
    /// A frame from `port` could not be routed.
    Failed { port: Port, error: Error },
    /// A tick was processed.
    Ticked { expired: usize },
}

/// Event sources served by the bridge, in rotation order.
#[derive(Clone, Copy)]
enum Source {
    Usb,
    Ble,
    Tick,
}

impl Source {
    const ALL: [Source; 3] = [Source::Usb, Source::Ble, Source::Tick];
}

/// Single dispatch task feeding both inboxes and the tick into a [`Router`].
pub struct Bridge<'r, 'a, M: RawMutex = CriticalSectionRawMutex> {
    router: &'r Router<'a, M>,
    usb_inbox: &'r Inbox,
    ble_inbox: &'r Inbox,
    tick: &'r TickSignal,
    /// Index into `Source::ALL` of the first source checked next step.
    turn: Cell<u8>,
}

impl<'r, 'a, M: RawMutex> Bridge<'r, 'a, M> {
    pub fn new(
        router: &'r Router<'a, M>,
        usb_inbox: &'r Inbox,
        ble_inbox: &'r Inbox,
        tick: &'r TickSignal,
    ) -> Self {
        Self {
            router,
            usb_inbox,
            ble_inbox,
            tick,
            turn: Cell::new(0),
        }
    }

    /// Wait for the next inbound frame or tick and hand it to the router.
    ///
    /// Routing errors are logged and reported in the returned event; they
    /// never stop the bridge.
    pub async fn step(&self) -> BridgeEvent {
        let first = usize::from(self.turn.get());
        self.turn.set(((first + 1) % Source::ALL.len()) as u8);

        for offset in 0..Source::ALL.len() {
            let source = Source::ALL[(first + offset) % Source::ALL.len()];
            if let Some(event) = self.poll(source) {
                return event;
            }
        }

        match select3(
            self.usb_inbox.receive(),
            self.ble_inbox.receive(),
            self.tick.wait(),
        )
        .await
        {
            Either3::First(inbound) => self.dispatch(Port::Usb, &inbound),
            Either3::Second(inbound) => self.dispatch(Port::Ble, &inbound),
            Either3::Third(()) => BridgeEvent::Ticked {
                expired: self.router.tick(),
            },
        }
    }

    /// Serve both directions forever.
    pub async fn run(&self) -> ! {
        info!("Bridge task started");
        loop {
            self.step().await;
        }
    }

    /// Serve `source` if it has something ready, without waiting.
    fn poll(&self, source: Source) -> Option<BridgeEvent> {
        match source {
            Source::Usb => self
                .usb_inbox
                .try_receive()
                .ok()
                .map(|inbound| self.dispatch(Port::Usb, &inbound)),
            Source::Ble => self
                .ble_inbox
                .try_receive()
                .ok()
                .map(|inbound| self.dispatch(Port::Ble, &inbound)),
            Source::Tick => self.tick.try_take().map(|()| BridgeEvent::Ticked {
                expired: self.router.tick(),
            }),
        }
    }

    fn dispatch(&self, port: Port, inbound: &Inbound) -> BridgeEvent {
        let data = inbound.data.as_slice();
        let result = match inbound.kind {
            FrameKind::Request => self.router.on_rx(port, data).map(Routed::Request),
            FrameKind::Response => self.router.on_response(port, data).map(Routed::Response),
            FrameKind::Unclassified => self.router.on_frame(port, data),
        };

        match result {
            Ok(routed) => BridgeEvent::Routed { port, routed },
            Err(error) => {
                error!("frame from {:?} not routed: {:?}", port, error);
                BridgeEvent::Failed { port, error }
            }
        }
    }
}
