//! Transaction router - decides, per inbound frame, whether to forward,
//! correlate or reject.
//!
//! Each direction (USB→BLE, BLE→USB) owns one transaction slot that
//! cycles between `Idle` and `Pending`:
//!
//! ```text
//!            on_rx(initiator)            on_response(responder)
//!   Idle ─────────────────────► Pending ─────────────────────► Idle
//!    ▲                            │  │
//!    │   forward failed / tick    │  │ on_rx(initiator) → BUSY_FRAME,
//!    └────── timeout / cancel ────┘  │ slot untouched
//!                                    └──────────────────────────┘
//! ```
//!
//! Slots live in separate mutexes so the two directions never contend.
//! No lock is held while a transport sends.

use core::cell::Cell;
use core::sync::atomic::{AtomicU32, Ordering};

use embassy_sync::blocking_mutex::raw::{CriticalSectionRawMutex, RawMutex};
use embassy_sync::blocking_mutex::Mutex;

use crate::config::{BUSY_FRAME, TIMEOUT_FRAME, TRANSACTION_TIMEOUT_TICKS};
use crate::error::{Error, SendError};
use crate::msg;
use crate::port::{Direction, Port, PortRegistry, DIRECTION_COUNT};

#[cfg(test)]
mod tests;

/// State of one direction's slot.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Transaction {
    /// No request in flight.
    Idle,
    /// A request was forwarded and awaits its response.
    Pending {
        /// Router-wide sequence number, for logs.
        id: u32,
        /// Port the response must be routed back to.
        initiator: Port,
        /// Ticks elapsed since the request was accepted.
        age_ticks: u32,
    },
}

impl Transaction {
    pub fn is_pending(&self) -> bool {
        matches!(self, Transaction::Pending { .. })
    }

    pub fn initiator(&self) -> Option<Port> {
        match self {
            Transaction::Pending { initiator, .. } => Some(*initiator),
            Transaction::Idle => None,
        }
    }
}

/// What `on_rx` did with a request.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RxOutcome {
    /// Forwarded to the responder; the direction is now pending.
    Forwarded,
    /// Direction already pending; `BUSY_FRAME` went back to the requester.
    Rejected,
}

/// What `on_response` did with a response.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ResponseOutcome {
    /// Forwarded to the initiator; the direction is idle again.
    Delivered,
    /// No matching transaction; dropped.
    Unsolicited,
}

/// Result of [`Router::on_frame`], tagged with how the frame was classified.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Routed {
    Request(RxOutcome),
    Response(ResponseOutcome),
}

/// Snapshot of the router's counters.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct RouterStats {
    /// Requests forwarded (transactions opened).
    pub forwarded: u32,
    /// Requests rejected as busy.
    pub rejected: u32,
    /// Responses delivered to their initiator.
    pub delivered: u32,
    /// Responses with no pending transaction.
    pub unsolicited: u32,
    /// Transactions expired by `tick`.
    pub expired: u32,
    /// Transactions cleared by `cancel`.
    pub cancelled: u32,
    /// Transport sends that failed.
    pub send_failures: u32,
}

#[derive(Default)]
struct Counters {
    forwarded: AtomicU32,
    rejected: AtomicU32,
    delivered: AtomicU32,
    unsolicited: AtomicU32,
    expired: AtomicU32,
    cancelled: AtomicU32,
    send_failures: AtomicU32,
}

fn bump(counter: &AtomicU32) -> u32 {
    counter.fetch_add(1, Ordering::Relaxed).wrapping_add(1)
}

/// Per-direction transaction router over a fixed pair of ports.
pub struct Router<'a, M: RawMutex = CriticalSectionRawMutex> {
    ports: PortRegistry<'a>,
    slots: [Mutex<M, Cell<Transaction>>; DIRECTION_COUNT],
    timeout_ticks: Option<u32>,
    next_id: AtomicU32,
    counters: Counters,
}

impl<'a, M: RawMutex> Router<'a, M> {
    /// Router with the default transaction timeout
    /// (`TRANSACTION_TIMEOUT_TICKS`).
    pub fn new(ports: PortRegistry<'a>) -> Self {
        Self::with_timeout(ports, Some(TRANSACTION_TIMEOUT_TICKS))
    }

    /// Router expiring pending transactions after `timeout_ticks` calls to
    /// [`tick`](Self::tick). `None` keeps them pending until answered or
    /// cancelled.
    pub fn with_timeout(ports: PortRegistry<'a>, timeout_ticks: Option<u32>) -> Self {
        Self {
            ports,
            slots: [
                Mutex::new(Cell::new(Transaction::Idle)),
                Mutex::new(Cell::new(Transaction::Idle)),
            ],
            timeout_ticks,
            next_id: AtomicU32::new(0),
            counters: Counters::default(),
        }
    }

    /// A new request arrived at `from`.
    ///
    /// Forwards it to the other port if that direction is idle, otherwise
    /// answers `from` with `BUSY_FRAME` and leaves the pending transaction
    /// alone. A failed forward reverts the direction to idle.
    ///
    /// The slot is reserved before the forward is sent. A request racing
    /// in the same direction during that send is answered busy even if the
    /// forward then fails and is rolled back.
    pub fn on_rx(&self, from: Port, data: &[u8]) -> Result<RxOutcome, Error> {
        let frame = msg::copy_from(data)?;
        let direction = Direction::of_request(from);
        let id = bump(&self.next_id);

        let accepted = self.slot(direction).lock(|slot| match slot.get() {
            Transaction::Idle => {
                slot.set(Transaction::Pending {
                    id,
                    initiator: from,
                    age_ticks: 0,
                });
                true
            }
            Transaction::Pending { .. } => false,
        });

        if !accepted {
            bump(&self.counters.rejected);
            debug!("{:?} busy, rejecting request from {:?}", direction, from);
            self.send(from, BUSY_FRAME)?;
            return Ok(RxOutcome::Rejected);
        }

        if let Err(error) = self.send(direction.responder, &frame) {
            self.release(direction, id);
            warn!("txn {} not forwarded, {:?} back to idle", id, direction);
            return Err(error);
        }

        bump(&self.counters.forwarded);
        trace!(
            "txn {} opened on {:?} ({} bytes)",
            id,
            direction,
            frame.len()
        );
        Ok(RxOutcome::Forwarded)
    }

    /// A response arrived at `from`.
    ///
    /// Closes the direction whose responder is `from` and forwards the
    /// bytes verbatim to its initiator. Responses with nothing pending are
    /// dropped.
    pub fn on_response(&self, from: Port, data: &[u8]) -> Result<ResponseOutcome, Error> {
        let frame = msg::copy_from(data)?;
        let direction = Direction::closed_by_response(from);

        let closed = self
            .slot(direction)
            .lock(|slot| match slot.replace(Transaction::Idle) {
                Transaction::Pending { id, initiator, .. } => Some((id, initiator)),
                Transaction::Idle => None,
            });

        let Some((id, initiator)) = closed else {
            bump(&self.counters.unsolicited);
            warn!(
                "unsolicited response from {:?} ({} bytes) dropped",
                from,
                frame.len()
            );
            return Ok(ResponseOutcome::Unsolicited);
        };

        // The slot is already idle; a failed delivery does not reopen it.
        self.send(initiator, &frame)?;

        bump(&self.counters.delivered);
        trace!("txn {} closed on {:?}", id, direction);
        Ok(ResponseOutcome::Delivered)
    }

    /// Route a frame whose kind the transport cannot tell.
    ///
    /// A frame arriving at the responder of a pending direction is taken as
    /// its response; anything else starts a new request.
    pub fn on_frame(&self, from: Port, data: &[u8]) -> Result<Routed, Error> {
        if self.transaction(Direction::closed_by_response(from)).is_pending() {
            self.on_response(from, data).map(Routed::Response)
        } else {
            self.on_rx(from, data).map(Routed::Request)
        }
    }

    /// Age every pending transaction by one tick and expire the ones that
    /// reached the timeout. Each expired initiator gets `TIMEOUT_FRAME`.
    ///
    /// Returns the number of transactions expired.
    pub fn tick(&self) -> usize {
        let Some(limit) = self.timeout_ticks else {
            return 0;
        };

        let mut expired = 0;
        for direction in Direction::ALL {
            let timed_out = self.slot(direction).lock(|slot| match slot.get() {
                Transaction::Pending {
                    id,
                    initiator,
                    age_ticks,
                } => {
                    let age_ticks = age_ticks.saturating_add(1);
                    if age_ticks >= limit {
                        slot.set(Transaction::Idle);
                        Some((id, initiator))
                    } else {
                        slot.set(Transaction::Pending {
                            id,
                            initiator,
                            age_ticks,
                        });
                        None
                    }
                }
                Transaction::Idle => None,
            });

            if let Some((id, initiator)) = timed_out {
                expired += 1;
                bump(&self.counters.expired);
                warn!("txn {} on {:?} timed out", id, direction);
                // Best effort: the slot is idle whether or not the notice lands.
                let _ = self.send(initiator, TIMEOUT_FRAME);
            }
        }
        expired
    }

    /// Drop the pending transaction on `direction`, if any. Nothing is sent.
    pub fn cancel(&self, direction: Direction) -> bool {
        let previous = self
            .slot(direction)
            .lock(|slot| slot.replace(Transaction::Idle));

        match previous {
            Transaction::Pending { id, .. } => {
                bump(&self.counters.cancelled);
                info!("txn {} on {:?} cancelled", id, direction);
                true
            }
            Transaction::Idle => false,
        }
    }

    /// Current state of `direction`.
    pub fn transaction(&self, direction: Direction) -> Transaction {
        self.slot(direction).lock(|slot| slot.get())
    }

    /// Whether the transport bound to `port` reports ready.
    pub fn port_ready(&self, port: Port) -> bool {
        self.ports.is_ready(port)
    }

    pub fn stats(&self) -> RouterStats {
        let c = &self.counters;
        RouterStats {
            forwarded: c.forwarded.load(Ordering::Relaxed),
            rejected: c.rejected.load(Ordering::Relaxed),
            delivered: c.delivered.load(Ordering::Relaxed),
            unsolicited: c.unsolicited.load(Ordering::Relaxed),
            expired: c.expired.load(Ordering::Relaxed),
            cancelled: c.cancelled.load(Ordering::Relaxed),
            send_failures: c.send_failures.load(Ordering::Relaxed),
        }
    }

    fn slot(&self, direction: Direction) -> &Mutex<M, Cell<Transaction>> {
        &self.slots[direction.index()]
    }

    /// Revert `direction` to idle, but only if it still holds transaction
    /// `id` (a timeout or cancel may have reused the slot meanwhile).
    ///
    /// Requests rejected while `id` was reserved are not replayed; their
    /// senders already got `BUSY_FRAME` and must retry.
    fn release(&self, direction: Direction, id: u32) {
        self.slot(direction).lock(|slot| {
            if matches!(slot.get(), Transaction::Pending { id: current, .. } if current == id) {
                slot.set(Transaction::Idle);
            }
        });
    }

    fn send(&self, port: Port, data: &[u8]) -> Result<(), Error> {
        self.ports.send(port, data).map_err(|error: SendError| {
            bump(&self.counters.send_failures);
            warn!("send to {:?} failed: {:?}", port, error);
            Error::Send { port, error }
        })
    }
}
