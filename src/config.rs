//! Application-wide constants and compile-time configuration.
//!
//! Message sizing, queue depths and transaction timing live here so
//! they can be tuned in one place. Both transports and the router must
//! agree on `MSG_MAX_LEN`.

// Messages

/// Maximum payload length of a single frame (bytes), shared by every port.
pub const MSG_MAX_LEN: usize = 238;

/// Frame sent back to a requester whose direction already has a
/// transaction in flight.
pub const BUSY_FRAME: &[u8] = b"BUSY";

/// Frame sent to an initiator whose transaction expired without a response.
pub const TIMEOUT_FRAME: &[u8] = b"TIMEOUT";

// Queues

/// Depth of each adapter's inbound channel feeding the bridge task.
pub const INBOX_DEPTH: usize = 4;

/// Depth of each port's outbound channel drained by its transport task.
pub const OUTBOX_DEPTH: usize = 4;

// Transactions

/// Interval between router ticks (ms). The owner of the timer signals
/// the bridge at this rate.
pub const TICK_INTERVAL_MS: u64 = 100;

/// Number of ticks a transaction may stay pending before it is expired.
/// 50 × 100 ms = 5 s.
pub const TRANSACTION_TIMEOUT_TICKS: u32 = 50;

// Test doubles

/// Number of sent frames the mock transport remembers.
pub const MOCK_LOG_DEPTH: usize = 8;
