//! Bounded message buffer.
//!
//! A message is a plain byte value with no identity beyond its contents.
//! It is copied into a fixed-capacity `heapless::Vec` at every hand-off
//! so no buffer is ever shared between ports.

use crate::config::MSG_MAX_LEN;
use crate::error::Error;

/// One frame, at most `MSG_MAX_LEN` bytes.
pub type Message = heapless::Vec<u8, MSG_MAX_LEN>;

/// Copy `data` into an owned message.
///
/// Fails with [`Error::PayloadTooLarge`] instead of truncating.
pub fn copy_from(data: &[u8]) -> Result<Message, Error> {
    Message::from_slice(data).map_err(|_| Error::PayloadTooLarge { len: data.len() })
}
