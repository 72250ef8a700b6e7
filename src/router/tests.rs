//! Unit tests for the transaction router.
//!
//! These run on the host against mock transports and check the
//! per-direction state machine directly.

use super::{ResponseOutcome, Routed, Router, RxOutcome, Transaction};
use crate::config::{BUSY_FRAME, MSG_MAX_LEN, TIMEOUT_FRAME};
use crate::error::{Error, SendError};
use crate::port::{Direction, Port, PortRegistry};
use crate::transport::MockTransport;

const REQ_USB: &[u8] = &[0x01, 0x02];
const RESP_USB: &[u8] = &[0x10];
const REQ_BLE: &[u8] = &[0x03];
const RESP_BLE: &[u8] = &[0x20, 0x21];

fn router<'a>(usb: &'a MockTransport, ble: &'a MockTransport) -> Router<'a> {
    Router::new(PortRegistry::new(usb, ble))
}

// ═══════════════════════════════════════════════════════════════════════════
// Request / response flow
// ═══════════════════════════════════════════════════════════════════════════

#[test]
fn usb_request_is_forwarded_to_ble() {
    let (usb, ble) = (MockTransport::new(), MockTransport::new());
    let router = router(&usb, &ble);

    assert_eq!(router.on_rx(Port::Usb, REQ_USB), Ok(RxOutcome::Forwarded));

    assert_eq!(ble.last_sent().unwrap().as_slice(), REQ_USB);
    assert_eq!(usb.send_count(), 0);
    assert_eq!(
        router.transaction(Direction::USB_TO_BLE).initiator(),
        Some(Port::Usb)
    );
}

#[test]
fn ble_response_closes_usb_transaction() {
    let (usb, ble) = (MockTransport::new(), MockTransport::new());
    let router = router(&usb, &ble);

    router.on_rx(Port::Usb, REQ_USB).unwrap();
    assert_eq!(
        router.on_response(Port::Ble, RESP_BLE),
        Ok(ResponseOutcome::Delivered)
    );

    assert_eq!(usb.last_sent().unwrap().as_slice(), RESP_BLE);
    assert_eq!(router.transaction(Direction::USB_TO_BLE), Transaction::Idle);
}

#[test]
fn ble_initiated_round_trip() {
    let (usb, ble) = (MockTransport::new(), MockTransport::new());
    let router = router(&usb, &ble);

    router.on_rx(Port::Ble, REQ_BLE).unwrap();
    assert_eq!(usb.last_sent().unwrap().as_slice(), REQ_BLE);
    assert!(router.transaction(Direction::BLE_TO_USB).is_pending());

    router.on_response(Port::Usb, RESP_USB).unwrap();
    assert_eq!(ble.last_sent().unwrap().as_slice(), RESP_USB);
    assert_eq!(router.transaction(Direction::BLE_TO_USB), Transaction::Idle);
}

#[test]
fn empty_payload_is_routed() {
    let (usb, ble) = (MockTransport::new(), MockTransport::new());
    let router = router(&usb, &ble);

    assert_eq!(router.on_rx(Port::Usb, &[]), Ok(RxOutcome::Forwarded));
    assert!(ble.last_sent().unwrap().is_empty());

    assert_eq!(
        router.on_response(Port::Ble, &[]),
        Ok(ResponseOutcome::Delivered)
    );
    assert!(usb.last_sent().unwrap().is_empty());
}

#[test]
fn max_length_payload_is_forwarded_unchanged() {
    let (usb, ble) = (MockTransport::new(), MockTransport::new());
    let router = router(&usb, &ble);

    let mut data = [0u8; MSG_MAX_LEN];
    for (i, b) in data.iter_mut().enumerate() {
        *b = i as u8;
    }

    router.on_rx(Port::Usb, &data).unwrap();
    assert_eq!(ble.last_sent().unwrap().as_slice(), &data[..]);
}

// ═══════════════════════════════════════════════════════════════════════════
// Busy rejection
// ═══════════════════════════════════════════════════════════════════════════

#[test]
fn second_request_same_direction_gets_busy() {
    let (usb, ble) = (MockTransport::new(), MockTransport::new());
    let router = router(&usb, &ble);

    router.on_rx(Port::Usb, REQ_USB).unwrap();
    let before = router.transaction(Direction::USB_TO_BLE);

    assert_eq!(router.on_rx(Port::Usb, &[0x09]), Ok(RxOutcome::Rejected));

    assert_eq!(usb.last_sent().unwrap().as_slice(), BUSY_FRAME);
    assert_eq!(ble.send_count(), 1);
    assert_eq!(router.transaction(Direction::USB_TO_BLE), before);
    assert_eq!(router.stats().rejected, 1);
}

#[test]
fn rejected_request_does_not_disturb_pending_response() {
    let (usb, ble) = (MockTransport::new(), MockTransport::new());
    let router = router(&usb, &ble);

    router.on_rx(Port::Usb, REQ_USB).unwrap();
    router.on_rx(Port::Usb, REQ_USB).unwrap();
    router.on_response(Port::Ble, RESP_BLE).unwrap();

    assert_eq!(usb.last_sent().unwrap().as_slice(), RESP_BLE);
    assert_eq!(router.on_rx(Port::Usb, REQ_USB), Ok(RxOutcome::Forwarded));
}

#[test]
fn busy_frame_send_failure_is_reported() {
    let (usb, ble) = (MockTransport::new(), MockTransport::new());
    let router = router(&usb, &ble);

    router.on_rx(Port::Usb, REQ_USB).unwrap();
    usb.inject_failure(SendError::Busy);

    assert_eq!(
        router.on_rx(Port::Usb, REQ_USB),
        Err(Error::Send {
            port: Port::Usb,
            error: SendError::Busy
        })
    );
    assert!(router.transaction(Direction::USB_TO_BLE).is_pending());
}

// ═══════════════════════════════════════════════════════════════════════════
// Direction independence
// ═══════════════════════════════════════════════════════════════════════════

#[test]
fn opposite_directions_pend_independently() {
    let (usb, ble) = (MockTransport::new(), MockTransport::new());
    let router = router(&usb, &ble);

    assert_eq!(router.on_rx(Port::Usb, REQ_USB), Ok(RxOutcome::Forwarded));
    assert_eq!(router.on_rx(Port::Ble, REQ_BLE), Ok(RxOutcome::Forwarded));
    assert!(router.transaction(Direction::USB_TO_BLE).is_pending());
    assert!(router.transaction(Direction::BLE_TO_USB).is_pending());

    router.on_response(Port::Ble, RESP_BLE).unwrap();
    assert_eq!(usb.last_sent().unwrap().as_slice(), RESP_BLE);
    assert!(router.transaction(Direction::BLE_TO_USB).is_pending());

    router.on_response(Port::Usb, RESP_USB).unwrap();
    assert_eq!(ble.last_sent().unwrap().as_slice(), RESP_USB);
    assert_eq!(router.transaction(Direction::USB_TO_BLE), Transaction::Idle);
    assert_eq!(router.transaction(Direction::BLE_TO_USB), Transaction::Idle);
}

// ═══════════════════════════════════════════════════════════════════════════
// Failure policy
// ═══════════════════════════════════════════════════════════════════════════

#[test]
fn failed_forward_rolls_back_to_idle() {
    let (usb, ble) = (MockTransport::new(), MockTransport::new());
    let router = router(&usb, &ble);

    ble.set_connected(false);
    assert_eq!(
        router.on_rx(Port::Usb, REQ_USB),
        Err(Error::Send {
            port: Port::Ble,
            error: SendError::NotConnected
        })
    );
    assert_eq!(router.transaction(Direction::USB_TO_BLE), Transaction::Idle);

    ble.set_connected(true);
    assert_eq!(router.on_rx(Port::Usb, REQ_USB), Ok(RxOutcome::Forwarded));
}

#[test]
fn failed_response_delivery_still_closes_transaction() {
    let (usb, ble) = (MockTransport::new(), MockTransport::new());
    let router = router(&usb, &ble);

    router.on_rx(Port::Usb, REQ_USB).unwrap();
    usb.inject_failure(SendError::Io);

    assert_eq!(
        router.on_response(Port::Ble, RESP_BLE),
        Err(Error::Send {
            port: Port::Usb,
            error: SendError::Io
        })
    );
    assert_eq!(router.transaction(Direction::USB_TO_BLE), Transaction::Idle);
    assert_eq!(router.stats().send_failures, 1);
}

#[test]
fn oversize_payload_rejected_before_state_change() {
    let (usb, ble) = (MockTransport::new(), MockTransport::new());
    let router = router(&usb, &ble);

    let big = [0xAAu8; MSG_MAX_LEN + 1];
    assert_eq!(
        router.on_rx(Port::Usb, &big),
        Err(Error::PayloadTooLarge {
            len: MSG_MAX_LEN + 1
        })
    );
    assert_eq!(router.transaction(Direction::USB_TO_BLE), Transaction::Idle);
    assert_eq!(ble.send_count(), 0);

    router.on_rx(Port::Usb, REQ_USB).unwrap();
    assert_eq!(
        router.on_response(Port::Ble, &big),
        Err(Error::PayloadTooLarge {
            len: MSG_MAX_LEN + 1
        })
    );
    assert!(router.transaction(Direction::USB_TO_BLE).is_pending());
}

#[test]
fn unsolicited_response_is_dropped() {
    let (usb, ble) = (MockTransport::new(), MockTransport::new());
    let router = router(&usb, &ble);

    router.on_rx(Port::Ble, REQ_BLE).unwrap();
    usb.reset();

    // Nothing pending on USB→BLE, so a BLE "response" has no home.
    assert_eq!(
        router.on_response(Port::Ble, RESP_BLE),
        Ok(ResponseOutcome::Unsolicited)
    );
    assert_eq!(usb.send_count(), 0);
    assert!(router.transaction(Direction::BLE_TO_USB).is_pending());
    assert_eq!(router.stats().unsolicited, 1);
}

// ═══════════════════════════════════════════════════════════════════════════
// Timeout / cancellation
// ═══════════════════════════════════════════════════════════════════════════

#[test]
fn pending_transaction_expires_after_timeout() {
    let (usb, ble) = (MockTransport::new(), MockTransport::new());
    let router: Router = Router::with_timeout(PortRegistry::new(&usb, &ble), Some(3));

    router.on_rx(Port::Usb, REQ_USB).unwrap();
    assert_eq!(router.tick(), 0);
    assert_eq!(router.tick(), 0);
    assert!(router.transaction(Direction::USB_TO_BLE).is_pending());

    assert_eq!(router.tick(), 1);
    assert_eq!(router.transaction(Direction::USB_TO_BLE), Transaction::Idle);
    assert_eq!(usb.last_sent().unwrap().as_slice(), TIMEOUT_FRAME);

    // A late response after expiry is unsolicited.
    assert_eq!(
        router.on_response(Port::Ble, RESP_BLE),
        Ok(ResponseOutcome::Unsolicited)
    );
}

#[test]
fn undeliverable_timeout_notice_still_expires() {
    let (usb, ble) = (MockTransport::new(), MockTransport::new());
    let router: Router = Router::with_timeout(PortRegistry::new(&usb, &ble), Some(1));

    router.on_rx(Port::Usb, REQ_USB).unwrap();
    usb.inject_failure(SendError::Io);

    assert_eq!(router.tick(), 1);
    assert_eq!(router.transaction(Direction::USB_TO_BLE), Transaction::Idle);
    assert!(usb.last_sent().is_none());
    let stats = router.stats();
    assert_eq!(stats.expired, 1);
    assert_eq!(stats.send_failures, 1);

    // The direction is usable again.
    assert_eq!(router.on_rx(Port::Usb, REQ_USB), Ok(RxOutcome::Forwarded));
}

#[test]
fn tick_without_timeout_never_expires() {
    let (usb, ble) = (MockTransport::new(), MockTransport::new());
    let router: Router = Router::with_timeout(PortRegistry::new(&usb, &ble), None);

    router.on_rx(Port::Usb, REQ_USB).unwrap();
    for _ in 0..1000 {
        assert_eq!(router.tick(), 0);
    }
    assert!(router.transaction(Direction::USB_TO_BLE).is_pending());
}

#[test]
fn tick_ages_each_direction_separately() {
    let (usb, ble) = (MockTransport::new(), MockTransport::new());
    let router: Router = Router::with_timeout(PortRegistry::new(&usb, &ble), Some(2));

    router.on_rx(Port::Usb, REQ_USB).unwrap();
    router.tick();
    router.on_rx(Port::Ble, REQ_BLE).unwrap();

    assert_eq!(router.tick(), 1);
    assert_eq!(router.transaction(Direction::USB_TO_BLE), Transaction::Idle);
    assert!(router.transaction(Direction::BLE_TO_USB).is_pending());

    assert_eq!(router.tick(), 1);
    assert_eq!(ble.last_sent().unwrap().as_slice(), TIMEOUT_FRAME);
    assert_eq!(router.stats().expired, 2);
}

#[test]
fn cancel_clears_only_the_given_direction() {
    let (usb, ble) = (MockTransport::new(), MockTransport::new());
    let router = router(&usb, &ble);

    router.on_rx(Port::Usb, REQ_USB).unwrap();
    router.on_rx(Port::Ble, REQ_BLE).unwrap();
    let sent_before = usb.send_count();

    assert!(router.cancel(Direction::USB_TO_BLE));
    assert!(!router.cancel(Direction::USB_TO_BLE));
    assert_eq!(usb.send_count(), sent_before);
    assert!(router.transaction(Direction::BLE_TO_USB).is_pending());
    assert_eq!(router.stats().cancelled, 1);
}

// ═══════════════════════════════════════════════════════════════════════════
// Unclassified frames
// ═══════════════════════════════════════════════════════════════════════════

#[test]
fn on_frame_treats_reply_to_pending_direction_as_response() {
    let (usb, ble) = (MockTransport::new(), MockTransport::new());
    let router = router(&usb, &ble);

    assert_eq!(
        router.on_frame(Port::Usb, REQ_USB),
        Ok(Routed::Request(RxOutcome::Forwarded))
    );
    assert_eq!(
        router.on_frame(Port::Ble, RESP_BLE),
        Ok(Routed::Response(ResponseOutcome::Delivered))
    );
    assert_eq!(usb.last_sent().unwrap().as_slice(), RESP_BLE);
}

#[test]
fn on_frame_without_pending_is_a_request() {
    let (usb, ble) = (MockTransport::new(), MockTransport::new());
    let router = router(&usb, &ble);

    assert_eq!(
        router.on_frame(Port::Ble, REQ_BLE),
        Ok(Routed::Request(RxOutcome::Forwarded))
    );
    assert!(router.transaction(Direction::BLE_TO_USB).is_pending());
}

#[test]
fn stats_track_every_outcome() {
    let (usb, ble) = (MockTransport::new(), MockTransport::new());
    let router = router(&usb, &ble);

    router.on_rx(Port::Usb, REQ_USB).unwrap();
    router.on_rx(Port::Usb, REQ_USB).unwrap();
    router.on_response(Port::Ble, RESP_BLE).unwrap();
    router.on_response(Port::Ble, RESP_BLE).unwrap();

    let stats = router.stats();
    assert_eq!(stats.forwarded, 1);
    assert_eq!(stats.rejected, 1);
    assert_eq!(stats.delivered, 1);
    assert_eq!(stats.unsolicited, 1);
    assert_eq!(stats.send_failures, 0);
}
