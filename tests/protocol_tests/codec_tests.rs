//! Codec Tests
//!
//! Tests for frame layouts, status codes and notification text.

use std::io::Cursor;

use pipekv::error::KvsError;
use pipekv::protocol::{
    decode_connect, decode_notification, encode_connect, encode_field, encode_notification,
    encode_request, encode_response, read_notification, read_request, read_response,
    write_notification, write_response, ConnectRequest, OpCode, Request, Response, Status,
    CONNECT_FRAME_SIZE, FIELD_SIZE, NOTIFICATION_SIZE,
};
use pipekv::subscription::{Notification, SubscribeOutcome, UnsubscribeOutcome};

// =============================================================================
// Handshake Tests
// =============================================================================

#[test]
fn test_connect_frame_layout() {
    let request = ConnectRequest {
        request: "127.0.0.1:4001".to_string(),
        response: "127.0.0.1:4002".to_string(),
        notification: "127.0.0.1:4003".to_string(),
    };

    let frame = encode_connect(&request).unwrap();

    assert_eq!(frame.len(), CONNECT_FRAME_SIZE);
    assert_eq!(frame[0], b'1');
    assert_eq!(&frame[1..15], b"127.0.0.1:4001");
    assert!(frame[15..1 + FIELD_SIZE].iter().all(|&b| b == 0));
    assert_eq!(&frame[1 + FIELD_SIZE..1 + FIELD_SIZE + 14], b"127.0.0.1:4002");
    assert_eq!(decode_connect(&frame).unwrap(), request);
}

#[test]
fn test_connect_rejects_short_frame_and_wrong_opcode() {
    assert!(matches!(decode_connect(&[b'1'; 10]), Err(KvsError::Protocol(_))));

    let mut frame = vec![0u8; CONNECT_FRAME_SIZE];
    frame[0] = b'3';
    assert!(matches!(decode_connect(&frame), Err(KvsError::Protocol(_))));
}

#[test]
fn test_connect_rejects_empty_channel_id() {
    let mut frame = vec![0u8; CONNECT_FRAME_SIZE];
    frame[0] = b'1';
    frame[1] = b'x';
    assert!(matches!(decode_connect(&frame), Err(KvsError::Protocol(_))));
}

#[test]
fn test_field_too_long() {
    let mut buf = Vec::new();
    assert!(encode_field(&mut buf, &"k".repeat(FIELD_SIZE)).is_ok());
    assert_eq!(buf.len(), FIELD_SIZE);
    assert!(encode_field(&mut buf, &"k".repeat(FIELD_SIZE + 1)).is_err());
}

// =============================================================================
// Request Tests
// =============================================================================

#[test]
fn test_request_frame_sizes() {
    let subscribe = encode_request(&Request::Subscribe { key: "abc".to_string() }).unwrap();
    let unsubscribe = encode_request(&Request::Unsubscribe { key: "abc".to_string() }).unwrap();
    let disconnect = encode_request(&Request::Disconnect).unwrap();

    assert_eq!(subscribe.len(), 41);
    assert_eq!(subscribe[0], b'3');
    assert_eq!(&subscribe[1..4], b"abc");
    assert_eq!(unsubscribe[0], b'4');
    assert_eq!(disconnect, vec![b'2']);
}

#[test]
fn test_read_request_sequence() {
    let mut bytes = encode_request(&Request::Subscribe { key: "a".to_string() }).unwrap();
    bytes.extend(encode_request(&Request::Disconnect).unwrap());
    let mut cursor = Cursor::new(bytes);

    assert_eq!(
        read_request(&mut cursor).unwrap(),
        Some(Request::Subscribe { key: "a".to_string() })
    );
    assert_eq!(read_request(&mut cursor).unwrap(), Some(Request::Disconnect));
    assert_eq!(read_request(&mut cursor).unwrap(), None);
}

#[test]
fn test_unknown_opcode() {
    let mut cursor = Cursor::new(vec![b'9']);
    assert!(matches!(read_request(&mut cursor), Err(KvsError::Protocol(_))));
    assert!(OpCode::from_byte(b'0').is_err());
}

#[test]
fn test_truncated_request_is_io_error() {
    let mut cursor = Cursor::new(vec![b'3', b'a']);
    assert!(matches!(read_request(&mut cursor), Err(KvsError::Io(_))));
}

// =============================================================================
// Response Tests
// =============================================================================

#[test]
fn test_response_bytes() {
    assert_eq!(encode_response(&Response::ok(OpCode::Connect)), [b'1', b'0']);
    assert_eq!(
        encode_response(&Response::new(OpCode::Subscribe, Status::LimitReached)),
        [b'3', b'2']
    );
}

#[test]
fn test_status_from_outcomes() {
    assert_eq!(Status::from(SubscribeOutcome::Subscribed), Status::Ok);
    assert_eq!(Status::from(SubscribeOutcome::AlreadySubscribed), Status::Ok);
    assert_eq!(Status::from(SubscribeOutcome::KeyNotFound), Status::NotFound);
    assert_eq!(Status::from(SubscribeOutcome::LimitReached), Status::LimitReached);
    assert_eq!(Status::from(UnsubscribeOutcome::Removed), Status::Ok);
    assert_eq!(Status::from(UnsubscribeOutcome::NotSubscribed), Status::NotFound);
    assert_eq!(Status::from(UnsubscribeOutcome::KeyNotFound), Status::NotFound);
}

#[test]
fn test_status_into_error() {
    assert!(Status::Ok.into_result("a").is_ok());
    assert!(matches!(
        Status::NotFound.into_result("a"),
        Err(KvsError::KeyNotFound(key)) if key == "a"
    ));
    assert!(matches!(
        Status::LimitReached.into_result("hot"),
        Err(KvsError::SubscriberLimit(key)) if key == "hot"
    ));
    assert!(matches!(
        Status::BadRequest.into_result("a"),
        Err(KvsError::Protocol(_))
    ));
}

#[test]
fn test_response_stream() {
    let mut buf = Vec::new();
    write_response(&mut buf, &Response::new(OpCode::Unsubscribe, Status::NotFound)).unwrap();

    let response = read_response(&mut Cursor::new(buf)).unwrap();
    assert_eq!(response.opcode, OpCode::Unsubscribe);
    assert_eq!(response.status, Status::NotFound);
    assert!(!response.status.is_ok());
}

#[test]
fn test_bad_status_byte() {
    assert!(read_response(&mut Cursor::new(vec![b'3', b'x'])).is_err());
}

// =============================================================================
// Notification Tests
// =============================================================================

#[test]
fn test_notification_text_is_nul_padded() {
    let frame = encode_notification(&Notification::updated("key", "value")).unwrap();

    assert_eq!(frame.len(), NOTIFICATION_SIZE);
    assert_eq!(&frame[..12], b"(key, value)");
    assert!(frame[12..].iter().all(|&b| b == 0));
}

#[test]
fn test_deleted_notification() {
    let frame = encode_notification(&Notification::deleted("gone")).unwrap();

    assert_eq!(&frame[..15], b"(gone, DELETED)");
    assert_eq!(decode_notification(&frame).unwrap(), Notification::deleted("gone"));
}

#[test]
fn test_largest_notification_fits() {
    let key = "k".repeat(FIELD_SIZE);
    let value = "v".repeat(FIELD_SIZE);
    let notification = Notification::updated(key, value);

    let frame = encode_notification(&notification).unwrap();
    assert_eq!(decode_notification(&frame).unwrap(), notification);
}

#[test]
fn test_notification_stream_ends_cleanly() {
    let mut buf = Vec::new();
    write_notification(&mut buf, &Notification::updated("a", "1")).unwrap();
    let mut cursor = Cursor::new(buf);

    assert_eq!(
        read_notification(&mut cursor).unwrap(),
        Some(Notification::updated("a", "1"))
    );
    assert_eq!(read_notification(&mut cursor).unwrap(), None);
}

#[test]
fn test_malformed_notification() {
    let mut frame = [0u8; NOTIFICATION_SIZE];
    frame[..7].copy_from_slice(b"garbage");
    assert!(matches!(decode_notification(&frame), Err(KvsError::Protocol(_))));
}
