//! Protocol codec
//!
//! Encoding and decoding functions for the wire protocol.

use std::io::{Read, Write};

use crate::error::{KvsError, Result};
use crate::subscription::{Notification, DELETED_MARKER};
use super::{
    ConnectRequest, OpCode, Request, Response, Status, CONNECT_FRAME_SIZE, FIELD_SIZE,
    NOTIFICATION_SIZE, RESPONSE_SIZE,
};

// =============================================================================
// Fields
// =============================================================================

/// Append `text` NUL-padded to exactly `FIELD_SIZE` bytes
pub fn encode_field(buf: &mut Vec<u8>, text: &str) -> Result<()> {
    let bytes = text.as_bytes();
    if bytes.len() > FIELD_SIZE {
        return Err(KvsError::Protocol(format!(
            "Field too long: {} bytes (max {})",
            bytes.len(),
            FIELD_SIZE
        )));
    }
    if bytes.contains(&0) {
        return Err(KvsError::Protocol("Field contains a NUL byte".to_string()));
    }
    buf.extend_from_slice(bytes);
    buf.resize(buf.len() + FIELD_SIZE - bytes.len(), 0);
    Ok(())
}

/// Decode a NUL-padded field
pub fn decode_field(bytes: &[u8]) -> Result<String> {
    let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
    String::from_utf8(bytes[..end].to_vec())
        .map_err(|_| KvsError::Protocol("Field is not valid UTF-8".to_string()))
}

// =============================================================================
// Handshake
// =============================================================================

/// Encode a CONNECT frame
pub fn encode_connect(request: &ConnectRequest) -> Result<Vec<u8>> {
    let mut frame = Vec::with_capacity(CONNECT_FRAME_SIZE);
    frame.push(OpCode::Connect.as_byte());
    encode_field(&mut frame, &request.request)?;
    encode_field(&mut frame, &request.response)?;
    encode_field(&mut frame, &request.notification)?;
    Ok(frame)
}

/// Decode a CONNECT frame
pub fn decode_connect(frame: &[u8]) -> Result<ConnectRequest> {
    if frame.len() != CONNECT_FRAME_SIZE {
        return Err(KvsError::Protocol(format!(
            "CONNECT frame: expected {} bytes, got {}",
            CONNECT_FRAME_SIZE,
            frame.len()
        )));
    }
    if OpCode::from_byte(frame[0])? != OpCode::Connect {
        return Err(KvsError::Protocol(format!(
            "Expected CONNECT, got opcode 0x{:02x}",
            frame[0]
        )));
    }

    let field = |n: usize| decode_field(&frame[1 + n * FIELD_SIZE..1 + (n + 1) * FIELD_SIZE]);
    let request = ConnectRequest {
        request: field(0)?,
        response: field(1)?,
        notification: field(2)?,
    };

    if request.request.is_empty()
        || request.response.is_empty()
        || request.notification.is_empty()
    {
        return Err(KvsError::Protocol(
            "CONNECT frame: empty channel identifier".to_string(),
        ));
    }
    Ok(request)
}

// =============================================================================
// Requests
// =============================================================================

/// Encode a steady-state request
pub fn encode_request(request: &Request) -> Result<Vec<u8>> {
    let opcode = request.opcode();
    let mut frame = Vec::with_capacity(1 + opcode.payload_len());
    frame.push(opcode.as_byte());
    match request {
        Request::Subscribe { key } | Request::Unsubscribe { key } => encode_field(&mut frame, key)?,
        Request::Disconnect => {}
    }
    Ok(frame)
}

/// Decode a request from its opcode and payload
pub fn decode_request(opcode: OpCode, payload: &[u8]) -> Result<Request> {
    if payload.len() != opcode.payload_len() {
        return Err(KvsError::Protocol(format!(
            "{:?} payload: expected {} bytes, got {}",
            opcode,
            opcode.payload_len(),
            payload.len()
        )));
    }
    match opcode {
        OpCode::Subscribe => Ok(Request::Subscribe {
            key: decode_field(payload)?,
        }),
        OpCode::Unsubscribe => Ok(Request::Unsubscribe {
            key: decode_field(payload)?,
        }),
        OpCode::Disconnect => Ok(Request::Disconnect),
        OpCode::Connect => Err(KvsError::Protocol(
            "CONNECT is only valid on the rendezvous channel".to_string(),
        )),
    }
}

/// Read one request, blocking
///
/// Returns `Ok(None)` if the stream ends cleanly before an opcode.
pub fn read_request<R: Read>(reader: &mut R) -> Result<Option<Request>> {
    let mut opcode = [0u8; 1];
    match reader.read_exact(&mut opcode) {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(e.into()),
    }

    let opcode = OpCode::from_byte(opcode[0])?;
    let mut payload = vec![0u8; opcode.payload_len()];
    reader.read_exact(&mut payload)?;
    decode_request(opcode, &payload).map(Some)
}

// =============================================================================
// Responses
// =============================================================================

/// Encode a response
pub fn encode_response(response: &Response) -> [u8; RESPONSE_SIZE] {
    [response.opcode.as_byte(), response.status.as_byte()]
}

/// Read a response, blocking
pub fn read_response<R: Read>(reader: &mut R) -> Result<Response> {
    let mut frame = [0u8; RESPONSE_SIZE];
    reader.read_exact(&mut frame)?;
    Ok(Response {
        opcode: OpCode::from_byte(frame[0])?,
        status: Status::from_byte(frame[1])?,
    })
}

/// Write a response to a stream
pub fn write_response<W: Write>(writer: &mut W, response: &Response) -> Result<()> {
    writer.write_all(&encode_response(response))?;
    writer.flush()?;
    Ok(())
}

// =============================================================================
// Notifications
// =============================================================================

/// Encode a notification as NUL-padded text
pub fn encode_notification(notification: &Notification) -> Result<[u8; NOTIFICATION_SIZE]> {
    let text = notification.to_string();
    let bytes = text.as_bytes();
    // Keep at least one trailing NUL as terminator.
    if bytes.len() >= NOTIFICATION_SIZE {
        return Err(KvsError::Protocol(format!(
            "Notification too long: {} bytes",
            bytes.len()
        )));
    }
    let mut frame = [0u8; NOTIFICATION_SIZE];
    frame[..bytes.len()].copy_from_slice(bytes);
    Ok(frame)
}

/// Decode a notification frame
///
/// A value equal to `DELETED` is read back as a deletion.
pub fn decode_notification(frame: &[u8]) -> Result<Notification> {
    let text = decode_field(frame)?;
    let body = text
        .strip_prefix('(')
        .and_then(|t| t.strip_suffix(')'))
        .ok_or_else(|| KvsError::Protocol(format!("Malformed notification: {:?}", text)))?;
    let (key, value) = body
        .split_once(", ")
        .ok_or_else(|| KvsError::Protocol(format!("Malformed notification: {:?}", text)))?;

    if value == DELETED_MARKER {
        Ok(Notification::deleted(key))
    } else {
        Ok(Notification::updated(key, value))
    }
}

/// Read one notification, blocking
///
/// Returns `Ok(None)` when the server closed the channel.
pub fn read_notification<R: Read>(reader: &mut R) -> Result<Option<Notification>> {
    let mut frame = [0u8; NOTIFICATION_SIZE];
    match reader.read_exact(&mut frame) {
        Ok(()) => decode_notification(&frame).map(Some),
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Write a notification to a stream
pub fn write_notification<W: Write>(writer: &mut W, notification: &Notification) -> Result<()> {
    writer.write_all(&encode_notification(notification)?)?;
    writer.flush()?;
    Ok(())
}
