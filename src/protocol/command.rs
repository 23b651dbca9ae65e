//! Request definitions
//!
//! Frames sent by clients.

use crate::error::{KvsError, Result};
use super::FIELD_SIZE;

/// Opcodes, sent as ASCII digits
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum OpCode {
    Connect = b'1',
    Disconnect = b'2',
    Subscribe = b'3',
    Unsubscribe = b'4',
}

impl OpCode {
    pub fn from_byte(byte: u8) -> Result<Self> {
        match byte {
            b'1' => Ok(OpCode::Connect),
            b'2' => Ok(OpCode::Disconnect),
            b'3' => Ok(OpCode::Subscribe),
            b'4' => Ok(OpCode::Unsubscribe),
            _ => Err(KvsError::Protocol(format!("Unknown opcode: 0x{:02x}", byte))),
        }
    }

    pub fn as_byte(self) -> u8 {
        self as u8
    }

    /// Payload length following the opcode on the request channel
    pub fn payload_len(self) -> usize {
        match self {
            OpCode::Connect => 3 * FIELD_SIZE,
            OpCode::Disconnect => 0,
            OpCode::Subscribe | OpCode::Unsubscribe => FIELD_SIZE,
        }
    }
}

/// Channel identifiers a client announces on the rendezvous channel
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectRequest {
    /// Channel the client writes requests to
    pub request: String,

    /// Channel the client reads responses from
    pub response: String,

    /// Channel the client reads notifications from
    pub notification: String,
}

/// A steady-state request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    Subscribe { key: String },
    Unsubscribe { key: String },
    Disconnect,
}

impl Request {
    pub fn opcode(&self) -> OpCode {
        match self {
            Request::Subscribe { .. } => OpCode::Subscribe,
            Request::Unsubscribe { .. } => OpCode::Unsubscribe,
            Request::Disconnect => OpCode::Disconnect,
        }
    }
}
