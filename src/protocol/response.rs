//! Response definitions
//!
//! Represents responses to clients.

use crate::error::{KvsError, Result};
use crate::subscription::{SubscribeOutcome, UnsubscribeOutcome};
use super::OpCode;

/// Response status codes, sent as ASCII digits
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Status {
    Ok = b'0',
    NotFound = b'1',
    LimitReached = b'2',
    BadRequest = b'3',
}

impl Status {
    pub fn from_byte(byte: u8) -> Result<Self> {
        match byte {
            b'0' => Ok(Status::Ok),
            b'1' => Ok(Status::NotFound),
            b'2' => Ok(Status::LimitReached),
            b'3' => Ok(Status::BadRequest),
            _ => Err(KvsError::Protocol(format!(
                "Unknown response status: 0x{:02x}",
                byte
            ))),
        }
    }

    pub fn as_byte(self) -> u8 {
        self as u8
    }

    pub fn is_ok(self) -> bool {
        self == Status::Ok
    }

    /// The error a non-success status stands for, for a request on `key`
    pub fn into_result(self, key: &str) -> Result<()> {
        match self {
            Status::Ok => Ok(()),
            Status::NotFound => Err(KvsError::KeyNotFound(key.to_string())),
            Status::LimitReached => Err(KvsError::SubscriberLimit(key.to_string())),
            Status::BadRequest => Err(KvsError::Protocol(format!(
                "server rejected the request for {:?}",
                key
            ))),
        }
    }
}

impl From<SubscribeOutcome> for Status {
    fn from(outcome: SubscribeOutcome) -> Self {
        match outcome {
            SubscribeOutcome::Subscribed | SubscribeOutcome::AlreadySubscribed => Status::Ok,
            SubscribeOutcome::KeyNotFound => Status::NotFound,
            SubscribeOutcome::LimitReached => Status::LimitReached,
        }
    }
}

impl From<UnsubscribeOutcome> for Status {
    fn from(outcome: UnsubscribeOutcome) -> Self {
        match outcome {
            UnsubscribeOutcome::Removed => Status::Ok,
            UnsubscribeOutcome::NotSubscribed | UnsubscribeOutcome::KeyNotFound => Status::NotFound,
        }
    }
}

/// A response to send to a client
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Response {
    /// Opcode of the request being answered
    pub opcode: OpCode,

    pub status: Status,
}

impl Response {
    pub fn new(opcode: OpCode, status: impl Into<Status>) -> Self {
        Self {
            opcode,
            status: status.into(),
        }
    }

    pub fn ok(opcode: OpCode) -> Self {
        Self::new(opcode, Status::Ok)
    }
}
