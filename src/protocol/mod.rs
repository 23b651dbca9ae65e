//! Protocol Module
//!
//! Defines the wire protocol between clients and the session server.
//!
//! ## Protocol Format (fixed-size frames, ASCII opcodes)
//!
//! ### Handshake (rendezvous channel)
//! ```text
//! ┌────────┬──────────────────┬──────────────────┬──────────────────┐
//! │ '1'(1) │ request id (40)  │ response id (40) │ notif. id (40)   │
//! └────────┴──────────────────┴──────────────────┴──────────────────┘
//! ```
//!
//! ### Requests (request channel)
//! - `'2'`: DISCONNECT  - no payload
//! - `'3'`: SUBSCRIBE   - key (40)
//! - `'4'`: UNSUBSCRIBE - key (40)
//!
//! ### Response Format (response channel)
//! ```text
//! ┌───────────┬───────────┐
//! │ Opcode(1) │ Status(1) │
//! └───────────┴───────────┘
//! ```
//!
//! ### Status Codes
//! - `'0'`: OK
//! - `'1'`: NOT_FOUND (key absent, or not subscribed)
//! - `'2'`: LIMIT_REACHED
//! - `'3'`: BAD_REQUEST
//!
//! ### Notifications (notification channel)
//! `(key, value)` or `(key, DELETED)` as text, NUL-padded to 85 bytes.
//!
//! Every field is NUL-padded to its width.

mod codec;
mod command;
mod response;

pub use codec::{
    decode_connect, decode_field, decode_notification, decode_request, encode_connect,
    encode_field, encode_notification, encode_request, encode_response, read_notification,
    read_request, read_response, write_notification, write_response,
};
pub use command::{ConnectRequest, OpCode, Request};
pub use response::{Response, Status};

/// Width of every string field
pub const FIELD_SIZE: usize = 40;

/// Size of a CONNECT frame
pub const CONNECT_FRAME_SIZE: usize = 1 + 3 * FIELD_SIZE;

/// Size of a response frame
pub const RESPONSE_SIZE: usize = 2;

/// Size of a notification frame: `(` key `, ` value `)` plus a NUL
pub const NOTIFICATION_SIZE: usize = 2 * FIELD_SIZE + 5;
