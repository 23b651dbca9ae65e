//! Network Module
//!
//! TCP transport for client sessions.
//!
//! ## Architecture
//! - Single acceptor thread on the rendezvous address
//! - One short-lived handshake thread per connection reads CONNECT and dials
//!   the three client channels; the acceptor then queues the session
//! - Fixed pool of session workers (see `session`)
//! - `SIGUSR1` forces every session closed (Unix, see `signal`)
//!
//! ```text
//!   client                                server
//!   bind req/resp/notif ──CONNECT──▶ rendezvous
//!                       ◀──dial x3──
//!                       ◀──ack──── (when a worker picks the session up)
//! ```

mod client;
mod server;
#[cfg(unix)]
pub mod signal;

pub use client::{Client, NotificationStream};
pub use server::{Server, ServerHandle};
