//! Session Module
//!
//! Client sessions and the pool that serves them.
//!
//! ## Lifecycle
//! ```text
//!   Connecting ──ack sent──▶ Active ──DISCONNECT / EOF / error / forced──▶ Disconnected
//!        │                                                                   ▲
//!        └──────────────────────── forced close ─────────────────────────────┘
//! ```
//!
//! A session owns three channels:
//! - request (read): SUBSCRIBE / UNSUBSCRIBE / DISCONNECT frames
//! - response (write): `{opcode, status}` replies
//! - notification (write): pushed by a per-session notifier thread
//!
//! Teardown removes the session from the client table and from every
//! subscriber set before its channels are closed, exactly once.

mod dispatcher;
mod table;

use std::io::{ErrorKind, Read};
use std::net::{Shutdown, SocketAddr, TcpStream};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam::channel::{Receiver, RecvTimeoutError};
use parking_lot::Mutex;

use crate::error::{KvsError, Result};
use crate::protocol::{
    decode_request, write_notification, write_response, ConnectRequest, OpCode, Request, Response,
    Status,
};
use crate::store::KeyedStore;
use crate::subscription::{Notification, QueueSink};

pub use dispatcher::{SessionContext, SessionDispatcher};
pub use table::ClientTable;

/// Monotonic session identity; doubles as the session's sink id
pub type SessionId = u64;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// What the request channel produced
enum Incoming {
    Request(Request),
    /// Well-framed but undecodable payload
    Malformed(OpCode),
    Closed,
}

/// Lifecycle state of a session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Connecting,
    Active,
    Disconnected,
}

/// Tunables applied when a session's channels are opened
#[derive(Debug, Clone, Copy)]
pub struct SessionOptions {
    /// Read timeout on the request channel
    pub poll_interval: Duration,

    /// Notifications buffered before new ones are dropped
    pub notification_queue: usize,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(100),
            notification_queue: 256,
        }
    }
}

/// The part of a session other threads may touch: state and channel closers
pub struct SessionControl {
    id: SessionId,
    state: Mutex<SessionState>,
    channels: [TcpStream; 3],
}

impl SessionControl {
    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn state(&self) -> SessionState {
        *self.state.lock()
    }

    pub fn is_disconnected(&self) -> bool {
        self.state() == SessionState::Disconnected
    }

    fn activate(&self) -> bool {
        let mut state = self.state.lock();
        if *state != SessionState::Connecting {
            return false;
        }
        *state = SessionState::Active;
        true
    }

    /// Move to Disconnected and release everything; only the first caller wins
    ///
    /// Order: client table, subscriptions, then channels. Closing the
    /// channels wakes a worker blocked in a receive.
    pub fn disconnect(&self, store: &KeyedStore, table: &ClientTable) -> bool {
        {
            let mut state = self.state.lock();
            if *state == SessionState::Disconnected {
                return false;
            }
            *state = SessionState::Disconnected;
        }

        table.remove(self.id);
        let released = store.unsubscribe_all(self.id);

        for channel in &self.channels {
            if let Err(e) = channel.shutdown(Shutdown::Both) {
                if e.kind() != ErrorKind::NotConnected {
                    tracing::debug!("Session {}: closing channel failed: {}", self.id, e);
                }
            }
        }

        tracing::info!(
            "Session {} disconnected, {} subscriptions released",
            self.id, released
        );
        true
    }
}

/// One connected client, owned by the worker serving it
pub struct ClientSession {
    control: Arc<SessionControl>,
    request: TcpStream,
    response: TcpStream,
    notification: Option<TcpStream>,
    sink: Arc<QueueSink>,
    queue: Option<Receiver<Notification>>,
    notifier: Option<JoinHandle<()>>,
    poll_interval: Duration,
}

impl ClientSession {
    /// Open the three channels announced in a CONNECT frame
    pub fn open(id: SessionId, connect: &ConnectRequest, options: SessionOptions) -> Result<Self> {
        let request = open_channel(id, "request", &connect.request)?;
        let response = open_channel(id, "response", &connect.response)?;
        let notification = open_channel(id, "notification", &connect.notification)?;

        request.set_read_timeout(Some(options.poll_interval))?;

        let channels = [
            request.try_clone()?,
            response.try_clone()?,
            notification.try_clone()?,
        ];
        let (sink, queue) = QueueSink::bounded(id, options.notification_queue);

        tracing::debug!(
            "Session {} channels opened: req={} resp={} notif={}",
            id, connect.request, connect.response, connect.notification
        );

        Ok(Self {
            control: Arc::new(SessionControl {
                id,
                state: Mutex::new(SessionState::Connecting),
                channels,
            }),
            request,
            response,
            notification: Some(notification),
            sink: Arc::new(sink),
            queue: Some(queue),
            notifier: None,
            poll_interval: options.poll_interval,
        })
    }

    pub fn id(&self) -> SessionId {
        self.control.id
    }

    pub fn state(&self) -> SessionState {
        self.control.state()
    }

    pub fn control(&self) -> &Arc<SessionControl> {
        &self.control
    }

    /// Complete the handshake: start the notifier and acknowledge CONNECT
    pub fn activate(&mut self) -> Result<()> {
        if !self.control.activate() {
            return Err(KvsError::ChannelClosed(format!(
                "session {} was closed before activation",
                self.id()
            )));
        }

        if let (Some(stream), Some(queue)) = (self.notification.take(), self.queue.take()) {
            self.notifier = Some(spawn_notifier(
                Arc::clone(&self.control),
                stream,
                queue,
                self.poll_interval,
            )?);
        }

        self.respond(Response::ok(OpCode::Connect))?;
        tracing::info!("Session {} active", self.id());
        Ok(())
    }

    /// Serve requests until the client disconnects, the session is closed
    /// or the dispatcher stops
    pub fn serve(&mut self, context: &SessionContext) -> Result<()> {
        let store = context.store();
        loop {
            let request = match self.next_request(context)? {
                Incoming::Request(request) => request,
                Incoming::Malformed(opcode) => {
                    self.respond(Response::new(opcode, Status::BadRequest))?;
                    continue;
                }
                Incoming::Closed if context.is_stopping() => {
                    tracing::debug!("Session {}: dispatcher stopping", self.id());
                    return Ok(());
                }
                Incoming::Closed => {
                    tracing::debug!("Session {}: request channel closed", self.id());
                    return Ok(());
                }
            };

            match request {
                Request::Disconnect => {
                    self.respond(Response::ok(OpCode::Disconnect))?;
                    return Ok(());
                }
                Request::Subscribe { key } => {
                    let outcome = store.subscribe(&key, self.sink.clone());
                    tracing::debug!("Session {}: subscribe {:?} -> {:?}", self.id(), key, outcome);
                    self.respond(Response::new(OpCode::Subscribe, outcome))?;
                }
                Request::Unsubscribe { key } => {
                    let outcome = store.unsubscribe(&key, self.id());
                    tracing::debug!(
                        "Session {}: unsubscribe {:?} -> {:?}",
                        self.id(),
                        key,
                        outcome
                    );
                    self.respond(Response::new(OpCode::Unsubscribe, outcome))?;
                }
            }
        }
    }

    /// Tear the session down and wait for its notifier
    pub fn finish(self, store: &KeyedStore, table: &ClientTable) {
        let id = self.id();
        let ClientSession {
            control,
            sink,
            notifier,
            ..
        } = self;

        if !control.disconnect(store, table) {
            // Closed by someone else; sweep anything subscribed in the meantime.
            store.unsubscribe_all(id);
        }
        drop(sink);

        if let Some(handle) = notifier {
            if handle.join().is_err() {
                tracing::error!("Session {}: notifier thread panicked", id);
            }
        }
    }

    /// Next request frame
    ///
    /// An unknown opcode is an error: the frame length, and with it the
    /// framing of the rest of the stream, is lost.
    fn next_request(&mut self, context: &SessionContext) -> Result<Incoming> {
        let mut opcode = [0u8; 1];
        if !self.fill(context, &mut opcode)? {
            return Ok(Incoming::Closed);
        }
        let opcode = OpCode::from_byte(opcode[0])?;

        let mut payload = vec![0u8; opcode.payload_len()];
        if !self.fill(context, &mut payload)? {
            return Ok(Incoming::Closed);
        }
        match decode_request(opcode, &payload) {
            Ok(request) => Ok(Incoming::Request(request)),
            Err(e) => {
                tracing::warn!("Session {}: bad {:?} request: {}", self.id(), opcode, e);
                Ok(Incoming::Malformed(opcode))
            }
        }
    }

    /// Fill `buf` from the request channel, re-checking for a forced close
    /// or a stopping dispatcher every poll interval
    fn fill(&mut self, context: &SessionContext, buf: &mut [u8]) -> Result<bool> {
        let mut filled = 0;
        while filled < buf.len() {
            if self.control.is_disconnected() || context.is_stopping() {
                return Ok(false);
            }
            match self.request.read(&mut buf[filled..]) {
                Ok(0) => return Ok(false),
                Ok(n) => filled += n,
                Err(e)
                    if matches!(
                        e.kind(),
                        ErrorKind::WouldBlock | ErrorKind::TimedOut | ErrorKind::Interrupted
                    ) => {}
                Err(e) => return Err(e.into()),
            }
        }
        Ok(true)
    }

    fn respond(&mut self, response: Response) -> Result<()> {
        write_response(&mut self.response, &response)
    }
}

fn open_channel(id: SessionId, role: &str, address: &str) -> Result<TcpStream> {
    let addr: SocketAddr = address.parse().map_err(|_| {
        KvsError::Init(format!(
            "session {}: bad {} channel id {:?}",
            id, role, address
        ))
    })?;
    let stream = TcpStream::connect_timeout(&addr, CONNECT_TIMEOUT).map_err(|e| {
        KvsError::Init(format!(
            "session {}: cannot open {} channel {}: {}",
            id, role, address, e
        ))
    })?;
    stream.set_nodelay(true)?;
    Ok(stream)
}

/// Drain the session's notification queue onto its notification channel
fn spawn_notifier(
    control: Arc<SessionControl>,
    mut stream: TcpStream,
    queue: Receiver<Notification>,
    poll_interval: Duration,
) -> Result<JoinHandle<()>> {
    let handle = thread::Builder::new()
        .name(format!("notify-{}", control.id))
        .spawn(move || loop {
            match queue.recv_timeout(poll_interval) {
                Ok(notification) => {
                    if let Err(e) = write_notification(&mut stream, &notification) {
                        tracing::debug!(
                            "Session {}: notification channel failed: {}",
                            control.id,
                            e
                        );
                        return;
                    }
                }
                Err(RecvTimeoutError::Timeout) => {
                    if control.is_disconnected() {
                        return;
                    }
                }
                Err(RecvTimeoutError::Disconnected) => return,
            }
        })?;
    Ok(handle)
}
