//! Session server
//!
//! Accepts CONNECT frames on the rendezvous address and hands each new
//! session to the dispatcher.
//!
//! ```text
//!   accept loop ──spawn──▶ handshake thread (read CONNECT, open channels)
//!        ▲                          │
//!        └──────── ready sessions ◀─┘
//!        │
//!        └──submit──▶ dispatcher (blocks while the buffer is full)
//! ```
//!
//! The accept loop never reads from a peer, so a client that connects and
//! stays silent only holds its own handshake thread.

use std::io::{ErrorKind, Read};
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crossbeam::channel::{self, SendError, Sender};

use crate::config::Config;
use crate::error::{KvsError, Result};
use crate::protocol::{decode_connect, CONNECT_FRAME_SIZE};
use crate::session::{ClientSession, SessionContext, SessionDispatcher, SessionOptions};
use crate::store::KeyedStore;

const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(5);

/// Rendezvous server for client sessions
pub struct Server {
    listener: TcpListener,
    local_addr: SocketAddr,
    dispatcher: SessionDispatcher,
    context: Arc<SessionContext>,
    flags: Arc<ServerFlags>,
    options: SessionOptions,
}

/// Management requests, observed by the accept loop
#[derive(Default)]
struct ServerFlags {
    shutdown: AtomicBool,
    disconnect: AtomicBool,
}

/// Cloneable management handle for a running server
#[derive(Clone)]
pub struct ServerHandle {
    local_addr: SocketAddr,
    context: Arc<SessionContext>,
    flags: Arc<ServerFlags>,
}

impl Server {
    /// Bind the rendezvous address and start the session workers
    pub fn bind(config: &Config, store: Arc<KeyedStore>) -> Result<Self> {
        config.validate()?;

        let listener = TcpListener::bind(&config.listen_addr).map_err(|e| {
            KvsError::Init(format!("cannot bind {}: {}", config.listen_addr, e))
        })?;
        listener.set_nonblocking(true)?;
        let local_addr = listener.local_addr()?;

        let context = Arc::new(SessionContext::new(store));
        let dispatcher = SessionDispatcher::start(
            Arc::clone(&context),
            config.session_workers,
            config.session_buffer,
        )?;

        tracing::info!(
            "Session server listening on {} ({} workers, buffer {})",
            local_addr, config.session_workers, config.session_buffer
        );

        Ok(Self {
            listener,
            local_addr,
            dispatcher,
            context,
            flags: Arc::new(ServerFlags::default()),
            options: SessionOptions {
                poll_interval: config.poll_interval(),
                notification_queue: config.notification_queue,
            },
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn handle(&self) -> ServerHandle {
        ServerHandle {
            local_addr: self.local_addr,
            context: Arc::clone(&self.context),
            flags: Arc::clone(&self.flags),
        }
    }

    /// Accept sessions until `ServerHandle::shutdown` is called (blocking)
    pub fn run(self) -> Result<()> {
        let poll = self.options.poll_interval;
        let (ready_tx, ready_rx) = channel::unbounded();

        while !self.flags.shutdown.load(Ordering::SeqCst) {
            self.service_disconnect();

            for session in ready_rx.try_iter() {
                self.enqueue(session);
            }

            match self.listener.accept() {
                Ok((stream, peer)) => self.spawn_handshake(stream, peer, ready_tx.clone()),
                Err(e) if e.kind() == ErrorKind::WouldBlock => {
                    if let Ok(session) = ready_rx.recv_timeout(poll) {
                        self.enqueue(session);
                    }
                }
                Err(e) if e.kind() == ErrorKind::Interrupted => {}
                Err(e) => {
                    tracing::error!("Accept failed: {}", e);
                    thread::sleep(poll);
                }
            }
        }

        tracing::info!("Session server on {} shutting down", self.local_addr);
        drop(ready_tx);
        for session in ready_rx.try_iter() {
            session.finish(self.context.store(), self.context.table());
        }
        drop(ready_rx);

        self.dispatcher.shutdown();
        Ok(())
    }

    /// Run the handshake for one rendezvous connection off the accept loop
    fn spawn_handshake(&self, stream: TcpStream, peer: SocketAddr, ready: Sender<ClientSession>) {
        let context = Arc::clone(&self.context);
        let options = self.options;

        let spawned = thread::Builder::new()
            .name(format!("handshake-{}", peer))
            .spawn(move || match handshake(stream, &context, options) {
                Ok(session) => {
                    // The accept loop has already stopped.
                    if let Err(SendError(session)) = ready.send(session) {
                        session.finish(context.store(), context.table());
                    }
                }
                Err(e) => tracing::warn!("Rejected session from {}: {}", peer, e),
            });

        if let Err(e) = spawned {
            tracing::error!("Cannot start handshake for {}: {}", peer, e);
        }
    }

    /// Queue an opened session, blocking while the session buffer is full
    fn enqueue(&self, mut session: ClientSession) {
        loop {
            match self
                .dispatcher
                .submit_timeout(session, self.options.poll_interval)
            {
                Ok(()) => return,
                Err(returned) => {
                    if self.flags.shutdown.load(Ordering::SeqCst) {
                        returned.finish(self.context.store(), self.context.table());
                        return;
                    }
                    self.service_disconnect();
                    session = returned;
                }
            }
        }
    }

    fn service_disconnect(&self) {
        if self.flags.disconnect.swap(false, Ordering::SeqCst) {
            self.context.disconnect_all();
        }
    }
}

/// Read a CONNECT frame and open the three channels it names
fn handshake(
    mut rendezvous: TcpStream,
    context: &SessionContext,
    options: SessionOptions,
) -> Result<ClientSession> {
    rendezvous.set_nonblocking(false)?;
    rendezvous.set_read_timeout(Some(HANDSHAKE_TIMEOUT))?;

    let mut frame = [0u8; CONNECT_FRAME_SIZE];
    rendezvous.read_exact(&mut frame)?;
    let connect = decode_connect(&frame)?;

    let id = context.allocate_id();
    let session = ClientSession::open(id, &connect, options)?;
    tracing::debug!("Session {} connecting", id);
    Ok(session)
}

impl ServerHandle {
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Ask the accept loop to close every live session
    ///
    /// Takes effect within one poll interval; new sessions are still accepted.
    pub fn disconnect_all(&self) {
        self.flags.disconnect.store(true, Ordering::SeqCst);
    }

    /// Ask the accept loop to stop; `Server::run` returns once workers join
    pub fn shutdown(&self) {
        self.flags.shutdown.store(true, Ordering::SeqCst);
    }

    pub fn is_shutdown(&self) -> bool {
        self.flags.shutdown.load(Ordering::SeqCst)
    }

    /// Sessions currently registered
    pub fn session_count(&self) -> usize {
        self.context.table().len()
    }
}
