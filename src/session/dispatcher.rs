//! Session dispatcher
//!
//! A bounded buffer of freshly connected sessions, drained by a fixed pool
//! of worker threads. Each worker serves one session until it ends.
//!
//! ```text
//!   acceptor ──submit──▶ [ bounded buffer ] ──▶ worker 0..W ──serve──▶ finish
//! ```

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam::channel::{self, Receiver, SendTimeoutError, Sender};

use crate::error::{KvsError, Result};
use crate::store::KeyedStore;
use super::{ClientSession, ClientTable, SessionId};

/// State shared by the acceptor, the workers and the management handle
pub struct SessionContext {
    store: Arc<KeyedStore>,
    table: ClientTable,
    next_id: AtomicU64,
    stopping: AtomicBool,
}

impl SessionContext {
    pub fn new(store: Arc<KeyedStore>) -> Self {
        Self {
            store,
            table: ClientTable::new(),
            next_id: AtomicU64::new(1),
            stopping: AtomicBool::new(false),
        }
    }

    pub fn store(&self) -> &Arc<KeyedStore> {
        &self.store
    }

    pub fn table(&self) -> &ClientTable {
        &self.table
    }

    /// Allocate the next session id
    pub fn allocate_id(&self) -> SessionId {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }

    pub fn is_stopping(&self) -> bool {
        self.stopping.load(Ordering::SeqCst)
    }

    pub fn stop(&self) {
        self.stopping.store(true, Ordering::SeqCst);
    }

    /// Forcibly close every registered session
    ///
    /// Returns the number of sessions this call closed.
    pub fn disconnect_all(&self) -> usize {
        let sessions = self.table.drain();
        let closed = sessions
            .iter()
            .filter(|control| control.disconnect(&self.store, &self.table))
            .count();
        if closed > 0 {
            tracing::info!("Forced disconnect of {} sessions", closed);
        }
        closed
    }
}

/// Fixed worker pool fed by a bounded session buffer
pub struct SessionDispatcher {
    sender: Sender<ClientSession>,
    workers: Vec<JoinHandle<()>>,
    context: Arc<SessionContext>,
}

impl SessionDispatcher {
    /// Start `workers` threads behind a buffer of `capacity` sessions
    pub fn start(context: Arc<SessionContext>, workers: usize, capacity: usize) -> Result<Self> {
        let (sender, receiver) = channel::bounded(capacity.max(1));

        let mut handles = Vec::with_capacity(workers);
        for worker in 0..workers.max(1) {
            let receiver = receiver.clone();
            let context = Arc::clone(&context);
            let handle = thread::Builder::new()
                .name(format!("session-worker-{}", worker))
                .spawn(move || worker_loop(worker, receiver, context))
                .map_err(|e| KvsError::Init(format!("cannot spawn session worker: {}", e)))?;
            handles.push(handle);
        }

        tracing::debug!(
            "Session dispatcher started: {} workers, buffer of {}",
            handles.len(),
            capacity
        );

        Ok(Self {
            sender,
            workers: handles,
            context,
        })
    }

    /// Queue a session, waiting up to `timeout` for buffer space
    ///
    /// The session is handed back if the buffer stayed full.
    pub fn submit_timeout(
        &self,
        session: ClientSession,
        timeout: Duration,
    ) -> std::result::Result<(), ClientSession> {
        match self.sender.send_timeout(session, timeout) {
            Ok(()) => Ok(()),
            Err(SendTimeoutError::Timeout(session))
            | Err(SendTimeoutError::Disconnected(session)) => Err(session),
        }
    }

    pub fn context(&self) -> &Arc<SessionContext> {
        &self.context
    }

    /// Stop accepting work, close live sessions and join the workers
    ///
    /// Sessions still in the buffer are torn down without being served.
    pub fn shutdown(self) {
        self.context.stop();
        self.context.disconnect_all();
        drop(self.sender);

        for handle in self.workers {
            if handle.join().is_err() {
                tracing::error!("Session worker panicked");
            }
        }
        tracing::debug!("Session dispatcher stopped");
    }
}

fn worker_loop(worker: usize, receiver: Receiver<ClientSession>, context: Arc<SessionContext>) {
    for session in receiver.iter() {
        if context.is_stopping() {
            session.finish(&context.store, &context.table);
            continue;
        }
        tracing::debug!("Session worker {} picked session {}", worker, session.id());
        serve_session(session, &context);
    }
}

fn serve_session(mut session: ClientSession, context: &SessionContext) {
    let id = session.id();
    // Registered before the ack so a forced close can reach it at any point.
    context.table.insert(Arc::clone(session.control()));

    // `shutdown` may have drained the table between the worker's check and
    // the insert above.
    if context.is_stopping() {
        tracing::debug!("Session {} dropped: dispatcher stopping", id);
        session.finish(&context.store, &context.table);
        return;
    }

    let result = session.activate().and_then(|()| session.serve(context));
    match result {
        Ok(()) => tracing::debug!("Session {} ended", id),
        Err(KvsError::ChannelClosed(reason)) => tracing::debug!("Session {} ended: {}", id, reason),
        Err(e) if e.is_disconnect() => tracing::debug!("Session {} lost its client: {}", id, e),
        Err(e) => tracing::warn!("Session {} failed: {}", id, e),
    }

    session.finish(&context.store, &context.table);
}
