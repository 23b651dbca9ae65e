//! Registry of live sessions, used for forced disconnects

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;

use super::{SessionControl, SessionId};

/// Sessions currently registered with the server
#[derive(Default)]
pub struct ClientTable {
    sessions: Mutex<HashMap<SessionId, Arc<SessionControl>>>,
}

impl ClientTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, control: Arc<SessionControl>) {
        self.sessions.lock().insert(control.id(), control);
    }

    pub fn remove(&self, id: SessionId) -> Option<Arc<SessionControl>> {
        self.sessions.lock().remove(&id)
    }

    /// Take every registered session out of the table
    ///
    /// The lock is released before returning, so callers may disconnect
    /// each session (which calls back into `remove`).
    pub fn drain(&self) -> Vec<Arc<SessionControl>> {
        self.sessions.lock().drain().map(|(_, control)| control).collect()
    }

    pub fn len(&self) -> usize {
        self.sessions.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
