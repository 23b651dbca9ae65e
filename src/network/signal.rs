//! Management signals
//!
//! `SIGUSR1` asks a running server to close every live session while it
//! keeps accepting new ones.

use std::os::raw::c_int;
use std::thread::{self, JoinHandle};

use signal_hook::iterator::{Handle, Signals};

use crate::error::{KvsError, Result};
use super::ServerHandle;

pub use signal_hook::consts::SIGUSR1;

/// Background thread forwarding a signal to `ServerHandle::disconnect_all`
///
/// Dropping it unregisters the listener and joins the thread.
pub struct DisconnectSignal {
    handle: Handle,
    thread: Option<JoinHandle<()>>,
}

/// Call `server.disconnect_all()` every time `signal` is delivered
pub fn disconnect_on(signal: c_int, server: ServerHandle) -> Result<DisconnectSignal> {
    let mut signals = Signals::new([signal])
        .map_err(|e| KvsError::Init(format!("cannot register signal {}: {}", signal, e)))?;
    let handle = signals.handle();

    let thread = thread::Builder::new()
        .name("signals".to_string())
        .spawn(move || {
            for received in signals.forever() {
                tracing::info!("Received signal {}, disconnecting all sessions", received);
                server.disconnect_all();
            }
        })
        .map_err(|e| KvsError::Init(format!("cannot spawn signal thread: {}", e)))?;

    Ok(DisconnectSignal {
        handle,
        thread: Some(thread),
    })
}

impl Drop for DisconnectSignal {
    fn drop(&mut self) {
        self.handle.close();
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                tracing::error!("Signal thread panicked");
            }
        }
    }
}
