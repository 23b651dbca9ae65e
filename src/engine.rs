//! Engine Module
//!
//! Owns the store and the backup manager and executes job operations.
//!
//! ## Responsibilities
//! - Create the store and backup directory once at startup
//! - Execute structured operations and render their textual output
//! - Wait for in-flight backups on close

use std::fs;
use std::io::Write;
use std::sync::Arc;
use std::thread;

use crate::backup::{BackupManager, BackupTicket, SnapshotWriter};
use crate::config::Config;
use crate::error::{KvsError, Result};
use crate::format;
use crate::job::Operation;
use crate::store::KeyedStore;

const HELP_TEXT: &str = concat!(
    "Available commands:\n",
    "  WRITE [(key,value)(key2,value2),...]\n",
    "  READ [key,key2,...]\n",
    "  DELETE [key,key2,...]\n",
    "  SHOW\n",
    "  WAIT <delay_ms>\n",
    "  BACKUP\n",
    "  HELP\n",
);

/// The embedded key-value engine
///
/// The store is shared (`Arc`) so the session server can embed the same
/// instance the jobs run against.
pub struct Engine {
    config: Config,
    store: Arc<KeyedStore>,
    backups: BackupManager,
}

impl Engine {
    /// Create an engine with the given config
    pub fn open(config: Config) -> Result<Self> {
        config.validate()?;
        let backups = BackupManager::new(&config.backup_dir, config.max_backups)?;
        Self::assemble(config, backups)
    }

    /// Create an engine whose backups go through a custom serializer
    pub fn with_snapshot_writer(config: Config, writer: Arc<dyn SnapshotWriter>) -> Result<Self> {
        config.validate()?;
        let backups = BackupManager::with_writer(&config.backup_dir, config.max_backups, writer)?;
        Self::assemble(config, backups)
    }

    fn assemble(config: Config, backups: BackupManager) -> Result<Self> {
        fs::create_dir_all(&config.backup_dir).map_err(|e| {
            KvsError::Init(format!(
                "cannot create backup directory {}: {}",
                config.backup_dir.display(),
                e
            ))
        })?;

        let store = Arc::new(KeyedStore::new(config.subscriber_limit));
        tracing::debug!(
            "Engine ready: {} subscribers per key, {} concurrent backups",
            config.subscriber_limit,
            config.max_backups
        );

        Ok(Self {
            config,
            store,
            backups,
        })
    }

    /// Execute one operation on behalf of `job`, writing any output to `out`
    ///
    /// Per-key failures are logged, not returned. Errors are output I/O
    /// failures or a failed backup.
    pub fn execute<W: Write + ?Sized>(
        &self,
        job: &str,
        operation: Operation,
        out: &mut W,
    ) -> Result<()> {
        match operation {
            Operation::Write(pairs) => {
                for rejected in self.store.write(&pairs) {
                    tracing::warn!(
                        "Job {}: failed to write {:?}: {}",
                        job, rejected.key, rejected.error
                    );
                }
            }
            Operation::Read(mut keys) => {
                // Output is sorted; lock order is computed independently by the store.
                keys.sort();
                let results = self.store.read(&keys);
                format::write_read(out, &results)?;
            }
            Operation::Delete(keys) => {
                let missing = self.store.delete(&keys);
                format::write_missing(out, &missing)?;
            }
            Operation::Show => {
                let snapshot = self.store.snapshot();
                format::write_show(out, &snapshot)?;
            }
            Operation::Wait(delay) => {
                if !delay.is_zero() {
                    writeln!(out, "Waiting...")?;
                    out.flush()?;
                    thread::sleep(delay);
                }
            }
            Operation::Backup => {
                let ticket = self.backup(job)?;
                tracing::debug!(
                    "Job {}: backup {} -> {}",
                    job,
                    ticket.sequence,
                    ticket.path.display()
                );
            }
            Operation::Help => out.write_all(HELP_TEXT.as_bytes())?,
        }
        Ok(())
    }

    /// Start a backup for `job`, waiting for a free slot if necessary
    pub fn backup(&self, job: &str) -> Result<BackupTicket> {
        self.backups.request_backup(&self.store, job)
    }

    /// Wait for every in-flight backup, then drop the store
    pub fn close(self) -> Result<()> {
        self.backups.wait_idle();
        tracing::debug!("Engine closed with {} keys", self.store.len());
        Ok(())
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    pub fn store(&self) -> &Arc<KeyedStore> {
        &self.store
    }

    pub fn backups(&self) -> &BackupManager {
        &self.backups
    }

    pub fn config(&self) -> &Config {
        &self.config
    }
}
