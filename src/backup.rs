//! Backup Manager
//!
//! Bounded-concurrency point-in-time backups.
//!
//! ## Flow
//! 1. Wait (holding no store lock) until fewer than `limit` backups run
//! 2. Reserve a slot, the next sequence number and the job's next ordinal
//! 3. Take a consistent `KeyedStore::snapshot()` (a deep copy)
//! 4. Serialize it on a dedicated thread to `<dir>/<job>-<ordinal>.bck`
//! 5. The thread frees its slot and wakes waiters, even if it failed

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread;

use parking_lot::{Condvar, Mutex, MutexGuard};

use crate::error::{KvsError, Result};
use crate::format;
use crate::store::KeyedStore;

/// File extension of backup artifacts
pub const BACKUP_EXTENSION: &str = "bck";

/// Serializes a snapshot somewhere durable
pub trait SnapshotWriter: Send + Sync + 'static {
    fn write_snapshot(&self, path: &Path, snapshot: &[(String, String)]) -> Result<()>;
}

/// Writes snapshots as SHOW-formatted text files
#[derive(Debug, Default, Clone, Copy)]
pub struct FileSnapshotWriter;

impl SnapshotWriter for FileSnapshotWriter {
    fn write_snapshot(&self, path: &Path, snapshot: &[(String, String)]) -> Result<()> {
        let mut writer = BufWriter::new(File::create(path)?);
        format::write_show(&mut writer, snapshot)?;
        writer.flush()?;
        Ok(())
    }
}

/// An accepted backup request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackupTicket {
    /// Store-wide sequence number, starting at 1
    pub sequence: u64,

    /// Where the snapshot is being written
    pub path: PathBuf,
}

struct BackupState {
    active: usize,
    sequence: u64,
    per_job: HashMap<String, u64>,
}

struct Shared {
    limit: usize,
    state: Mutex<BackupState>,
    finished: Condvar,
}

/// Frees a backup slot when dropped
struct Slot {
    shared: Arc<Shared>,
}

impl Drop for Slot {
    fn drop(&mut self) {
        let mut state = self.shared.state.lock();
        state.active -= 1;
        drop(state);
        self.shared.finished.notify_all();
    }
}

/// Runs backups with at most `limit` in flight
pub struct BackupManager {
    shared: Arc<Shared>,
    dir: PathBuf,
    writer: Arc<dyn SnapshotWriter>,
}

impl BackupManager {
    /// Create a manager writing `.bck` files into `dir`
    pub fn new(dir: impl Into<PathBuf>, limit: usize) -> Result<Self> {
        Self::with_writer(dir, limit, Arc::new(FileSnapshotWriter))
    }

    /// Create a manager with a custom serializer
    pub fn with_writer(
        dir: impl Into<PathBuf>,
        limit: usize,
        writer: Arc<dyn SnapshotWriter>,
    ) -> Result<Self> {
        if limit == 0 {
            return Err(KvsError::Config(
                "backup limit must be greater than zero".to_string(),
            ));
        }
        Ok(Self {
            shared: Arc::new(Shared {
                limit,
                state: Mutex::new(BackupState {
                    active: 0,
                    sequence: 0,
                    per_job: HashMap::new(),
                }),
                finished: Condvar::new(),
            }),
            dir: dir.into(),
            writer,
        })
    }

    /// Start a backup, waiting for a free slot if all are busy
    pub fn request_backup(&self, store: &KeyedStore, job: &str) -> Result<BackupTicket> {
        let mut state = self.shared.state.lock();
        while state.active >= self.shared.limit {
            tracing::debug!(
                "Backup for job {} waiting: {} of {} slots busy",
                job, state.active, self.shared.limit
            );
            self.shared.finished.wait(&mut state);
        }
        self.launch(state, store, job)
    }

    /// Start a backup, or fail with `BackupCapacity` if all slots are busy
    pub fn try_request_backup(&self, store: &KeyedStore, job: &str) -> Result<BackupTicket> {
        let state = self.shared.state.lock();
        if state.active >= self.shared.limit {
            return Err(KvsError::BackupCapacity {
                limit: self.shared.limit,
            });
        }
        self.launch(state, store, job)
    }

    fn launch(
        &self,
        mut state: MutexGuard<'_, BackupState>,
        store: &KeyedStore,
        job: &str,
    ) -> Result<BackupTicket> {
        state.active += 1;
        state.sequence += 1;
        let sequence = state.sequence;
        let ordinal = {
            let counter = state.per_job.entry(job.to_string()).or_insert(0);
            *counter += 1;
            *counter
        };
        drop(state);

        let slot = Slot {
            shared: Arc::clone(&self.shared),
        };
        let path = self.backup_path(job, ordinal);

        let snapshot = store.snapshot();
        let writer = Arc::clone(&self.writer);
        let target = path.clone();

        thread::Builder::new()
            .name(format!("backup-{}", sequence))
            .spawn(move || {
                let _slot = slot;
                match writer.write_snapshot(&target, &snapshot) {
                    Ok(()) => tracing::info!(
                        "Backup {} written to {} ({} keys)",
                        sequence,
                        target.display(),
                        snapshot.len()
                    ),
                    Err(e) => tracing::error!(
                        "Backup {} to {} failed: {}",
                        sequence,
                        target.display(),
                        e
                    ),
                }
            })?;

        Ok(BackupTicket { sequence, path })
    }

    /// Block until no backup is in flight
    pub fn wait_idle(&self) {
        let mut state = self.shared.state.lock();
        while state.active > 0 {
            self.shared.finished.wait(&mut state);
        }
    }

    /// Number of backups currently being serialized
    pub fn active(&self) -> usize {
        self.shared.state.lock().active
    }

    /// Last sequence number handed out
    pub fn sequence(&self) -> u64 {
        self.shared.state.lock().sequence
    }

    pub fn limit(&self) -> usize {
        self.shared.limit
    }

    /// Deterministic artifact path for a job's n-th backup
    pub fn backup_path(&self, job: &str, ordinal: u64) -> PathBuf {
        self.dir
            .join(format!("{}-{}.{}", job, ordinal, BACKUP_EXTENSION))
    }
}
