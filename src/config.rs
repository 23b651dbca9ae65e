//! Configuration for PipeKV
//!
//! Centralized configuration with sensible defaults.

use std::path::PathBuf;
use std::time::Duration;

use crate::error::{KvsError, Result};

/// Main configuration for a PipeKV instance
#[derive(Debug, Clone)]
pub struct Config {
    // -------------------------------------------------------------------------
    // Job Configuration
    // -------------------------------------------------------------------------
    /// Directory scanned for `.job` files; outputs land next to them
    pub jobs_dir: PathBuf,

    /// Number of job worker threads
    pub max_job_threads: usize,

    // -------------------------------------------------------------------------
    // Backup Configuration
    // -------------------------------------------------------------------------
    /// Directory where `.bck` files are written
    pub backup_dir: PathBuf,

    /// Max snapshots being serialized at the same time
    pub max_backups: usize,

    // -------------------------------------------------------------------------
    // Store Configuration
    // -------------------------------------------------------------------------
    /// Max subscribers attached to a single key
    pub subscriber_limit: usize,

    // -------------------------------------------------------------------------
    // Session Configuration
    // -------------------------------------------------------------------------
    /// Rendezvous address clients send CONNECT frames to
    pub listen_addr: String,

    /// Capacity of the pending-session buffer
    pub session_buffer: usize,

    /// Number of session worker threads
    pub session_workers: usize,

    /// Queued notifications per session before new ones are dropped
    pub notification_queue: usize,

    /// How often blocking reads wake up to check for cancellation (milliseconds)
    pub poll_interval_ms: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            jobs_dir: PathBuf::from("./jobs"),
            max_job_threads: 4,
            backup_dir: PathBuf::from("./jobs"),
            max_backups: 2,
            subscriber_limit: 100,
            listen_addr: "127.0.0.1:7878".to_string(),
            session_buffer: 8,
            session_workers: 8,
            notification_queue: 256,
            poll_interval_ms: 100,
        }
    }
}

impl Config {
    /// Create a new config builder
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    /// Poll interval as a `Duration`
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Reject configurations that would deadlock or never make progress
    pub fn validate(&self) -> Result<()> {
        let checks = [
            (self.max_job_threads, "max_job_threads"),
            (self.max_backups, "max_backups"),
            (self.subscriber_limit, "subscriber_limit"),
            (self.session_buffer, "session_buffer"),
            (self.session_workers, "session_workers"),
            (self.notification_queue, "notification_queue"),
        ];
        for (value, name) in checks {
            if value == 0 {
                return Err(KvsError::Config(format!("{} must be greater than zero", name)));
            }
        }
        if self.poll_interval_ms == 0 {
            return Err(KvsError::Config(
                "poll_interval_ms must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

/// Builder for Config
#[derive(Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Set the jobs directory
    pub fn jobs_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.jobs_dir = path.into();
        self
    }

    /// Set the number of job worker threads
    pub fn max_job_threads(mut self, count: usize) -> Self {
        self.config.max_job_threads = count;
        self
    }

    /// Set the backup output directory
    pub fn backup_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.backup_dir = path.into();
        self
    }

    /// Set the concurrent backup bound
    pub fn max_backups(mut self, count: usize) -> Self {
        self.config.max_backups = count;
        self
    }

    /// Set the per-key subscriber limit
    pub fn subscriber_limit(mut self, count: usize) -> Self {
        self.config.subscriber_limit = count;
        self
    }

    /// Set the rendezvous listen address
    pub fn listen_addr(mut self, addr: impl Into<String>) -> Self {
        self.config.listen_addr = addr.into();
        self
    }

    /// Set the pending-session buffer capacity
    pub fn session_buffer(mut self, count: usize) -> Self {
        self.config.session_buffer = count;
        self
    }

    /// Set the number of session worker threads
    pub fn session_workers(mut self, count: usize) -> Self {
        self.config.session_workers = count;
        self
    }

    /// Set the per-session notification queue depth
    pub fn notification_queue(mut self, count: usize) -> Self {
        self.config.notification_queue = count;
        self
    }

    /// Set the cancellation poll interval (in milliseconds)
    pub fn poll_interval_ms(mut self, ms: u64) -> Self {
        self.config.poll_interval_ms = ms;
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}
