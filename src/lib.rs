//! # PipeKV
//!
//! A concurrent in-memory key-value store with:
//! - Bucketed hash table with per-key locks and deadlock-free multi-key batches
//! - Point-in-time backups with bounded concurrency
//! - Batch job scripts executed against an embedded store
//! - Per-key subscriptions pushed to remote client sessions
//!
//! ## Architecture Overview
//!
//! ```text
//!   .job files                               remote clients
//!       │                                          │
//! ┌─────▼──────────────┐              ┌────────────▼───────────────┐
//! │   Job Runner       │              │  Session Server            │
//! │ (parse + execute)  │              │ (rendezvous + dispatcher)  │
//! └─────┬──────────────┘              └────────────┬───────────────┘
//!       │                                          │ subscribe /
//! ┌─────▼──────────────┐                           │ unsubscribe
//! │      Engine        │──────────┐                │
//! └─────┬────────┬─────┘          │                │
//!       │        │                ▼                ▼
//!       │        │         ┌────────────────────────────────┐
//!       │        └────────▶│          KeyedStore            │
//!       ▼                  │  (36 buckets, LockCoordinator) │
//! ┌──────────────┐         └───────────────┬────────────────┘
//! │BackupManager │◀── snapshot ────────────┤
//! │  (.bck)      │                         │ notifications
//! └──────────────┘                         ▼
//!                                 subscriber sinks ──▶ notification channels
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod config;

pub mod store;
pub mod subscription;
pub mod backup;
pub mod format;
pub mod engine;
pub mod job;
pub mod protocol;
pub mod session;
pub mod network;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use error::{KvsError, Result};
pub use config::Config;
pub use engine::Engine;
pub use store::KeyedStore;

// =============================================================================
// Version Info
// =============================================================================

/// Current version of PipeKV
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
