//! Structured job operations

use std::time::Duration;

/// One parsed job command
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operation {
    /// Store every pair
    Write(Vec<(String, String)>),

    /// Print the values of the keys, sorted by key
    Read(Vec<String>),

    /// Remove the keys, printing the ones that were missing
    Delete(Vec<String>),

    /// Print every pair in the store
    Show,

    /// Sleep without holding any store lock
    Wait(Duration),

    /// Snapshot the store to a backup file
    Backup,

    /// Print the command summary
    Help,
}

impl Operation {
    /// Command keyword, for logging
    pub fn name(&self) -> &'static str {
        match self {
            Operation::Write(_) => "WRITE",
            Operation::Read(_) => "READ",
            Operation::Delete(_) => "DELETE",
            Operation::Show => "SHOW",
            Operation::Wait(_) => "WAIT",
            Operation::Backup => "BACKUP",
            Operation::Help => "HELP",
        }
    }
}
