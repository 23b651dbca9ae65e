//! Notification payloads

use std::fmt;

/// Text that replaces the value when a subscribed key is deleted
pub const DELETED_MARKER: &str = "DELETED";

/// A change pushed to the subscribers of a key
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notification {
    /// The key was written with a new value
    Updated { key: String, value: String },

    /// The key was deleted; subscriptions are gone after this
    Deleted { key: String },
}

impl Notification {
    pub fn updated(key: impl Into<String>, value: impl Into<String>) -> Self {
        Notification::Updated {
            key: key.into(),
            value: value.into(),
        }
    }

    pub fn deleted(key: impl Into<String>) -> Self {
        Notification::Deleted { key: key.into() }
    }

    /// The key this notification is about
    pub fn key(&self) -> &str {
        match self {
            Notification::Updated { key, .. } | Notification::Deleted { key } => key,
        }
    }
}

impl fmt::Display for Notification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Notification::Updated { key, value } => write!(f, "({}, {})", key, value),
            Notification::Deleted { key } => write!(f, "({}, {})", key, DELETED_MARKER),
        }
    }
}
