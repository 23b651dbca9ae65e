//! Key classification and validation
//!
//! Keys are partitioned by their first character, case-insensitive:
//!
//! ```text
//!   'a'..='z'  ->  buckets  0..=25
//!   '0'..='9'  ->  buckets 26..=35
//!   anything else is rejected
//! ```

use crate::error::{KvsError, Result};

/// Number of buckets in the store
pub const BUCKET_COUNT: usize = 36;

/// Max length of a key or value in bytes (also the width of a wire field)
pub const MAX_STRING_SIZE: usize = 40;

/// Characters that would break the bracketed job output format
const RESERVED: &[char] = &['(', ')', '[', ']', ','];

/// Bucket a key belongs to, or `None` if its first character doesn't classify
pub fn bucket_index(key: &str) -> Option<usize> {
    let first = key.bytes().next()?;
    match first.to_ascii_lowercase() {
        c @ b'a'..=b'z' => Some((c - b'a') as usize),
        c @ b'0'..=b'9' => Some(26 + (c - b'0') as usize),
        _ => None,
    }
}

/// Validate a key and return its bucket
pub fn validate_key(key: &str) -> Result<usize> {
    check_text(key).map_err(|reason| KvsError::InvalidKey {
        key: key.to_string(),
        reason,
    })?;
    bucket_index(key).ok_or_else(|| KvsError::InvalidKey {
        key: key.to_string(),
        reason: "first character must be a letter or a digit",
    })
}

/// Validate a value about to be stored under `key`
pub fn validate_value(key: &str, value: &str) -> Result<()> {
    check_text(value).map_err(|reason| KvsError::InvalidValue {
        key: key.to_string(),
        reason,
    })
}

fn check_text(text: &str) -> std::result::Result<(), &'static str> {
    if text.is_empty() {
        return Err("must not be empty");
    }
    if text.len() > MAX_STRING_SIZE {
        return Err("longer than 40 bytes");
    }
    if text.chars().any(|c| c.is_control()) {
        return Err("contains control characters");
    }
    if text.contains(RESERVED) {
        return Err("contains one of ( ) [ ] ,");
    }
    Ok(())
}
