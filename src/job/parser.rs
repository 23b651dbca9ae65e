//! Line parser for the job command language

use std::time::Duration;

use crate::error::{KvsError, Result};
use super::Operation;

/// Parse one line of a job script
///
/// Returns `Ok(None)` for blank lines and `#` comments. Keys and values are
/// only split here; their validity is decided by the store.
pub fn parse_line(line_no: usize, line: &str) -> Result<Option<Operation>> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return Ok(None);
    }

    let (command, rest) = match line.split_once(char::is_whitespace) {
        Some((command, rest)) => (command, rest.trim()),
        None => (line, ""),
    };
    let err = |message: String| KvsError::Parse {
        line: line_no,
        message,
    };

    let operation = match command {
        "WRITE" => Operation::Write(parse_pairs(rest).map_err(err)?),
        "READ" => Operation::Read(parse_keys(rest).map_err(err)?),
        "DELETE" => Operation::Delete(parse_keys(rest).map_err(err)?),
        "WAIT" => {
            let delay_ms = rest
                .parse::<u64>()
                .map_err(|_| err(format!("WAIT expects a delay in milliseconds, got {:?}", rest)))?;
            Operation::Wait(Duration::from_millis(delay_ms))
        }
        "SHOW" | "BACKUP" | "HELP" => {
            if !rest.is_empty() {
                return Err(err(format!("{} takes no arguments", command)));
            }
            match command {
                "SHOW" => Operation::Show,
                "BACKUP" => Operation::Backup,
                _ => Operation::Help,
            }
        }
        other => return Err(err(format!("unknown command {:?}", other))),
    };

    Ok(Some(operation))
}

/// Strip the surrounding `[` `]` of an argument list
fn bracketed(rest: &str) -> std::result::Result<&str, String> {
    rest.strip_prefix('[')
        .and_then(|r| r.strip_suffix(']'))
        .map(str::trim)
        .ok_or_else(|| format!("expected a [...] list, got {:?}", rest))
}

/// `[k1,k2,...]`
fn parse_keys(rest: &str) -> std::result::Result<Vec<String>, String> {
    let inner = bracketed(rest)?;
    if inner.is_empty() {
        return Err("empty key list".to_string());
    }
    inner
        .split(',')
        .map(|key| {
            let key = key.trim();
            if key.is_empty() {
                Err("empty key in list".to_string())
            } else {
                Ok(key.to_string())
            }
        })
        .collect()
}

/// `[(k1,v1)(k2,v2)...]`
fn parse_pairs(rest: &str) -> std::result::Result<Vec<(String, String)>, String> {
    let mut inner = bracketed(rest)?;
    let mut pairs = Vec::new();

    while !inner.is_empty() {
        let body = inner
            .strip_prefix('(')
            .ok_or_else(|| format!("expected '(' at {:?}", inner))?;
        let close = body
            .find(')')
            .ok_or_else(|| "unterminated pair".to_string())?;
        let (key, value) = body[..close]
            .split_once(',')
            .ok_or_else(|| format!("pair {:?} is missing a value", &body[..close]))?;

        let (key, value) = (key.trim(), value.trim());
        if key.is_empty() || value.is_empty() {
            return Err(format!("pair ({},{}) has an empty side", key, value));
        }
        pairs.push((key.to_string(), value.to_string()));

        inner = body[close + 1..].trim_start();
    }

    if pairs.is_empty() {
        return Err("empty pair list".to_string());
    }
    Ok(pairs)
}
