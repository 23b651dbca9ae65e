//! Textual output formats shared by jobs and backups
//!
//! ```text
//!   READ    [(a,1)(b,2)(c,KVSERROR)]
//!   DELETE  [(c,KVSMISSING)]          (nothing at all if every key existed)
//!   SHOW    (a, 1)                    (one pair per line)
//! ```

use std::io::{self, Write};

/// Marker printed for keys a READ could not find
pub const READ_MISSING: &str = "KVSERROR";

/// Marker printed for keys a DELETE could not find
pub const DELETE_MISSING: &str = "KVSMISSING";

/// Render READ results in the order given
pub fn write_read<W: Write + ?Sized>(
    out: &mut W,
    results: &[(String, Option<String>)],
) -> io::Result<()> {
    write!(out, "[")?;
    for (key, value) in results {
        match value {
            Some(value) => write!(out, "({},{})", key, value)?,
            None => write!(out, "({},{})", key, READ_MISSING)?,
        }
    }
    writeln!(out, "]")
}

/// Render the keys a DELETE did not find; writes nothing if there are none
pub fn write_missing<W: Write + ?Sized>(out: &mut W, missing: &[String]) -> io::Result<()> {
    if missing.is_empty() {
        return Ok(());
    }
    write!(out, "[")?;
    for key in missing {
        write!(out, "({},{})", key, DELETE_MISSING)?;
    }
    writeln!(out, "]")
}

/// Render a snapshot, one pair per line
pub fn write_show<W: Write + ?Sized>(out: &mut W, pairs: &[(String, String)]) -> io::Result<()> {
    for (key, value) in pairs {
        writeln!(out, "({}, {})", key, value)?;
    }
    Ok(())
}
