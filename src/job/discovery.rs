//! Job file discovery

use std::fs;
use std::path::{Path, PathBuf};

use crate::error::Result;

/// Extension of job scripts
pub const JOB_EXTENSION: &str = "job";

/// Extension of job outputs
pub const OUTPUT_EXTENSION: &str = "out";

/// A job script and where its output goes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobFile {
    /// File stem, used to name backups
    pub name: String,
    pub input: PathBuf,
    pub output: PathBuf,
}

impl JobFile {
    /// Describe the job at `input`, writing to the sibling `.out` file
    pub fn from_path(input: impl Into<PathBuf>) -> Option<Self> {
        let input = input.into();
        if input.extension()? != JOB_EXTENSION {
            return None;
        }
        let name = input.file_stem()?.to_str()?.to_string();
        let output = input.with_extension(OUTPUT_EXTENSION);
        Some(Self {
            name,
            input,
            output,
        })
    }
}

/// Every `.job` regular file directly inside `dir`, sorted by path
pub fn discover_jobs(dir: &Path) -> Result<Vec<JobFile>> {
    let mut jobs = Vec::new();

    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if !path.is_file() {
            continue;
        }
        if let Some(job) = JobFile::from_path(path) {
            jobs.push(job);
        }
    }

    jobs.sort_by(|a, b| a.input.cmp(&b.input));
    tracing::debug!("Discovered {} jobs in {}", jobs.len(), dir.display());
    Ok(jobs)
}
