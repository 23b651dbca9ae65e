//! Job Module
//!
//! Batch scripts executed directly against the embedded store.
//!
//! ## Responsibilities
//! - Parse job lines into structured `Operation`s
//! - Discover `.job` files in a directory
//! - Run jobs on a fixed pool of worker threads, each writing its `.out` file
//!
//! ## Command Language
//! ```text
//! WRITE [(key,value)(key2,value2)]
//! READ [key,key2]
//! DELETE [key,key2]
//! SHOW
//! WAIT <delay_ms>
//! BACKUP
//! HELP
//! # comment
//! ```

mod discovery;
mod operation;
mod parser;
mod runner;

pub use discovery::{discover_jobs, JobFile, JOB_EXTENSION, OUTPUT_EXTENSION};
pub use operation::Operation;
pub use parser::parse_line;
pub use runner::{run_job, run_jobs, run_script, JobReport, JobSummary};
