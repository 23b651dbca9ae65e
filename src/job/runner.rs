//! Job execution
//!
//! Each job is read line by line, parsed, and executed against the engine.
//! Invalid lines are logged and skipped; only failures to write the output
//! abort a job.

use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::thread;

use crossbeam::channel;

use crate::engine::Engine;
use crate::error::{KvsError, Result};
use super::{parse_line, JobFile};

/// Counters for one finished job
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct JobSummary {
    /// Operations that ran
    pub executed: usize,

    /// Lines that failed to parse or whose operation failed
    pub failed: usize,
}

/// Outcome of one job in a pool run
#[derive(Debug)]
pub struct JobReport {
    pub job: JobFile,
    pub result: Result<JobSummary>,
}

/// Run a script from any reader, writing results to `output`
pub fn run_script<R, W>(engine: &Engine, name: &str, input: R, output: &mut W) -> Result<JobSummary>
where
    R: BufRead,
    W: Write,
{
    let mut summary = JobSummary::default();

    for (index, line) in input.lines().enumerate() {
        let line = line?;
        let line_no = index + 1;

        let operation = match parse_line(line_no, &line) {
            Ok(Some(operation)) => operation,
            Ok(None) => continue,
            Err(e) => {
                tracing::warn!("Job {}: {}", name, e);
                summary.failed += 1;
                continue;
            }
        };

        tracing::trace!("Job {} line {}: {}", name, line_no, operation.name());
        match engine.execute(name, operation, output) {
            Ok(()) => summary.executed += 1,
            Err(KvsError::Io(e)) => return Err(KvsError::Io(e)),
            Err(e) => {
                tracing::warn!("Job {} line {} failed: {}", name, line_no, e);
                summary.failed += 1;
            }
        }
    }

    output.flush()?;
    Ok(summary)
}

/// Run one job file
pub fn run_job(engine: &Engine, job: &JobFile) -> Result<JobSummary> {
    let input = BufReader::new(File::open(&job.input)?);
    let mut output = BufWriter::new(File::create(&job.output)?);

    tracing::info!("Processing job {}", job.input.display());
    let summary = run_script(engine, &job.name, input, &mut output)?;
    tracing::info!(
        "Finished job {}: {} executed, {} failed",
        job.name, summary.executed, summary.failed
    );
    Ok(summary)
}

/// Run jobs on `threads` workers; each worker takes the next job when done
///
/// Reports come back in completion order.
pub fn run_jobs(engine: &Engine, jobs: Vec<JobFile>, threads: usize) -> Vec<JobReport> {
    let (job_tx, job_rx) = channel::unbounded::<JobFile>();
    let (report_tx, report_rx) = channel::unbounded::<JobReport>();

    for job in jobs {
        // The receiver is alive until the scope below ends.
        let _ = job_tx.send(job);
    }
    drop(job_tx);

    thread::scope(|scope| {
        for worker in 0..threads.max(1) {
            let job_rx = job_rx.clone();
            let report_tx = report_tx.clone();
            scope.spawn(move || {
                for job in job_rx.iter() {
                    tracing::debug!("Job worker {} picked {}", worker, job.name);
                    let result = run_job(engine, &job);
                    if let Err(e) = &result {
                        tracing::error!("Job {} aborted: {}", job.name, e);
                    }
                    let _ = report_tx.send(JobReport { job, result });
                }
            });
        }
    });
    drop(report_tx);

    report_rx.iter().collect()
}
