//! Tests for job scripts
//!
//! These tests verify:
//! - Script execution end to end, including invalid lines
//! - Job discovery and output file placement
//! - The job worker pool
//! - Backups named after the job

use std::fs;
use std::io::Cursor;
use std::path::Path;

use pipekv::config::Config;
use pipekv::engine::Engine;
use pipekv::job::{discover_jobs, run_job, run_jobs, run_script, JobFile};
use tempfile::TempDir;

// =============================================================================
// Helper Functions
// =============================================================================

fn engine_in(dir: &Path) -> Engine {
    let config = Config::builder()
        .jobs_dir(dir)
        .backup_dir(dir)
        .build();
    Engine::open(config).unwrap()
}

fn run_text(engine: &Engine, script: &str) -> (String, usize, usize) {
    let mut out = Vec::new();
    let summary = run_script(engine, "inline", Cursor::new(script), &mut out).unwrap();
    (String::from_utf8(out).unwrap(), summary.executed, summary.failed)
}

// =============================================================================
// Script Tests
// =============================================================================

#[test]
fn test_script_read_delete_show() {
    let temp = TempDir::new().unwrap();
    let engine = engine_in(temp.path());

    let script = "\
WRITE [(a,1)(b,2)]
READ [a,c]
DELETE [a,c]
SHOW
";
    let (out, executed, failed) = run_text(&engine, script);

    assert_eq!(out, "[(a,1)(c,KVSERROR)]\n[(c,KVSMISSING)]\n(b, 2)\n");
    assert_eq!((executed, failed), (4, 0));
}

#[test]
fn test_script_skips_comments_and_blank_lines() {
    let temp = TempDir::new().unwrap();
    let engine = engine_in(temp.path());

    let script = "# setup\n\nWRITE [(k,v)]\n   \nREAD [k]\n";
    let (out, executed, failed) = run_text(&engine, script);

    assert_eq!(out, "[(k,v)]\n");
    assert_eq!((executed, failed), (2, 0));
}

#[test]
fn test_script_continues_after_invalid_line() {
    let temp = TempDir::new().unwrap();
    let engine = engine_in(temp.path());

    let script = "WRITE [(a,1)\nBOGUS\nWRITE [(a,2)]\nREAD [a]\n";
    let (out, executed, failed) = run_text(&engine, script);

    assert_eq!(out, "[(a,2)]\n");
    assert_eq!((executed, failed), (2, 2));
}

#[test]
fn test_script_invalid_key_does_not_abort_batch() {
    let temp = TempDir::new().unwrap();
    let engine = engine_in(temp.path());

    let (out, _, _) = run_text(&engine, "WRITE [(#x,1)(ok,2)]\nSHOW\n");

    assert_eq!(out, "(ok, 2)\n");
}

// =============================================================================
// Discovery Tests
// =============================================================================

#[test]
fn test_discover_only_job_files_sorted() {
    let temp = TempDir::new().unwrap();
    fs::write(temp.path().join("b.job"), "SHOW\n").unwrap();
    fs::write(temp.path().join("a.job"), "SHOW\n").unwrap();
    fs::write(temp.path().join("notes.txt"), "ignored").unwrap();
    fs::write(temp.path().join("a.out"), "stale").unwrap();
    fs::create_dir(temp.path().join("dir.job")).unwrap();

    let jobs = discover_jobs(temp.path()).unwrap();

    let names: Vec<_> = jobs.iter().map(|j| j.name.as_str()).collect();
    assert_eq!(names, vec!["a", "b"]);
    assert_eq!(jobs[0].output, temp.path().join("a.out"));
}

#[test]
fn test_job_file_requires_extension() {
    assert!(JobFile::from_path("x.job").is_some());
    assert!(JobFile::from_path("x.jobs").is_none());
    assert!(JobFile::from_path("job").is_none());
}

#[test]
fn test_discover_missing_directory() {
    let temp = TempDir::new().unwrap();
    assert!(discover_jobs(&temp.path().join("absent")).is_err());
}

// =============================================================================
// Execution Tests
// =============================================================================

#[test]
fn test_run_job_writes_out_file() {
    let temp = TempDir::new().unwrap();
    let engine = engine_in(temp.path());
    let input = temp.path().join("one.job");
    fs::write(&input, "WRITE [(x,9)]\nREAD [x]\n").unwrap();

    let job = JobFile::from_path(&input).unwrap();
    let summary = run_job(&engine, &job).unwrap();

    assert_eq!(summary.executed, 2);
    assert_eq!(fs::read_to_string(temp.path().join("one.out")).unwrap(), "[(x,9)]\n");
}

#[test]
fn test_run_jobs_on_pool() {
    let temp = TempDir::new().unwrap();
    let engine = engine_in(temp.path());
    for n in 0..5 {
        let key = format!("k{}", n);
        fs::write(
            temp.path().join(format!("job{}.job", n)),
            format!("WRITE [({},{})]\nREAD [{}]\n", key, n, key),
        )
        .unwrap();
    }

    let jobs = discover_jobs(temp.path()).unwrap();
    let reports = run_jobs(&engine, jobs, 2);

    assert_eq!(reports.len(), 5);
    assert!(reports.iter().all(|r| r.result.is_ok()));
    for n in 0..5 {
        let out = fs::read_to_string(temp.path().join(format!("job{}.out", n))).unwrap();
        assert_eq!(out, format!("[(k{},{})]\n", n, n));
    }
    assert_eq!(engine.store().len(), 5);
}

#[test]
fn test_jobs_share_one_store() {
    let temp = TempDir::new().unwrap();
    let engine = engine_in(temp.path());
    fs::write(temp.path().join("first.job"), "WRITE [(shared,1)]\n").unwrap();

    run_jobs(&engine, discover_jobs(temp.path()).unwrap(), 1);
    fs::write(temp.path().join("second.job"), "READ [shared]\n").unwrap();
    let second = JobFile::from_path(temp.path().join("second.job")).unwrap();
    run_job(&engine, &second).unwrap();

    assert_eq!(fs::read_to_string(second.output).unwrap(), "[(shared,1)]\n");
}

#[test]
fn test_backup_named_after_job() {
    let temp = TempDir::new().unwrap();
    let engine = engine_in(temp.path());
    fs::write(
        temp.path().join("nightly.job"),
        "WRITE [(a,1)]\nBACKUP\nWRITE [(a,2)]\nBACKUP\n",
    )
    .unwrap();

    run_jobs(&engine, discover_jobs(temp.path()).unwrap(), 1);
    engine.close().unwrap();

    assert_eq!(fs::read_to_string(temp.path().join("nightly-1.bck")).unwrap(), "(a, 1)\n");
    assert_eq!(fs::read_to_string(temp.path().join("nightly-2.bck")).unwrap(), "(a, 2)\n");
}
