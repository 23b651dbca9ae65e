//! Tests for Engine
//!
//! These tests verify:
//! - Output of each job operation
//! - BACKUP through the engine
//! - Engine lifecycle (open/close)

use std::fs;
use std::time::{Duration, Instant};

use pipekv::config::Config;
use pipekv::engine::Engine;
use pipekv::error::KvsError;
use pipekv::job::Operation;
use tempfile::TempDir;

// =============================================================================
// Helper Functions
// =============================================================================

fn setup_temp_engine() -> (TempDir, Engine) {
    let temp_dir = TempDir::new().unwrap();
    let config = Config::builder()
        .jobs_dir(temp_dir.path())
        .backup_dir(temp_dir.path())
        .max_backups(1)
        .build();
    let engine = Engine::open(config).unwrap();
    (temp_dir, engine)
}

fn run(engine: &Engine, operation: Operation) -> String {
    let mut out = Vec::new();
    engine.execute("test", operation, &mut out).unwrap();
    String::from_utf8(out).unwrap()
}

fn pairs(items: &[(&str, &str)]) -> Vec<(String, String)> {
    items
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

fn keys(items: &[&str]) -> Vec<String> {
    items.iter().map(|k| k.to_string()).collect()
}

// =============================================================================
// Operation Output Tests
// =============================================================================

#[test]
fn test_write_produces_no_output() {
    let (_temp, engine) = setup_temp_engine();

    let out = run(&engine, Operation::Write(pairs(&[("a", "1")])));

    assert_eq!(out, "");
    assert_eq!(engine.store().len(), 1);
}

#[test]
fn test_read_sorts_keys_and_marks_missing() {
    let (_temp, engine) = setup_temp_engine();
    run(&engine, Operation::Write(pairs(&[("b", "2"), ("a", "1")])));

    let out = run(&engine, Operation::Read(keys(&["c", "b", "a"])));

    assert_eq!(out, "[(a,1)(b,2)(c,KVSERROR)]\n");
}

#[test]
fn test_delete_lists_only_missing() {
    let (_temp, engine) = setup_temp_engine();
    run(&engine, Operation::Write(pairs(&[("a", "1"), ("b", "2")])));

    assert_eq!(run(&engine, Operation::Delete(keys(&["a", "c"]))), "[(c,KVSMISSING)]\n");
    assert_eq!(run(&engine, Operation::Delete(keys(&["b"]))), "");
}

#[test]
fn test_show_lists_every_pair() {
    let (_temp, engine) = setup_temp_engine();
    run(&engine, Operation::Write(pairs(&[("b", "2"), ("a", "1"), ("1k", "x")])));

    assert_eq!(run(&engine, Operation::Show), "(a, 1)\n(b, 2)\n(1k, x)\n");
}

#[test]
fn test_show_empty_store() {
    let (_temp, engine) = setup_temp_engine();
    assert_eq!(run(&engine, Operation::Show), "");
}

#[test]
fn test_wait_prints_and_sleeps() {
    let (_temp, engine) = setup_temp_engine();

    let start = Instant::now();
    let out = run(&engine, Operation::Wait(Duration::from_millis(50)));

    assert_eq!(out, "Waiting...\n");
    assert!(start.elapsed() >= Duration::from_millis(50));
}

#[test]
fn test_zero_wait_is_silent() {
    let (_temp, engine) = setup_temp_engine();
    assert_eq!(run(&engine, Operation::Wait(Duration::ZERO)), "");
}

#[test]
fn test_help_lists_commands() {
    let (_temp, engine) = setup_temp_engine();

    let out = run(&engine, Operation::Help);

    for command in ["WRITE", "READ", "DELETE", "SHOW", "WAIT", "BACKUP", "HELP"] {
        assert!(out.contains(command), "help is missing {}", command);
    }
}

// =============================================================================
// Backup Tests
// =============================================================================

#[test]
fn test_backup_writes_show_format() {
    let (temp, engine) = setup_temp_engine();
    run(&engine, Operation::Write(pairs(&[("a", "1")])));

    assert_eq!(run(&engine, Operation::Backup), "");
    engine.backups().wait_idle();

    let content = fs::read_to_string(temp.path().join("test-1.bck")).unwrap();
    assert_eq!(content, "(a, 1)\n");
}

#[test]
fn test_backups_beyond_limit_wait_and_succeed() {
    let (temp, engine) = setup_temp_engine();
    run(&engine, Operation::Write(pairs(&[("a", "1")])));

    for _ in 0..3 {
        engine.backup("many").unwrap();
    }
    engine.close().unwrap();

    for n in 1..=3 {
        assert!(temp.path().join(format!("many-{}.bck", n)).exists());
    }
}

// =============================================================================
// Lifecycle Tests
// =============================================================================

#[test]
fn test_open_creates_backup_directory() {
    let temp_dir = TempDir::new().unwrap();
    let backup_dir = temp_dir.path().join("nested").join("backups");

    let config = Config::builder().backup_dir(&backup_dir).build();
    let _engine = Engine::open(config).unwrap();

    assert!(backup_dir.is_dir());
}

#[test]
fn test_open_rejects_invalid_config() {
    let temp_dir = TempDir::new().unwrap();
    let config = Config::builder()
        .backup_dir(temp_dir.path())
        .max_backups(0)
        .build();

    assert!(matches!(Engine::open(config), Err(KvsError::Config(_))));
}

#[test]
fn test_open_fails_when_backup_dir_is_a_file() {
    let temp_dir = TempDir::new().unwrap();
    let file = temp_dir.path().join("file");
    fs::write(&file, "x").unwrap();

    let config = Config::builder().backup_dir(&file).build();

    assert!(matches!(Engine::open(config), Err(KvsError::Init(_))));
}
