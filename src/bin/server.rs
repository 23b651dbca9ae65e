//! PipeKV Server Binary
//!
//! Runs every job in the jobs directory against the embedded store while
//! serving client sessions on the rendezvous address.
//!
//! Ctrl+C shuts the server down; `SIGUSR1` disconnects every client and
//! keeps serving.

use std::process;
use std::sync::Arc;
use std::thread;

use clap::Parser;
use pipekv::job::{discover_jobs, run_jobs};
use pipekv::network::{Server, ServerHandle};
#[cfg(unix)]
use pipekv::network::signal::{disconnect_on, DisconnectSignal, SIGUSR1};
use pipekv::{Config, Engine};
use tracing_subscriber::{fmt, EnvFilter};

/// PipeKV Server
#[derive(Parser, Debug)]
#[command(name = "pipekv-server")]
#[command(about = "Concurrent in-memory key-value store with jobs, backups and subscriptions")]
#[command(version)]
struct Args {
    /// Directory containing .job files
    jobs_dir: String,

    /// Number of job worker threads
    #[arg(default_value = "4")]
    max_threads: usize,

    /// Max backups being written at the same time
    #[arg(default_value = "2")]
    max_backups: usize,

    /// Rendezvous address (host:port)
    #[arg(short, long, default_value = "127.0.0.1:7878")]
    listen: String,

    /// Session worker threads
    #[arg(short = 'w', long, default_value = "8")]
    session_workers: usize,

    /// Sessions buffered while every worker is busy
    #[arg(short = 'b', long, default_value = "8")]
    session_buffer: usize,

    /// Max subscribers per key
    #[arg(long, default_value = "100")]
    subscriber_limit: usize,

    /// Stop the server once every job has finished
    #[arg(long)]
    exit_after_jobs: bool,
}

/// `SIGUSR1` closes every session; the server keeps running
#[cfg(unix)]
fn install_disconnect_signal(handle: ServerHandle) -> Option<DisconnectSignal> {
    match disconnect_on(SIGUSR1, handle) {
        Ok(listener) => Some(listener),
        Err(e) => {
            tracing::warn!("Could not install SIGUSR1 handler: {}", e);
            None
        }
    }
}

#[cfg(not(unix))]
fn install_disconnect_signal(_handle: ServerHandle) -> Option<()> {
    None
}

fn main() {
    // Initialize tracing/logging
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,pipekv=debug"));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(true)
        .init();

    let args = Args::parse();

    tracing::info!("PipeKV Server v{}", pipekv::VERSION);
    tracing::info!("Jobs directory: {}", args.jobs_dir);
    tracing::info!("Listen address: {}", args.listen);

    let config = Config::builder()
        .jobs_dir(&args.jobs_dir)
        .backup_dir(&args.jobs_dir)
        .max_job_threads(args.max_threads)
        .max_backups(args.max_backups)
        .listen_addr(&args.listen)
        .session_workers(args.session_workers)
        .session_buffer(args.session_buffer)
        .subscriber_limit(args.subscriber_limit)
        .build();

    let engine = match Engine::open(config.clone()) {
        Ok(e) => e,
        Err(e) => {
            tracing::error!("Failed to open engine: {}", e);
            process::exit(1);
        }
    };

    let server = match Server::bind(&config, Arc::clone(engine.store())) {
        Ok(s) => s,
        Err(e) => {
            tracing::error!("Failed to start session server: {}", e);
            process::exit(1);
        }
    };
    let handle = server.handle();

    // Set up Ctrl+C handler
    let signal_handle = handle.clone();
    if let Err(e) = ctrlc::set_handler(move || {
        tracing::info!("Received Ctrl+C, initiating shutdown...");
        signal_handle.shutdown();
    }) {
        tracing::warn!("Could not install Ctrl+C handler: {}", e);
    }
    let _disconnect_signal = install_disconnect_signal(handle.clone());

    let server_thread = match thread::Builder::new()
        .name("acceptor".to_string())
        .spawn(move || server.run())
    {
        Ok(t) => t,
        Err(e) => {
            tracing::error!("Failed to spawn acceptor: {}", e);
            process::exit(1);
        }
    };

    match discover_jobs(&config.jobs_dir) {
        Ok(jobs) => {
            for report in run_jobs(&engine, jobs, config.max_job_threads) {
                match report.result {
                    Ok(summary) => tracing::info!(
                        "{}: {} operations, {} failed",
                        report.job.name, summary.executed, summary.failed
                    ),
                    Err(e) => tracing::error!("{}: {}", report.job.name, e),
                }
            }
        }
        Err(e) => {
            tracing::error!("Cannot read jobs directory {}: {}", args.jobs_dir, e);
        }
    }

    if args.exit_after_jobs {
        handle.shutdown();
    }

    match server_thread.join() {
        Ok(Ok(())) => {}
        Ok(Err(e)) => tracing::error!("Server error: {}", e),
        Err(_) => tracing::error!("Acceptor thread panicked"),
    }

    if let Err(e) = engine.close() {
        tracing::error!("Failed to close engine: {}", e);
        process::exit(1);
    }

    tracing::info!("Server stopped");
}
