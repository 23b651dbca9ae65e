//! PipeKV CLI Client
//!
//! Opens a session and reads commands from stdin, one per line:
//! `SUBSCRIBE [key]`, `UNSUBSCRIBE [key]`, `DELAY <ms>`, `DISCONNECT`.
//! Notifications are printed as they arrive.

use std::io::{self, BufRead};
use std::process;
use std::thread;
use std::time::Duration;

use clap::Parser;
use pipekv::network::Client;
use pipekv::protocol::Status;
use tracing_subscriber::{fmt, EnvFilter};

/// PipeKV CLI
#[derive(Parser, Debug)]
#[command(name = "pipekv-cli")]
#[command(about = "Subscribe to keys of a PipeKV server")]
struct Args {
    /// Server rendezvous address
    #[arg(short, long, default_value = "127.0.0.1:7878")]
    server: String,
}

enum Command {
    Subscribe(String),
    Unsubscribe(String),
    Delay(Duration),
    Disconnect,
}

fn parse_command(line: &str) -> Option<Command> {
    let mut parts = line.trim().splitn(2, char::is_whitespace);
    let verb = parts.next()?;
    let rest = parts.next().unwrap_or("").trim();

    let single_key = || {
        let key = rest.strip_prefix('[')?.strip_suffix(']')?.trim();
        (!key.is_empty() && !key.contains(',')).then(|| key.to_string())
    };

    match verb {
        "SUBSCRIBE" => single_key().map(Command::Subscribe),
        "UNSUBSCRIBE" => single_key().map(Command::Unsubscribe),
        "DELAY" => rest.parse().ok().map(|ms| Command::Delay(Duration::from_millis(ms))),
        "DISCONNECT" if rest.is_empty() => Some(Command::Disconnect),
        _ => None,
    }
}

fn report(operation: &str, key: &str, status: Status) {
    println!(
        "Server returned {} for operation: {}",
        status.as_byte() as char,
        operation
    );
    if let Err(e) = status.into_result(key) {
        tracing::warn!("{} failed: {}", operation, e);
    }
}

fn main() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    fmt().with_env_filter(filter).with_target(true).init();

    let args = Args::parse();

    let mut client = match Client::connect(&args.server) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to connect to {}: {}", args.server, e);
            process::exit(1);
        }
    };
    println!("Connected to server.");

    if let Some(notifications) = client.take_notifications() {
        thread::spawn(move || {
            for notification in notifications {
                println!("{}", notification);
            }
            println!("Server closed the session");
            process::exit(0);
        });
    }

    for line in io::stdin().lock().lines() {
        let line = match line {
            Ok(l) => l,
            Err(e) => {
                eprintln!("Failed to read stdin: {}", e);
                break;
            }
        };
        if line.trim().is_empty() {
            continue;
        }

        match parse_command(&line) {
            Some(Command::Subscribe(key)) => match client.subscribe(&key) {
                Ok(status) => report("subscribe", &key, status),
                Err(e) => eprintln!("Command subscribe failed: {}", e),
            },
            Some(Command::Unsubscribe(key)) => match client.unsubscribe(&key) {
                Ok(status) => report("unsubscribe", &key, status),
                Err(e) => eprintln!("Command unsubscribe failed: {}", e),
            },
            Some(Command::Delay(delay)) => {
                if !delay.is_zero() {
                    println!("Waiting...");
                    thread::sleep(delay);
                }
            }
            Some(Command::Disconnect) => break,
            None => eprintln!("Invalid command: {}", line.trim()),
        }
    }

    if let Err(e) = client.disconnect() {
        eprintln!("Failed to disconnect from the server: {}", e);
        process::exit(1);
    }
    println!("Disconnected from server");
}
