//! Agora CLI - command-line access to the Agora sync layer.
//!
//! Useful for checking a backend, warming the offline cache and inspecting
//! what the app would see with no network.

mod commands;

use std::io;
use std::path::{Path, PathBuf};

use anyhow::Result;
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use agora_core::{Config, SyncError};

/// Log file prefix inside the cache directory
const LOG_FILE_PREFIX: &str = "agora.log";

/// Initialize the tracing subscriber for logging.
///
/// Logs go to stderr (filtered by `RUST_LOG`, default `warn`) and to a daily
/// rolling file in the cache directory. The returned guard flushes the file
/// writer on drop.
fn init_tracing(log_dir: &Path) -> WorkerGuard {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    let file_appender = tracing_appender::rolling::daily(log_dir, LOG_FILE_PREFIX);
    let (file_writer, guard) = tracing_appender::non_blocking(file_appender);

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(fmt::layer().with_ansi(false).with_writer(file_writer))
        .with(filter)
        .init();

    guard
}

fn print_usage() {
    eprintln!(
        "Usage: agora <command>\n\n\
         Commands:\n  \
           event <id>              Show one event\n  \
           (a user given once becomes the default for later commands)\n  \
           events                  List events\n  \
           join <event> [user]     Join an event\n  \
           leave <event> [user]    Leave an event\n  \
           joined [user]           List events a user joined\n  \
           tags                    Walk the tag tree from the root\n  \
           prefetch [user]         Cache everything needed offline\n  \
           sweep                   Evict stale cache rows\n  \
           status                  Show connectivity and cache ages\n  \
           blob put <name> <file>  Store a file in the blob cache\n  \
           blob get <name> <file>  Write a cached blob to a file\n  \
           blob rm <name>          Delete a cached blob\n  \
           set-key <key>           Store the backend API key in the keychain\n  \
           forget-key              Remove the stored API key"
    );
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();

    let args: Vec<String> = std::env::args().skip(1).collect();
    if args.is_empty() || args[0] == "--help" || args[0] == "-h" {
        print_usage();
        return Ok(());
    }

    let config = Config::load()?;
    let cache_dir = config.cache_dir().unwrap_or_else(|_| PathBuf::from("./cache"));
    std::fs::create_dir_all(&cache_dir)?;
    let _guard = init_tracing(&cache_dir);
    info!(command = %args[0], "Agora CLI starting");

    let result = commands::run(&config, &cache_dir, &args).await;

    if let Err(ref e) = result {
        eprintln!("Error: {}", e);
        if e.downcast_ref::<SyncError>().is_some_and(SyncError::is_retryable) {
            eprintln!("Try again once the backend is reachable.");
        }
    }
    info!("Agora CLI shutting down");
    result
}
