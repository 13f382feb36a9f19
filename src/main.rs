//! wordclient: print the words a server sends
//!
//! Connects to `<host> <port>`, reads length-prefixed words until the
//! server hangs up and prints each one on its own line.

use std::process::ExitCode;

use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use wordclient::client;
use wordclient::config::{CliArgs, Config};

fn main() -> ExitCode {
    // Usage errors exit with 1; --help and --version exit with 0
    let cli = match CliArgs::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let _ = e.print();
            return if e.use_stderr() {
                ExitCode::FAILURE
            } else {
                ExitCode::SUCCESS
            };
        }
    };

    let config = match Config::load(cli) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("wordclient: {e}");
            return ExitCode::FAILURE;
        }
    };

    // Initialize logging. Words go to stdout, logs to stderr.
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    info!(
        server = %config.target(),
        read_chunk = config.read_chunk,
        on_truncated = ?config.on_truncated,
        on_invalid_utf8 = ?config.on_invalid_utf8,
        "Starting wordclient"
    );

    let mut out = std::io::stdout().lock();
    match client::run(&config, &mut out) {
        Ok(_) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "Session failed");
            ExitCode::FAILURE
        }
    }
}
