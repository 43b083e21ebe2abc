//! Offload executor process for deckport
//!
//! Reads one JSON request per line on stdin and writes replies and events to
//! stdout. Logs go to stderr.

use std::io;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use deckport_hid_common::HidApiBackend;
use deckport_ipc::{ContainerConfig, run_offload_host};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "deckport-offload")]
#[command(about = "Executes deckport device requests in a separate process")]
struct Args {
    /// Input pump read timeout in milliseconds
    #[arg(long, default_value_t = 5)]
    poll_interval_ms: u32,

    /// Timeout for explicit read requests in milliseconds (0 polls)
    #[arg(long, default_value_t = 0, allow_negative_numbers = true)]
    read_timeout_ms: i32,

    /// Do not forward input reports as events
    #[arg(long)]
    no_forward_input: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_writer(io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    tracing::info!(
        pid = std::process::id(),
        poll_interval_ms = args.poll_interval_ms,
        read_timeout_ms = args.read_timeout_ms,
        forward_input = !args.no_forward_input,
        "Starting offload process"
    );

    let config = ContainerConfig {
        forward_input: !args.no_forward_input,
        poll_interval_ms: args.poll_interval_ms,
        read_timeout_ms: args.read_timeout_ms,
    };
    run_offload_host(
        config,
        Arc::new(HidApiBackend::new()),
        io::stdin().lock(),
        Box::new(io::stdout()),
    )
    .context("offload host failed")?;

    tracing::info!("Offload process exiting");
    Ok(())
}
