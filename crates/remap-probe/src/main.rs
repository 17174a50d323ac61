#![warn(missing_docs)]

//! Entry point for the `remap-probe` binary.

mod cli;
mod error;
mod heartbeat;

use std::{process, thread};

use clap::Parser;
use remap_dispatcher::shared;
use tracing::{error, info};

use crate::{
    cli::Cli,
    error::{Error, Result},
    heartbeat::Heartbeat,
};

fn main() {
    if let Err(err) = run() {
        error!("{err}");
        eprintln!("error: {err}");
        process::exit(1);
    }
}

/// Parse CLI arguments, install logging, and run one heartbeat session.
fn run() -> Result<()> {
    let cli = Cli::parse();
    let spec = logging::init(&cli.log);
    info!(%spec, "remap_probe_start");

    if cli.interval.is_zero() {
        return Err(Error::ZeroInterval);
    }

    shared::initialize()?;
    let beats = {
        let heartbeat = Heartbeat::new(None);
        heartbeat.start(cli.interval);
        thread::sleep(cli.run_for);
        heartbeat.beats()
    };
    shared::terminate();

    println!("{beats} heartbeats in {}", humantime::format_duration(cli.run_for));
    Ok(())
}
