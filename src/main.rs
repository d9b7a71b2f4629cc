#![deny(unsafe_code)]
pub mod commands;
mod version;

use std::process::ExitCode;

use clap::Parser;
use clap::builder::styling::{AnsiColor, Effects, Styles};
use commands::command::Command;
use commands::demux::Demux;
use enum_dispatch::enum_dispatch;
use env_logger::Env;
use fgdemux_lib::errors::DemuxError;
use log::{error, info};

/// Custom styles for CLI help output
const STYLES: Styles = Styles::styled()
    .header(AnsiColor::Green.on_default().effects(Effects::BOLD))
    .usage(AnsiColor::Green.on_default().effects(Effects::BOLD))
    .literal(AnsiColor::Cyan.on_default().effects(Effects::BOLD))
    .placeholder(AnsiColor::Cyan.on_default());

#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

#[derive(Parser, Debug)]
#[command(styles = STYLES)]
struct Args {
    #[clap(subcommand)]
    subcommand: Subcommand,
}

#[enum_dispatch(Command)]
#[derive(Parser, Debug)]
#[command(version = version::VERSION.as_str())]
enum Subcommand {
    #[command(display_order = 1)]
    Demux(Demux),
}

/// Logs a failed run, naming the error category when the cause is a [`DemuxError`].
fn report_failure(err: &anyhow::Error) {
    match err.downcast_ref::<DemuxError>() {
        Some(demux_error) => error!("{}: {err:#}", demux_error.category()),
        None => error!("{err:#}"),
    }
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    // Capture full command line BEFORE clap parsing for @PG records
    let command_line = std::env::args().collect::<Vec<_>>().join(" ");

    let args = Args::parse();

    info!("Running fgdemux version {}", version::VERSION.as_str());
    match args.subcommand.execute(&command_line) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            report_failure(&err);
            ExitCode::FAILURE
        }
    }
}
