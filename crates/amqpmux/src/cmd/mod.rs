use std::path::PathBuf;

use amqpmux_frame::DEFAULT_FRAME_MAX;
use clap::{Args, Subcommand};

use crate::exit::CliResult;
use crate::output::OutputFormat;

pub mod inspect;
pub mod version;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Decode a capture of raw AMQP frames.
    Inspect(InspectArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Inspect(args) => inspect::run(args, format),
        Command::Version(args) => version::run(args),
    }
}

#[derive(Args, Debug)]
pub struct InspectArgs {
    /// Capture file: frames as sent on the wire, optionally preceded by the protocol header.
    pub capture: PathBuf,
    /// Print per-channel totals instead of every frame.
    #[arg(long)]
    pub summary: bool,
    /// Largest frame accepted, in bytes (the negotiated frame-max).
    #[arg(long, value_name = "BYTES", default_value_t = DEFAULT_FRAME_MAX)]
    pub max_frame_size: usize,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}
