//! # benchlog
//!
//! Appends CI benchmark runs to a `data.js` history and reports regressions.

mod commands;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use log::error;

use commands::{check, ingest, prune, replay, series};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// History file (`.js` for the browser script form, anything else JSON)
    #[arg(short, long, global = true, default_value = "data.js")]
    data: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Append one run, evaluate it and persist the history
    Ingest(ingest::IngestArgs),
    /// Load the history and verify its series index
    Check,
    /// Print one series as JSON
    Series(series::SeriesArgs),
    /// Re-evaluate every entry of a suite
    Replay(replay::ReplayArgs),
    /// Keep only the newest entries of a suite
    Prune(prune::PruneArgs),
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let result = match cli.command {
        Command::Ingest(args) => ingest::run(&cli.data, args),
        Command::Check => check::run(&cli.data),
        Command::Series(args) => series::run(&cli.data, args),
        Command::Replay(args) => replay::run(&cli.data, args),
        Command::Prune(args) => prune::run(&cli.data, args),
    };

    match result {
        Ok(code) => code,
        Err(err) => {
            error!("{err:#}");
            ExitCode::from(2)
        }
    }
}
