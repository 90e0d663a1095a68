//! `benchlog series`: print one series

use std::path::Path;
use std::process::ExitCode;

use anyhow::Result;
use clap::Args;

use super::open_store;

#[derive(Args, Debug)]
pub struct SeriesArgs {
    /// Benchmark name
    pub name: String,

    #[arg(short, long, default_value = "Benchmark Results")]
    pub suite: String,
}

pub fn run(data: &Path, args: SeriesArgs) -> Result<ExitCode> {
    let store = open_store(data, None)?;
    let series = store.series(&args.suite, &args.name)?;
    println!("{}", serde_json::to_string_pretty(&series)?);
    Ok(ExitCode::SUCCESS)
}
