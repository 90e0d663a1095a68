//! `benchlog prune`: apply a retention limit

use std::path::Path;
use std::process::ExitCode;

use anyhow::Result;
use clap::Args;

use super::open_store;

#[derive(Args, Debug)]
pub struct PruneArgs {
    #[arg(short, long, default_value = "Benchmark Results")]
    pub suite: String,

    /// Number of newest entries to keep
    #[arg(short, long)]
    pub keep: usize,
}

pub fn run(data: &Path, args: PruneArgs) -> Result<ExitCode> {
    let store = open_store(data, None)?;
    let removed = store.prune(&args.suite, args.keep)?;
    println!("{}: removed {removed}, kept {}", args.suite, store.len(&args.suite));
    Ok(ExitCode::SUCCESS)
}
