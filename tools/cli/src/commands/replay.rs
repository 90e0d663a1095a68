//! `benchlog replay`: re-evaluate a whole suite

use std::path::Path;
use std::process::ExitCode;

use anyhow::Result;
use benchlog_detect::AlertReporter;
use clap::Args;

use super::{DetectOptions, open_store};

#[derive(Args, Debug)]
pub struct ReplayArgs {
    #[arg(short, long, default_value = "Benchmark Results")]
    pub suite: String,

    /// Report only entries with a regression
    #[arg(long)]
    pub alerts_only: bool,

    #[command(flatten)]
    pub detect: DetectOptions,
}

pub fn run(data: &Path, args: ReplayArgs) -> Result<ExitCode> {
    let detector = args.detect.detector()?;
    let store = open_store(data, None)?;

    let mut evaluations = detector.replay(&store, &args.suite)?;
    if args.alerts_only {
        evaluations.retain(|evaluation| evaluation.has_regressions());
    }
    print!(
        "{}",
        AlertReporter::new(args.detect.format).render_all(&evaluations)?
    );
    Ok(ExitCode::SUCCESS)
}
