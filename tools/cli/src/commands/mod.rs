//! Subcommands of the `benchlog` tool

pub mod check;
pub mod ingest;
pub mod prune;
pub mod replay;
pub mod series;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use benchlog_core::{DataFileSink, HistoryStore};
use benchlog_detect::{RegressionDetector, ReportFormat, ToleranceConfig};
use clap::Args;
use log::info;

/// Options shared by the commands that evaluate entries.
#[derive(Args, Debug, Clone)]
pub struct DetectOptions {
    /// Tolerance configuration (`.toml` or JSON)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Report format: text, json or markdown
    #[arg(short, long, default_value = "text")]
    pub format: ReportFormat,

    /// Honour tolerances recorded in each measurement's params
    #[arg(long)]
    pub recorded_tolerances: bool,
}

impl DetectOptions {
    pub fn detector(&self) -> Result<RegressionDetector> {
        let mut config = match &self.config {
            Some(path) => ToleranceConfig::from_file(path)
                .with_context(|| format!("loading tolerances from {}", path.display()))?,
            None => ToleranceConfig::default(),
        };
        if self.recorded_tolerances {
            config.use_recorded_tolerances = true;
        }
        Ok(RegressionDetector::new(config))
    }
}

/// Opens the history at `path`, starting empty if the file does not exist.
///
/// The store persists back to the same file after every change. The loaded
/// index is verified before the store is handed out.
pub fn open_store(path: &Path, repo_url: Option<&str>) -> Result<HistoryStore> {
    let sink = Arc::new(DataFileSink::new(path));
    let loaded = sink
        .load()
        .with_context(|| format!("reading {}", path.display()))?;
    let store = match loaded {
        Some(document) => HistoryStore::from_document(document, sink)
            .with_context(|| format!("loading history from {}", path.display()))?,
        None => {
            info!("{} does not exist, starting a new history", path.display());
            HistoryStore::with_sink(repo_url.unwrap_or_default(), sink)
        }
    };
    store.verify_index()?;
    Ok(store)
}
