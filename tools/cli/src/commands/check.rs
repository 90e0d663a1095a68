//! `benchlog check`: load the history and verify its index

use std::path::Path;
use std::process::ExitCode;

use anyhow::Result;

use super::open_store;

pub fn run(data: &Path) -> Result<ExitCode> {
    let store = open_store(data, None)?;
    for suite in store.suites() {
        let series = store
            .with_suite(&suite, |history| history.index().len())
            .unwrap_or(0);
        println!("{suite}: {} entries, {series} series", store.len(&suite));
    }
    println!("{}: ok", data.display());
    Ok(ExitCode::SUCCESS)
}
