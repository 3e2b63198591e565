//! JSON run report.
//!
//! Optional companion to the CSV: the run summary plus every per-ticker
//! [`FetchResult`], items included, so a failed ticker's status and
//! diagnostic can be inspected after the fact.

use crate::models::{FetchResult, RunSummary};
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::path::Path;
use tokio::fs;
use tracing::{error, info, instrument};

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RunReport {
    pub summary: RunSummary,
    pub results: Vec<FetchResult>,
}

/// Write a [`RunReport`] to `path`, creating parent directories as needed.
#[instrument(level = "info", skip_all, fields(path = %path.display()))]
pub async fn write_report(report: &RunReport, path: &Path) -> Result<(), Box<dyn Error>> {
    let json = serde_json::to_string_pretty(report)?;

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        if let Err(e) = fs::create_dir_all(parent).await {
            error!(dir = %parent.display(), error = %e, "Failed to create report dir");
            return Err(e.into());
        }
    }

    fs::write(path, json).await?;
    info!(results = report.results.len(), "Wrote JSON run report");
    Ok(())
}
