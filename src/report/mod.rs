// src/report/mod.rs
//! JSON report writing
//!
//! One timestamped report per sweep: the configuration that produced it
//! plus every RunResult, pretty-printed. Nothing in the strategies reads
//! these files back.

use crate::config::BenchConfig;
use crate::strategy::RunResult;
use chrono::Local;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, thiserror::Error)]
pub enum ReportError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
}

#[derive(Debug, Serialize)]
struct ReportPayload<'a> {
    created_at: String,
    config: &'a BenchConfig,
    results: &'a [RunResult],
}

pub fn ensure_dir(path: &Path) -> Result<(), ReportError> {
    fs::create_dir_all(path)?;
    Ok(())
}

/// Write the sweep report under `output_dir` and return its path.
pub fn save_json(
    output_dir: &Path,
    config: &BenchConfig,
    results: &[RunResult],
) -> Result<PathBuf, ReportError> {
    ensure_dir(output_dir)?;

    let now = Local::now();
    let payload = ReportPayload {
        created_at: now.to_rfc3339(),
        config,
        results,
    };

    let path = output_dir.join(format!("dmm_results_{}.json", now.format("%Y%m%d_%H%M%S")));
    fs::write(&path, serde_json::to_string_pretty(&payload)?)?;
    Ok(path)
}
