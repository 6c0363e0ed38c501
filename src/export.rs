//! CSV Export
//! Mission: Write the rows a page is showing to a dated CSV file

use crate::toast::Toaster;
use anyhow::{Context, Result};
use chrono::Utc;
use std::path::{Path, PathBuf};
use tracing::info;

/// Header row plus every value double-quoted, rows joined with `\n`.
pub fn to_csv(headers: &[&str], rows: &[Vec<String>]) -> String {
    let mut lines = Vec::with_capacity(rows.len() + 1);
    lines.push(headers.join(","));
    for row in rows {
        let cells: Vec<String> = row
            .iter()
            .map(|v| format!("\"{}\"", v.replace('"', "\"\"")))
            .collect();
        lines.push(cells.join(","));
    }
    lines.join("\n")
}

/// `<prefix>-YYYY-MM-DD.csv` for today's UTC date
pub fn dated_filename(prefix: &str) -> String {
    format!("{}-{}.csv", prefix, Utc::now().format("%Y-%m-%d"))
}

/// Export to `dir/filename`, reporting the outcome through a toast.
///
/// Returns `None` without touching the filesystem when there is nothing to export.
pub async fn export_to_csv(
    toaster: &Toaster,
    dir: &Path,
    filename: &str,
    headers: &[&str],
    rows: &[Vec<String>],
) -> Result<Option<PathBuf>> {
    if rows.is_empty() {
        toaster.warning("No data to export");
        return Ok(None);
    }

    tokio::fs::create_dir_all(dir)
        .await
        .with_context(|| format!("Failed to create export directory {}", dir.display()))?;
    let path = dir.join(filename);
    tokio::fs::write(&path, to_csv(headers, rows))
        .await
        .with_context(|| format!("Failed to write {}", path.display()))?;

    info!("📊 Exported {} rows to {}", rows.len(), path.display());
    toaster.success("Data exported successfully");
    Ok(Some(path))
}
