//! JSON file sink.
//!
//! Each batch becomes one file, `{dir}/{date}/{source}_{HHMMSS}.json`, holding
//! a JSON array of [`ArticleRow`](crate::models::ArticleRow)s. Date and time
//! are the UTC run timestamp, so every row in a file shares them. The file is
//! written to a temporary name first and renamed into place, so readers never
//! see a half-written batch.

use super::{ArticleSink, Batch};
use std::error::Error;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{error, info, instrument};
use url::Url;

/// Writes batches under a base directory.
#[derive(Debug, Clone)]
pub struct JsonFileSink {
    dir: PathBuf,
}

impl JsonFileSink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Destination file for `batch`.
    pub fn path_for(&self, batch: &Batch<'_>) -> PathBuf {
        self.dir
            .join(batch.run_timestamp.format("%Y-%m-%d").to_string())
            .join(format!(
                "{}_{}.json",
                file_stem(batch.source),
                batch.run_timestamp.format("%H%M%S")
            ))
    }
}

/// A filesystem-safe name for `source`: the URL host, or the source itself.
fn file_stem(source: &str) -> String {
    let base = Url::parse(source)
        .ok()
        .and_then(|u| u.host_str().map(str::to_string))
        .unwrap_or_else(|| {
            Path::new(source)
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_default()
        });
    let stem: String = base
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c.to_ascii_lowercase() } else { '-' })
        .collect();
    let stem = stem.trim_matches('-');
    if stem.is_empty() { "snapshot".to_string() } else { stem.to_string() }
}

impl ArticleSink for JsonFileSink {
    #[instrument(level = "info", skip_all, fields(source = %batch.source, rows = batch.rows.len()))]
    async fn write_batch(&self, batch: Batch<'_>) -> Result<(), Box<dyn Error>> {
        let json = serde_json::to_string_pretty(batch.rows)?;
        let path = self.path_for(&batch);

        if let Some(parent) = path.parent() {
            if let Err(e) = fs::create_dir_all(parent).await {
                error!(dir = %parent.display(), error = %e, "Failed to create JSON dir");
                return Err(e.into());
            }
        }

        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, json).await?;
        fs::rename(&tmp, &path).await?;
        info!(path = %path.display(), "Wrote JSON batch");
        Ok(())
    }
}
