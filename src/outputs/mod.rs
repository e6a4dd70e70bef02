//! Sinks that receive the finished records of a run.
//!
//! The pipeline hands a sink one complete [`Batch`] per page and only after
//! the run finished; a failed or cancelled run never reaches it.
//!
//! # Submodules
//!
//! - [`json`]: writes each batch as a JSON array of warehouse rows
//!
//! # Output Structure
//!
//! ```text
//! json_output_dir/
//! └── 2025-05-06/
//!     ├── www-yogonet-com_081502.json
//!     └── www-yogonet-com_161502.json
//! ```

pub mod json;

use crate::models::ArticleRow;
use chrono::{DateTime, Utc};
use std::error::Error;

/// All rows produced by one pipeline run.
#[derive(Debug, Clone, Copy)]
pub struct Batch<'a> {
    /// Where the snapshot came from, usually the page URL.
    pub source: &'a str,
    pub run_timestamp: DateTime<Utc>,
    pub rows: &'a [ArticleRow],
}

/// Destination for a run's rows. Writing is all-or-nothing per batch.
#[allow(async_fn_in_trait)]
pub trait ArticleSink {
    async fn write_batch(&self, batch: Batch<'_>) -> Result<(), Box<dyn Error>>;
}
