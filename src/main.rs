//! # Adaptive News
//!
//! Scrapes news listing pages into JSON record batches.
//!
//! ## Usage
//!
//! ```sh
//! adaptive_news -j ./json
//! ```
//!
//! ## Flow
//!
//! 1. **Setup**: tracing, CLI, YAML config, output dir check
//! 2. **Backend**: load the `awful_aj` config and template; without them the
//!    model fallback is off
//! 3. **Pages**: fetch or read each page and run the pipeline on it, a few
//!    pages at a time
//! 4. **Teardown**: persist the selector cache and report

use adaptive_news::api::{AskFnWrapper, RetryAsk, load_backend};
use adaptive_news::config::PipelineConfig;
use adaptive_news::outputs::json::JsonFileSink;
use adaptive_news::pipeline::Pipeline;
use adaptive_news::selectors::cache::SelectorCache;
use adaptive_news::snapshot::{DomSnapshot, fetch_snapshot, read_snapshot};
use adaptive_news::utils::ensure_writable_dir;
use clap::Parser;
use futures::stream::{self, StreamExt};
use std::error::Error;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};
use tracing_subscriber::{EnvFilter, fmt as tfmt};
use url::Url;

mod cli;

use cli::Cli;

/// A page to process and how to get it.
#[derive(Debug, Clone)]
enum Source {
    Url(String),
    File {
        path: std::path::PathBuf,
        base_url: Option<Url>,
    },
}

impl Source {
    fn label(&self) -> String {
        match self {
            Source::Url(url) => url.clone(),
            Source::File { path, .. } => path.display().to_string(),
        }
    }

    async fn snapshot(&self) -> Result<DomSnapshot, Box<dyn Error>> {
        match self {
            Source::Url(url) => fetch_snapshot(url).await,
            Source::File { path, base_url } => read_snapshot(path, base_url.clone()).await,
        }
    }
}

fn sources(args: &Cli) -> Result<Vec<Source>, Box<dyn Error>> {
    match &args.input {
        Some(path) => {
            let base_url = args.base_url.as_deref().map(Url::parse).transpose()?;
            Ok(vec![Source::File {
                path: path.clone(),
                base_url,
            }])
        }
        None => Ok(args.urls.iter().cloned().map(Source::Url).collect()),
    }
}

#[tokio::main]
#[instrument]
async fn main() -> Result<(), Box<dyn Error>> {
    // --- Tracing init ---
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tfmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
        .init();

    let start_time = Instant::now();
    info!("adaptive_news starting up");

    // Parse CLI
    let args = Cli::parse();
    debug!(?args, "Parsed CLI arguments");

    let config = args.apply_overrides(PipelineConfig::load(args.config.as_deref()).await?);

    // Early check: ensure JSON output dir is writable
    if let Err(e) = ensure_writable_dir(&args.json_output_dir).await {
        error!(
            path = %args.json_output_dir,
            error = %e,
            "JSON output directory is not writable (fix perms or choose a different path)"
        );
        return Err(e);
    }

    // ---- Load inference backend ----
    let backend = if config.inference.enabled {
        match load_backend(&config.inference.template, args.backend_config.as_deref()).await {
            Ok(backend) => Some(backend),
            Err(e) => {
                warn!(error = %e, "No inference backend configured; model fallback disabled");
                None
            }
        }
    } else {
        None
    };
    let asker = backend.as_ref().map(|(conf, template)| {
        RetryAsk::new(
            AskFnWrapper {
                config: conf,
                template,
            },
            config.inference.retries,
            Duration::from_secs(1),
        )
    });

    let cache = match &config.selector_cache {
        Some(path) => Some(Arc::new(SelectorCache::load(path).await?)),
        None => None,
    };

    let pipeline = Pipeline::from_config(&config, asker, cache.clone());
    let sink = JsonFileSink::new(&args.json_output_dir);

    // ---- Cancellation on Ctrl-C ----
    let token = CancellationToken::new();
    {
        let token = token.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("Interrupt received; cancelling in-flight pages");
                token.cancel();
            }
        });
    }

    // ---- Process pages ----
    let sources = sources(&args)?;
    let total = sources.len();
    info!(pages = total, concurrency = args.concurrency, "Processing pages");

    let outcomes: Vec<bool> = stream::iter(sources)
        .map(|source| {
            let pipeline = &pipeline;
            let sink = &sink;
            let token = &token;
            async move {
                let label = source.label();
                let snapshot = match source.snapshot().await {
                    Ok(snapshot) => snapshot,
                    Err(e) => {
                        error!(source = %label, error = %e, "Failed to load page; skipping");
                        return false;
                    }
                };
                match pipeline.run_into_sink(&snapshot, &label, token, sink).await {
                    Ok(output) => {
                        info!(source = %label, records = output.records.len(), "Page done");
                        true
                    }
                    Err(e) => {
                        error!(source = %label, error = %e, "Page produced no records");
                        false
                    }
                }
            }
        })
        .buffer_unordered(args.concurrency.max(1))
        .collect()
        .await;

    let succeeded = outcomes.iter().filter(|ok| **ok).count();

    // ---- Persist selector cache ----
    if let (Some(cache), Some(path)) = (&cache, &config.selector_cache) {
        if let Err(e) = cache.save(path).await {
            error!(path = %path.display(), error = %e, "Failed to save selector cache");
        }
    }

    let elapsed = start_time.elapsed();
    info!(
        ?elapsed,
        pages = total,
        succeeded,
        failed = total - succeeded,
        "Execution complete"
    );

    if succeeded == 0 && total > 0 {
        return Err("no page produced records".into());
    }
    Ok(())
}
