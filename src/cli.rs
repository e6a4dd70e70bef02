//! Command-line interface definitions for Adaptive News.
//!
//! Every option can also come from the environment. Flags that mirror a key of
//! the YAML config override it.

use adaptive_news::config::PipelineConfig;
use adaptive_news::selectors::catalog::DEFAULT_PAGE_URL;
use clap::Parser;
use std::path::PathBuf;

/// Command-line arguments for the Adaptive News extractor.
///
/// # Examples
///
/// ```sh
/// # Scrape the default listing page
/// adaptive_news -j ./json
///
/// # Several pages, without the model fallback
/// adaptive_news -j ./json --url https://a.example/news --url https://b.example/ --no-ai
///
/// # A saved page
/// adaptive_news -j ./json --input page.html --base-url https://a.example/news
/// ```
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    /// Output directory for the JSON batches
    #[arg(short, long, env = "ADAPTIVE_NEWS_JSON_DIR")]
    pub json_output_dir: String,

    /// Listing page to scrape; repeat for several pages
    #[arg(long = "url", default_value = DEFAULT_PAGE_URL)]
    pub urls: Vec<String>,

    /// Read one saved HTML page instead of fetching `--url`
    #[arg(long, conflicts_with = "urls")]
    pub input: Option<PathBuf>,

    /// Base URL for relative links in `--input`
    #[arg(long, requires = "input")]
    pub base_url: Option<String>,

    /// Optional path to the pipeline YAML config
    #[arg(short, long, env = "ADAPTIVE_NEWS_CONFIG")]
    pub config: Option<PathBuf>,

    /// Path to the `awful_aj` backend config.yaml (defaults to the awful_aj config dir)
    #[arg(long, env = "AWFUL_AJ_CONFIG")]
    pub backend_config: Option<String>,

    /// Never ask the model for selectors
    #[arg(long)]
    pub no_ai: bool,

    /// Deadline for one selector inference call, in milliseconds
    #[arg(long)]
    pub inference_timeout_ms: Option<u64>,

    /// Upper bound on the inference prompt size, in bytes
    #[arg(long)]
    pub max_prompt_bytes: Option<usize>,

    /// Retries around a failed inference call
    #[arg(long)]
    pub inference_retries: Option<usize>,

    /// JSON file persisting inferred selectors between runs
    #[arg(long, env = "ADAPTIVE_NEWS_SELECTOR_CACHE")]
    pub selector_cache: Option<PathBuf>,

    /// Keep at most this many records per page
    #[arg(long)]
    pub limit: Option<usize>,

    /// Pages processed at once
    #[arg(long, default_value_t = 4)]
    pub concurrency: usize,
}

impl Cli {
    /// Layer the flags given on the command line over `config`.
    pub fn apply_overrides(&self, mut config: PipelineConfig) -> PipelineConfig {
        if self.no_ai {
            config.inference.enabled = false;
        }
        if let Some(ms) = self.inference_timeout_ms {
            config.inference.timeout_ms = ms;
        }
        if let Some(bytes) = self.max_prompt_bytes {
            config.inference.max_prompt_bytes = bytes;
        }
        if let Some(retries) = self.inference_retries {
            config.inference.retries = retries;
        }
        if let Some(path) = &self.selector_cache {
            config.selector_cache = Some(path.clone());
        }
        if self.limit.is_some() {
            config.max_articles = self.limit;
        }
        config
    }
}
