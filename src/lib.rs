//! # Adaptive News
//!
//! Extracts news-article records from listing pages whose markup drifts over
//! time, and enriches each record with features derived from its title.
//!
//! ## Architecture
//!
//! The core is a single pass over one [`DomSnapshot`](snapshot::DomSnapshot):
//!
//! 1. **Resolution** ([`selectors::resolver`]): validate the compiled-in
//!    catalog, then a cached set, then ask a language model
//!    ([`inference`]) for selectors
//! 2. **Extraction** ([`extract`]): apply the validated set, one raw article
//!    per listing container
//! 3. **Enrichment** ([`enrich`]): word and character counts, capitalized
//!    words, named entities
//! 4. **Assembly** ([`assemble`]): attach the run timestamp and drop
//!    duplicate links
//! 5. **Output** ([`outputs`]): hand the whole batch to a sink, or nothing
//!
//! [`pipeline`] wires these together with cancellation. The language model
//! sits behind the [`api::AskAsync`] seam and entity recognition behind
//! [`enrich::ner::EntityRecognizer`], so both can be replaced in tests.

pub mod api;
pub mod assemble;
pub mod config;
pub mod enrich;
pub mod errors;
pub mod extract;
pub mod inference;
pub mod models;
pub mod outputs;
pub mod pipeline;
pub mod selectors;
pub mod snapshot;
pub mod summary;
pub mod utils;
