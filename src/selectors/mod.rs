//! Selector resolution: deciding which CSS query to use for each article field.
//!
//! # Submodules
//!
//! - [`catalog`]: the compiled-in default selector catalog
//! - [`validator`]: checks a selector set against a snapshot
//! - [`cache`]: fingerprint-keyed store of previously inferred selector sets
//! - [`resolver`]: the state machine that falls back from the catalog to the
//!   cache and then to model inference
//!
//! # Resolution Order
//!
//! ```text
//! UNRESOLVED -> TRYING_DEFAULT -> RESOLVED(default)
//!                    |
//!                    v
//!              TRYING_CACHED  -> RESOLVED(cached)     (only with a cache hit)
//!                    |
//!                    v
//!               TRYING_AI     -> RESOLVED(ai)         (only with a backend)
//!                    |
//!                    v
//!                  FAILED
//! ```

pub mod cache;
pub mod catalog;
pub mod resolver;
pub mod validator;
