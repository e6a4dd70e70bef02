//! The default selector catalog.
//!
//! Selectors for the Yogonet International news listing as of the catalog
//! version below. The catalog is compiled in and never loaded at runtime.

use crate::models::{Field, Provenance, SelectorSet};

/// Version tag of the compiled-in catalog; bump when a selector changes.
pub const CATALOG_VERSION: &str = "yogonet-international/2025-01";

/// Listing page the catalog was written against.
pub const DEFAULT_PAGE_URL: &str = "https://www.yogonet.com/international/";

/// The catalog entry, unvalidated and tagged [`Provenance::Default`].
pub fn lookup() -> SelectorSet {
    SelectorSet::new(".slot.noticia", ".titulo a", ".titulo a", Provenance::Default)
        .with(Field::Kicker, ".volanta")
        .with(Field::Image, ".imagen a img")
        .with(Field::Date, "div.fecha_actual")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_is_default_and_unvalidated() {
        let set = lookup();
        assert_eq!(set.provenance, Provenance::Default);
        assert!(!set.is_validated());
    }

    #[test]
    fn test_lookup_covers_every_field() {
        let set = lookup();
        for field in Field::ALL {
            assert!(set.get(field).is_some(), "missing default selector for {field}");
        }
    }

    #[test]
    fn test_lookup_selectors_parse() {
        let set = lookup();
        for field in Field::ALL {
            let selector = set.get(field).unwrap();
            assert!(scraper::Selector::parse(selector).is_ok(), "{selector}");
        }
    }
}
