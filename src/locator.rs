use scraper::{ElementRef, Html};
use tracing::{debug, warn};

use crate::error::Result;
use crate::selector::SelectorChain;

/// Container patterns, most specific first.
pub const CONTAINER_SELECTORS: &[&str] = &[
    ".product-container",
    ".product",
    ".item",
    ".product-item",
    "[data-product]",
    "li.product",
    ".product-card",
    ".listing-item",
    ".search-result",
    ".product-tile",
    ".grid-item",
    ".product-box",
    "article",
    ".card",
    ".product-wrapper",
];

/// Finds the subtrees of a listing page that look like individual products.
#[derive(Debug, Clone)]
pub struct ListingLocator {
    containers: SelectorChain,
}

impl Default for ListingLocator {
    fn default() -> Self {
        Self {
            containers: SelectorChain::builtin("container", CONTAINER_SELECTORS),
        }
    }
}

impl ListingLocator {
    /// Locator with a caller-supplied container catalogue
    pub fn with_selectors<S: AsRef<str>>(patterns: &[S]) -> Result<Self> {
        Ok(Self {
            containers: SelectorChain::new("container", patterns)?,
        })
    }

    /// Every node matched by the first container pattern that matches
    /// anything, in document order. An empty result means the page layout
    /// is not one we recognise.
    pub fn locate<'a>(&self, document: &'a Html) -> Vec<ElementRef<'a>> {
        match self.containers.first_match_set(document) {
            Some((pattern, containers)) => {
                debug!(count = containers.len(), pattern, "located product containers");
                containers
            }
            None => {
                warn!("no product containers found; page structure not supported");
                Vec::new()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_matching_pattern_supplies_all_containers() {
        let doc = Html::parse_document(
            r#"
            <div class="product-container">A</div>
            <div class="product-container">B</div>
            <div class="product">C</div>
            <article>D</article>
            "#,
        );
        let containers = ListingLocator::default().locate(&doc);
        let texts: Vec<String> = containers.iter().map(|c| c.text().collect()).collect();
        assert_eq!(texts, vec!["A", "B"]);
    }

    #[test]
    fn later_pattern_used_when_earlier_absent() {
        let doc = Html::parse_document(
            r#"<main><article>One</article><article>Two</article><div class="card">X</div></main>"#,
        );
        let containers = ListingLocator::default().locate(&doc);
        assert_eq!(containers.len(), 2);
        assert!(containers.iter().all(|c| c.value().name() == "article"));
    }

    #[test]
    fn unsupported_structure_is_empty_not_error() {
        let doc = Html::parse_document("<html><body><p>Hello</p></body></html>");
        assert!(ListingLocator::default().locate(&doc).is_empty());
    }

    #[test]
    fn custom_catalogue() {
        let doc = Html::parse_document(r#"<section class="sku">1</section><section class="sku">2</section>"#);
        let locator = ListingLocator::with_selectors(&["section.sku"]).unwrap();
        assert_eq!(locator.locate(&doc).len(), 2);
    }
}
