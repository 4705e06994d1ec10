use std::sync::LazyLock;

use chrono::Utc;
use scraper::{ElementRef, Selector};
use tracing::debug;

use crate::models::ListingProduct;
use crate::parser::{element_text, parse_price, parse_rating};
use crate::selector::SelectorChain;

/// Placeholder for "no title found"; a container whose title resolves to it
/// is not a product.
pub const SENTINEL_TITLE: &str = "Unknown Product";

pub const TITLE_SELECTORS: &[&str] = &[
    ".product-title",
    ".title",
    "h1",
    "h2",
    "h3",
    "h4",
    ".name",
    ".product-name",
    "[data-title]",
    ".item-title",
];

pub const PRICE_SELECTORS: &[&str] = &[
    ".price",
    ".product-price",
    ".cost",
    ".amount",
    "[data-price]",
    ".price-current",
    ".sale-price",
    ".regular-price",
    ".money",
];

pub const RATING_SELECTORS: &[&str] = &[
    ".rating",
    ".stars",
    ".star-rating",
    ".review-stars",
    "[data-rating]",
    ".score",
    ".rate",
];

pub const DESCRIPTION_SELECTORS: &[&str] = &[
    ".description",
    ".product-desc",
    ".summary",
    ".excerpt",
    ".product-summary",
    "[data-description]",
];

static LINK: LazyLock<Selector> = LazyLock::new(|| Selector::parse("a").expect("link selector"));
static IMAGE: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("img").expect("image selector"));

/// Fallback chains for each listing field
#[derive(Debug, Clone)]
pub struct FieldChains {
    pub title: SelectorChain,
    pub price: SelectorChain,
    pub rating: SelectorChain,
    pub description: SelectorChain,
}

impl Default for FieldChains {
    fn default() -> Self {
        Self {
            title: SelectorChain::builtin("title", TITLE_SELECTORS),
            price: SelectorChain::builtin("price", PRICE_SELECTORS),
            rating: SelectorChain::builtin("rating", RATING_SELECTORS),
            description: SelectorChain::builtin("description", DESCRIPTION_SELECTORS),
        }
    }
}

/// Turns one located container into a [`ListingProduct`].
#[derive(Debug, Clone, Default)]
pub struct FieldExtractor {
    chains: FieldChains,
}

impl FieldExtractor {
    pub fn new(chains: FieldChains) -> Self {
        Self { chains }
    }

    /// Extract a product from `container`.
    ///
    /// Every field is resolved independently; a field that cannot be found
    /// or parsed is left unset without affecting the others. Returns `None`
    /// only when no usable title is found.
    pub fn extract(&self, container: ElementRef<'_>) -> Option<ListingProduct> {
        let title = self.title(container);
        let price = self.price(container);
        let rating = self.rating(container);
        let description = self.description(container);
        let url = first_link(container);
        let image_url = first_image(container);

        let Some(title) = title else {
            debug!("container skipped: no usable title");
            return None;
        };

        Some(ListingProduct {
            title,
            price,
            rating,
            description,
            url,
            image_url,
            captured_at: Utc::now(),
        })
    }

    /// Whitespace-collapsed title text; empty or sentinel titles count as
    /// missing.
    ///
    /// The sentinel is compared against the trimmed raw text, so inner line
    /// breaks keep a title distinct from it.
    pub fn title(&self, container: ElementRef<'_>) -> Option<String> {
        let element = self.chains.title.first_match(container)?;
        let raw: String = element.text().collect();
        let raw = raw.trim();
        if raw.is_empty() || raw == SENTINEL_TITLE {
            return None;
        }
        Some(element_text(element))
    }

    pub fn price(&self, container: ElementRef<'_>) -> Option<f64> {
        self.chains
            .price
            .first_match(container)
            .and_then(|el| parse_price(&element_text(el)))
    }

    pub fn rating(&self, container: ElementRef<'_>) -> Option<f64> {
        self.chains
            .rating
            .first_match(container)
            .and_then(|el| parse_rating(&element_text(el)))
    }

    pub fn description(&self, container: ElementRef<'_>) -> String {
        self.chains
            .description
            .first_match(container)
            .map(element_text)
            .unwrap_or_default()
    }
}

/// `href` of the first anchor under `scope`.
pub fn first_link(scope: ElementRef<'_>) -> Option<String> {
    scope
        .select(&LINK)
        .next()
        .and_then(|a| a.value().attr("href"))
        .map(str::to_string)
}

/// `src` of the first image under `scope`, or its `data-src` when lazy-loaded.
pub fn first_image(scope: ElementRef<'_>) -> Option<String> {
    scope.select(&IMAGE).next().and_then(image_source)
}

pub(crate) fn image_source(img: ElementRef<'_>) -> Option<String> {
    let attrs = img.value();
    attrs
        .attr("src")
        .filter(|src| !src.trim().is_empty())
        .or_else(|| attrs.attr("data-src"))
        .map(|src| src.trim().to_string())
        .filter(|src| !src.is_empty())
}
