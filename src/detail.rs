use std::sync::LazyLock;

use chrono::Utc;
use indexmap::IndexMap;
use scraper::{ElementRef, Html, Selector};
use tracing::{debug, instrument};

use crate::config::ScraperConfig;
use crate::error::{FetchError, Result};
use crate::extractor::image_source;
use crate::fetcher::PageFetcher;
use crate::models::{DetailProduct, ListingProduct};
use crate::parser::{element_text, parse_price, parse_rating};
use crate::selector::SelectorChain;

/// Title used when a product page has no recognisable heading
pub const DETAIL_SENTINEL_TITLE: &str = "Unknown";

static ROW: LazyLock<Selector> = LazyLock::new(|| Selector::parse("tr").expect("row selector"));
static CELL: LazyLock<Selector> = LazyLock::new(|| Selector::parse("td").expect("cell selector"));

#[derive(Debug, Clone)]
struct DetailChains {
    title: SelectorChain,
    price: SelectorChain,
    rating: SelectorChain,
    description: SelectorChain,
    specifications: SelectorChain,
    gallery: SelectorChain,
}

impl Default for DetailChains {
    fn default() -> Self {
        Self {
            title: SelectorChain::builtin("title", &["h1", ".product-title"]),
            price: SelectorChain::builtin("price", &[".price", "#price"]),
            rating: SelectorChain::builtin("rating", &[".rating", ".stars"]),
            description: SelectorChain::builtin("description", &[".description", "#description"]),
            specifications: SelectorChain::builtin("specifications", &[".specifications", ".specs"]),
            gallery: SelectorChain::builtin("gallery", &[".product-image img", ".gallery img"]),
        }
    }
}

/// Reads a single product page in depth.
#[derive(Debug)]
pub struct DetailExtractor {
    fetcher: PageFetcher,
    chains: DetailChains,
}

impl DetailExtractor {
    pub fn new(config: &ScraperConfig) -> Result<Self> {
        Ok(Self {
            fetcher: PageFetcher::new(config)?,
            chains: DetailChains::default(),
        })
    }

    /// Fetch `url` and extract the full product.
    ///
    /// A fetch failure is returned as is; there is no partial result.
    #[instrument(skip(self), level = "info")]
    pub fn extract_detail(&self, url: &str) -> std::result::Result<DetailProduct, FetchError> {
        let body = self.fetcher.fetch(url)?;
        Ok(self.parse(url, &body))
    }

    /// Extract a product from page markup already in hand.
    pub fn parse(&self, url: &str, html: &str) -> DetailProduct {
        let document = Html::parse_document(html);
        let root = document.root_element();
        let chains = &self.chains;

        let text_of = |chain: &SelectorChain| chain.first_match(root).map(element_text);

        let title = text_of(&chains.title).unwrap_or_else(|| DETAIL_SENTINEL_TITLE.to_string());
        let price = text_of(&chains.price).and_then(|t| parse_price(&t));
        let rating = text_of(&chains.rating).and_then(|t| parse_rating(&t));
        let description = text_of(&chains.description).unwrap_or_default();

        let specifications = chains
            .specifications
            .first_match(root)
            .map(specification_rows)
            .unwrap_or_default();

        let images: Vec<String> = chains
            .gallery
            .first_match_set(&document)
            .map(|(_, imgs)| imgs.into_iter().filter_map(image_source).collect())
            .unwrap_or_default();

        debug!(
            specs = specifications.len(),
            images = images.len(),
            "product page parsed"
        );

        DetailProduct {
            listing: ListingProduct {
                title,
                price,
                rating,
                description,
                url: Some(url.to_string()),
                image_url: images.first().cloned(),
                captured_at: Utc::now(),
            },
            specifications,
            images,
        }
    }
}

/// Two-column table rows as key → value; a repeated key takes the later value.
fn specification_rows(region: ElementRef<'_>) -> IndexMap<String, String> {
    let mut specs = IndexMap::new();
    for row in region.select(&ROW) {
        let mut cells = row.select(&CELL);
        let (Some(key), Some(value)) = (cells.next(), cells.next()) else {
            continue;
        };
        let key = element_text(key);
        if key.is_empty() {
            continue;
        }
        specs.insert(key, element_text(value));
    }
    specs
}
