//! Heuristic product extraction from unknown e-commerce pages.
//!
//! A [`ListingCrawler`] walks the pages of a listing, finds the elements that
//! look like products with a [`ListingLocator`], and turns each into a
//! [`ListingProduct`] with a [`FieldExtractor`]. Every lookup is an ordered
//! [`SelectorChain`]: the first selector that matches wins. A
//! [`DetailExtractor`] reads a single product page in more depth.
//!
//! Persistence ([`store`]), export ([`archiver`]) and charts ([`charts`]) sit
//! beside the extraction engine and are only fed by it.

pub mod archiver;
pub mod charts;
pub mod config;
pub mod crawler;
pub mod detail;
pub mod error;
pub mod extractor;
pub mod fetcher;
pub mod locator;
pub mod logging;
pub mod models;
pub mod parser;
pub mod selector;
pub mod store;

pub use config::{AppConfig, ScraperConfig};
pub use crawler::{CrawlReport, ListingCrawler};
pub use detail::DetailExtractor;
pub use error::{Error, FetchError, Result};
pub use extractor::FieldExtractor;
pub use fetcher::PageFetcher;
pub use locator::ListingLocator;
pub use models::{DetailProduct, ListingProduct};
pub use selector::SelectorChain;
pub use store::ProductStore;
