//! Sequential multi-page listing crawl
//!
//! Pages are fetched strictly one after another. Page 1 is the seed URL
//! itself; page `k > 1` is the seed with a `page=k` query parameter. A random
//! pause is taken before every page after the first. The first page that
//! fails to fetch ends the crawl, and whatever was collected until then is
//! the result.

use std::thread;
use std::time::Duration;

use rand::Rng;
use scraper::Html;
use tracing::{debug, error, info, instrument};
use url::Url;

use crate::config::ScraperConfig;
use crate::error::{Error, FetchError, Result};
use crate::extractor::FieldExtractor;
use crate::fetcher::PageFetcher;
use crate::locator::ListingLocator;
use crate::models::ListingProduct;

/// Result of a crawl plus how far it got.
#[derive(Debug)]
pub struct CrawlReport {
    pub products: Vec<ListingProduct>,
    pub pages_requested: usize,
    /// Pages fetched and parsed successfully
    pub pages_completed: usize,
    /// The fetch failure that stopped the crawl early, if any
    pub stopped_by: Option<FetchError>,
}

impl CrawlReport {
    pub fn ended_early(&self) -> bool {
        self.pages_completed < self.pages_requested
    }
}

/// Drives fetch → locate → extract across the pages of one listing.
///
/// Owns its fetcher; run one crawler per concurrent crawl.
#[derive(Debug)]
pub struct ListingCrawler {
    fetcher: PageFetcher,
    locator: ListingLocator,
    extractor: FieldExtractor,
    config: ScraperConfig,
}

impl ListingCrawler {
    pub fn new(config: ScraperConfig) -> Result<Self> {
        Ok(Self {
            fetcher: PageFetcher::new(&config)?,
            locator: ListingLocator::default(),
            extractor: FieldExtractor::default(),
            config,
        })
    }

    /// Replace the container catalogue
    pub fn with_locator(mut self, locator: ListingLocator) -> Self {
        self.locator = locator;
        self
    }

    /// Replace the field chains
    pub fn with_extractor(mut self, extractor: FieldExtractor) -> Self {
        self.extractor = extractor;
        self
    }

    /// Crawl up to `max_pages` pages starting at `seed_url`.
    ///
    /// Page failures never surface here: a failed page ends the crawl and
    /// the products from earlier pages are returned. Errors are reserved for
    /// misuse (`max_pages == 0`, unparseable seed URL).
    pub fn crawl(&self, seed_url: &str, max_pages: usize) -> Result<Vec<ListingProduct>> {
        self.crawl_with_report(seed_url, max_pages)
            .map(|report| report.products)
    }

    /// Like [`crawl`](Self::crawl), but also reports how many pages completed.
    #[instrument(skip(self), level = "info")]
    pub fn crawl_with_report(&self, seed_url: &str, max_pages: usize) -> Result<CrawlReport> {
        if max_pages < 1 {
            return Err(Error::InvalidArgument("max_pages must be at least 1".into()));
        }
        // Reject a bad seed before any request goes out.
        page_url(seed_url, 2, &self.config.page_param)?;

        let mut report = CrawlReport {
            products: Vec::new(),
            pages_requested: max_pages,
            pages_completed: 0,
            stopped_by: None,
        };

        for page in 1..=max_pages {
            if page > 1 {
                self.throttle();
            }

            let target = page_url(seed_url, page, &self.config.page_param)?;
            match self.scrape_page(&target) {
                Ok(products) => {
                    info!(page, found = products.len(), url = %target, "page scraped");
                    report.products.extend(products);
                    report.pages_completed += 1;
                }
                Err(e) => {
                    error!(page, error = %e, "stopping crawl");
                    report.stopped_by = Some(e);
                    break;
                }
            }
        }

        info!(
            total = report.products.len(),
            pages = report.pages_completed,
            "crawl finished"
        );
        Ok(report)
    }

    /// Fetch one listing page and extract every product on it, in document order.
    pub fn scrape_page(&self, url: &str) -> std::result::Result<Vec<ListingProduct>, FetchError> {
        let body = self.fetcher.fetch(url)?;
        Ok(self.extract_listing(&body))
    }

    /// Extract products from listing markup that is already in hand.
    pub fn extract_listing(&self, html: &str) -> Vec<ListingProduct> {
        let document = Html::parse_document(html);
        self.locator
            .locate(&document)
            .into_iter()
            .filter_map(|container| self.extractor.extract(container))
            .collect()
    }

    fn throttle(&self) {
        let delay = random_delay(
            *self.config.delay_range.start(),
            *self.config.delay_range.end(),
        );
        if !delay.is_zero() {
            debug!(delay_ms = delay.as_millis() as u64, "throttling before next page");
            thread::sleep(delay);
        }
    }
}

/// Target URL for `page` (1-based) of the listing at `seed_url`.
///
/// Page 1 is the seed verbatim. Later pages append `<param>=<page>` to the
/// seed's query, dropping any segment the seed already had for that
/// parameter. Every other segment is kept as written.
pub fn page_url(seed_url: &str, page: usize, param: &str) -> Result<String> {
    if page <= 1 {
        return Ok(seed_url.to_string());
    }

    let mut url = Url::parse(seed_url)
        .map_err(|e| Error::InvalidArgument(format!("invalid seed URL '{seed_url}': {e}")))?;
    let prefix = format!("{param}=");
    let mut segments: Vec<String> = url
        .query()
        .unwrap_or_default()
        .split('&')
        .filter(|segment| {
            !segment.is_empty() && *segment != param && !segment.starts_with(&prefix)
        })
        .map(str::to_string)
        .collect();
    segments.push(format!("{prefix}{page}"));

    url.set_query(Some(&segments.join("&")));
    Ok(url.to_string())
}

fn random_delay(min: Duration, max: Duration) -> Duration {
    let (lo, hi) = (min.as_millis() as u64, max.as_millis() as u64);
    if hi <= lo {
        return min;
    }
    Duration::from_millis(rand::rng().random_range(lo..=hi))
}
