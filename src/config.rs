//! Scraper and application configuration
//!
//! `ScraperConfig` controls how pages are requested and how fast a crawl
//! walks through them. `AppConfig` holds the filesystem locations the binary
//! works with and is loaded from the environment (and an optional `.env`).

use std::env;
use std::ops::RangeInclusive;
use std::path::PathBuf;
use std::time::Duration;

use crate::error::{Error, Result};

/// Browser-like user agent sent with every request
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36";

/// Accept-Language sent with every request
pub const DEFAULT_ACCEPT_LANGUAGE: &str = "en-US,en;q=0.9";

/// Configuration for fetching and crawling
#[derive(Debug, Clone)]
pub struct ScraperConfig {
    /// User agent to use for requests
    pub user_agent: String,

    /// Accept-Language header value
    pub accept_language: String,

    /// Per-request timeout
    pub timeout: Duration,

    /// Maximum redirects followed per request
    pub max_redirects: usize,

    /// Range the inter-page delay is drawn from
    pub delay_range: RangeInclusive<Duration>,

    /// Query parameter that carries the page number for pages after the first
    pub page_param: String,
}

impl Default for ScraperConfig {
    fn default() -> Self {
        Self {
            user_agent: DEFAULT_USER_AGENT.to_string(),
            accept_language: DEFAULT_ACCEPT_LANGUAGE.to_string(),
            timeout: Duration::from_secs(10),
            max_redirects: 10,
            delay_range: Duration::from_secs(1)..=Duration::from_secs(3),
            page_param: "page".to_string(),
        }
    }
}

impl ScraperConfig {
    /// Create a new builder
    pub fn builder() -> ScraperConfigBuilder {
        ScraperConfigBuilder::new()
    }
}

/// Builder for ScraperConfig
#[derive(Debug, Default)]
pub struct ScraperConfigBuilder {
    config: ScraperConfig,
}

impl ScraperConfigBuilder {
    /// Create a new builder with default configuration
    pub fn new() -> Self {
        Self {
            config: ScraperConfig::default(),
        }
    }

    /// Set the user agent
    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.config.user_agent = user_agent.into();
        self
    }

    /// Set the Accept-Language header
    pub fn accept_language(mut self, accept_language: impl Into<String>) -> Self {
        self.config.accept_language = accept_language.into();
        self
    }

    /// Set the per-request timeout
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config.timeout = timeout;
        self
    }

    /// Set the redirect limit
    pub fn max_redirects(mut self, max_redirects: usize) -> Self {
        self.config.max_redirects = max_redirects;
        self
    }

    /// Set the inter-page delay range. A reversed range is swapped.
    pub fn delay_range(mut self, min: Duration, max: Duration) -> Self {
        self.config.delay_range = if min <= max { min..=max } else { max..=min };
        self
    }

    /// Disable the inter-page delay entirely
    pub fn no_delay(self) -> Self {
        self.delay_range(Duration::ZERO, Duration::ZERO)
    }

    /// Set the pagination query parameter
    pub fn page_param(mut self, page_param: impl Into<String>) -> Self {
        self.config.page_param = page_param.into();
        self
    }

    /// Build the configuration
    pub fn build(self) -> ScraperConfig {
        self.config
    }
}

/// Locations and defaults used by the command-line orchestrator
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub index_dir: PathBuf,
    pub export_dir: PathBuf,
    pub chart_dir: PathBuf,
    pub timeout: Duration,
}

impl AppConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        // Load .env file if present
        let _ = dotenvy::dotenv();

        let timeout_secs = match env::var("SHOPSCRAPE_TIMEOUT_SECS") {
            Ok(raw) => raw.parse::<u64>().map_err(|_| {
                Error::InvalidArgument(format!(
                    "SHOPSCRAPE_TIMEOUT_SECS must be a whole number of seconds, got {raw:?}"
                ))
            })?,
            Err(_) => 10,
        };

        Ok(Self {
            index_dir: path_var("SHOPSCRAPE_INDEX_DIR", "product_index"),
            export_dir: path_var("SHOPSCRAPE_EXPORT_DIR", "exports"),
            chart_dir: path_var("SHOPSCRAPE_CHART_DIR", "charts"),
            timeout: Duration::from_secs(timeout_secs),
        })
    }

    /// Scraper configuration derived from the application settings
    pub fn scraper_config(&self) -> ScraperConfig {
        ScraperConfig::builder().timeout(self.timeout).build()
    }
}

fn path_var(key: &str, default: &str) -> PathBuf {
    env::var_os(key)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(default))
}
