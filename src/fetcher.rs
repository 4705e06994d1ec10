use reqwest::blocking::Client;
use reqwest::header::{ACCEPT_LANGUAGE, HeaderMap, HeaderValue};
use reqwest::redirect;
use tracing::{debug, instrument};

use crate::config::ScraperConfig;
use crate::error::{Error, FetchError, FetchErrorKind, Result};

/// Blocking HTTP GET with browser-like headers.
///
/// One fetcher owns one connection pool; give each crawl its own instance.
#[derive(Debug)]
pub struct PageFetcher {
    client: Client,
}

impl PageFetcher {
    pub fn new(config: &ScraperConfig) -> Result<Self> {
        let max_redirects = config.max_redirects;
        let redirect_policy = redirect::Policy::custom(move |attempt| {
            if attempt.previous().len() > max_redirects {
                attempt.error(format!("too many redirects (>{max_redirects})"))
            } else {
                attempt.follow()
            }
        });

        let mut headers = HeaderMap::new();
        let accept_language = HeaderValue::from_str(&config.accept_language).map_err(|e| {
            Error::InvalidArgument(format!(
                "invalid Accept-Language '{}': {e}",
                config.accept_language
            ))
        })?;
        headers.insert(ACCEPT_LANGUAGE, accept_language);

        let client = Client::builder()
            .user_agent(config.user_agent.as_str())
            .default_headers(headers)
            .timeout(config.timeout)
            .redirect(redirect_policy)
            .build()
            .map_err(|e| Error::InvalidArgument(format!("failed to build HTTP client: {e}")))?;

        Ok(Self { client })
    }

    /// Fetch `url` and return the response body.
    ///
    /// Any transport failure or non-2xx status is an error. Nothing is retried.
    #[instrument(skip(self), level = "debug")]
    pub fn fetch(&self, url: &str) -> std::result::Result<String, FetchError> {
        let response = self
            .client
            .get(url)
            .send()
            .map_err(|e| FetchError::new(url, FetchErrorKind::Transport(e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::new(url, FetchErrorKind::Status(status.as_u16())));
        }

        let body = response
            .text()
            .map_err(|e| FetchError::new(url, FetchErrorKind::Body(e)))?;
        debug!(status = status.as_u16(), bytes = body.len(), "page fetched");
        Ok(body)
    }
}
