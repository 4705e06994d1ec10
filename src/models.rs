use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use url::Url;

/// One product as found on a listing page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListingProduct {
    pub title: String,
    pub price: Option<f64>,
    /// Normalized into 0..=5
    pub rating: Option<f64>,
    pub description: String,
    pub url: Option<String>,
    pub image_url: Option<String>,
    pub captured_at: DateTime<Utc>,
}

impl ListingProduct {
    /// Product link made absolute against the page it was found on.
    ///
    /// Returns `None` when there is no link or it cannot be joined.
    pub fn resolved_url(&self, base: &Url) -> Option<Url> {
        self.url.as_deref().and_then(|href| base.join(href).ok())
    }

    /// Image link made absolute against the page it was found on.
    pub fn resolved_image_url(&self, base: &Url) -> Option<Url> {
        self.image_url.as_deref().and_then(|src| base.join(src).ok())
    }
}

/// A product page read in full.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetailProduct {
    #[serde(flatten)]
    pub listing: ListingProduct,
    /// Specification rows in page order; a repeated key keeps its first
    /// position but takes the later value.
    pub specifications: IndexMap<String, String>,
    /// Gallery images in page order, duplicates included
    pub images: Vec<String>,
}
