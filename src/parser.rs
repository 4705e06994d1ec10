//! Normalization of noisy page text into typed values

use std::sync::LazyLock;

use regex::Regex;
use scraper::ElementRef;

static PRICE_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\d[\d,]*(?:\.\d*)?").expect("price pattern"));

static RATING_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\d+(?:\.\d+)?").expect("rating pattern"));

/// Upper bound of the rating scale everything is normalized onto
pub const MAX_RATING: f64 = 5.0;

/// All text below `element`, whitespace runs collapsed, trimmed.
pub fn element_text(element: ElementRef<'_>) -> String {
    clean_text(element.text())
}

/// Join text fragments with single spaces, dropping empty ones.
pub fn clean_text<'a>(parts: impl Iterator<Item = &'a str>) -> String {
    let mut buffer = String::new();
    for word in parts.flat_map(str::split_whitespace) {
        if !buffer.is_empty() {
            buffer.push(' ');
        }
        buffer.push_str(word);
    }
    buffer
}

/// First number in `text`, thousands separators removed.
///
/// `"$1,299.99"` gives `1299.99`; text without digits gives `None`.
pub fn parse_price(text: &str) -> Option<f64> {
    let raw = PRICE_PATTERN.find(text)?.as_str().replace(',', "");
    raw.parse::<f64>()
        .ok()
        .filter(|price| price.is_finite() && *price >= 0.0)
}

/// First number in `text`, mapped onto a 0..=5 scale.
///
/// Anything above 5 is assumed to come from a 10-point scale and is halved.
/// This is a guess about unknown sites, not something the page tells us;
/// values still above 5 after halving are clamped.
pub fn parse_rating(text: &str) -> Option<f64> {
    let raw: f64 = RATING_PATTERN.find(text)?.as_str().parse().ok()?;
    let rating = if raw > MAX_RATING { raw / 2.0 } else { raw };
    Some(rating.min(MAX_RATING))
}

#[cfg(test)]
mod tests {
    use super::*;
    use scraper::Html;

    #[test]
    fn price_with_currency_and_separators() {
        assert_eq!(parse_price("$1,299.99"), Some(1299.99));
        assert_eq!(parse_price("Now only 15 EUR"), Some(15.0));
        assert_eq!(parse_price("£12."), Some(12.0));
    }

    #[test]
    fn price_takes_first_number() {
        assert_eq!(parse_price("Was $30.00, now $19.99"), Some(30.0));
    }

    #[test]
    fn price_without_digits_is_unset() {
        assert_eq!(parse_price("Contact us for price"), None);
        assert_eq!(parse_price(""), None);
    }

    #[test]
    fn rating_on_ten_point_scale_is_halved() {
        assert_eq!(parse_rating("8.0"), Some(4.0));
        assert_eq!(parse_rating("Rated 9 / 10"), Some(4.5));
    }

    #[test]
    fn rating_on_five_point_scale_is_kept() {
        assert_eq!(parse_rating("4.5"), Some(4.5));
        assert_eq!(parse_rating("5 stars"), Some(5.0));
        assert_eq!(parse_rating("0"), Some(0.0));
    }

    #[test]
    fn rating_never_exceeds_scale() {
        assert_eq!(parse_rating("96% liked it"), Some(5.0));
    }

    #[test]
    fn rating_without_number_is_unset() {
        assert_eq!(parse_rating("n/a"), None);
    }

    #[test]
    fn element_text_collapses_whitespace() {
        let doc = Html::parse_fragment("<div>\n  Red   <b>Wool</b>\n\t Scarf  </div>");
        let div = doc
            .root_element()
            .select(&scraper::Selector::parse("div").unwrap())
            .next()
            .unwrap();
        assert_eq!(element_text(div), "Red Wool Scarf");
    }
}
