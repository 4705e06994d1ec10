//! SVG charts over stored products
//!
//! Rendering is optional. Whether it is available is decided once at start
//! up ([`ChartCapability::detect`]) and passed in through [`ChartConfig`];
//! when it is unavailable every render call returns `Ok(None)`.

use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::fs;
use std::path::PathBuf;

use chrono::NaiveDate;
use tracing::{debug, info};

use crate::error::Result;
use crate::parser::MAX_RATING;
use crate::store::{PriceStats, RatingStats, StoredProduct};

const WIDTH: f64 = 720.0;
const HEIGHT: f64 = 420.0;
const MARGIN: f64 = 60.0;
const HISTOGRAM_BUCKETS: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChartCapability {
    Available,
    Unavailable,
}

impl ChartCapability {
    /// Capability compiled into this binary (`charts` feature).
    pub fn detect() -> Self {
        if cfg!(feature = "charts") {
            ChartCapability::Available
        } else {
            ChartCapability::Unavailable
        }
    }
}

#[derive(Debug, Clone)]
pub struct ChartConfig {
    pub capability: ChartCapability,
    pub output_dir: PathBuf,
}

/// One bar; `range` draws a whisker from min to max.
#[derive(Debug, Clone, PartialEq)]
struct Bar {
    label: String,
    value: f64,
    range: Option<(f64, f64)>,
}

#[derive(Debug, Clone)]
pub struct ChartRenderer {
    config: ChartConfig,
}

impl ChartRenderer {
    pub fn new(config: ChartConfig) -> Self {
        Self { config }
    }

    pub fn is_available(&self) -> bool {
        self.config.capability == ChartCapability::Available
    }

    /// Average price per site with min/max whiskers.
    pub fn price_comparison(&self, stats: &[PriceStats]) -> Result<Option<PathBuf>> {
        let bars: Vec<Bar> = stats
            .iter()
            .filter_map(|s| {
                Some(Bar {
                    label: s.source_site.clone(),
                    value: s.avg_price?,
                    range: s.min_price.zip(s.max_price),
                })
            })
            .collect();
        self.render("price_comparison.svg", !bars.is_empty(), || {
            bar_chart_svg("Price Comparison Across Websites", &bars, |v| {
                format!("${v:.2}")
            })
        })
    }

    /// Average rating per site.
    pub fn rating_comparison(&self, stats: &[RatingStats]) -> Result<Option<PathBuf>> {
        let bars: Vec<Bar> = stats
            .iter()
            .map(|s| Bar {
                label: s.source_site.clone(),
                value: s.avg_rating,
                range: None,
            })
            .collect();
        self.render("rating_comparison.svg", !bars.is_empty(), || {
            bar_chart_svg("Average Rating by Website", &bars, |v| format!("{v:.1}"))
        })
    }

    /// Histogram of prices over all priced products.
    pub fn price_distribution(&self, products: &[StoredProduct]) -> Result<Option<PathBuf>> {
        let prices: Vec<f64> = products.iter().filter_map(|p| p.price).collect();
        let bars = histogram(&prices, HISTOGRAM_BUCKETS);
        self.render("price_distribution.svg", !bars.is_empty(), || {
            bar_chart_svg("Price Distribution", &bars, |v| format!("{v:.0}"))
        })
    }

    /// Price against rating for every product that has both. The rating
    /// axis always spans the whole 0 to 5 scale.
    pub fn price_vs_rating(&self, products: &[StoredProduct]) -> Result<Option<PathBuf>> {
        let points: Vec<(f64, f64)> = products
            .iter()
            .filter_map(|p| p.rating.zip(p.price))
            .collect();
        self.render("price_vs_rating.svg", !points.is_empty(), || {
            scatter_svg("Price vs. Rating", &points)
        })
    }

    /// Average price per capture day, oldest day first.
    pub fn price_trends(&self, products: &[StoredProduct]) -> Result<Option<PathBuf>> {
        let series = daily_average_price(products);
        self.render("price_trends.svg", !series.is_empty(), || {
            line_chart_svg("Price Trends Over Time", &series)
        })
    }

    fn render(
        &self,
        file_name: &str,
        has_data: bool,
        draw: impl FnOnce() -> String,
    ) -> Result<Option<PathBuf>> {
        if !self.is_available() {
            debug!(chart = file_name, "chart rendering unavailable");
            return Ok(None);
        }
        if !has_data {
            debug!(chart = file_name, "no data to chart");
            return Ok(None);
        }

        fs::create_dir_all(&self.config.output_dir)?;
        let path = self.config.output_dir.join(file_name);
        fs::write(&path, draw())?;
        info!(path = %path.display(), "chart written");
        Ok(Some(path))
    }
}

fn histogram(values: &[f64], buckets: usize) -> Vec<Bar> {
    let (Some(min), Some(max)) = (
        values.iter().copied().reduce(f64::min),
        values.iter().copied().reduce(f64::max),
    ) else {
        return Vec::new();
    };

    let width = if max > min { (max - min) / buckets as f64 } else { 1.0 };
    let mut counts = vec![0usize; buckets];
    for value in values {
        let slot = (((value - min) / width) as usize).min(buckets - 1);
        counts[slot] += 1;
    }

    counts
        .into_iter()
        .enumerate()
        .map(|(i, count)| {
            let lo = min + width * i as f64;
            Bar {
                label: format!("{lo:.0}-{:.0}", lo + width),
                value: count as f64,
                range: None,
            }
        })
        .collect()
}

/// Average price per calendar day of capture, over priced products.
fn daily_average_price(products: &[StoredProduct]) -> Vec<(NaiveDate, f64)> {
    let mut by_day: BTreeMap<NaiveDate, Vec<f64>> = BTreeMap::new();
    for product in products {
        if let (Some(price), Some(at)) = (product.price, product.captured_at) {
            by_day.entry(at.date_naive()).or_default().push(price);
        }
    }
    by_day
        .into_iter()
        .map(|(day, prices)| (day, prices.iter().sum::<f64>() / prices.len() as f64))
        .collect()
}

fn svg_open(title: &str) -> String {
    let mut svg = String::new();
    let _ = writeln!(
        svg,
        r#"<svg xmlns="http://www.w3.org/2000/svg" width="{WIDTH}" height="{HEIGHT}" font-family="sans-serif" font-size="12">"#
    );
    let _ = writeln!(
        svg,
        r#"<text x="{}" y="{}" text-anchor="middle" font-size="16">{}</text>"#,
        WIDTH / 2.0,
        MARGIN / 2.0,
        escape(title)
    );
    svg
}

/// Maps a value in `0..=top` onto the plot's vertical extent.
fn y_scale(top: f64) -> impl Fn(f64) -> f64 {
    let top = top.max(f64::EPSILON);
    move |v| HEIGHT - MARGIN - v / top * (HEIGHT - 2.0 * MARGIN)
}

fn scatter_svg(title: &str, points: &[(f64, f64)]) -> String {
    let plot_width = WIDTH - 2.0 * MARGIN;
    let x = |rating: f64| MARGIN + rating.clamp(0.0, MAX_RATING) / MAX_RATING * plot_width;
    let y = y_scale(points.iter().map(|&(_, price)| price).fold(0.0_f64, f64::max));

    let mut svg = svg_open(title);
    for tick in 0..=MAX_RATING as u32 {
        let _ = writeln!(
            svg,
            r#"<text x="{:.1}" y="{:.1}" text-anchor="middle">{tick}</text>"#,
            x(f64::from(tick)),
            HEIGHT - MARGIN + 16.0
        );
    }
    for &(rating, price) in points {
        let _ = writeln!(
            svg,
            r##"<circle cx="{:.1}" cy="{:.1}" r="4" fill="#3b7dd8" fill-opacity="0.5"/>"##,
            x(rating),
            y(price)
        );
    }
    svg.push_str("</svg>\n");
    svg
}

fn line_chart_svg(title: &str, series: &[(NaiveDate, f64)]) -> String {
    let slot = (WIDTH - 2.0 * MARGIN) / series.len() as f64;
    let x = |i: usize| MARGIN + slot * (i as f64 + 0.5);
    let y = y_scale(series.iter().map(|&(_, avg)| avg).fold(0.0_f64, f64::max));

    let mut svg = svg_open(title);
    let path: Vec<String> = series
        .iter()
        .enumerate()
        .map(|(i, &(_, avg))| format!("{:.1},{:.1}", x(i), y(avg)))
        .collect();
    let _ = writeln!(
        svg,
        r##"<polyline points="{}" fill="none" stroke="#3b7dd8" stroke-width="2"/>"##,
        path.join(" ")
    );
    for (i, &(day, avg)) in series.iter().enumerate() {
        let _ = writeln!(
            svg,
            r##"<circle cx="{:.1}" cy="{:.1}" r="4" fill="#3b7dd8"/>"##,
            x(i),
            y(avg)
        );
        let _ = writeln!(
            svg,
            r#"<text x="{:.1}" y="{:.1}" text-anchor="middle">${avg:.2}</text>"#,
            x(i),
            y(avg) - 8.0
        );
        let _ = writeln!(
            svg,
            r#"<text x="{:.1}" y="{:.1}" text-anchor="middle">{}</text>"#,
            x(i),
            HEIGHT - MARGIN + 16.0,
            day.format("%Y-%m-%d")
        );
    }
    svg.push_str("</svg>\n");
    svg
}

fn bar_chart_svg(title: &str, bars: &[Bar], label: impl Fn(f64) -> String) -> String {
    let top = bars
        .iter()
        .map(|b| b.range.map_or(b.value, |(_, hi)| hi.max(b.value)))
        .fold(0.0_f64, f64::max);
    let slot = (WIDTH - 2.0 * MARGIN) / bars.len() as f64;
    let y = y_scale(top);

    let mut svg = svg_open(title);

    for (i, bar) in bars.iter().enumerate() {
        let x = MARGIN + slot * i as f64 + slot * 0.15;
        let w = slot * 0.7;
        let _ = writeln!(
            svg,
            r##"<rect x="{x:.1}" y="{:.1}" width="{w:.1}" height="{:.1}" fill="#3b7dd8"/>"##,
            y(bar.value),
            HEIGHT - MARGIN - y(bar.value)
        );
        if let Some((lo, hi)) = bar.range {
            let cx = x + w / 2.0;
            let _ = writeln!(
                svg,
                r##"<line x1="{cx:.1}" y1="{:.1}" x2="{cx:.1}" y2="{:.1}" stroke="#d83b3b" stroke-width="2"/>"##,
                y(lo),
                y(hi)
            );
        }
        let _ = writeln!(
            svg,
            r#"<text x="{:.1}" y="{:.1}" text-anchor="middle">{}</text>"#,
            x + w / 2.0,
            y(bar.value) - 4.0,
            escape(&label(bar.value))
        );
        let _ = writeln!(
            svg,
            r#"<text x="{:.1}" y="{:.1}" text-anchor="middle">{}</text>"#,
            x + w / 2.0,
            HEIGHT - MARGIN + 16.0,
            escape(&bar.label)
        );
    }

    svg.push_str("</svg>\n");
    svg
}

fn escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn renderer(capability: ChartCapability, dir: &std::path::Path) -> ChartRenderer {
        ChartRenderer::new(ChartConfig {
            capability,
            output_dir: dir.to_path_buf(),
        })
    }

    fn price_stats() -> Vec<PriceStats> {
        vec![PriceStats {
            source_site: "a&b.test".into(),
            count: 2,
            avg_price: Some(15.0),
            min_price: Some(10.0),
            max_price: Some(20.0),
        }]
    }

    #[test]
    fn writes_svg_when_available() {
        let dir = tempfile::tempdir().unwrap();
        let path = renderer(ChartCapability::Available, dir.path())
            .price_comparison(&price_stats())
            .unwrap()
            .unwrap();

        let svg = fs::read_to_string(path).unwrap();
        assert!(svg.starts_with("<svg"));
        assert!(svg.contains("a&amp;b.test"));
        assert!(svg.contains("$15.00"));
        assert!(svg.contains("<line"));
    }

    #[test]
    fn unavailable_renders_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let out = renderer(ChartCapability::Unavailable, dir.path())
            .price_comparison(&price_stats())
            .unwrap();
        assert!(out.is_none());
        assert!(fs::read_dir(dir.path()).unwrap().next().is_none());
    }

    #[test]
    fn empty_data_renders_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let out = renderer(ChartCapability::Available, dir.path())
            .rating_comparison(&[])
            .unwrap();
        assert!(out.is_none());
    }

    fn stored(id: u64, price: Option<f64>, rating: Option<f64>, day: u32) -> StoredProduct {
        StoredProduct {
            id,
            title: format!("Item {id}"),
            price,
            rating,
            description: String::new(),
            url: None,
            image_url: None,
            captured_at: Utc.with_ymd_and_hms(2024, 3, day, 12, 0, 0).single(),
            source_site: "a.test".into(),
            category: None,
            extra: None,
        }
    }

    #[test]
    fn scatter_plots_only_products_with_price_and_rating() {
        let dir = tempfile::tempdir().unwrap();
        let products = [
            stored(1, Some(20.0), Some(5.0), 1),
            stored(2, Some(10.0), None, 1),
            stored(3, None, Some(3.0), 1),
            stored(4, Some(5.0), Some(0.0), 1),
        ];
        let path = renderer(ChartCapability::Available, dir.path())
            .price_vs_rating(&products)
            .unwrap()
            .unwrap();

        let svg = fs::read_to_string(path).unwrap();
        assert_eq!(svg.matches("<circle").count(), 2);
        // Rating 5 sits on the right edge, rating 0 on the left.
        assert!(svg.contains(&format!(r#"cx="{:.1}""#, WIDTH - MARGIN)));
        assert!(svg.contains(&format!(r#"cx="{MARGIN:.1}""#)));
    }

    #[test]
    fn scatter_without_complete_records_renders_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let out = renderer(ChartCapability::Available, dir.path())
            .price_vs_rating(&[stored(1, Some(3.0), None, 1)])
            .unwrap();
        assert!(out.is_none());
    }

    #[test]
    fn trends_average_price_per_day() {
        let products = [
            stored(1, Some(10.0), None, 2),
            stored(2, Some(20.0), None, 2),
            stored(3, Some(7.0), None, 1),
            stored(4, None, None, 3),
        ];
        let series = daily_average_price(&products);
        assert_eq!(
            series,
            vec![
                (NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(), 7.0),
                (NaiveDate::from_ymd_opt(2024, 3, 2).unwrap(), 15.0),
            ]
        );

        let dir = tempfile::tempdir().unwrap();
        let path = renderer(ChartCapability::Available, dir.path())
            .price_trends(&products)
            .unwrap()
            .unwrap();
        let svg = fs::read_to_string(path).unwrap();
        assert!(svg.contains("<polyline"));
        assert!(svg.contains("2024-03-01"));
        assert!(svg.contains("$15.00"));
    }

    #[test]
    fn histogram_counts_every_value() {
        let bars = histogram(&[1.0, 2.0, 10.0, 10.0, 5.5], 3);
        assert_eq!(bars.len(), 3);
        let total: f64 = bars.iter().map(|b| b.value).sum();
        assert_eq!(total, 5.0);
        assert_eq!(bars[2].value, 2.0);
    }

    #[test]
    fn histogram_of_identical_values() {
        let bars = histogram(&[4.0, 4.0], 10);
        assert_eq!(bars[0].value, 2.0);
        assert!(histogram(&[], 10).is_empty());
    }
}
