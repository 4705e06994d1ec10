use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::{info, warn};
use url::Url;

use shopscrape::archiver;
use shopscrape::charts::{ChartCapability, ChartConfig, ChartRenderer};
use shopscrape::store::StoredProduct;
use shopscrape::{AppConfig, DetailExtractor, ListingCrawler, ProductStore, logging};

#[derive(Parser)]
#[command(name = "shopscrape", version, about = "Extract product listings from e-commerce pages")]
struct Cli {
    /// Index directory (overrides SHOPSCRAPE_INDEX_DIR)
    #[arg(long, global = true)]
    index_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Crawl a listing and store every product found
    Scrape {
        url: String,
        #[arg(long)]
        category: Option<String>,
        /// Source site label (defaults to the URL's host)
        #[arg(long)]
        site: Option<String>,
        #[arg(long, default_value_t = 1)]
        max_pages: usize,
    },
    /// Read one product page, print it and store it
    Detail {
        url: String,
        #[arg(long)]
        category: Option<String>,
        #[arg(long)]
        site: Option<String>,
    },
    /// List stored products, newest first
    List {
        #[arg(long)]
        category: Option<String>,
        #[arg(long, default_value_t = 100)]
        limit: usize,
    },
    /// Full-text search over stored products
    Search {
        query: String,
        #[arg(long, default_value_t = 20)]
        limit: usize,
    },
    /// Per-site price and rating statistics
    Stats {
        #[arg(long)]
        category: Option<String>,
    },
    /// Export stored products to CSV
    Export {
        #[arg(long)]
        category: Option<String>,
        #[arg(long)]
        file: Option<String>,
    },
    /// Render SVG charts from stored products
    Charts {
        #[arg(long)]
        category: Option<String>,
    },
}

fn main() -> Result<()> {
    logging::init();

    let cli = Cli::parse();
    let mut config = AppConfig::from_env().context("Failed to load configuration")?;
    if let Some(dir) = cli.index_dir {
        config.index_dir = dir;
    }
    let chart_config = ChartConfig {
        capability: ChartCapability::detect(),
        output_dir: config.chart_dir.clone(),
    };

    let mut store = ProductStore::open(&config.index_dir)
        .with_context(|| format!("Failed to open index at {}", config.index_dir.display()))?;

    match cli.command {
        Command::Scrape {
            url,
            category,
            site,
            max_pages,
        } => {
            let crawler = ListingCrawler::new(config.scraper_config())?;
            let report = crawler.crawl_with_report(&url, max_pages)?;

            if report.products.is_empty() {
                warn!("No products found. The site structure may not be supported.");
                return Ok(());
            }
            if report.ended_early() {
                warn!(
                    completed = report.pages_completed,
                    requested = report.pages_requested,
                    "Crawl stopped early; results are partial"
                );
            }

            let site = site_label(site, &url)?;
            let ids = store.save_products(&report.products, &site, category.as_deref())?;
            info!(count = ids.len(), site = %site, "Products saved");
            println!("Scraped and saved {} products from {}", ids.len(), site);
        }
        Command::Detail {
            url,
            category,
            site,
        } => {
            let extractor = DetailExtractor::new(&config.scraper_config())?;
            let product = extractor
                .extract_detail(&url)
                .with_context(|| format!("Failed to fetch product details from {url}"))?;

            println!("{}", serde_json::to_string_pretty(&product)?);
            let site = site_label(site, &url)?;
            store.save_detail(&product, &site, category.as_deref())?;
        }
        Command::List { category, limit } => {
            print_products(&store.products(category.as_deref(), limit)?);
        }
        Command::Search { query, limit } => {
            let results = store.search(&query, limit)?;
            if results.is_empty() {
                println!("No results found for '{query}'.");
            } else {
                print_products(&results);
            }
        }
        Command::Stats { category } => {
            let stats = serde_json::json!({
                "price": store.price_stats(category.as_deref())?,
                "rating": store.rating_stats(category.as_deref())?,
            });
            println!("{}", serde_json::to_string_pretty(&stats)?);
        }
        Command::Export { category, file } => {
            let products = store.products(category.as_deref(), usize::MAX)?;
            let path = archiver::export_csv(
                &products,
                &config.export_dir,
                file.as_deref(),
                category.as_deref(),
            )?;
            println!("Exported {} products to {}", products.len(), path.display());
        }
        Command::Charts { category } => {
            let renderer = ChartRenderer::new(chart_config);
            if !renderer.is_available() {
                println!("Charts are not available in this build.");
                return Ok(());
            }

            let category = category.as_deref();
            let products = store.products(category, usize::MAX)?;
            let written = [
                renderer.price_comparison(&store.price_stats(category)?)?,
                renderer.rating_comparison(&store.rating_stats(category)?)?,
                renderer.price_distribution(&products)?,
                renderer.price_vs_rating(&products)?,
                renderer.price_trends(&products)?,
            ];
            for path in written.into_iter().flatten() {
                println!("Wrote {}", path.display());
            }
        }
    }

    Ok(())
}

fn site_label(site: Option<String>, url: &str) -> Result<String> {
    if let Some(site) = site {
        return Ok(site);
    }
    let parsed = Url::parse(url).with_context(|| format!("Invalid URL: {url}"))?;
    Ok(parsed.host_str().unwrap_or("unknown").to_string())
}

fn print_products(products: &[StoredProduct]) {
    for product in products {
        let price = product
            .price
            .map(|p| format!("${p:.2}"))
            .unwrap_or_else(|| "-".into());
        let rating = product
            .rating
            .map(|r| format!("{r:.1}/5"))
            .unwrap_or_else(|| "-".into());
        println!(
            "[{}] {} | {} | {} | {}",
            product.id, product.title, price, rating, product.source_site
        );
    }
}
