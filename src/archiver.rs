use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::Local;
use serde::Serialize;

use crate::error::{Error, Result};
use crate::store::StoredProduct;

/// Write `value` as pretty-printed JSON to `path`.
pub fn save_to_file<T: Serialize + ?Sized>(value: &T, path: impl AsRef<Path>) -> Result<()> {
    let json = serde_json::to_string_pretty(value)?;
    let mut file = File::create(path)?;
    file.write_all(json.as_bytes())?;
    Ok(())
}

#[derive(Serialize)]
struct CsvRow<'a> {
    title: &'a str,
    price: Option<f64>,
    rating: Option<f64>,
    description: &'a str,
    source_site: &'a str,
    category: &'a str,
    url: &'a str,
    image_url: &'a str,
    date: String,
}

/// Export stored products to a CSV file inside `dir` and return its path.
///
/// Without an explicit `filename` the file is named
/// `product_data[_<category>]_<timestamp>.csv`.
pub fn export_csv(
    products: &[StoredProduct],
    dir: impl AsRef<Path>,
    filename: Option<&str>,
    category: Option<&str>,
) -> Result<PathBuf> {
    if products.is_empty() {
        return Err(Error::InvalidArgument("no data to export".into()));
    }

    let dir = dir.as_ref();
    fs::create_dir_all(dir)?;
    let path = dir.join(match filename {
        Some(name) => name.to_string(),
        None => default_filename(category),
    });

    let mut writer = csv::Writer::from_path(&path)?;
    for product in products {
        writer.serialize(CsvRow {
            title: &product.title,
            price: product.price,
            rating: product.rating,
            description: &product.description,
            source_site: &product.source_site,
            category: product.category.as_deref().unwrap_or_default(),
            url: product.url.as_deref().unwrap_or_default(),
            image_url: product.image_url.as_deref().unwrap_or_default(),
            date: product
                .captured_at
                .map(|at| at.to_rfc3339())
                .unwrap_or_default(),
        })?;
    }
    writer.flush()?;
    Ok(path)
}

fn default_filename(category: Option<&str>) -> String {
    let timestamp = Local::now().format("%Y%m%d_%H%M%S");
    match category {
        Some(category) => format!("product_data_{category}_{timestamp}.csv"),
        None => format!("product_data_{timestamp}.csv"),
    }
}
