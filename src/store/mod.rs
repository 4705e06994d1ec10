//! Searchable product storage
//!
//! Records handed over by a crawl get a sequential id and land in a tantivy
//! index. Callers read them back by category, by free-text search, or as
//! per-site price and rating aggregates.

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tantivy::collector::DocSetCollector;
use tantivy::directory::MmapDirectory;
use tantivy::query::{AllQuery, Query, QueryParser, TermQuery};
use tantivy::schema::{IndexRecordOption, Value};
use tantivy::{DocAddress, Index, IndexReader, IndexWriter, ReloadPolicy, TantivyDocument, Term};
use tracing::{debug, info};

pub mod schema;

use self::schema::ProductSchema;
use crate::error::{Error, Result};
use crate::models::{DetailProduct, ListingProduct};

const WRITER_HEAP_BYTES: usize = 50_000_000;

/// A product as read back from the store.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StoredProduct {
    pub id: u64,
    pub title: String,
    pub price: Option<f64>,
    pub rating: Option<f64>,
    pub description: String,
    pub url: Option<String>,
    pub image_url: Option<String>,
    pub captured_at: Option<DateTime<Utc>>,
    pub source_site: String,
    pub category: Option<String>,
    /// Side payload saved alongside the record
    pub extra: Option<serde_json::Value>,
}

/// Price aggregate for one source site.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PriceStats {
    pub source_site: String,
    /// Records from this site, priced or not
    pub count: usize,
    pub avg_price: Option<f64>,
    pub min_price: Option<f64>,
    pub max_price: Option<f64>,
}

/// Rating aggregate for one source site, over rated records only.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RatingStats {
    pub source_site: String,
    pub count: usize,
    pub avg_rating: f64,
}

pub struct ProductStore {
    index: Index,
    reader: IndexReader,
    fields: ProductSchema,
    next_id: u64,
}

impl ProductStore {
    /// Open the index in `dir`, creating it if needed.
    pub fn open(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref();
        std::fs::create_dir_all(dir)?;

        let (schema, fields) = ProductSchema::build();
        let directory = MmapDirectory::open(dir)
            .map_err(|e| Error::Storage(format!("cannot open {}: {e}", dir.display())))?;
        let index = Index::open_or_create(directory, schema)?;

        info!(path = %dir.display(), "product index opened");
        Self::from_index(index, fields)
    }

    /// A store that lives only as long as the value.
    pub fn in_memory() -> Result<Self> {
        let (schema, fields) = ProductSchema::build();
        Self::from_index(Index::create_in_ram(schema), fields)
    }

    fn from_index(index: Index, fields: ProductSchema) -> Result<Self> {
        let reader: IndexReader = index
            .reader_builder()
            .reload_policy(ReloadPolicy::Manual)
            .try_into()?;

        let mut store = Self {
            index,
            reader,
            fields,
            next_id: 1,
        };
        store.next_id = store
            .load_all(&AllQuery)?
            .iter()
            .map(|product| product.id)
            .max()
            .map_or(1, |max| max + 1);
        Ok(store)
    }

    /// Number of stored records
    pub fn len(&self) -> u64 {
        self.reader.searcher().num_docs()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Store listing products and return their new ids, in input order.
    pub fn save_products(
        &mut self,
        products: &[ListingProduct],
        source_site: &str,
        category: Option<&str>,
    ) -> Result<Vec<u64>> {
        self.write(
            products.iter().map(|product| (product, None)),
            source_site,
            category,
        )
    }

    /// Store a product page; its specifications and images are kept as the
    /// record's side payload.
    pub fn save_detail(
        &mut self,
        product: &DetailProduct,
        source_site: &str,
        category: Option<&str>,
    ) -> Result<u64> {
        let extra = serde_json::json!({
            "specifications": product.specifications,
            "images": product.images,
        });
        let ids = self.write(
            std::iter::once((&product.listing, Some(extra.to_string()))),
            source_site,
            category,
        )?;
        ids.into_iter()
            .next()
            .ok_or_else(|| Error::Storage("detail record was not written".into()))
    }

    fn write<'a>(
        &mut self,
        records: impl Iterator<Item = (&'a ListingProduct, Option<String>)>,
        source_site: &str,
        category: Option<&str>,
    ) -> Result<Vec<u64>> {
        let mut writer: IndexWriter = self.index.writer_with_num_threads(1, WRITER_HEAP_BYTES)?;
        let mut ids = Vec::new();
        let mut next_id = self.next_id;

        for (product, extra) in records {
            writer.add_document(self.document(next_id, product, source_site, category, extra))?;
            ids.push(next_id);
            next_id += 1;
        }

        writer.commit()?;
        // Ids are only taken once the batch is durable.
        self.next_id = next_id;
        self.reader.reload()?;
        debug!(count = ids.len(), source_site, "products stored");
        Ok(ids)
    }

    fn document(
        &self,
        id: u64,
        product: &ListingProduct,
        source_site: &str,
        category: Option<&str>,
        extra: Option<String>,
    ) -> TantivyDocument {
        let f = &self.fields;
        let mut doc = TantivyDocument::default();

        doc.add_u64(f.id, id);
        doc.add_text(f.title, &product.title);
        doc.add_text(f.description, &product.description);
        doc.add_text(f.source_site, source_site);
        doc.add_i64(f.captured_at, product.captured_at.timestamp_millis());

        if let Some(category) = category {
            doc.add_text(f.category, category);
            doc.add_text(f.category_exact, category);
        }
        if let Some(price) = product.price {
            doc.add_f64(f.price, price);
        }
        if let Some(rating) = product.rating {
            doc.add_f64(f.rating, rating);
        }
        if let Some(url) = &product.url {
            doc.add_text(f.url, url);
        }
        if let Some(image_url) = &product.image_url {
            doc.add_text(f.image_url, image_url);
        }
        if let Some(extra) = extra {
            doc.add_text(f.extra, extra);
        }
        doc
    }

    /// Records in `category` (all records when `None`), newest first.
    pub fn products(&self, category: Option<&str>, limit: usize) -> Result<Vec<StoredProduct>> {
        let mut products = self.load_filtered(category)?;
        products.sort_by(|a, b| {
            b.captured_at
                .cmp(&a.captured_at)
                .then_with(|| b.id.cmp(&a.id))
        });
        products.truncate(limit);
        Ok(products)
    }

    /// Free-text search over title, description and category.
    ///
    /// Matches are ordered by rating (highest first) and then price (lowest
    /// first); records missing either value sort after those that have it.
    pub fn search(&self, query: &str, limit: usize) -> Result<Vec<StoredProduct>> {
        if query.trim().is_empty() {
            return Ok(Vec::new());
        }

        let f = &self.fields;
        let parser = QueryParser::for_index(&self.index, vec![f.title, f.description, f.category]);
        let query = parser.parse_query(query)?;

        let mut products = self.load_all(&*query)?;
        products.sort_by(|a, b| {
            desc_missing_last(a.rating, b.rating)
                .then_with(|| asc_missing_last(a.price, b.price))
                .then_with(|| a.id.cmp(&b.id))
        });
        products.truncate(limit);
        Ok(products)
    }

    /// Per-site record count and price spread.
    pub fn price_stats(&self, category: Option<&str>) -> Result<Vec<PriceStats>> {
        let mut by_site: BTreeMap<String, (usize, Vec<f64>)> = BTreeMap::new();
        for product in self.load_filtered(category)? {
            let entry = by_site.entry(product.source_site).or_default();
            entry.0 += 1;
            entry.1.extend(product.price);
        }

        Ok(by_site
            .into_iter()
            .map(|(source_site, (count, prices))| PriceStats {
                source_site,
                count,
                avg_price: mean(&prices),
                min_price: prices.iter().copied().reduce(f64::min),
                max_price: prices.iter().copied().reduce(f64::max),
            })
            .collect())
    }

    /// Per-site average rating; sites without any rated record are left out.
    pub fn rating_stats(&self, category: Option<&str>) -> Result<Vec<RatingStats>> {
        let mut by_site: BTreeMap<String, Vec<f64>> = BTreeMap::new();
        for product in self.load_filtered(category)? {
            if let Some(rating) = product.rating {
                by_site.entry(product.source_site).or_default().push(rating);
            }
        }

        Ok(by_site
            .into_iter()
            .filter_map(|(source_site, ratings)| {
                mean(&ratings).map(|avg_rating| RatingStats {
                    source_site,
                    count: ratings.len(),
                    avg_rating,
                })
            })
            .collect())
    }

    fn load_filtered(&self, category: Option<&str>) -> Result<Vec<StoredProduct>> {
        match category {
            Some(category) => {
                let term = Term::from_field_text(self.fields.category_exact, category);
                self.load_all(&TermQuery::new(term, IndexRecordOption::Basic))
            }
            None => self.load_all(&AllQuery),
        }
    }

    fn load_all(&self, query: &dyn Query) -> Result<Vec<StoredProduct>> {
        let searcher = self.reader.searcher();
        let mut addresses: Vec<DocAddress> = searcher
            .search(query, &DocSetCollector)?
            .into_iter()
            .collect();
        addresses.sort_by_key(|address| (address.segment_ord, address.doc_id));

        addresses
            .into_iter()
            .map(|address| {
                let doc: TantivyDocument = searcher.doc(address)?;
                self.read(&doc)
            })
            .collect()
    }

    fn read(&self, doc: &TantivyDocument) -> Result<StoredProduct> {
        let f = &self.fields;
        let text = |field| {
            doc.get_first(field)
                .and_then(|v| v.as_str())
                .map(str::to_string)
        };
        let number = |field| doc.get_first(field).and_then(|v| v.as_f64());

        let id = doc
            .get_first(f.id)
            .and_then(|v| v.as_u64())
            .ok_or_else(|| Error::Storage("stored product without id".into()))?;
        let extra = text(f.extra)
            .map(|raw| serde_json::from_str(&raw))
            .transpose()?;

        Ok(StoredProduct {
            id,
            title: text(f.title).unwrap_or_default(),
            price: number(f.price),
            rating: number(f.rating),
            description: text(f.description).unwrap_or_default(),
            url: text(f.url),
            image_url: text(f.image_url),
            captured_at: doc
                .get_first(f.captured_at)
                .and_then(|v| v.as_i64())
                .and_then(DateTime::<Utc>::from_timestamp_millis),
            source_site: text(f.source_site).unwrap_or_default(),
            category: text(f.category),
            extra,
        })
    }
}

fn mean(values: &[f64]) -> Option<f64> {
    (!values.is_empty()).then(|| values.iter().sum::<f64>() / values.len() as f64)
}

fn desc_missing_last(a: Option<f64>, b: Option<f64>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => b.total_cmp(&a),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

fn asc_missing_last(a: Option<f64>, b: Option<f64>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => a.total_cmp(&b),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use indexmap::IndexMap;

    fn product(title: &str, price: Option<f64>, rating: Option<f64>) -> ListingProduct {
        ListingProduct {
            title: title.to_string(),
            price,
            rating,
            description: format!("{title} for everyday use"),
            url: Some(format!("/p/{}", title.to_lowercase().replace(' ', "-"))),
            image_url: None,
            captured_at: Utc::now(),
        }
    }

    #[test]
    fn assigns_sequential_ids() {
        let mut store = ProductStore::in_memory().unwrap();
        let first = store
            .save_products(&[product("Red Mug", Some(8.0), None)], "a.test", None)
            .unwrap();
        let second = store
            .save_products(
                &[product("Blue Mug", None, None), product("Green Mug", None, None)],
                "a.test",
                None,
            )
            .unwrap();

        assert_eq!(first, vec![1]);
        assert_eq!(second, vec![2, 3]);
        assert_eq!(store.len(), 3);
    }

    #[test]
    fn failed_save_does_not_consume_ids() {
        let mut store = ProductStore::in_memory().unwrap();
        store
            .save_products(&[product("Red Mug", None, None)], "a.test", None)
            .unwrap();

        let held: IndexWriter = store
            .index
            .writer_with_num_threads(1, WRITER_HEAP_BYTES)
            .unwrap();
        assert!(
            store
                .save_products(&[product("Blue Mug", None, None)], "a.test", None)
                .is_err()
        );
        drop(held);

        let ids = store
            .save_products(&[product("Blue Mug", None, None)], "a.test", None)
            .unwrap();
        assert_eq!(ids, vec![2]);
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn filters_by_category_newest_first() {
        let mut store = ProductStore::in_memory().unwrap();
        let mut old = product("Old Kettle", Some(20.0), None);
        old.captured_at = Utc::now() - Duration::hours(2);
        let new = product("New Kettle", Some(25.0), None);
        store
            .save_products(&[old, new], "a.test", Some("kitchen"))
            .unwrap();
        store
            .save_products(&[product("Desk", Some(99.0), None)], "a.test", Some("office"))
            .unwrap();

        let kitchen = store.products(Some("kitchen"), 10).unwrap();
        let titles: Vec<&str> = kitchen.iter().map(|p| p.title.as_str()).collect();
        assert_eq!(titles, vec!["New Kettle", "Old Kettle"]);
        assert!(kitchen.iter().all(|p| p.category.as_deref() == Some("kitchen")));

        assert_eq!(store.products(None, 2).unwrap().len(), 2);
        assert!(store.products(Some("garden"), 10).unwrap().is_empty());
    }

    #[test]
    fn search_orders_by_rating_then_price() {
        let mut store = ProductStore::in_memory().unwrap();
        store
            .save_products(
                &[
                    product("Cheap Lamp", Some(10.0), Some(4.0)),
                    product("Fancy Lamp", Some(80.0), Some(4.8)),
                    product("Plain Lamp", Some(5.0), Some(4.0)),
                    product("Unrated Lamp", Some(1.0), None),
                    product("Sofa", Some(500.0), Some(5.0)),
                ],
                "a.test",
                Some("lighting"),
            )
            .unwrap();

        let results = store.search("lamp", 10).unwrap();
        let titles: Vec<&str> = results.iter().map(|p| p.title.as_str()).collect();
        assert_eq!(
            titles,
            vec!["Fancy Lamp", "Plain Lamp", "Cheap Lamp", "Unrated Lamp"]
        );
        assert_eq!(store.search("lamp", 1).unwrap().len(), 1);
        assert!(store.search("   ", 10).unwrap().is_empty());
    }

    #[test]
    fn search_covers_category_text() {
        let mut store = ProductStore::in_memory().unwrap();
        store
            .save_products(&[product("Hammer", None, None)], "a.test", Some("tools"))
            .unwrap();
        assert_eq!(store.search("tools", 10).unwrap().len(), 1);
    }

    #[test]
    fn malformed_query_is_query_error() {
        let store = ProductStore::in_memory().unwrap();
        assert!(matches!(store.search("nosuchfield:lamp", 10), Err(Error::Query(_))));
    }

    #[test]
    fn price_and_rating_stats_per_site() {
        let mut store = ProductStore::in_memory().unwrap();
        store
            .save_products(
                &[
                    product("A", Some(10.0), Some(4.0)),
                    product("B", Some(30.0), None),
                    product("C", None, Some(3.0)),
                ],
                "alpha.test",
                None,
            )
            .unwrap();
        store
            .save_products(&[product("D", None, None)], "beta.test", None)
            .unwrap();

        let prices = store.price_stats(None).unwrap();
        assert_eq!(
            prices,
            vec![
                PriceStats {
                    source_site: "alpha.test".into(),
                    count: 3,
                    avg_price: Some(20.0),
                    min_price: Some(10.0),
                    max_price: Some(30.0),
                },
                PriceStats {
                    source_site: "beta.test".into(),
                    count: 1,
                    avg_price: None,
                    min_price: None,
                    max_price: None,
                },
            ]
        );

        let ratings = store.rating_stats(None).unwrap();
        assert_eq!(
            ratings,
            vec![RatingStats {
                source_site: "alpha.test".into(),
                count: 2,
                avg_rating: 3.5,
            }]
        );
    }

    #[test]
    fn detail_side_payload_round_trips() {
        let mut store = ProductStore::in_memory().unwrap();
        let mut specifications = IndexMap::new();
        specifications.insert("Weight".to_string(), "250 g".to_string());
        let detail = DetailProduct {
            listing: product("Trail Runner", Some(89.5), Some(4.6)),
            specifications,
            images: vec!["side.jpg".into()],
        };

        let id = store.save_detail(&detail, "shoes.test", Some("running")).unwrap();
        let stored = store.products(None, 1).unwrap().remove(0);

        assert_eq!(stored.id, id);
        let extra = stored.extra.unwrap();
        assert_eq!(extra["specifications"]["Weight"], "250 g");
        assert_eq!(extra["images"][0], "side.jpg");
    }

    #[test]
    fn reopened_store_continues_ids() {
        let dir = tempfile::tempdir().unwrap();
        {
            let mut store = ProductStore::open(dir.path()).unwrap();
            store
                .save_products(&[product("First", None, None)], "a.test", None)
                .unwrap();
        }

        let mut store = ProductStore::open(dir.path()).unwrap();
        let ids = store
            .save_products(&[product("Second", None, None)], "a.test", None)
            .unwrap();
        assert_eq!(ids, vec![2]);
        assert_eq!(store.len(), 2);
    }
}
