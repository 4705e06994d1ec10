use tantivy::schema::*;

/// Fields of the product index.
///
/// Title, description and category are tokenized for free-text search;
/// everything needed to rebuild a record is stored.
#[derive(Debug, Clone, Copy)]
pub struct ProductSchema {
    pub id: Field,
    pub title: Field,
    pub description: Field,
    pub category: Field,
    pub category_exact: Field,
    pub source_site: Field,
    pub price: Field,
    pub rating: Field,
    pub url: Field,
    pub image_url: Field,
    pub captured_at: Field,
    pub extra: Field,
}

impl ProductSchema {
    pub fn build() -> (Schema, Self) {
        let mut builder = Schema::builder();

        let id = builder.add_u64_field("id", INDEXED | STORED | FAST);

        let title = builder.add_text_field("title", TEXT | STORED);
        let description = builder.add_text_field("description", TEXT | STORED);
        let category = builder.add_text_field("category", TEXT | STORED);

        // Untokenized copy for exact category filtering.
        let category_exact = builder.add_text_field("category_exact", STRING);
        let source_site = builder.add_text_field("source_site", STRING | STORED);

        let price = builder.add_f64_field("price", STORED);
        let rating = builder.add_f64_field("rating", STORED);
        let url = builder.add_text_field("url", STORED);
        let image_url = builder.add_text_field("image_url", STORED);

        // Milliseconds since the Unix epoch.
        let captured_at = builder.add_i64_field("captured_at", STORED);

        // Producer-specific payload as a JSON string; never searched.
        let extra = builder.add_text_field("extra", STORED);

        let schema = builder.build();
        let fields = Self {
            id,
            title,
            description,
            category,
            category_exact,
            source_site,
            price,
            rating,
            url,
            image_url,
            captured_at,
            extra,
        };

        (schema, fields)
    }
}
