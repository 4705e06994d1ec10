use mockito::{Matcher, Server};
use shopscrape::{ListingCrawler, ProductStore, ScraperConfig};

const PAGE_ONE: &str = r#"
<html><body>
  <div class="product-card">
    <a href="/p/1"><img data-src="one.jpg"></a>
    <h2 class="product-name">Walnut Cutting Board</h2>
    <span class="price">$1,299.99</span>
    <span class="rating">8.0</span>
    <p class="summary">End grain, oiled.</p>
  </div>
  <div class="product-card">
    <h2>Bamboo Spoon Set</h2>
    <span class="price">Contact us for price</span>
    <span class="rating">n/a</span>
  </div>
  <div class="product-card"><span class="price">$4</span></div>
</body></html>
"#;

const PAGE_TWO: &str = r#"
<html><body>
  <div class="product-card"><h3>Cast Iron Pan</h3><span class="price">$45</span><span class="rating">4.5</span></div>
</body></html>
"#;

#[test]
fn crawl_store_and_search() {
    let mut server = Server::new();
    let first = server.mock("GET", "/kitchen").with_body(PAGE_ONE).expect(1).create();
    let second = server
        .mock("GET", "/kitchen")
        .match_query(Matcher::UrlEncoded("page".into(), "2".into()))
        .with_body(PAGE_TWO)
        .expect(1)
        .create();

    let crawler = ListingCrawler::new(ScraperConfig::builder().no_delay().build()).unwrap();
    let products = crawler
        .crawl(&format!("{}/kitchen", server.url()), 2)
        .unwrap();
    first.assert();
    second.assert();

    let titles: Vec<&str> = products.iter().map(|p| p.title.as_str()).collect();
    assert_eq!(
        titles,
        vec!["Walnut Cutting Board", "Bamboo Spoon Set", "Cast Iron Pan"]
    );

    let board = &products[0];
    assert_eq!(board.price, Some(1299.99));
    assert_eq!(board.rating, Some(4.0));
    assert_eq!(board.description, "End grain, oiled.");
    assert_eq!(board.url.as_deref(), Some("/p/1"));
    assert_eq!(board.image_url.as_deref(), Some("one.jpg"));

    let spoons = &products[1];
    assert_eq!(spoons.price, None);
    assert_eq!(spoons.rating, None);

    let mut store = ProductStore::in_memory().unwrap();
    let ids = store
        .save_products(&products, "kitchen.test", Some("kitchen"))
        .unwrap();
    assert_eq!(ids, vec![1, 2, 3]);

    let found = store.search("pan", 10).unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].title, "Cast Iron Pan");

    let stats = store.price_stats(Some("kitchen")).unwrap();
    assert_eq!(stats.len(), 1);
    assert_eq!(stats[0].count, 3);
    assert_eq!(stats[0].min_price, Some(45.0));
    assert_eq!(stats[0].max_price, Some(1299.99));
}
