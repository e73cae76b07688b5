use super::*;
use pricewatch::strategies::{Document, ExtractionStrategy};
use pricewatch::{PriceSource, ScrapeError, StrategyRegistry};
use std::str::FromStr;

fn d(s: &str) -> Decimal {
    Decimal::from_str(s).unwrap()
}

#[tokio::test]
async fn test_scrape_details_from_generic_page() -> anyhow::Result<()> {
    let server = MockServer::start().await;
    serve_product(&server, product_page("Steel Kettle", "$1,249.50")).await;

    let scraper = ScrapeOrchestrator::new(get_test_config().scraper)?;
    let details = scraper.scrape_details(&product_url(&server)).await?;

    assert_eq!(details.name.as_deref(), Some("Steel Kettle"));
    assert_eq!(details.price, Some(d("1249.50")));
    assert_eq!(
        details.image_url,
        Some(format!("{}/media/product.jpg", server.uri()))
    );
    Ok(())
}

#[tokio::test]
async fn test_scrape_price_through_price_source() -> anyhow::Result<()> {
    let server = MockServer::start().await;
    serve_product(&server, product_page("Kettle", "£89.00")).await;

    let source: Arc<dyn PriceSource> = Arc::new(ScrapeOrchestrator::new(get_test_config().scraper)?);
    let price = source.scrape_price(&product_url(&server)).await?;

    assert_eq!(price, Some(d("89.00")));
    Ok(())
}

#[tokio::test]
async fn test_failures_are_absent_values() -> anyhow::Result<()> {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/gone"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/captcha"))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            "<html><head><title>Robot Check</title></head><body><p>Type the characters you see</p></body></html>",
        ))
        .mount(&server)
        .await;

    let scraper = ScrapeOrchestrator::new(get_test_config().scraper)?;

    assert_eq!(scraper.scrape_price(&format!("{}/gone", server.uri())).await?, None);
    assert!(scraper.scrape_details(&format!("{}/gone", server.uri())).await?.is_empty());
    assert_eq!(scraper.scrape_price(&format!("{}/captcha", server.uri())).await?, None);
    Ok(())
}

#[tokio::test]
async fn test_malformed_url_is_an_error() -> anyhow::Result<()> {
    let scraper = ScrapeOrchestrator::new(get_test_config().scraper)?;

    let result = scraper.scrape_price("not a url").await;
    assert!(matches!(result, Err(ScrapeError::MalformedInput(_))));
    Ok(())
}

struct LocalShopStrategy;

impl ExtractionStrategy for LocalShopStrategy {
    fn name(&self) -> &str {
        "local-shop"
    }

    fn can_handle(&self, url: &str) -> bool {
        url.contains("127.0.0.1")
    }

    fn find_price(&self, doc: &Document) -> Option<Decimal> {
        let selector = scraper::Selector::parse("[data-sale-price]").unwrap();
        doc.select_first(&selector)
            .and_then(|el| el.value().attr("data-sale-price"))
            .and_then(|raw| Decimal::from_str(raw).ok())
    }

    fn find_name(&self, _doc: &Document) -> Option<String> {
        Some("Local Shop Item".to_string())
    }

    fn find_image(&self, _doc: &Document) -> Option<String> {
        None
    }
}

#[tokio::test]
async fn test_registered_strategy_takes_precedence() -> anyhow::Result<()> {
    let server = MockServer::start().await;
    serve_product(
        &server,
        r#"<html><body><span class="price">$99.00</span><b data-sale-price="79.25"></b></body></html>"#.to_string(),
    )
    .await;

    let registry = StrategyRegistry::with_defaults().register(Box::new(LocalShopStrategy));
    assert_eq!(registry.list_strategy_names(), vec!["amazon".to_string(), "local-shop".to_string()]);

    let scraper = ScrapeOrchestrator::with_registry(get_test_config().scraper, Arc::new(registry))?;
    let details = scraper.scrape_details(&product_url(&server)).await?;

    assert_eq!(details.price, Some(d("79.25")));
    assert_eq!(details.name.as_deref(), Some("Local Shop Item"));

    // Without the custom strategy the generic fallback reads the visible price
    let plain = ScrapeOrchestrator::new(get_test_config().scraper)?;
    assert_eq!(plain.scrape_price(&product_url(&server)).await?, Some(d("99.00")));
    Ok(())
}
