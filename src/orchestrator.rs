use async_trait::async_trait;
use rust_decimal::Decimal;
use std::sync::Arc;

use crate::config::ScraperConfig;
use crate::fetcher::{validate_url, DocumentFetcher, FetchedPage};
use crate::strategies::{Document, ExtractionResult, ExtractionStrategy, StrategyRegistry};
use crate::utils::error::{AppError, ScrapeError};

/// Anything that can report the current price for a product URL.
///
/// `Ok(None)` means no price could be read this time; only caller mistakes
/// such as malformed URLs are errors.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PriceSource: Send + Sync {
    async fn scrape_price(&self, url: &str) -> Result<Option<Decimal>, ScrapeError>;
}

/// Public scraping entry point: fetch, pick a strategy, extract.
pub struct ScrapeOrchestrator {
    fetcher: DocumentFetcher,
    registry: Arc<StrategyRegistry>,
}

impl ScrapeOrchestrator {
    pub fn new(config: ScraperConfig) -> Result<Self, AppError> {
        Self::with_registry(config, Arc::new(StrategyRegistry::with_defaults()))
    }

    pub fn with_registry(config: ScraperConfig, registry: Arc<StrategyRegistry>) -> Result<Self, AppError> {
        let fetcher = DocumentFetcher::new(config, registry.clone())?;
        Ok(Self { fetcher, registry })
    }

    pub fn registry(&self) -> &StrategyRegistry {
        &self.registry
    }

    pub async fn scrape_price(&self, url: &str) -> Result<Option<Decimal>, ScrapeError> {
        let Some(page) = self.fetch_page(url).await? else {
            return Ok(None);
        };

        let price = self.extract(&page, |strategy, doc| strategy.extract_price(doc));
        match price {
            Some(price) => tracing::debug!("Extracted price {} from {}", price, page.final_url),
            None => tracing::warn!("Could not extract a price from {}", page.final_url),
        }
        Ok(price)
    }

    /// Name, image and price in one pass. A page that yields nothing is
    /// `ExtractionResult::empty()`, not an error.
    pub async fn scrape_details(&self, url: &str) -> Result<ExtractionResult, ScrapeError> {
        let Some(page) = self.fetch_page(url).await? else {
            return Ok(ExtractionResult::empty());
        };

        let result = self.extract(&page, |strategy, doc| strategy.extract_all(doc));
        if result.is_empty() {
            tracing::warn!("No product details found at {}", page.final_url);
        }
        Ok(result)
    }

    /// Fetch failures are logged and absorbed; only malformed input surfaces.
    async fn fetch_page(&self, url: &str) -> Result<Option<FetchedPage>, ScrapeError> {
        validate_url(url)?;

        match self.fetcher.fetch(url).await {
            Ok(page) => Ok(Some(page)),
            Err(ScrapeError::MalformedInput(message)) => Err(ScrapeError::MalformedInput(message)),
            Err(e) => {
                metrics::counter!("pricewatch_scrape_failures_total", "kind" => e.kind()).increment(1);
                tracing::warn!("Failed to fetch {}: {}", url, e);
                Ok(None)
            }
        }
    }

    // Parsed HTML is !Send and must stay inside this synchronous call
    fn extract<T>(&self, page: &FetchedPage, f: impl FnOnce(&dyn ExtractionStrategy, &Document) -> T) -> T {
        let doc = page.document();
        let strategy = self.registry.resolve(&page.final_url);
        f(strategy, &doc)
    }
}

#[async_trait]
impl PriceSource for ScrapeOrchestrator {
    async fn scrape_price(&self, url: &str) -> Result<Option<Decimal>, ScrapeError> {
        ScrapeOrchestrator::scrape_price(self, url).await
    }
}
