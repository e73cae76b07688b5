// Integration tests for pricewatch
// These tests drive the public API against a local HTTP server and real storage

pub mod scheduler_tests;
pub mod scrape_tests;
pub mod tracking_tests;

use async_trait::async_trait;
pub use rust_decimal::Decimal;
use std::sync::{Arc, Mutex};
use wiremock::matchers::{method, path};
pub use wiremock::{Mock, MockServer, ResponseTemplate};

use pricewatch::config::{
    AppConfig, DatabaseConfig, LoggingConfig, MetricsConfig, SchedulerConfig, ScraperConfig,
};
use pricewatch::models::Subscription;
use pricewatch::{
    NotificationSink, PriceAlert, PriceCheckScheduler, SchedulerSettings, ScrapeOrchestrator, SqliteStore,
    Storage, TrackingService,
};

pub const PRODUCT_PATH: &str = "/p/steel-kettle";

/// Test configuration for integration tests
pub fn get_test_config() -> AppConfig {
    AppConfig {
        database: DatabaseConfig {
            url: "sqlite::memory:".to_string(),
            max_connections: 1,
        },
        scraper: ScraperConfig {
            base_delay_ms: 0,
            jitter_ms: 0,
            request_timeout: 5,
            max_redirects: 5,
            user_agents: vec!["PricewatchTest/1.0".to_string()],
            shortener_hosts: Vec::new(),
        },
        scheduler: SchedulerConfig {
            tick_period_ms: 60_000,
            notification_cooldown_hours: 24,
            min_check_interval_minutes: 5,
            default_check_interval_minutes: 60,
        },
        metrics: MetricsConfig {
            enabled: false,
            port: 9001,
        },
        logging: LoggingConfig::default(),
    }
}

pub fn product_page(name: &str, price: &str) -> String {
    format!(
        r#"<html><head><title>{name} | Example Shop</title>
        <meta property="og:image" content="/media/product.jpg"></head>
        <body>
          <nav>Free shipping over $50</nav>
          <h1 class="product-title">{name}</h1>
          <div class="product-price"><span class="price">{price}</span></div>
        </body></html>"#
    )
}

/// Serve `body` at [`PRODUCT_PATH`], replacing whatever was mounted before.
pub async fn serve_product(server: &MockServer, body: String) {
    server.reset().await;
    Mock::given(method("GET"))
        .and(path(PRODUCT_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_string(body))
        .mount(server)
        .await;
}

pub fn product_url(server: &MockServer) -> String {
    format!("{}{}", server.uri(), PRODUCT_PATH)
}

/// Create an in-memory database with migrations applied
pub async fn create_test_store() -> anyhow::Result<Arc<SqliteStore>> {
    let store = SqliteStore::connect(&get_test_config().database).await?;
    Ok(Arc::new(store))
}

/// Notification sink that keeps every alert for later assertions
#[derive(Default)]
pub struct RecordingNotifier {
    alerts: Mutex<Vec<PriceAlert>>,
}

impl RecordingNotifier {
    pub fn alerts(&self) -> Vec<PriceAlert> {
        self.alerts.lock().unwrap().clone()
    }
}

#[async_trait]
impl NotificationSink for RecordingNotifier {
    async fn send_price_alert(&self, subscription: &Subscription, current_price: Decimal) -> pricewatch::Result<()> {
        self.alerts
            .lock()
            .unwrap()
            .push(PriceAlert::new(subscription, current_price));
        Ok(())
    }
}

/// Everything a test needs to track products and run ticks against one store.
pub struct TestApp {
    pub storage: Arc<dyn Storage>,
    pub tracking: TrackingService,
    pub checker: PriceCheckScheduler,
    pub notifier: Arc<RecordingNotifier>,
}

pub async fn create_test_app() -> anyhow::Result<TestApp> {
    let config = get_test_config();
    let storage: Arc<dyn Storage> = create_test_store().await?;
    let scraper = Arc::new(ScrapeOrchestrator::new(config.scraper.clone())?);
    let notifier = Arc::new(RecordingNotifier::default());

    let tracking = TrackingService::new(Arc::clone(&storage), Arc::clone(&scraper));
    let checker = PriceCheckScheduler::new(
        Arc::clone(&storage),
        scraper,
        notifier.clone(),
        SchedulerSettings::from_config(&config.scheduler, &config.scraper),
    );

    Ok(TestApp {
        storage,
        tracking,
        checker,
        notifier,
    })
}
