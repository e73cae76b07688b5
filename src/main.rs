use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use rust_decimal::Decimal;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use pricewatch::config::{AppConfig, LoggingConfig};
use pricewatch::{
    LogNotifier, PriceCheckScheduler, SchedulerService, SchedulerSettings, ScrapeOrchestrator, SqliteStore,
    Storage, TrackRequest, TrackingService,
};

#[derive(Parser, Debug)]
#[command(name = "pricewatch", version, about = "Tracks product prices and alerts on drops")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the price check scheduler until interrupted
    Run,
    /// Run a single price check tick and exit
    CheckOnce,
    /// Scrape a product page and print what was extracted
    Scrape { url: String },
    /// Subscribe a user to a product URL
    Track {
        #[arg(long)]
        user: String,
        #[arg(long)]
        url: String,
        #[arg(long)]
        desired_price: Decimal,
        /// Check interval in minutes
        #[arg(long)]
        interval: Option<u32>,
    },
    /// List the products a user tracks
    List {
        #[arg(long)]
        user: String,
    },
    /// Remove a subscription by id
    Untrack { subscription_id: String },
    /// Print the recorded price history of a tracked URL
    History { url: String },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let config = AppConfig::from_env().context("Failed to load configuration")?;
    let _log_guard = init_tracing(&config.logging)?;

    if config.metrics.enabled {
        let addr = SocketAddr::from(([0, 0, 0, 0], config.metrics.port));
        metrics_exporter_prometheus::PrometheusBuilder::new()
            .with_http_listener(addr)
            .install()
            .context("Failed to install Prometheus exporter")?;
        info!("Metrics exporter listening on {}", addr);
    }

    let scraper = Arc::new(ScrapeOrchestrator::new(config.scraper.clone())?);

    match cli.command {
        Command::Scrape { url } => {
            info!("Extracting with the {} strategy", scraper.registry().resolve(&url).name());
            let details = scraper.scrape_details(&url).await?;
            println!("{}", serde_json::to_string_pretty(&details)?);
        }
        Command::Track {
            user,
            url,
            desired_price,
            interval,
        } => {
            let tracking = tracking_service(&config, scraper).await?;
            let tracked = tracking
                .track_product(TrackRequest {
                    user_id: user,
                    url,
                    desired_price,
                    check_interval_minutes: interval,
                    notification_enabled: None,
                })
                .await?;
            println!("{}", serde_json::to_string_pretty(&tracked)?);
        }
        Command::List { user } => {
            let tracking = tracking_service(&config, scraper).await?;
            let products = tracking.list_for_user(&user).await?;
            println!("{}", serde_json::to_string_pretty(&products)?);
        }
        Command::Untrack { subscription_id } => {
            let tracking = tracking_service(&config, scraper).await?;
            tracking.remove_subscription(&subscription_id).await?;
            println!("Removed subscription {}", subscription_id);
        }
        Command::History { url } => {
            let tracking = tracking_service(&config, scraper).await?;
            for observation in tracking.price_history(&url).await? {
                println!("{}  {}", observation.observed_at.to_rfc3339(), observation.price);
            }
        }
        Command::CheckOnce => {
            let checker = price_checker(&config, scraper).await?;
            if let Some(report) = checker.run_tick(&CancellationToken::new()).await {
                println!("{}", serde_json::to_string_pretty(&report)?);
            }
        }
        Command::Run => {
            info!("Starting pricewatch scheduler...");
            let checker = Arc::new(price_checker(&config, scraper).await?);
            let mut service = SchedulerService::new(checker, &config.scheduler).await?;
            service.start().await?;

            tokio::signal::ctrl_c().await?;
            info!("Shutting down...");
            service.shutdown().await?;
        }
    }

    Ok(())
}

fn init_tracing(logging: &LoggingConfig) -> Result<Option<WorkerGuard>> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("pricewatch=info"));

    let (file_layer, guard) = match &logging.directory {
        Some(directory) => {
            let appender = tracing_appender::rolling::daily(directory, "pricewatch.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = tracing_subscriber::fmt::layer().with_writer(writer).with_ansi(false);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .with(file_layer)
        .try_init()
        .context("Failed to initialize tracing")?;

    Ok(guard)
}

async fn open_storage(config: &AppConfig) -> Result<Arc<dyn Storage>> {
    let store = SqliteStore::connect(&config.database).await?;
    Ok(Arc::new(store))
}

async fn tracking_service(config: &AppConfig, scraper: Arc<ScrapeOrchestrator>) -> Result<TrackingService> {
    let storage = open_storage(config).await?;
    Ok(TrackingService::new(storage, scraper).with_default_interval(config.scheduler.default_check_interval_minutes))
}

async fn price_checker(config: &AppConfig, scraper: Arc<ScrapeOrchestrator>) -> Result<PriceCheckScheduler> {
    let storage = open_storage(config).await?;
    Ok(PriceCheckScheduler::new(
        storage,
        scraper,
        Arc::new(LogNotifier::new()),
        SchedulerSettings::from_config(&config.scheduler, &config.scraper),
    ))
}
