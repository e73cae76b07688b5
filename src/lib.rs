pub mod config;
pub mod fetcher;
pub mod models;
pub mod notify;
pub mod orchestrator;
pub mod scheduler;
pub mod storage;
pub mod strategies;
pub mod tracking;
pub mod utils;

// Re-export commonly used types
pub use config::AppConfig;
pub use fetcher::{DocumentFetcher, FetchedPage};
pub use notify::{LogNotifier, NotificationSink, PriceAlert};
pub use orchestrator::{PriceSource, ScrapeOrchestrator};
pub use scheduler::{PriceCheckScheduler, SchedulerService, SchedulerSettings, TickReport};
pub use storage::{MemoryStore, SqliteStore, Storage};
pub use strategies::{parse_price, ExtractionResult, ExtractionStrategy, StrategyRegistry};
pub use tracking::{TrackRequest, TrackedProduct, TrackingService, UserProduct};
pub use utils::error::{AppError, ScrapeError};

pub type Result<T> = std::result::Result<T, AppError>;
