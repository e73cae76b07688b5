use thiserror::Error;

/// Failures of a single page fetch or extraction attempt.
///
/// "Nothing found" is not represented here: extraction reports it as `None`.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ScrapeError {
    #[error("Blocked by verification page: {url}")]
    Blocked { url: String },

    #[error("Request timed out: {url}")]
    Timeout { url: String },

    #[error("Unresolvable host: {url}")]
    UnresolvableHost { url: String },

    #[error("HTTP {status} for {url}")]
    HttpStatus { url: String, status: u16 },

    #[error("Malformed response from {url}: {message}")]
    MalformedResponse { url: String, message: String },

    #[error("Transport error for {url}: {message}")]
    Transport { url: String, message: String },

    /// Caller contract violation (e.g. a URL that cannot be fetched at all).
    #[error("Malformed input: {0}")]
    MalformedInput(String),
}

impl ScrapeError {
    /// Short label used for log fields and metric labels.
    pub fn kind(&self) -> &'static str {
        match self {
            ScrapeError::Blocked { .. } => "blocked",
            ScrapeError::Timeout { .. } => "timeout",
            ScrapeError::UnresolvableHost { .. } => "unresolvable_host",
            ScrapeError::HttpStatus { .. } => "http_status",
            ScrapeError::MalformedResponse { .. } => "malformed_response",
            ScrapeError::Transport { .. } => "transport",
            ScrapeError::MalformedInput(_) => "malformed_input",
        }
    }
}

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Scraping error: {0}")]
    Scrape(#[from] ScrapeError),

    #[error("Parsing error: {message}")]
    Parse { message: String },

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Not found: {resource}")]
    NotFound { resource: String },

    #[error("Already tracked: user {user_id} already tracks {url}")]
    AlreadyTracked { user_id: String, url: String },

    #[error("Notification error: {0}")]
    Notification(String),

    #[error("Scheduler error: {0}")]
    Scheduler(#[from] tokio_cron_scheduler::JobSchedulerError),

    #[error("Internal error: {0}")]
    Internal(String),
}

// Result type alias for convenience
pub type Result<T> = std::result::Result<T, AppError>;
