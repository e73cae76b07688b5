use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::env;
use std::time::Duration;

use crate::models::{DEFAULT_CHECK_INTERVAL_MINUTES, MIN_CHECK_INTERVAL_MINUTES};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub scraper: ScraperConfig,
    pub scheduler: SchedulerConfig,
    pub metrics: MetricsConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScraperConfig {
    /// Fixed part of the pause before every request, also used between targets in a tick
    pub base_delay_ms: u64,
    /// Upper bound of the random extra pause added to `base_delay_ms`
    pub jitter_ms: u64,
    /// Request timeout in seconds
    pub request_timeout: u64,
    pub max_redirects: usize,
    #[serde(default = "default_user_agents")]
    pub user_agents: Vec<String>,
    #[serde(default = "default_shortener_hosts")]
    pub shortener_hosts: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    pub tick_period_ms: u64,
    pub notification_cooldown_hours: u64,
    pub min_check_interval_minutes: u32,
    pub default_check_interval_minutes: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsConfig {
    pub enabled: bool,
    pub port: u16,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Directory for daily rolling log files; stdout only when unset
    pub directory: Option<String>,
}

pub fn default_user_agents() -> Vec<String> {
    [
        "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36",
        "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/123.0.0.0 Safari/537.36 Edg/123.0.0.0",
        "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.4 Safari/605.1.15",
        "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:125.0) Gecko/20100101 Firefox/125.0",
        "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

pub fn default_shortener_hosts() -> Vec<String> {
    ["amzn.to", "amzn.in", "amzn.eu", "a.co", "bit.ly", "tinyurl.com", "fkrt.it"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

impl Default for ScraperConfig {
    fn default() -> Self {
        Self {
            base_delay_ms: 1000,
            jitter_ms: 1000,
            request_timeout: 15,
            max_redirects: 10,
            user_agents: default_user_agents(),
            shortener_hosts: default_shortener_hosts(),
        }
    }
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            tick_period_ms: 60_000,
            notification_cooldown_hours: 24,
            min_check_interval_minutes: MIN_CHECK_INTERVAL_MINUTES,
            default_check_interval_minutes: DEFAULT_CHECK_INTERVAL_MINUTES,
        }
    }
}

impl ScraperConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout)
    }

    pub fn base_delay(&self) -> Duration {
        Duration::from_millis(self.base_delay_ms)
    }
}

impl SchedulerConfig {
    pub fn tick_period(&self) -> Duration {
        Duration::from_millis(self.tick_period_ms)
    }

    pub fn notification_cooldown(&self) -> chrono::Duration {
        chrono::Duration::hours(self.notification_cooldown_hours as i64)
    }
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let s = Config::builder()
            // Start with default configuration
            .add_source(File::with_name("config/default"))
            // Add environment-specific config
            .add_source(File::with_name(&format!("config/{}", run_mode)).required(false))
            // Add local config (ignored by git)
            .add_source(File::with_name("config/local").required(false))
            // Add environment variables with prefix "PRICEWATCH_"
            .add_source(Environment::with_prefix("PRICEWATCH").separator("__"))
            .build()?;

        let config: AppConfig = s.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        // Validate database configuration
        if self.database.max_connections == 0 {
            return Err(ConfigError::Message("Database max_connections must be greater than 0".into()));
        }

        // Validate scraper configuration
        if self.scraper.request_timeout == 0 {
            return Err(ConfigError::Message("Scraper request_timeout must be greater than 0".into()));
        }

        if self.scraper.user_agents.is_empty() {
            return Err(ConfigError::Message("Scraper user_agents must not be empty".into()));
        }

        // Validate scheduler configuration
        if self.scheduler.tick_period_ms == 0 {
            return Err(ConfigError::Message("Scheduler tick_period_ms must be greater than 0".into()));
        }

        if self.scheduler.min_check_interval_minutes == 0 {
            return Err(ConfigError::Message("Scheduler min_check_interval_minutes must be greater than 0".into()));
        }

        if self.scheduler.default_check_interval_minutes < self.scheduler.min_check_interval_minutes {
            return Err(ConfigError::Message(
                "Scheduler default_check_interval_minutes cannot be below min_check_interval_minutes".into(),
            ));
        }

        // Validate metrics configuration
        if self.metrics.enabled && self.metrics.port == 0 {
            return Err(ConfigError::Message("Metrics port must be greater than 0".into()));
        }

        Ok(())
    }
}
