use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions, SqliteRow};
use sqlx::{Row, SqlitePool};
use std::str::FromStr;

use super::Storage;
use crate::config::DatabaseConfig;
use crate::models::{PriceObservation, Subscription, TrackedTarget};
use crate::utils::error::AppError;
use crate::Result;

const TARGET_COLUMNS: &str = "id, url, name, image_url, last_price, last_checked_at, created_at, updated_at";
const SUBSCRIPTION_COLUMNS: &str = "id, user_id, target_id, desired_price, notification_enabled, \
     last_notified_at, check_interval_minutes, created_at, updated_at";

/// SQLite-backed storage. Prices are stored as decimal text so no precision is lost.
#[derive(Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Open (creating if missing) the configured database and apply migrations.
    pub async fn connect(config: &DatabaseConfig) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(&config.url)?
            .create_if_missing(true)
            .foreign_keys(true);

        let in_memory = config.url.contains(":memory:") || config.url.contains("mode=memory");
        if !in_memory {
            let filename = options.clone().get_filename();
            if let Some(parent) = filename.parent().filter(|p| !p.as_os_str().is_empty()) {
                tokio::fs::create_dir_all(parent).await?;
            }
        }

        // Every connection to an in-memory database would get its own empty database
        let max_connections = if in_memory { 1 } else { config.max_connections };

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect_with(options)
            .await?;

        tracing::info!("Connected to database {}", config.url);
        Self::from_pool(pool).await
    }

    pub async fn from_pool(pool: SqlitePool) -> Result<Self> {
        let store = Self { pool };
        store.migrate().await?;
        Ok(store)
    }

    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }
}

fn parse_decimal(value: &str, column: &str) -> Result<Decimal> {
    Decimal::from_str(value).map_err(|e| AppError::Parse {
        message: format!("Invalid decimal '{}' in column {}: {}", value, column, e),
    })
}

fn target_from_row(row: &SqliteRow) -> Result<TrackedTarget> {
    let last_price: Option<String> = row.try_get("last_price")?;
    Ok(TrackedTarget {
        id: row.try_get("id")?,
        url: row.try_get("url")?,
        name: row.try_get("name")?,
        image_url: row.try_get("image_url")?,
        last_price: last_price.as_deref().map(|p| parse_decimal(p, "last_price")).transpose()?,
        last_checked_at: row.try_get::<Option<DateTime<Utc>>, _>("last_checked_at")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn subscription_from_row(row: &SqliteRow) -> Result<Subscription> {
    let desired_price: String = row.try_get("desired_price")?;
    Ok(Subscription {
        id: row.try_get("id")?,
        user_id: row.try_get("user_id")?,
        target_id: row.try_get("target_id")?,
        desired_price: parse_decimal(&desired_price, "desired_price")?,
        notification_enabled: row.try_get("notification_enabled")?,
        last_notified_at: row.try_get::<Option<DateTime<Utc>>, _>("last_notified_at")?,
        check_interval_minutes: row.try_get("check_interval_minutes")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn observation_from_row(row: &SqliteRow) -> Result<PriceObservation> {
    let price: String = row.try_get("price")?;
    Ok(PriceObservation {
        id: row.try_get("id")?,
        target_id: row.try_get("target_id")?,
        price: parse_decimal(&price, "price")?,
        observed_at: row.try_get("observed_at")?,
    })
}

#[async_trait]
impl Storage for SqliteStore {
    async fn list_targets(&self) -> Result<Vec<TrackedTarget>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM tracked_targets ORDER BY created_at, id",
            TARGET_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(target_from_row).collect()
    }

    async fn find_target(&self, id: &str) -> Result<Option<TrackedTarget>> {
        let row = sqlx::query(&format!("SELECT {} FROM tracked_targets WHERE id = ?", TARGET_COLUMNS))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(target_from_row).transpose()
    }

    async fn find_target_by_url(&self, url: &str) -> Result<Option<TrackedTarget>> {
        let row = sqlx::query(&format!("SELECT {} FROM tracked_targets WHERE url = ?", TARGET_COLUMNS))
            .bind(url)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(target_from_row).transpose()
    }

    async fn save_target(&self, target: &TrackedTarget) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO tracked_targets (id, url, name, image_url, last_price, last_checked_at, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                url = excluded.url,
                name = excluded.name,
                image_url = excluded.image_url,
                last_price = excluded.last_price,
                last_checked_at = excluded.last_checked_at,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(&target.id)
        .bind(&target.url)
        .bind(&target.name)
        .bind(&target.image_url)
        .bind(target.last_price.map(|p| p.to_string()))
        .bind(target.last_checked_at)
        .bind(target.created_at)
        .bind(target.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn list_subscriptions(&self, target_id: &str) -> Result<Vec<Subscription>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM subscriptions WHERE target_id = ? ORDER BY created_at, id",
            SUBSCRIPTION_COLUMNS
        ))
        .bind(target_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(subscription_from_row).collect()
    }

    async fn list_notifiable_subscriptions(&self, target_id: &str) -> Result<Vec<Subscription>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM subscriptions WHERE target_id = ? AND notification_enabled = 1 ORDER BY created_at, id",
            SUBSCRIPTION_COLUMNS
        ))
        .bind(target_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(subscription_from_row).collect()
    }

    async fn find_subscription(&self, user_id: &str, target_id: &str) -> Result<Option<Subscription>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM subscriptions WHERE user_id = ? AND target_id = ?",
            SUBSCRIPTION_COLUMNS
        ))
        .bind(user_id)
        .bind(target_id)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(subscription_from_row).transpose()
    }

    async fn get_subscription(&self, id: &str) -> Result<Option<Subscription>> {
        let row = sqlx::query(&format!("SELECT {} FROM subscriptions WHERE id = ?", SUBSCRIPTION_COLUMNS))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(subscription_from_row).transpose()
    }

    async fn list_user_subscriptions(&self, user_id: &str) -> Result<Vec<Subscription>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM subscriptions WHERE user_id = ? ORDER BY created_at, id",
            SUBSCRIPTION_COLUMNS
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(subscription_from_row).collect()
    }

    async fn save_subscription(&self, subscription: &Subscription) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO subscriptions (id, user_id, target_id, desired_price, notification_enabled,
                                       last_notified_at, check_interval_minutes, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                desired_price = excluded.desired_price,
                notification_enabled = excluded.notification_enabled,
                last_notified_at = excluded.last_notified_at,
                check_interval_minutes = excluded.check_interval_minutes,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(&subscription.id)
        .bind(&subscription.user_id)
        .bind(&subscription.target_id)
        .bind(subscription.desired_price.to_string())
        .bind(subscription.notification_enabled)
        .bind(subscription.last_notified_at)
        .bind(subscription.check_interval_minutes)
        .bind(subscription.created_at)
        .bind(subscription.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn delete_subscription(&self, id: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM subscriptions WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn append_observation(&self, observation: &PriceObservation) -> Result<()> {
        sqlx::query("INSERT INTO price_observations (id, target_id, price, observed_at) VALUES (?, ?, ?, ?)")
            .bind(&observation.id)
            .bind(&observation.target_id)
            .bind(observation.price.to_string())
            .bind(observation.observed_at)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn price_history(&self, target_id: &str) -> Result<Vec<PriceObservation>> {
        let rows = sqlx::query(
            "SELECT id, target_id, price, observed_at FROM price_observations \
             WHERE target_id = ? ORDER BY observed_at DESC, rowid DESC",
        )
        .bind(target_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(observation_from_row).collect()
    }
}
