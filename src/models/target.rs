use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use crate::models::generate_id;

/// Name given to a target when the first details scrape could not find one.
pub const UNKNOWN_PRODUCT_NAME: &str = "Unknown Product";

/// A product URL under price observation, shared by every user tracking it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TrackedTarget {
    pub id: String,
    pub url: String,
    pub name: String,
    pub image_url: Option<String>,

    // Price state, owned by the scheduler
    pub last_price: Option<Decimal>,
    pub last_checked_at: Option<DateTime<Utc>>,

    // Metadata
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewTarget {
    pub url: String,
    pub name: Option<String>,
    pub image_url: Option<String>,
    pub initial_price: Option<Decimal>,
}

impl TrackedTarget {
    pub fn new(new_target: NewTarget) -> Self {
        let now = Utc::now();
        Self {
            id: generate_id(),
            url: new_target.url,
            name: new_target
                .name
                .filter(|n| !n.trim().is_empty())
                .unwrap_or_else(|| UNKNOWN_PRODUCT_NAME.to_string()),
            image_url: new_target.image_url,
            last_price: new_target.initial_price,
            last_checked_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// True when `interval_minutes` have passed since the last successful check.
    /// A target that was never checked is always due.
    pub fn is_due(&self, now: DateTime<Utc>, interval_minutes: u32) -> bool {
        match self.last_checked_at {
            Some(last) => now.signed_duration_since(last) >= chrono::Duration::minutes(interval_minutes as i64),
            None => true,
        }
    }

    /// Whether `price` differs from the stored one. An unknown stored price always differs.
    pub fn price_differs(&self, price: Decimal) -> bool {
        self.last_price != Some(price)
    }

    /// Whether `price` is strictly below a known stored price.
    pub fn is_price_drop(&self, price: Decimal) -> bool {
        matches!(self.last_price, Some(old) if price < old)
    }

    pub fn record_check(&mut self, now: DateTime<Utc>) {
        self.last_checked_at = Some(now);
        self.updated_at = now;
    }

    pub fn record_price(&mut self, price: Decimal, now: DateTime<Utc>) {
        self.last_price = Some(price);
        self.updated_at = now;
    }
}
