use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use crate::models::{generate_id, DEFAULT_CHECK_INTERVAL_MINUTES, MIN_CHECK_INTERVAL_MINUTES};

/// One user's interest in a tracked target.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Subscription {
    pub id: String,
    pub user_id: String,
    pub target_id: String,

    // Notification rules
    pub desired_price: Decimal,
    pub notification_enabled: bool,
    pub last_notified_at: Option<DateTime<Utc>>,

    // Schedule
    pub check_interval_minutes: u32,

    // Metadata
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewSubscription {
    pub user_id: String,
    pub target_id: String,
    pub desired_price: Decimal,
    pub notification_enabled: Option<bool>,
    pub check_interval_minutes: Option<u32>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateSubscription {
    pub desired_price: Option<Decimal>,
    pub notification_enabled: Option<bool>,
    pub check_interval_minutes: Option<u32>,
}

impl Subscription {
    pub fn new(new_subscription: NewSubscription) -> Self {
        let now = Utc::now();
        Self {
            id: generate_id(),
            user_id: new_subscription.user_id,
            target_id: new_subscription.target_id,
            desired_price: new_subscription.desired_price,
            notification_enabled: new_subscription.notification_enabled.unwrap_or(true),
            last_notified_at: None,
            check_interval_minutes: floor_interval(
                new_subscription
                    .check_interval_minutes
                    .unwrap_or(DEFAULT_CHECK_INTERVAL_MINUTES),
            ),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn update(&mut self, update: UpdateSubscription) {
        if let Some(desired_price) = update.desired_price {
            self.desired_price = desired_price;
        }
        if let Some(enabled) = update.notification_enabled {
            self.notification_enabled = enabled;
        }
        if let Some(interval) = update.check_interval_minutes {
            self.check_interval_minutes = floor_interval(interval);
        }

        self.updated_at = Utc::now();
    }

    pub fn wants_price(&self, price: Decimal) -> bool {
        price <= self.desired_price
    }

    /// Cooldown gate: a subscription that was never notified is always eligible,
    /// otherwise strictly more than `cooldown` must have elapsed.
    pub fn cooldown_elapsed(&self, now: DateTime<Utc>, cooldown: Duration) -> bool {
        match self.last_notified_at {
            Some(last) => now.signed_duration_since(last) > cooldown,
            None => true,
        }
    }

    pub fn mark_notified(&mut self, now: DateTime<Utc>) {
        self.last_notified_at = Some(now);
        self.updated_at = now;
    }
}

fn floor_interval(minutes: u32) -> u32 {
    minutes.max(MIN_CHECK_INTERVAL_MINUTES)
}
