use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::models::Subscription;
use crate::Result;

/// What a user is told when a tracked price reaches their threshold.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceAlert {
    pub subscription_id: String,
    pub user_id: String,
    pub target_id: String,
    pub desired_price: Decimal,
    pub current_price: Decimal,
}

impl PriceAlert {
    pub fn new(subscription: &Subscription, current_price: Decimal) -> Self {
        Self {
            subscription_id: subscription.id.clone(),
            user_id: subscription.user_id.clone(),
            target_id: subscription.target_id.clone(),
            desired_price: subscription.desired_price,
            current_price,
        }
    }

    pub fn message(&self) -> String {
        format!(
            "Price dropped to {} (your target: {}) for tracked product {}",
            self.current_price, self.desired_price, self.target_id
        )
    }
}

/// Outbound delivery of price alerts.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn send_price_alert(&self, subscription: &Subscription, current_price: Decimal) -> Result<()>;
}

/// Writes alerts to the log instead of delivering them.
#[derive(Debug, Default, Clone)]
pub struct LogNotifier;

impl LogNotifier {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl NotificationSink for LogNotifier {
    async fn send_price_alert(&self, subscription: &Subscription, current_price: Decimal) -> Result<()> {
        let alert = PriceAlert::new(subscription, current_price);
        tracing::info!(
            user_id = %alert.user_id,
            subscription_id = %alert.subscription_id,
            "{}",
            alert.message()
        );
        Ok(())
    }
}
