use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::fetcher::validate_url;
use crate::models::{
    NewSubscription, NewTarget, PriceObservation, Subscription, TrackedTarget, UpdateSubscription,
    DEFAULT_CHECK_INTERVAL_MINUTES,
};
use crate::orchestrator::ScrapeOrchestrator;
use crate::storage::Storage;
use crate::utils::error::AppError;
use crate::Result;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackRequest {
    pub user_id: String,
    pub url: String,
    pub desired_price: Decimal,
    pub check_interval_minutes: Option<u32>,
    pub notification_enabled: Option<bool>,
}

/// What a successful tracking request produced.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackedProduct {
    pub target: TrackedTarget,
    pub subscription: Subscription,
    /// True when this request created the target rather than joining an existing one.
    pub created_target: bool,
}

/// A subscription together with the target it watches.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserProduct {
    pub subscription: Subscription,
    pub target: TrackedTarget,
}

/// User-facing operations over targets and subscriptions.
pub struct TrackingService {
    storage: Arc<dyn Storage>,
    scraper: Arc<ScrapeOrchestrator>,
    default_interval_minutes: u32,
}

impl TrackingService {
    pub fn new(storage: Arc<dyn Storage>, scraper: Arc<ScrapeOrchestrator>) -> Self {
        Self {
            storage,
            scraper,
            default_interval_minutes: DEFAULT_CHECK_INTERVAL_MINUTES,
        }
    }

    pub fn with_default_interval(mut self, minutes: u32) -> Self {
        self.default_interval_minutes = minutes;
        self
    }

    /// Find or create the target for `request.url` and subscribe the user to it.
    pub async fn track_product(&self, request: TrackRequest) -> Result<TrackedProduct> {
        if request.desired_price <= Decimal::ZERO {
            return Err(AppError::Validation("Desired price must be positive".to_string()));
        }
        let url = canonical_url(&request.url)?;

        let (target, created_target) = match self.storage.find_target_by_url(&url).await? {
            Some(target) => (target, false),
            None => (self.create_target(&url).await?, true),
        };

        if self
            .storage
            .find_subscription(&request.user_id, &target.id)
            .await?
            .is_some()
        {
            return Err(AppError::AlreadyTracked {
                user_id: request.user_id,
                url,
            });
        }

        let subscription = Subscription::new(NewSubscription {
            user_id: request.user_id,
            target_id: target.id.clone(),
            desired_price: request.desired_price,
            notification_enabled: request.notification_enabled,
            check_interval_minutes: Some(
                request
                    .check_interval_minutes
                    .unwrap_or(self.default_interval_minutes),
            ),
        });
        self.storage.save_subscription(&subscription).await?;

        tracing::info!(
            "User {} now tracks {} (desired {}, every {} min)",
            subscription.user_id,
            target.url,
            subscription.desired_price,
            subscription.check_interval_minutes
        );

        Ok(TrackedProduct {
            target,
            subscription,
            created_target,
        })
    }

    async fn create_target(&self, url: &str) -> Result<TrackedTarget> {
        let details = self.scraper.scrape_details(url).await?;
        if details.is_empty() {
            tracing::warn!("Tracking {} without any product details", url);
        }

        let target = TrackedTarget::new(NewTarget {
            url: url.to_string(),
            name: details.name,
            image_url: details.image_url,
            initial_price: details.price,
        });
        self.storage.save_target(&target).await?;

        if let Some(price) = target.last_price {
            self.storage
                .append_observation(&PriceObservation::new(target.id.clone(), price, target.created_at))
                .await?;
        }

        tracing::info!("Created tracked target {} for {}", target.id, target.url);
        Ok(target)
    }

    pub async fn get_target_by_url(&self, url: &str) -> Result<TrackedTarget> {
        let url = canonical_url(url)?;
        self.storage
            .find_target_by_url(&url)
            .await?
            .ok_or_else(|| AppError::NotFound {
                resource: format!("target for {}", url),
            })
    }

    /// Observed prices for a tracked URL, newest first.
    pub async fn price_history(&self, url: &str) -> Result<Vec<PriceObservation>> {
        let target = self.get_target_by_url(url).await?;
        self.storage.price_history(&target.id).await
    }

    /// Everything the user tracks, oldest subscription first.
    pub async fn list_for_user(&self, user_id: &str) -> Result<Vec<UserProduct>> {
        let subscriptions = self.storage.list_user_subscriptions(user_id).await?;
        let mut products = Vec::with_capacity(subscriptions.len());
        for subscription in subscriptions {
            let target = self.get_target(&subscription.target_id).await?;
            products.push(UserProduct { subscription, target });
        }
        Ok(products)
    }

    /// One of the user's subscriptions. Another user's subscription is reported as not found.
    pub async fn get_for_user(&self, user_id: &str, subscription_id: &str) -> Result<UserProduct> {
        let subscription = self.get_subscription(subscription_id).await?;
        if subscription.user_id != user_id {
            return Err(AppError::NotFound {
                resource: format!("subscription {}", subscription_id),
            });
        }
        let target = self.get_target(&subscription.target_id).await?;
        Ok(UserProduct { subscription, target })
    }

    async fn get_target(&self, id: &str) -> Result<TrackedTarget> {
        self.storage
            .find_target(id)
            .await?
            .ok_or_else(|| AppError::NotFound {
                resource: format!("target {}", id),
            })
    }

    pub async fn list_subscriptions(&self, target_id: &str) -> Result<Vec<Subscription>> {
        self.storage.list_subscriptions(target_id).await
    }

    pub async fn update_subscription(&self, id: &str, update: UpdateSubscription) -> Result<Subscription> {
        if update.desired_price.is_some_and(|price| price <= Decimal::ZERO) {
            return Err(AppError::Validation("Desired price must be positive".to_string()));
        }

        let mut subscription = self.get_subscription(id).await?;
        subscription.update(update);
        self.storage.save_subscription(&subscription).await?;
        Ok(subscription)
    }

    /// The target itself is kept, along with its history.
    pub async fn remove_subscription(&self, id: &str) -> Result<()> {
        if !self.storage.delete_subscription(id).await? {
            return Err(AppError::NotFound {
                resource: format!("subscription {}", id),
            });
        }
        tracing::info!("Removed subscription {}", id);
        Ok(())
    }

    async fn get_subscription(&self, id: &str) -> Result<Subscription> {
        self.storage
            .get_subscription(id)
            .await?
            .ok_or_else(|| AppError::NotFound {
                resource: format!("subscription {}", id),
            })
    }
}

fn canonical_url(input: &str) -> Result<String> {
    Ok(validate_url(input)?.to_string())
}
