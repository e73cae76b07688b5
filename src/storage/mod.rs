pub mod memory;
pub mod sqlite;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

use async_trait::async_trait;

use crate::models::{PriceObservation, Subscription, TrackedTarget};
use crate::Result;

/// Persistence for targets, subscriptions and price history.
#[async_trait]
pub trait Storage: Send + Sync {
    // Targets
    async fn list_targets(&self) -> Result<Vec<TrackedTarget>>;
    async fn find_target(&self, id: &str) -> Result<Option<TrackedTarget>>;
    async fn find_target_by_url(&self, url: &str) -> Result<Option<TrackedTarget>>;
    /// Insert or replace by id.
    async fn save_target(&self, target: &TrackedTarget) -> Result<()>;

    // Subscriptions
    async fn list_subscriptions(&self, target_id: &str) -> Result<Vec<Subscription>>;
    /// Subscriptions of the target with notifications enabled.
    async fn list_notifiable_subscriptions(&self, target_id: &str) -> Result<Vec<Subscription>>;
    async fn find_subscription(&self, user_id: &str, target_id: &str) -> Result<Option<Subscription>>;
    async fn get_subscription(&self, id: &str) -> Result<Option<Subscription>>;
    /// Every subscription the user holds, oldest first.
    async fn list_user_subscriptions(&self, user_id: &str) -> Result<Vec<Subscription>>;
    /// Insert or replace by id.
    async fn save_subscription(&self, subscription: &Subscription) -> Result<()>;
    /// Returns false when no subscription had that id.
    async fn delete_subscription(&self, id: &str) -> Result<bool>;

    // Price history
    async fn append_observation(&self, observation: &PriceObservation) -> Result<()>;
    /// Observations of the target, newest first.
    async fn price_history(&self, target_id: &str) -> Result<Vec<PriceObservation>>;
}
