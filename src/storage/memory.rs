use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use super::Storage;
use crate::models::{PriceObservation, Subscription, TrackedTarget};
use crate::utils::error::AppError;
use crate::Result;

/// Process-local storage, used by tests and one-off CLI runs.
#[derive(Clone, Default)]
pub struct MemoryStore {
    targets: Arc<RwLock<HashMap<String, TrackedTarget>>>,
    subscriptions: Arc<RwLock<HashMap<String, Subscription>>>,
    observations: Arc<RwLock<Vec<PriceObservation>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Storage for MemoryStore {
    async fn list_targets(&self) -> Result<Vec<TrackedTarget>> {
        let targets = self.targets.read().await;
        let mut list: Vec<TrackedTarget> = targets.values().cloned().collect();
        list.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        Ok(list)
    }

    async fn find_target(&self, id: &str) -> Result<Option<TrackedTarget>> {
        Ok(self.targets.read().await.get(id).cloned())
    }

    async fn find_target_by_url(&self, url: &str) -> Result<Option<TrackedTarget>> {
        let targets = self.targets.read().await;
        Ok(targets.values().find(|t| t.url == url).cloned())
    }

    async fn save_target(&self, target: &TrackedTarget) -> Result<()> {
        let mut targets = self.targets.write().await;
        if targets.values().any(|t| t.url == target.url && t.id != target.id) {
            return Err(AppError::Validation(format!("A target for {} already exists", target.url)));
        }
        targets.insert(target.id.clone(), target.clone());
        Ok(())
    }

    async fn list_subscriptions(&self, target_id: &str) -> Result<Vec<Subscription>> {
        let subscriptions = self.subscriptions.read().await;
        let mut list: Vec<Subscription> = subscriptions
            .values()
            .filter(|s| s.target_id == target_id)
            .cloned()
            .collect();
        list.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        Ok(list)
    }

    async fn list_notifiable_subscriptions(&self, target_id: &str) -> Result<Vec<Subscription>> {
        let mut list = self.list_subscriptions(target_id).await?;
        list.retain(|s| s.notification_enabled);
        Ok(list)
    }

    async fn find_subscription(&self, user_id: &str, target_id: &str) -> Result<Option<Subscription>> {
        let subscriptions = self.subscriptions.read().await;
        Ok(subscriptions
            .values()
            .find(|s| s.user_id == user_id && s.target_id == target_id)
            .cloned())
    }

    async fn get_subscription(&self, id: &str) -> Result<Option<Subscription>> {
        Ok(self.subscriptions.read().await.get(id).cloned())
    }

    async fn list_user_subscriptions(&self, user_id: &str) -> Result<Vec<Subscription>> {
        let subscriptions = self.subscriptions.read().await;
        let mut list: Vec<Subscription> = subscriptions
            .values()
            .filter(|s| s.user_id == user_id)
            .cloned()
            .collect();
        list.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        Ok(list)
    }

    async fn save_subscription(&self, subscription: &Subscription) -> Result<()> {
        let mut subscriptions = self.subscriptions.write().await;
        let duplicate = subscriptions.values().any(|s| {
            s.user_id == subscription.user_id && s.target_id == subscription.target_id && s.id != subscription.id
        });
        if duplicate {
            return Err(AppError::Validation(format!(
                "User {} already has a subscription for target {}",
                subscription.user_id, subscription.target_id
            )));
        }
        subscriptions.insert(subscription.id.clone(), subscription.clone());
        Ok(())
    }

    async fn delete_subscription(&self, id: &str) -> Result<bool> {
        Ok(self.subscriptions.write().await.remove(id).is_some())
    }

    async fn append_observation(&self, observation: &PriceObservation) -> Result<()> {
        self.observations.write().await.push(observation.clone());
        Ok(())
    }

    async fn price_history(&self, target_id: &str) -> Result<Vec<PriceObservation>> {
        let observations = self.observations.read().await;
        // Reverse insertion order keeps same-timestamp entries newest first
        let mut history: Vec<PriceObservation> = observations
            .iter()
            .rev()
            .filter(|o| o.target_id == target_id)
            .cloned()
            .collect();
        history.sort_by(|a, b| b.observed_at.cmp(&a.observed_at));
        Ok(history)
    }
}
