use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_cron_scheduler::{Job, JobScheduler};
use tokio_util::sync::CancellationToken;

use crate::config::{SchedulerConfig, ScraperConfig};
use crate::models::{PriceObservation, Subscription, TrackedTarget};
use crate::notify::NotificationSink;
use crate::orchestrator::PriceSource;
use crate::storage::Storage;
use crate::Result;

/// Counters for one pass over the tracked targets.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TickReport {
    pub evaluated: usize,
    pub checked: usize,
    pub skipped: usize,
    pub changed: usize,
    pub notified: usize,
    pub failed: usize,
    pub cancelled: bool,
}

#[derive(Debug, Clone)]
pub struct SchedulerSettings {
    pub notification_cooldown: chrono::Duration,
    pub min_check_interval_minutes: u32,
    /// Pause between targets that were actually scraped
    pub inter_target_delay: Duration,
}

impl SchedulerSettings {
    pub fn from_config(scheduler: &SchedulerConfig, scraper: &ScraperConfig) -> Self {
        Self {
            notification_cooldown: scheduler.notification_cooldown(),
            min_check_interval_minutes: scheduler.min_check_interval_minutes,
            inter_target_delay: scraper.base_delay(),
        }
    }
}

enum TargetOutcome {
    Skipped,
    Unavailable,
    Checked { changed: bool, notified: usize },
}

/// The shortest interval any subscriber asked for, never below `floor`.
/// `None` when the target has no subscribers.
pub fn effective_interval(subscriptions: &[Subscription], floor: u32) -> Option<u32> {
    subscriptions
        .iter()
        .map(|s| s.check_interval_minutes)
        .min()
        .map(|minutes| minutes.max(floor))
}

/// Re-checks due targets, records price changes and alerts subscribers on drops.
pub struct PriceCheckScheduler {
    storage: Arc<dyn Storage>,
    source: Arc<dyn PriceSource>,
    notifier: Arc<dyn NotificationSink>,
    settings: SchedulerSettings,
    tick_lock: Mutex<()>,
}

impl PriceCheckScheduler {
    pub fn new(
        storage: Arc<dyn Storage>,
        source: Arc<dyn PriceSource>,
        notifier: Arc<dyn NotificationSink>,
        settings: SchedulerSettings,
    ) -> Self {
        Self {
            storage,
            source,
            notifier,
            settings,
            tick_lock: Mutex::new(()),
        }
    }

    pub async fn run_tick(&self, cancel: &CancellationToken) -> Option<TickReport> {
        self.run_tick_at(Utc::now(), cancel).await
    }

    /// Run one tick as of `now`. Returns `None` when another tick is still running.
    pub async fn run_tick_at(&self, now: DateTime<Utc>, cancel: &CancellationToken) -> Option<TickReport> {
        let Ok(_guard) = self.tick_lock.try_lock() else {
            tracing::warn!("Previous price check tick still running, skipping");
            return None;
        };

        metrics::counter!("pricewatch_ticks_total").increment(1);
        let mut report = TickReport::default();

        let targets = match self.storage.list_targets().await {
            Ok(targets) => targets,
            Err(e) => {
                tracing::error!("Failed to load tracked targets: {}", e);
                report.failed += 1;
                return Some(report);
            }
        };

        let total = targets.len();
        for (index, target) in targets.into_iter().enumerate() {
            if cancel.is_cancelled() {
                report.cancelled = true;
                break;
            }

            report.evaluated += 1;
            let target_id = target.id.clone();
            let scraped = match self.process_target(target, now).await {
                Ok(TargetOutcome::Skipped) => {
                    report.skipped += 1;
                    false
                }
                Ok(TargetOutcome::Unavailable) => {
                    report.failed += 1;
                    true
                }
                Ok(TargetOutcome::Checked { changed, notified }) => {
                    report.checked += 1;
                    report.changed += usize::from(changed);
                    report.notified += notified;
                    true
                }
                Err(e) => {
                    tracing::error!("Error checking target {}: {}", target_id, e);
                    report.failed += 1;
                    true
                }
            };

            let more_remaining = index + 1 < total;
            if scraped && more_remaining && !self.settings.inter_target_delay.is_zero() {
                tokio::select! {
                    _ = cancel.cancelled() => {
                        report.cancelled = true;
                        break;
                    }
                    _ = tokio::time::sleep(self.settings.inter_target_delay) => {}
                }
            }
        }

        tracing::info!(
            "Price check tick finished: {} evaluated, {} checked, {} skipped, {} changed, {} notified, {} failed{}",
            report.evaluated,
            report.checked,
            report.skipped,
            report.changed,
            report.notified,
            report.failed,
            if report.cancelled { " (cancelled)" } else { "" }
        );
        Some(report)
    }

    async fn process_target(&self, mut target: TrackedTarget, now: DateTime<Utc>) -> Result<TargetOutcome> {
        let subscriptions = self.storage.list_subscriptions(&target.id).await?;
        let Some(interval) = effective_interval(&subscriptions, self.settings.min_check_interval_minutes) else {
            tracing::debug!("Target {} has no subscribers, skipping", target.id);
            return Ok(TargetOutcome::Skipped);
        };

        if !target.is_due(now, interval) {
            tracing::debug!("Target {} not due yet (interval {} min)", target.id, interval);
            return Ok(TargetOutcome::Skipped);
        }

        metrics::counter!("pricewatch_targets_checked_total").increment(1);
        let Some(price) = self.source.scrape_price(&target.url).await? else {
            tracing::warn!("No price available for {} this tick", target.url);
            return Ok(TargetOutcome::Unavailable);
        };

        let previous = target.last_price;
        let changed = target.price_differs(price);
        let dropped = target.is_price_drop(price);

        target.record_check(now);
        if changed {
            target.record_price(price, now);
            self.storage
                .append_observation(&PriceObservation::new(target.id.clone(), price, now))
                .await?;
            metrics::counter!("pricewatch_price_changes_total").increment(1);
            match previous {
                Some(old) => tracing::info!("Price for {} changed from {} to {}", target.url, old, price),
                None => tracing::info!("First price for {}: {}", target.url, price),
            }
        }
        self.storage.save_target(&target).await?;

        let notified = if dropped {
            self.notify_subscribers(&target, price, now).await?
        } else {
            0
        };

        Ok(TargetOutcome::Checked { changed, notified })
    }

    async fn notify_subscribers(&self, target: &TrackedTarget, price: Decimal, now: DateTime<Utc>) -> Result<usize> {
        let mut sent = 0;
        for mut subscription in self.storage.list_notifiable_subscriptions(&target.id).await? {
            if !subscription.wants_price(price) {
                continue;
            }
            if !subscription.cooldown_elapsed(now, self.settings.notification_cooldown) {
                tracing::debug!("Subscription {} still cooling down", subscription.id);
                continue;
            }

            match self.notifier.send_price_alert(&subscription, price).await {
                Ok(()) => {
                    sent += 1;
                    metrics::counter!("pricewatch_alerts_sent_total").increment(1);
                }
                Err(e) => tracing::error!("Failed to send alert for subscription {}: {}", subscription.id, e),
            }

            // Recorded even when delivery failed
            subscription.mark_notified(now);
            self.storage.save_subscription(&subscription).await?;
        }
        Ok(sent)
    }
}

/// Drives [`PriceCheckScheduler`] ticks on a fixed period.
pub struct SchedulerService {
    scheduler: JobScheduler,
    checker: Arc<PriceCheckScheduler>,
    cancel: CancellationToken,
    period: Duration,
    first_tick: Option<JoinHandle<()>>,
}

impl SchedulerService {
    pub async fn new(checker: Arc<PriceCheckScheduler>, config: &SchedulerConfig) -> Result<Self> {
        let scheduler = JobScheduler::new().await?;

        Ok(Self {
            scheduler,
            checker,
            cancel: CancellationToken::new(),
            period: config.tick_period(),
            first_tick: None,
        })
    }

    pub async fn start(&mut self) -> Result<()> {
        let checker = Arc::clone(&self.checker);
        let cancel = self.cancel.clone();

        let job = Job::new_repeated_async(self.period, move |_uuid, _l| {
            let checker = Arc::clone(&checker);
            let cancel = cancel.clone();
            Box::pin(async move {
                if cancel.is_cancelled() {
                    return;
                }
                checker.run_tick(&cancel).await;
            })
        })?;
        self.scheduler.add(job).await?;
        self.scheduler.start().await?;

        // First tick right away instead of one period from now
        let checker = Arc::clone(&self.checker);
        let cancel = self.cancel.clone();
        self.first_tick = Some(tokio::spawn(async move {
            checker.run_tick(&cancel).await;
        }));

        tracing::info!("Price check scheduler started (tick every {:?})", self.period);
        Ok(())
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub async fn shutdown(&mut self) -> Result<()> {
        self.cancel.cancel();
        if let Some(handle) = self.first_tick.take() {
            if let Err(e) = handle.await {
                tracing::warn!("Initial price check tick did not finish cleanly: {}", e);
            }
        }
        self.scheduler.shutdown().await?;
        tracing::info!("Price check scheduler shutdown");
        Ok(())
    }
}
