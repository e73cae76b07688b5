use super::*;
use chrono::{Duration, Utc};
use pricewatch::{SchedulerService, TrackRequest};
use std::str::FromStr;
use tokio_util::sync::CancellationToken;

fn d(s: &str) -> Decimal {
    Decimal::from_str(s).unwrap()
}

async fn track(app: &TestApp, user: &str, url: &str, desired: &str) -> anyhow::Result<()> {
    app.tracking
        .track_product(TrackRequest {
            user_id: user.to_string(),
            url: url.to_string(),
            desired_price: d(desired),
            check_interval_minutes: Some(30),
            notification_enabled: None,
        })
        .await?;
    Ok(())
}

#[tokio::test]
async fn test_price_drop_lifecycle() -> anyhow::Result<()> {
    let app = create_test_app().await?;
    let server = MockServer::start().await;
    let url = product_url(&server);
    let cancel = CancellationToken::new();
    let start = Utc::now();

    serve_product(&server, product_page("Steel Kettle", "$100.00")).await;
    track(&app, "alice", &url, "90").await?;
    track(&app, "bob", &url, "70").await?;

    // Drop below alice's threshold only
    serve_product(&server, product_page("Steel Kettle", "$85.00")).await;
    let report = app.checker.run_tick_at(start + Duration::hours(1), &cancel).await.expect("tick ran");
    assert_eq!(report.checked, 1);
    assert_eq!(report.changed, 1);
    assert_eq!(report.notified, 1);

    let alerts = app.notifier.alerts();
    assert_eq!(alerts.len(), 1);
    assert_eq!(alerts[0].user_id, "alice");
    assert_eq!(alerts[0].current_price, d("85.00"));

    // Unchanged price: checked again, nothing recorded
    let report = app.checker.run_tick_at(start + Duration::hours(2), &cancel).await.expect("tick ran");
    assert_eq!((report.checked, report.changed, report.notified), (1, 0, 0));

    // Not due yet: interval is 30 minutes
    let report = app
        .checker
        .run_tick_at(start + Duration::hours(2) + Duration::minutes(10), &cancel)
        .await
        .expect("tick ran");
    assert_eq!((report.checked, report.skipped), (0, 1));

    // Further drop inside alice's cooldown; bob is still above threshold
    serve_product(&server, product_page("Steel Kettle", "$80.00")).await;
    let report = app.checker.run_tick_at(start + Duration::hours(3), &cancel).await.expect("tick ran");
    assert_eq!((report.changed, report.notified), (1, 0));

    // After the cooldown both thresholds are met
    serve_product(&server, product_page("Steel Kettle", "$65.00")).await;
    let report = app.checker.run_tick_at(start + Duration::hours(30), &cancel).await.expect("tick ran");
    assert_eq!(report.notified, 2);
    assert_eq!(app.notifier.alerts().len(), 3);

    let prices: Vec<Decimal> = app
        .tracking
        .price_history(&url)
        .await?
        .into_iter()
        .map(|o| o.price)
        .collect();
    assert_eq!(prices, vec![d("65.00"), d("80.00"), d("85.00"), d("100.00")]);

    let target = app.storage.find_target_by_url(&url).await?.expect("target");
    assert_eq!(target.last_price, Some(d("65.00")));
    assert_eq!(target.last_checked_at, Some(start + Duration::hours(30)));
    Ok(())
}

#[tokio::test]
async fn test_price_increase_is_recorded_without_alert() -> anyhow::Result<()> {
    let app = create_test_app().await?;
    let server = MockServer::start().await;
    let url = product_url(&server);

    serve_product(&server, product_page("Steel Kettle", "$50.00")).await;
    track(&app, "alice", &url, "90").await?;

    serve_product(&server, product_page("Steel Kettle", "$60.00")).await;
    let report = app
        .checker
        .run_tick_at(Utc::now() + Duration::hours(1), &CancellationToken::new())
        .await
        .expect("tick ran");

    assert_eq!((report.changed, report.notified), (1, 0));
    assert!(app.notifier.alerts().is_empty());
    assert_eq!(app.tracking.price_history(&url).await?.len(), 2);
    Ok(())
}

#[tokio::test]
async fn test_unreachable_target_leaves_state_untouched() -> anyhow::Result<()> {
    let app = create_test_app().await?;
    let server = MockServer::start().await;
    let url = product_url(&server);

    serve_product(&server, product_page("Steel Kettle", "$50.00")).await;
    track(&app, "alice", &url, "90").await?;
    let before = app.storage.find_target_by_url(&url).await?.expect("target");

    server.reset().await;
    let report = app
        .checker
        .run_tick_at(Utc::now() + Duration::hours(1), &CancellationToken::new())
        .await
        .expect("tick ran");

    assert_eq!((report.checked, report.failed), (0, 1));
    let after = app.storage.find_target_by_url(&url).await?.expect("target");
    assert_eq!(after, before);
    Ok(())
}

#[tokio::test]
async fn test_scheduler_service_runs_first_tick_on_start() -> anyhow::Result<()> {
    let app = create_test_app().await?;
    let server = MockServer::start().await;
    let url = product_url(&server);

    serve_product(&server, product_page("Steel Kettle", "$100.00")).await;
    track(&app, "alice", &url, "90").await?;
    serve_product(&server, product_page("Steel Kettle", "$85.00")).await;

    let checker = Arc::new(app.checker);
    let mut service = SchedulerService::new(checker, &get_test_config().scheduler).await?;
    service.start().await?;

    let notifier = Arc::clone(&app.notifier);
    let mut delivered = false;
    for _ in 0..50 {
        if !notifier.alerts().is_empty() {
            delivered = true;
            break;
        }
        tokio::time::sleep(std::time::Duration::from_millis(100)).await;
    }

    service.shutdown().await?;
    assert!(delivered, "first tick should alert without waiting a full period");
    Ok(())
}
