use super::*;
use pricewatch::models::{UpdateSubscription, MIN_CHECK_INTERVAL_MINUTES, UNKNOWN_PRODUCT_NAME};
use pricewatch::{AppError, TrackRequest};
use std::str::FromStr;

fn track(user: &str, url: &str, desired: &str, interval: Option<u32>) -> TrackRequest {
    TrackRequest {
        user_id: user.to_string(),
        url: url.to_string(),
        desired_price: Decimal::from_str(desired).unwrap(),
        check_interval_minutes: interval,
        notification_enabled: None,
    }
}

#[tokio::test]
async fn test_track_persists_target_and_subscription() -> anyhow::Result<()> {
    let app = create_test_app().await?;
    let server = MockServer::start().await;
    serve_product(&server, product_page("Steel Kettle", "$49.99")).await;
    let url = product_url(&server);

    let tracked = app.tracking.track_product(track("alice", &url, "45", Some(30))).await?;

    let stored = app.storage.find_target_by_url(&url).await?.expect("target stored");
    assert_eq!(stored.id, tracked.target.id);
    assert_eq!(stored.name, "Steel Kettle");
    assert_eq!(stored.last_price, Some(Decimal::from_str("49.99")?));

    let subscription = app
        .storage
        .find_subscription("alice", &stored.id)
        .await?
        .expect("subscription stored");
    assert_eq!(subscription.check_interval_minutes, 30);
    assert!(subscription.notification_enabled);
    Ok(())
}

#[tokio::test]
async fn test_users_share_one_target_per_url() -> anyhow::Result<()> {
    let app = create_test_app().await?;
    let server = MockServer::start().await;
    serve_product(&server, product_page("Steel Kettle", "$49.99")).await;
    let url = product_url(&server);

    app.tracking.track_product(track("alice", &url, "45", None)).await?;
    let bob = app.tracking.track_product(track("bob", &url, "40", Some(1))).await?;

    assert!(!bob.created_target);
    assert_eq!(bob.subscription.check_interval_minutes, MIN_CHECK_INTERVAL_MINUTES);
    assert_eq!(app.storage.list_targets().await?.len(), 1);

    let duplicate = app.tracking.track_product(track("bob", &url, "35", None)).await;
    assert!(matches!(duplicate, Err(AppError::AlreadyTracked { .. })));
    assert_eq!(app.tracking.list_subscriptions(&bob.target.id).await?.len(), 2);
    Ok(())
}

#[tokio::test]
async fn test_unreachable_page_is_still_tracked() -> anyhow::Result<()> {
    let app = create_test_app().await?;
    let server = MockServer::start().await;
    // Nothing mounted: every request is a 404
    let url = product_url(&server);

    let tracked = app.tracking.track_product(track("alice", &url, "45", None)).await?;

    assert_eq!(tracked.target.name, UNKNOWN_PRODUCT_NAME);
    assert_eq!(tracked.target.last_price, None);
    assert!(app.tracking.price_history(&url).await?.is_empty());
    Ok(())
}

#[tokio::test]
async fn test_update_then_remove_subscription() -> anyhow::Result<()> {
    let app = create_test_app().await?;
    let server = MockServer::start().await;
    serve_product(&server, product_page("Steel Kettle", "$49.99")).await;
    let url = product_url(&server);

    let tracked = app.tracking.track_product(track("alice", &url, "45", None)).await?;
    let id = tracked.subscription.id;

    let updated = app
        .tracking
        .update_subscription(
            &id,
            UpdateSubscription {
                desired_price: Some(Decimal::from_str("42.00")?),
                ..Default::default()
            },
        )
        .await?;
    assert_eq!(updated.desired_price, Decimal::from_str("42.00")?);
    assert_eq!(
        app.storage.get_subscription(&id).await?.map(|s| s.desired_price),
        Some(Decimal::from_str("42.00")?)
    );

    app.tracking.remove_subscription(&id).await?;
    assert!(app.storage.get_subscription(&id).await?.is_none());
    assert!(app.storage.find_target_by_url(&url).await?.is_some());

    let missing = app.tracking.update_subscription(&id, UpdateSubscription::default()).await;
    assert!(matches!(missing, Err(AppError::NotFound { .. })));
    Ok(())
}

#[tokio::test]
async fn test_list_products_for_user() -> anyhow::Result<()> {
    let app = create_test_app().await?;
    let kettle_server = MockServer::start().await;
    serve_product(&kettle_server, product_page("Steel Kettle", "$49.99")).await;
    let toaster_server = MockServer::start().await;
    serve_product(&toaster_server, product_page("Toaster", "$25.00")).await;
    let kettle_url = product_url(&kettle_server);
    let toaster_url = product_url(&toaster_server);

    let kettle = app.tracking.track_product(track("alice", &kettle_url, "45", None)).await?;
    let toaster = app.tracking.track_product(track("alice", &toaster_url, "20", None)).await?;
    let bob = app.tracking.track_product(track("bob", &kettle_url, "40", None)).await?;

    let products = app.tracking.list_for_user("alice").await?;
    let names: Vec<&str> = products.iter().map(|p| p.target.name.as_str()).collect();
    assert_eq!(names.len(), 2);
    assert!(names.contains(&"Steel Kettle"));
    assert!(names.contains(&"Toaster"));
    assert!(products.iter().all(|p| p.subscription.user_id == "alice"));
    assert!(app.tracking.list_for_user("carol").await?.is_empty());

    let owned = app.tracking.get_for_user("alice", &toaster.subscription.id).await?;
    assert_eq!(owned.target.id, toaster.target.id);
    assert_eq!(owned.target.last_price, Some(Decimal::from_str("25.00")?));

    let foreign = app.tracking.get_for_user("alice", &bob.subscription.id).await;
    assert!(matches!(foreign, Err(AppError::NotFound { .. })));

    app.tracking.remove_subscription(&kettle.subscription.id).await?;
    let remaining = app.tracking.list_for_user("alice").await?;
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].target.id, toaster.target.id);
    Ok(())
}
