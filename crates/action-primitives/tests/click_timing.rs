use std::sync::Arc;
use std::time::Duration;

use action_locator::Locator;
use action_primitives::{delayed_click, ActionError, ExecCtx};
use cdp_adapter::{ElementSpec, HostDocument, HostError, MemoryDocument};
use dropclick_config_center::LocatorPolicy;
use tokio::time::Instant;
use tokio_test::assert_ok;
use tokio_util::sync::CancellationToken;

fn page() -> Arc<MemoryDocument> {
    MemoryDocument::new(
        "https://shop.test/item/7",
        vec![ElementSpec::new("button").key("buy").class("btn-buy").text("В корзину")],
    )
}

fn locator(doc: &Arc<MemoryDocument>) -> Locator {
    let host: Arc<dyn HostDocument> = doc.clone();
    Locator::from_policy(host, &LocatorPolicy::default()).unwrap()
}

#[tokio::test(start_paused = true)]
async fn click_lands_after_the_delay() {
    let doc = page();
    let control = locator(&doc).locate_add_to_cart().await.unwrap();
    let ctx = ExecCtx::new(CancellationToken::new());
    let start = Instant::now();

    let report = assert_ok!(
        delayed_click(&ctx, &control, Duration::from_millis(50), "add_to_cart").await
    );

    let clicks = doc.clicks();
    assert_eq!(clicks.len(), 1);
    assert_eq!(clicks[0].at - start, Duration::from_millis(50));
    assert_eq!(report.latency_ms, 50);
    assert_eq!(report.text, "В корзину");
}

#[tokio::test(start_paused = true)]
async fn cancelled_delay_never_clicks() {
    let doc = page();
    let control = locator(&doc).locate_add_to_cart().await.unwrap();
    let token = CancellationToken::new();
    let ctx = ExecCtx::new(token.clone());
    token.cancel();

    let err = delayed_click(&ctx, &control, Duration::from_millis(50), "add_to_cart")
        .await
        .unwrap_err();
    assert!(err.is_interrupted());
    assert!(doc.clicks().is_empty());
}

#[tokio::test(start_paused = true)]
async fn detached_control_surfaces_as_host_error() {
    let doc = page();
    let control = locator(&doc).locate_add_to_cart().await.unwrap();
    doc.reload().await.unwrap();
    let ctx = ExecCtx::new(CancellationToken::new());

    let err = delayed_click(&ctx, &control, Duration::ZERO, "add_to_cart")
        .await
        .unwrap_err();
    assert!(matches!(err, ActionError::Host(HostError::Detached(_))));
    assert_eq!(err.kind(), "action_throw");
}

#[tokio::test(start_paused = true)]
async fn control_disabled_during_the_delay_is_not_clicked() {
    let doc = page();
    let control = locator(&doc).locate_add_to_cart().await.unwrap();
    let ctx = ExecCtx::new(CancellationToken::new());
    let relock = doc.clone();
    let lock = tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(20)).await;
        relock.set_disabled("buy", true);
    });

    let err = delayed_click(&ctx, &control, Duration::from_millis(50), "add_to_cart")
        .await
        .unwrap_err();

    assert!(matches!(err, ActionError::NotInteractive(ref id) if id == control.id()));
    assert_eq!(err.kind(), "not_interactive");
    assert!(doc.clicks().is_empty());
    lock.await.unwrap();
}
