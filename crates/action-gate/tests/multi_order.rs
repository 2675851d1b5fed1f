use std::sync::Arc;
use std::time::Duration;

use action_gate::{SuccessDetector, SuccessOutcome, SuccessSignal};
use action_primitives::ExecCtx;
use cdp_adapter::{ElementSpec, HostDocument, MemoryDocument};
use dropclick_config_center::{
    AgentConfig, ConfigPatch, ConfigStore, InMemoryConfigStore, SuccessPolicy,
};
use tokio::time::Instant;
use tokio_test::assert_ok;
use tokio_util::sync::CancellationToken;

const PRODUCT: &str = "https://shop.test/catalog/horse-354";
const THANKS: &str = "https://shop.test/order/complete";

fn product_page() -> Vec<ElementSpec> {
    vec![ElementSpec::new("button").class("btn-buy").text("В корзину")]
}

fn thanks_page() -> Vec<ElementSpec> {
    vec![ElementSpec::new("h1").text("Спасибо за заказ!")]
}

fn multi_order_store() -> Arc<InMemoryConfigStore> {
    InMemoryConfigStore::shared(AgentConfig {
        enabled: true,
        multi_order: true,
        ..AgentConfig::default()
    })
}

fn detector(doc: &Arc<MemoryDocument>, store: Arc<InMemoryConfigStore>) -> SuccessDetector {
    let host: Arc<dyn HostDocument> = doc.clone();
    SuccessDetector::new(host, store, SuccessPolicy::default())
}

fn ctx() -> ExecCtx {
    ExecCtx::new(CancellationToken::new())
}

#[tokio::test(start_paused = true)]
async fn recognizes_each_signal_kind() {
    let doc = MemoryDocument::new(PRODUCT, product_page());
    let detector = detector(&doc, multi_order_store());
    assert_eq!(assert_ok!(detector.is_order_confirmed().await), None);

    doc.navigate(THANKS, thanks_page());
    assert_eq!(
        assert_ok!(detector.is_order_confirmed().await),
        Some(SuccessSignal::Phrase("спасибо за заказ".into()))
    );

    doc.navigate("https://shop.test/checkout/success", vec![]);
    assert_eq!(
        assert_ok!(detector.is_order_confirmed().await),
        Some(SuccessSignal::Url("success".into()))
    );

    doc.navigate(
        "https://shop.test/order/42",
        vec![ElementSpec::new("div").attr("data-order-confirmed", "42")],
    );
    assert_eq!(
        assert_ok!(detector.is_order_confirmed().await),
        Some(SuccessSignal::Marker)
    );
}

#[tokio::test(start_paused = true)]
async fn recovery_goes_back_then_reloads_on_schedule() {
    let doc = MemoryDocument::new(PRODUCT, product_page());
    doc.navigate(THANKS, thanks_page());
    let detector = detector(&doc, multi_order_store());
    let start = Instant::now();

    let outcome = detector.check_and_recover(&ctx()).await.unwrap();

    assert!(matches!(outcome, SuccessOutcome::Recovered(SuccessSignal::Phrase(_))));
    assert_eq!(start.elapsed(), Duration::from_millis(1_500 + 2_000));
    assert_eq!(doc.back_count(), 1);
    assert_eq!(doc.reload_count(), 1);
    assert_eq!(doc.url(), PRODUCT);
}

#[tokio::test(start_paused = true)]
async fn one_recovery_per_confirmation() {
    // no history to go back to: the confirmation page survives the recovery
    let doc = MemoryDocument::new(THANKS, thanks_page());
    let detector = detector(&doc, multi_order_store());

    let first = detector.check_and_recover(&ctx()).await.unwrap();
    assert!(matches!(first, SuccessOutcome::Recovered(_)));
    for _ in 0..3 {
        let again = detector.check_and_recover(&ctx()).await.unwrap();
        assert_eq!(again, SuccessOutcome::AlreadyHandled);
    }
    assert_eq!(doc.back_count(), 1);
    assert_eq!(doc.reload_count(), 1);

    // a fresh hunt followed by a second order is handled again
    doc.navigate(PRODUCT, product_page());
    assert_eq!(
        detector.check_and_recover(&ctx()).await.unwrap(),
        SuccessOutcome::NotConfirmed
    );
    doc.navigate(THANKS, thanks_page());
    let second = detector.check_and_recover(&ctx()).await.unwrap();
    assert!(matches!(second, SuccessOutcome::Recovered(_)));
    assert_eq!(doc.back_count(), 2);
    assert_eq!(doc.reload_count(), 2);

    // an explicit re-arm stands in for the intermediate product page
    doc.navigate(THANKS, thanks_page());
    assert_eq!(
        detector.check_and_recover(&ctx()).await.unwrap(),
        SuccessOutcome::AlreadyHandled
    );
    detector.rearm();
    let third = detector.check_and_recover(&ctx()).await.unwrap();
    assert!(matches!(third, SuccessOutcome::Recovered(_)));
}

#[tokio::test(start_paused = true)]
async fn inactive_without_multi_order() {
    let doc = MemoryDocument::new(THANKS, thanks_page());
    let store = multi_order_store();
    let detector = detector(&doc, store.clone());

    store
        .set(ConfigPatch {
            multi_order: Some(false),
            ..ConfigPatch::default()
        })
        .await
        .unwrap();
    assert_eq!(
        detector.check_and_recover(&ctx()).await.unwrap(),
        SuccessOutcome::Inactive
    );

    store
        .set(ConfigPatch {
            multi_order: Some(true),
            enabled: Some(false),
            ..ConfigPatch::default()
        })
        .await
        .unwrap();
    assert_eq!(
        detector.check_and_recover(&ctx()).await.unwrap(),
        SuccessOutcome::Inactive
    );
    assert_eq!(doc.back_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn cancelled_recovery_stops_before_navigating() {
    let doc = MemoryDocument::new(PRODUCT, product_page());
    doc.navigate(THANKS, thanks_page());
    let detector = detector(&doc, multi_order_store());
    let token = CancellationToken::new();
    let ctx = ExecCtx::new(token.clone());
    token.cancel();

    let err = detector.check_and_recover(&ctx).await.unwrap_err();
    assert!(err.is_interrupted());
    assert_eq!(doc.back_count(), 0);
}
