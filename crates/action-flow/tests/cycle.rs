use std::sync::Arc;
use std::time::Duration;

use action_flow::{CycleExecutor, CycleOutcome, SkipReason};
use action_gate::{SuccessDetector, SuccessOutcome};
use action_locator::Locator;
use action_primitives::ActionError;
use cdp_adapter::{ElementSpec, HostDocument, HostError, MemoryDocument};
use dropclick_config_center::{
    AgentConfig, AgentPolicy, ConfigKey, ConfigStore, InMemoryConfigStore,
};
use tokio::time::{sleep, Instant};

const PRODUCT: &str = "https://shop.test/catalog/horse-354";

struct Rig {
    doc: Arc<MemoryDocument>,
    store: Arc<InMemoryConfigStore>,
    executor: Arc<CycleExecutor>,
}

fn rig(config: AgentConfig) -> Rig {
    let doc = MemoryDocument::new(
        PRODUCT,
        vec![ElementSpec::new("div")
            .attr("data-add-to-basket", "354")
            .child(ElementSpec::new("button").key("buy").text("В корзину"))],
    );
    let store = InMemoryConfigStore::shared(config);
    let policy = AgentPolicy::default();
    let host: Arc<dyn HostDocument> = doc.clone();
    let locator = Locator::from_policy(host.clone(), &policy.locator).unwrap();
    let success = Arc::new(SuccessDetector::new(
        host,
        store.clone(),
        policy.success.clone(),
    ));
    let executor = Arc::new(CycleExecutor::new(
        locator,
        store.clone(),
        success,
        policy.executor.clone(),
    ));
    Rig {
        doc,
        store,
        executor,
    }
}

fn enabled() -> AgentConfig {
    AgentConfig {
        enabled: true,
        ..AgentConfig::default()
    }
}

/// Clicking the buy button reveals the checkout link.
fn reveal_checkout_on_buy(doc: &Arc<MemoryDocument>) {
    doc.on_click("buy", |doc| {
        if doc.id_of("checkout").is_none() {
            doc.insert(
                None,
                ElementSpec::new("a")
                    .key("checkout")
                    .attr("href", "/order/")
                    .text("Оформить заказ"),
            );
        }
    });
}

#[tokio::test(start_paused = true)]
async fn click_lands_at_the_configured_delay() {
    let rig = rig(enabled());
    reveal_checkout_on_buy(&rig.doc);
    let start = Instant::now();

    let outcome = rig.executor.run_full_cycle().await;

    assert!(matches!(outcome, CycleOutcome::CheckedOut { success: None, .. }));
    let clicks = rig.doc.clicks();
    assert_eq!(clicks.len(), 2);
    assert_eq!(clicks[0].key.as_deref(), Some("buy"));
    assert_eq!(clicks[0].at - start, Duration::from_millis(50));
    // the checkout link is already there when the first lookup runs
    assert_eq!(clicks[1].key.as_deref(), Some("checkout"));
    assert_eq!(clicks[1].at - start, Duration::from_millis(50));
}

#[tokio::test(start_paused = true)]
async fn disabled_agent_never_clicks() {
    for config in [
        AgentConfig::default(),
        AgentConfig {
            auto_refresh: true,
            multi_order: true,
            click_delay_ms: 0,
            drop_time: "12:00".into(),
            ..AgentConfig::default()
        },
    ] {
        let rig = rig(config);
        reveal_checkout_on_buy(&rig.doc);
        for _ in 0..3 {
            let outcome = rig.executor.run_full_cycle().await;
            assert!(matches!(outcome, CycleOutcome::Skipped(SkipReason::Disabled)));
            assert!(!outcome.initiated());
        }
        assert!(rig.doc.clicks().is_empty());
    }
}

#[tokio::test(start_paused = true)]
async fn overlapping_triggers_click_once() {
    let rig = rig(enabled());
    reveal_checkout_on_buy(&rig.doc);

    let (a, b, c) = tokio::join!(
        rig.executor.run_full_cycle(),
        rig.executor.run_full_cycle(),
        rig.executor.run_full_cycle(),
    );

    let outcomes = [a, b, c];
    let started = outcomes.iter().filter(|o| o.initiated()).count();
    let skipped = outcomes
        .iter()
        .filter(|o| matches!(o, CycleOutcome::Skipped(SkipReason::InFlight)))
        .count();
    assert_eq!((started, skipped), (1, 2));
    assert_eq!(rig.doc.clicks_on("buy"), 1);
}

#[tokio::test(start_paused = true)]
async fn missing_checkout_times_out_and_releases_the_guard() {
    let rig = rig(AgentConfig {
        click_delay_ms: 0,
        ..enabled()
    });
    let start = Instant::now();

    let outcome = rig.executor.run_full_cycle().await;

    assert!(matches!(
        outcome,
        CycleOutcome::Aborted {
            error: ActionError::ClickTimeout { attempts: 60 },
            ..
        }
    ));
    assert_eq!(start.elapsed(), Duration::from_millis(60 * 50));
    // the first click plus the defensive second one
    assert_eq!(rig.doc.clicks_on("buy"), 2);
    assert!(!rig.executor.is_in_flight());

    reveal_checkout_on_buy(&rig.doc);
    let retry = rig.executor.run_full_cycle().await;
    assert!(matches!(retry, CycleOutcome::CheckedOut { .. }));
    assert_eq!(rig.doc.clicks_on("checkout"), 1);
}

#[tokio::test(start_paused = true)]
async fn late_checkout_is_picked_up_by_the_poll() {
    let rig = rig(AgentConfig {
        click_delay_ms: 0,
        ..enabled()
    });
    let doc = rig.doc.clone();
    let reveal = tokio::spawn(async move {
        sleep(Duration::from_millis(420)).await;
        doc.insert(None, ElementSpec::new("button").key("checkout").text("Перейти к оформлению"));
    });
    let start = Instant::now();

    let outcome = rig.executor.run_full_cycle().await;

    assert!(matches!(outcome, CycleOutcome::CheckedOut { .. }));
    let checkout = rig
        .doc
        .clicks()
        .into_iter()
        .find(|click| click.key.as_deref() == Some("checkout"))
        .unwrap();
    // polls run at 50, 100, ... so the first sighting after 420 ms is at 450 ms
    assert_eq!(checkout.at - start, Duration::from_millis(450));
    reveal.await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn early_checkout_is_clicked_on_the_first_poll() {
    let rig = rig(AgentConfig {
        click_delay_ms: 0,
        ..enabled()
    });
    rig.doc.on_click("buy", |doc| {
        tokio::spawn(async move {
            sleep(Duration::from_millis(10)).await;
            doc.insert(None, ElementSpec::new("a").key("checkout").text("Оформить заказ"));
        });
    });
    let start = Instant::now();

    let outcome = rig.executor.run_full_cycle().await;

    assert!(matches!(outcome, CycleOutcome::CheckedOut { .. }));
    let checkout = rig
        .doc
        .clicks()
        .into_iter()
        .find(|click| click.key.as_deref() == Some("checkout"))
        .unwrap();
    assert_eq!(checkout.at - start, Duration::from_millis(50));
    // found before the re-click guard ran out
    assert_eq!(rig.doc.clicks_on("buy"), 1);
}

#[tokio::test(start_paused = true)]
async fn reclick_fires_once_while_the_poll_continues() {
    let rig = rig(AgentConfig {
        click_delay_ms: 0,
        ..enabled()
    });
    let doc = rig.doc.clone();
    let reveal = tokio::spawn(async move {
        sleep(Duration::from_millis(320)).await;
        doc.insert(None, ElementSpec::new("a").key("checkout").text("Оформить заказ"));
    });
    let start = Instant::now();

    let outcome = rig.executor.run_full_cycle().await;

    assert!(matches!(outcome, CycleOutcome::CheckedOut { .. }));
    let clicks = rig.doc.clicks();
    let keys: Vec<_> = clicks.iter().map(|click| click.key.as_deref()).collect();
    assert_eq!(keys, [Some("buy"), Some("buy"), Some("checkout")]);
    assert_eq!(clicks[1].at - start, Duration::from_millis(150));
    assert_eq!(clicks[2].at - start, Duration::from_millis(350));
    reveal.await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn throwing_click_aborts_without_escaping() {
    let rig = rig(enabled());
    rig.doc.fail_clicks_on("buy");

    let outcome = rig.executor.run_full_cycle().await;

    match outcome {
        CycleOutcome::Aborted { error, .. } => {
            assert!(matches!(error, ActionError::Host(HostError::Script(_))));
        }
        other => panic!("unexpected outcome {other:?}"),
    }
    assert!(!rig.executor.is_in_flight());
}

#[tokio::test(start_paused = true)]
async fn absent_target_leaves_everything_untouched() {
    let rig = rig(AgentConfig {
        auto_refresh: true,
        ..enabled()
    });
    rig.doc.set_disabled("buy", true);

    let outcome = rig.executor.run_full_cycle().await;

    assert!(matches!(outcome, CycleOutcome::TargetAbsent));
    assert!(!outcome.initiated());
    assert!(rig.doc.clicks().is_empty());
    assert!(rig.store.snapshot().await.auto_refresh);
    assert!(!rig.executor.is_in_flight());
}

#[tokio::test(start_paused = true)]
async fn detection_clears_auto_refresh_for_concurrent_readers() {
    let rig = rig(AgentConfig {
        auto_refresh: true,
        ..enabled()
    });
    reveal_checkout_on_buy(&rig.doc);
    let mut reader = rig.store.subscribe();
    assert!(reader.borrow_and_update().auto_refresh);

    let outcome = rig.executor.run_full_cycle().await;

    assert!(outcome.initiated());
    assert!(reader.has_changed().unwrap());
    assert!(!reader.borrow_and_update().auto_refresh);
    assert_eq!(
        rig.store.get(&[ConfigKey::AutoRefresh]).await.auto_refresh,
        Some(false)
    );
}

#[tokio::test(start_paused = true)]
async fn supersede_cancels_the_pending_click() {
    let rig = rig(AgentConfig {
        click_delay_ms: 5_000,
        ..enabled()
    });
    let executor = rig.executor.clone();
    let cycle = tokio::spawn(async move { executor.run_full_cycle().await });

    sleep(Duration::from_millis(10)).await;
    assert!(rig.executor.is_in_flight());
    rig.executor.supersede();

    let outcome = cycle.await.unwrap();
    assert!(matches!(
        outcome,
        CycleOutcome::Aborted {
            error: ActionError::Interrupted(_),
            ..
        }
    ));
    assert!(rig.doc.clicks().is_empty());
    assert!(!rig.executor.is_in_flight());
}

#[tokio::test(start_paused = true)]
async fn multi_order_runs_the_success_check_after_checkout() {
    let rig = rig(AgentConfig {
        multi_order: true,
        ..enabled()
    });
    reveal_checkout_on_buy(&rig.doc);
    rig.doc.on_click("checkout", |doc| {
        doc.navigate(
            "https://shop.test/order/complete",
            vec![ElementSpec::new("h1").text("Заказ сформирован")],
        );
    });

    let outcome = rig.executor.run_full_cycle().await;

    match outcome {
        CycleOutcome::CheckedOut {
            success: Some(SuccessOutcome::Recovered(_)),
            ..
        } => {}
        other => panic!("unexpected outcome {other:?}"),
    }
    assert_eq!(rig.doc.back_count(), 1);
    assert_eq!(rig.doc.reload_count(), 1);
    assert_eq!(rig.doc.url(), PRODUCT);
}
