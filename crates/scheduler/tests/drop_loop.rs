use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime};
use dropclick_config_center::{
    AgentConfig, CadencePolicy, ConfigPatch, ConfigStore, InMemoryConfigStore,
};
use dropclick_scheduler::{DropHooks, DropScheduler, StopReason, VirtualClock};
use parking_lot::Mutex;
use tokio::time::{sleep, Instant};
use tokio_util::sync::CancellationToken;

fn at(h: u32, m: u32, s: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 3, 1)
        .and_then(|d| d.and_hms_opt(h, m, s))
        .unwrap()
}

#[derive(Default)]
struct RecordingHooks {
    target: AtomicBool,
    reloads: Mutex<Vec<Instant>>,
    hand_offs: AtomicUsize,
    // a real cycle clears autoRefresh when it starts
    store: Mutex<Option<Arc<InMemoryConfigStore>>>,
}

#[async_trait]
impl DropHooks for RecordingHooks {
    async fn target_ready(&self) -> bool {
        self.target.load(Ordering::SeqCst)
    }

    async fn hand_off(&self) {
        self.hand_offs.fetch_add(1, Ordering::SeqCst);
        let store = self.store.lock().clone();
        if let Some(store) = store {
            store.set(ConfigPatch::auto_refresh(false)).await.unwrap();
        }
    }

    async fn reload(&self) {
        self.reloads.lock().push(Instant::now());
    }
}

fn hunting(drop_time: &str) -> AgentConfig {
    AgentConfig {
        enabled: true,
        auto_refresh: true,
        drop_time: drop_time.into(),
        ..AgentConfig::default()
    }
}

fn scheduler(
    hooks: &Arc<RecordingHooks>,
    store: &Arc<InMemoryConfigStore>,
    now: NaiveDateTime,
) -> DropScheduler {
    DropScheduler::new(
        hooks.clone(),
        store.subscribe(),
        CadencePolicy::default(),
        Arc::new(VirtualClock::starting_at(now)),
    )
}

#[tokio::test(start_paused = true)]
async fn missed_window_performs_no_reload() {
    let hooks = Arc::new(RecordingHooks::default());
    let store = InMemoryConfigStore::shared(hunting("12:00:00"));
    let scheduler = scheduler(&hooks, &store, at(12, 0, 5));

    let reason = scheduler.run(CancellationToken::new()).await;

    assert_eq!(reason, StopReason::MissedWindow { late_ms: 5_000 });
    assert!(hooks.reloads.lock().is_empty());
    assert_eq!(hooks.hand_offs.load(Ordering::SeqCst), 0);
}

#[tokio::test(start_paused = true)]
async fn reload_interval_tightens_toward_the_drop() {
    let hooks = Arc::new(RecordingHooks::default());
    let store = InMemoryConfigStore::shared(hunting("12:00:00"));
    let scheduler = scheduler(&hooks, &store, at(11, 59, 25));
    let cancel = CancellationToken::new();
    let start = Instant::now();

    let stopper = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            // two seconds past the drop, still inside the grace window
            sleep(Duration::from_secs(37)).await;
            cancel.cancel();
        })
    };
    let reason = scheduler.run(cancel).await;
    stopper.await.unwrap();
    assert_eq!(reason, StopReason::Cancelled);

    let reloads: Vec<u64> = hooks
        .reloads
        .lock()
        .iter()
        .map(|at| (*at - start).as_millis() as u64)
        .collect();
    assert_eq!(&reloads[..3], &[10_000, 13_500, 17_000]);
    let gaps: Vec<u64> = reloads.windows(2).map(|w| w[1] - w[0]).collect();
    assert!(gaps.windows(2).all(|g| g[1] <= g[0]), "gaps {gaps:?}");
    assert_eq!(*gaps.last().unwrap(), 1_000);
}

#[tokio::test(start_paused = true)]
async fn present_target_is_handed_off_instead_of_reloaded() {
    let hooks = Arc::new(RecordingHooks::default());
    let store = InMemoryConfigStore::shared(hunting("12:00:00"));
    *hooks.store.lock() = Some(store.clone());
    hooks.target.store(true, Ordering::SeqCst);
    let scheduler = scheduler(&hooks, &store, at(11, 0, 0));
    let start = Instant::now();

    let reason = scheduler.run(CancellationToken::new()).await;

    assert_eq!(reason, StopReason::AutoRefreshOff);
    assert_eq!(hooks.hand_offs.load(Ordering::SeqCst), 1);
    assert!(hooks.reloads.lock().is_empty());
    assert_eq!(start.elapsed(), Duration::ZERO);
}

#[tokio::test(start_paused = true)]
async fn target_appearing_during_the_wait_is_handed_off() {
    let hooks = Arc::new(RecordingHooks::default());
    let store = InMemoryConfigStore::shared(hunting("12:00:00"));
    *hooks.store.lock() = Some(store.clone());
    let scheduler = scheduler(&hooks, &store, at(11, 59, 55));

    let flip = {
        let hooks = hooks.clone();
        tokio::spawn(async move {
            sleep(Duration::from_millis(500)).await;
            hooks.target.store(true, Ordering::SeqCst);
        })
    };
    let reason = scheduler.run(CancellationToken::new()).await;
    flip.await.unwrap();

    assert_eq!(reason, StopReason::AutoRefreshOff);
    assert_eq!(hooks.hand_offs.load(Ordering::SeqCst), 1);
    assert!(hooks.reloads.lock().is_empty());
}

#[tokio::test(start_paused = true)]
async fn clearing_auto_refresh_stops_mid_wait() {
    let hooks = Arc::new(RecordingHooks::default());
    let store = InMemoryConfigStore::shared(hunting("12:00:00"));
    let scheduler = scheduler(&hooks, &store, at(11, 0, 0));
    let start = Instant::now();

    let toggler = {
        let store = store.clone();
        tokio::spawn(async move {
            sleep(Duration::from_secs(2)).await;
            store.set(ConfigPatch::auto_refresh(false)).await.unwrap();
        })
    };
    let reason = scheduler.run(CancellationToken::new()).await;
    toggler.await.unwrap();

    assert_eq!(reason, StopReason::AutoRefreshOff);
    assert_eq!(start.elapsed(), Duration::from_secs(2));
    assert!(hooks.reloads.lock().is_empty());
}

#[tokio::test(start_paused = true)]
async fn new_drop_time_restarts_the_evaluation() {
    let hooks = Arc::new(RecordingHooks::default());
    let store = InMemoryConfigStore::shared(hunting("12:00:00"));
    let scheduler = scheduler(&hooks, &store, at(11, 0, 0));
    let cancel = CancellationToken::new();
    let start = Instant::now();

    let driver = {
        let store = store.clone();
        let cancel = cancel.clone();
        tokio::spawn(async move {
            sleep(Duration::from_secs(1)).await;
            // the drop is now five seconds away: hot band
            store
                .set(ConfigPatch {
                    drop_time: Some("11:00:06".into()),
                    ..ConfigPatch::default()
                })
                .await
                .unwrap();
            sleep(Duration::from_secs(2)).await;
            cancel.cancel();
        })
    };
    scheduler.run(cancel).await;
    driver.await.unwrap();

    let reloads = hooks.reloads.lock().clone();
    assert_eq!(reloads.len(), 1);
    assert_eq!(reloads[0] - start, Duration::from_millis(1_000 + 1_200));
}

#[tokio::test(start_paused = true)]
async fn unusable_drop_time_declines_to_schedule() {
    let hooks = Arc::new(RecordingHooks::default());
    for drop_time in ["", "tomorrow", "24:00"] {
        let store = InMemoryConfigStore::shared(hunting(drop_time));
        let reason = scheduler(&hooks, &store, at(11, 0, 0))
            .run(CancellationToken::new())
            .await;
        assert!(matches!(
            reason,
            StopReason::NoDropTime | StopReason::InvalidDropTime(_)
        ));
    }
    assert!(hooks.reloads.lock().is_empty());
}
