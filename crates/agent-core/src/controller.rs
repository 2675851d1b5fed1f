//! Agent controller: trigger queue, state machine and scheduler ownership.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use action_flow::{CycleExecutor, CycleOutcome, CyclePhase, SkipReason};
use action_gate::{SuccessDetector, SuccessOutcome};
use action_locator::Locator;
use action_primitives::{ActionError, ExecCtx};
use cdp_adapter::{DomEvent, HostDocument};
use dropclick_config_center::{AgentConfig, AgentPolicy, ConfigStore};
use dropclick_scheduler::{Clock, DropScheduler, LocalClock, StopReason};
use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use crate::errors::AgentError;
use crate::hooks::SchedulerHooks;
use crate::model::{AgentState, AgentStatus, TriggerSource};

const TRIGGER_CAPACITY: usize = 64;

pub(crate) enum Trigger {
    Cycle(TriggerSource),
    Navigated,
    Finished(TriggerSource, CycleOutcome),
    SuccessChecked(Result<SuccessOutcome, ActionError>),
}

#[derive(Default)]
pub(crate) struct Counters {
    pub(crate) cycles_started: AtomicU64,
    pub(crate) checkouts: AtomicU64,
    pub(crate) cycles_aborted: AtomicU64,
    pub(crate) successes: AtomicU64,
    pub(crate) reloads: AtomicU64,
}

struct SchedulerTask {
    token: CancellationToken,
    handle: JoinHandle<StopReason>,
}

/// Consumer-side bookkeeping; only the run loop touches it.
struct LoopState {
    config: Arc<AgentConfig>,
    phase: CyclePhase,
    cycle_pending: bool,
    // trigger that arrived while a cycle was pending
    rerun: Option<TriggerSource>,
    success_pending: bool,
    done: bool,
    scheduler: Option<SchedulerTask>,
}

pub struct AgentController {
    host: Arc<dyn HostDocument>,
    store: Arc<dyn ConfigStore>,
    executor: Arc<CycleExecutor>,
    success: Arc<SuccessDetector>,
    policy: AgentPolicy,
    clock: Arc<dyn Clock>,
    state_tx: watch::Sender<AgentState>,
    counters: Arc<Counters>,
}

impl AgentController {
    pub fn new(
        host: Arc<dyn HostDocument>,
        store: Arc<dyn ConfigStore>,
        policy: AgentPolicy,
    ) -> Result<Self, AgentError> {
        policy.validate()?;
        let locator = Locator::from_policy(Arc::clone(&host), &policy.locator)?;
        let success = Arc::new(SuccessDetector::new(
            Arc::clone(&host),
            Arc::clone(&store),
            policy.success.clone(),
        ));
        let executor = Arc::new(CycleExecutor::new(
            locator,
            Arc::clone(&store),
            Arc::clone(&success),
            policy.executor.clone(),
        ));
        let initial = if store.subscribe().borrow().enabled {
            AgentState::Hunting
        } else {
            AgentState::Idle
        };
        let (state_tx, _state_rx) = watch::channel(initial);
        Ok(Self {
            host,
            store,
            executor,
            success,
            policy,
            clock: Arc::new(LocalClock),
            state_tx,
            counters: Arc::new(Counters::default()),
        })
    }

    /// Replace the wall clock the drop scheduler measures against.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn state(&self) -> watch::Receiver<AgentState> {
        self.state_tx.subscribe()
    }

    pub fn status(&self) -> AgentStatus {
        AgentStatus {
            state: *self.state_tx.borrow(),
            cycles_started: self.counters.cycles_started.load(Ordering::Relaxed),
            checkouts: self.counters.checkouts.load(Ordering::Relaxed),
            cycles_aborted: self.counters.cycles_aborted.load(Ordering::Relaxed),
            successes: self.counters.successes.load(Ordering::Relaxed),
            reloads: self.counters.reloads.load(Ordering::Relaxed),
        }
    }

    pub fn executor(&self) -> &Arc<CycleExecutor> {
        &self.executor
    }

    /// Drive the agent until `shutdown` fires.
    ///
    /// Document changes, scheduler hand-offs and the backstop timer all land
    /// in one queue consumed here; cycles run as separate tasks and report
    /// back through the same queue.
    pub async fn run(self: Arc<Self>, shutdown: CancellationToken) -> AgentStatus {
        let tasks = shutdown.child_token();
        let (tx, mut rx) = mpsc::channel(TRIGGER_CAPACITY);
        let mut config_rx = self.store.subscribe();
        let mut phase_rx = self.executor.phase();

        let producers = [
            spawn_dom_watcher(self.host.subscribe(), tx.clone(), tasks.clone()),
            spawn_backstop(
                self.policy.controller.backstop_poll(),
                Arc::clone(&self.store),
                tx.clone(),
                tasks.clone(),
            ),
        ];

        let mut state = LoopState {
            config: Arc::clone(&config_rx.borrow_and_update()),
            phase: *phase_rx.borrow_and_update(),
            cycle_pending: false,
            rerun: None,
            success_pending: false,
            done: false,
            scheduler: None,
        };
        info!(
            enabled = state.config.enabled,
            auto_refresh = state.config.auto_refresh,
            multi_order = state.config.multi_order,
            drop_time = %state.config.drop_time,
            "agent started"
        );
        self.reconcile_scheduler(&mut state, &tx, &tasks);
        // the page we attach to counts as a fresh load
        self.on_navigation(&mut state, &tx, &tasks);
        self.publish_state(&state);

        loop {
            tokio::select! {
                biased;
                _ = shutdown.cancelled() => break,
                changed = config_rx.changed() => {
                    if changed.is_err() {
                        warn!("config store closed");
                        break;
                    }
                    let config = Arc::clone(&config_rx.borrow_and_update());
                    self.on_config(&mut state, config, &tx, &tasks);
                }
                changed = phase_rx.changed() => {
                    if changed.is_ok() {
                        state.phase = *phase_rx.borrow_and_update();
                    }
                }
                Some(trigger) = rx.recv() => self.on_trigger(&mut state, trigger, &tx, &tasks),
            }
            self.publish_state(&state);
        }

        tasks.cancel();
        self.executor.supersede();
        for producer in producers {
            producer.abort();
        }
        if let Some(scheduler) = state.scheduler.take() {
            scheduler.token.cancel();
            scheduler.handle.abort();
        }
        info!(status = ?self.status(), "agent stopped");
        self.status()
    }

    fn on_config(
        &self,
        state: &mut LoopState,
        config: Arc<AgentConfig>,
        tx: &mpsc::Sender<Trigger>,
        tasks: &CancellationToken,
    ) {
        let previous = std::mem::replace(&mut state.config, config);
        let current = Arc::clone(&state.config);
        debug!(?current, "agent config changed");

        // the agent clears autoRefresh itself; only user edits end a finished hunt
        let mut masked = (*previous).clone();
        masked.auto_refresh = current.auto_refresh;
        if state.done && masked != *current {
            info!("config edited, resuming hunt");
            state.done = false;
        }
        if !previous.enabled && current.enabled {
            self.request_cycle(state, TriggerSource::Enabled, tx);
            self.maybe_check_success(state, tx, tasks);
        }
        if previous.enabled && !current.enabled {
            self.executor.supersede();
        }
        // a stopped scheduler only gets another look under new settings
        if state
            .scheduler
            .as_ref()
            .map_or(false, |task| task.handle.is_finished())
        {
            debug!("discarding stopped drop scheduler");
            state.scheduler = None;
        }
        self.reconcile_scheduler(state, tx, tasks);
    }

    fn on_trigger(
        &self,
        state: &mut LoopState,
        trigger: Trigger,
        tx: &mpsc::Sender<Trigger>,
        tasks: &CancellationToken,
    ) {
        match trigger {
            Trigger::Cycle(source) => self.request_cycle(state, source, tx),
            Trigger::Navigated => self.on_navigation(state, tx, tasks),
            Trigger::Finished(source, outcome) => {
                state.cycle_pending = false;
                self.record_outcome(state, source, &outcome);
                if let Some(source) = state.rerun.take() {
                    self.request_cycle(state, source, tx);
                }
                self.reconcile_scheduler(state, tx, tasks);
            }
            Trigger::SuccessChecked(result) => {
                state.success_pending = false;
                match result {
                    Ok(SuccessOutcome::Recovered(signal)) => {
                        self.counters.successes.fetch_add(1, Ordering::Relaxed);
                        info!(%signal, "order confirmed on page load, hunt restarted");
                    }
                    Ok(outcome) => trace!(?outcome, "success check"),
                    Err(err) if err.is_interrupted() => {}
                    Err(err) => warn!(%err, "success check failed"),
                }
            }
        }
    }

    fn on_navigation(
        &self,
        state: &mut LoopState,
        tx: &mpsc::Sender<Trigger>,
        tasks: &CancellationToken,
    ) {
        self.maybe_check_success(state, tx, tasks);
        self.request_cycle(state, TriggerSource::Navigation, tx);
    }

    fn maybe_check_success(
        &self,
        state: &mut LoopState,
        tx: &mpsc::Sender<Trigger>,
        tasks: &CancellationToken,
    ) {
        let config = &state.config;
        if !config.enabled || !config.multi_order || state.success_pending {
            return;
        }
        // a running cycle performs its own check after checkout
        if state.cycle_pending || self.executor.is_in_flight() {
            return;
        }
        state.success_pending = true;
        let success = Arc::clone(&self.success);
        let tx = tx.clone();
        let ctx = ExecCtx::new(tasks.child_token());
        tokio::spawn(async move {
            let result = success.check_and_recover(&ctx).await;
            let _ = tx.send(Trigger::SuccessChecked(result)).await;
        });
    }

    fn request_cycle(&self, state: &mut LoopState, source: TriggerSource, tx: &mpsc::Sender<Trigger>) {
        if !state.config.enabled || state.done {
            return;
        }
        if state.cycle_pending {
            state.rerun.get_or_insert(source);
            return;
        }
        state.cycle_pending = true;
        trace!(%source, "cycle requested");
        let executor = Arc::clone(&self.executor);
        let tx = tx.clone();
        tokio::spawn(async move {
            let outcome = executor.run_full_cycle().await;
            let _ = tx.send(Trigger::Finished(source, outcome)).await;
        });
    }

    fn record_outcome(&self, state: &mut LoopState, source: TriggerSource, outcome: &CycleOutcome) {
        match outcome {
            CycleOutcome::Skipped(SkipReason::Disabled) | CycleOutcome::TargetAbsent => {
                trace!(%source, "no target");
            }
            CycleOutcome::Skipped(SkipReason::InFlight) => {
                trace!(%source, "cycle already in flight");
            }
            CycleOutcome::CheckedOut { cycle_id, success } => {
                self.counters.cycles_started.fetch_add(1, Ordering::Relaxed);
                self.counters.checkouts.fetch_add(1, Ordering::Relaxed);
                if let Some(SuccessOutcome::Recovered(signal)) = success {
                    self.counters.successes.fetch_add(1, Ordering::Relaxed);
                    info!(%cycle_id, %signal, "order placed, hunting again");
                }
                if !state.config.multi_order {
                    info!(%cycle_id, %source, "checkout clicked, hunt finished");
                    state.done = true;
                    state.rerun = None;
                }
            }
            CycleOutcome::Aborted { cycle_id, error } => {
                self.counters.cycles_started.fetch_add(1, Ordering::Relaxed);
                self.counters.cycles_aborted.fetch_add(1, Ordering::Relaxed);
                debug!(%cycle_id, %source, kind = error.kind(), "cycle aborted, waiting for next trigger");
            }
        }
    }

    /// Start the drop scheduler when the hunt wants reloads, stop it when not.
    ///
    /// A scheduler that stopped on its own (missed window, unusable drop time)
    /// stays in place until [`Self::on_config`] discards it, so it is not
    /// restarted for settings it already declined.
    fn reconcile_scheduler(
        &self,
        state: &mut LoopState,
        tx: &mpsc::Sender<Trigger>,
        tasks: &CancellationToken,
    ) {
        let wanted = state.config.enabled && state.config.auto_refresh && !state.done;

        if wanted && state.scheduler.is_none() {
            let token = tasks.child_token();
            let hooks = Arc::new(SchedulerHooks {
                executor: Arc::clone(&self.executor),
                host: Arc::clone(&self.host),
                triggers: tx.clone(),
                counters: Arc::clone(&self.counters),
            });
            let scheduler = DropScheduler::new(
                hooks,
                self.store.subscribe(),
                self.policy.cadence.clone(),
                Arc::clone(&self.clock),
            );
            let run_token = token.clone();
            let handle = tokio::spawn(async move { scheduler.run(run_token).await });
            debug!(drop_time = %state.config.drop_time, "drop scheduler started");
            state.scheduler = Some(SchedulerTask { token, handle });
        } else if !wanted {
            if let Some(task) = state.scheduler.take() {
                task.token.cancel();
            }
        }
    }

    fn publish_state(&self, state: &LoopState) {
        let next = if !state.config.enabled {
            AgentState::Idle
        } else {
            match state.phase {
                CyclePhase::AddingToCart | CyclePhase::AwaitingCheckout => AgentState::Cycling,
                CyclePhase::AwaitingSuccess => AgentState::AwaitingSuccess,
                CyclePhase::Idle if state.done => AgentState::Done,
                CyclePhase::Idle => AgentState::Hunting,
            }
        };
        self.state_tx.send_if_modified(|current| {
            if *current == next {
                return false;
            }
            info!(from = %current, to = %next, "agent state");
            *current = next;
            true
        });
    }
}

fn spawn_dom_watcher(
    mut events: broadcast::Receiver<DomEvent>,
    tx: mpsc::Sender<Trigger>,
    token: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            let event = tokio::select! {
                _ = token.cancelled() => break,
                event = events.recv() => event,
            };
            match event {
                Ok(DomEvent::Mutated) | Err(broadcast::error::RecvError::Lagged(_)) => {
                    // a full queue already holds a pending re-evaluation
                    let _ = tx.try_send(Trigger::Cycle(TriggerSource::Mutation));
                }
                Ok(DomEvent::Navigated { url }) => {
                    debug!(%url, "document replaced");
                    if tx.send(Trigger::Navigated).await.is_err() {
                        break;
                    }
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    })
}

/// Re-read the store and re-evaluate the page on a fixed period, covering
/// missed change notifications from either side.
fn spawn_backstop(
    period: std::time::Duration,
    store: Arc<dyn ConfigStore>,
    tx: mpsc::Sender<Trigger>,
    token: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // the first tick completes immediately
        ticker.tick().await;
        loop {
            tokio::select! {
                _ = token.cancelled() => break,
                _ = ticker.tick() => {
                    // changes arrive through the store's subscription
                    if let Err(err) = store.refresh().await {
                        warn!(%err, "config re-read failed, keeping current settings");
                    }
                    let _ = tx.try_send(Trigger::Cycle(TriggerSource::Backstop));
                }
            }
        }
    })
}
