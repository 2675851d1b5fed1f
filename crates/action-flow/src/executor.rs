//! Cycle executor implementation

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use action_gate::SuccessDetector;
use action_locator::{Control, Locator};
use action_primitives::{click, delayed_click, poll_for, wait, ActionError, ExecCtx};
use dropclick_config_center::{AgentConfig, ConfigPatch, ConfigStore, ExecutorPolicy};
use parking_lot::Mutex;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use crate::types::{CycleOutcome, CyclePhase, SkipReason};

pub struct CycleExecutor {
    locator: Locator,
    store: Arc<dyn ConfigStore>,
    config: watch::Receiver<Arc<AgentConfig>>,
    success: Arc<SuccessDetector>,
    policy: ExecutorPolicy,
    in_flight: AtomicBool,
    current: Mutex<CancellationToken>,
    phase_tx: watch::Sender<CyclePhase>,
}

/// Holds the in-flight flag; releasing it also resets the published phase.
struct InFlight<'a> {
    executor: &'a CycleExecutor,
}

impl<'a> InFlight<'a> {
    fn acquire(executor: &'a CycleExecutor) -> Option<Self> {
        executor
            .in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self { executor })
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.executor.in_flight.store(false, Ordering::Release);
        self.executor.phase_tx.send_replace(CyclePhase::Idle);
    }
}

impl CycleExecutor {
    pub fn new(
        locator: Locator,
        store: Arc<dyn ConfigStore>,
        success: Arc<SuccessDetector>,
        policy: ExecutorPolicy,
    ) -> Self {
        let config = store.subscribe();
        let (phase_tx, _phase_rx) = watch::channel(CyclePhase::Idle);
        Self {
            locator,
            store,
            config,
            success,
            policy,
            in_flight: AtomicBool::new(false),
            current: Mutex::new(CancellationToken::new()),
            phase_tx,
        }
    }

    pub fn is_in_flight(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    pub fn phase(&self) -> watch::Receiver<CyclePhase> {
        self.phase_tx.subscribe()
    }

    pub fn locator(&self) -> &Locator {
        &self.locator
    }

    /// Abandon the pending waits of the cycle in flight, if any.
    pub fn supersede(&self) {
        let token = self.current.lock().clone();
        if !token.is_cancelled() {
            debug!("superseding cycle in flight");
            token.cancel();
        }
    }

    /// Locate, click add-to-cart, poll for checkout and click it.
    ///
    /// The enabled check and the in-flight flag are both settled before the
    /// first suspension point, so overlapping triggers cannot start a second
    /// cycle. Every failure ends here as [`CycleOutcome::Aborted`].
    pub async fn run_full_cycle(&self) -> CycleOutcome {
        let config = Arc::clone(&self.config.borrow());
        if !config.enabled {
            return CycleOutcome::Skipped(SkipReason::Disabled);
        }
        let Some(_guard) = InFlight::acquire(self) else {
            trace!("cycle already in flight");
            return CycleOutcome::Skipped(SkipReason::InFlight);
        };

        let Some(add_to_cart) = self.locator.locate_add_to_cart().await else {
            return CycleOutcome::TargetAbsent;
        };

        let token = CancellationToken::new();
        *self.current.lock() = token.clone();
        let ctx = ExecCtx::new(token);
        info!(
            cycle_id = %ctx.cycle_id,
            element = %add_to_cart.id(),
            text = %add_to_cart.text(),
            strategy = add_to_cart.strategy(),
            "target detected"
        );

        // a live add-to-cart control means we are off any confirmation page
        self.success.rearm();

        // the hunt is over once a target is seen; stop the reload loop
        if let Err(err) = self.store.set(ConfigPatch::auto_refresh(false)).await {
            warn!(cycle_id = %ctx.cycle_id, %err, "failed to clear autoRefresh");
        }

        match self.drive(&ctx, &config, &add_to_cart).await {
            Ok(success) => CycleOutcome::CheckedOut {
                cycle_id: ctx.cycle_id,
                success,
            },
            Err(error) => {
                if error.is_interrupted() {
                    debug!(cycle_id = %ctx.cycle_id, "cycle superseded");
                } else {
                    warn!(
                        cycle_id = %ctx.cycle_id,
                        kind = error.kind(),
                        %error,
                        elapsed_ms = ctx.elapsed_ms(),
                        "cycle aborted"
                    );
                }
                CycleOutcome::Aborted {
                    cycle_id: ctx.cycle_id,
                    error,
                }
            }
        }
    }

    async fn drive(
        &self,
        ctx: &ExecCtx,
        config: &AgentConfig,
        add_to_cart: &Control,
    ) -> Result<Option<action_gate::SuccessOutcome>, ActionError> {
        self.phase_tx.send_replace(CyclePhase::AddingToCart);
        delayed_click(ctx, add_to_cart, config.click_delay(), "add_to_cart").await?;

        self.phase_tx.send_replace(CyclePhase::AwaitingCheckout);
        let checkout = match self.locator.locate_checkout().await {
            Some(checkout) => checkout,
            None => {
                let poll = poll_for(
                    ctx,
                    self.policy.checkout_poll(),
                    self.policy.checkout_max_attempts,
                    |_| self.locator.locate_checkout(),
                );
                let reclick = async {
                    wait(ctx, self.policy.reclick_guard()).await?;
                    if self.locator.locate_checkout().await.is_none() {
                        // some pages swallow the first activation
                        if let Some(again) = self.locator.locate_add_to_cart().await {
                            click(ctx, &again, "add_to_cart_reclick").await?;
                        }
                    }
                    std::future::pending::<Result<Control, ActionError>>().await
                };
                tokio::select! {
                    biased;
                    found = poll => found?,
                    failed = reclick => failed?,
                }
            }
        };
        click(ctx, &checkout, "checkout").await?;

        if !self.config.borrow().multi_order {
            return Ok(None);
        }
        self.phase_tx.send_replace(CyclePhase::AwaitingSuccess);
        wait(ctx, self.policy.success_check_delay()).await?;
        let outcome = self.success.check_and_recover(ctx).await?;
        debug!(cycle_id = %ctx.cycle_id, ?outcome, "success check finished");
        Ok(Some(outcome))
    }
}
