//! Restartable reload loop

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use dropclick_config_center::{AgentConfig, CadencePolicy};
use tokio::sync::watch;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::clock::Clock;
use crate::model::{plan, Plan, StopReason};

/// What the scheduler may do to the page. The scheduler itself never touches
/// the document.
#[async_trait]
pub trait DropHooks: Send + Sync {
    /// Whether an interactive add-to-cart control is present right now.
    async fn target_ready(&self) -> bool;

    /// Run a purchase cycle.
    async fn hand_off(&self);

    /// Force a full page reload.
    async fn reload(&self);
}

pub struct DropScheduler {
    hooks: Arc<dyn DropHooks>,
    config: watch::Receiver<Arc<AgentConfig>>,
    policy: CadencePolicy,
    clock: Arc<dyn Clock>,
}

enum Wake {
    Elapsed,
    Reconfigured,
    Cancelled,
}

impl DropScheduler {
    pub fn new(
        hooks: Arc<dyn DropHooks>,
        config: watch::Receiver<Arc<AgentConfig>>,
        policy: CadencePolicy,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            hooks,
            config,
            policy,
            clock,
        }
    }

    /// Reload the page on the cadence of the current band until the hunt ends.
    ///
    /// Every config change restarts the evaluation, so clearing
    /// `autoRefresh` ends the loop without waiting out the current delay.
    pub async fn run(&self, cancel: CancellationToken) -> StopReason {
        let mut config_rx = self.config.clone();
        loop {
            if cancel.is_cancelled() {
                return StopReason::Cancelled;
            }
            let config = Arc::clone(&config_rx.borrow_and_update());
            let (delay, band, time_diff_ms) = match plan(&config, self.clock.now(), &self.policy) {
                Plan::Stop(reason) => {
                    info!(?reason, "drop scheduler stopped");
                    return reason;
                }
                Plan::Wait {
                    delay,
                    band,
                    time_diff_ms,
                } => (delay, band, time_diff_ms),
            };

            let present = self.hooks.target_ready().await;
            if present {
                info!(%band, time_diff_ms, "target present, handing off");
                self.hooks.hand_off().await;
            } else {
                debug!(
                    %band,
                    time_diff_ms,
                    delay_ms = delay.as_millis() as u64,
                    "next reload scheduled"
                );
            }

            match Self::pause(&cancel, &mut config_rx, delay).await {
                Wake::Cancelled => return StopReason::Cancelled,
                Wake::Reconfigured => continue,
                Wake::Elapsed => {}
            }
            if present {
                continue;
            }

            if self.hooks.target_ready().await {
                info!(%band, "target appeared, handing off");
                self.hooks.hand_off().await;
            } else {
                debug!(%band, "reloading");
                self.hooks.reload().await;
            }
        }
    }

    async fn pause(
        cancel: &CancellationToken,
        config_rx: &mut watch::Receiver<Arc<AgentConfig>>,
        delay: Duration,
    ) -> Wake {
        let timer = sleep(delay);
        tokio::pin!(timer);
        tokio::select! {
            biased;
            _ = cancel.cancelled() => return Wake::Cancelled,
            changed = config_rx.changed() => {
                if changed.is_ok() {
                    return Wake::Reconfigured;
                }
            }
            _ = &mut timer => return Wake::Elapsed,
        }
        // the store is gone, so the config can no longer change
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Wake::Cancelled,
            _ = &mut timer => Wake::Elapsed,
        }
    }
}
