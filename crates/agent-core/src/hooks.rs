//! Scheduler side effects, routed through the controller.

use std::sync::atomic::Ordering;
use std::sync::Arc;

use action_flow::CycleExecutor;
use async_trait::async_trait;
use cdp_adapter::HostDocument;
use dropclick_scheduler::DropHooks;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::controller::{Counters, Trigger};
use crate::model::TriggerSource;

pub(crate) struct SchedulerHooks {
    pub(crate) executor: Arc<CycleExecutor>,
    pub(crate) host: Arc<dyn HostDocument>,
    pub(crate) triggers: mpsc::Sender<Trigger>,
    pub(crate) counters: Arc<Counters>,
}

#[async_trait]
impl DropHooks for SchedulerHooks {
    async fn target_ready(&self) -> bool {
        self.executor.locator().locate_add_to_cart().await.is_some()
    }

    async fn hand_off(&self) {
        if self
            .triggers
            .send(Trigger::Cycle(TriggerSource::Scheduler))
            .await
            .is_err()
        {
            debug!("controller gone, dropping scheduler hand-off");
        }
    }

    async fn reload(&self) {
        // handles from the old document are about to go stale
        self.executor.supersede();
        self.counters.reloads.fetch_add(1, Ordering::Relaxed);
        if let Err(err) = self.host.reload().await {
            warn!(%err, "scheduled reload failed");
        }
    }
}
