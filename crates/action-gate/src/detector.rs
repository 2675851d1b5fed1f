//! Confirmation detection and multi-order recovery

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use action_primitives::{wait, ActionError, ExecCtx};
use cdp_adapter::{HostDocument, HostError};
use dropclick_config_center::{ConfigStore, SuccessPolicy};
use tracing::{debug, info, trace};

use crate::conditions::{phrase_signal, url_signal};
use crate::types::{SuccessOutcome, SuccessSignal};

pub struct SuccessDetector {
    host: Arc<dyn HostDocument>,
    store: Arc<dyn ConfigStore>,
    policy: SuccessPolicy,
    // cleared when a confirmation is handled, set again on any other page
    armed: AtomicBool,
}

impl SuccessDetector {
    pub fn new(
        host: Arc<dyn HostDocument>,
        store: Arc<dyn ConfigStore>,
        policy: SuccessPolicy,
    ) -> Self {
        Self {
            host,
            store,
            policy,
            armed: AtomicBool::new(true),
        }
    }

    /// Whether the current page is an order confirmation, and why.
    pub async fn is_order_confirmed(&self) -> Result<Option<SuccessSignal>, HostError> {
        let text = self.host.page_text().await?;
        if let Some(signal) = phrase_signal(&text, &self.policy.phrases) {
            return Ok(Some(signal));
        }
        let url = self.host.current_url().await?;
        if let Some(signal) = url_signal(&url, &self.policy.url_signals) {
            return Ok(Some(signal));
        }
        if !self.policy.marker_selector.trim().is_empty() {
            let markers = self.host.query_all(&self.policy.marker_selector).await?;
            if markers.iter().any(|marker| marker.attached) {
                return Ok(Some(SuccessSignal::Marker));
            }
        }
        Ok(None)
    }

    /// Allow the next confirmation to be handled. Called once the hunt is seen
    /// to be back on a product page.
    pub fn rearm(&self) {
        self.armed.store(true, Ordering::SeqCst);
    }

    /// On a confirmation page in multi-order mode: settle, navigate back, then
    /// reload. Runs at most once per confirmation.
    pub async fn check_and_recover(&self, ctx: &ExecCtx) -> Result<SuccessOutcome, ActionError> {
        let config = self.store.snapshot().await;
        if !config.multi_order || !config.enabled {
            return Ok(SuccessOutcome::Inactive);
        }

        let Some(signal) = self.is_order_confirmed().await? else {
            self.armed.store(true, Ordering::SeqCst);
            trace!(cycle_id = %ctx.cycle_id, "no order confirmation");
            return Ok(SuccessOutcome::NotConfirmed);
        };
        if !self.armed.swap(false, Ordering::SeqCst) {
            debug!(cycle_id = %ctx.cycle_id, %signal, "confirmation already handled");
            return Ok(SuccessOutcome::AlreadyHandled);
        }

        info!(cycle_id = %ctx.cycle_id, %signal, "order confirmed, restarting hunt");
        wait(ctx, Duration::from_millis(self.policy.settle_ms)).await?;
        self.host.history_back().await?;
        wait(ctx, Duration::from_millis(self.policy.reload_after_back_ms)).await?;
        self.host.reload().await?;
        Ok(SuccessOutcome::Recovered(signal))
    }
}
