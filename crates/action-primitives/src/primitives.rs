//! Click primitive

use std::time::Duration;

use action_locator::Control;
use chrono::Utc;
use tracing::info;

use crate::errors::ActionError;
use crate::types::{ActionReport, ExecCtx};
use crate::waiting::wait;

/// Wait `delay`, then click `control`.
///
/// The wait is cancellable. After a non-zero delay the live element is checked
/// again, and a control that went inert meanwhile is never clicked. Clicking a
/// stale control surfaces as
/// [`HostError::Detached`](cdp_adapter::HostError::Detached).
pub async fn delayed_click(
    ctx: &ExecCtx,
    control: &Control,
    delay: Duration,
    action: &'static str,
) -> Result<ActionReport, ActionError> {
    wait(ctx, delay).await?;
    if ctx.is_cancelled() {
        return Err(ActionError::Interrupted("cycle cancelled".to_string()));
    }
    if !delay.is_zero() && !control.is_still_interactive().await? {
        return Err(ActionError::NotInteractive(control.id().clone()));
    }
    let started_at = Utc::now();
    control.click().await?;
    let report = ActionReport {
        cycle_id: ctx.cycle_id.clone(),
        action,
        element: control.id().clone(),
        text: control.text().to_string(),
        started_at,
        latency_ms: ctx.elapsed_ms(),
    };
    info!(
        cycle_id = %report.cycle_id,
        action,
        element = %report.element,
        text = %report.text,
        latency_ms = report.latency_ms,
        "click dispatched"
    );
    Ok(report)
}

/// Click without a preceding delay.
pub async fn click(
    ctx: &ExecCtx,
    control: &Control,
    action: &'static str,
) -> Result<ActionReport, ActionError> {
    delayed_click(ctx, control, Duration::ZERO, action).await
}
