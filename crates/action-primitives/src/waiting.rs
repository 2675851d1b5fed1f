//! Cancellable waits

use std::future::Future;
use std::time::Duration;

use tokio::time::sleep;
use tracing::trace;

use crate::errors::ActionError;
use crate::types::ExecCtx;

/// Sleep for `duration` unless the cycle is cancelled first.
pub async fn wait(ctx: &ExecCtx, duration: Duration) -> Result<(), ActionError> {
    if ctx.is_cancelled() {
        return Err(ActionError::Interrupted("cycle cancelled".to_string()));
    }
    if duration.is_zero() {
        return Ok(());
    }
    tokio::select! {
        biased;
        _ = ctx.cancel_token.cancelled() => {
            Err(ActionError::Interrupted("cycle cancelled".to_string()))
        }
        _ = sleep(duration) => Ok(()),
    }
}

/// Run `probe` every `interval`, at most `max_attempts` times, until it yields
/// a value. The first probe happens one interval after the call.
pub async fn poll_for<T, F, Fut>(
    ctx: &ExecCtx,
    interval: Duration,
    max_attempts: u32,
    mut probe: F,
) -> Result<T, ActionError>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Option<T>>,
{
    for attempt in 1..=max_attempts {
        wait(ctx, interval).await?;
        if let Some(found) = probe(attempt).await {
            trace!(cycle_id = %ctx.cycle_id, attempt, "poll satisfied");
            return Ok(found);
        }
    }
    Err(ActionError::ClickTimeout {
        attempts: max_attempts,
    })
}
