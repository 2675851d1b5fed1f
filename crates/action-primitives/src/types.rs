//! Core data types for action primitives

use chrono::{DateTime, Utc};
use dropclick_core_types::{CycleId, ElementId};
use serde::Serialize;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Execution context of one cycle.
///
/// Cloning shares the cancellation token, so every wait spawned on behalf of
/// the cycle is abandoned together.
#[derive(Clone, Debug)]
pub struct ExecCtx {
    pub cycle_id: CycleId,
    pub cancel_token: CancellationToken,
    pub started: Instant,
}

impl ExecCtx {
    pub fn new(cancel_token: CancellationToken) -> Self {
        Self {
            cycle_id: CycleId::new(),
            cancel_token,
            started: Instant::now(),
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel_token.is_cancelled()
    }

    /// Milliseconds since the cycle started.
    pub fn elapsed_ms(&self) -> u64 {
        self.started.elapsed().as_millis() as u64
    }
}

/// What a primitive did, for structured logs.
#[derive(Debug, Clone, Serialize)]
pub struct ActionReport {
    pub cycle_id: CycleId,
    pub action: &'static str,
    pub element: ElementId,
    pub text: String,
    pub started_at: DateTime<Utc>,
    /// Time from the start of the cycle to the dispatch.
    pub latency_ms: u64,
}
