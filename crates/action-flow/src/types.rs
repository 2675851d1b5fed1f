//! Core types for cycle execution

use action_gate::SuccessOutcome;
use action_primitives::ActionError;
use dropclick_core_types::CycleId;
use serde::Serialize;

/// Why a cycle did not start.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    Disabled,
    InFlight,
}

/// Result of [`run_full_cycle`](crate::CycleExecutor::run_full_cycle).
#[derive(Debug, Clone)]
pub enum CycleOutcome {
    Skipped(SkipReason),
    /// No interactive add-to-cart control; the caller decides whether to reload.
    TargetAbsent,
    CheckedOut {
        cycle_id: CycleId,
        /// Present when multi-order mode ran the success check.
        success: Option<SuccessOutcome>,
    },
    Aborted {
        cycle_id: CycleId,
        error: ActionError,
    },
}

impl CycleOutcome {
    /// Whether a click sequence was started.
    pub fn initiated(&self) -> bool {
        matches!(
            self,
            CycleOutcome::CheckedOut { .. } | CycleOutcome::Aborted { .. }
        )
    }
}

/// Progress of the cycle currently in flight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CyclePhase {
    #[default]
    Idle,
    AddingToCart,
    AwaitingCheckout,
    AwaitingSuccess,
}
