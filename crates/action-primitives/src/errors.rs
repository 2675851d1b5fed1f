//! Error types for action primitives

use cdp_adapter::HostError;
use dropclick_core_types::{CoreError, ElementId};
use thiserror::Error;

#[derive(Debug, Error, Clone)]
pub enum ActionError {
    /// The awaited control never appeared within the poll window.
    #[error("control did not appear after {attempts} attempts")]
    ClickTimeout { attempts: u32 },

    /// The cycle was superseded or the agent shut down.
    #[error("operation interrupted: {0}")]
    Interrupted(String),

    /// The control went inert or vanished while the click was pending.
    #[error("element {0} is no longer interactive")]
    NotInteractive(ElementId),

    /// The click or navigation call itself failed.
    #[error(transparent)]
    Host(#[from] HostError),
}

impl ActionError {
    pub fn is_interrupted(&self) -> bool {
        matches!(self, ActionError::Interrupted(_))
    }

    /// Short label for logs and counters.
    pub fn kind(&self) -> &'static str {
        match self {
            ActionError::ClickTimeout { .. } => "click_timeout",
            ActionError::Interrupted(_) => "interrupted",
            ActionError::NotInteractive(_) => "not_interactive",
            ActionError::Host(_) => "action_throw",
        }
    }
}

impl From<ActionError> for CoreError {
    fn from(err: ActionError) -> Self {
        CoreError::new(err.to_string())
    }
}
