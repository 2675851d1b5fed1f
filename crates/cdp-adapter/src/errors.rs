use dropclick_core_types::{CoreError, ElementId};
use thiserror::Error;

#[derive(Debug, Error, Clone)]
pub enum HostError {
    /// The handle no longer refers to an element of the live document.
    #[error("element {0} is detached")]
    Detached(ElementId),

    #[error("invalid selector '{selector}': {reason}")]
    InvalidSelector { selector: String, reason: String },

    #[error("script error: {0}")]
    Script(String),

    #[error("navigation failed: {0}")]
    Navigation(String),

    #[error("browser launch failed: {0}")]
    Launch(String),
}

impl HostError {
    pub fn is_detached(&self) -> bool {
        matches!(self, HostError::Detached(_))
    }
}

impl From<HostError> for CoreError {
    fn from(value: HostError) -> Self {
        CoreError::new(value.to_string())
    }
}
