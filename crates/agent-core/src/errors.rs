use action_locator::LocatorError;
use dropclick_config_center::ConfigError;
use thiserror::Error;

/// Errors emitted while assembling the agent.
#[derive(Debug, Error)]
pub enum AgentError {
    #[error("invalid policy: {0}")]
    Policy(#[from] ConfigError),

    #[error("locator setup failed: {0}")]
    Locator(#[from] LocatorError),
}

impl From<AgentError> for dropclick_core_types::CoreError {
    fn from(err: AgentError) -> Self {
        dropclick_core_types::CoreError::new(err.to_string())
    }
}
