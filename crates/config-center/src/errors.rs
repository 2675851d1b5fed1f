use dropclick_core_types::CoreError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid config: {0}")]
    Invalid(String),
    #[error("io error: {0}")]
    Io(String),
    #[error("invalid value for {path}: {reason}")]
    InvalidValue { path: String, reason: String },
}

impl From<ConfigError> for CoreError {
    fn from(value: ConfigError) -> Self {
        CoreError::new(value.to_string())
    }
}
