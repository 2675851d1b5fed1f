use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DropTimeError {
    #[error("drop time is empty")]
    Empty,
    #[error("malformed drop time '{0}', expected HH:MM or HH:MM:SS")]
    Malformed(String),
    #[error("drop time '{0}' is not a valid time of day")]
    OutOfRange(String),
}

impl From<DropTimeError> for dropclick_core_types::CoreError {
    fn from(value: DropTimeError) -> Self {
        dropclick_core_types::CoreError::new(value.to_string())
    }
}
