//! Error types for locator construction

use cdp_adapter::HostError;
use thiserror::Error;

/// Absence of a control is not an error; these only arise from bad policy.
#[derive(Debug, Error, Clone)]
pub enum LocatorError {
    #[error("invalid locator selector: {0}")]
    InvalidSelector(#[from] HostError),

    #[error("strategy chain for {0} is empty")]
    EmptyChain(&'static str),
}
