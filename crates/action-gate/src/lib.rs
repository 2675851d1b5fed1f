//! Success gate for the multi-order loop
//!
//! Recognizes a completed-order page and, when the agent runs in multi-order
//! mode, walks back to the product page and reloads it so the hunt can start
//! over:
//! - phrase, URL and marker-element signals
//! - once-per-success recovery, re-armed only after a non-confirmation page

pub mod conditions;
pub mod detector;
pub mod types;

pub use conditions::*;
pub use detector::SuccessDetector;
pub use types::*;
