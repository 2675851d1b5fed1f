//! Action primitives for the acquisition agent
//!
//! The suspension points of a purchase cycle, each bound to an [`ExecCtx`]
//! whose cancellation token lets a superseding trigger abandon them:
//! - cancellable fixed waits
//! - delayed clicks on located controls
//! - bounded polling for a control to appear

pub mod errors;
mod primitives;
pub mod types;
mod waiting;

pub use errors::*;
pub use primitives::*;
pub use types::*;
pub use waiting::*;
