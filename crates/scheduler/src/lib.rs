//! Drop scheduler
//!
//! Keeps the product page fresh while the agent waits for a timed drop: the
//! reload cadence tightens as the drop moment approaches, and the loop hands
//! off to the cycle executor as soon as the target control shows up.

pub mod cadence;
pub mod clock;
pub mod error;
pub mod model;
pub mod runtime;

pub use cadence::{band, next_delay, Band};
pub use clock::{Clock, LocalClock, VirtualClock};
pub use error::DropTimeError;
pub use model::{plan, time_diff_ms, DropTime, Plan, StopReason};
pub use runtime::{DropHooks, DropScheduler};
