//! Purchase cycle execution
//!
//! One cycle is the timed click sequence from a located add-to-cart control to
//! the checkout click, guarded so that only one cycle is ever in flight no
//! matter how many triggers race into [`CycleExecutor::run_full_cycle`].

pub mod executor;
pub mod types;

pub use executor::CycleExecutor;
pub use types::{CycleOutcome, CyclePhase, SkipReason};
