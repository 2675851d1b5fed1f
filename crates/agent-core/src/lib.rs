//! Agent controller for the acquisition agent.
//!
//! Owns the state machine (`Idle → Hunting → Cycling → AwaitingSuccess →
//! Hunting | Done`) and funnels every trigger source (document mutations, the
//! drop scheduler and a backstop timer) through one serialized queue into the
//! cycle executor.

pub mod controller;
pub mod errors;
mod hooks;
pub mod model;

pub use controller::AgentController;
pub use errors::AgentError;
pub use model::{AgentState, AgentStatus, TriggerSource};
