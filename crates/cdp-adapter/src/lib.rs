//! Host documents for the dropclick agent.
//!
//! - [`HostDocument`]: the query/act/notify seam the agent is written against
//! - [`MemoryDocument`]: scripted in-memory pages for tests and the demo storefront
//! - [`ChromiumDocument`]: a real page driven over the DevTools protocol

pub mod chromium;
pub mod document;
pub mod errors;
pub mod memory;
mod script;
pub mod selector;

pub use chromium::{ChromiumDocument, ChromiumOptions};
pub use document::{normalize_text, DomEvent, ElementSnapshot, HostDocument};
pub use errors::HostError;
pub use memory::{ClickRecord, ElementSpec, MemoryDocument};
pub use selector::SelectorList;
