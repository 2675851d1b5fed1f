//! Configuration center for the acquisition agent.
//!
//! Two kinds of settings live here:
//! - [`AgentConfig`], the small persisted record the settings panel writes and
//!   the agent reads (served through a [`ConfigStore`]);
//! - [`AgentPolicy`], the tuned timing and heuristic constants, loaded once at
//!   startup from defaults, an optional YAML file and environment overrides.

pub mod api;
pub mod defaults;
pub mod errors;
pub mod file_store;
pub mod loader;
pub mod model;

pub use api::{ConfigStore, InMemoryConfigStore};
pub use defaults::default_policy;
pub use errors::ConfigError;
pub use file_store::FileConfigStore;
pub use loader::{load_policy, load_policy_with_options, LoadOptions};
pub use model::*;
