pub mod config;
pub mod context;
pub mod demo;
pub mod output;
pub mod run;
pub mod storefront;

pub use config::{cmd_config, ConfigAction, ConfigArgs};
pub use context::CliContext;
pub use demo::{cmd_demo, DemoArgs};
pub use output::OutputFormat;
pub use run::{cmd_run, ConfigOverrides, RunArgs};
pub use storefront::Storefront;
