//! Dropclick library
//!
//! Command implementations behind the `dropclick` binary, exposed for
//! integration testing.

pub mod cli;
