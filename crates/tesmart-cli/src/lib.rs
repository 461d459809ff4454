//! tesmart-cli library entry point.
//!
//! Holds the configuration loader and the subcommand handlers so the `teskvm`
//! binary and the integration tests in `tests/` share the same module tree.

pub mod commands;
pub mod config;
