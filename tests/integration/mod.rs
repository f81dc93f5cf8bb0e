//! Integration test suite for proji
//!
//! End-to-end tests of the library surface and the `proji` binary.
//!
//! ```bash
//! cargo test --test integration
//! ```
//!
//! # Test Organization
//!
//! - **cli**: the `proji` binary against an isolated config and base directory
//! - **materialize**: building projects, plugin phases, working directory restoration
//! - **portability**: package config files, folder import and export
//! - **resolve**: dependency downloads, caching and tree filtering
//! - **store**: JSON-backed package and project stores

#[path = "../common/mod.rs"]
mod common;

mod cli;
mod materialize;
mod portability;
mod resolve;
mod store;
