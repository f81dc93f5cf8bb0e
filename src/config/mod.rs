//! Configuration loading.

mod global;

pub use global::{Auth, Config, ImportConfig, PathsConfig, ServerConfig};
