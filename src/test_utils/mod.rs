//! Test utilities for proji
//!
//! Helpers for unit and integration tests: a temporary base directory, an in-memory
//! platform, and sample packages.
//!
//! # Example
//!
//! ```rust,no_run
//! use proji_cli::test_utils::{FakePlatform, TestEnvironment};
//! use std::sync::Arc;
//!
//! let env = TestEnvironment::new().unwrap();
//! let fake = Arc::new(FakePlatform::github().with_file("plugins/init.sh", "echo hi"));
//! let resolver = env.resolver_with("github.com", fake.clone());
//! ```

pub mod environment;
pub mod fixtures;
pub mod platform;

pub use environment::TestEnvironment;
pub use platform::FakePlatform;

use std::sync::Once;
use tracing::Level;
use tracing_subscriber::EnvFilter;

/// Global flag to ensure logging is only initialized once in tests
static INIT_LOGGING: Once = Once::new();

/// Initialize logging for tests.
///
/// Only the first call has an effect. An explicit `level` wins; otherwise `RUST_LOG` is
/// used when set, and logging stays off when neither is given.
///
/// ```bash
/// RUST_LOG=debug cargo test
/// ```
pub fn init_test_logging(level: Option<Level>) {
    INIT_LOGGING.call_once(|| {
        let filter = if let Some(level) = level {
            EnvFilter::new(level.to_string())
        } else if std::env::var("RUST_LOG").is_ok() {
            EnvFilter::from_default_env()
        } else {
            return;
        };

        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .with_target(true)
            .with_thread_ids(false)
            .with_ansi(true)
            .try_init();
    });
}
