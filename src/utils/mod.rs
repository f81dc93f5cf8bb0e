//! Cross-cutting utilities.

pub mod fs;

pub use fs::{atomic_write, copy_dir, ensure_dir, ensure_parent_dir, path_exists};
